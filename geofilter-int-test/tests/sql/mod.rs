mod determinism_test;
mod partial_mapping_test;
