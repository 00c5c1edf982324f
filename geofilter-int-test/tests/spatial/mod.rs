//! Spatial index and feature store tests over the road fixtures.

mod index_test;
mod store_test;
