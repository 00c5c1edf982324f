//! In-memory evaluation checked against the compiled SQL.

mod equivalence_test;
