//! Shared test support for the end-to-end journey suites

pub mod fixtures;
pub mod harness;
