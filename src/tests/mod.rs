//! Test suite for the campaign save-data store.
//!
//! Unit tests live alongside their modules in `#[cfg(test)]` blocks; this
//! tree holds the cross-module integration tests (real temp directories) and
//! the property tests.

mod property;
