//! Property-based tests.
