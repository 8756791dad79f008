//! Hashing helpers.

pub mod digest;
