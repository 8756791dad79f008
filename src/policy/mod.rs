//! Request authorization policy.

pub mod gate;

pub use gate::{check_license, Authorization, AuthorizationGate};
