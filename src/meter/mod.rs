//! Request metering.

pub mod quota;

pub use quota::{QuotaDecision, QuotaState, QuotaTracker};
