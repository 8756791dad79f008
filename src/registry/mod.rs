//! Durable license registry.

pub mod file;
pub mod record;

pub use file::LicenseRegistry;
pub use record::{LicenseMap, LicenseRecord, LicenseType};
