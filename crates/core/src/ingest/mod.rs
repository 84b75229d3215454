pub mod error;
pub mod provider;
pub mod snapshot;
pub mod types;
