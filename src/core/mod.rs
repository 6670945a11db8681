//! Core types and abstractions shared by the handler and providers

pub mod config;
pub mod error;
pub mod fund;
pub mod log;
pub mod telemetry;

// Re-export main types for cleaner imports
pub use error::HandlerError;
pub use fund::{FundDataProvider, FundIdentifier, NormalizedFundRecord, Scalar};
pub use telemetry::PageViewTracker;
