//! Omen - multi-timeframe rule-based trading signal engine

pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use config::{BatchConfig, Config, EngineConfig};
pub use error::{Result, SignalError};
pub use services::{BatchScanner, SignalEngine};
pub use types::*;
