//! Candle data collaborators.

pub mod binance;
pub mod memory;

pub use binance::BinanceClient;
pub use memory::MemoryCandleSource;

use crate::error::Result;
use crate::types::{Series, Timeframe};
use std::future::Future;
use std::pin::Pin;

/// Supplies recent candles for an instrument.
pub trait CandleSource: Send + Sync {
    /// Fetch the most recent `count` bars, oldest first.
    fn fetch<'a>(
        &'a self,
        instrument: &'a str,
        timeframe: Timeframe,
        count: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Series>> + Send + 'a>>;
}

/// Lists tradable instruments ranked by liquidity.
pub trait InstrumentUniverse: Send + Sync {
    fn top_instruments(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>>;
}
