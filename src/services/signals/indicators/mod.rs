//! Series math used by the feature context.
//!
//! Every transform returns one value per input point and never fails on
//! short input; undefined positions get a neutral substitute instead.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use ema::Ema;
pub use macd::{Macd, MacdPoint, MacdSeries};
pub use rsi::{Rsi, NEUTRAL_RSI};
pub use sma::Sma;
