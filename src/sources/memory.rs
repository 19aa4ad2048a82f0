use crate::error::{Result, SignalError};
use crate::sources::{CandleSource, InstrumentUniverse};
use crate::types::{Series, Timeframe};
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// In-memory candle source for tests and offline replays.
///
/// Series are keyed by (uppercased instrument, timeframe). Failures and
/// artificial delays can be injected per instrument.
#[derive(Default)]
pub struct MemoryCandleSource {
    series: DashMap<(String, Timeframe), Series>,
    failures: DashMap<String, String>,
    delays: DashMap<String, Duration>,
    /// Universe order; defaults to insertion order of `with_series`.
    ranking: Vec<String>,
}

impl MemoryCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, instrument: &str, timeframe: Timeframe, series: Series) -> Self {
        let instrument = instrument.to_uppercase();
        if !self.ranking.contains(&instrument) {
            self.ranking.push(instrument.clone());
        }
        self.series.insert((instrument, timeframe), series);
        self
    }

    /// Every fetch for `instrument` fails with `message`.
    pub fn with_failure(self, instrument: &str, message: &str) -> Self {
        self.failures
            .insert(instrument.to_uppercase(), message.to_string());
        self
    }

    /// Every fetch for `instrument` sleeps for `delay` first.
    pub fn with_delay(self, instrument: &str, delay: Duration) -> Self {
        self.delays.insert(instrument.to_uppercase(), delay);
        self
    }
}

impl CandleSource for MemoryCandleSource {
    fn fetch<'a>(
        &'a self,
        instrument: &'a str,
        timeframe: Timeframe,
        count: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Series>> + Send + 'a>> {
        Box::pin(async move {
            let key = instrument.to_uppercase();

            let delay = self.delays.get(&key).map(|d| *d);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(message) = self.failures.get(&key) {
                return Err(SignalError::Retrieval {
                    instrument: key.clone(),
                    timeframe,
                    message: message.clone(),
                });
            }

            let series = self
                .series
                .get(&(key.clone(), timeframe))
                .map(|s| s.clone())
                .ok_or_else(|| SignalError::Retrieval {
                    instrument: key.clone(),
                    timeframe,
                    message: "no data".to_string(),
                })?;

            Series::new(series.tail(count).to_vec())
        })
    }
}

impl InstrumentUniverse for MemoryCandleSource {
    fn top_instruments(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        Box::pin(async move { Ok(self.ranking.iter().take(limit).cloned().collect()) })
    }
}
