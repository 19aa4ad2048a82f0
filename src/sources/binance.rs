use crate::error::{Result, SignalError};
use crate::sources::{CandleSource, InstrumentUniverse};
use crate::types::{PriceBar, Series, Timeframe};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Binance caps klines requests at 1000 bars.
const MAX_KLINES: usize = 1000;

/// Quote asset used when ranking the universe.
const QUOTE_ASSET: &str = "USDT";

/// Leveraged token suffixes excluded from the universe.
const LEVERAGED_SUFFIXES: &[&str] = &["UPUSDT", "DOWNUSDT", "BULLUSDT", "BEARUSDT"];

/// Characters of an error body kept in logs.
const ERROR_BODY_PREVIEW: usize = 200;

/// Binance 24hr ticker response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    symbol: String,
    quote_volume: String,
}

/// Binance REST client for klines and 24h volume ranking.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    /// Create a new Binance client against `base_url` (e.g. ".../api/v3").
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent("Omen/0.1")
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        instrument: &str,
        timeframe: Timeframe,
    ) -> Result<T> {
        let response = self.client.get(url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(
                "Binance API returned {}: {}",
                status,
                preview(&text, ERROR_BODY_PREVIEW)
            );
            return Err(SignalError::Retrieval {
                instrument: instrument.to_string(),
                timeframe,
                message: format!("status {}", status),
            });
        }

        Ok(response.json().await?)
    }

    async fn fetch_klines(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Series> {
        let symbol = instrument.to_uppercase();
        let url = format!("{}/klines", self.base_url);
        let limit = count.clamp(1, MAX_KLINES);
        let query = [
            ("symbol", symbol.clone()),
            ("interval", timeframe.as_str().to_string()),
            ("limit", limit.to_string()),
        ];

        let rows: Vec<Vec<Value>> = self.get_json(&url, &query, &symbol, timeframe).await?;
        let bars = rows
            .iter()
            .map(|row| parse_kline(row))
            .collect::<Result<Vec<_>>>()?;

        debug!("Binance klines {} {}: {} bars", symbol, timeframe, bars.len());
        Series::new(bars)
    }

    async fn fetch_top(&self, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/ticker/24hr", self.base_url);
        let tickers: Vec<BinanceTicker> = self
            .get_json(&url, &[], "*", Timeframe::D1)
            .await?;
        Ok(rank_by_quote_volume(tickers, limit))
    }
}

/// First `max` characters of `text`, cut on a char boundary.
fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Parse one klines row: [openTime, open, high, low, close, volume, ...].
fn parse_kline(row: &[Value]) -> Result<PriceBar> {
    if row.len() < 6 {
        return Err(SignalError::InvalidSeries(format!(
            "kline row has {} fields",
            row.len()
        )));
    }
    let timestamp = row[0]
        .as_i64()
        .ok_or_else(|| SignalError::InvalidSeries("kline open time is not an integer".into()))?;
    let number = |idx: usize| -> Result<f64> {
        let value = match &row[idx] {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        };
        value.ok_or_else(|| SignalError::InvalidSeries(format!("kline field {} is not numeric", idx)))
    };

    Ok(PriceBar::new(
        timestamp,
        number(1)?,
        number(2)?,
        number(3)?,
        number(4)?,
        number(5)?,
    ))
}

/// USDT spot pairs by descending 24h quote volume.
fn rank_by_quote_volume(tickers: Vec<BinanceTicker>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(String, f64)> = tickers
        .into_iter()
        .filter(|t| t.symbol.ends_with(QUOTE_ASSET))
        .filter(|t| !LEVERAGED_SUFFIXES.iter().any(|s| t.symbol.ends_with(s)))
        .map(|t| {
            let volume = t.quote_volume.parse().unwrap_or(0.0);
            (t.symbol, volume)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.into_iter().take(limit).map(|(s, _)| s).collect()
}

impl CandleSource for BinanceClient {
    fn fetch<'a>(
        &'a self,
        instrument: &'a str,
        timeframe: Timeframe,
        count: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Series>> + Send + 'a>> {
        Box::pin(self.fetch_klines(instrument, timeframe, count))
    }
}

impl InstrumentUniverse for BinanceClient {
    fn top_instruments(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        Box::pin(self.fetch_top(limit))
    }
}
