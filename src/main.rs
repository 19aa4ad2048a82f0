use omen::config::{Config, RiskConfig};
use omen::services::{BatchScanner, SignalEngine};
use omen::sources::BinanceClient;
use omen::BatchReport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn log_report(report: &BatchReport, risk: &RiskConfig) {
    for signal in &report.signals {
        let size = risk
            .account_balance
            .and_then(|balance| signal.position_size(balance, risk.risk_per_trade))
            .map(|s| format!("{:.6}", s))
            .unwrap_or_else(|| "-".to_string());
        info!(
            "{} {} [{}] conf={:.2} entry={} stop={} take={} size={} rule={} {}",
            signal.instrument,
            signal.side,
            signal.grade(),
            signal.confidence,
            signal.entry_price,
            signal
                .stop_price
                .map(|p| format!("{:.6}", p))
                .unwrap_or_else(|| "-".to_string()),
            signal
                .take_price
                .map(|p| format!("{:.6}", p))
                .unwrap_or_else(|| "-".to_string()),
            size,
            signal.rule,
            signal.reason
        );
    }
    for skipped in &report.skipped {
        warn!("Skipped {}: {}", skipped.instrument, skipped.reason);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "omen=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Starting Omen: primary {}, higher {:?}, cooldown {}ms, concurrency {}",
        config.batch.primary_timeframe,
        config
            .batch
            .higher_timeframes
            .iter()
            .map(|tf| tf.as_str())
            .collect::<Vec<_>>(),
        config.engine.cooldown_ms,
        config.batch.max_concurrency
    );

    let client = Arc::new(BinanceClient::new(
        &config.source.binance_api_url,
        Duration::from_millis(config.batch.fetch_timeout_ms),
    ));
    let engine = SignalEngine::new(config.engine.clone());
    let scanner = BatchScanner::new(engine, client.clone(), config.batch.clone());

    let mut interval =
        tokio::time::interval(Duration::from_secs(config.source.scan_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }

        let report = if config.source.instruments.is_empty() {
            match scanner
                .scan_top(client.as_ref(), config.source.universe_limit)
                .await
            {
                Ok(report) => report,
                Err(e) => {
                    warn!("Universe lookup failed: {}", e);
                    continue;
                }
            }
        } else {
            scanner.scan(&config.source.instruments).await
        };

        log_report(&report, &config.risk);
    }

    Ok(())
}
