pub mod config;
pub mod errors;
pub mod oracle;
pub mod perception;
pub mod poller;
pub mod scoring;

use crate::errors::DartSightResult;
use crate::poller::{PollerEvent, ScorePoller};

/// Install the global tracing subscriber. `RUST_LOG` wins over the default.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Run the scorer until Ctrl-C.
pub async fn run() -> DartSightResult<()> {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let cfg = config::load_config()?;
    cfg.validate()?;

    let source = perception::open_source(&cfg.capture.source)?;
    let oracle = oracle::build_oracle(&cfg.oracle)?;
    let poller = ScorePoller::from_config(&cfg, source, oracle);

    let mut events = poller.subscribe();
    poller.enable()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, stopping");
                break;
            }
            ev = events.recv() => match ev {
                Ok(PollerEvent::ScoreUpdated { result }) => {
                    tracing::info!(
                        score = result.primary,
                        confidence = result.confidence,
                        darts = ?result.darts,
                        "detection"
                    );
                }
                Ok(PollerEvent::DetectionFailed { message }) => {
                    tracing::warn!(error = %message, "detection failed, keeping previous score");
                }
                Ok(other) => tracing::debug!(event = ?other, "poller event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event receiver lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    poller.shutdown().await;
    let snapshot = poller.snapshot();
    tracing::info!(
        last_score = ?snapshot.score,
        history = ?snapshot.history.iter().map(|e| e.score).collect::<Vec<_>>(),
        "scorer stopped"
    );
    Ok(())
}
