//! Narrate a single topic through the default speakers.
//!
//! Run with:
//! ```bash
//! export GEMINI_API_KEY=...
//! cargo run -p core-service --features audio-output --example narrate_topic -- \
//!     "Doppler Shift" "Why a passing siren changes pitch."
//!
//! # JSON logs
//! cargo run -p core-service --features audio-output --example narrate_topic -- \
//!     "Doppler Shift" "Why a passing siren changes pitch." json
//! ```
//!
//! A second run of the same title replays the cached audio without calling
//! the service. Press Ctrl-C to stop early.

use anyhow::Context;
use core_narration::{NarrationOutcome, NarrationState, Topic};
use core_runtime::config::NarrationConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::NarrationService;
use std::env;
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let title = args.get(1).cloned().unwrap_or_else(|| "Doppler Shift".to_string());
    let description = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| "Why the pitch of a passing siren drops as it moves away.".to_string());
    let format = match args.get(3).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };

    init_logging(
        LoggingConfig::default()
            .with_format(format)
            .with_level(Level::INFO),
    )
    .context("failed to initialize logging")?;

    let config = NarrationConfig::builder()
        .api_key_from_env("GEMINI_API_KEY")?
        .build()
        .context("failed to build narration config")?;
    let service = NarrationService::new(config)?;

    let panel = service.panel("cli", Topic::new(title, description));
    let mut snapshots = panel.subscribe();

    match panel.toggle().await {
        NarrationOutcome::Started { from_cache } => {
            info!(from_cache, "Narration started");
        }
        NarrationOutcome::Failed(kind) => {
            warn!(kind = kind.as_str(), "{}", kind.user_message());
            anyhow::bail!(kind.user_message());
        }
        other => anyhow::bail!("unexpected outcome: {other:?}"),
    }

    tokio::select! {
        result = snapshots.wait_for(|s| s.state == NarrationState::Idle) => {
            result.context("narration panel dropped")?;
            info!("Narration finished");
        }
        _ = tokio::signal::ctrl_c() => {
            service.stop_all();
            info!("Narration stopped");
        }
    }

    service.shutdown().await;
    Ok(())
}
