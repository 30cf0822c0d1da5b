//! Turn capture pipeline for a voice assistant.
//!
//! Listens on the microphone, detects when the user starts and stops
//! speaking using frame-level voice activity detection, and hands finished
//! utterances to a pluggable transcription backend. Runs standalone as a
//! capture and turn-taking check when no backend is wired up.

mod audio;
mod config;
mod stt;
mod turn;
mod vad;

use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use config::CaptureConfig;
use stt::NullTranscriber;
use turn::run_chat_loop;

/// Cancel the token on Ctrl+C or SIGTERM.
async fn wait_for_shutdown(cancel: CancellationToken) {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("🛑 Received SIGTERM, shutting down...");
        }
    }

    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = CaptureConfig::from_args();

    // Respect RUST_LOG, fall back to the verbose flag, default to info.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| if config.verbose { EnvFilter::try_new("debug") } else { EnvFilter::try_new("info") })
        .unwrap();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🎤 Turn Capture v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }

    config.log_config();

    let cancel = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(cancel.clone()));

    let transcriber = NullTranscriber;
    run_chat_loop(&config, &transcriber, &cancel).await?;

    info!("✅ Turn capture stopped");
    Ok(())
}
