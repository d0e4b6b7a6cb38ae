//! # nits-cli — Command-Line Entry Point
//!
//! Provides the `nits` binary.
//!
//! ## Subcommands
//!
//! - `nits cache run`: serve the binary cache until SIGINT or SIGTERM.
//! - `nits cache gc`: run one garbage-collection sweep and print the report.
//! - `nits keygen`: write a fresh Nix signing key pair.
//!
//! Cache configuration comes from `NITS_CACHE_*` environment variables; a few
//! flags override the most commonly changed ones.

pub mod cache;
pub mod keygen;
pub mod logging;

/// Wait for SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
