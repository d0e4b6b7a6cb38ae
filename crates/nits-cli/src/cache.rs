//! # Cache Subcommand
//!
//! Drives the [`CacheService`] lifecycle: `run` serves until a shutdown
//! signal, `gc` performs a single sweep over the configured backend.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;

use nits_cache::{Backend, CacheConfig, CacheService};

/// Default garbage-collection window: 90 days.
pub const DEFAULT_TIME_WINDOW_HOURS: u64 = 24 * 90;

/// Arguments for the `nits cache` subcommand.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: CacheCommand,
}

/// Flags that take precedence over the `NITS_CACHE_*` environment.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Address to listen on.
    #[arg(long, global = true)]
    pub bind_address: Option<String>,

    /// Keep stores on disk under this directory instead of in memory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut CacheConfig) {
        if let Some(addr) = &self.bind_address {
            config.bind_address = addr.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.backend = Backend::Filesystem(dir.clone());
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Serve the binary cache until interrupted.
    Run,

    /// Delete artifacts nobody has fetched within the time window.
    Gc {
        /// Entries last accessed more than this many hours ago are removed.
        #[arg(
            long,
            env = "NITS_CACHE_GC_TIME_WINDOW_HOURS",
            default_value_t = DEFAULT_TIME_WINDOW_HOURS
        )]
        time_window_hours: u64,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Execute the cache subcommand.
pub fn run_cache(args: &CacheArgs) -> Result<u8> {
    let mut config = CacheConfig::from_env().context("loading cache configuration")?;
    args.overrides.apply(&mut config);
    let service = CacheService::new(config).context("invalid cache configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    match &args.command {
        CacheCommand::Run => runtime.block_on(cmd_run(service)),
        CacheCommand::Gc {
            time_window_hours,
            json,
        } => {
            ensure_persistent_backend(service.config())?;
            let cutoff = cutoff(Utc::now(), *time_window_hours)?;
            runtime.block_on(cmd_gc(service, cutoff, *json))
        }
    }
}

/// A sweep over a fresh in-memory store has nothing to collect.
pub fn ensure_persistent_backend(config: &CacheConfig) -> Result<()> {
    if config.backend == Backend::Memory {
        anyhow::bail!(
            "garbage collection needs a persistent backend; \
             set NITS_CACHE_DATA_DIR or pass --data-dir"
        );
    }
    Ok(())
}

/// `now - hours`, rejecting windows chrono cannot represent.
pub fn cutoff(now: DateTime<Utc>, hours: u64) -> Result<DateTime<Utc>> {
    let window = i64::try_from(hours)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .with_context(|| format!("time window of {hours} hours is too large"))?;
    now.checked_sub_signed(window)
        .with_context(|| format!("time window of {hours} hours is too large"))
}

async fn cmd_run(mut service: CacheService) -> Result<u8> {
    service.init().await.context("initializing cache service")?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        crate::shutdown_signal().await;
        trigger.cancel();
    });

    service.run(shutdown).await.context("serving cache")?;
    Ok(0)
}

async fn cmd_gc(mut service: CacheService, cutoff: DateTime<Utc>, json: bool) -> Result<u8> {
    service.open().await.context("opening stores")?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let watcher = tokio::spawn(async move {
        crate::shutdown_signal().await;
        trigger.cancel();
    });

    let report = service
        .garbage_collect(&cancel, cutoff)
        .await
        .context("running garbage collection")?;
    watcher.abort();

    if json {
        let rendered = serde_json::to_string_pretty(&report).context("serializing report")?;
        println!("{rendered}");
    } else {
        println!("{report}");
    }
    if let Some(err) = &report.error {
        tracing::error!(error = %err, "garbage collection failed");
        return Ok(1);
    }
    if report.cancelled {
        tracing::warn!("garbage collection interrupted");
        return Ok(130);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(subcommand)]
        command: Top,
    }

    #[derive(Subcommand, Debug)]
    enum Top {
        Cache(CacheArgs),
    }

    fn parse_gc(args: &[&str]) -> (u64, bool) {
        let argv = ["nits", "cache", "gc"].iter().chain(args);
        let Top::Cache(cache) = Cli::try_parse_from(argv).unwrap().command;
        match cache.command {
            CacheCommand::Gc {
                time_window_hours,
                json,
            } => (time_window_hours, json),
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn config() -> CacheConfig {
        let identity = nits_crypto::SigningIdentity::from_seed("cli.test-1", &[7; 32]).unwrap();
        CacheConfig::new(identity)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn cutoff_subtracts_window() {
        let cutoff = cutoff(now(), 36).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 5, 31, 0, 0, 0).unwrap());
    }

    #[test]
    fn default_window_is_ninety_days() {
        let cutoff = cutoff(now(), DEFAULT_TIME_WINDOW_HOURS).unwrap();
        assert_eq!(now() - cutoff, chrono::Duration::days(90));
    }

    #[test]
    fn absurd_window_rejected() {
        assert!(cutoff(now(), u64::MAX).is_err());
    }

    #[test]
    fn overrides_replace_env_values() {
        let mut config = config();
        ConfigOverrides {
            bind_address: Some("0.0.0.0:8080".into()),
            data_dir: Some(PathBuf::from("/var/lib/nits")),
        }
        .apply(&mut config);
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.backend, Backend::Filesystem(PathBuf::from("/var/lib/nits")));

        let before = config.bind_address.clone();
        ConfigOverrides::default().apply(&mut config);
        assert_eq!(config.bind_address, before);
    }

    #[test]
    fn gc_refuses_memory_backend() {
        let mut config = config();
        let err = ensure_persistent_backend(&config).unwrap_err();
        assert!(err.to_string().contains("NITS_CACHE_DATA_DIR"), "{err}");

        config.backend = Backend::Filesystem(PathBuf::from("/var/lib/nits"));
        assert!(ensure_persistent_backend(&config).is_ok());
    }

    #[test]
    fn gc_window_flag_parses() {
        assert_eq!(parse_gc(&["--time-window-hours", "48", "--json"]), (48, true));
    }

    #[test]
    fn gc_window_defaults_to_ninety_days() {
        if std::env::var_os("NITS_CACHE_GC_TIME_WINDOW_HOURS").is_some() {
            return;
        }
        assert_eq!(parse_gc(&[]), (DEFAULT_TIME_WINDOW_HOURS, false));
    }
}
