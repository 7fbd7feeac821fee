//! The long-running logging service.
//!
//! [`run`] owns the process lifecycle: open the store, poll the feed, hand
//! every snapshot to the [`Tracker`], and run the termination sequence once
//! a [`ShutdownHandle`] is triggered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::{self, FeedSource, Snapshot};
use crate::storage::Storage;
use crate::tracker::{ShutdownReport, Tracker};

/// Consecutive feed failures between `error` level log lines.
const FAILURE_ESCALATION: u32 = 10;

/// A handle to stop the service.
///
/// Cloneable; the flag is checked between ticks, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    stop_signal: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the service to stop after the current tick.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Check if a stop has been requested.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

/// Trigger `handle` on SIGINT or SIGTERM (ctrl-c elsewhere).
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be registered.
#[cfg(unix)]
pub fn install_signal_handlers(handle: ShutdownHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("Received SIGINT, shutting down"),
            _ = terminate.recv() => info!("Received SIGTERM, shutting down"),
        }
        handle.stop();
    });
    Ok(())
}

/// Trigger `handle` on SIGINT or SIGTERM (ctrl-c elsewhere).
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
pub fn install_signal_handlers(handle: ShutdownHandle) -> Result<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received ctrl-c, shutting down"),
            Err(e) => warn!("Could not listen for ctrl-c: {}", e),
        }
        handle.stop();
    });
    Ok(())
}

/// Run the logger until `shutdown` is triggered.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or read at startup, or
/// the feed client cannot be built. Feed failures while running are logged
/// and retried.
pub async fn run(config: Config, shutdown: ShutdownHandle) -> Result<ShutdownReport> {
    let database_path = config.database_path();
    let storage = Storage::open(&database_path)?;
    let tracker = Tracker::new(config.tracking.clone(), storage)?;
    let source = feed::from_config(&config.feed)?;

    info!(
        "Logging flights from {} to {}",
        source.location(),
        database_path.display()
    );

    let report = run_loop(
        source.as_ref(),
        tracker,
        &shutdown,
        config.feed.timeout(),
        config.feed.poll_interval(),
    )
    .await;

    info!("Shutdown complete");
    Ok(report)
}

/// The tick loop: fetch, process, sleep. Runs the termination sequence
/// when `shutdown` is triggered.
pub async fn run_loop(
    source: &dyn FeedSource,
    mut tracker: Tracker,
    shutdown: &ShutdownHandle,
    timeout: Duration,
    poll_interval: Duration,
) -> ShutdownReport {
    let mut failures: u32 = 0;

    while !shutdown.should_stop() {
        match fetch(source, timeout).await {
            Ok(snapshot) => {
                if failures > 0 {
                    info!("Feed recovered after {} failed fetches", failures);
                    failures = 0;
                }
                let outcome = tracker.process(snapshot);
                if !outcome.stale {
                    debug!(
                        "Tick: {} aircraft, {} matched, {} new",
                        outcome.observations, outcome.matched, outcome.created
                    );
                }
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                if !e.is_feed_error() {
                    error!("Unexpected error reading {}: {}", source.location(), e);
                } else if failures % FAILURE_ESCALATION == 0 {
                    error!("{} consecutive feed failures, last: {}", failures, e);
                } else {
                    warn!("Feed fetch from {} failed: {}", source.location(), e);
                }
            }
        }

        if shutdown.should_stop() {
            break;
        }
        tokio::time::sleep(poll_interval).await;
    }

    info!("Stopping, writing tracked flights and records");
    tracker.shutdown()
}

async fn fetch(source: &dyn FeedSource, timeout: Duration) -> Result<Snapshot> {
    tokio::time::timeout(timeout, source.fetch())
        .await
        .map_err(|_| Error::FeedTimeout {
            seconds: timeout.as_secs(),
        })?
}
