//! Liveness supervisor: two-stage failure detection.
//!
//! A client that misses its heartbeat deadline is not dropped outright; it
//! enters a grace window first, which absorbs transient network loss
//! without forgetting the client. Only a grace window that closes with no
//! revival removes the session. Worst case, a vanished client is kept for
//! `heartbeat_timeout + grace_window`.
//!
//! One scan loop covers every session; grace deadlines live in the
//! registry, keyed by client, so a burst of simultaneous expiries costs
//! map operations rather than spawned tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::{debug, info, warn};

use crate::session::{SessionPhase, SessionRegistry};

/// Timing policy for failure detection.
///
/// `scan_interval` must stay below `heartbeat_timeout`, and `grace_window`
/// above it; configuration loading validates both.
#[derive(Debug, Clone, Copy)]
pub struct LivenessPolicy {
    /// Silence longer than this opens a session's grace window.
    pub heartbeat_timeout: Duration,
    /// Extra time a silent session is kept before removal.
    pub grace_window: Duration,
    /// How often the registry is scanned.
    pub scan_interval: Duration,
}

/// Scans the registry on a fixed interval and applies the liveness policy.
///
/// Decisions go through the registry's conditional operations, so a
/// heartbeat racing a scan always wins: the mark or removal simply
/// declines. When a removal drains the registry, the supervisor reports it
/// over the drain channel and the lifecycle controller takes it from there.
pub struct Supervisor {
    registry: Arc<SessionRegistry>,
    policy: LivenessPolicy,
    drained_tx: mpsc::Sender<()>,
}

impl Supervisor {
    /// Create a supervisor over `registry` with the given policy.
    pub fn new(
        registry: Arc<SessionRegistry>,
        policy: LivenessPolicy,
        drained_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            registry,
            policy,
            drained_tx,
        }
    }

    /// Run scan passes until the shutdown channel fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            timeout_secs = self.policy.heartbeat_timeout.as_secs(),
            grace_secs = self.policy.grace_window.as_secs(),
            scan_secs = self.policy.scan_interval.as_secs(),
            "liveness supervisor starting"
        );

        let mut ticker = time::interval(self.policy.scan_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = self.scan().await {
                        warn!(%error, "liveness scan failed");
                    }
                }
                _ = shutdown.recv() => {
                    debug!("liveness supervisor stopping");
                    break;
                }
            }
        }
    }

    /// One pass over the registry: silent sessions enter grace, closed
    /// grace windows remove the session.
    async fn scan(&self) -> crate::Result<()> {
        let now = Instant::now();
        for session in self.registry.snapshot()? {
            match session.phase {
                SessionPhase::Alive => {
                    let idle = session.idle_for(now);
                    if idle <= self.policy.heartbeat_timeout {
                        continue;
                    }
                    let deadline = now + self.policy.grace_window;
                    let marked = self.registry.mark_grace(
                        &session.client_id,
                        session.last_signal_at,
                        deadline,
                    )?;
                    if marked {
                        warn!(
                            client = %session.client_id,
                            idle_secs = idle.as_secs(),
                            grace_secs = self.policy.grace_window.as_secs(),
                            "client silent; grace window opened"
                        );
                    }
                }
                SessionPhase::InGrace { deadline } if deadline <= now => {
                    let removal = self.registry.expire(&session.client_id, now)?;
                    if !removal.removed {
                        // Revived between snapshot and expiry; leave it be.
                        continue;
                    }
                    warn!(
                        client = %session.client_id,
                        remaining = removal.remaining,
                        "grace window closed; client removed"
                    );
                    if removal.drained() {
                        // Receiver gone means shutdown already started.
                        let _ = self.drained_tx.send(()).await;
                    }
                }
                SessionPhase::InGrace { deadline } => {
                    debug!(
                        client = %session.client_id,
                        remaining_secs = (deadline - now).as_secs(),
                        "grace window open"
                    );
                }
            }
        }
        Ok(())
    }
}
