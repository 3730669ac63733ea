//! UDP transport loop for the warden.
//!
//! One socket, one reader. The loop runs in two stages: a dormant wait
//! that only a trigger (or the inactivity budget, or a signal) can end,
//! then an active stage that feeds client traffic to the lifecycle
//! controller while the liveness supervisor scans in the background.
//! When the controller leaves `Active` the loop falls through to cleanup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::bridge::{Bridge, NullBridge, ScriptBridge};
use crate::diag::ShutdownJournal;
use crate::lifecycle::{LifecycleController, ServicePhase, TerminateReason};
use crate::protocol::{Message, MAX_DATAGRAM_LEN};
use crate::session::SessionRegistry;
use crate::supervisor::{LivenessPolicy, Supervisor};
use crate::Result;

/// Everything the warden needs to run, assembled from configuration.
#[derive(Debug, Clone)]
pub struct WardenSettings {
    /// Address the UDP socket binds.
    pub bind: SocketAddr,
    /// Failure-detection timing.
    pub policy: LivenessPolicy,
    /// How long the dormant phase waits for a trigger.
    pub dormant_budget: Duration,
    /// Handoff script, if any.
    pub bridge_script: Option<PathBuf>,
    /// Shutdown journal path, if any.
    pub shutdown_log: Option<PathBuf>,
}

/// The warden server: bound socket plus assembled collaborators.
pub struct Server {
    socket: UdpSocket,
    registry: Arc<SessionRegistry>,
    controller: LifecycleController,
    policy: LivenessPolicy,
    dormant_budget: Duration,
    journal: ShutdownJournal,
}

impl Server {
    /// Bind the socket and assemble the warden with the bridge the
    /// settings call for.
    pub async fn bind(settings: WardenSettings) -> Result<Self> {
        let bridge: Arc<dyn Bridge> = match &settings.bridge_script {
            Some(script) => Arc::new(ScriptBridge::new(script.clone())),
            None => Arc::new(NullBridge),
        };
        Self::bind_with_bridge(settings, bridge).await
    }

    /// Bind with an explicit bridge. Tests inject a recording bridge here.
    pub async fn bind_with_bridge(
        settings: WardenSettings,
        bridge: Arc<dyn Bridge>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(settings.bind).await?;
        info!(addr = %socket.local_addr()?, "warden listening");

        let registry = Arc::new(SessionRegistry::new());
        let controller = LifecycleController::new(Arc::clone(&registry), bridge);

        Ok(Self {
            socket,
            registry,
            controller,
            policy: settings.policy,
            dormant_budget: settings.dormant_budget,
            journal: ShutdownJournal::new(settings.shutdown_log),
        })
    }

    /// Address the socket actually bound (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Drive the warden through its full lifecycle: dormant wait, active
    /// tracking, cleanup. Returns once the warden is `Terminated`.
    pub async fn run(self) -> Result<()> {
        let Server {
            socket,
            registry,
            mut controller,
            policy,
            dormant_budget,
            journal,
        } = self;

        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        // Dormant: wait out the budget for a trigger.
        info!(
            budget_secs = dormant_budget.as_secs(),
            "dormant; waiting for trigger"
        );
        while controller.phase() == ServicePhase::Dormant {
            tokio::select! {
                received = time::timeout(dormant_budget, socket.recv_from(&mut buf)) => {
                    match received {
                        Err(_) => {
                            warn!("dormant budget exhausted without a trigger");
                            controller.begin_termination(TerminateReason::NoTrigger)?;
                        }
                        Ok(Err(error)) => {
                            error!(%error, "socket receive failed");
                            controller.begin_termination(TerminateReason::TransportFailed)?;
                        }
                        Ok(Ok((len, source))) => {
                            dispatch(&socket, &mut controller, &buf[..len], source).await?;
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    controller.begin_termination(TerminateReason::Interrupted)?;
                }
            }
        }

        // Active: the supervisor scans in the background while this loop
        // keeps reading the socket.
        let (drained_tx, mut drained_rx) = mpsc::channel(4);
        let (stop_tx, _) = broadcast::channel(1);
        let supervisor_task = if controller.phase() == ServicePhase::Active {
            let supervisor = Supervisor::new(Arc::clone(&registry), policy, drained_tx);
            Some(tokio::spawn(supervisor.run(stop_tx.subscribe())))
        } else {
            None
        };

        while controller.phase() == ServicePhase::Active {
            tokio::select! {
                received = socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, source)) => {
                            dispatch(&socket, &mut controller, &buf[..len], source).await?;
                        }
                        Err(error) => {
                            error!(%error, "socket receive failed");
                            controller.begin_termination(TerminateReason::TransportFailed)?;
                        }
                    }
                }
                Some(_) = drained_rx.recv() => {
                    controller.population_drained()?;
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    controller.begin_termination(TerminateReason::Interrupted)?;
                }
            }
        }

        // Cleanup: release the transport first so the counterpart can take
        // the port back, then stop the supervisor, then the final handoff.
        if let Some(reason) = controller.reason() {
            journal.record(reason.describe());
        }
        drop(socket);
        drop(stop_tx);
        if let Some(task) = supervisor_task {
            debug!("waiting for supervisor to stop");
            if let Err(error) = task.await {
                warn!(%error, "supervisor task failed");
            }
        }
        controller.finish_termination()?;
        info!("warden stopped");
        Ok(())
    }
}

/// Decode one datagram, run it through the controller, send any reply.
async fn dispatch(
    socket: &UdpSocket,
    controller: &mut LifecycleController,
    datagram: &[u8],
    source: SocketAddr,
) -> Result<()> {
    let message = match Message::decode(datagram) {
        Ok(message) => message,
        Err(error) => {
            debug!(%source, %error, "undecodable datagram dropped");
            return Ok(());
        }
    };

    if let Some(reply) = controller.handle_message(message, source)? {
        // A lost reply is the sender's problem; it retries into whatever
        // phase we are in by then.
        if let Err(error) = socket.send_to(reply.as_bytes(), source).await {
            warn!(%source, %error, "failed to send reply");
        }
    }
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(bind: &str) -> WardenSettings {
        WardenSettings {
            bind: bind.parse().unwrap(),
            policy: LivenessPolicy {
                heartbeat_timeout: Duration::from_millis(100),
                grace_window: Duration::from_millis(200),
                scan_interval: Duration::from_millis(20),
            },
            dormant_budget: Duration::from_secs(5),
            bridge_script: None,
            shutdown_log: None,
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind(settings("127.0.0.1:0")).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_taken_port() {
        let first = Server::bind(settings("127.0.0.1:0")).await.unwrap();
        let addr = first.local_addr().unwrap();

        let result = Server::bind(settings(&addr.to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dormant_probe_answers_not_ready() {
        let server = Server::bind(settings("127.0.0.1:0")).await.unwrap();
        let addr = server.local_addr().unwrap();
        let task = tokio::spawn(server.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"AYA", addr).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("no reply from dormant warden")
            .unwrap();
        assert_eq!(&buf[..len], b"NO");

        task.abort();
    }
}
