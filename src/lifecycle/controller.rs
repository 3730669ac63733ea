//! Lifecycle controller: dispatch policy and phase ownership.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::bridge::{Bridge, BridgeSignal};
use crate::protocol::{Message, Reply};
use crate::session::{ClientId, SessionRegistry};
use crate::Result;

use super::ServicePhase;

/// Why the warden is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateReason {
    /// The dormant inactivity budget ran out before any trigger arrived.
    NoTrigger,
    /// The last tracked client departed or expired.
    Drained,
    /// A no-id kill: operator override, ignores remaining clients.
    OperatorKill,
    /// The listening socket failed.
    TransportFailed,
    /// The process caught SIGINT/SIGTERM.
    Interrupted,
}

impl TerminateReason {
    /// Human-readable form for logs and the shutdown journal.
    pub fn describe(&self) -> &'static str {
        match self {
            TerminateReason::NoTrigger => "no trigger received within dormant budget",
            TerminateReason::Drained => "all clients gone",
            TerminateReason::OperatorKill => "operator kill received",
            TerminateReason::TransportFailed => "listening socket failed",
            TerminateReason::Interrupted => "interrupted by signal",
        }
    }

    /// Whether the counterpart should be told to stand back up.
    ///
    /// A signal-interrupted warden stays silent: the host is likely going
    /// down anyway, and waking the counterpart mid-shutdown would fight it.
    fn notifies_bridge(&self) -> bool {
        !matches!(self, TerminateReason::Interrupted)
    }
}

/// Owns the service phase and decides what every inbound message does.
///
/// Nothing else mutates the phase. The transport loop feeds messages in,
/// sends back whatever reply this returns, and watches [`phase`](Self::phase)
/// to know when to move between its dormant, active, and cleanup stages.
pub struct LifecycleController {
    phase: ServicePhase,
    registry: Arc<SessionRegistry>,
    bridge: Arc<dyn Bridge>,
    reason: Option<TerminateReason>,
}

impl LifecycleController {
    /// Create a controller in the dormant phase.
    pub fn new(registry: Arc<SessionRegistry>, bridge: Arc<dyn Bridge>) -> Self {
        Self {
            phase: ServicePhase::Dormant,
            registry,
            bridge,
            reason: None,
        }
    }

    /// Current service phase.
    pub fn phase(&self) -> ServicePhase {
        self.phase
    }

    /// Why termination began, once it has.
    pub fn reason(&self) -> Option<TerminateReason> {
        self.reason
    }

    /// Dispatch one inbound message according to the current phase.
    ///
    /// Returns the reply to send back to the sender, if any. Messages that
    /// arrive during wind-down get silence; senders see a timeout and retry
    /// against whoever owns the port next.
    pub fn handle_message(
        &mut self,
        message: Message,
        source: SocketAddr,
    ) -> Result<Option<Reply>> {
        match self.phase {
            ServicePhase::Dormant => self.handle_dormant(message, source),
            ServicePhase::Active => self.handle_active(message, source),
            ServicePhase::Terminating | ServicePhase::Terminated => {
                debug!(%source, ?message, "message ignored during shutdown");
                Ok(None)
            }
        }
    }

    fn handle_dormant(&mut self, message: Message, source: SocketAddr) -> Result<Option<Reply>> {
        match message {
            Message::Probe => {
                debug!(%source, "probe while dormant");
                Ok(Some(Reply::NotReady))
            }
            Message::Trigger => {
                info!(%source, "trigger received; entering active phase");
                self.phase.transition_to(ServicePhase::Active)?;
                self.notify_bridge(BridgeSignal::Activate);
                Ok(Some(Reply::Ack))
            }
            other => {
                debug!(%source, message = ?other, "ignoring message while dormant");
                Ok(None)
            }
        }
    }

    fn handle_active(&mut self, message: Message, source: SocketAddr) -> Result<Option<Reply>> {
        match message {
            Message::Probe => {
                debug!(%source, "probe while active");
                Ok(Some(Reply::Ready))
            }
            Message::Trigger => {
                // A sender whose first trigger reply got lost will retry;
                // acknowledge again so it converges without re-activating.
                warn!(%source, "duplicate trigger while already active");
                Ok(Some(Reply::Ack))
            }
            Message::Hello(client_id) => {
                let (_, created) = self.registry.upsert(&client_id, source)?;
                if created {
                    info!(client = %client_id, %source, clients = self.registry.len(), "client joined");
                } else {
                    info!(client = %client_id, %source, "client re-announced");
                }
                Ok(Some(Reply::Welcome))
            }
            Message::Heartbeat(client_id) => {
                self.record_heartbeat(client_id, source)?;
                Ok(None)
            }
            Message::LegacyHeartbeat => {
                self.record_heartbeat(ClientId::legacy(&source), source)?;
                Ok(None)
            }
            Message::Kill(client_id) => {
                let removal = self.registry.remove(&client_id)?;
                if removal.removed {
                    info!(client = %client_id, remaining = removal.remaining, "client departed");
                } else {
                    debug!(client = %client_id, %source, "kill for unknown client");
                }
                if removal.drained() {
                    self.begin_termination(TerminateReason::Drained)?;
                }
                Ok(None)
            }
            Message::LegacyKill => {
                warn!(%source, clients = self.registry.len(), "global kill received");
                self.begin_termination(TerminateReason::OperatorKill)?;
                Ok(None)
            }
            Message::Unknown(raw) => {
                debug!(%source, raw = %raw, "unrecognized message");
                Ok(None)
            }
        }
    }

    /// A hello or heartbeat counts as a liveness signal either way; a
    /// heartbeat from a client that never said hello still registers it.
    fn record_heartbeat(&mut self, client_id: ClientId, source: SocketAddr) -> Result<()> {
        let (_, created) = self.registry.upsert(&client_id, source)?;
        if created {
            let clients = self.registry.len();
            info!(client = %client_id, %source, clients, "client registered by heartbeat");
        } else {
            debug!(client = %client_id, "heartbeat");
        }
        Ok(())
    }

    /// The supervisor reported the registry reached zero.
    ///
    /// The report travels over a channel, so by the time it lands a new
    /// client may already have joined; re-check before acting on it.
    pub fn population_drained(&mut self) -> Result<()> {
        if self.phase != ServicePhase::Active {
            debug!("drain report outside active phase; ignored");
            return Ok(());
        }
        if !self.registry.is_empty() {
            debug!(clients = self.registry.len(), "drain report stale; clients present");
            return Ok(());
        }
        self.begin_termination(TerminateReason::Drained)
    }

    /// Move into `Terminating`. The first condition to fire wins; anything
    /// arriving after that is a logged no-op, which is what keeps the final
    /// stand-down signal single-shot even when emptiness and an explicit
    /// kill land together.
    pub fn begin_termination(&mut self, reason: TerminateReason) -> Result<()> {
        if matches!(self.phase, ServicePhase::Terminating | ServicePhase::Terminated) {
            debug!(?reason, "already terminating");
            return Ok(());
        }
        self.phase.transition_to(ServicePhase::Terminating)?;
        self.reason = Some(reason);
        info!(reason = reason.describe(), "terminating");
        Ok(())
    }

    /// Complete the shutdown: drop all sessions, send the final bridge
    /// signal, and land in `Terminated`.
    ///
    /// The caller releases the transport and stops the supervisor before
    /// this. The phase machine only admits `Terminating → Terminated` once,
    /// so the stand-down signal cannot be repeated.
    pub fn finish_termination(&mut self) -> Result<()> {
        self.phase.transition_to(ServicePhase::Terminated)?;
        self.registry.clear();
        match self.reason {
            Some(reason) if reason.notifies_bridge() => {
                self.notify_bridge(BridgeSignal::Deactivate);
            }
            Some(_) => debug!("stand-down signal withheld for interrupted shutdown"),
            None => {}
        }
        info!("terminated");
        Ok(())
    }

    fn notify_bridge(&self, signal: BridgeSignal) {
        if let Err(err) = self.bridge.notify(signal) {
            error!(?signal, %err, "bridge notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::RecordingBridge;

    fn source() -> SocketAddr {
        "10.8.0.4:40000".parse().unwrap()
    }

    fn setup() -> (LifecycleController, Arc<SessionRegistry>, Arc<RecordingBridge>) {
        let registry = Arc::new(SessionRegistry::new());
        let bridge = Arc::new(RecordingBridge::new());
        let controller =
            LifecycleController::new(Arc::clone(&registry), Arc::clone(&bridge) as Arc<dyn Bridge>);
        (controller, registry, bridge)
    }

    fn activate(controller: &mut LifecycleController) {
        let reply = controller.handle_message(Message::Trigger, source()).unwrap();
        assert_eq!(reply, Some(Reply::Ack));
        assert_eq!(controller.phase(), ServicePhase::Active);
    }

    #[test]
    fn test_probe_while_dormant() {
        let (mut controller, registry, bridge) = setup();

        let reply = controller.handle_message(Message::Probe, source()).unwrap();

        assert_eq!(reply, Some(Reply::NotReady));
        assert_eq!(controller.phase(), ServicePhase::Dormant);
        assert!(registry.is_empty());
        assert!(bridge.recorded().is_empty());
    }

    #[test]
    fn test_trigger_activates_once() {
        let (mut controller, _, bridge) = setup();

        activate(&mut controller);

        assert_eq!(bridge.recorded(), vec![BridgeSignal::Activate]);
    }

    #[test]
    fn test_duplicate_trigger_is_acknowledged_noop() {
        let (mut controller, _, bridge) = setup();
        activate(&mut controller);

        let reply = controller.handle_message(Message::Trigger, source()).unwrap();

        assert_eq!(reply, Some(Reply::Ack));
        assert_eq!(controller.phase(), ServicePhase::Active);
        // Still exactly one activate.
        assert_eq!(bridge.recorded(), vec![BridgeSignal::Activate]);
    }

    #[test]
    fn test_dormant_ignores_client_traffic() {
        let (mut controller, registry, _) = setup();

        let hello = controller
            .handle_message(Message::Hello(ClientId::new("nas-01")), source())
            .unwrap();
        let beat = controller
            .handle_message(Message::Heartbeat(ClientId::new("nas-01")), source())
            .unwrap();

        assert_eq!(hello, None);
        assert_eq!(beat, None);
        assert!(registry.is_empty());
        assert_eq!(controller.phase(), ServicePhase::Dormant);
    }

    #[test]
    fn test_probe_while_active_mutates_nothing() {
        let (mut controller, registry, bridge) = setup();
        activate(&mut controller);
        let before = bridge.recorded().len();

        let reply = controller.handle_message(Message::Probe, source()).unwrap();

        assert_eq!(reply, Some(Reply::Ready));
        assert!(registry.is_empty());
        assert_eq!(bridge.recorded().len(), before);
    }

    #[test]
    fn test_hello_registers_and_welcomes() {
        let (mut controller, registry, _) = setup();
        activate(&mut controller);

        let reply = controller
            .handle_message(Message::Hello(ClientId::new("nas-01")), source())
            .unwrap();

        assert_eq!(reply, Some(Reply::Welcome));
        let session = registry.get(&ClientId::new("nas-01")).unwrap().unwrap();
        assert!(session.phase.is_alive());
        assert_eq!(session.source_addr, source());
    }

    #[test]
    fn test_heartbeat_registers_without_hello() {
        let (mut controller, registry, _) = setup();
        activate(&mut controller);

        let reply = controller
            .handle_message(Message::Heartbeat(ClientId::new("nas-02")), source())
            .unwrap();

        assert_eq!(reply, None);
        assert!(registry.get(&ClientId::new("nas-02")).unwrap().is_some());
    }

    #[test]
    fn test_legacy_heartbeat_synthesizes_identity() {
        let (mut controller, registry, _) = setup();
        activate(&mut controller);

        controller
            .handle_message(Message::LegacyHeartbeat, source())
            .unwrap();

        let expected = ClientId::legacy(&source());
        assert!(registry.get(&expected).unwrap().is_some());
    }

    #[test]
    fn test_kill_removes_one_client_only() {
        let (mut controller, registry, bridge) = setup();
        activate(&mut controller);
        controller
            .handle_message(Message::Hello(ClientId::new("a")), source())
            .unwrap();
        controller
            .handle_message(Message::Hello(ClientId::new("b")), source())
            .unwrap();

        let reply = controller
            .handle_message(Message::Kill(ClientId::new("a")), source())
            .unwrap();

        assert_eq!(reply, None);
        assert!(registry.get(&ClientId::new("a")).unwrap().is_none());
        assert!(registry.get(&ClientId::new("b")).unwrap().is_some());
        assert_eq!(controller.phase(), ServicePhase::Active);
        // Activate only; no stand-down while clients remain.
        assert_eq!(bridge.recorded(), vec![BridgeSignal::Activate]);
    }

    #[test]
    fn test_kill_unknown_client_is_noop() {
        let (mut controller, _, _) = setup();
        activate(&mut controller);
        controller
            .handle_message(Message::Hello(ClientId::new("a")), source())
            .unwrap();

        controller
            .handle_message(Message::Kill(ClientId::new("ghost")), source())
            .unwrap();

        assert_eq!(controller.phase(), ServicePhase::Active);
    }

    #[test]
    fn test_kill_last_client_terminates_with_one_standdown() {
        let (mut controller, registry, bridge) = setup();
        activate(&mut controller);
        controller
            .handle_message(Message::Hello(ClientId::new("a")), source())
            .unwrap();

        controller
            .handle_message(Message::Kill(ClientId::new("a")), source())
            .unwrap();
        assert_eq!(controller.phase(), ServicePhase::Terminating);
        assert_eq!(controller.reason(), Some(TerminateReason::Drained));

        controller.finish_termination().unwrap();
        assert_eq!(controller.phase(), ServicePhase::Terminated);
        assert!(registry.is_empty());
        assert_eq!(
            bridge.recorded(),
            vec![BridgeSignal::Activate, BridgeSignal::Deactivate]
        );
    }

    #[test]
    fn test_global_kill_overrides_remaining_clients() {
        let (mut controller, _, bridge) = setup();
        activate(&mut controller);
        controller
            .handle_message(Message::Hello(ClientId::new("a")), source())
            .unwrap();
        controller
            .handle_message(Message::Hello(ClientId::new("b")), source())
            .unwrap();

        controller
            .handle_message(Message::LegacyKill, source())
            .unwrap();

        assert_eq!(controller.phase(), ServicePhase::Terminating);
        assert_eq!(controller.reason(), Some(TerminateReason::OperatorKill));

        controller.finish_termination().unwrap();
        assert_eq!(
            bridge.recorded(),
            vec![BridgeSignal::Activate, BridgeSignal::Deactivate]
        );
    }

    #[test]
    fn test_no_trigger_sends_standdown() {
        let (mut controller, _, bridge) = setup();

        controller
            .begin_termination(TerminateReason::NoTrigger)
            .unwrap();
        controller.finish_termination().unwrap();

        // Never activated, but the counterpart is still told to resume.
        assert_eq!(bridge.recorded(), vec![BridgeSignal::Deactivate]);
    }

    #[test]
    fn test_interrupted_withholds_standdown() {
        let (mut controller, _, bridge) = setup();
        activate(&mut controller);

        controller
            .begin_termination(TerminateReason::Interrupted)
            .unwrap();
        controller.finish_termination().unwrap();

        assert_eq!(controller.phase(), ServicePhase::Terminated);
        assert_eq!(bridge.recorded(), vec![BridgeSignal::Activate]);
    }

    #[test]
    fn test_population_drained_terminates() {
        let (mut controller, _, bridge) = setup();
        activate(&mut controller);
        controller
            .handle_message(Message::Hello(ClientId::new("a")), source())
            .unwrap();
        controller
            .handle_message(Message::Kill(ClientId::new("a")), source())
            .unwrap();

        // Already terminating via the kill; a late supervisor report
        // must not double anything.
        controller.population_drained().unwrap();
        controller.finish_termination().unwrap();

        assert_eq!(
            bridge.recorded(),
            vec![BridgeSignal::Activate, BridgeSignal::Deactivate]
        );
    }

    #[test]
    fn test_population_drained_stale_report_ignored() {
        let (mut controller, _, _) = setup();
        activate(&mut controller);
        controller
            .handle_message(Message::Hello(ClientId::new("late-joiner")), source())
            .unwrap();

        // A drain report raced with the join above; clients exist, so stay up.
        controller.population_drained().unwrap();

        assert_eq!(controller.phase(), ServicePhase::Active);
    }

    #[test]
    fn test_messages_ignored_while_terminating() {
        let (mut controller, registry, bridge) = setup();
        activate(&mut controller);
        controller
            .begin_termination(TerminateReason::OperatorKill)
            .unwrap();
        let before = bridge.recorded().len();

        let trigger = controller.handle_message(Message::Trigger, source()).unwrap();
        let probe = controller.handle_message(Message::Probe, source()).unwrap();
        let hello = controller
            .handle_message(Message::Hello(ClientId::new("late")), source())
            .unwrap();

        assert_eq!(trigger, None);
        assert_eq!(probe, None);
        assert_eq!(hello, None);
        assert!(registry.is_empty());
        assert_eq!(bridge.recorded().len(), before);
    }

    #[test]
    fn test_unknown_message_changes_nothing() {
        let (mut controller, registry, _) = setup();
        activate(&mut controller);

        let reply = controller
            .handle_message(Message::Unknown("|||".to_string()), source())
            .unwrap();

        assert_eq!(reply, None);
        assert!(registry.is_empty());
        assert_eq!(controller.phase(), ServicePhase::Active);
    }
}
