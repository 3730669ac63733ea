//! Session storage and liveness bookkeeping.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::ClientId;
use crate::error::WardenError;
use crate::Result;

/// Liveness phase of a single session.
///
/// The grace deadline only exists while the session is in grace, so "not in
/// grace" and "has no deadline" cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Signals are arriving within the heartbeat timeout.
    Alive,
    /// The client went quiet; kept until the deadline in case it returns.
    InGrace {
        /// When the grace window closes and the session may be expired.
        deadline: Instant,
    },
}

impl SessionPhase {
    /// Check if the session is alive (not in grace).
    pub fn is_alive(&self) -> bool {
        matches!(self, SessionPhase::Alive)
    }

    /// Check if the session is in its grace window.
    pub fn is_in_grace(&self) -> bool {
        matches!(self, SessionPhase::InGrace { .. })
    }
}

/// One registered heartbeat client.
#[derive(Debug, Clone)]
pub struct Session {
    /// Stable identity announced by the client.
    pub client_id: ClientId,
    /// Last-seen endpoint; used only for replying, never for identity.
    pub source_addr: SocketAddr,
    /// Monotonic timestamp of the most recent accepted liveness signal.
    pub last_signal_at: Instant,
    /// Current liveness phase.
    pub phase: SessionPhase,
}

impl Session {
    fn new(client_id: ClientId, source_addr: SocketAddr) -> Self {
        Self {
            client_id,
            source_addr,
            last_signal_at: Instant::now(),
            phase: SessionPhase::Alive,
        }
    }

    /// How long this session has gone without a liveness signal, as of `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_signal_at)
    }
}

/// Outcome of a removal.
///
/// `remaining` is counted under the same lock that performed the removal,
/// so "the registry became empty because of this removal" is a fact, not a
/// racy follow-up read. Two racing removals can never both observe
/// [`Removal::drained`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Whether a session was actually removed.
    pub removed: bool,
    /// Sessions remaining after the operation.
    pub remaining: usize,
}

impl Removal {
    /// True when this removal took out the last session.
    pub fn drained(&self) -> bool {
        self.removed && self.remaining == 0
    }
}

/// Thread-safe registry of heartbeat sessions.
///
/// Each operation takes the lock exactly once and is atomic with respect to
/// the others; callers never observe a half-applied transition. The
/// conditional operations ([`mark_grace`](Self::mark_grace),
/// [`expire`](Self::expire)) re-check their preconditions under the lock so
/// the liveness supervisor can act on a stale snapshot without racing an
/// inbound heartbeat.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ClientId, Session>>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register or refresh a session for `client_id`.
    ///
    /// Creates the session (`Alive`, signal stamped now) if absent.
    /// Otherwise updates the source address, stamps `last_signal_at`, and
    /// clears any grace state: a hello or heartbeat always revives a
    /// gracing client immediately.
    ///
    /// Returns a clone of the resulting session and whether it was created.
    pub fn upsert(&self, client_id: &ClientId, addr: SocketAddr) -> Result<(Session, bool)> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| WardenError::LockPoisoned)?;

        match sessions.get_mut(client_id) {
            Some(session) => {
                session.source_addr = addr;
                session.last_signal_at = Instant::now();
                session.phase = SessionPhase::Alive;
                Ok((session.clone(), false))
            }
            None => {
                let session = Session::new(client_id.clone(), addr);
                sessions.insert(client_id.clone(), session.clone());
                Ok((session, true))
            }
        }
    }

    /// Get a clone of the session for `client_id`.
    pub fn get(&self, client_id: &ClientId) -> Result<Option<Session>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| WardenError::LockPoisoned)?;
        Ok(sessions.get(client_id).cloned())
    }

    /// Remove a session unconditionally.
    pub fn remove(&self, client_id: &ClientId) -> Result<Removal> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| WardenError::LockPoisoned)?;

        let removed = sessions.remove(client_id).is_some();
        Ok(Removal {
            removed,
            remaining: sessions.len(),
        })
    }

    /// Transition a session from `Alive` to `InGrace`.
    ///
    /// Declines (returns `Ok(false)`) if the session is gone, already in
    /// grace, or its `last_signal_at` has advanced past `observed_signal_at`,
    /// meaning a heartbeat arrived between the caller's observation and
    /// this call, so the client is not actually silent.
    pub fn mark_grace(
        &self,
        client_id: &ClientId,
        observed_signal_at: Instant,
        deadline: Instant,
    ) -> Result<bool> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| WardenError::LockPoisoned)?;

        let Some(session) = sessions.get_mut(client_id) else {
            return Ok(false);
        };
        if !session.phase.is_alive() || session.last_signal_at > observed_signal_at {
            return Ok(false);
        }

        session.phase = SessionPhase::InGrace { deadline };
        Ok(true)
    }

    /// Remove a session whose grace window has closed.
    ///
    /// Declines if the session is gone, was revived (back to `Alive`), or
    /// its deadline is still in the future as of `now`. The revival check
    /// happens under the registry lock, so a heartbeat that lands between
    /// the supervisor noticing the deadline and calling this can never lose
    /// the session.
    pub fn expire(&self, client_id: &ClientId, now: Instant) -> Result<Removal> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| WardenError::LockPoisoned)?;

        let due = matches!(
            sessions.get(client_id).map(|s| s.phase),
            Some(SessionPhase::InGrace { deadline }) if deadline <= now
        );
        if due {
            sessions.remove(client_id);
        }
        Ok(Removal {
            removed: due,
            remaining: sessions.len(),
        })
    }

    /// Get the number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Check if the registry has no sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone out every session under one read lock.
    ///
    /// The liveness supervisor scans this snapshot and then applies its
    /// decisions through the conditional operations above.
    pub fn snapshot(&self) -> Result<Vec<Session>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| WardenError::LockPoisoned)?;
        Ok(sessions.values().cloned().collect())
    }

    /// Drop all sessions. Used during terminating cleanup.
    pub fn clear(&self) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.clear();
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
