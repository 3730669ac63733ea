//! Service phase machine.

/// Represents the lifecycle phase of the warden process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServicePhase {
    /// Waiting for a trigger; no client tracking yet.
    #[default]
    Dormant,
    /// Tracking heartbeat clients.
    Active,
    /// Winding down: sessions cleared, handoff pending.
    Terminating,
    /// Fully stopped and cannot be restarted.
    Terminated,
}

impl ServicePhase {
    /// Check if transition to target phase is valid.
    ///
    /// Valid transitions:
    /// - Dormant -> Active
    /// - Dormant -> Terminating
    /// - Active -> Terminating
    /// - Terminating -> Terminated
    pub fn can_transition_to(&self, target: ServicePhase) -> bool {
        use ServicePhase::*;
        matches!(
            (*self, target),
            (Dormant, Active) | (Dormant, Terminating) | (Active, Terminating) | (Terminating, Terminated)
        )
    }

    /// Attempt to transition to a new phase.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: ServicePhase) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::WardenError::InvalidPhaseTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal phase (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServicePhase::Terminated)
    }

    /// Check if the warden is tracking clients in this phase.
    pub fn tracks_clients(&self) -> bool {
        matches!(self, ServicePhase::Active)
    }
}
