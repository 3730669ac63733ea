//! Error types for wake-warden.

use thiserror::Error;

/// Main error type for wake-warden operations.
#[derive(Error, Debug)]
pub enum WardenError {
    /// Transport I/O error on the listening socket.
    ///
    /// Fatal to the current phase loop; the server proceeds to cleanup.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal registry lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// Invalid service phase transition attempted.
    #[error("invalid phase transition from {from:?} to {to:?}")]
    InvalidPhaseTransition {
        from: crate::lifecycle::ServicePhase,
        to: crate::lifecycle::ServicePhase,
    },
}

/// Convenience Result type for wake-warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ServicePhase;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: WardenError = io_err.into();
        assert!(matches!(err, WardenError::Io(_)));
        assert!(err.to_string().contains("transport error"));
    }

    #[test]
    fn test_lock_poisoned_display() {
        let err = WardenError::LockPoisoned;
        assert!(err.to_string().contains("poisoned"));
    }

    #[test]
    fn test_phase_transition_display() {
        let err = WardenError::InvalidPhaseTransition {
            from: ServicePhase::Terminated,
            to: ServicePhase::Active,
        };
        assert!(err.to_string().contains("Terminated"));
        assert!(err.to_string().contains("Active"));
    }
}
