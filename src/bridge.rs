//! Lifecycle bridge to the counterpart controller.
//!
//! The warden never talks to the machine it guards directly; it hands
//! lifecycle signals to a bridge, and the default bridge runs an external
//! script. Mode `1` means the warden has taken over tracking, mode `2`
//! means it is done and the counterpart may resume.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

/// Signal forwarded across the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeSignal {
    /// The warden accepted a trigger and is now tracking clients.
    Activate,
    /// The warden finished its run; control returns to the counterpart.
    Deactivate,
}

impl BridgeSignal {
    /// Mode argument handed to the bridge script.
    pub fn mode_arg(&self) -> &'static str {
        match self {
            BridgeSignal::Activate => "1",
            BridgeSignal::Deactivate => "2",
        }
    }
}

/// Destination for lifecycle signals.
///
/// Implementations must tolerate being called from the server task; keep
/// `notify` quick and push real work into a spawned process or task.
pub trait Bridge: Send + Sync {
    /// Forward a lifecycle signal. Errors are reported to the caller but
    /// never abort the lifecycle itself.
    fn notify(&self, signal: BridgeSignal) -> io::Result<()>;
}

/// Bridge that launches an external script with the signal mode as its
/// only argument.
///
/// The script is fire-and-forget: the warden does not wait for it or
/// inspect its exit status, matching how little it can do about a failed
/// handoff anyway. The runtime reaps the child in the background.
pub struct ScriptBridge {
    script: PathBuf,
}

impl ScriptBridge {
    /// Create a bridge that runs `script`.
    pub fn new(script: PathBuf) -> Self {
        Self { script }
    }
}

impl Bridge for ScriptBridge {
    fn notify(&self, signal: BridgeSignal) -> io::Result<()> {
        debug!(script = %self.script.display(), mode = signal.mode_arg(), "invoking bridge script");
        tokio::process::Command::new(&self.script)
            .arg(signal.mode_arg())
            .spawn()?;
        Ok(())
    }
}

/// Bridge that drops every signal.
///
/// Used when no bridge script is configured; the warden then only logs
/// its lifecycle.
pub struct NullBridge;

impl Bridge for NullBridge {
    fn notify(&self, signal: BridgeSignal) -> io::Result<()> {
        debug!(?signal, "no bridge configured; signal dropped");
        Ok(())
    }
}

/// Bridge that records every signal it receives.
///
/// Useful in tests and dry runs to assert on lifecycle behavior without
/// touching the system.
#[derive(Default)]
pub struct RecordingBridge {
    signals: Mutex<Vec<BridgeSignal>>,
}

impl RecordingBridge {
    /// Create an empty recording bridge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of every signal received so far, in order.
    pub fn recorded(&self) -> Vec<BridgeSignal> {
        self.signals.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Bridge for RecordingBridge {
    fn notify(&self, signal: BridgeSignal) -> io::Result<()> {
        if let Ok(mut signals) = self.signals.lock() {
            signals.push(signal);
        }
        Ok(())
    }
}
