//! # wake-warden
//!
//! UDP heartbeat warden with a wake/sleep lifecycle handoff.
//!
//! The warden guards a machine that should stay awake only while someone
//! is using it. It starts dormant on a UDP port; a trigger message wakes
//! it into an active phase where clients announce themselves and keep
//! their sessions alive with heartbeats. A client that goes silent gets a
//! bounded grace window before it is dropped, and once the last client is
//! gone the warden stands down and hands control back through a bridge
//! script.
//!
//! ## Features
//!
//! - **Two-phase lifecycle**: dormant until triggered, active until drained
//! - **Two-stage failure detection**: heartbeat timeout plus a grace window
//! - **Legacy senders**: no-id heartbeats get a stable synthesized identity
//! - **Injectable handoff**: lifecycle signals go through a [`Bridge`] trait
//!
//! ## Quick Start
//!
//! ```no_run
//! use wake_warden::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Initialize logging
//!     wake_warden::logging::try_init().ok();
//!
//!     // Default settings: 0.0.0.0:46317, 15s heartbeat timeout,
//!     // 300s grace window, 180s dormant budget
//!     let settings = Config::default().to_settings()?;
//!
//!     let server = Server::bind(settings).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod diag;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod session;
pub mod supervisor;

// Re-export commonly used types
pub use bridge::{Bridge, BridgeSignal, NullBridge, RecordingBridge, ScriptBridge};
pub use config::Config;
pub use error::{Result, WardenError};
pub use lifecycle::{LifecycleController, ServicePhase, TerminateReason};
pub use protocol::{Message, Reply};
pub use server::{Server, WardenSettings};
pub use session::{ClientId, Session, SessionPhase, SessionRegistry};
pub use supervisor::{LivenessPolicy, Supervisor};
