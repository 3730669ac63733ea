//! Service lifecycle module.
//!
//! This module owns the dormant/active/terminating phase machine and the
//! dispatch policy that decides what each inbound message does in each
//! phase.

mod controller;
mod phase;

pub use controller::{LifecycleController, TerminateReason};
pub use phase::ServicePhase;
