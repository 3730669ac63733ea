//! Session tracking module.
//!
//! This module provides types and utilities for tracking heartbeat clients,
//! including client identification, liveness phases, and storage.

mod id;
mod registry;

pub use id::ClientId;
pub use registry::{Removal, Session, SessionPhase, SessionRegistry};
