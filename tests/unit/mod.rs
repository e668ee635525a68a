//! Unit tests for the hierarchy admission webhook
//!
//! This module contains unit tests for:
//! - Forest graph queries
//! - Structural checks (exclusion, reconciliation, existence, cycles)
//! - External management
//! - Authorization decisions
//! - Propagation conflicts
//! - Managed labels and annotations
//! - Snapshot isolation between decisions and forest writes

#[path = "../common/mod.rs"]
mod common;

mod conflicts;
mod external;
mod structure;
