//! Admission webhook for HierarchyConfiguration validation
//!
//! This module implements a ValidatingAdmissionWebhook that rejects hierarchy
//! changes which are structurally illegal, unauthorized, or would make
//! propagated objects collide.
//!
//! Checks run in order and stop at the first denial:
//! - Managed metadata (labels/annotations HNC may propagate)
//! - Structure (exclusion, reconciliation, parent existence, cycles)
//! - External management
//! - Authorization (delegated to the API server)
//! - Propagation conflicts

pub mod policies;
mod server;
pub mod server_client;
pub mod validator;

pub use policies::{DenialCode, ValidationResult};
pub use server::{
    VALIDATE_HIERARCHY_PATH, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError,
    run_webhook_server,
};
pub use server_client::{KubeServerClient, ServerClient, ServerClientError};
pub use validator::{HierarchyRequest, Validator};
