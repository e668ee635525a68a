//! Admission policies for HierarchyConfiguration changes
//!
//! Each policy module exports a `validate_*` function that checks one rule
//! and returns a [`ValidationResult`]. The validator runs them cheapest first:
//!
//! - Managed metadata (pure, configuration only)
//! - Structure (forest lookups, one existence check)
//! - External management (forest lookup)
//! - Authorization (delegated admin checks)
//! - Conflicts (subtree and ancestor scan)

pub mod authz;
pub mod conflicts;
pub mod external;
pub mod metadata;
pub mod structure;

pub use authz::validate_authz;
pub use conflicts::validate_conflicts;
pub use external::validate_external;
pub use metadata::validate_managed_metadata;
pub use structure::{validate_acyclic, validate_excluded, validate_parent, validate_reconciled};

use std::fmt;

use super::server_client::ServerClientError;

/// Machine-readable denial reasons
pub mod reasons {
    pub const MALFORMED_REQUEST: &str = "MalformedRequest";
    pub const INVALID_MANAGED_METADATA: &str = "InvalidManagedMetadata";
    pub const EXCLUDED_NAMESPACE: &str = "ExcludedNamespace";
    pub const NAMESPACE_NOT_RECONCILED: &str = "NamespaceNotReconciled";
    pub const PARENT_NOT_RECONCILED: &str = "ParentNotReconciled";
    pub const PARENT_NOT_FOUND: &str = "ParentNotFound";
    pub const ILLEGAL_PARENT: &str = "IllegalParent";
    pub const EXTERNALLY_MANAGED: &str = "ExternallyManaged";
    pub const UNAUTHORIZED: &str = "Unauthorized";
    pub const MISSING_ANCESTOR: &str = "MissingAncestor";
    pub const ANCESTOR_CYCLE: &str = "AncestorCycle";
    pub const AUTHORIZATION_CHECK_FAILED: &str = "AuthorizationCheckFailed";
    pub const OBJECT_CONFLICT: &str = "ObjectConflict";
}

/// Category of a denial, mapped onto an HTTP status for the admission response
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DenialCode {
    /// The request itself is malformed or asks for unmanageable metadata
    BadRequest,
    /// The caller lacks admin rights on a namespace the change affects
    Unauthorized,
    /// The change is structurally illegal
    Forbidden,
    /// Propagated objects would collide
    Conflict,
    /// Something needed for the decision is not ready yet; retry later
    ServiceUnavailable,
}

impl DenialCode {
    pub fn http_status(self) -> u16 {
        match self {
            DenialCode::BadRequest => 400,
            DenialCode::Unauthorized => 401,
            DenialCode::Forbidden => 403,
            DenialCode::Conflict => 409,
            DenialCode::ServiceUnavailable => 503,
        }
    }

    /// Whether resubmitting the same request later may succeed
    pub fn is_retryable(self) -> bool {
        matches!(self, DenialCode::ServiceUnavailable)
    }
}

impl fmt::Display for DenialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialCode::BadRequest => write!(f, "BadRequest"),
            DenialCode::Unauthorized => write!(f, "Unauthorized"),
            DenialCode::Forbidden => write!(f, "Forbidden"),
            DenialCode::Conflict => write!(f, "Conflict"),
            DenialCode::ServiceUnavailable => write!(f, "ServiceUnavailable"),
        }
    }
}

/// Result of a policy validation
#[derive(Clone, Debug)]
pub struct ValidationResult {
    pub allowed: bool,
    pub code: Option<DenialCode>,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            code: None,
            reason: None,
            message: None,
        }
    }

    pub fn denied(code: DenialCode, reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            code: Some(code),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }

    /// HTTP status of the decision, 0 when allowed
    pub fn status_code(&self) -> u16 {
        self.code.map(DenialCode::http_status).unwrap_or(0)
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

/// Denial for a delegate query that failed, as opposed to answering "no"
pub(crate) fn delegate_failure(namespace: &str, err: &ServerClientError) -> ValidationResult {
    ValidationResult::denied(
        DenialCode::ServiceUnavailable,
        reasons::AUTHORIZATION_CHECK_FAILED,
        &format!(
            "Could not check namespace {:?} with the API server ({}); please try again in a few moments.",
            namespace, err
        ),
    )
}
