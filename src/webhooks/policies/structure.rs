//! Structural policies
//!
//! - Excluded namespaces can be neither parent nor child
//! - The target namespace must have been reconciled
//! - The proposed parent must exist, distinguishing "missing" from "not yet reconciled"
//! - The proposed parent must not be the namespace itself or one of its descendants

use tracing::debug;

use super::{DenialCode, ValidationResult, delegate_failure, reasons};
use crate::forest::Forest;
use crate::webhooks::server_client::ServerClient;

/// Deny any edge touching an excluded namespace
pub fn validate_excluded(forest: &Forest, namespace: &str, parent: Option<&str>) -> ValidationResult {
    if forest.is_excluded(namespace) {
        return ValidationResult::denied(
            DenialCode::Forbidden,
            reasons::EXCLUDED_NAMESPACE,
            &format!(
                "Namespace {:?} is excluded from HNC and cannot be a child of another namespace",
                namespace
            ),
        );
    }

    if let Some(parent) = parent
        && forest.is_excluded(parent)
    {
        return ValidationResult::denied(
            DenialCode::Forbidden,
            reasons::EXCLUDED_NAMESPACE,
            &format!(
                "Cannot set the parent of {:?} to {:?}: {:?} is an excluded namespace",
                namespace, parent, parent
            ),
        );
    }

    ValidationResult::allowed()
}

/// Deny until the forest mirror has observed the target namespace
pub fn validate_reconciled(forest: &Forest, namespace: &str) -> ValidationResult {
    if !forest.exists(namespace) {
        return ValidationResult::denied(
            DenialCode::ServiceUnavailable,
            reasons::NAMESPACE_NOT_RECONCILED,
            &format!(
                "HNC has not reconciled namespace {:?} yet - please try again in a few moments.",
                namespace
            ),
        );
    }
    ValidationResult::allowed()
}

/// Check that `parent` exists and would not close a cycle
pub async fn validate_parent(
    forest: &Forest,
    server: &dyn ServerClient,
    namespace: &str,
    parent: &str,
) -> ValidationResult {
    if !forest.exists(parent) {
        debug!(parent = %parent, "Proposed parent not in forest, asking the API server");
        return match server.exists(parent).await {
            Ok(true) => ValidationResult::denied(
                DenialCode::ServiceUnavailable,
                reasons::PARENT_NOT_RECONCILED,
                &format!(
                    "The requested parent {:?} exists but HNC has not reconciled it yet - please try again in a few moments.",
                    parent
                ),
            ),
            Ok(false) => ValidationResult::denied(
                DenialCode::Forbidden,
                reasons::PARENT_NOT_FOUND,
                &format!("The requested parent {:?} does not exist", parent),
            ),
            Err(e) => delegate_failure(parent, &e),
        };
    }

    validate_acyclic(forest, namespace, parent)
}

/// Deny a parent that is the namespace itself or one of its descendants.
///
/// Runs even when the parent is unchanged, since the forest may already hold
/// an edge that was written while admission was unavailable.
pub fn validate_acyclic(forest: &Forest, namespace: &str, parent: &str) -> ValidationResult {
    if namespace == parent {
        return ValidationResult::denied(
            DenialCode::Forbidden,
            reasons::ILLEGAL_PARENT,
            &format!(
                "{:?} is an illegal parent: a namespace cannot be its own parent",
                parent
            ),
        );
    }

    if forest.would_cycle(namespace, parent) {
        let mut cycle = vec![namespace.to_string()];
        cycle.extend(
            forest
                .ancestry(parent)
                .names
                .into_iter()
                .take_while(|nm| nm != namespace),
        );
        cycle.push(namespace.to_string());
        return ValidationResult::denied(
            DenialCode::Forbidden,
            reasons::ILLEGAL_PARENT,
            &format!(
                "{:?} is an illegal parent of {:?}: it is a descendant of {:?} and the change would create the cycle {}",
                parent,
                namespace,
                namespace,
                cycle.join(" -> ")
            ),
        );
    }

    ValidationResult::allowed()
}
