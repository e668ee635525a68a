//! Propagation conflict policy

use super::{DenialCode, ValidationResult, reasons};
use crate::forest::Forest;

/// Deny a move that would make propagated objects overwrite existing ones
pub fn validate_conflicts(forest: &Forest, namespace: &str, parent: Option<&str>) -> ValidationResult {
    let conflicts = forest.conflicts(namespace, parent);
    if conflicts.is_empty() {
        return ValidationResult::allowed();
    }

    let list = conflicts
        .iter()
        .map(|c| format!("  * {}", c))
        .collect::<Vec<_>>()
        .join("\n");

    ValidationResult::denied(
        DenialCode::Conflict,
        reasons::OBJECT_CONFLICT,
        &format!(
            "Cannot move {:?} under {:?}: {} existing object(s) would be overwritten by propagated copies:\n{}\nRename or remove the conflicting objects first.",
            namespace,
            parent.unwrap_or_default(),
            conflicts.len(),
            list
        ),
    )
}
