//! External management policy
//!
//! A namespace whose hierarchy belongs to another tool can only be detached
//! to a root through HNC. Internal namespaces may still pick it as a parent.

use super::{DenialCode, ValidationResult, reasons};
use crate::forest::Forest;

pub fn validate_external(forest: &Forest, namespace: &str, parent: Option<&str>) -> ValidationResult {
    let Some(parent) = parent else {
        return ValidationResult::allowed();
    };

    match forest.get(namespace) {
        Some(ns) if ns.is_external() => ValidationResult::denied(
            DenialCode::Forbidden,
            reasons::EXTERNALLY_MANAGED,
            &format!(
                "Namespace {:?} is managed by {:?}, not HNC, so it cannot be given the parent {:?}; change its hierarchy through {:?} instead",
                namespace,
                ns.manager(),
                parent,
                ns.manager()
            ),
        ),
        _ => ValidationResult::allowed(),
    }
}
