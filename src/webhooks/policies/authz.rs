//! Authorization policy
//!
//! Moving a namespace needs admin rights on the most recent common ancestor
//! of its current and new positions. When the two positions share no
//! ancestor, the caller needs admin rights on both the current root and the
//! new root. Roots whose hierarchy is managed outside HNC are not checked.

use k8s_openapi::api::authentication::v1::UserInfo;
use tracing::debug;

use super::{DenialCode, ValidationResult, delegate_failure, reasons};
use crate::forest::Forest;
use crate::webhooks::server_client::ServerClient;

pub async fn validate_authz(
    forest: &Forest,
    server: &dyn ServerClient,
    user: &UserInfo,
    namespace: &str,
    current_parent: Option<&str>,
    new_parent: Option<&str>,
) -> ValidationResult {
    let current = match resolve_current_chain(forest, server, namespace, current_parent).await {
        Ok(chain) => chain,
        Err(denied) => return denied,
    };
    let new = match new_parent {
        Some(parent) => match resolve_chain(forest, parent, namespace) {
            Ok(chain) => chain,
            Err(denied) => return denied,
        },
        None => Vec::new(),
    };

    for admin_of in required_admins(forest, &current, &new) {
        debug!(namespace = %namespace, check = %admin_of, "Checking admin rights");
        match server.is_admin(user, &admin_of).await {
            Ok(true) => {}
            Ok(false) => {
                return ValidationResult::denied(
                    DenialCode::Unauthorized,
                    reasons::UNAUTHORIZED,
                    &format!(
                        "User {:?} is not authorized to modify the subtree of {:?}, which is required to change the parent of {:?}",
                        user.username.as_deref().unwrap_or("<unknown>"),
                        admin_of,
                        namespace
                    ),
                );
            }
            Err(e) => return delegate_failure(&admin_of, &e),
        }
    }

    ValidationResult::allowed()
}

/// Ancestors of `namespace` starting at its current parent.
///
/// A parent the API server no longer has leaves the namespace an orphan, so
/// there is nothing on the current side to authorize.
async fn resolve_current_chain(
    forest: &Forest,
    server: &dyn ServerClient,
    namespace: &str,
    current_parent: Option<&str>,
) -> Result<Vec<String>, ValidationResult> {
    let Some(parent) = current_parent else {
        return Ok(Vec::new());
    };

    if !forest.exists(parent) {
        return match server.exists(parent).await {
            Ok(true) => Err(ValidationResult::denied(
                DenialCode::ServiceUnavailable,
                reasons::PARENT_NOT_RECONCILED,
                &format!(
                    "The current parent {:?} of {:?} exists but HNC has not reconciled it yet - please try again in a few moments.",
                    parent, namespace
                ),
            )),
            Ok(false) => {
                debug!(namespace = %namespace, parent = %parent, "Current parent is missing, treating namespace as a root");
                Ok(Vec::new())
            }
            Err(e) => Err(delegate_failure(parent, &e)),
        };
    }

    resolve_chain(forest, parent, namespace)
}

/// Ancestry of `start`, cut off where it reaches `target`.
///
/// Every namespace above `start` must be synced, and the chain must end in a
/// root unless the loop it runs into passes through `target`.
fn resolve_chain(forest: &Forest, start: &str, target: &str) -> Result<Vec<String>, ValidationResult> {
    let ancestry = forest.ancestry(start);

    if ancestry.cycle && !ancestry.contains(target) {
        return Err(ValidationResult::denied(
            DenialCode::Forbidden,
            reasons::ANCESTOR_CYCLE,
            &format!(
                "The ancestors of {:?} form a cycle ({}); resolve the cycle before changing the hierarchy of {:?}",
                start,
                ancestry.names.join(" -> "),
                target
            ),
        ));
    }

    let chain: Vec<String> = ancestry
        .names
        .into_iter()
        .take_while(|nm| nm != target)
        .collect();

    if let Some(missing) = chain.iter().skip(1).find(|nm| !forest.exists(nm)) {
        return Err(ValidationResult::denied(
            DenialCode::Forbidden,
            reasons::MISSING_ANCESTOR,
            &format!(
                "The ancestor {:?} of {:?} is missing or has not been reconciled; fix the hierarchy of {:?} before changing the hierarchy of {:?}",
                missing, start, start, target
            ),
        ));
    }

    Ok(chain)
}

/// Namespaces the caller must administer, in check order
fn required_admins(forest: &Forest, current: &[String], new: &[String]) -> Vec<String> {
    let needed: Vec<&String> = match current.iter().find(|nm| new.contains(nm)) {
        Some(mrca) => vec![mrca],
        None => current.last().into_iter().chain(new.last()).collect(),
    };

    let mut admins: Vec<String> = Vec::new();
    for nm in needed {
        let external = forest.get(nm).is_some_and(|ns| ns.is_external());
        if !external && !admins.contains(nm) {
            admins.push(nm.clone());
        }
    }
    admins
}
