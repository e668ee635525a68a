//! Test fixtures for forests, requests and the API server delegate
//!
//! # Quick Start
//!
//! Forests are described by a string, one character per namespace. The
//! namespace at position `i` is named `'a' + i` and is synced; its character
//! is `-` for a root or the name of its parent:
//! ```rust,ignore
//! let forest = create_forest("-a-c"); // a <- b; c <- d
//! let forest = create_forest("z-a");  // z <- a <- c; b (z never synced)
//! ```
//!
//! The fake server is described the same way: namespaces before the colon
//! pass the admin check, namespaces after it fail the existence check:
//! ```rust,ignore
//! let server = FakeServer::parse("ab:z");
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use hnc_webhook::config::Config;
use hnc_webhook::forest::{Forest, SyncMode, TypeSyncer};
use hnc_webhook::webhooks::{HierarchyRequest, ServerClient, ServerClientError, Validator};
use k8s_openapi::api::authentication::v1::UserInfo;
use kube::core::GroupVersionKind;

// =============================================================================
// Forests
// =============================================================================

/// Build a forest from its string description
pub fn create_forest(desc: &str) -> Forest {
    let mut forest = Forest::new();
    for (i, ch) in desc.chars().enumerate() {
        let name = ns_name(i);
        forest.set_exists(&name);
        if ch != '-' {
            forest.set_parent(&name, Some(&ch.to_string()));
        }
    }
    forest
}

/// Name of the namespace at position `i` of a forest description
pub fn ns_name(i: usize) -> String {
    char::from(b'a' + i as u8).to_string()
}

pub fn secret_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("", "v1", "Secret")
}

/// Register Secrets as a propagated kind
pub fn propagate_secrets(forest: &mut Forest) {
    forest.add_type_syncer(TypeSyncer::new(secret_gvk(), SyncMode::Propagate));
}

/// Create a source Secret in `namespace`
pub fn create_secret(forest: &mut Forest, name: &str, namespace: &str) {
    forest.set_source_object(namespace, &secret_gvk(), name, false);
}

/// Create a source Secret in `namespace` marked propagate-none
pub fn create_propagate_none_secret(forest: &mut Forest, name: &str, namespace: &str) {
    forest.set_source_object(namespace, &secret_gvk(), name, true);
}

// =============================================================================
// Fake API server
// =============================================================================

/// ServerClient double answering from fixed sets
#[derive(Clone, Debug, Default)]
pub struct FakeServer {
    admin_all: bool,
    admins: BTreeSet<String>,
    missing: BTreeSet<String>,
    failing: bool,
}

impl FakeServer {
    /// Parse `admins:missing`; the colon is optional
    pub fn parse(desc: &str) -> Self {
        let (admins, missing) = desc.split_once(':').unwrap_or((desc, ""));
        Self {
            admins: admins.chars().map(|c| c.to_string()).collect(),
            missing: missing.chars().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    /// A server on which the user administers every namespace
    pub fn admin_all() -> Self {
        Self {
            admin_all: true,
            ..Default::default()
        }
    }

    pub fn with_missing<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing.extend(names.into_iter().map(Into::into));
        self
    }

    /// Make every query fail
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

#[async_trait]
impl ServerClient for FakeServer {
    async fn is_admin(&self, _user: &UserInfo, namespace: &str) -> Result<bool, ServerClientError> {
        if self.failing {
            return Err(ServerClientError::Unavailable("fake server down".to_string()));
        }
        Ok(self.admin_all || self.admins.contains(namespace))
    }

    async fn exists(&self, namespace: &str) -> Result<bool, ServerClientError> {
        if self.failing {
            return Err(ServerClientError::Unavailable("fake server down".to_string()));
        }
        Ok(!self.missing.contains(namespace))
    }
}

// =============================================================================
// Requests and validators
// =============================================================================

pub fn user(name: &str) -> UserInfo {
    UserInfo {
        username: Some(name.to_string()),
        ..Default::default()
    }
}

/// Request moving `namespace` under `parent` (empty for root) on behalf of "jen"
pub fn request(namespace: &str, parent: &str) -> HierarchyRequest {
    HierarchyRequest::new(namespace)
        .with_parent(parent)
        .with_user(user("jen"))
}

pub fn create_validator(forest: Forest, server: FakeServer) -> Validator {
    create_validator_with_config(forest, server, Config::default())
}

pub fn create_validator_with_config(forest: Forest, server: FakeServer, config: Config) -> Validator {
    Validator::new(forest.shared(), Arc::new(server), Arc::new(config))
}
