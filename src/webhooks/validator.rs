//! Admission decisions for HierarchyConfiguration changes
//!
//! The [`Validator`] runs the policies in `policies` against a consistent
//! snapshot of the forest: it takes one read guard and holds it until the
//! decision is made, including across delegate calls.

use std::sync::Arc;

use k8s_openapi::api::authentication::v1::UserInfo;
use kube::ResourceExt;
use tracing::{debug, info};

use super::policies::{
    ValidationResult, validate_acyclic, validate_authz, validate_conflicts, validate_excluded,
    validate_external, validate_managed_metadata, validate_parent, validate_reconciled,
};
use super::server_client::ServerClient;
use crate::config::Config;
use crate::crd::{HierarchyConfiguration, HierarchyConfigurationSpec, MetaKvp, SINGLETON};
use crate::forest::SharedForest;

/// A proposed hierarchy change, decoded from the wire
#[derive(Clone, Debug, Default)]
pub struct HierarchyRequest {
    /// Namespace whose hierarchy is being changed
    pub namespace: String,
    /// Proposed parent, labels and annotations
    pub spec: HierarchyConfigurationSpec,
    pub user: UserInfo,
}

impl HierarchyRequest {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.spec.parent = parent.into();
        self
    }

    pub fn with_labels(mut self, labels: Vec<MetaKvp>) -> Self {
        self.spec.labels = labels;
        self
    }

    pub fn with_annotations(mut self, annotations: Vec<MetaKvp>) -> Self {
        self.spec.annotations = annotations;
        self
    }

    pub fn with_user(mut self, user: UserInfo) -> Self {
        self.user = user;
        self
    }

    /// Build a request from a decoded HierarchyConfiguration.
    ///
    /// The object must use the singleton name and carry a namespace, either on
    /// itself or on the enclosing admission request.
    pub fn from_object(
        hc: &HierarchyConfiguration,
        request_namespace: Option<&str>,
        user: UserInfo,
    ) -> Result<Self, String> {
        let name = hc.name_any();
        if name != SINGLETON {
            return Err(format!(
                "HierarchyConfiguration must be named {:?}, not {:?}",
                SINGLETON, name
            ));
        }

        let namespace = hc
            .namespace()
            .or_else(|| request_namespace.map(str::to_string))
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| "HierarchyConfiguration has no namespace".to_string())?;

        Ok(Self {
            namespace,
            spec: hc.spec.clone(),
            user,
        })
    }
}

/// Decides whether a hierarchy change may be admitted
#[derive(Clone)]
pub struct Validator {
    forest: SharedForest,
    server: Arc<dyn ServerClient>,
    config: Arc<Config>,
}

/// Return early from `handle` with the first denial
macro_rules! check {
    ($ns:expr, $name:literal, $result:expr) => {{
        let result = $result;
        if !result.allowed {
            debug!(
                namespace = %$ns,
                check = $name,
                reason = %result.reason(),
                "Check denied request"
            );
            return result;
        }
        debug!(namespace = %$ns, check = $name, "Check passed");
    }};
}

impl Validator {
    pub fn new(forest: SharedForest, server: Arc<dyn ServerClient>, config: Arc<Config>) -> Self {
        Self {
            forest,
            server,
            config,
        }
    }

    pub fn forest(&self) -> &SharedForest {
        &self.forest
    }

    /// Decide on one request
    pub async fn handle(&self, req: &HierarchyRequest) -> ValidationResult {
        let result = self.decide(req).await;
        if result.allowed {
            info!(namespace = %req.namespace, parent = %req.spec.parent, "Hierarchy change allowed");
        } else {
            info!(
                namespace = %req.namespace,
                parent = %req.spec.parent,
                code = result.status_code(),
                reason = %result.reason(),
                "Hierarchy change denied"
            );
        }
        result
    }

    async fn decide(&self, req: &HierarchyRequest) -> ValidationResult {
        let ns = req.namespace.as_str();
        let new_parent = req.spec.parent();

        check!(
            ns,
            "managed-metadata",
            validate_managed_metadata(&self.config, &req.spec.labels, &req.spec.annotations)
        );

        let forest = self.forest.read().await;

        check!(ns, "excluded", validate_excluded(&forest, ns, new_parent));
        check!(ns, "reconciled", validate_reconciled(&forest, ns));

        let current_parent = forest.get(ns).and_then(|n| n.parent());
        if current_parent == new_parent {
            if let Some(parent) = new_parent {
                check!(ns, "acyclic", validate_acyclic(&forest, ns, parent));
            }
            debug!(namespace = %ns, "Parent unchanged");
            return ValidationResult::allowed();
        }

        if let Some(parent) = new_parent {
            check!(
                ns,
                "parent",
                validate_parent(&forest, self.server.as_ref(), ns, parent).await
            );
        }
        check!(ns, "external", validate_external(&forest, ns, new_parent));
        check!(
            ns,
            "authz",
            validate_authz(
                &forest,
                self.server.as_ref(),
                &req.user,
                ns,
                current_parent,
                new_parent
            )
            .await
        );
        check!(ns, "conflicts", validate_conflicts(&forest, ns, new_parent));

        ValidationResult::allowed()
    }
}
