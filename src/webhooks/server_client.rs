//! Queries the validator delegates to the API server
//!
//! The forest can answer most questions, but two need the live cluster:
//! whether a user may administer a namespace, and whether a namespace the
//! forest has not seen yet actually exists.

use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::UserInfo;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::PostParams;
use kube::{Api, Client};
use thiserror::Error;
use tracing::debug;

use crate::crd::META_GROUP;

/// Resource whose update rights make a user an admin of a namespace's subtree
pub const ADMIN_RESOURCE: &str = "hierarchyconfigurations";
/// Verb checked against [`ADMIN_RESOURCE`]
pub const ADMIN_VERB: &str = "update";

#[derive(Error, Debug)]
pub enum ServerClientError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("SubjectAccessReview for {0:?} returned no status")]
    MissingStatus(String),

    #[error("API server unavailable: {0}")]
    Unavailable(String),
}

/// Live cluster queries used while validating a request
#[async_trait]
pub trait ServerClient: Send + Sync {
    /// Whether `user` may administer the subtree rooted at `namespace`
    async fn is_admin(&self, user: &UserInfo, namespace: &str) -> Result<bool, ServerClientError>;

    /// Whether `namespace` exists in the cluster, regardless of what the forest says
    async fn exists(&self, namespace: &str) -> Result<bool, ServerClientError>;
}

/// [`ServerClient`] backed by a kube client
#[derive(Clone)]
pub struct KubeServerClient {
    client: Client,
}

impl KubeServerClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Build the access review asking whether `user` may update the hierarchy of `namespace`
pub fn admin_review(user: &UserInfo, namespace: &str) -> SubjectAccessReview {
    SubjectAccessReview {
        spec: SubjectAccessReviewSpec {
            user: user.username.clone(),
            groups: user.groups.clone(),
            uid: user.uid.clone(),
            extra: user.extra.clone(),
            resource_attributes: Some(ResourceAttributes {
                namespace: Some(namespace.to_string()),
                verb: Some(ADMIN_VERB.to_string()),
                group: Some(META_GROUP.to_string()),
                resource: Some(ADMIN_RESOURCE.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[async_trait]
impl ServerClient for KubeServerClient {
    async fn is_admin(&self, user: &UserInfo, namespace: &str) -> Result<bool, ServerClientError> {
        let api: Api<SubjectAccessReview> = Api::all(self.client.clone());
        let review = api
            .create(&PostParams::default(), &admin_review(user, namespace))
            .await?;

        let allowed = review
            .status
            .map(|s| s.allowed)
            .ok_or_else(|| ServerClientError::MissingStatus(namespace.to_string()))?;

        debug!(
            user = ?user.username,
            namespace = %namespace,
            allowed = allowed,
            "SubjectAccessReview completed"
        );
        Ok(allowed)
    }

    async fn exists(&self, namespace: &str) -> Result<bool, ServerClientError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(namespace).await?.is_some())
    }
}
