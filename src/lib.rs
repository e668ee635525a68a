pub mod config;
pub mod controller;
pub mod crd;
pub mod forest;
pub mod webhooks;

pub use config::{Config, ConfigError, MetaPattern};
pub use controller::{
    Error, Result, default_type_syncers, run_hierarchy_mirror, run_namespace_mirror,
    run_object_mirror,
};
pub use crd::{HierarchyConfiguration, HierarchyConfigurationSpec, MetaKvp};
pub use forest::{Forest, SharedForest, SyncMode, TypeSyncer};
pub use webhooks::{
    DenialCode, HierarchyRequest, KubeServerClient, ServerClient, ServerClientError,
    ValidationResult, Validator, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError,
    run_webhook_server,
};
