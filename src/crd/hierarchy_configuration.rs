use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group that owns the hierarchy resources and the reserved metadata prefix
pub const META_GROUP: &str = "hnc.x-k8s.io";

/// API version served for `HierarchyConfiguration`
pub const API_VERSION: &str = "v1alpha2";

/// The only permitted name of a `HierarchyConfiguration` in a namespace
pub const SINGLETON: &str = "hierarchy";

/// Annotation naming the external tool that owns a namespace's hierarchy
pub const ANNOTATION_MANAGED_BY: &str = "hnc.x-k8s.io/managed-by";

/// Annotation marking an object as a terminal copy that is not propagated further
pub const ANNOTATION_PROPAGATE_NONE: &str = "propagate.hnc.x-k8s.io/none";

/// Label HNC puts on propagated copies, naming the namespace of the original
pub const LABEL_INHERITED_FROM: &str = "hnc.x-k8s.io/inherited-from";

/// Label placed by HNC on namespaces it includes in hierarchy management
pub const LABEL_INCLUDED_NAMESPACE: &str = "hnc.x-k8s.io/included-namespace";

/// HierarchyConfiguration declares a namespace's parent and the metadata HNC
/// should manage on it and its descendants.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "hnc.x-k8s.io",
    version = "v1alpha2",
    kind = "HierarchyConfiguration",
    plural = "hierarchyconfigurations",
    namespaced,
    status = "HierarchyConfigurationStatus",
    printcolumn = r#"{"name":"Parent", "type":"string", "jsonPath":".spec.parent"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyConfigurationSpec {
    /// Name of the parent namespace; empty for a root
    #[serde(default)]
    pub parent: String,

    /// Labels propagated to this namespace and all its descendants
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<MetaKvp>,

    /// Annotations propagated to this namespace and all its descendants
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<MetaKvp>,

    /// Whether subnamespaces may be deleted along with this namespace
    #[serde(default)]
    pub allow_cascading_deletion: bool,
}

/// A single managed label or annotation
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct MetaKvp {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl MetaKvp {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Observed state of a HierarchyConfiguration
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyConfigurationStatus {
    /// Names of the namespaces currently naming this one as parent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

impl HierarchyConfigurationSpec {
    /// The proposed parent, or `None` when the namespace should be a root
    pub fn parent(&self) -> Option<&str> {
        if self.parent.is_empty() {
            None
        } else {
            Some(self.parent.as_str())
        }
    }
}
