//! Forest mirror
//!
//! Watches namespaces, HierarchyConfigurations and every propagated kind, and
//! folds each event into the shared forest. The write lock is taken once per
//! received event and never held across I/O.
//!
//! A watch relist (`Init` .. `InitDone`) replaces the mirror's view wholesale.
//! Whatever the forest still holds that was not re-announced during the relist
//! was deleted while the watch was down, and is dropped at `InitDone`.

use std::collections::BTreeSet;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::runtime::watcher::Event;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, error, info, warn};

use super::error::{Error, Result};
use crate::crd::{
    ANNOTATION_MANAGED_BY, ANNOTATION_PROPAGATE_NONE, HierarchyConfiguration, LABEL_INHERITED_FROM,
    META_GROUP, SINGLETON,
};
use crate::forest::{SharedForest, SyncMode, SyncedObject, TypeSyncer};

/// Kinds propagated out of the box
pub fn default_type_syncers() -> Vec<TypeSyncer> {
    vec![
        TypeSyncer::new(gvk_of::<Role>(), SyncMode::Propagate),
        TypeSyncer::new(gvk_of::<RoleBinding>(), SyncMode::Propagate),
    ]
}

fn gvk_of<K: Resource<DynamicType = ()>>() -> GroupVersionKind {
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

/// External manager named by a namespace's annotations, empty when HNC owns it
pub fn manager_of(ns: &Namespace) -> String {
    match ns.annotations().get(ANNOTATION_MANAGED_BY) {
        Some(manager) if manager != META_GROUP => manager.clone(),
        _ => String::new(),
    }
}

/// Keys announced during the current watch relist, if one is in progress
#[derive(Debug)]
pub struct Relist<K> {
    seen: Option<BTreeSet<K>>,
}

impl<K> Default for Relist<K> {
    fn default() -> Self {
        Self { seen: None }
    }
}

impl<K: Ord> Relist<K> {
    fn start(&mut self) {
        self.seen = Some(BTreeSet::new());
    }

    fn observe(&mut self, key: K) {
        if let Some(seen) = self.seen.as_mut() {
            seen.insert(key);
        }
    }

    /// Keys seen since `Init`; `None` when no relist was started
    fn finish(&mut self) -> Option<BTreeSet<K>> {
        self.seen.take()
    }

    pub fn in_progress(&self) -> bool {
        self.seen.is_some()
    }
}

/// Fold one namespace watch event into the forest
pub async fn apply_namespace_event(
    forest: &SharedForest,
    relist: &mut Relist<String>,
    event: Event<Namespace>,
) -> Result<()> {
    match event {
        Event::Apply(ns) | Event::InitApply(ns) => {
            let name = ns
                .metadata
                .name
                .as_deref()
                .ok_or(Error::MissingObjectKey(".metadata.name"))?;
            let manager = manager_of(&ns);
            relist.observe(name.to_string());
            let mut forest = forest.write().await;
            forest.set_exists(name);
            forest.set_manager(name, &manager);
            debug!(namespace = %name, manager = %manager, "Namespace synced");
        }
        Event::Delete(ns) => {
            let name = ns
                .metadata
                .name
                .as_deref()
                .ok_or(Error::MissingObjectKey(".metadata.name"))?;
            forest.write().await.unset_exists(name);
            debug!(namespace = %name, "Namespace removed");
        }
        Event::Init => {
            relist.start();
            debug!("Namespace watch (re)listing");
        }
        Event::InitDone => {
            let Some(seen) = relist.finish() else {
                return Ok(());
            };
            let mut forest = forest.write().await;
            let gone: Vec<String> = forest
                .names()
                .filter(|nm| forest.exists(nm) && !seen.contains(*nm))
                .map(str::to_string)
                .collect();
            for name in &gone {
                forest.unset_exists(name);
                debug!(namespace = %name, "Namespace missing from relist, removed");
            }
            info!(listed = seen.len(), removed = gone.len(), "Namespace watch synced");
        }
    }
    Ok(())
}

/// Fold one HierarchyConfiguration watch event into the forest
pub async fn apply_hierarchy_event(
    forest: &SharedForest,
    relist: &mut Relist<String>,
    event: Event<HierarchyConfiguration>,
) -> Result<()> {
    match event {
        Event::Apply(hc) | Event::InitApply(hc) => {
            if hc.name_any() != SINGLETON {
                warn!(name = %hc.name_any(), "Ignoring non-singleton HierarchyConfiguration");
                return Ok(());
            }
            let namespace = hc
                .namespace()
                .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
            relist.observe(namespace.clone());
            forest
                .write()
                .await
                .set_parent(&namespace, hc.spec.parent());
            debug!(namespace = %namespace, parent = ?hc.spec.parent(), "Hierarchy synced");
        }
        Event::Delete(hc) => {
            if hc.name_any() != SINGLETON {
                return Ok(());
            }
            let namespace = hc
                .namespace()
                .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
            forest.write().await.set_parent(&namespace, None);
            debug!(namespace = %namespace, "Hierarchy removed, namespace is now a root");
        }
        Event::Init => {
            relist.start();
            debug!("Hierarchy watch (re)listing");
        }
        Event::InitDone => {
            let Some(seen) = relist.finish() else {
                return Ok(());
            };
            let mut forest = forest.write().await;
            let gone: Vec<String> = forest
                .names()
                .filter(|nm| {
                    !seen.contains(*nm) && forest.get(nm).is_some_and(|n| n.parent().is_some())
                })
                .map(str::to_string)
                .collect();
            for name in &gone {
                forest.set_parent(name, None);
                debug!(namespace = %name, "Hierarchy missing from relist, namespace is now a root");
            }
            info!(listed = seen.len(), removed = gone.len(), "Hierarchy watch synced");
        }
    }
    Ok(())
}

/// Where an object came from, read off HNC's label and annotation
fn synced_object_of(obj: &DynamicObject, namespace: &str) -> SyncedObject {
    SyncedObject {
        source: obj
            .labels()
            .get(LABEL_INHERITED_FROM)
            .cloned()
            .unwrap_or_else(|| namespace.to_string()),
        propagate_none: obj
            .annotations()
            .get(ANNOTATION_PROPAGATE_NONE)
            .is_some_and(|v| v == "true"),
    }
}

fn object_key(obj: &DynamicObject) -> Result<(String, String)> {
    let namespace = obj
        .metadata
        .namespace
        .clone()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let name = obj
        .metadata
        .name
        .clone()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;
    Ok((namespace, name))
}

/// Fold one watch event for an object of a propagated kind into the forest.
///
/// Objects without the inherited-from label are originals; labelled ones are
/// copies whose source is the label value.
pub async fn apply_object_event(
    forest: &SharedForest,
    gvk: &GroupVersionKind,
    relist: &mut Relist<(String, String)>,
    event: Event<DynamicObject>,
) -> Result<()> {
    match event {
        Event::Apply(obj) | Event::InitApply(obj) => {
            let (namespace, name) = object_key(&obj)?;
            let synced = synced_object_of(&obj, &namespace);
            let mut forest = forest.write().await;
            if synced.source == namespace {
                forest.set_source_object(&namespace, gvk, &name, synced.propagate_none);
            } else {
                forest.set_object(&namespace, gvk, &name, synced.clone());
            }
            debug!(
                kind = %gvk.kind,
                namespace = %namespace,
                name = %name,
                source = %synced.source,
                propagate_none = synced.propagate_none,
                "Object synced"
            );
            relist.observe((namespace, name));
        }
        Event::Delete(obj) => {
            let (namespace, name) = object_key(&obj)?;
            forest.write().await.delete_object(&namespace, gvk, &name);
            debug!(kind = %gvk.kind, namespace = %namespace, name = %name, "Object removed");
        }
        Event::Init => {
            relist.start();
            debug!(kind = %gvk.kind, "Object watch (re)listing");
        }
        Event::InitDone => {
            let Some(seen) = relist.finish() else {
                return Ok(());
            };
            let mut forest = forest.write().await;
            let mut gone = Vec::new();
            for namespace in forest.names() {
                let Some(node) = forest.get(namespace) else {
                    continue;
                };
                for name in node.object_names(gvk) {
                    let key = (namespace.to_string(), name.to_string());
                    if !seen.contains(&key) {
                        gone.push(key);
                    }
                }
            }
            for (namespace, name) in &gone {
                forest.delete_object(namespace, gvk, name);
            }
            info!(kind = %gvk.kind, listed = seen.len(), removed = gone.len(), "Object watch synced");
        }
    }
    Ok(())
}

/// Mirror cluster namespaces into the forest until the watch stream ends
pub async fn run_namespace_mirror(client: Client, forest: SharedForest) {
    info!("Starting namespace mirror");
    let api: Api<Namespace> = Api::all(client);
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    let mut stream = std::pin::pin!(stream);
    let mut relist = Relist::default();

    while let Some(event) = stream.next().await {
        let result = match event {
            Ok(event) => apply_namespace_event(&forest, &mut relist, event).await,
            Err(e) => Err(Error::from(e)),
        };
        if let Err(e) = result {
            log_mirror_error("namespace", &e);
        }
    }

    error!("Namespace watch stream ended unexpectedly");
}

/// Mirror HierarchyConfigurations into the forest until the watch stream ends
pub async fn run_hierarchy_mirror(client: Client, forest: SharedForest) {
    info!("Starting hierarchy mirror");
    let api: Api<HierarchyConfiguration> = Api::all(client);
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    let mut stream = std::pin::pin!(stream);
    let mut relist = Relist::default();

    while let Some(event) = stream.next().await {
        let result = match event {
            Ok(event) => apply_hierarchy_event(&forest, &mut relist, event).await,
            Err(e) => Err(Error::from(e)),
        };
        if let Err(e) = result {
            log_mirror_error("hierarchy", &e);
        }
    }

    error!("Hierarchy watch stream ended unexpectedly");
}

/// Mirror all objects of one propagated kind into the forest until the watch stream ends
pub async fn run_object_mirror(client: Client, forest: SharedForest, gvk: GroupVersionKind) {
    info!(group = %gvk.group, kind = %gvk.kind, "Starting object mirror");
    let resource = ApiResource::from_gvk(&gvk);
    let api: Api<DynamicObject> = Api::all_with(client, &resource);
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    let mut stream = std::pin::pin!(stream);
    let mut relist = Relist::default();

    while let Some(event) = stream.next().await {
        let result = match event {
            Ok(event) => apply_object_event(&forest, &gvk, &mut relist, event).await,
            Err(e) => Err(Error::from(e)),
        };
        if let Err(e) = result {
            log_mirror_error(&gvk.kind, &e);
        }
    }

    error!(kind = %gvk.kind, "Object watch stream ended unexpectedly");
}

fn log_mirror_error(mirror: &str, e: &Error) {
    if e.is_retryable() {
        warn!(mirror = mirror, error = %e, "Mirror error, watcher will retry");
    } else {
        error!(mirror = mirror, error = %e, "Dropping unusable watch event");
    }
}
