//! In-memory model of the namespace hierarchy
//!
//! The forest mirrors every namespace HNC knows about, the parent/child edges
//! between them and the objects visible in each one. A background mirror keeps
//! it current while admission requests read it, so it is always handed around
//! as a [`SharedForest`] and read under a single guard per decision.
//!
//! Every walk over the graph is guarded by a visited set: the state being
//! validated may itself be cyclic.

mod conflicts;
mod namespace;

pub use conflicts::Conflict;
pub use namespace::{Namespace, SyncedObject};

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use kube::core::GroupVersionKind;
use tokio::sync::RwLock;

/// The forest shared between the admission path and the mirror
pub type SharedForest = Arc<RwLock<Forest>>;

/// How objects of a kind move through the hierarchy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// Copy objects from ancestors into all descendants
    Propagate,
    /// Leave objects of this kind alone
    Ignore,
    /// Delete propagated copies of this kind
    Remove,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Propagate => write!(f, "Propagate"),
            SyncMode::Ignore => write!(f, "Ignore"),
            SyncMode::Remove => write!(f, "Remove"),
        }
    }
}

/// Propagation configuration for one kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSyncer {
    pub gvk: GroupVersionKind,
    pub mode: SyncMode,
}

impl TypeSyncer {
    pub fn new(gvk: GroupVersionKind, mode: SyncMode) -> Self {
        Self { gvk, mode }
    }
}

/// Result of walking parent links upward from a namespace
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ancestry {
    /// The starting namespace followed by each ancestor, nearest first
    pub names: Vec<String>,
    /// Whether the walk stopped because it revisited a namespace
    pub cycle: bool,
}

impl Ancestry {
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Topmost namespace reached, unless the walk ran into a cycle
    pub fn root(&self) -> Option<&str> {
        if self.cycle {
            None
        } else {
            self.names.last().map(String::as_str)
        }
    }
}

#[derive(Debug, Default)]
pub struct Forest {
    namespaces: HashMap<String, Namespace>,
    excluded: BTreeSet<String>,
    type_syncers: HashMap<GroupVersionKind, SyncMode>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the forest for sharing between the mirror and the validator
    pub fn shared(self) -> SharedForest {
        Arc::new(RwLock::new(self))
    }

    /// Replace the set of namespaces HNC never manages
    pub fn set_excluded_namespaces<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = names.into_iter().map(Into::into).collect();
        for (name, ns) in self.namespaces.iter_mut() {
            ns.excluded = self.excluded.contains(name);
        }
    }

    /// Whether `name` is excluded, whether or not a node exists for it yet
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    /// Whether `name` has a node that the reconciler has observed
    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some_and(Namespace::exists)
    }

    /// Return the node for `name`, creating an empty unsynced one if needed
    pub fn get_or_create(&mut self, name: &str) -> &mut Namespace {
        let excluded = self.excluded.contains(name);
        self.namespaces
            .entry(name.to_string())
            .or_insert_with(|| Namespace::new(name, excluded))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// Point `name` at a new parent (or make it a root), keeping child sets in step
    pub fn set_parent(&mut self, name: &str, parent: Option<&str>) {
        let old = self.get_or_create(name).parent.take();
        if let Some(old) = old
            && let Some(old_parent) = self.namespaces.get_mut(&old)
        {
            old_parent.children.remove(name);
        }
        if let Some(parent) = parent {
            self.get_or_create(parent).children.insert(name.to_string());
            self.get_or_create(name).parent = Some(parent.to_string());
        }
    }

    /// Record that the reconciler has observed `name`
    pub fn set_exists(&mut self, name: &str) {
        self.get_or_create(name).exists = true;
    }

    /// Record that `name` is gone from the cluster.
    ///
    /// Edges are kept so that children can still report a missing parent.
    pub fn unset_exists(&mut self, name: &str) {
        if let Some(ns) = self.namespaces.get_mut(name) {
            ns.exists = false;
            ns.objects.clear();
        }
    }

    pub fn set_manager(&mut self, name: &str, manager: &str) {
        self.get_or_create(name).manager = manager.to_string();
    }

    /// Record an object visible in `namespace`
    pub fn set_object(
        &mut self,
        namespace: &str,
        gvk: &GroupVersionKind,
        name: &str,
        object: SyncedObject,
    ) {
        self.get_or_create(namespace)
            .objects
            .entry(gvk.clone())
            .or_default()
            .insert(name.to_string(), object);
    }

    /// Record an original object created directly in `namespace`
    pub fn set_source_object(
        &mut self,
        namespace: &str,
        gvk: &GroupVersionKind,
        name: &str,
        propagate_none: bool,
    ) {
        let object = SyncedObject {
            source: namespace.to_string(),
            propagate_none,
        };
        self.set_object(namespace, gvk, name, object);
    }

    pub fn delete_object(&mut self, namespace: &str, gvk: &GroupVersionKind, name: &str) {
        if let Some(objs) = self
            .namespaces
            .get_mut(namespace)
            .and_then(|ns| ns.objects.get_mut(gvk))
        {
            objs.remove(name);
        }
    }

    /// Register (or replace) how a kind propagates
    pub fn add_type_syncer(&mut self, syncer: TypeSyncer) {
        tracing::debug!(
            group = %syncer.gvk.group,
            version = %syncer.gvk.version,
            kind = %syncer.gvk.kind,
            mode = %syncer.mode,
            "Registered type syncer"
        );
        self.type_syncers.insert(syncer.gvk, syncer.mode);
    }

    pub fn mode(&self, gvk: &GroupVersionKind) -> Option<SyncMode> {
        self.type_syncers.get(gvk).copied()
    }

    /// Walk parent links from `name`, stopping at a root, an unknown
    /// namespace or the first repeated namespace.
    pub fn ancestry(&self, name: &str) -> Ancestry {
        let mut ancestry = Ancestry::default();
        let mut seen = HashSet::new();
        let mut current = Some(name);

        while let Some(nm) = current {
            if !seen.insert(nm) {
                ancestry.cycle = true;
                break;
            }
            ancestry.names.push(nm.to_string());
            current = self.get(nm).and_then(Namespace::parent);
        }

        ancestry
    }

    /// Topmost ancestor of `name`, or `None` if its ancestry is cyclic
    pub fn root(&self, name: &str) -> Option<String> {
        self.ancestry(name).root().map(str::to_string)
    }

    /// Most recent common ancestor of `a` and `b` (either may be the answer itself)
    pub fn mrca(&self, a: &str, b: &str) -> Option<String> {
        let other = self.ancestry(b);
        self.ancestry(a)
            .names
            .into_iter()
            .find(|n| other.contains(n))
    }

    /// Whether making `proposed_parent` the parent of `candidate` closes a cycle
    pub fn would_cycle(&self, candidate: &str, proposed_parent: &str) -> bool {
        self.ancestry(proposed_parent).contains(candidate)
    }

    /// `name` followed by all of its descendants, breadth first
    pub fn subtree(&self, name: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([name]);
        let mut members = Vec::new();

        while let Some(nm) = queue.pop_front() {
            if !seen.insert(nm) {
                continue;
            }
            members.push(nm.to_string());
            if let Some(ns) = self.get(nm) {
                queue.extend(ns.children());
            }
        }

        members
    }
}
