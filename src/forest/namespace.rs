//! A single namespace node in the forest

use std::collections::{BTreeMap, BTreeSet, HashMap};

use kube::core::GroupVersionKind;

/// An object visible in a namespace, tagged with where it came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncedObject {
    /// Namespace holding the original of this object
    pub source: String,
    /// Whether the object carries the propagate-none annotation
    pub propagate_none: bool,
}

/// Namespace node tracked by the forest.
///
/// Relationships are stored by name; the forest resolves them. A node says
/// nothing about whether its parent actually exists, which is exactly what the
/// validator needs to be able to ask.
#[derive(Clone, Debug)]
pub struct Namespace {
    name: String,
    pub(super) parent: Option<String>,
    pub(super) children: BTreeSet<String>,
    pub(super) excluded: bool,
    pub(super) manager: String,
    pub(super) exists: bool,
    pub(super) objects: HashMap<GroupVersionKind, BTreeMap<String, SyncedObject>>,
}

impl Namespace {
    pub(super) fn new(name: &str, excluded: bool) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            children: BTreeSet::new(),
            excluded,
            manager: String::new(),
            exists: false,
            objects: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(String::as_str)
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    /// Name of the external tool owning this namespace's hierarchy, empty if HNC owns it
    pub fn manager(&self) -> &str {
        &self.manager
    }

    pub fn is_external(&self) -> bool {
        !self.manager.is_empty()
    }

    /// Whether the reconciler has observed this namespace at least once
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Look up an object visible in this namespace
    pub fn object(&self, gvk: &GroupVersionKind, name: &str) -> Option<&SyncedObject> {
        self.objects.get(gvk).and_then(|objs| objs.get(name))
    }

    /// Names of all objects of `gvk` visible here, originals and copies alike
    pub fn object_names<'a>(&'a self, gvk: &GroupVersionKind) -> impl Iterator<Item = &'a str> + 'a {
        self.objects
            .get(gvk)
            .into_iter()
            .flat_map(|objs| objs.keys())
            .map(String::as_str)
    }

    /// Objects of `gvk` whose original lives in this namespace
    pub fn source_objects<'a>(
        &'a self,
        gvk: &GroupVersionKind,
    ) -> impl Iterator<Item = (&'a str, &'a SyncedObject)> + 'a {
        self.objects
            .get(gvk)
            .into_iter()
            .flat_map(|objs| objs.iter())
            .filter(|(_, obj)| obj.source == self.name)
            .map(|(name, obj)| (name.as_str(), obj))
    }
}
