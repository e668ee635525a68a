//! Propagation conflict detection
//!
//! Moving a namespace under a new parent makes every propagating object in the
//! new ancestor chain flow into the moved subtree. If any namespace in that
//! subtree already holds its own object with the same kind and name, the
//! incoming copy would overwrite it.

use std::collections::BTreeMap;
use std::fmt;

use kube::core::GroupVersionKind;

use super::{Forest, SyncMode};

/// An object in the moved subtree that an incoming propagated copy would overwrite
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub gvk: GroupVersionKind,
    pub name: String,
    /// Ancestor namespace holding the object that would propagate in
    pub source: String,
    /// Namespace in the moved subtree holding the colliding object
    pub namespace: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} in namespace {:?} collides with the one propagated from {:?}",
            kind_display(&self.gvk),
            self.name,
            self.namespace,
            self.source
        )
    }
}

fn kind_display(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        format!("{} ({})", gvk.kind, gvk.version)
    } else {
        format!("{} ({}/{})", gvk.kind, gvk.group, gvk.version)
    }
}

impl Forest {
    /// Objects that would collide if `candidate` were moved under `proposed_parent`.
    ///
    /// Ancestor objects marked propagate-none stay where they are and never
    /// collide. Objects in the moved subtree collide regardless of that mark,
    /// since the incoming copy would still replace them.
    pub fn conflicts(&self, candidate: &str, proposed_parent: Option<&str>) -> Vec<Conflict> {
        let Some(parent) = proposed_parent else {
            return Vec::new();
        };

        let ancestors: Vec<String> = self
            .ancestry(parent)
            .names
            .into_iter()
            .take_while(|nm| nm != candidate)
            .collect();
        let subtree = self.subtree(candidate);
        let mut conflicts = Vec::new();

        for (gvk, mode) in &self.type_syncers {
            if *mode != SyncMode::Propagate {
                continue;
            }

            // Nearest ancestor wins if the chain already holds duplicates
            let mut incoming: BTreeMap<&str, &str> = BTreeMap::new();
            for ancestor in ancestors.iter().filter_map(|nm| self.get(nm)) {
                for (name, obj) in ancestor.source_objects(gvk) {
                    if !obj.propagate_none {
                        incoming.entry(name).or_insert(ancestor.name());
                    }
                }
            }
            if incoming.is_empty() {
                continue;
            }

            for member in subtree.iter().filter_map(|nm| self.get(nm)) {
                for (name, _) in member.source_objects(gvk) {
                    if let Some(source) = incoming.get(name) {
                        conflicts.push(Conflict {
                            gvk: gvk.clone(),
                            name: name.to_string(),
                            source: source.to_string(),
                            namespace: member.name().to_string(),
                        });
                    }
                }
            }
        }

        conflicts.sort_by(|a, b| {
            (a.namespace.as_str(), a.gvk.kind.as_str(), a.name.as_str()).cmp(&(
                b.namespace.as_str(),
                b.gvk.kind.as_str(),
                b.name.as_str(),
            ))
        });
        conflicts
    }
}
