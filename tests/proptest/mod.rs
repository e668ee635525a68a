// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for the forest and the validator
//!
//! These tests use proptest to generate random forests and verify that:
//! 1. Ancestor and subtree walks terminate on any graph, cyclic or not
//! 2. A namespace can never become its own parent or a descendant's child
//! 3. Moves between unrelated trees are admitted when nothing else objects
//! 4. Detaching to a root never conflicts

#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;

use proptest::prelude::*;
use proptest::sample::Index;

use common::*;
use hnc_webhook::webhooks::ValidationResult;

const MAX_NAMESPACES: usize = 12;

/// Forest description where every parent precedes its child, so the graph is acyclic
fn acyclic_desc() -> impl Strategy<Value = String> {
    prop::collection::vec((any::<bool>(), any::<Index>()), 1..MAX_NAMESPACES).prop_map(|nodes| {
        nodes
            .iter()
            .enumerate()
            .map(|(i, (has_parent, idx))| {
                if i > 0 && *has_parent {
                    ns_name(idx.index(i)).chars().next().unwrap()
                } else {
                    '-'
                }
            })
            .collect()
    })
}

/// Forest description with arbitrary parent links, including cycles and self-loops
fn any_desc() -> impl Strategy<Value = String> {
    prop::collection::vec((any::<bool>(), any::<Index>()), 1..MAX_NAMESPACES).prop_map(|nodes| {
        let n = nodes.len();
        nodes
            .iter()
            .map(|(has_parent, idx)| {
                if *has_parent {
                    ns_name(idx.index(n)).chars().next().unwrap()
                } else {
                    '-'
                }
            })
            .collect()
    })
}

fn decide(desc: &str, namespace: &str, parent: &str) -> ValidationResult {
    let validator = create_validator(create_forest(desc), FakeServer::admin_all());
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(validator.handle(&request(namespace, parent)))
}

proptest! {
    #[test]
    fn ancestry_terminates_without_repeats(desc in any_desc(), start in any::<Index>()) {
        let forest = create_forest(&desc);
        let name = ns_name(start.index(desc.len()));

        let ancestry = forest.ancestry(&name);
        let unique: HashSet<&String> = ancestry.names.iter().collect();
        prop_assert_eq!(unique.len(), ancestry.names.len());
        prop_assert!(ancestry.names.len() <= desc.len());
        prop_assert!(forest.subtree(&name).len() <= desc.len());
    }

    #[test]
    fn acyclic_forests_have_roots(desc in acyclic_desc(), start in any::<Index>()) {
        let forest = create_forest(&desc);
        let name = ns_name(start.index(desc.len()));

        let root = forest.root(&name);
        prop_assert!(root.is_some());
        let root = root.unwrap();
        prop_assert!(forest.get(&root).unwrap().parent().is_none());
        prop_assert!(forest.subtree(&root).contains(&name));
    }

    #[test]
    fn self_parent_is_illegal(desc in any_desc(), start in any::<Index>()) {
        let name = ns_name(start.index(desc.len()));

        let result = decide(&desc, &name, &name);
        prop_assert!(!result.allowed);
        prop_assert_eq!(result.status_code(), 403);
        prop_assert_eq!(result.reason(), "IllegalParent");
    }

    #[test]
    fn descendant_parent_is_illegal(desc in acyclic_desc(), start in any::<Index>(), pick in any::<Index>()) {
        let forest = create_forest(&desc);
        let name = ns_name(start.index(desc.len()));
        let descendants: Vec<String> = forest.subtree(&name).into_iter().skip(1).collect();
        prop_assume!(!descendants.is_empty());
        let parent = &descendants[pick.index(descendants.len())];

        let result = decide(&desc, &name, parent);
        prop_assert!(!result.allowed);
        prop_assert_eq!(result.reason(), "IllegalParent");
        prop_assert!(result.message().contains("illegal parent"));
    }

    #[test]
    fn unrelated_moves_are_admitted(desc in acyclic_desc(), start in any::<Index>(), pick in any::<Index>()) {
        let forest = create_forest(&desc);
        let name = ns_name(start.index(desc.len()));
        let subtree = forest.subtree(&name);
        let candidates: Vec<String> = (0..desc.len())
            .map(ns_name)
            .filter(|nm| !subtree.contains(nm))
            .collect();
        prop_assume!(!candidates.is_empty());
        let parent = &candidates[pick.index(candidates.len())];

        let result = decide(&desc, &name, parent);
        prop_assert!(result.allowed, "{:?}", result);
    }

    #[test]
    fn root_proposals_never_conflict(desc in any_desc(), start in any::<Index>()) {
        let mut forest = create_forest(&desc);
        propagate_secrets(&mut forest);
        for i in 0..desc.len() {
            create_secret(&mut forest, "shared", &ns_name(i));
        }
        let name = ns_name(start.index(desc.len()));
        prop_assert!(forest.conflicts(&name, None).is_empty());
    }
}
