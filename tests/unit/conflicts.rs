//! Propagation conflicts through the public Validator API

use hnc_webhook::forest::{SyncMode, TypeSyncer};
use hnc_webhook::webhooks::DenialCode;

use crate::common::*;

#[tokio::test]
async fn test_change_parent_with_conflict() {
    // a <- b; c <- d, each of a and d holding a "conflict" secret
    let mut forest = create_forest("-a-c");
    propagate_secrets(&mut forest);
    create_secret(&mut forest, "conflict", "a");
    create_secret(&mut forest, "conflict", "d");
    let validator = create_validator(forest, FakeServer::admin_all());

    let cases = [
        ("conflict in itself and the new parent", "a", "d", true),
        ("conflict in itself and a new ancestor", "d", "b", true),
        ("ok: no conflict in ancestors", "a", "c", false),
        ("conflict in subtree leaf and the new parent", "c", "a", true),
        ("conflict in subtree leaf and a new ancestor", "c", "b", true),
        ("ok: set a namespace as root", "d", "", false),
    ];

    for (name, namespace, parent, fail) in cases {
        let result = validator.handle(&request(namespace, parent)).await;
        assert_eq!(result.allowed, !fail, "{}: {:?}", name, result);
        if fail {
            assert_eq!(result.code, Some(DenialCode::Conflict), "{}", name);
            assert_eq!(result.reason(), "ObjectConflict", "{}", name);
        }
    }
}

#[tokio::test]
async fn test_conflict_item_with_propagate_none() {
    // a <- b; c <- d; a's secret is propagate-none, c and d hold ordinary ones
    let mut forest = create_forest("-a-c");
    propagate_secrets(&mut forest);
    create_propagate_none_secret(&mut forest, "conflict", "a");
    create_secret(&mut forest, "conflict", "c");
    create_secret(&mut forest, "conflict", "d");
    let validator = create_validator(forest, FakeServer::admin_all());

    let result = validator.handle(&request("c", "a")).await;
    assert!(result.allowed, "parent secret is propagate-none: {:?}", result);

    let result = validator.handle(&request("a", "d")).await;
    assert!(!result.allowed, "child secret is propagate-none but still overwritten");
    assert_eq!(result.status_code(), 409);
}

#[tokio::test]
async fn test_conflict_message_lists_collisions() {
    let mut forest = create_forest("-a-c");
    propagate_secrets(&mut forest);
    create_secret(&mut forest, "creds", "a");
    create_secret(&mut forest, "creds", "c");
    create_secret(&mut forest, "creds", "d");
    let validator = create_validator(forest, FakeServer::admin_all());

    let result = validator.handle(&request("c", "b")).await;
    assert!(!result.allowed);
    let message = result.message();
    assert!(message.contains("2 existing object(s)"), "{}", message);
    assert!(message.contains("\"creds\" in namespace \"c\""), "{}", message);
    assert!(message.contains("\"creds\" in namespace \"d\""), "{}", message);
    assert!(message.contains("Secret (v1)"), "{}", message);
}

#[tokio::test]
async fn test_unpropagated_kinds_never_conflict() {
    let mut forest = create_forest("-a-c");
    forest.add_type_syncer(TypeSyncer::new(secret_gvk(), SyncMode::Ignore));
    create_secret(&mut forest, "conflict", "a");
    create_secret(&mut forest, "conflict", "d");
    let validator = create_validator(forest, FakeServer::admin_all());

    assert!(validator.handle(&request("a", "d")).await.allowed);
}
