//! Structural checks through the public Validator API

use hnc_webhook::webhooks::DenialCode;

use crate::common::*;

struct Case {
    name: &'static str,
    namespace: &'static str,
    parent: &'static str,
    fail: bool,
    msg_contains: &'static str,
}

#[tokio::test]
async fn test_structure() {
    // a <- b; c
    let mut forest = create_forest("-a-");
    forest.set_excluded_namespaces(["kube-system"]);
    let server = FakeServer::admin_all().with_missing(["brumpf", "kube-public"]);
    let validator = create_validator(forest, server);

    let cases = [
        Case { name: "ok", namespace: "a", parent: "c", fail: false, msg_contains: "" },
        Case { name: "missing parent", namespace: "a", parent: "brumpf", fail: true, msg_contains: "does not exist" },
        Case { name: "self-cycle", namespace: "a", parent: "a", fail: true, msg_contains: "illegal parent" },
        Case { name: "other cycle", namespace: "a", parent: "b", fail: true, msg_contains: "illegal parent" },
        Case { name: "exclude parent kube-system", namespace: "a", parent: "kube-system", fail: true, msg_contains: "excluded" },
        Case { name: "missing parent kube-public", namespace: "a", parent: "kube-public", fail: true, msg_contains: "does not exist" },
        Case { name: "exclude child kube-system", namespace: "kube-system", parent: "a", fail: true, msg_contains: "excluded" },
        Case { name: "missing child kube-public", namespace: "kube-public", parent: "a", fail: true, msg_contains: "HNC has not reconciled namespace" },
    ];

    for case in cases {
        let result = validator.handle(&request(case.namespace, case.parent)).await;
        assert_eq!(result.allowed, !case.fail, "{}: {:?}", case.name, result);
        assert!(
            result.message().contains(case.msg_contains),
            "{}: message {:?} should contain {:?}",
            case.name,
            result.message(),
            case.msg_contains
        );
    }
}

#[tokio::test]
async fn test_structural_denial_codes() {
    let mut forest = create_forest("-a-");
    forest.set_excluded_namespaces(["kube-system"]);
    let validator = create_validator(forest, FakeServer::admin_all().with_missing(["brumpf"]));

    let result = validator.handle(&request("a", "brumpf")).await;
    assert_eq!(result.code, Some(DenialCode::Forbidden));
    assert_eq!(result.reason(), "ParentNotFound");

    let result = validator.handle(&request("a", "a")).await;
    assert_eq!(result.code, Some(DenialCode::Forbidden));
    assert_eq!(result.reason(), "IllegalParent");

    let result = validator.handle(&request("kube-system", "a")).await;
    assert_eq!(result.reason(), "ExcludedNamespace");

    let result = validator.handle(&request("unsynced", "a")).await;
    assert_eq!(result.code, Some(DenialCode::ServiceUnavailable));
    assert!(result.code.unwrap().is_retryable());
}

#[tokio::test]
async fn test_parent_exists_but_not_reconciled() {
    // "late" exists in the cluster but the forest has not seen it yet
    let validator = create_validator(create_forest("-a-"), FakeServer::admin_all());

    let result = validator.handle(&request("a", "late")).await;
    assert!(!result.allowed);
    assert_eq!(result.code, Some(DenialCode::ServiceUnavailable));
    assert_eq!(result.reason(), "ParentNotReconciled");
}

#[tokio::test]
async fn test_parent_existence_check_failure_is_transient() {
    let validator = create_validator(create_forest("-a-"), FakeServer::default().failing());

    let result = validator.handle(&request("a", "late")).await;
    assert_eq!(result.status_code(), 503);
    assert_eq!(result.reason(), "AuthorizationCheckFailed");
}

#[tokio::test]
async fn test_descendant_cycle_message_names_chain() {
    // a <- b <- c
    let validator = create_validator(create_forest("-ab"), FakeServer::admin_all());

    let result = validator.handle(&request("a", "c")).await;
    assert!(!result.allowed);
    assert!(result.message().contains("illegal parent"));
    assert!(result.message().contains("a -> c -> b -> a"), "{}", result.message());
}

#[tokio::test]
async fn test_unchanged_parent_admitted() {
    // The delegate is never consulted when nothing changes
    let validator = create_validator(create_forest("-a-"), FakeServer::default().failing());

    assert!(validator.handle(&request("b", "a")).await.allowed);
    assert!(validator.handle(&request("a", "")).await.allowed);
}

#[tokio::test]
async fn test_recorded_self_loop_still_illegal() {
    // a <- a, already in the forest
    let validator = create_validator(create_forest("a"), FakeServer::admin_all());

    let result = validator.handle(&request("a", "a")).await;
    assert!(!result.allowed, "{:?}", result);
    assert_eq!(result.code, Some(DenialCode::Forbidden));
    assert_eq!(result.reason(), "IllegalParent");
    assert!(result.message().contains("its own parent"));
}

#[tokio::test]
async fn test_recorded_cycle_still_illegal() {
    // a <- b <- a, already in the forest
    let validator = create_validator(create_forest("ba"), FakeServer::admin_all());

    let result = validator.handle(&request("a", "b")).await;
    assert!(!result.allowed, "{:?}", result);
    assert_eq!(result.reason(), "IllegalParent");
    assert!(result.message().contains("a -> b -> a"), "{}", result.message());
}

#[tokio::test]
async fn test_unchanged_missing_parent_admitted() {
    // b's parent z was never synced; re-stating it asks nobody
    let validator = create_validator(create_forest("-z"), FakeServer::default().failing());
    assert!(validator.handle(&request("b", "z")).await.allowed);
}
