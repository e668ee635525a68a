//! Parent changes on externally managed namespaces

use crate::common::*;

#[tokio::test]
async fn test_change_parent_on_managed_by() {
    // a <- b; c <- d, with c and d managed by another tool
    let mut forest = create_forest("-a-c");
    forest.set_manager("c", "external-tool");
    forest.set_manager("d", "external-tool");
    let validator = create_validator(forest, FakeServer::admin_all());

    let cases = [
        ("ok: internal namespace from none to existing", "a", "c", false),
        ("ok: internal namespace existing parent", "b", "c", false),
        ("ok: internal namespace from existing to none", "b", "", false),
        ("not ok: external namespace from none to existing", "c", "a", true),
        ("not ok: external namespace existing parent", "d", "a", true),
        ("ok: external namespace from existing to none", "d", "", false),
    ];

    for (name, namespace, parent, fail) in cases {
        let result = validator.handle(&request(namespace, parent)).await;
        assert_eq!(result.allowed, !fail, "{}: {:?}", name, result);
        if fail {
            assert_eq!(result.status_code(), 403, "{}", name);
            assert_eq!(result.reason(), "ExternallyManaged", "{}", name);
        }
    }
}

#[tokio::test]
async fn test_external_root_not_admin_checked() {
    // c is externally managed; moving b from under a to c only needs a
    let mut forest = create_forest("-a-");
    forest.set_manager("c", "external-tool");
    let validator = create_validator(forest, FakeServer::parse("a"));

    assert!(validator.handle(&request("b", "c")).await.allowed);
}
