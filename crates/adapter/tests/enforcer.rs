// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Drive the adapter through a real enforcer, over the in-memory repository

use casbin::{Adapter, CoreApi, DefaultModel, Enforcer, Filter, MgmtApi, Model};
use cra_adapter::RuleAdapter;
use cra_data_model::CasbinRule;
use cra_storage::{MemoryRuleRepository, RuleRepository};

const RBAC_MODEL: &str = include_str!("fixtures/rbac_model.conf");
const RBAC_WITH_RESOURCES_ROLES_MODEL: &str =
    include_str!("fixtures/rbac_with_resources_roles.conf");

fn values(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_owned()).collect()
}

fn rule(ptype: &str, rule: &[&str]) -> CasbinRule {
    CasbinRule::new(ptype, rule.iter().copied()).unwrap()
}

/// Seed the repository with the usual RBAC policy, and load it in an enforcer
async fn enforcer(repo: &MemoryRuleRepository) -> Enforcer {
    let mut adapter = RuleAdapter::new(repo.clone());
    adapter
        .add_policies(
            "p",
            "p",
            vec![
                values(&["alice", "data1", "read"]),
                values(&["bob", "data2", "write"]),
                values(&["data2_admin", "data2", "read"]),
                values(&["data2_admin", "data2", "write"]),
            ],
        )
        .await
        .unwrap();
    adapter
        .add_policy("g", "g", values(&["alice", "data2_admin"]))
        .await
        .unwrap();

    let model = DefaultModel::from_str(RBAC_MODEL).await.unwrap();
    let mut e = Enforcer::new(model, adapter).await.unwrap();
    e.load_policy().await.unwrap();
    e
}

fn assert_initial_policy(e: &Enforcer) {
    assert!(e.enforce(("alice", "data1", "read")).unwrap());
    assert!(!e.enforce(("alice", "data1", "write")).unwrap());
    assert!(!e.enforce(("bob", "data2", "read")).unwrap());
    assert!(e.enforce(("bob", "data2", "write")).unwrap());
    assert!(e.enforce(("alice", "data2", "read")).unwrap());
    assert!(e.enforce(("alice", "data2", "write")).unwrap());
}

#[tokio::test]
async fn test_enforcer_basic() {
    let repo = MemoryRuleRepository::new();
    let e = enforcer(&repo).await;

    assert_initial_policy(&e);
    assert!(!e.is_filtered());
}

#[tokio::test]
async fn test_add_policy() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;
    let mut adapter = RuleAdapter::new(repo.clone());

    assert!(
        adapter
            .add_policy("p", "p", values(&["alice", "data1", "write"]))
            .await
            .unwrap()
    );
    assert!(
        adapter
            .add_policy("p", "p", values(&["bob", "data2", "read"]))
            .await
            .unwrap()
    );

    e.load_policy().await.unwrap();
    assert!(e.enforce(("alice", "data1", "read")).unwrap());
    assert!(e.enforce(("alice", "data1", "write")).unwrap());
    assert!(e.enforce(("bob", "data2", "read")).unwrap());
    assert!(e.enforce(("bob", "data2", "write")).unwrap());
    assert!(e.enforce(("alice", "data2", "read")).unwrap());
    assert!(e.enforce(("alice", "data2", "write")).unwrap());
}

#[tokio::test]
async fn test_add_policies() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;
    let mut adapter = RuleAdapter::new(repo.clone());

    assert!(
        adapter
            .add_policies(
                "p",
                "p",
                vec![
                    values(&["alice", "data1", "write"]),
                    values(&["bob", "data2", "read"]),
                ],
            )
            .await
            .unwrap()
    );

    e.load_policy().await.unwrap();
    assert!(e.enforce(("alice", "data1", "write")).unwrap());
    assert!(e.enforce(("bob", "data2", "read")).unwrap());

    // Rules land at the end of the list, in order
    let mut repo = repo;
    let rules = repo.list().await.unwrap();
    assert_eq!(rules.len(), 7);
    assert_eq!(rules[5], rule("p", &["alice", "data1", "write"]));
    assert_eq!(rules[6], rule("p", &["bob", "data2", "read"]));
}

#[tokio::test]
async fn test_add_policy_too_many_fields() {
    let repo = MemoryRuleRepository::new();
    let mut adapter = RuleAdapter::new(repo.clone());

    let err = adapter
        .add_policy("p", "p", values(&["a", "b", "c", "d", "e", "f", "g"]))
        .await
        .unwrap_err();
    assert!(matches!(err, casbin::Error::AdapterError(_)));

    let mut repo = repo;
    assert_eq!(repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_remove_policy() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;
    let mut adapter = RuleAdapter::new(repo.clone());

    assert!(
        adapter
            .remove_policy("g", "g", values(&["alice", "data2_admin"]))
            .await
            .unwrap()
    );

    e.load_policy().await.unwrap();
    assert!(e.enforce(("alice", "data1", "read")).unwrap());
    assert!(!e.enforce(("alice", "data1", "write")).unwrap());
    assert!(!e.enforce(("bob", "data2", "read")).unwrap());
    assert!(e.enforce(("bob", "data2", "write")).unwrap());
    assert!(!e.enforce(("alice", "data2", "read")).unwrap());
    assert!(!e.enforce(("alice", "data2", "write")).unwrap());

    // Nothing left to remove
    assert!(
        !adapter
            .remove_policy("g", "g", values(&["alice", "data2_admin"]))
            .await
            .unwrap()
    );
    assert!(!adapter.remove_policy("p", "p", Vec::new()).await.unwrap());
}

#[tokio::test]
async fn test_remove_policy_removes_duplicates() {
    let repo = MemoryRuleRepository::new();
    let mut adapter = RuleAdapter::new(repo.clone());

    for _ in 0..3 {
        adapter
            .add_policy("p", "p", values(&["alice", "data1", "read"]))
            .await
            .unwrap();
    }
    adapter
        .add_policy("p", "p", values(&["bob", "data2", "write"]))
        .await
        .unwrap();

    assert!(
        adapter
            .remove_policy("p", "p", values(&["alice", "data1", "read"]))
            .await
            .unwrap()
    );

    let mut repo = repo;
    assert_eq!(
        repo.list().await.unwrap(),
        vec![rule("p", &["bob", "data2", "write"])]
    );
}

#[tokio::test]
async fn test_remove_policies() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;
    let mut adapter = RuleAdapter::new(repo.clone());

    assert!(
        adapter
            .remove_policies(
                "p",
                "p",
                vec![
                    values(&["data2_admin", "data2", "read"]),
                    values(&["data2_admin", "data2", "write"]),
                ],
            )
            .await
            .unwrap()
    );

    e.load_policy().await.unwrap();
    assert!(e.enforce(("alice", "data1", "read")).unwrap());
    assert!(!e.enforce(("alice", "data1", "write")).unwrap());
    assert!(!e.enforce(("bob", "data2", "read")).unwrap());
    assert!(e.enforce(("bob", "data2", "write")).unwrap());
    assert!(!e.enforce(("alice", "data2", "read")).unwrap());
    assert!(!e.enforce(("alice", "data2", "write")).unwrap());

    assert!(
        !adapter
            .remove_policies("p", "p", vec![values(&["data2_admin", "data2", "read"])])
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_remove_policy_no_remove_when_rule_is_incomplete() {
    let repo = MemoryRuleRepository::new();
    let mut adapter = RuleAdapter::new(repo.clone());

    adapter
        .add_policy("p", "p", values(&["alice", "data1", "write"]))
        .await
        .unwrap();
    adapter
        .add_policy("p", "p", values(&["alice", "data1", "read"]))
        .await
        .unwrap();
    adapter
        .add_policy("p", "p", values(&["bob", "data2", "read"]))
        .await
        .unwrap();
    adapter
        .add_policy("p", "p", values(&["data_group_admin", "data_group", "write"]))
        .await
        .unwrap();
    adapter
        .add_policy("g", "g", values(&["alice", "data_group_admin"]))
        .await
        .unwrap();
    adapter
        .add_policy("g", "g2", values(&["data2", "data_group"]))
        .await
        .unwrap();

    let model = DefaultModel::from_str(RBAC_WITH_RESOURCES_ROLES_MODEL)
        .await
        .unwrap();
    let mut e = Enforcer::new(model, RuleAdapter::new(repo.clone()))
        .await
        .unwrap();
    e.load_policy().await.unwrap();

    assert!(e.enforce(("alice", "data1", "write")).unwrap());
    assert!(e.enforce(("alice", "data1", "read")).unwrap());
    assert!(e.enforce(("bob", "data2", "read")).unwrap());
    assert!(e.enforce(("alice", "data2", "write")).unwrap());

    assert!(
        !adapter
            .remove_policy("p", "p", values(&["alice", "data1"]))
            .await
            .unwrap()
    );

    e.load_policy().await.unwrap();
    assert!(e.enforce(("alice", "data1", "write")).unwrap());
    assert!(e.enforce(("alice", "data1", "read")).unwrap());
    assert!(e.enforce(("bob", "data2", "read")).unwrap());
    assert!(e.enforce(("alice", "data2", "write")).unwrap());
}

#[tokio::test]
async fn test_save_policy() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;
    assert!(!e.enforce(("alice", "data4", "read")).unwrap());

    e.get_mut_model().clear_policy();
    e.get_mut_model()
        .add_policy("p", "p", values(&["alice", "data4", "read"]));
    e.save_policy().await.unwrap();

    assert!(e.enforce(("alice", "data4", "read")).unwrap());

    // The model is the source of truth, and replaced the stored policy
    let mut repo = repo;
    assert_eq!(
        repo.list().await.unwrap(),
        vec![rule("p", &["alice", "data4", "read"])]
    );
}

#[tokio::test]
async fn test_save_policy_both_sections() {
    let repo = MemoryRuleRepository::new();
    let mut adapter = RuleAdapter::new(repo.clone());

    let mut model = DefaultModel::from_str(RBAC_WITH_RESOURCES_ROLES_MODEL)
        .await
        .unwrap();
    model.add_policy("p", "p", values(&["alice", "data1", "read"]));
    model.add_policy("g", "g2", values(&["data1", "data_group"]));
    model.add_policy("g", "g", values(&["alice", "admin"]));

    adapter.save_policy(&mut model).await.unwrap();

    // Sections in order, then policy types in order
    let mut repo = repo;
    assert_eq!(
        repo.list().await.unwrap(),
        vec![
            rule("p", &["alice", "data1", "read"]),
            rule("g", &["alice", "admin"]),
            rule("g2", &["data1", "data_group"]),
        ]
    );
}

#[tokio::test]
async fn test_remove_filtered_policy() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;
    let mut adapter = RuleAdapter::new(repo.clone());

    assert!(
        !adapter
            .remove_filtered_policy("g", "g", 6, values(&["alice", "data2_admin"]))
            .await
            .unwrap()
    );
    e.load_policy().await.unwrap();
    assert_initial_policy(&e);

    assert!(
        !adapter
            .remove_filtered_policy(
                "g",
                "g",
                0,
                values(&["v0", "v1", "v2", "v3", "v4", "v5", "v6"]),
            )
            .await
            .unwrap()
    );
    e.load_policy().await.unwrap();
    assert_initial_policy(&e);

    assert!(
        adapter
            .remove_filtered_policy("g", "g", 0, values(&["alice", "data2_admin"]))
            .await
            .unwrap()
    );
    e.load_policy().await.unwrap();
    assert!(e.enforce(("alice", "data1", "read")).unwrap());
    assert!(!e.enforce(("alice", "data1", "write")).unwrap());
    assert!(!e.enforce(("bob", "data2", "read")).unwrap());
    assert!(e.enforce(("bob", "data2", "write")).unwrap());
    assert!(!e.enforce(("alice", "data2", "read")).unwrap());
    assert!(!e.enforce(("alice", "data2", "write")).unwrap());
}

#[tokio::test]
async fn test_remove_filtered_policy_wildcard() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;
    let mut adapter = RuleAdapter::new(repo.clone());

    // Every rule on data2 allowing writes, whoever the subject is
    assert!(
        adapter
            .remove_filtered_policy("p", "p", 0, values(&["", "data2", "write"]))
            .await
            .unwrap()
    );

    e.load_policy().await.unwrap();
    assert!(!e.enforce(("bob", "data2", "write")).unwrap());
    assert!(!e.enforce(("alice", "data2", "write")).unwrap());
    assert!(e.enforce(("alice", "data2", "read")).unwrap());
    assert!(e.enforce(("alice", "data1", "read")).unwrap());
}

#[tokio::test]
async fn test_update_policy() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;
    let mut adapter = RuleAdapter::new(repo.clone());

    assert!(
        adapter
            .update_policy(
                "p",
                "p",
                values(&["bob", "data2", "write"]),
                values(&["bob", "data2", "read"]),
            )
            .await
            .unwrap()
    );

    e.load_policy().await.unwrap();
    assert!(e.enforce(("bob", "data2", "read")).unwrap());
    assert!(!e.enforce(("bob", "data2", "write")).unwrap());

    // The old rule is gone
    assert!(
        !adapter
            .update_policy(
                "p",
                "p",
                values(&["bob", "data2", "write"]),
                values(&["bob", "data2", "read"]),
            )
            .await
            .unwrap()
    );

    // The rule kept its position
    let mut repo = repo;
    assert_eq!(
        repo.list().await.unwrap()[1],
        rule("p", &["bob", "data2", "read"])
    );
}

#[tokio::test]
async fn test_update_policies() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;
    let mut adapter = RuleAdapter::new(repo.clone());

    // Mismatched lengths don't touch anything
    assert!(
        !adapter
            .update_policies(
                "p",
                "p",
                vec![values(&["alice", "data1", "read"])],
                Vec::new(),
            )
            .await
            .unwrap()
    );

    assert!(
        adapter
            .update_policies(
                "p",
                "p",
                vec![
                    values(&["alice", "data1", "read"]),
                    values(&["bob", "data2", "write"]),
                ],
                vec![
                    values(&["alice", "data1", "write"]),
                    values(&["bob", "data2", "read"]),
                ],
            )
            .await
            .unwrap()
    );

    e.load_policy().await.unwrap();
    assert!(!e.enforce(("alice", "data1", "read")).unwrap());
    assert!(e.enforce(("alice", "data1", "write")).unwrap());
    assert!(e.enforce(("bob", "data2", "read")).unwrap());
    assert!(!e.enforce(("bob", "data2", "write")).unwrap());

    // One of the pairs has nothing to replace
    assert!(
        !adapter
            .update_policies(
                "p",
                "p",
                vec![
                    values(&["alice", "data1", "write"]),
                    values(&["carol", "data3", "read"]),
                ],
                vec![
                    values(&["alice", "data1", "read"]),
                    values(&["carol", "data3", "write"]),
                ],
            )
            .await
            .unwrap()
    );

    // The other one was still applied
    e.load_policy().await.unwrap();
    assert!(e.enforce(("alice", "data1", "read")).unwrap());
}

#[tokio::test]
async fn test_update_filtered_policies() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;
    let mut adapter = RuleAdapter::new(repo.clone());

    assert!(
        !adapter
            .update_filtered_policies(
                "p",
                "p",
                vec![values(&["carol", "data3", "read"])],
                6,
                values(&["read"]),
            )
            .await
            .unwrap()
    );

    assert!(
        adapter
            .update_filtered_policies(
                "p",
                "p",
                vec![
                    values(&["data2_admin", "data3", "read"]),
                    values(&["data2_admin", "data3", "write"]),
                ],
                0,
                values(&["data2_admin"]),
            )
            .await
            .unwrap()
    );

    e.load_policy().await.unwrap();
    assert!(!e.enforce(("alice", "data2", "read")).unwrap());
    assert!(!e.enforce(("alice", "data2", "write")).unwrap());
    assert!(e.enforce(("alice", "data3", "read")).unwrap());
    assert!(e.enforce(("alice", "data3", "write")).unwrap());
    assert!(e.enforce(("alice", "data1", "read")).unwrap());
}

#[tokio::test]
async fn test_load_filtered_policy() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;

    e.load_filtered_policy(Filter {
        p: vec!["", "data2"],
        g: vec!["bob"],
    })
    .await
    .unwrap();

    assert!(e.is_filtered());
    assert_eq!(
        e.get_policy(),
        vec![
            values(&["bob", "data2", "write"]),
            values(&["data2_admin", "data2", "read"]),
            values(&["data2_admin", "data2", "write"]),
        ]
    );
    assert!(e.get_grouping_policy().is_empty());

    // A full load clears the flag
    e.load_policy().await.unwrap();
    assert!(!e.is_filtered());
    assert_initial_policy(&e);
}

#[tokio::test]
async fn test_load_skips_unknown_types() {
    let repo = MemoryRuleRepository::new();
    let mut adapter = RuleAdapter::new(repo.clone());
    adapter
        .add_policy("p", "p", values(&["alice", "data1", "read"]))
        .await
        .unwrap();
    adapter
        .add_policy("g", "g2", values(&["data1", "data_group"]))
        .await
        .unwrap();

    let mut model = DefaultModel::from_str(RBAC_MODEL).await.unwrap();
    adapter.load_policy(&mut model).await.unwrap();

    let policy = model.get_model()["p"]["p"].get_policy();
    assert_eq!(policy.len(), 1);
    assert!(model.get_model()["g"].get("g2").is_none());
}

#[tokio::test]
async fn test_auto_save() {
    let repo = MemoryRuleRepository::new();
    let mut e = enforcer(&repo).await;

    assert!(
        e.add_policy(values(&["carol", "data3", "read"]))
            .await
            .unwrap()
    );
    assert!(
        e.remove_policy(values(&["bob", "data2", "write"]))
            .await
            .unwrap()
    );
    assert!(
        e.remove_filtered_policy(0, values(&["data2_admin"]))
            .await
            .unwrap()
    );

    let mut repo = repo;
    assert_eq!(
        repo.list().await.unwrap(),
        vec![
            rule("p", &["alice", "data1", "read"]),
            rule("g", &["alice", "data2_admin"]),
            rule("p", &["carol", "data3", "read"]),
        ]
    );
}

#[tokio::test]
async fn test_clear_and_drop() {
    let repo = MemoryRuleRepository::new();
    let _e = enforcer(&repo).await;
    let mut adapter = RuleAdapter::new(repo.clone());

    adapter.clear_policy().await.unwrap();
    let mut repo = repo;
    assert_eq!(repo.count().await.unwrap(), 0);

    adapter
        .add_policy("p", "p", values(&["alice", "data1", "read"]))
        .await
        .unwrap();
    adapter.drop_rules().await.unwrap();
    assert_eq!(repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_boxed_repository() {
    let repo = MemoryRuleRepository::new();
    let _e = enforcer(&repo).await;

    let model = DefaultModel::from_str(RBAC_MODEL).await.unwrap();
    let mut e = Enforcer::new(model, RuleAdapter::new(repo.clone().boxed()))
        .await
        .unwrap();
    e.load_policy().await.unwrap();
    assert_initial_policy(&e);

    // Errors from the backend go through the type-erased error
    repo.push_raw("not json").await;
    let err = e.load_policy().await.unwrap_err();
    assert!(matches!(err, casbin::Error::AdapterError(_)));
}

#[tokio::test]
async fn test_rules_written_by_python_adapter() {
    let repo = MemoryRuleRepository::new();
    // What json.dumps writes, which isn't byte for byte what we write
    repo.push_raw(r#"{"ptype": "p", "v0": "alice", "v1": "data1", "v2": "read"}"#)
        .await;
    repo.push_raw(r#"{"ptype": "p", "v0": "bob", "v1": "data2", "v2": "write"}"#)
        .await;
    repo.push_raw(r#"{"ptype": "g", "v0": "alice", "v1": "data2_admin"}"#)
        .await;

    let model = DefaultModel::from_str(RBAC_MODEL).await.unwrap();
    let mut e = Enforcer::new(model, RuleAdapter::new(repo.clone()))
        .await
        .unwrap();
    e.load_policy().await.unwrap();
    assert!(e.enforce(("alice", "data1", "read")).unwrap());

    let mut adapter = RuleAdapter::new(repo.clone());
    assert!(
        adapter
            .update_policy(
                "p",
                "p",
                values(&["alice", "data1", "read"]),
                values(&["alice", "data1", "write"]),
            )
            .await
            .unwrap()
    );

    // The enforcer only drops the rule from memory when the adapter removed it
    assert!(
        e.remove_policy(values(&["bob", "data2", "write"]))
            .await
            .unwrap()
    );
    assert!(!e.enforce(("bob", "data2", "write")).unwrap());

    let mut repo = repo;
    assert_eq!(
        repo.list().await.unwrap(),
        vec![
            rule("p", &["alice", "data1", "write"]),
            rule("g", &["alice", "data2_admin"]),
        ]
    );
}
