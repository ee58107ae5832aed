//! Grant reconciliation through the user service.

mod common;

use keystone_access::{AccessError, FailurePoint, UpdateUserRequest};
use keystone_core::PermissionLevelId;
use keystone_db::DbError;

use common::{branch, select, stamp, TestContext, EDITOR, OPERATOR, S1, S2, VIEWER};

fn grants_only(permissions: Vec<keystone_access::SystemSelection>) -> UpdateUserRequest {
    UpdateUserRequest {
        profile: None,
        permissions,
    }
}

#[tokio::test]
async fn test_s1_editor_in_ny_only() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user("jdoe", vec![]).await;

    let mut entry = select(S1).with_level(EDITOR).check("NY");
    entry.branches.insert(
        branch("LA"),
        keystone_access::BranchCheck {
            name: "Los Angeles".to_string(),
            checked: false,
        },
    );

    ctx.service
        .update(user, grants_only(vec![entry]), &stamp("admin", 5), &ctx.cancel)
        .await
        .expect("update failed");

    assert_eq!(ctx.active_access(user).await, vec![(S1, EDITOR)]);
    assert_eq!(ctx.active_branches(user).await, vec![(S1, branch("NY"))]);
}

#[tokio::test]
async fn test_update_replaces_exactly_with_proposal() {
    let ctx = TestContext::new().await;
    let user = ctx
        .create_user(
            "jdoe",
            vec![
                select(S1).with_level(VIEWER).check("NY").check("LA"),
                select(S2).with_level(OPERATOR).check("LA"),
            ],
        )
        .await;

    let summary = ctx
        .service
        .update(
            user,
            grants_only(vec![select(S1).with_level(EDITOR).check("LA")]),
            &stamp("admin", 5),
            &ctx.cancel,
        )
        .await
        .unwrap();

    assert_eq!(summary.system_access_retired, 2);
    assert_eq!(summary.branch_grants_retired, 3);
    assert_eq!(summary.system_access_inserted, 1);
    assert_eq!(summary.branch_grants_inserted, 1);
    assert_eq!(ctx.active_access(user).await, vec![(S1, EDITOR)]);
    assert_eq!(ctx.active_branches(user).await, vec![(S1, branch("LA"))]);
}

#[tokio::test]
async fn test_retired_rows_are_kept_with_stamp() {
    let ctx = TestContext::new().await;
    let user = ctx
        .create_user("jdoe", vec![select(S1).with_level(VIEWER).check("NY")])
        .await;

    ctx.service
        .update(user, grants_only(vec![]), &stamp("auditor", 30), &ctx.cancel)
        .await
        .unwrap();

    let rows = ctx.store.system_access_rows(user).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, -1);
    assert_eq!(rows[0].modified_by.as_deref(), Some("auditor"));
    assert_eq!(rows[0].modified_at, Some(stamp("auditor", 30).at));

    let grants = ctx.store.branch_grant_rows(user).await;
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].status, -1);
}

#[tokio::test]
async fn test_inserted_rows_carry_stamp() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user("jdoe", vec![]).await;
    let when = stamp("admin", 12);

    ctx.service
        .update(
            user,
            grants_only(vec![select(S1).with_level(VIEWER).check("NY")]),
            &when,
            &ctx.cancel,
        )
        .await
        .unwrap();

    let row = &ctx.store.system_access_rows(user).await[0];
    assert_eq!(row.status, 0);
    assert_eq!(row.created_by, "admin");
    assert_eq!(row.created_at, when.at);
    assert_eq!(row.modified_by.as_deref(), Some("admin"));
}

#[tokio::test]
async fn test_applying_same_proposal_twice_is_stable() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user("jdoe", vec![]).await;
    let proposal = vec![
        select(S1).with_level(EDITOR).check("NY"),
        select(S2).with_level(OPERATOR).check("NY").check("LA"),
    ];

    for minute in [1, 2] {
        ctx.service
            .update(
                user,
                grants_only(proposal.clone()),
                &stamp("admin", minute),
                &ctx.cancel,
            )
            .await
            .unwrap();
    }

    assert_eq!(ctx.active_access(user).await, vec![(S1, EDITOR), (S2, OPERATOR)]);
    assert_eq!(
        ctx.active_branches(user).await,
        vec![(S1, branch("NY")), (S2, branch("LA")), (S2, branch("NY"))]
    );
    // Second pass retired the first pass's rows instead of diffing.
    assert_eq!(ctx.store.system_access_rows(user).await.len(), 4);
}

#[tokio::test]
async fn test_branch_without_level_rejected_before_any_write() {
    let ctx = TestContext::new().await;
    let user = ctx
        .create_user("jdoe", vec![select(S1).with_level(VIEWER).check("LA")])
        .await;

    let err = ctx
        .service
        .update(
            user,
            grants_only(vec![select(S1)
                .with_level(PermissionLevelId::new(0))
                .check("NY")]),
            &stamp("admin", 5),
            &ctx.cancel,
        )
        .await
        .unwrap_err();

    let violations = err.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].code, "permission_required");
    assert_eq!(violations[0].system_id, Some(S1));

    assert_eq!(ctx.active_access(user).await, vec![(S1, VIEWER)]);
    assert_eq!(ctx.store.system_access_rows(user).await.len(), 1);
}

#[tokio::test]
async fn test_level_without_branch_rejected() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user("jdoe", vec![]).await;

    let err = ctx
        .service
        .update(
            user,
            grants_only(vec![select(S2).with_level(OPERATOR)]),
            &stamp("admin", 5),
            &ctx.cancel,
        )
        .await
        .unwrap_err();

    assert_eq!(err.violations()[0].code, "branch_required");
}

#[tokio::test]
async fn test_empty_entry_writes_nothing_for_system() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user("jdoe", vec![]).await;

    ctx.service
        .update(
            user,
            grants_only(vec![select(S1), select(S2).with_level(OPERATOR).check("LA")]),
            &stamp("admin", 5),
            &ctx.cancel,
        )
        .await
        .unwrap();

    assert_eq!(ctx.active_access(user).await, vec![(S2, OPERATOR)]);
}

#[tokio::test]
async fn test_catalog_and_rule_violations_reported_together() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user("jdoe", vec![]).await;

    let err = ctx
        .service
        .update(
            user,
            grants_only(vec![
                select(S1).check("NY"),
                select(S2).with_level(VIEWER).check("SF"),
            ]),
            &stamp("admin", 5),
            &ctx.cancel,
        )
        .await
        .unwrap_err();

    let codes: Vec<_> = err.violations().iter().map(|v| v.code.as_str()).collect();
    assert_eq!(
        codes,
        vec!["permission_required", "unknown_branch", "invalid_permission_level"]
    );
}

#[tokio::test]
async fn test_branch_codes_stored_in_catalog_case() {
    let ctx = TestContext::new().await;
    let user = ctx
        .create_user("jdoe", vec![select(S1).with_level(VIEWER).check(" ny ")])
        .await;

    assert_eq!(ctx.active_branches(user).await, vec![(S1, branch("NY"))]);
}

async fn assert_failure_keeps_prior_state(point: FailurePoint) {
    let ctx = TestContext::new().await;
    let user = ctx
        .create_user("jdoe", vec![select(S1).with_level(VIEWER).check("NY")])
        .await;

    ctx.store.fail_at(point).await;
    let err = ctx
        .service
        .update(
            user,
            UpdateUserRequest {
                profile: Some(common::profile("jdoe2", "jdoe2@acme.test")),
                permissions: vec![select(S2).with_level(OPERATOR).check("LA")],
            },
            &stamp("admin", 5),
            &ctx.cancel,
        )
        .await
        .unwrap_err();
    ctx.store.clear_failure().await;

    assert!(
        matches!(err, AccessError::Storage(DbError::Unavailable(_))),
        "unexpected error for {point:?}: {err:?}"
    );
    assert_eq!(ctx.active_access(user).await, vec![(S1, VIEWER)]);
    assert_eq!(ctx.active_branches(user).await, vec![(S1, branch("NY"))]);
    assert_eq!(ctx.store.system_access_rows(user).await.len(), 1);

    let profile = ctx.store.profile_row(user).await.unwrap();
    assert_eq!(profile.username, "jdoe");
    assert!(profile.modified_at.is_none());
}

#[tokio::test]
async fn test_failure_while_retiring_rolls_back() {
    assert_failure_keeps_prior_state(FailurePoint::RetireGrants).await;
}

#[tokio::test]
async fn test_failure_inserting_access_rolls_back() {
    assert_failure_keeps_prior_state(FailurePoint::InsertSystemAccess).await;
}

#[tokio::test]
async fn test_failure_inserting_branch_rolls_back() {
    assert_failure_keeps_prior_state(FailurePoint::InsertBranchGrant).await;
}

#[tokio::test]
async fn test_failure_updating_profile_rolls_back() {
    assert_failure_keeps_prior_state(FailurePoint::UpdateProfile).await;
}

#[tokio::test]
async fn test_failure_at_commit_rolls_back() {
    assert_failure_keeps_prior_state(FailurePoint::Commit).await;
}

#[tokio::test]
async fn test_cancelled_before_begin_writes_nothing() {
    let ctx = TestContext::new().await;
    let user = ctx
        .create_user("jdoe", vec![select(S1).with_level(VIEWER).check("NY")])
        .await;

    ctx.cancel.cancel();
    let err = ctx
        .service
        .update(
            user,
            grants_only(vec![select(S1).with_level(EDITOR).check("LA")]),
            &stamp("admin", 5),
            &ctx.cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::Cancelled));
    assert_eq!(ctx.active_access(user).await, vec![(S1, VIEWER)]);
}

#[tokio::test]
async fn test_update_unknown_user_not_found() {
    let ctx = TestContext::new().await;
    let err = ctx
        .service
        .update(
            keystone_core::UserProfileId::new(404),
            grants_only(vec![]),
            &stamp("admin", 5),
            &ctx.cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::NotFound(id) if id.get() == 404));
}
