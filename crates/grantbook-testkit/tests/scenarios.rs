//! Lifecycle scenarios, run against every store backend.

use grantbook::{GrantState, GrantTarget, RequestOutcome, TargetId, UserId};
use grantbook_core::{DisplayNames, NewGrant, TARGET_PLACEHOLDER};
use grantbook_store::{GrantFilter, SqliteStore, Store};
use grantbook_testkit::fixtures::{BrokenTarget, TestFixture, ADMIN, ALICE, BOB};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn snapshot<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<Vec<grantbook::GrantRecord>> {
    Ok(fx.registry.store().find_grants(&GrantFilter::all()).await?)
}

async fn request_then_approve<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<()> {
    let t1 = fx.section("Docs", "Handbook");

    let outcome = fx.registry.request(ALICE, &t1).await?;
    assert!(matches!(outcome, RequestOutcome::Created(_)));
    let pending = outcome.record();
    assert_eq!(pending.state, GrantState::Pending);
    let flags = pending.flags();
    assert!(!flags.approved && flags.waiting && !flags.old_right);
    assert_eq!(pending.capability_name, "Docs: Handbook");
    assert_eq!(pending.short_name, "Handbook");
    assert_eq!(pending.granted_by, None);

    let active = fx.registry.approve(pending.id, ADMIN).await?.unwrap();
    assert_eq!(active.id, pending.id);
    assert_eq!(active.state, GrantState::Active);
    let flags = active.flags();
    assert!(flags.approved && !flags.waiting && !flags.old_right);
    assert_eq!(active.granted_by, Some(ADMIN));
    assert_eq!(fx.registry.get(active.id).await?, Some(active));
    Ok(())
}

async fn revoke_keeps_row<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<()> {
    let t1 = fx.section("Docs", "Handbook");
    let granted = fx.registry.grant(ALICE, &t1, ADMIN).await?;

    let revoked = fx.registry.revoke(ALICE, &t1.target_ref()).await?.unwrap();
    assert_eq!(revoked.id, granted.id);
    assert_eq!(revoked.state, GrantState::Revoked);
    let flags = revoked.flags();
    assert!(!flags.approved && !flags.waiting && flags.old_right);
    assert_eq!(revoked.granted_by, Some(ADMIN));

    let stored = fx.registry.get(granted.id).await?.unwrap();
    assert_eq!(stored.state, GrantState::Revoked);
    assert!(fx.registry.active_for_user(ALICE).await?.is_empty());
    assert_eq!(fx.registry.revoked_for_user(ALICE).await?.len(), 1);
    Ok(())
}

async fn revoke_without_record_changes_nothing<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<()> {
    let t1 = fx.section("Docs", "Handbook");
    let t2 = fx.section("Docs", "Changelog");
    fx.registry.grant(ALICE, &t1, ADMIN).await?;
    fx.registry.request(BOB, &t2).await?;
    let before = snapshot(fx).await?;

    let result = fx.registry.revoke(ALICE, &t2.target_ref()).await?;
    assert!(result.is_none());
    assert_eq!(snapshot(fx).await?, before);
    Ok(())
}

async fn bulk_approve_pending<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<()> {
    let t1 = fx.section("Docs", "Handbook");
    let t2 = fx.section("Docs", "Changelog");
    let t3 = fx.section("Ops", "Runbook");
    fx.registry.request(ALICE, &t1).await?;
    fx.registry.request(ALICE, &t2).await?;
    fx.registry.grant(ALICE, &t3, ADMIN).await?;
    fx.registry.revoke(ALICE, &t3.target_ref()).await?;
    fx.registry.request(BOB, &t1).await?;

    let approver = UserId(2);
    let approved = fx.registry.approve_all_pending(ALICE, approver).await?;
    assert_eq!(approved.len(), 2);
    for record in &approved {
        assert_eq!(record.state, GrantState::Active);
        assert_eq!(record.granted_by, Some(approver));
    }

    // revoked and other users' records are untouched
    assert_eq!(fx.registry.revoked_for_user(ALICE).await?.len(), 1);
    assert_eq!(fx.registry.pending_for_user(BOB).await?.len(), 1);
    assert_eq!(fx.registry.active_for_user(ALICE).await?.len(), 2);
    Ok(())
}

async fn failing_target_gets_placeholders<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<()> {
    let widget = BrokenTarget(TargetId(7));

    let outcome = fx.registry.request(ALICE, &widget).await?;
    let record = outcome.record();
    assert_eq!(record.capability_name, TARGET_PLACEHOLDER);
    assert_eq!(record.short_name, TARGET_PLACEHOLDER);
    assert_eq!(record.target, widget.target_ref());

    let approved = fx.registry.approve(record.id, ADMIN).await?.unwrap();
    assert_eq!(approved.capability_name, TARGET_PLACEHOLDER);
    assert_eq!(approved.state, GrantState::Active);
    Ok(())
}

async fn hard_delete_removes_every_state<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<()> {
    let t1 = fx.section("Docs", "Handbook");
    let t2 = fx.section("Docs", "Changelog");
    fx.registry.grant(ALICE, &t1, ADMIN).await?;
    fx.registry.request(ALICE, &t2).await?;
    fx.registry.request(BOB, &t1).await?;

    // a stale duplicate for the same pair, left by an older writer
    let mut stale = NewGrant::request(ALICE, t1.target_ref(), DisplayNames::new("Docs: Handbook", "Handbook"), 0);
    stale.state = GrantState::Revoked;
    stale.changed_at = Some(0);
    fx.registry.store().insert_grant(&stale).await?;

    let removed = fx.registry.delete_for_target(ALICE, &t1).await?;
    assert_eq!(removed, 2);
    assert!(fx.registry.for_target(&t1, None).await?.iter().all(|r| r.user == Some(BOB)));
    assert_eq!(fx.registry.for_user(ALICE).await?.len(), 1);

    // nothing left to delete
    assert_eq!(fx.registry.delete_for_target(ALICE, &t1).await?, 0);
    Ok(())
}

async fn approve_is_idempotent<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<()> {
    let t1 = fx.section("Docs", "Handbook");
    let first = fx.registry.grant(ALICE, &t1, ADMIN).await?;

    let second_admin = UserId(2);
    let again = fx.registry.approve(first.id, second_admin).await?.unwrap();
    assert_eq!(again.flags(), first.flags());
    assert_eq!(again.granted_by, Some(second_admin));
    assert!(again.changed_at >= first.changed_at);
    assert_eq!(again.requested_at, first.requested_at);
    assert_eq!(fx.registry.for_user(ALICE).await?.len(), 1);
    Ok(())
}

async fn request_revoke_request_round_trip<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<()> {
    let t1 = fx.section("Docs", "Handbook");
    let created = fx.registry.request(ALICE, &t1).await?.record().clone();
    let revoked = fx.registry.revoke(ALICE, &t1.target_ref()).await?.unwrap();
    assert_eq!(revoked.state, GrantState::Revoked);

    let renewed = fx.registry.request(ALICE, &t1).await?;
    assert!(matches!(renewed, RequestOutcome::Renewed(_)));
    let renewed = renewed.record();
    assert_eq!(renewed.state, GrantState::Pending);
    assert_eq!(renewed.target, created.target);
    assert_eq!(renewed.id, created.id);
    assert_eq!(renewed.requested_at, created.requested_at);
    assert!(renewed.changed_at.is_some());
    Ok(())
}

async fn names_follow_the_target<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<()> {
    let t1 = fx.section("Docs", "Handbook");
    let record = fx.registry.request(ALICE, &t1).await?.record().clone();

    fx.sections.rename(t1.id, "Staff Handbook");
    let approved = fx.registry.approve(record.id, ADMIN).await?.unwrap();
    assert_eq!(approved.capability_name, "Docs: Staff Handbook");
    assert_eq!(approved.short_name, "Staff Handbook");

    fx.sections.remove(t1.id);
    let revoked = fx.registry.revoke(ALICE, &t1.target_ref()).await?.unwrap();
    assert_eq!(revoked.capability_name, TARGET_PLACEHOLDER);
    assert_eq!(revoked.short_name, TARGET_PLACEHOLDER);
    assert_eq!(revoked.target, t1.target_ref());
    Ok(())
}

async fn detach_keeps_history<S: Store>(fx: &TestFixture<S>) -> anyhow::Result<()> {
    let t1 = fx.section("Docs", "Handbook");
    fx.registry.grant(ALICE, &t1, ADMIN).await?;
    fx.registry.request(BOB, &t1).await?;

    assert_eq!(fx.registry.detach_user(ALICE).await?, 1);
    assert!(fx.registry.for_user(ALICE).await?.is_empty());

    let on_target = fx.registry.for_target(&t1, None).await?;
    assert_eq!(on_target.len(), 2);
    assert!(on_target.iter().any(|r| r.user.is_none() && r.state == GrantState::Active));

    // unassigned records are never bulk-approved
    assert!(fx.registry.approve_all_pending(ALICE, ADMIN).await?.is_empty());

    // a fresh request for the same pair starts a new record
    let outcome = fx.registry.request(ALICE, &t1).await?;
    assert!(matches!(outcome, RequestOutcome::Created(_)));
    Ok(())
}

macro_rules! store_tests {
    ($($scenario:ident),* $(,)?) => {
        mod memory {
            use super::*;
            $(
                #[tokio::test]
                async fn $scenario() -> anyhow::Result<()> {
                    init_tracing();
                    super::$scenario(&TestFixture::new()).await
                }
            )*
        }

        mod sqlite {
            use super::*;
            $(
                #[tokio::test]
                async fn $scenario() -> anyhow::Result<()> {
                    init_tracing();
                    super::$scenario(&TestFixture::sqlite()?).await
                }
            )*
        }

        mod sqlite_file {
            use super::*;
            $(
                #[tokio::test]
                async fn $scenario() -> anyhow::Result<()> {
                    init_tracing();
                    let dir = tempfile::tempdir()?;
                    let store = SqliteStore::open(dir.path().join("grants.db"))?;
                    super::$scenario(&TestFixture::with_store(store)).await
                }
            )*
        }
    };
}

store_tests!(
    request_then_approve,
    revoke_keeps_row,
    revoke_without_record_changes_nothing,
    bulk_approve_pending,
    failing_target_gets_placeholders,
    hard_delete_removes_every_state,
    approve_is_idempotent,
    request_revoke_request_round_trip,
    names_follow_the_target,
    detach_keeps_history,
);
