//! Proptest generators for property-based testing.
//!
//! Operations are drawn over a small universe of users and sections so
//! that random sequences collide on the same (user, target) pairs often.

use proptest::prelude::*;

use grantbook::{GrantState, GrantTarget, Result, UserId};
use grantbook_store::{GrantFilter, Store};

use crate::fixtures::{Section, TestFixture, ADMIN, ALICE, BOB, CAROL};

/// Number of sections a generated sequence can touch.
pub const SECTIONS: usize = 3;

/// One lifecycle operation. Sections are indexes into the fixture's list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Request { user: UserId, section: usize },
    Grant { user: UserId, section: usize },
    /// Approve the pair's record by id, if there is one.
    Approve { user: UserId, section: usize },
    ApproveAll { user: UserId },
    Revoke { user: UserId, section: usize },
    Delete { user: UserId, section: usize },
    Detach { user: UserId },
}

/// Generate one of the non-admin users.
pub fn user() -> impl Strategy<Value = UserId> {
    prop_oneof![Just(ALICE), Just(BOB), Just(CAROL)]
}

/// Generate a section index.
pub fn section() -> impl Strategy<Value = usize> {
    0..SECTIONS
}

/// Generate an operation. Detaching is rare so records stay assigned.
pub fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (user(), section()).prop_map(|(user, section)| Op::Request { user, section }),
        2 => (user(), section()).prop_map(|(user, section)| Op::Grant { user, section }),
        3 => (user(), section()).prop_map(|(user, section)| Op::Approve { user, section }),
        1 => user().prop_map(|user| Op::ApproveAll { user }),
        3 => (user(), section()).prop_map(|(user, section)| Op::Revoke { user, section }),
        1 => (user(), section()).prop_map(|(user, section)| Op::Delete { user, section }),
        1 => user().prop_map(|user| Op::Detach { user }),
    ]
}

/// Generate a sequence of up to `max_len` operations.
pub fn ops(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op(), 0..=max_len)
}

impl Arbitrary for Op {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        op().boxed()
    }
}

/// Run one operation against the fixture's registry.
pub async fn apply_op<S: Store>(
    fixture: &TestFixture<S>,
    sections: &[Section],
    op: &Op,
) -> Result<()> {
    let registry = &fixture.registry;
    match op {
        Op::Request { user, section } => {
            registry.request(*user, &sections[*section]).await?;
        }
        Op::Grant { user, section } => {
            registry.grant(*user, &sections[*section], ADMIN).await?;
        }
        Op::Approve { user, section } => {
            let target = sections[*section].target_ref();
            let filter = GrantFilter::for_user(*user).target(&target).limit(1);
            if let Some(record) = registry.store().find_grants(&filter).await?.into_iter().next() {
                registry.approve(record.id, ADMIN).await?;
            }
        }
        Op::ApproveAll { user } => {
            registry.approve_all_pending(*user, ADMIN).await?;
        }
        Op::Revoke { user, section } => {
            registry.revoke(*user, &sections[*section].target_ref()).await?;
        }
        Op::Delete { user, section } => {
            registry.delete_for_target(*user, &sections[*section]).await?;
        }
        Op::Detach { user } => {
            registry.detach_user(*user).await?;
        }
    }
    Ok(())
}

/// The state a single (user, section) pair should be in after `op`,
/// given the state it was in before. `None` means no record.
pub fn expected_state(before: Option<GrantState>, op: &Op) -> Option<GrantState> {
    match op {
        Op::Request { .. } => match before {
            None | Some(GrantState::Revoked) => Some(GrantState::Pending),
            live => live,
        },
        Op::Grant { .. } => Some(GrantState::Active),
        Op::Approve { .. } => before.map(|_| GrantState::Active),
        Op::ApproveAll { .. } => match before {
            Some(GrantState::Pending) => Some(GrantState::Active),
            other => other,
        },
        Op::Revoke { .. } => before.map(|_| GrantState::Revoked),
        Op::Delete { .. } | Op::Detach { .. } => None,
    }
}
