//! The subject contract.

use crate::types::UserId;

/// Read access to the external identity store.
///
/// The registry only ever needs a display name for a user. A missing user
/// is an ordinary answer, not an error.
pub trait UserDirectory: Send + Sync {
    /// Full display name of the user, if the user is known.
    fn full_name(&self, user: UserId) -> Option<String>;
}

impl<F> UserDirectory for F
where
    F: Fn(UserId) -> Option<String> + Send + Sync,
{
    fn full_name(&self, user: UserId) -> Option<String> {
        self(user)
    }
}
