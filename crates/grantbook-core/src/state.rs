//! Grant lifecycle states.
//!
//! A grant is always in exactly one of three states. Older stores encode
//! the state as three booleans; [`GrantFlags`] is that encoding, kept as a
//! derived projection for listings and legacy filters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle state of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantState {
    /// Access currently granted.
    Active,
    /// Access requested, awaiting an administrator.
    Pending,
    /// Access previously granted or requested, now withdrawn.
    Revoked,
}

impl GrantState {
    /// All states, in display order.
    pub const ALL: [GrantState; 3] = [GrantState::Active, GrantState::Pending, GrantState::Revoked];

    /// Storage name of the state.
    pub const fn as_str(&self) -> &'static str {
        match self {
            GrantState::Active => "active",
            GrantState::Pending => "pending",
            GrantState::Revoked => "revoked",
        }
    }

    /// The canonical flag triple persisted for this state.
    pub const fn flags(&self) -> GrantFlags {
        match self {
            GrantState::Active => GrantFlags {
                approved: true,
                waiting: false,
                old_right: false,
            },
            GrantState::Pending => GrantFlags {
                approved: false,
                waiting: true,
                old_right: false,
            },
            GrantState::Revoked => GrantFlags {
                approved: false,
                waiting: false,
                old_right: true,
            },
        }
    }

    /// Decode a flag triple.
    ///
    /// `old_right` is ignored while `waiting` is set, so a user who asks
    /// again after revocation reads as pending. Returns `None` for the
    /// combinations that map to no state.
    pub const fn from_flags(approved: bool, waiting: bool, old_right: bool) -> Option<Self> {
        match (approved, waiting, old_right) {
            (true, false, false) => Some(GrantState::Active),
            (false, true, _) => Some(GrantState::Pending),
            (false, false, true) => Some(GrantState::Revoked),
            _ => None,
        }
    }
}

impl fmt::Display for GrantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GrantState::Active),
            "pending" => Ok(GrantState::Pending),
            "revoked" => Ok(GrantState::Revoked),
            other => Err(CoreError::InvalidState(other.to_string())),
        }
    }
}

/// The (approved, waiting, old_right) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantFlags {
    pub approved: bool,
    pub waiting: bool,
    pub old_right: bool,
}

impl GrantFlags {
    /// The state these flags encode, if any.
    pub const fn state(&self) -> Option<GrantState> {
        GrantState::from_flags(self.approved, self.waiting, self.old_right)
    }
}

impl From<GrantState> for GrantFlags {
    fn from(state: GrantState) -> Self {
        state.flags()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_flags_round_trip() {
        for state in GrantState::ALL {
            assert_eq!(state.flags().state(), Some(state));
        }
    }

    #[test]
    fn test_ignored_flags() {
        // old_right does not matter while waiting
        assert_eq!(GrantState::from_flags(false, true, true), Some(GrantState::Pending));
        assert_eq!(GrantState::from_flags(false, true, false), Some(GrantState::Pending));
    }

    #[test]
    fn test_illegal_triples_decode_to_none() {
        assert_eq!(GrantState::from_flags(true, true, false), None);
        assert_eq!(GrantState::from_flags(true, false, true), None);
        assert_eq!(GrantState::from_flags(true, true, true), None);
        assert_eq!(GrantState::from_flags(false, false, false), None);
    }

    #[test]
    fn test_state_parse() {
        assert_eq!("revoked".parse::<GrantState>().unwrap(), GrantState::Revoked);
        assert!("deleted".parse::<GrantState>().is_err());
    }

    fn state() -> impl Strategy<Value = GrantState> {
        prop_oneof![
            Just(GrantState::Active),
            Just(GrantState::Pending),
            Just(GrantState::Revoked),
        ]
    }

    proptest! {
        #[test]
        fn test_decoded_triples_are_stable(approved: bool, waiting: bool, old_right: bool) {
            if let Some(state) = GrantState::from_flags(approved, waiting, old_right) {
                prop_assert_eq!(state.flags().state(), Some(state));
                prop_assert_eq!(approved, state == GrantState::Active);
                prop_assert_eq!(waiting, state == GrantState::Pending);
            }
        }

        #[test]
        fn test_state_text_round_trip(state in state()) {
            prop_assert_eq!(state.as_str().parse::<GrantState>().unwrap(), state);
            prop_assert_eq!(GrantFlags::from(state), state.flags());
        }
    }
}
