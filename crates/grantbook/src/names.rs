//! Display-name resolution.
//!
//! This is the one place where a failing target is tolerated: each name
//! is produced by an explicit fallible call, and only that call's error (or
//! panic) is turned into the placeholder.
//!
//! Resolution always runs outside the store's transaction. The registry
//! resolves names first and hands the store a mutator that only applies them.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use grantbook_core::{DisplayNames, GrantRecord, GrantTarget, TargetError, TargetRef, TargetRegistry};

/// Run target-supplied code, turning a panic into an ordinary lookup error.
fn contained<T>(call: impl FnOnce() -> Result<T, TargetError>) -> Result<T, TargetError> {
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|_| Err(TargetError::Lookup("target code panicked".to_string())))
}

/// Names for a live target entity.
pub(crate) fn names_for(target: &dyn GrantTarget, placeholder: &str) -> DisplayNames {
    let capability_name = contained(|| target.permission_name()).unwrap_or_else(|err| {
        tracing::warn!(target_ref = %target.target_ref(), error = %err, "permission name unavailable");
        placeholder.to_string()
    });

    let short_name = contained(|| target.short_name()).unwrap_or_else(|err| {
        tracing::warn!(target_ref = %target.target_ref(), error = %err, "short name unavailable");
        placeholder.to_string()
    });

    DisplayNames {
        capability_name,
        short_name,
    }
}

/// Names for a stored reference, looking the entity up first.
pub(crate) fn names_for_ref(
    targets: &TargetRegistry,
    target: &TargetRef,
    placeholder: &str,
) -> DisplayNames {
    match contained(|| targets.resolve(target)) {
        Ok(entity) => names_for(entity.as_ref(), placeholder),
        Err(err) => {
            tracing::warn!(target_ref = %target, error = %err, "target unresolvable, storing placeholder names");
            DisplayNames::placeholder(placeholder)
        }
    }
}

/// Names for every distinct target among `records`, resolved once each.
pub(crate) fn names_by_target(
    targets: &TargetRegistry,
    records: &[GrantRecord],
    placeholder: &str,
) -> HashMap<TargetRef, DisplayNames> {
    let mut names = HashMap::new();
    for record in records {
        if !names.contains_key(&record.target) {
            let resolved = names_for_ref(targets, &record.target, placeholder);
            names.insert(record.target.clone(), resolved);
        }
    }
    names
}
