//! Administrative listing of grants.
//!
//! A read-only view: administrators filter and search records here and
//! transition them through the registry. Nothing in this module creates
//! a record.

use grantbook_core::{GrantId, GrantState, UserDirectory, UserId};
use grantbook_store::{GrantFilter, Store, UserFilter};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::GrantRegistry;

/// Filters for the admin listing. The default lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantListQuery {
    /// Only records with no subject attached.
    pub unassigned_only: bool,
    pub approved: Option<bool>,
    pub waiting: Option<bool>,
    pub old_right: Option<bool>,
    /// Case-insensitive match on capability name or user full name.
    pub search: Option<String>,
}

impl GrantListQuery {
    /// States whose flags satisfy every flag filter.
    fn states(&self) -> Vec<GrantState> {
        GrantState::ALL
            .into_iter()
            .filter(|state| {
                let flags = state.flags();
                self.approved.map_or(true, |v| flags.approved == v)
                    && self.waiting.map_or(true, |v| flags.waiting == v)
                    && self.old_right.map_or(true, |v| flags.old_right == v)
            })
            .collect()
    }
}

/// One row of the admin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantListRow {
    pub id: GrantId,
    pub capability_name: String,
    pub user: Option<UserId>,
    pub user_full_name: String,
    pub approved: bool,
    pub waiting: bool,
    pub old_right: bool,
}

impl<S: Store> GrantRegistry<S> {
    /// List records for the admin surface, ordered by id.
    pub async fn list(
        &self,
        query: &GrantListQuery,
        users: &dyn UserDirectory,
    ) -> Result<Vec<GrantListRow>> {
        let states = query.states();
        if states.is_empty() {
            // contradictory flag filters
            return Ok(Vec::new());
        }

        let mut filter = GrantFilter::all();
        if query.unassigned_only {
            filter.user = UserFilter::Unassigned;
        }
        if states.len() < GrantState::ALL.len() {
            filter.states = states;
        }

        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let placeholder = &self.config().placeholders.user;
        let rows = self
            .find(filter)
            .await?
            .into_iter()
            .filter(|record| match &needle {
                // unknown users only ever match through the capability name
                Some(needle) => {
                    record.capability_name.to_lowercase().contains(needle.as_str())
                        || record
                            .user
                            .and_then(|user| users.full_name(user))
                            .is_some_and(|name| name.to_lowercase().contains(needle.as_str()))
                }
                None => true,
            })
            .map(|record| {
                let flags = record.flags();
                GrantListRow {
                    id: record.id,
                    user_full_name: record.user_full_name(users, placeholder),
                    capability_name: record.capability_name,
                    user: record.user,
                    approved: flags.approved,
                    waiting: flags.waiting,
                    old_right: flags.old_right,
                }
            })
            .collect();

        Ok(rows)
    }
}
