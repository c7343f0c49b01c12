//! # Access Merge
//!
//! Collapses a user's subscriptions into one access view per tool.
//!
//! A tool can be reachable through several subscriptions at once: bought
//! directly, and again as part of one or more packages. The merge picks
//! the best grant for each tool:
//!
//! ```text
//! candidate replaces existing when
//!   candidate is active and existing is expired, or
//!   both have the same status and candidate expires later, or
//!   status and expiry tie and candidate has the preferred source
//! ```
//!
//! The preferred source is a direct tool purchase over a package, then the
//! lower item id, so the result never depends on subscription order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::{AccessGrantView, AccessStatus, ItemKind, ItemRef, Subscription};

/// Access status of a single subscription at `now`.
pub fn classify(subscription: &Subscription, now: DateTime<Utc>) -> AccessStatus {
    if subscription.is_current(now) {
        AccessStatus::Active
    } else {
        AccessStatus::Expired
    }
}

/// View granted to admins for every tool.
pub fn admin_view() -> AccessGrantView {
    AccessGrantView {
        status: AccessStatus::Active,
        expiry_date: None,
        source: None,
    }
}

fn source_rank(source: &Option<ItemRef>) -> (bool, Option<&str>) {
    match source {
        Some(item) => (item.kind != ItemKind::Tool, Some(item.id.as_str())),
        None => (true, None),
    }
}

fn outranks(candidate: &AccessGrantView, existing: &AccessGrantView) -> bool {
    match (candidate.status, existing.status) {
        (AccessStatus::Active, AccessStatus::Expired) => true,
        (a, b) if a == b => match candidate.expiry_date.cmp(&existing.expiry_date) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => source_rank(&candidate.source) < source_rank(&existing.source),
        },
        _ => false,
    }
}

/// Builds the per-tool access map.
///
/// `expand` maps a subscribed item to the tools it currently unlocks, or
/// `None` when the item no longer exists (the subscription is skipped).
pub fn merge_access<'a, I, F>(
    subscriptions: I,
    mut expand: F,
    now: DateTime<Utc>,
) -> BTreeMap<String, AccessGrantView>
where
    I: IntoIterator<Item = &'a Subscription>,
    F: FnMut(&ItemRef) -> Option<Vec<String>>,
{
    let mut access: BTreeMap<String, AccessGrantView> = BTreeMap::new();

    for subscription in subscriptions {
        let item = subscription.item();
        let Some(tool_ids) = expand(&item) else {
            continue;
        };

        let view = AccessGrantView {
            status: classify(subscription, now),
            expiry_date: Some(subscription.end_date),
            source: Some(item),
        };

        for tool_id in tool_ids {
            match access.get(&tool_id) {
                Some(existing) if !outranks(&view, existing) => {}
                _ => {
                    access.insert(tool_id, view.clone());
                }
            }
        }
    }

    access
}

// =============================================================================
// Unit Tests
// =============================================================================
