use std::collections::{BTreeSet, HashSet};

use crate::api::NoticeItem;

/// Notices whose id is not yet known, in fetch order.
///
/// Notices are append-only: one that disappears from the page is not a
/// change. Repeats within the same fetch are reported once.
pub fn fresh_notices(known_ids: &BTreeSet<String>, fetched: &[NoticeItem]) -> Vec<NoticeItem> {
    let mut seen = HashSet::new();
    fetched
        .iter()
        .filter(|n| !known_ids.contains(&n.id) && seen.insert(n.id.clone()))
        .cloned()
        .collect()
}
