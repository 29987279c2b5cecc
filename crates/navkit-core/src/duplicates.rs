//! Duplicate detection by normalized URL.
//!
//! The detector only reports; choosing which member of a group survives is
//! the caller's policy. [`ids_to_remove`] turns such a choice into the list
//! of ids to delete.

use std::collections::{HashMap, HashSet};

use crate::models::CanonicalItem;
use crate::normalize::normalize;

/// Items sharing one normalized URL. Always holds at least two items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub normalized_key: String,
    pub items: Vec<CanonicalItem>,
}

impl DuplicateGroup {
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DuplicateStats {
    pub total_groups: usize,
    pub total_items: usize,
    /// Items removable if one representative per group is kept.
    pub can_remove: usize,
}

/// Group `items` by normalized URL and return groups with two or more members.
///
/// Groups are sorted by descending size; equal sizes keep the order in
/// which their key was first seen. Members keep input order.
pub fn find_duplicates(items: &[CanonicalItem]) -> Vec<DuplicateGroup> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut groups: Vec<DuplicateGroup> = Vec::new();

    for item in items {
        let key = normalize(&item.url);
        match slots.get(&key) {
            Some(&slot) => groups[slot].items.push(item.clone()),
            None => {
                slots.insert(key.clone(), groups.len());
                groups.push(DuplicateGroup {
                    normalized_key: key,
                    items: vec![item.clone()],
                });
            }
        }
    }

    groups.retain(|g| g.count() >= 2);
    // stable sort keeps first-seen order among equal counts
    groups.sort_by(|a, b| b.count().cmp(&a.count()));
    groups
}

pub fn duplicate_stats(groups: &[DuplicateGroup]) -> DuplicateStats {
    DuplicateStats {
        total_groups: groups.len(),
        total_items: groups.iter().map(DuplicateGroup::count).sum(),
        can_remove: groups.iter().map(|g| g.count().saturating_sub(1)).sum(),
    }
}

/// Ids to delete given a per-group choice of which item to keep.
///
/// `keep` maps a group's index in `groups` to the id of its survivor.
/// Groups without a choice, or whose chosen id is not a member, keep their
/// first item. Empty groups are ignored.
pub fn ids_to_remove(groups: &[DuplicateGroup], keep: &HashMap<usize, String>) -> Vec<String> {
    let mut removed = Vec::new();
    let mut seen = HashSet::new();

    for (index, group) in groups.iter().enumerate() {
        let Some(first) = group.items.first() else {
            continue;
        };
        let survivor = keep
            .get(&index)
            .filter(|id| group.items.iter().any(|item| &item.id == *id))
            .map(String::as_str)
            .unwrap_or(first.id.as_str());

        for item in &group.items {
            if item.id != survivor && seen.insert(item.id.clone()) {
                removed.push(item.id.clone());
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, url: &str) -> CanonicalItem {
        CanonicalItem::new(id, url, "Dev").with_id(id)
    }

    #[test]
    fn groups_protocol_and_slash_variants() {
        let items = vec![
            item("a", "http://x.com/"),
            item("b", "https://x.com"),
            item("c", "https://y.com"),
            item("d", "https://www.X.com"),
        ];
        let groups = find_duplicates(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].normalized_key, "x.com");
        let ids: Vec<&str> = groups[0].items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d"]);
    }

    #[test]
    fn never_returns_singletons() {
        let items = vec![item("a", "https://a.dev"), item("b", "https://b.dev")];
        assert!(find_duplicates(&items).is_empty());
        assert!(find_duplicates(&[]).is_empty());
    }

    #[test]
    fn sorted_by_size_then_first_seen() {
        let items = vec![
            item("p1", "https://p.dev"),
            item("q1", "https://q.dev"),
            item("p2", "https://p.dev"),
            item("r1", "https://r.dev"),
            item("q2", "https://q.dev"),
            item("r2", "https://r.dev"),
            item("r3", "https://r.dev"),
        ];
        let keys: Vec<String> = find_duplicates(&items)
            .into_iter()
            .map(|g| g.normalized_key)
            .collect();
        assert_eq!(keys, vec!["r.dev", "p.dev", "q.dev"]);
    }

    #[test]
    fn can_remove_is_sum_of_count_minus_one() {
        let items = vec![
            item("a1", "https://a.dev"),
            item("a2", "https://a.dev"),
            item("a3", "https://a.dev"),
            item("b1", "https://b.dev"),
            item("b2", "https://b.dev"),
        ];
        let stats = duplicate_stats(&find_duplicates(&items));
        assert_eq!(
            stats,
            DuplicateStats {
                total_groups: 2,
                total_items: 5,
                can_remove: 3,
            }
        );
    }

    #[test]
    fn removal_honors_keep_choice() {
        let items = vec![
            item("a1", "https://a.dev"),
            item("a2", "https://a.dev/"),
            item("b1", "https://b.dev"),
            item("b2", "http://b.dev"),
        ];
        let groups = find_duplicates(&items);
        let mut keep = HashMap::new();
        keep.insert(0, "a2".to_string());
        keep.insert(1, "not-a-member".to_string());
        assert_eq!(ids_to_remove(&groups, &keep), vec!["a1", "b2"]);
    }

    #[test]
    fn empty_hand_built_group_is_ignored() {
        let groups = vec![
            DuplicateGroup {
                normalized_key: "gone.dev".into(),
                items: Vec::new(),
            },
            DuplicateGroup {
                normalized_key: "a.dev".into(),
                items: vec![item("a1", "https://a.dev"), item("a2", "https://a.dev/")],
            },
        ];
        assert_eq!(ids_to_remove(&groups, &HashMap::new()), vec!["a2"]);
        assert_eq!(duplicate_stats(&groups).can_remove, 1);
    }
}
