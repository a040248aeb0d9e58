//! Group membership arithmetic.
//!
//! Pure functions over [`GroupList`]: backends read the current list, apply
//! one of these, and write the result back.

use super::GroupList;

/// Union of `current` and `additions`.
///
/// Existing groups keep their order; groups not yet present are appended in
/// the order given. Applying the same additions twice yields the same list.
pub fn merge_groups<S: AsRef<str>>(current: &GroupList, additions: &[S]) -> GroupList {
    let mut merged = current.clone();
    for group in additions {
        let group: &str = group.as_ref();
        merged.push(group);
    }
    merged
}

/// `current` without any group listed in `removals`.
///
/// Removing a group that is not present is a no-op for that group.
pub fn remove_groups<S: AsRef<str>>(current: &GroupList, removals: &[S]) -> GroupList {
    current
        .as_slice()
        .iter()
        .filter(|group| {
            !removals.iter().any(|r| {
                let r: &str = r.as_ref();
                r == group.as_str()
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(groups: &[&str]) -> GroupList {
        groups.iter().copied().collect()
    }

    #[test]
    fn test_merge_into_empty() {
        let merged = merge_groups(&GroupList::new(), &["g1", "g2"]);
        assert_eq!(merged.as_slice(), ["g1", "g2"]);
    }

    #[test]
    fn test_merge_preserves_order_and_appends() {
        let current = merge_groups(&GroupList::new(), &["a", "b"]);
        let merged = merge_groups(&current, &["b", "c"]);
        assert_eq!(merged.as_slice(), ["a", "b", "c"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge_groups(&list(&["x"]), &["a", "b"]);
        let twice = merge_groups(&once, &["a", "b"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_deduplicates_input() {
        let merged = merge_groups(&GroupList::new(), &["a", "a", "b", "a"]);
        assert_eq!(merged.as_slice(), ["a", "b"]);
    }

    #[test]
    fn test_remove_difference() {
        let current = list(&["a", "b", "c"]);
        let remaining = remove_groups(&current, &["b"]);
        assert_eq!(remaining.as_slice(), ["a", "c"]);
    }

    #[test]
    fn test_remove_absent_group_is_noop() {
        let current = list(&["a", "b"]);
        let remaining = remove_groups(&current, &["zzz"]);
        assert_eq!(remaining, current);
    }

    #[test]
    fn test_remove_everything() {
        let current = list(&["a", "b"]);
        let remaining = remove_groups(&current, &["b", "a"]);
        assert!(remaining.is_empty());
        assert_eq!(remaining.to_column(), "");
    }
}
