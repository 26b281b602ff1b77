//!
//! Order diffs: a permutation delta encoded as anchored groups.
//!
//! A group moves its keys to sit immediately after its anchor, or to the
//! front of the sequence when the anchor is absent. Building a diff from
//! two permutations decomposes them along a longest common subsequence,
//! so only the elements that actually moved are listed.

use std::collections::HashSet;
use std::hash::Hash;

use crate::error::OrderError;

/// One anchored group of an order diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderGroup<K> {
    /// `None` anchors the group at the front of the sequence.
    pub anchor: Option<K>,
    pub keys: Vec<K>,
}

/// Apply a diff to a sequence.
///
/// Keys unknown to the sequence are dropped silently, as is a whole group
/// whose anchor is unknown or whose keys all vanished; a group listing
/// the same key twice is an error.
pub fn patch_order<K>(items: &[K], groups: &[OrderGroup<K>]) -> Result<Vec<K>, OrderError>
where
    K: Eq + Hash + Clone,
{
    let mut result: Vec<K> = items.to_vec();

    for group in groups {
        let mut seen = HashSet::new();
        for key in &group.keys {
            if !seen.insert(key) {
                return Err(OrderError::DuplicateKey);
            }
        }

        let keys: Vec<K> = group
            .keys
            .iter()
            .filter(|key| result.contains(key))
            .cloned()
            .collect();
        if keys.is_empty() {
            continue;
        }
        if let Some(anchor) = &group.anchor {
            // an anchor that is unknown, or about to be moved by its own
            // group, leaves the group inapplicable
            if !result.contains(anchor) || keys.contains(anchor) {
                continue;
            }
        }

        result.retain(|key| !keys.contains(key));
        let at = match &group.anchor {
            None => 0,
            Some(anchor) => result
                .iter()
                .position(|key| key == anchor)
                .map_or(0, |i| i + 1),
        };
        result.splice(at..at, keys);
    }

    Ok(result)
}

/// Build the diff that turns `a` into `b`, which must be a permutation of
/// `a` with no repeated elements.
pub fn diff_order<K>(a: &[K], b: &[K]) -> Result<Vec<OrderGroup<K>>, OrderError>
where
    K: Eq + Hash + Clone,
{
    if a.len() != b.len() {
        return Err(OrderError::NotAPermutation);
    }
    let set_a: HashSet<&K> = a.iter().collect();
    let set_b: HashSet<&K> = b.iter().collect();
    if set_a.len() != a.len() || set_b.len() != b.len() || set_a != set_b {
        return Err(OrderError::NotAPermutation);
    }

    let n = a.len();
    let mut table = vec![vec![0u32; n + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=n {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }

    // walk back from the ends, preferring to drop from `a` on ties, and
    // mark the positions of `b` that stay put
    let mut stays = vec![false; n];
    let (mut i, mut j) = (n, n);
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            stays[j - 1] = true;
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] >= table[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }

    // every divergent span of `b` becomes one group anchored at its
    // predecessor, which by construction is a stationary element
    let mut groups = Vec::new();
    let mut j = 0;
    while j < n {
        if stays[j] {
            j += 1;
            continue;
        }
        let anchor = if j == 0 { None } else { Some(b[j - 1].clone()) };
        let mut keys = Vec::new();
        while j < n && !stays[j] {
            keys.push(b[j].clone());
            j += 1;
        }
        groups.push(OrderGroup { anchor, keys });
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn group(anchor: Option<char>, keys: &str) -> OrderGroup<char> {
        OrderGroup {
            anchor,
            keys: chars(keys),
        }
    }

    #[test]
    fn test_diff_order_rejects_non_permutations() {
        assert_eq!(
            diff_order(&chars("a"), &chars("ab")),
            Err(OrderError::NotAPermutation)
        );
        assert_eq!(
            diff_order(&chars("ab"), &chars("ac")),
            Err(OrderError::NotAPermutation)
        );
        assert_eq!(
            diff_order(&chars("aab"), &chars("aba")),
            Err(OrderError::NotAPermutation)
        );
    }

    #[test]
    fn test_diff_order() {
        let a = chars("abcdef");
        assert_eq!(diff_order(&a, &a).unwrap(), vec![]);

        assert_eq!(
            diff_order(&a, &chars("fabcde")).unwrap(),
            vec![group(None, "f")]
        );
        assert_eq!(
            diff_order(&a, &chars("fbcdea")).unwrap(),
            vec![group(None, "f"), group(Some('e'), "a")]
        );
        assert_eq!(
            diff_order(&a, &chars("defabc")).unwrap(),
            vec![group(None, "def")]
        );
        assert_eq!(
            diff_order(&a, &chars("abdcef")).unwrap(),
            vec![group(Some('b'), "d")]
        );
    }

    #[test]
    fn test_patch_order_rejects_duplicate_keys() {
        assert_eq!(
            patch_order(&[], &[group(Some('a'), "bb")]),
            Err(OrderError::DuplicateKey)
        );
    }

    #[test]
    fn test_patch_order() {
        let items = chars("abcdef");

        assert_eq!(
            patch_order(&items, &[group(None, "")]).unwrap(),
            items
        );
        assert_eq!(
            patch_order(&items, &[group(None, "f")]).unwrap(),
            chars("fabcde")
        );
        assert_eq!(
            patch_order(&items, &[group(Some('b'), "d")]).unwrap(),
            chars("abdcef")
        );

        // unknown anchors and unknown keys degrade to no-ops
        assert_eq!(
            patch_order(&items, &[group(Some('x'), "d")]).unwrap(),
            items
        );
        assert_eq!(
            patch_order(&items, &[group(Some('x'), "y")]).unwrap(),
            items
        );
        assert_eq!(
            patch_order(&items, &[group(Some('a'), "xy")]).unwrap(),
            items
        );
    }

    #[test]
    fn test_roundtrip_all_permutations_of_four() {
        let a = chars("abcd");
        let mut b = a.clone();
        // Heap's algorithm, iterative
        let mut stack = vec![0usize; b.len()];
        check_roundtrip(&a, &b);
        let mut i = 0;
        while i < b.len() {
            if stack[i] < i {
                if i % 2 == 0 {
                    b.swap(0, i);
                } else {
                    b.swap(stack[i], i);
                }
                check_roundtrip(&a, &b);
                stack[i] += 1;
                i = 0;
            } else {
                stack[i] = 0;
                i += 1;
            }
        }
    }

    fn check_roundtrip(a: &[char], b: &[char]) {
        let diff = diff_order(a, b).unwrap();
        assert_eq!(patch_order(a, &diff).unwrap(), b, "diff {:?}", diff);
    }
}
