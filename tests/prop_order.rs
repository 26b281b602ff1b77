use proptest::prelude::*;

use gtd_core::merge::{is_gapless, SyncData};
use gtd_core::order::{diff_order, patch_order};
use gtd_core::types::OffsetMap;

fn shuffled_keys() -> impl Strategy<Value = Vec<String>> {
    (0usize..8).prop_flat_map(|n| {
        Just((0..n).map(|i| format!("k{}", i)).collect::<Vec<_>>()).prop_shuffle()
    })
}

proptest! {
    /// `patch_order(a, diff_order(a, b)) == b` for any permutation `b`.
    #[test]
    fn prop_diff_patch_roundtrip(b in shuffled_keys()) {
        let mut a = b.clone();
        a.sort();

        let diff = diff_order(&a, &b).unwrap();
        prop_assert_eq!(patch_order(&a, &diff).unwrap(), b);
    }

    /// Patching never invents or loses elements, whatever the groups say.
    #[test]
    fn prop_patch_preserves_elements(
        items in shuffled_keys(),
        anchor in "[a-z k0-7]{0,2}",
        keys in prop::collection::vec("k[0-7]", 0..4),
    ) {
        let groups = [gtd_core::order::OrderGroup {
            anchor: if anchor.is_empty() { None } else { Some(anchor) },
            keys,
        }];
        if let Ok(patched) = patch_order(&items, &groups) {
            let mut before = items.clone();
            let mut after = patched;
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
        }
    }

    /// `is_gapless` holds exactly when every advertised range starts at
    /// or before the local end-of-file for its replica.
    #[test]
    fn prop_gapless_law(
        local in prop::collection::btree_map("[a-z]{2}", 0u64..100, 0..4),
        payload in prop::collection::btree_map("[a-z]{2}", (0u64..100, Just("x".to_string())), 0..4),
    ) {
        let local: OffsetMap = local;
        let payload: SyncData = payload;

        let expected = payload
            .iter()
            .all(|(app_id, (start, _))| *start <= local.get(app_id).copied().unwrap_or(0));
        prop_assert_eq!(is_gapless(&local, &payload), expected);
    }
}
