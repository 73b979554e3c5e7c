//! Property-based tests for the node merge algorithm.

use proptest::prelude::*;

use super::merge::{merge, merge_all};
use super::{flatten, Node};

// Strategy for flat key/value pair sets with simple segment names, nested
// up to three levels deep.
fn pairs_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(
        (
            prop::collection::vec("[a-z]{1,4}", 1..=3).prop_map(|segments| segments.join(".")),
            "[a-z0-9]{0,6}",
        ),
        0..8,
    )
}

fn tree_strategy() -> impl Strategy<Value = Node> {
    pairs_strategy().prop_map(|pairs| {
        // Pairs with prefix collisions still merge into one tree; the
        // constructor cannot fail for object-only shapes.
        Node::from_pairs(pairs).expect("object-only pairs always merge")
    })
}

proptest! {
    // Merging a tree with itself returns an equal tree.
    #[test]
    fn prop_merge_idempotent(tree in tree_strategy()) {
        let merged = merge(&tree, &tree).expect("self merge never conflicts");
        prop_assert_eq!(merged, tree);
    }

    // Merging with an empty object changes nothing, in either position.
    #[test]
    fn prop_empty_object_is_identity(tree in tree_strategy()) {
        let empty = Node::object();
        let as_lower = merge(&tree, &empty).expect("merge with empty");
        prop_assert_eq!(&as_lower, &tree);
        let as_higher = merge(&empty, &tree).expect("merge with empty");
        prop_assert_eq!(&as_higher, &tree);
    }

    // Every leaf of the higher tree survives the merge unchanged.
    #[test]
    fn prop_higher_leaves_win(higher in tree_strategy(), lower in tree_strategy()) {
        if let Ok(merged) = merge(&higher, &lower) {
            for (key, value) in flatten::leaf_values(&higher) {
                // A higher leaf can gain structure from the lower tree (the
                // value moves into the direct-value slot), so compare via
                // the merged node's direct value.
                let node = merged
                    .lookup(&key.parse().expect("flattened keys re-parse"))
                    .expect("higher keys survive");
                prop_assert_eq!(node.direct_value(), Some(value.as_str()));
            }
        }
    }

    // The merged key set is the union of both key sets.
    #[test]
    fn prop_merged_keys_are_union(higher in tree_strategy(), lower in tree_strategy()) {
        if let Ok(merged) = merge(&higher, &lower) {
            let merged_keys: Vec<_> = flatten::full_key_map(&merged).keys().cloned().collect();
            for key in flatten::full_key_map(&higher).keys() {
                prop_assert!(merged_keys.contains(key));
            }
            for key in flatten::full_key_map(&lower).keys() {
                prop_assert!(merged_keys.contains(key));
            }
        }
    }

    // Folding [a, b] then c equals folding a then [b, c] merged stepwise:
    // the fold applied in one fixed priority order is associative.
    #[test]
    fn prop_fold_is_associative_in_priority_order(
        a in tree_strategy(),
        b in tree_strategy(),
        c in tree_strategy(),
    ) {
        let left = merge(&a, &b).and_then(|ab| merge(&ab, &c));
        let right = merge(&b, &c).and_then(|bc| merge(&a, &bc));
        if let (Ok(left), Ok(right)) = (left, right) {
            prop_assert_eq!(&left, &right);
            let folded = merge_all([&a, &b, &c]).expect("fold mirrors stepwise merges");
            prop_assert_eq!(&folded, &left);
        }
    }
}
