//! Merging of two node trees by priority.
//!
//! [`merge`] combines a higher-priority tree with a lower-priority tree:
//! the higher tree wins every conflict, the lower tree fills the gaps. The
//! aggregation engine folds a priority-sorted sequence of source trees
//! (highest first) through this function; the fold order is what makes the
//! result deterministic, the function itself assumes nothing about
//! commutativity.
//!
//! Per type pair:
//!
//! - value x value: the higher value.
//! - value x object/list: the lower structure survives, its direct-value
//!   slot is overwritten by the higher payload.
//! - object/list x value: the higher structure survives, the lower payload
//!   fills the direct-value slot only when the higher side has none.
//! - object x object: member union, recursing where both sides define a
//!   member.
//! - list x list: the higher element sequence replaces the lower one
//!   entirely; there is no positional splice across sources.
//! - object x list (either orientation): object member names address list
//!   positions; a member name that is not a valid in-bounds index is a
//!   merge conflict. Positions the object does not mention keep the list's
//!   element untouched.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::key::Key;

use super::{ListNode, Node, ObjectNode, Origin};

/// Merges two nodes, with `higher` winning every conflict.
///
/// # Errors
///
/// Returns [`Error::MergeConflict`] when an object member is merged into a
/// list position under a name that is not a valid in-bounds index.
///
/// # Examples
///
/// ```
/// use strata::node::{merge::merge, Node};
///
/// let higher = Node::from_pairs([("x", "1")]).unwrap();
/// let lower = Node::from_pairs([("x", "9"), ("y", "2")]).unwrap();
/// let merged = merge(&higher, &lower).unwrap();
/// assert_eq!(merged, Node::from_pairs([("x", "1"), ("y", "2")]).unwrap());
/// ```
pub fn merge(higher: &Node, lower: &Node) -> Result<Node> {
    merge_at(&Key::root(), higher, lower)
}

fn merge_at(key: &Key, higher: &Node, lower: &Node) -> Result<Node> {
    match (higher, lower) {
        (Node::Value(h), Node::Value(_)) => Ok(Node::Value(h.clone())),

        // A higher scalar contests only the direct-value slot of a lower
        // structure; the structure itself survives.
        (Node::Value(h), Node::Object(l)) => Ok(Node::Object(ObjectNode {
            members: l.members.clone(),
            value: Some(h.value.clone()),
            origin: None,
        })),
        (Node::Value(h), Node::List(l)) => Ok(Node::List(ListNode {
            elements: l.elements.clone(),
            value: Some(h.value.clone()),
            origin: None,
        })),

        (Node::Object(h), Node::Value(l)) => Ok(Node::Object(ObjectNode {
            members: h.members.clone(),
            value: h.value.clone().or_else(|| Some(l.value.clone())),
            origin: None,
        })),
        (Node::List(h), Node::Value(l)) => {
            if h.value.is_some() {
                Ok(Node::List(h.clone()))
            } else {
                Ok(Node::List(ListNode {
                    elements: h.elements.clone(),
                    value: Some(l.value.clone()),
                    origin: None,
                }))
            }
        }

        (Node::Object(h), Node::Object(l)) => {
            let mut members = l.members.clone();
            for (name, h_child) in &h.members {
                let merged = match l.members.get(name) {
                    Some(l_child) => merge_at(&key.child_token(name.clone()), h_child, l_child)?,
                    None => h_child.clone(),
                };
                members.insert(name.clone(), merged);
            }
            Ok(Node::Object(ObjectNode {
                members,
                value: h.value.clone().or_else(|| l.value.clone()),
                origin: None,
            }))
        }

        (Node::List(h), Node::List(l)) => Ok(Node::List(ListNode {
            elements: h.elements.clone(),
            value: h.value.clone().or_else(|| l.value.clone()),
            origin: None,
        })),

        (Node::Object(h), Node::List(l)) => {
            let mut elements = l.elements.clone();
            for (name, member) in &h.members {
                let index = member_index(key, name, elements.len(), higher.origin(), lower.origin())?;
                elements[index] = merge_at(&key.child_token(name.clone()), member, &elements[index])?;
            }
            Ok(Node::List(ListNode {
                elements,
                value: h.value.clone().or_else(|| l.value.clone()),
                origin: None,
            }))
        }

        (Node::List(h), Node::Object(l)) => {
            let mut elements = h.elements.clone();
            for (name, member) in &l.members {
                let index = member_index(key, name, elements.len(), higher.origin(), lower.origin())?;
                elements[index] =
                    merge_at(&key.child_token(name.clone()), &elements[index], member)?;
            }
            Ok(Node::List(ListNode {
                elements,
                value: h.value.clone().or_else(|| l.value.clone()),
                origin: None,
            }))
        }
    }
}

/// Interprets an object member name as a list index, bounded by `len`.
fn member_index(
    key: &Key,
    name: &str,
    len: usize,
    higher_origin: Option<&Origin>,
    lower_origin: Option<&Origin>,
) -> Result<usize> {
    let conflict = |reason: String| Error::MergeConflict {
        key: key.child_token(name.to_string()).to_string(),
        detail: format!(
            "cannot merge object member '{name}' into a list element: {reason}{}",
            origins_suffix(higher_origin, lower_origin)
        ),
    };
    let index: usize = name
        .parse()
        .map_err(|_| conflict("not a valid non-negative index".to_string()))?;
    if index >= len {
        return Err(conflict(format!(
            "index {index} out of bounds for list of length {len}"
        )));
    }
    Ok(index)
}

fn origins_suffix(higher: Option<&Origin>, lower: Option<&Origin>) -> String {
    match (higher, lower) {
        (Some(h), Some(l)) => format!(" (sources {} and {})", h.source(), l.source()),
        (Some(o), None) | (None, Some(o)) => format!(" (source {})", o.source()),
        (None, None) => String::new(),
    }
}

/// Folds an iterator of trees, highest priority first, into one tree.
///
/// Returns an empty object when the iterator is empty.
///
/// # Errors
///
/// Propagates the first merge conflict encountered.
pub fn merge_all<'a>(trees: impl IntoIterator<Item = &'a Node>) -> Result<Node> {
    let mut accumulated: Option<Node> = None;
    for tree in trees {
        accumulated = Some(match accumulated {
            None => tree.clone(),
            Some(acc) => merge(&acc, tree)?,
        });
    }
    Ok(accumulated.unwrap_or_else(Node::object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{object_of, NodeType};

    fn get<'a>(tree: &'a Node, key: &str) -> &'a Node {
        tree.lookup(&Key::parse(key).unwrap()).unwrap()
    }

    #[test]
    fn test_value_value_higher_wins() {
        let merged = merge(&Node::value("high"), &Node::value("low")).unwrap();
        assert_eq!(merged.direct_value(), Some("high"));
    }

    #[test]
    fn test_value_over_object_keeps_structure() {
        let lower = Node::from_pairs([("x", "1")]).unwrap();
        let merged = merge(&Node::value("direct"), &lower).unwrap();
        assert_eq!(merged.node_type(), NodeType::Object);
        assert_eq!(merged.direct_value(), Some("direct"));
        assert_eq!(get(&merged, "x").direct_value(), Some("1"));
    }

    #[test]
    fn test_value_over_list_keeps_elements() {
        let lower = Node::list([Node::value("a"), Node::value("b")]);
        let merged = merge(&Node::value("direct"), &lower).unwrap();
        let list = merged.as_list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.value(), Some("direct"));
    }

    #[test]
    fn test_object_over_value_fills_value_slot() {
        let higher = Node::from_pairs([("x", "1")]).unwrap();
        let merged = merge(&higher, &Node::value("fallback")).unwrap();
        assert_eq!(merged.direct_value(), Some("fallback"));
        assert_eq!(get(&merged, "x").direct_value(), Some("1"));
    }

    #[test]
    fn test_list_over_value_keeps_own_value() {
        let lower = Node::value("fallback");
        let plain = Node::list([Node::value("a")]);
        let merged = merge(&plain, &lower).unwrap();
        assert_eq!(merged.direct_value(), Some("fallback"));

        let valued = merge(&Node::value("own"), &Node::list([Node::value("a")])).unwrap();
        let merged = merge(&valued, &lower).unwrap();
        assert_eq!(merged.direct_value(), Some("own"));
    }

    #[test]
    fn test_object_union() {
        let a = Node::from_pairs([("x", "1")]).unwrap();
        let b = Node::from_pairs([("y", "2")]).unwrap();
        let merged = merge(&a, &b).unwrap();
        assert_eq!(get(&merged, "x").direct_value(), Some("1"));
        assert_eq!(get(&merged, "y").direct_value(), Some("2"));

        // Union holds in either priority order when keys are disjoint.
        let merged = merge(&b, &a).unwrap();
        assert_eq!(get(&merged, "x").direct_value(), Some("1"));
        assert_eq!(get(&merged, "y").direct_value(), Some("2"));
    }

    #[test]
    fn test_object_recursive_member_merge() {
        let a = Node::from_pairs([("server.port", "8080")]).unwrap();
        let b = Node::from_pairs([("server.host", "example"), ("server.port", "9999")]).unwrap();
        let merged = merge(&a, &b).unwrap();
        assert_eq!(get(&merged, "server.port").direct_value(), Some("8080"));
        assert_eq!(get(&merged, "server.host").direct_value(), Some("example"));
    }

    #[test]
    fn test_list_replacement_not_splice() {
        let a = object_of([("list", Node::list([Node::value("1"), Node::value("2")]))]);
        let b = object_of([(
            "list",
            Node::list([
                Node::value("9"),
                Node::value("9"),
                Node::value("9"),
                Node::value("9"),
            ]),
        )]);
        let merged = merge(&a, &b).unwrap();
        let list = get(&merged, "list").as_list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().direct_value(), Some("1"));
        assert_eq!(list.get(1).unwrap().direct_value(), Some("2"));
    }

    #[test]
    fn test_object_into_list_by_index() {
        let lower = object_of([(
            "list",
            Node::list([Node::value("a"), Node::value("b"), Node::value("c")]),
        )]);
        let higher = Node::from_pairs([("list.0", "z")]).unwrap();
        let merged = merge(&higher, &lower).unwrap();
        let list = get(&merged, "list").as_list().unwrap();
        assert_eq!(list.get(0).unwrap().direct_value(), Some("z"));
        assert_eq!(list.get(1).unwrap().direct_value(), Some("b"));
        assert_eq!(list.get(2).unwrap().direct_value(), Some("c"));
    }

    #[test]
    fn test_object_into_list_out_of_bounds_is_error() {
        let lower = object_of([(
            "list",
            Node::list([Node::value("a"), Node::value("b"), Node::value("c")]),
        )]);
        let higher = Node::from_pairs([("list.7", "z")]).unwrap();
        let err = merge(&higher, &lower).unwrap_err();
        assert!(err.is_merge_conflict());
        let display = format!("{err}");
        assert!(display.contains("list.7"));
        assert!(display.contains("out of bounds"));
    }

    #[test]
    fn test_object_into_list_non_numeric_is_error() {
        let lower = object_of([("list", Node::list([Node::value("a")]))]);
        let higher = Node::from_pairs([("list.first", "z")]).unwrap();
        let err = merge(&higher, &lower).unwrap_err();
        assert!(err.is_merge_conflict());
        assert!(format!("{err}").contains("not a valid non-negative index"));
    }

    #[test]
    fn test_merge_error_names_contributing_sources() {
        let lower = object_of([("list", Node::list([Node::value("a")]))])
            .with_origin(&Origin::new("file-low", 5));
        let higher = Node::from_pairs([("list.9", "z")])
            .unwrap()
            .with_origin(&Origin::new("file-high", 10));
        let err = merge(&higher, &lower).unwrap_err();
        let display = format!("{err}");
        assert!(display.contains("file-high"));
        assert!(display.contains("file-low"));
    }

    #[test]
    fn test_list_over_object_keeps_untouched_tail() {
        let higher = object_of([(
            "list",
            Node::list([Node::value("x"), Node::value("y"), Node::value("z")]),
        )]);
        let lower = Node::from_pairs([("list.0", "a")]).unwrap();
        let merged = merge(&higher, &lower).unwrap();
        let list = get(&merged, "list").as_list().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0).unwrap().direct_value(), Some("x"));
        assert_eq!(list.get(2).unwrap().direct_value(), Some("z"));
    }

    #[test]
    fn test_list_over_object_out_of_bounds_is_error() {
        let higher = object_of([("list", Node::list([Node::value("x")]))]);
        let lower = Node::from_pairs([("list.5", "a")]).unwrap();
        assert!(merge(&higher, &lower).unwrap_err().is_merge_conflict());
    }

    #[test]
    fn test_idempotent_remerge() {
        let tree = Node::from_pairs([
            ("server.port", "8080"),
            ("server.host", "example"),
            ("flags.0", "on"),
        ])
        .unwrap();
        let merged = merge(&tree, &tree).unwrap();
        assert_eq!(merged, tree);
    }

    #[test]
    fn test_merge_all_priority_order() {
        let high = Node::from_pairs([("k", "high")]).unwrap();
        let mid = Node::from_pairs([("k", "mid"), ("m", "mid")]).unwrap();
        let low = Node::from_pairs([("k", "low"), ("l", "low")]).unwrap();
        let merged = merge_all([&high, &mid, &low]).unwrap();
        assert_eq!(get(&merged, "k").direct_value(), Some("high"));
        assert_eq!(get(&merged, "m").direct_value(), Some("mid"));
        assert_eq!(get(&merged, "l").direct_value(), Some("low"));
    }

    #[test]
    fn test_merge_all_empty_is_empty_object() {
        let merged = merge_all(Vec::<&Node>::new()).unwrap();
        assert_eq!(merged, Node::object());
    }
}
