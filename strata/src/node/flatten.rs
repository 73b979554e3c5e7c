//! Derived flat views over a node tree.
//!
//! Flattening to fully-qualified keys is an on-demand view used by point
//! lookups, lazy-source key collection, and token resolution; the nested
//! tree stays the primary representation.

use std::collections::BTreeMap;

use crate::key::Key;

use super::Node;

/// Maps every node in the tree to its fully qualified key, the root
/// included under the root key. List elements appear under their numeric
/// segments.
#[must_use]
pub fn full_key_map(root: &Node) -> BTreeMap<Key, &Node> {
    let mut map = BTreeMap::new();
    collect(&Key::root(), root, &mut map);
    map
}

fn collect<'a>(key: &Key, node: &'a Node, map: &mut BTreeMap<Key, &'a Node>) {
    map.insert(key.clone(), node);
    match node {
        Node::Value(_) => {}
        Node::List(list) => {
            for (index, element) in list.elements().iter().enumerate() {
                collect(&key.child_token(index.to_string()), element, map);
            }
        }
        Node::Object(object) => {
            for (name, member) in object.members() {
                collect(&key.child_token(name.to_string()), member, map);
            }
        }
    }
}

/// Maps the fully qualified key string of every leaf to its payload.
///
/// Direct values on lists and objects are not leaves and do not appear.
#[must_use]
pub fn leaf_values(root: &Node) -> BTreeMap<String, String> {
    full_key_map(root)
        .into_iter()
        .filter_map(|(key, node)| match node {
            Node::Value(value) => Some((key.to_string(), value.get().to_string())),
            _ => None,
        })
        .collect()
}
