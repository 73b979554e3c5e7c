//! Key-token resolution.
//!
//! An object member name that is a `${name}` (or `$name`) reference is
//! rewritten to the value of the referenced leaf before a snapshot is
//! published. Resolution runs as a distinct pass after the structural
//! merge: the fully merged tree is flattened to a leaf map, every
//! referenced token is looked up exactly once, and the tree is rebuilt with
//! the substituted member names.
//!
//! A reference to a missing key, to an empty value, or to a value that is
//! itself another reference is a fatal configuration error; there is no
//! recursive resolution. Only whole-segment references are rewritten;
//! `x${name}y` is an ordinary member name.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::key;
use crate::node::{flatten, merge, ListNode, Node, ObjectNode};

/// Resolves every key-token reference in `root` against its own leaves.
///
/// Trees without references are returned unchanged.
///
/// # Errors
///
/// Returns [`Error::UnresolvedToken`] for a missing, empty, or
/// reference-valued token, and propagates merge conflicts when two
/// rewritten member names collide with incompatible shapes.
///
/// # Examples
///
/// ```
/// use strata::{tokens, Key, Node};
///
/// let tree = Node::from_pairs([("name", "Jane"), ("server.${name}.port", "8080")]).unwrap();
/// let resolved = tokens::resolve(&tree).unwrap();
/// let port = resolved.lookup(&Key::parse("server.Jane.port").unwrap()).unwrap();
/// assert_eq!(port.direct_value(), Some("8080"));
/// ```
pub fn resolve(root: &Node) -> Result<Node> {
    if !has_references(root) {
        return Ok(root.clone());
    }

    let leaves = flatten::leaf_values(root);
    let mut tokens: BTreeMap<String, String> = BTreeMap::new();
    collect_tokens(root, &leaves, &mut tokens)?;

    rewrite(root, &tokens)
}

fn has_references(node: &Node) -> bool {
    match node {
        Node::Value(_) => false,
        Node::List(list) => list.elements().iter().any(has_references),
        Node::Object(object) => object
            .members()
            .any(|(name, member)| name.starts_with('$') || has_references(member)),
    }
}

/// Strips the reference syntax from a segment token (`${name}` or `$name`).
fn reference_name(segment: &str) -> &str {
    if let Some(inner) = segment.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        inner
    } else {
        segment.strip_prefix('$').unwrap_or(segment)
    }
}

fn collect_tokens(
    node: &Node,
    leaves: &BTreeMap<String, String>,
    tokens: &mut BTreeMap<String, String>,
) -> Result<()> {
    match node {
        Node::Value(_) => Ok(()),
        Node::List(list) => {
            for element in list.elements() {
                collect_tokens(element, leaves, tokens)?;
            }
            Ok(())
        }
        Node::Object(object) => {
            for (name, member) in object.members() {
                if name.starts_with('$') {
                    let token = reference_name(name);
                    if !tokens.contains_key(token) {
                        let value = lookup_token(token, leaves)?;
                        tokens.insert(token.to_string(), value);
                    }
                }
                collect_tokens(member, leaves, tokens)?;
            }
            Ok(())
        }
    }
}

fn lookup_token(token: &str, leaves: &BTreeMap<String, String>) -> Result<String> {
    let value = leaves.get(token).ok_or_else(|| Error::UnresolvedToken {
        token: token.to_string(),
        reason: "no such key in the merged configuration".to_string(),
    })?;
    if value.is_empty() {
        return Err(Error::UnresolvedToken {
            token: token.to_string(),
            reason: "the referenced key has an empty value".to_string(),
        });
    }
    if value.starts_with('$') {
        return Err(Error::UnresolvedToken {
            token: token.to_string(),
            reason: "the referenced value is itself a reference; recursive resolution is not supported"
                .to_string(),
        });
    }
    // Substituted values become segment tokens, so separators in them are
    // escaped to keep the name a single segment.
    Ok(key::escape(value))
}

fn rewrite(node: &Node, tokens: &BTreeMap<String, String>) -> Result<Node> {
    match node {
        Node::Value(_) => Ok(node.clone()),
        Node::List(list) => {
            let elements: Result<Vec<Node>> = list
                .elements()
                .iter()
                .map(|element| rewrite(element, tokens))
                .collect();
            Ok(Node::List(ListNode {
                elements: elements?,
                value: list.value().map(str::to_string),
                origin: node.origin().cloned(),
            }))
        }
        Node::Object(object) => {
            let mut members: BTreeMap<String, Node> = BTreeMap::new();
            for (name, member) in object.members() {
                let rewritten = rewrite(member, tokens)?;
                let new_name = if name.starts_with('$') {
                    tokens
                        .get(reference_name(name))
                        .cloned()
                        .unwrap_or_else(|| name.to_string())
                } else {
                    name.to_string()
                };
                // Two member names can collapse into one after
                // substitution; the later (sorted) one wins the merge.
                let merged = match members.remove(&new_name) {
                    Some(existing) => merge::merge(&rewritten, &existing)?,
                    None => rewritten,
                };
                members.insert(new_name, merged);
            }
            Ok(Node::Object(ObjectNode {
                members,
                value: object.value().map(str::to_string),
                origin: node.origin().cloned(),
            }))
        }
    }
}
