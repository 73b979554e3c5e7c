//! The configuration node model.
//!
//! A [`Node`] is the tagged-union value held at every point of a
//! configuration tree: a leaf string ([`Node::Value`]), an ordered list of
//! child nodes ([`Node::List`]), or a name-to-child mapping
//! ([`Node::Object`]). Lists and objects may additionally carry a direct
//! string value of their own, which lets a higher-priority scalar override
//! the value at a key without destroying the structure contributed by a
//! lower-priority source.
//!
//! Nodes are immutable once built; merging and token resolution always
//! produce new trees. Equality is structural and ignores provenance, so two
//! trees with the same shape and values compare equal regardless of which
//! sources contributed them.

pub mod flatten;
pub mod merge;
#[cfg(test)]
mod proptests;

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::key::{self, Key};

/// Provenance of a node: the source that contributed it and the source's
/// effective priority at merge time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    source: String,
    priority: i32,
}

impl Origin {
    /// Creates provenance for the named source at the given priority.
    #[must_use]
    pub fn new(source: impl Into<String>, priority: i32) -> Self {
        Self {
            source: source.into(),
            priority,
        }
    }

    /// Name of the contributing source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Effective priority of the contributing source.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.source, self.priority)
    }
}

/// The kind of a node, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// A leaf string value.
    Value,
    /// An ordered sequence of child nodes.
    List,
    /// A mapping from member names to child nodes.
    Object,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => write!(f, "value"),
            Self::List => write!(f, "list"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// A leaf node holding a single string payload.
#[derive(Debug, Clone)]
pub struct ValueNode {
    pub(crate) value: String,
    pub(crate) origin: Option<Origin>,
}

impl ValueNode {
    /// The string payload.
    #[must_use]
    pub fn get(&self) -> &str {
        &self.value
    }
}

/// An ordered sequence of child nodes, optionally carrying a direct value.
#[derive(Debug, Clone)]
pub struct ListNode {
    pub(crate) elements: Vec<Node>,
    pub(crate) value: Option<String>,
    pub(crate) origin: Option<Origin>,
}

impl ListNode {
    /// The child nodes in order.
    #[must_use]
    pub fn elements(&self) -> &[Node] {
        &self.elements
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the list has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The element at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Node> {
        self.elements.get(index)
    }

    /// The direct value carried by the list itself, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// A mapping from member names to child nodes, optionally carrying a direct
/// value. Member names are stored in escaped segment-token form and iterate
/// in a stable (sorted) order.
#[derive(Debug, Clone)]
pub struct ObjectNode {
    pub(crate) members: BTreeMap<String, Node>,
    pub(crate) value: Option<String>,
    pub(crate) origin: Option<Origin>,
}

impl ObjectNode {
    /// Iterates members as `(escaped name, node)` pairs in sorted order.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The member stored under the given escaped name token.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Node> {
        self.members.get(name)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the object has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The direct value carried by the object itself, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// A node in a configuration tree.
///
/// # Examples
///
/// ```
/// use strata::{Key, Node};
///
/// let tree = Node::from_pairs([("server.port", "8080"), ("server.host", "localhost")]).unwrap();
/// let port = tree.lookup(&Key::parse("server.port").unwrap()).unwrap();
/// assert_eq!(port.direct_value(), Some("8080"));
/// ```
#[derive(Debug, Clone)]
pub enum Node {
    /// A leaf string value.
    Value(ValueNode),
    /// An ordered sequence of child nodes.
    List(ListNode),
    /// A mapping from member names to child nodes.
    Object(ObjectNode),
}

impl Node {
    /// Creates a leaf value node.
    #[must_use]
    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(ValueNode {
            value: value.into(),
            origin: None,
        })
    }

    /// Creates a list node from child nodes.
    #[must_use]
    pub fn list(elements: impl IntoIterator<Item = Node>) -> Self {
        Self::List(ListNode {
            elements: elements.into_iter().collect(),
            value: None,
            origin: None,
        })
    }

    /// Creates an empty object node.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(ObjectNode {
            members: BTreeMap::new(),
            value: None,
            origin: None,
        })
    }

    /// Builds an object tree from dotted-key/value pairs.
    ///
    /// Keys nest on dots; numeric segments address object members with
    /// numeric names (structural lists only come from tree-producing
    /// sources). When the same key appears twice, the later entry wins.
    ///
    /// # Errors
    ///
    /// Returns an error if a key fails to parse or two entries produce an
    /// irreconcilable shape conflict.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut root = Self::object();
        for (k, v) in pairs {
            root = root.with_entry(k.as_ref(), Self::value(v))?;
        }
        Ok(root)
    }

    /// Returns a copy of this tree with `node` placed under the dotted
    /// `key`, overriding anything already there.
    ///
    /// # Errors
    ///
    /// Returns an error if the key fails to parse or the placement produces
    /// an irreconcilable shape conflict.
    pub fn with_entry(&self, key: &str, node: Node) -> Result<Self> {
        let key = Key::parse(key)?;
        let wrapped = wrap_under(&key, node);
        merge::merge(&wrapped, self)
    }

    /// The kind of this node.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Value(_) => NodeType::Value,
            Self::List(_) => NodeType::List,
            Self::Object(_) => NodeType::Object,
        }
    }

    /// The direct string value at this node: the payload of a leaf, or the
    /// direct-value slot of a list or object.
    #[must_use]
    pub fn direct_value(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v.get()),
            Self::List(l) => l.value(),
            Self::Object(o) => o.value(),
        }
    }

    /// Whether this node carries a direct string value.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.direct_value().is_some()
    }

    /// Provenance of this node, when tagged.
    #[must_use]
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Self::Value(v) => v.origin.as_ref(),
            Self::List(l) => l.origin.as_ref(),
            Self::Object(o) => o.origin.as_ref(),
        }
    }

    /// This node as an object, if it is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// This node as a list, if it is one.
    #[must_use]
    pub fn as_list(&self) -> Option<&ListNode> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns a copy of this tree with the given provenance stamped on
    /// this node and every descendant.
    ///
    /// Propagation happens at tagging time; it is not re-derived when trees
    /// are later combined, so untouched subtrees keep their contributor.
    #[must_use]
    pub fn with_origin(&self, origin: &Origin) -> Self {
        match self {
            Self::Value(v) => Self::Value(ValueNode {
                value: v.value.clone(),
                origin: Some(origin.clone()),
            }),
            Self::List(l) => Self::List(ListNode {
                elements: l.elements.iter().map(|e| e.with_origin(origin)).collect(),
                value: l.value.clone(),
                origin: Some(origin.clone()),
            }),
            Self::Object(o) => Self::Object(ObjectNode {
                members: o
                    .members
                    .iter()
                    .map(|(k, v)| (k.clone(), v.with_origin(origin)))
                    .collect(),
                value: o.value.clone(),
                origin: Some(origin.clone()),
            }),
        }
    }

    /// Descends the tree along `key` and returns the addressed node.
    ///
    /// Object segments select members by escaped name; list segments must
    /// be numeric indices. The root key addresses this node itself.
    #[must_use]
    pub fn lookup(&self, key: &Key) -> Option<&Node> {
        let mut current = self;
        for token in key.segments() {
            current = match current {
                Self::Object(o) => o.members.get(token)?,
                Self::List(l) => l.elements.get(token.parse::<usize>().ok()?)?,
                Self::Value(_) => return None,
            };
        }
        Some(current)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a.value == b.value,
            (Self::List(a), Self::List(b)) => a.value == b.value && a.elements == b.elements,
            (Self::Object(a), Self::Object(b)) => a.value == b.value && a.members == b.members,
            _ => false,
        }
    }
}

impl Eq for Node {}

/// Wraps `node` into nested singleton objects so it sits under `key` when
/// merged into a root tree. The root key returns the node unchanged.
#[must_use]
pub fn wrap_under(key: &Key, node: Node) -> Node {
    let mut wrapped = node;
    for token in key.segments().iter().rev() {
        let mut members = BTreeMap::new();
        members.insert(token.clone(), wrapped);
        wrapped = Node::Object(ObjectNode {
            members,
            value: None,
            origin: None,
        });
    }
    wrapped
}

/// Convenience constructor for object trees in tests and embedders:
/// `(name, node)` pairs with literal (unescaped) member names.
#[must_use]
pub fn object_of<N, I>(members: I) -> Node
where
    N: AsRef<str>,
    I: IntoIterator<Item = (N, Node)>,
{
    Node::Object(ObjectNode {
        members: members
            .into_iter()
            .map(|(name, node)| (key::escape(name.as_ref()), node))
            .collect(),
        value: None,
        origin: None,
    })
}
