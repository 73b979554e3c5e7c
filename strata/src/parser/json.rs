//! JSON parser backed by `serde_json`.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::node::Node;

use super::{Parser, MEDIA_TYPE_JSON};

/// Parser for JSON content.
///
/// Objects become object nodes (dotted keys nest), arrays become lists,
/// and scalars become leaf values rendered as strings; `null` becomes an
/// empty string.
pub struct JsonParser;

impl Parser for JsonParser {
    fn parse(&self, data: &[u8]) -> Result<Node> {
        if std::str::from_utf8(data).map_or(false, |s| s.trim().is_empty()) {
            return Ok(Node::object());
        }
        let value: Value = serde_json::from_slice(data).map_err(|e| Error::Parse {
            source_name: String::new(),
            media_type: MEDIA_TYPE_JSON.to_string(),
            reason: e.to_string(),
        })?;
        match convert(&value)? {
            node @ Node::Object(_) => Ok(node),
            other => Err(Error::Parse {
                source_name: String::new(),
                media_type: MEDIA_TYPE_JSON.to_string(),
                reason: format!("top-level JSON value must be an object, got a {}", other.node_type()),
            }),
        }
    }

    fn supported_media_types(&self) -> &[&str] {
        &[MEDIA_TYPE_JSON]
    }
}

fn convert(value: &Value) -> Result<Node> {
    match value {
        Value::Null => Ok(Node::value("")),
        Value::Bool(b) => Ok(Node::value(b.to_string())),
        Value::Number(n) => Ok(Node::value(n.to_string())),
        Value::String(s) => Ok(Node::value(s.clone())),
        Value::Array(elements) => {
            let converted: Result<Vec<Node>> = elements.iter().map(convert).collect();
            Ok(Node::list(converted?))
        }
        Value::Object(members) => {
            let mut object = Node::object();
            for (name, member) in members {
                object = object.with_entry(name, convert(member)?)?;
            }
            Ok(object)
        }
    }
}
