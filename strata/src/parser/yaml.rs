//! YAML parser backed by `serde_yaml`.

use serde_yaml::Value;

use crate::error::{Error, Result};
use crate::node::Node;

use super::{Parser, MEDIA_TYPE_YAML};

/// Parser for YAML content.
///
/// Mappings become objects (dotted keys nest), sequences become lists, and
/// scalars become leaf values rendered as strings; `null` becomes an empty
/// string.
pub struct YamlParser;

impl Parser for YamlParser {
    fn parse(&self, data: &[u8]) -> Result<Node> {
        if std::str::from_utf8(data).map_or(false, |s| s.trim().is_empty()) {
            return Ok(Node::object());
        }
        let value: Value = serde_yaml::from_slice(data).map_err(|e| Error::Parse {
            source_name: String::new(),
            media_type: MEDIA_TYPE_YAML.to_string(),
            reason: e.to_string(),
        })?;
        // A comments-only document parses as null: an empty source.
        if matches!(value, Value::Null) {
            return Ok(Node::object());
        }
        match convert(&value)? {
            node @ Node::Object(_) => Ok(node),
            // A bare scalar or sequence document has no member names to
            // address it by; reject rather than guess.
            other => Err(Error::Parse {
                source_name: String::new(),
                media_type: MEDIA_TYPE_YAML.to_string(),
                reason: format!("top-level YAML value must be a mapping, got a {}", other.node_type()),
            }),
        }
    }

    fn supported_media_types(&self) -> &[&str] {
        &[MEDIA_TYPE_YAML]
    }
}

fn convert(value: &Value) -> Result<Node> {
    match value {
        Value::Null => Ok(Node::value("")),
        Value::Bool(b) => Ok(Node::value(b.to_string())),
        Value::Number(n) => Ok(Node::value(n.to_string())),
        Value::String(s) => Ok(Node::value(s.clone())),
        Value::Sequence(elements) => {
            let converted: Result<Vec<Node>> = elements.iter().map(convert).collect();
            Ok(Node::list(converted?))
        }
        Value::Mapping(mapping) => {
            let mut object = Node::object();
            for (key, member) in mapping {
                let name = scalar_key(key)?;
                object = object.with_entry(&name, convert(member)?)?;
            }
            Ok(object)
        }
        Value::Tagged(tagged) => convert(&tagged.value),
    }
}

fn scalar_key(key: &Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::Parse {
            source_name: String::new(),
            media_type: MEDIA_TYPE_YAML.to_string(),
            reason: format!("unsupported mapping key: {other:?}"),
        }),
    }
}
