//! Properties-format parser.
//!
//! Parses the common subset of Java-style properties files: one `key=value`
//! (or `key: value`) entry per line, `#` and `!` comment lines, blank lines
//! ignored, whitespace around keys and values trimmed. Dotted keys nest
//! into the object tree.

use crate::error::{Error, Result};
use crate::node::Node;

use super::{Parser, MEDIA_TYPE_PROPERTIES};

/// Parser for properties content.
pub struct PropertiesParser;

impl Parser for PropertiesParser {
    fn parse(&self, data: &[u8]) -> Result<Node> {
        let text = std::str::from_utf8(data).map_err(|e| parse_error(format!("not UTF-8: {e}")))?;

        let mut pairs = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let split = line
                .find('=')
                .or_else(|| line.find(':'))
                .ok_or_else(|| parse_error(format!("line {}: missing '='", number + 1)))?;
            let key = line[..split].trim();
            let value = line[split + 1..].trim();
            if key.is_empty() {
                return Err(parse_error(format!("line {}: empty key", number + 1)));
            }
            pairs.push((key.to_string(), value.to_string()));
        }

        Node::from_pairs(pairs)
    }

    fn supported_media_types(&self) -> &[&str] {
        &[MEDIA_TYPE_PROPERTIES]
    }
}

fn parse_error(reason: String) -> Error {
    Error::Parse {
        source_name: String::new(),
        media_type: MEDIA_TYPE_PROPERTIES.to_string(),
        reason,
    }
}
