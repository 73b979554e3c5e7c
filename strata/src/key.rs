//! Dotted configuration keys.
//!
//! A [`Key`] is an ordered sequence of path segments addressing one node in
//! a configuration tree. Segments are joined with `.` in the string form;
//! list elements are addressed by numeric segments (`servers.0.port`).
//!
//! A literal dot inside a segment is escaped as `~1` and a literal tilde as
//! `~0`, so every string form round-trips. Dots inside a `${...}` token
//! reference do not separate segments; the reference stays one segment
//! until token resolution rewrites it.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A dotted, escapable configuration key.
///
/// Keys are immutable and cheap to clone. The root key has no segments.
///
/// # Examples
///
/// ```
/// use strata::Key;
///
/// let key: Key = "server.port".parse().unwrap();
/// assert_eq!(key.name(), "port");
/// assert_eq!(key.parent().unwrap().to_string(), "server");
/// assert!(Key::root().is_root());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Key {
    // Segments are stored in escaped (token) form; they never contain an
    // unescaped separator.
    segments: Vec<String>,
}

impl Key {
    /// The root key (empty segment sequence).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a dotted key string.
    ///
    /// Empty segments (leading, trailing, or doubled dots) are skipped, so
    /// `""` parses to the root key. Dots inside `${...}` references are not
    /// treated as separators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] when a segment contains a malformed
    /// escape sequence (a `~` not followed by `0` or `1`).
    pub fn parse(key: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for raw in split_outside_tokens(key) {
            if raw.is_empty() {
                continue;
            }
            validate_escapes(key, raw)?;
            segments.push(raw.to_string());
        }
        Ok(Self { segments })
    }

    /// Returns a new key with `name` appended as one segment.
    ///
    /// The name is taken literally: separators and tildes in it are escaped,
    /// so the child of `a` named `b.c` is `a.b~1c`.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        self.child_token(escape(name))
    }

    /// Appends an already-escaped segment token.
    pub(crate) fn child_token(&self, token: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(token.into());
        Self { segments }
    }

    /// Returns a new key with all of `other`'s segments appended.
    #[must_use]
    pub fn concat(&self, other: &Key) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Returns the parent key, or `None` for the root key.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether this is the root key.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The unescaped name of the last segment, or the empty string for the
    /// root key.
    #[must_use]
    pub fn name(&self) -> String {
        self.segments.last().map(|s| unescape(s)).unwrap_or_default()
    }

    /// The escaped segment tokens of this key, root first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lexicographic on the dotted string form, matching the display
        // round-trip contract.
        self.to_string().cmp(&other.to_string())
    }
}

/// Escapes a literal segment name into token form (`~` -> `~0`, `.` -> `~1`).
#[must_use]
pub fn escape(name: &str) -> String {
    name.replace('~', "~0").replace('.', "~1")
}

/// Unescapes a segment token back into its literal name.
#[must_use]
pub fn unescape(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('.'),
                // Malformed escapes are rejected at parse time; anything
                // else passes through verbatim.
                Some(other) => {
                    out.push('~');
                    out.push(other);
                }
                None => out.push('~'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn validate_escapes(key: &str, token: &str) -> Result<()> {
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0' | '1') => {}
                _ => {
                    return Err(Error::InvalidKey {
                        key: key.to_string(),
                        reason: format!(
                            "malformed escape in segment '{token}': '~' must be followed by '0' or '1'"
                        ),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Splits a dotted key on `.`, keeping dots inside `${...}` references.
fn split_outside_tokens(key: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let bytes = key.as_bytes();
    let mut start = 0;
    let mut in_token = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if i + 1 < bytes.len() && bytes[i + 1] == b'{' => {
                in_token = true;
                i += 1;
            }
            b'}' if in_token => in_token = false,
            b'.' if !in_token => {
                parts.push(&key[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&key[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let key = Key::parse("server.port").unwrap();
        assert_eq!(key.segments().len(), 2);
        assert_eq!(key.to_string(), "server.port");
        assert_eq!(key.name(), "port");
    }

    #[test]
    fn test_parse_empty_is_root() {
        assert!(Key::parse("").unwrap().is_root());
    }

    #[test]
    fn test_parse_skips_empty_segments() {
        let key = Key::parse(".a..b.").unwrap();
        assert_eq!(key.to_string(), "a.b");
    }

    #[test]
    fn test_parse_rejects_malformed_escape() {
        assert!(Key::parse("a~2b").is_err());
        assert!(Key::parse("a~").is_err());
        assert!(Key::parse("a~0b.c~1d").is_ok());
    }

    #[test]
    fn test_dots_inside_token_reference_do_not_split() {
        let key = Key::parse("server.${a.b}.port").unwrap();
        assert_eq!(key.segments().len(), 3);
        assert_eq!(key.segments()[1], "${a.b}");
    }

    #[test]
    fn test_child_escapes_name() {
        let key = Key::root().child("a.b");
        assert_eq!(key.to_string(), "a~1b");
        assert_eq!(key.name(), "a.b");
    }

    #[test]
    fn test_parent_and_root() {
        let key = Key::parse("a.b.c").unwrap();
        let parent = key.parent().unwrap();
        assert_eq!(parent.to_string(), "a.b");
        assert_eq!(parent.parent().unwrap().to_string(), "a");
        let root = parent.parent().unwrap().parent().unwrap();
        assert!(root.is_root());
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_concat() {
        let a = Key::parse("a.b").unwrap();
        let b = Key::parse("c.d").unwrap();
        assert_eq!(a.concat(&b).to_string(), "a.b.c.d");
        assert_eq!(Key::root().concat(&a), a);
    }

    #[test]
    fn test_escape_round_trip() {
        let name = "weird.name~with.dots";
        assert_eq!(unescape(&escape(name)), name);
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["", "a", "a.b.c", "a~1b.c", "x.${t}.y"] {
            let key = Key::parse(text).unwrap();
            assert_eq!(Key::parse(&key.to_string()).unwrap(), key);
        }
    }

    #[test]
    fn test_ordering_is_lexicographic_on_string_form() {
        let a = Key::parse("a").unwrap();
        let ab = Key::parse("a.b").unwrap();
        let b = Key::parse("b").unwrap();
        assert!(a < ab);
        assert!(ab < b);
    }

    #[test]
    fn test_name_unescapes() {
        let key = Key::parse("servers.host~1name").unwrap();
        assert_eq!(key.name(), "host.name");
    }
}
