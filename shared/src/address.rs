//! Hierarchical path addresses for schema nodes and live properties.
//!
//! An [`Address`] names a node by position (`instance/nested/property`) rather
//! than by reference, so the schema tree and the live graph can be rebuilt
//! independently and matched back up by name.
//!
//! Addresses are only meaningful within one inspection session. Renaming an
//! instance in the engine changes every address below it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

/// Separator used in the display form of an address
pub const SEPARATOR: char = '/';

/// Errors produced when constructing or parsing an address
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// A segment was empty
    #[error("address segments must not be empty")]
    EmptySegment,

    /// An escape sequence other than `~0` / `~1` was found
    #[error("invalid escape sequence in address segment `{0}`")]
    InvalidEscape(String),
}

/// Ordered, non-empty sequence of path segments.
///
/// Equality and hashing are segment-wise, so a name containing `/` never
/// collides with a two-segment path. The display form escapes `~` as `~0`
/// and `/` as `~1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    segments: SmallVec<[String; 4]>,
}

impl Address {
    /// Create a single-segment address
    pub fn root(name: impl Into<String>) -> Result<Self, AddressError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AddressError::EmptySegment);
        }
        let mut segments = SmallVec::new();
        segments.push(name);
        Ok(Self { segments })
    }

    /// Build an address from a list of segments
    pub fn from_segments<I, S>(segments: I) -> Result<Self, AddressError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: SmallVec<[String; 4]> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(AddressError::EmptySegment);
        }
        Ok(Self { segments })
    }

    /// Append a child segment, returning the new address
    pub fn child(&self, name: impl Into<String>) -> Result<Self, AddressError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AddressError::EmptySegment);
        }
        let mut segments = self.segments.clone();
        segments.push(name);
        Ok(Self { segments })
    }

    /// All segments, outermost first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment (the leaf name)
    pub fn leaf(&self) -> &str {
        // Never empty: every constructor rejects empty segment lists
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Address of the enclosing node, if any
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether `self` is `other` or lies below it
    pub fn starts_with(&self, other: &Address) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace(SEPARATOR, "~1")
}

fn unescape_segment(segment: &str) -> Result<String, AddressError> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push(SEPARATOR),
            _ => return Err(AddressError::InvalidEscape(segment.to_string())),
        }
    }
    Ok(out)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", escape_segment(segment))?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = s
            .split(SEPARATOR)
            .map(unescape_segment)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_segments(segments)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.segments.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let segments = Vec::<String>::deserialize(deserializer)?;
        Self::from_segments(segments).map_err(serde::de::Error::custom)
    }
}
