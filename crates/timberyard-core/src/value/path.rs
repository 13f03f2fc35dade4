//! Dotted paths into a value tree

use std::fmt;

/// A sequence of segments addressing a node in a [`Value`](super::Value).
///
/// `"a.b.c"` and `["a", "b", "c"]` denote the same path. The empty string
/// and the empty sequence both denote the node itself. Segments that address
/// array elements are parsed as zero-based indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValuePath {
    segments: Vec<String>,
}

impl ValuePath {
    /// The path of the node itself
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, if any
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// A new path with `segment` appended
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for ValuePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for ValuePath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&String> for ValuePath {
    fn from(path: &String) -> Self {
        Self::parse(path)
    }
}

impl From<Vec<String>> for ValuePath {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

impl From<&[String]> for ValuePath {
    fn from(segments: &[String]) -> Self {
        Self {
            segments: segments.to_vec(),
        }
    }
}

impl From<&[&str]> for ValuePath {
    fn from(segments: &[&str]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl<const N: usize> From<[&str; N]> for ValuePath {
    fn from(segments: [&str; N]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&ValuePath> for ValuePath {
    fn from(path: &ValuePath) -> Self {
        path.clone()
    }
}
