#![allow(missing_docs)]

//! Key paths: ordered lists of non-empty segments.

use std::fmt;

/// Separator used when a path is rendered.
pub const SEPARATOR: char = '\\';

/// Path of a key relative to some open key.
///
/// The root path has no segments and renders as the empty string.
/// A segment is never empty, paths only grow through [`KeyPath::child`]
/// and [`KeyPath::concat`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// The empty path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a `\` separated path. Empty segments are dropped, so
    /// `"\SOFTWARE\\TEST\"` is the same path as `"SOFTWARE\TEST"`.
    pub fn parse(rendered: &str) -> Self {
        Self(
            rendered
                .split(SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The path of a direct child, `None` if `segment` is empty
    /// or contains the separator.
    pub fn child(&self, segment: impl Into<String>) -> Option<Self> {
        let segment = segment.into();
        if segment.is_empty() || segment.contains(SEPARATOR) {
            return None;
        }
        let mut segments = self.0.clone();
        segments.push(segment);
        Some(Self(segments))
    }

    /// `self` followed by every segment of `other`.
    pub fn concat(&self, other: &KeyPath) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl From<&str> for KeyPath {
    fn from(rendered: &str) -> Self {
        Self::parse(rendered)
    }
}
