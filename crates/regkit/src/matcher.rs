#![allow(missing_docs)]

//! Decides whether a key path matches a search term.
//!
//! A path matches when the term occurs in its rendered form and is followed
//! right away by a separator or the end of the string. Nothing is required
//! before the occurrence, so `EST` matches `SOFTWARE\TEST`.

use crate::error::{RegistryError, RegistryResult};
use crate::path::{KeyPath, SEPARATOR};

/// A validated, non-empty search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm(String);

impl SearchTerm {
    pub fn new(term: impl Into<String>) -> RegistryResult<Self> {
        let term = term.into();
        if term.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "the search term must not be empty".into(),
            ));
        }
        Ok(Self(term))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, candidate: &KeyPath) -> bool {
        matches_rendered(&candidate.to_string(), &self.0)
    }
}

/// Does `candidate` match `term`? Fails if `term` is empty.
pub fn matches(candidate: &KeyPath, term: &str) -> RegistryResult<bool> {
    Ok(SearchTerm::new(term)?.matches(candidate))
}

// Every occurrence of `term` followed by a separator or the end is a prefix
// of `rendered` ending at one of those boundaries.
fn matches_rendered(rendered: &str, term: &str) -> bool {
    rendered
        .match_indices(SEPARATOR)
        .map(|(i, _)| i)
        .chain(std::iter::once(rendered.len()))
        .any(|boundary| rendered[..boundary].ends_with(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(path: &str, term: &str) -> bool {
        matches(&KeyPath::parse(path), term).unwrap()
    }

    #[test]
    fn whole_last_segment_matches() {
        assert!(check(r"SOFTWARE\TEST", "TEST"));
    }

    #[test]
    fn trailing_part_of_segment_matches() {
        assert!(check(r"SOFTWARE\TEST", "EST"));
        assert!(check(r"SOFTWARE\TEST", "T"));
    }

    #[test]
    fn term_must_be_followed_by_separator_or_end() {
        assert!(!check(r"SOFTWARE\TESTING", "TEST"));
        assert!(check(r"SOFTWARE\TEST\Sub", "TEST"));
        assert!(check(r"SOFTWARE\TEST\Sub", "SOFTWARE"));
        assert!(!check(r"SOFTWARE\TEST\Sub", "SOFT"));
    }

    #[test]
    fn any_occurrence_counts() {
        // First occurrence is followed by "I", a later one by the end.
        assert!(check(r"TESTING\TEST", "TEST"));
        // Overlapping occurrences.
        assert!(check("AAA", "AA"));
    }

    #[test]
    fn term_may_span_segments() {
        assert!(check(r"SOFTWARE\Vendor\TEST", r"Vendor\TEST"));
        assert!(check(r"SOFTWARE\Vendor\TEST", r"E\Vendor"));
    }

    #[test]
    fn term_longer_than_path() {
        assert!(!check("A", r"A\B"));
    }

    #[test]
    fn empty_term_is_rejected() {
        assert!(matches!(
            matches(&KeyPath::parse("A"), ""),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(SearchTerm::new("").is_err());
    }

    #[test]
    fn root_path_never_matches() {
        assert!(!check("", "A"));
    }
}
