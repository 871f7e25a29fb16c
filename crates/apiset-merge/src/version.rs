//! Version algebra.
//!
//! The merger never looks inside a version value: it only joins two of them with
//! [`Version::plus`] and asks [`Version::contains`]. Any domain satisfying the join-semilattice
//! laws below can be plugged in.
//!
//! * `a.contains(a)`
//! * `a.plus(b).contains(a)` and `a.plus(b).contains(b)`
//! * `plus` is commutative and associative

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub trait Version: Clone + PartialEq + fmt::Debug + Send + Sync {
    /// Least upper bound of `self` and `other`.
    fn plus(&self, other: &Self) -> Self;

    /// Whether every piece of evidence in `other` is also in `self`.
    fn contains(&self, other: &Self) -> bool;

    /// Textual form stored in emitted version metadata; `None` when there is nothing to record.
    fn literal(&self) -> Option<String>;
}

/// Parses the textual form produced by [`Version::literal`].
///
/// Passed explicitly wherever version metadata is read back.
pub trait VersionLoader<V> {
    fn load(&self, literal: &str) -> V;
}

/// Joins two optional versions; a missing operand is absorbed.
pub fn plus_opt<V: Version>(a: Option<&V>, b: Option<&V>) -> Option<V> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.plus(b)),
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (None, None) => None,
    }
}

/// A set of opaque version tags (`{"1", "2"}`), joined by union and ordered by inclusion.
///
/// [`TagSet::Universal`] is the top element: it contains every tag set and absorbs anything it
/// is joined with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagSet {
    Universal,
    Tags(BTreeSet<String>),
}

impl TagSet {
    pub fn of<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TagSet::Tags(tags.into_iter().map(Into::into).collect())
    }

    pub fn single(tag: impl Into<String>) -> Self {
        Self::of([tag])
    }

    pub fn tags(&self) -> Option<&BTreeSet<String>> {
        match self {
            TagSet::Universal => None,
            TagSet::Tags(tags) => Some(tags),
        }
    }
}

impl Version for TagSet {
    fn plus(&self, other: &Self) -> Self {
        match (self, other) {
            (TagSet::Tags(a), TagSet::Tags(b)) => TagSet::Tags(a.union(b).cloned().collect()),
            _ => TagSet::Universal,
        }
    }

    fn contains(&self, other: &Self) -> bool {
        match (self, other) {
            (TagSet::Universal, _) => true,
            (TagSet::Tags(_), TagSet::Universal) => false,
            (TagSet::Tags(a), TagSet::Tags(b)) => b.is_subset(a),
        }
    }

    fn literal(&self) -> Option<String> {
        match self {
            TagSet::Universal => None,
            TagSet::Tags(tags) => Some(tags.iter().cloned().collect::<Vec<_>>().join(", ")),
        }
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.literal() {
            Some(literal) => write!(f, "{{{literal}}}"),
            None => f.write_str("*"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TagSetLoader;

impl VersionLoader<TagSet> for TagSetLoader {
    fn load(&self, literal: &str) -> TagSet {
        TagSet::of(
            literal
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty()),
        )
    }
}
