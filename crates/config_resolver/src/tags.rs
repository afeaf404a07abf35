//! Environment tags.
//!
//! A [`Tags`] set scopes a source or a query to an environment/variant axis
//! (`env=prod`, `region=eu`). Tagged sources are overlaid on the untagged
//! configuration; queries pick the most specific overlay their tags allow.

use std::collections::BTreeSet;
use std::fmt;

use crate::lexer::SentenceNormalizer;

#[cfg(test)]
#[path = "tags_tests.rs"]
mod tests;

/// A single `key=value` label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// An ordered set of tags. The empty set is the untagged scope.
///
/// # Examples
///
/// ```rust
/// use config_resolver::Tags;
///
/// let prod = Tags::of([("env", "prod")]);
/// let prod_eu = prod.clone().with("region", "eu");
///
/// assert!(Tags::new().is_subset(&prod));
/// assert!(prod.is_subset(&prod_eu));
/// assert_eq!(prod_eu.to_string(), "env=prod,region=eu");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tags(BTreeSet<Tag>);

impl Tags {
    /// The empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tag set from key/value pairs.
    pub fn of<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| Tag::new(k, v)).collect())
    }

    /// Returns this set with one more tag.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(Tag::new(key, value));
        self
    }

    pub fn insert(&mut self, tag: Tag) {
        self.0.insert(tag);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    /// Returns `true` if every tag of `self` is also in `other`.
    pub fn is_subset(&self, other: &Tags) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Returns this set with every key and value passed through `normalizer`,
    /// matching how tags written in paths are normalized.
    pub fn normalized(&self, normalizer: &dyn SentenceNormalizer) -> Tags {
        self.0
            .iter()
            .map(|t| Tag::new(normalizer.normalize(&t.key), normalizer.normalize(&t.value)))
            .collect()
    }

    /// Returns the union of both sets.
    pub fn union(&self, other: &Tags) -> Tags {
        Tags(self.0.union(&other.0).cloned().collect())
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", rendered.join(","))
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
