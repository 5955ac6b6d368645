//! Model identifiers shared by loaders and classifiers

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Name of a model artifact in a backing store (e.g. `dog-classifier`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    /// Create a new model identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ModelId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for ModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Requested model version
///
/// `Latest` is resolved by the loader to the highest version available in the
/// store. Empty strings and `"latest"` (any case) parse to `Latest`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelVersion {
    /// Highest available version
    #[default]
    Latest,
    /// A specific version tag such as `v1`
    Tagged(String),
}

impl ModelVersion {
    /// Parse a version string
    pub fn parse(version: &str) -> Self {
        let version = version.trim();
        if version.is_empty() || version.eq_ignore_ascii_case("latest") {
            Self::Latest
        } else {
            Self::Tagged(version.to_string())
        }
    }

    /// Create a tagged version
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self::Tagged(tag.into())
    }

    /// Whether this version must be resolved against the store
    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }

    /// The explicit tag, if any
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Latest => None,
            Self::Tagged(tag) => Some(tag),
        }
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Tagged(tag) => f.write_str(tag),
        }
    }
}

impl FromStr for ModelVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for ModelVersion {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<ModelVersion> for String {
    fn from(version: ModelVersion) -> Self {
        version.to_string()
    }
}

/// Compare two version tags.
///
/// Tags of the form `v<N>` or `<N>` compare numerically and rank above any
/// non-numeric tag; everything else compares lexicographically.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (numeric_version(a), numeric_version(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Pick the highest version tag from a listing
pub fn highest_version<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions.into_iter().max_by(|a, b| compare_versions(a, b))
}

fn numeric_version(tag: &str) -> Option<u64> {
    let digits = tag
        .strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag);
    digits.parse().ok()
}
