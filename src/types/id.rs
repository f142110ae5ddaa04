// ABOUTME: Phantom-typed identifiers for revisions and instances.
// ABOUTME: Keeps a revision id from being passed where an instance id is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker types for phantom type parameters.
/// Empty enums cannot be instantiated and need no trait bounds.
pub enum RevisionMarker {}
pub enum InstanceMarker {}

/// An opaque identifier tagged with the kind of thing it names.
#[must_use = "IDs reference resources and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

// T only appears as a marker, so these are written by hand to avoid
// requiring T: Clone/Eq/Hash from the derive.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Identifies one deployable build, usually a commit hash or build number.
pub type RevisionId = Id<RevisionMarker>;

/// Identifies one running copy of a revision, as assigned by the backend.
pub type InstanceId = Id<InstanceMarker>;

impl RevisionId {
    /// Validate a build identifier supplied by a pipeline.
    ///
    /// Accepts 1-128 characters from `[A-Za-z0-9._-]`, which covers commit
    /// hashes, semver tags, and CI build numbers while staying safe to use
    /// as a container label value.
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.is_empty() {
            return Err("revision id cannot be empty".to_string());
        }
        if value.len() > 128 {
            return Err("revision id exceeds 128 characters".to_string());
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(format!("invalid character in revision id: '{}'", c));
        }
        Ok(Self::new(value))
    }
}
