use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StorageError;

const CONTAINER_NAME_MIN: usize = 3;
const CONTAINER_NAME_MAX: usize = 63;

/// A named collection of blobs within the account.
///
/// Holding a `ContainerRef` says nothing about whether the container exists
/// server-side; `BlobClient::resolve_container` is what guarantees that.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    name: String,
}

impl ContainerRef {
    /// Validate `name` against the provider naming rules.
    pub fn new(name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        validate_container_name(&name).map_err(StorageError::Rejected)?;
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference a blob inside this container.
    pub fn blob(&self, blob_name: impl Into<String>) -> BlobRef {
        BlobRef {
            container: self.clone(),
            name: blob_name.into(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// 3-63 chars of `[a-z0-9-]`, starting and ending alphanumeric, no `--`.
fn validate_container_name(name: &str) -> Result<(), String> {
    let len = name.len();
    if !(CONTAINER_NAME_MIN..=CONTAINER_NAME_MAX).contains(&len) {
        return Err(format!(
            "container name '{name}' must be {CONTAINER_NAME_MIN}-{CONTAINER_NAME_MAX} characters"
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(format!(
            "container name '{name}' contains invalid character '{c}'"
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(format!(
            "container name '{name}' must start and end with a letter or digit"
        ));
    }
    if name.contains("--") {
        return Err(format!(
            "container name '{name}' must not contain consecutive dashes"
        ));
    }
    Ok(())
}

/// A blob addressed by container and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobRef {
    pub container: ContainerRef,
    pub name: String,
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.name)
    }
}

/// Anonymous read access level for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicAccess {
    #[default]
    None,
    /// Blob content is readable anonymously; the container listing is not.
    Blob,
    Container,
}

impl fmt::Display for PublicAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicAccess::None => write!(f, "none"),
            PublicAccess::Blob => write!(f, "blob"),
            PublicAccess::Container => write!(f, "container"),
        }
    }
}

impl std::str::FromStr for PublicAccess {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "private" => Ok(PublicAccess::None),
            "blob" => Ok(PublicAccess::Blob),
            "container" => Ok(PublicAccess::Container),
            other => Err(StorageError::Rejected(format!(
                "unknown public access level: {other}"
            ))),
        }
    }
}

/// An entry returned by a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BlobItem {
    Blob {
        name: String,
        size: u64,
        content_type: Option<String>,
    },
    /// Virtual directory marker produced by hierarchical listings.
    Directory { prefix: String },
}

impl BlobItem {
    pub fn name(&self) -> &str {
        match self {
            BlobItem::Blob { name, .. } => name,
            BlobItem::Directory { prefix } => prefix,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, BlobItem::Directory { .. })
    }
}

/// Opaque cursor handed back by a segmented listing.
///
/// Only the backend that issued a token can interpret it, and only within the
/// same session.
#[derive(Clone)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContinuationToken(..)")
    }
}

/// One segment of a listing.
#[derive(Debug, Default)]
pub struct BlobPage {
    pub items: Vec<BlobItem>,
    /// `None` marks the final page.
    pub continuation: Option<ContinuationToken>,
}

impl BlobPage {
    pub fn last(items: Vec<BlobItem>) -> Self {
        Self {
            items,
            continuation: None,
        }
    }

    pub fn more(items: Vec<BlobItem>, token: ContinuationToken) -> Self {
        Self {
            items,
            continuation: Some(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_container_names() {
        let longest = "x".repeat(63);
        for name in ["abc", "quickstartblobs", "media-2024", "a1b", longest.as_str()] {
            assert!(ContainerRef::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_invalid_container_names() {
        let too_long = "x".repeat(64);
        for name in [
            "ab",
            too_long.as_str(),
            "Uppercase",
            "under_score",
            "-leading",
            "trailing-",
            "double--dash",
            "with space",
        ] {
            let err = ContainerRef::new(name).unwrap_err();
            assert!(matches!(err, StorageError::Rejected(_)), "{name}");
        }
    }

    #[test]
    fn blob_ref_display() {
        let container = ContainerRef::new("media").unwrap();
        assert_eq!(container.blob("a/b.txt").to_string(), "media/a/b.txt");
    }

    #[test]
    fn public_access_parse() {
        assert_eq!("blob".parse::<PublicAccess>().unwrap(), PublicAccess::Blob);
        assert_eq!(
            "Private".parse::<PublicAccess>().unwrap(),
            PublicAccess::None
        );
        assert!("everyone".parse::<PublicAccess>().is_err());
    }

    #[test]
    fn token_debug_is_opaque() {
        let token = ContinuationToken::new("2!88!MDAwMDI0IWJsb2I=");
        assert_eq!(format!("{token:?}"), "ContinuationToken(..)");
        assert_eq!(token.as_str(), "2!88!MDAwMDI0IWJsb2I=");
    }

    #[test]
    fn blob_item_serializes_with_kind_tag() {
        let item = BlobItem::Directory {
            prefix: "logs/".to_string(),
        };
        let value = toml::Value::try_from(&item).unwrap();
        assert_eq!(value.get("kind").and_then(|v| v.as_str()), Some("directory"));
    }
}
