use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceParseError {
    #[error("Missing '://' separator in resource reference '{0}'")]
    MissingScheme(String),

    #[error("Invalid resource kind '{0}': expected a lowercase token")]
    InvalidKind(String),

    #[error("Missing identifier in resource reference '{0}'")]
    MissingIdentifier(String),
}

/// Kind of document a [`ResourceReference`] points into
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Requirement,
    Capability,
    Other(String),
}

impl ResourceKind {
    fn parse(s: &str) -> Result<Self, ReferenceParseError> {
        match s {
            "requirement" => Ok(Self::Requirement),
            "capability" => Ok(Self::Capability),
            _ if !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') =>
            {
                Ok(Self::Other(s.to_string()))
            }
            _ => Err(ReferenceParseError::InvalidKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requirement => write!(f, "requirement"),
            Self::Capability => write!(f, "capability"),
            Self::Other(kind) => write!(f, "{kind}"),
        }
    }
}

/// Address of a piece of a requirement or capability document.
///
/// The textual form is `{kind}://{identifier}/{path...}#{fragment}`, for example
/// `requirement://design-123/processes/milling#tolerance`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceReference {
    pub kind: ResourceKind,
    pub identifier: String,
    pub path: Vec<String>,
    pub fragment: Option<String>,
}

impl ResourceReference {
    pub fn new(kind: ResourceKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            path: Vec::new(),
            fragment: None,
        }
    }

    /// Reference to a requirement inside a requirement set
    pub fn requirement<I, S>(set_id: &str, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ResourceKind::Requirement, set_id).with_path(path)
    }

    /// Reference to a capability offered by a provider
    pub fn capability(provider_id: &str, capability_id: &str) -> Self {
        Self::new(ResourceKind::Capability, provider_id).with_path(["capabilities", capability_id])
    }

    #[must_use]
    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path.extend(path.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Last path segment, or the identifier when the path is empty
    pub fn leaf(&self) -> &str {
        self.path.last().map_or(self.identifier.as_str(), String::as_str)
    }

    /// The same reference without its fragment
    #[must_use]
    pub fn without_fragment(&self) -> Self {
        Self {
            fragment: None,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.kind, self.identifier)?;
        for segment in &self.path {
            write!(f, "/{segment}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourceReference {
    type Err = ReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once("://")
            .ok_or_else(|| ReferenceParseError::MissingScheme(s.to_string()))?;
        let kind = ResourceKind::parse(kind)?;

        let (location, fragment) = match rest.split_once('#') {
            Some((location, fragment)) if !fragment.is_empty() => (location, Some(fragment.to_string())),
            Some((location, _)) => (location, None),
            None => (rest, None),
        };

        let mut segments = location.split('/').filter(|segment| !segment.is_empty());
        let identifier = segments
            .next()
            .ok_or_else(|| ReferenceParseError::MissingIdentifier(s.to_string()))?
            .to_string();

        Ok(Self {
            kind,
            identifier,
            path: segments.map(str::to_string).collect(),
            fragment,
        })
    }
}

impl Serialize for ResourceReference {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceReference {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Captured copy of the content behind a [`ResourceReference`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub reference: ResourceReference,
    pub content: serde_json::Value,
    pub captured_at: DateTime<Utc>,

    /// MD5 of the serialized content, lowercase hex
    pub checksum: String,
}

impl ResourceSnapshot {
    /// Capture `content` for `reference` now
    pub fn capture(reference: ResourceReference, content: serde_json::Value) -> Self {
        let checksum = content_checksum(&content);
        Self {
            reference,
            content,
            captured_at: Utc::now(),
            checksum,
        }
    }

    /// Key under which the snapshot is stored in a supply tree
    pub fn key(&self) -> String {
        self.reference.to_string()
    }

    /// Whether the content still hashes to the recorded checksum
    pub fn is_intact(&self) -> bool {
        content_checksum(&self.content) == self.checksum
    }
}

fn content_checksum(content: &serde_json::Value) -> String {
    // serde_json maps are ordered, so the serialized form is canonical
    let digest = md5::compute(content.to_string().as_bytes());
    format!("{digest:x}")
}
