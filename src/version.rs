//! Registry versioning utilities

use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::diff::Severity;
use crate::error::{DriftError, Result};

/// Kind of version transition recorded in metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// First version of an export identity, always 1.0.0
    Initial,
    Major,
    Minor,
    Patch,
}

impl ChangeType {
    /// Map an aggregated change severity to the bump it drives.
    ///
    /// A run with no detected changes still produces a patch version so the
    /// observation itself is recorded.
    pub fn from_aggregate(aggregate: Option<Severity>) -> Self {
        match aggregate {
            Some(Severity::Breaking) => ChangeType::Major,
            Some(Severity::Minor) => ChangeType::Minor,
            Some(Severity::Patch) | None => ChangeType::Patch,
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Initial => write!(f, "initial"),
            ChangeType::Major => write!(f, "major"),
            ChangeType::Minor => write!(f, "minor"),
            ChangeType::Patch => write!(f, "patch"),
        }
    }
}

/// A semantic version owned by the registry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryVersion(Version);

impl RegistryVersion {
    /// The version every export identity starts from.
    pub fn initial() -> Self {
        Self(Version::new(1, 0, 0))
    }

    /// Parse a version string, accepting an optional leading 'v'.
    pub fn parse(version_str: &str) -> Result<Self> {
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        let version = Version::parse(version_str)
            .map_err(|e| DriftError::InvalidVersion(format!("{}: {}", version_str, e)))?;
        Ok(Self(version))
    }

    pub fn version_string(&self) -> String {
        self.0.to_string()
    }

    /// Tag form, e.g. "v1.2.3"
    pub fn tag_string(&self) -> String {
        format!("v{}", self.0)
    }

    /// Directory name for this version inside the registry
    pub fn dir_name(&self) -> String {
        self.tag_string()
    }

    /// Produce the successor version for a given transition kind.
    ///
    /// Major resets minor and patch; minor resets patch.
    pub fn bump(&self, change_type: ChangeType) -> Self {
        match change_type {
            ChangeType::Initial => Self::initial(),
            ChangeType::Major => Self(Version::new(self.0.major + 1, 0, 0)),
            ChangeType::Minor => Self(Version::new(self.0.major, self.0.minor + 1, 0)),
            ChangeType::Patch => {
                Self(Version::new(self.0.major, self.0.minor, self.0.patch + 1))
            }
        }
    }
}

impl fmt::Display for RegistryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
