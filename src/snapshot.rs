//! Snapshot data model
//!
//! A snapshot is an immutable capture of a file tree plus its inferred
//! schemas at one point in time. Once persisted it is never mutated; the
//! checksum is a cheap identity probe over the tree shape and schema names,
//! deliberately not a full content hash.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schema::SchemaType;
use crate::version::{ChangeType, RegistryVersion};

/// SHA256 checksum with hex display
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a string
    pub fn from_str(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Compute checksum from a JSON value (serialized form)
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::from_str(&canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that content matches this checksum
    pub fn verify(&self, content: &str) -> bool {
        let computed = Self::from_str(content);
        self.0 == computed.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether a tree node is a file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Directory,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => write!(f, "file"),
            NodeKind::Directory => write!(f, "directory"),
        }
    }
}

/// One node of the captured file tree.
///
/// Child order is significant: it must be stable across runs because the
/// snapshot checksum and diff output ordering both derive from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    /// Path relative to the scanned root, '/'-separated
    pub path: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

impl FileNode {
    pub fn file(name: impl Into<String>, path: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File,
            size: Some(size),
            children: Vec::new(),
        }
    }

    pub fn directory(
        name: impl Into<String>,
        path: impl Into<String>,
        children: Vec<FileNode>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory,
            size: None,
            children,
        }
    }

    /// Find a direct child by name
    pub fn child(&self, name: &str) -> Option<&FileNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Append the depth-first "path:kind" shape listing of this subtree
    fn shape_lines(&self, out: &mut Vec<String>) {
        out.push(format!("{}:{}", self.path, self.kind));
        for child in &self.children {
            child.shape_lines(out);
        }
    }
}

/// Metadata for one persisted version.
///
/// Created once per validation run and never mutated afterwards; the
/// `previous_version` links form an append-only chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub version: RegistryVersion,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<RegistryVersion>,
    pub change_type: ChangeType,
    pub breaking: bool,
    pub content_hash: Checksum,
}

/// An immutable capture of a file tree and its inferred schemas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: VersionMetadata,
    pub structure: FileNode,
    pub schemas: BTreeMap<String, SchemaType>,
    pub checksum: Checksum,
}

impl Snapshot {
    pub fn new(
        metadata: VersionMetadata,
        structure: FileNode,
        schemas: BTreeMap<String, SchemaType>,
    ) -> Self {
        let checksum = Self::compute_checksum(&structure, &schemas);
        Self {
            metadata,
            structure,
            schemas,
            checksum,
        }
    }

    /// Identity probe: hash of the tree shape plus the sorted schema-name
    /// list. Equal checksums mean "same shape", not "same content".
    pub fn compute_checksum(
        structure: &FileNode,
        schemas: &BTreeMap<String, SchemaType>,
    ) -> Checksum {
        let mut lines = Vec::new();
        structure.shape_lines(&mut lines);
        lines.push("--".to_string());
        // BTreeMap keys iterate sorted
        lines.extend(schemas.keys().cloned());
        Checksum::from_str(&lines.join("\n"))
    }

    /// Hash of the full structure and schema content, recorded in metadata.
    pub fn content_hash(
        structure: &FileNode,
        schemas: &BTreeMap<String, SchemaType>,
    ) -> Checksum {
        let body = serde_json::json!({
            "structure": structure,
            "schemas": schemas,
        });
        Checksum::from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PrimitiveKind, SchemaType};

    fn sample_tree() -> FileNode {
        FileNode::directory(
            "export",
            "",
            vec![
                FileNode::file("users.json", "users.json", 120),
                FileNode::directory(
                    "data",
                    "data",
                    vec![FileNode::file("orders.json", "data/orders.json", 64)],
                ),
            ],
        )
    }

    #[test]
    fn test_checksum_consistency() {
        let content = r#"{"name": "test", "version": "1.0.0"}"#;
        assert_eq!(Checksum::from_str(content), Checksum::from_str(content));
    }

    #[test]
    fn test_checksum_different_content() {
        assert_ne!(
            Checksum::from_str(r#"{"name": "a"}"#),
            Checksum::from_str(r#"{"name": "b"}"#)
        );
    }

    #[test]
    fn test_snapshot_checksum_ignores_file_sizes() {
        let mut schemas = BTreeMap::new();
        schemas.insert(
            "users".to_string(),
            SchemaType::primitive(PrimitiveKind::String),
        );

        let a = Snapshot::compute_checksum(&sample_tree(), &schemas);

        let mut resized = sample_tree();
        resized.children[0].size = Some(999);
        let b = Snapshot::compute_checksum(&resized, &schemas);

        // shape probe: size deltas do not change identity
        assert_eq!(a, b);
    }

    #[test]
    fn test_snapshot_checksum_sees_schema_names() {
        let tree = sample_tree();
        let mut schemas = BTreeMap::new();
        schemas.insert(
            "users".to_string(),
            SchemaType::primitive(PrimitiveKind::String),
        );
        let a = Snapshot::compute_checksum(&tree, &schemas);

        schemas.insert(
            "orders".to_string(),
            SchemaType::primitive(PrimitiveKind::Number),
        );
        let b = Snapshot::compute_checksum(&tree, &schemas);
        assert_ne!(a, b);
    }

    #[test]
    fn test_child_lookup() {
        let tree = sample_tree();
        assert!(tree.child("data").is_some());
        assert!(tree.child("missing").is_none());
    }

    #[test]
    fn test_file_node_serde_round_trip() {
        let tree = sample_tree();
        let json = serde_json::to_string(&tree).unwrap();
        let back: FileNode = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }
}
