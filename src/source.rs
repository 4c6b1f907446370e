//! Input scanning
//!
//! [`FileProcessor`] is the collaborator boundary that supplies the pipeline
//! with a file tree plus per-file record samples. [`FsFileProcessor`] is the
//! filesystem implementation: JSON and JSON-lines files are decoded natively;
//! CSV/XML/YAML are recognized structured formats whose decoding belongs to
//! an external collaborator; anything else is skipped as unsupported. All
//! per-file failures are isolated into warnings, never aborting the scan.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{DriftError, Result};
use crate::snapshot::FileNode;

/// Structured formats an external decoder is responsible for.
const DELEGATED_EXTENSIONS: [&str; 4] = ["csv", "xml", "yaml", "yml"];

/// One parsed file: a logical schema name plus its sampled records
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Logical name, derived from the relative path without extension
    /// ("data/orders.json" becomes "data.orders")
    pub name: String,
    pub path: String,
    pub records: Vec<Value>,
}

/// A per-file problem that did not abort the scan
#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceWarning {
    pub path: String,
    pub reason: String,
}

/// Result of scanning an input tree
#[derive(Debug)]
pub struct SourceTree {
    pub structure: FileNode,
    pub documents: Vec<SourceDocument>,
    pub warnings: Vec<SourceWarning>,
}

/// Supplies the pipeline with a file tree and per-file record samples
pub trait FileProcessor {
    fn scan(&self) -> Result<SourceTree>;
}

/// Filesystem-backed processor rooted at a directory
pub struct FsFileProcessor {
    root: PathBuf,
    max_records: usize,
}

impl FsFileProcessor {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_records: 10_000,
        }
    }

    /// Cap on records loaded per file, bounding memory on large inputs
    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }

    fn logical_name(rel_path: &str) -> String {
        let without_ext = match rel_path.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => rel_path,
        };
        without_ext.replace('/', ".")
    }

    fn load_records(&self, path: &Path, extension: &str) -> std::result::Result<Vec<Value>, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        match extension {
            "json" => {
                let value: Value = serde_json::from_str(&content).map_err(|e| e.to_string())?;
                Ok(match value {
                    Value::Array(mut items) => {
                        items.truncate(self.max_records);
                        items
                    }
                    other => vec![other],
                })
            }
            "jsonl" | "ndjson" => {
                let mut records = Vec::new();
                for line in content
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .take(self.max_records)
                {
                    let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
                    records.push(value);
                }
                Ok(records)
            }
            other => Err(format!("no decoder for .{}", other)),
        }
    }

    fn process_file(
        &self,
        path: &Path,
        rel_path: &str,
        documents: &mut Vec<SourceDocument>,
        warnings: &mut Vec<SourceWarning>,
    ) {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "json" | "jsonl" | "ndjson" => match self.load_records(path, &extension) {
                Ok(records) => documents.push(SourceDocument {
                    name: Self::logical_name(rel_path),
                    path: rel_path.to_string(),
                    records,
                }),
                Err(reason) => {
                    let error = DriftError::Parse {
                        path: rel_path.to_string(),
                        reason,
                    };
                    warn!(path = rel_path, error = %error, "file skipped");
                    warnings.push(SourceWarning {
                        path: rel_path.to_string(),
                        reason: error.to_string(),
                    });
                }
            },
            ext if DELEGATED_EXTENSIONS.contains(&ext) => {
                warn!(path = rel_path, extension = ext, "file skipped: decoder is external");
                warnings.push(SourceWarning {
                    path: rel_path.to_string(),
                    reason: format!(".{} decoding is delegated to an external processor", ext),
                });
            }
            ext => {
                let error = DriftError::UnsupportedFormat {
                    path: rel_path.to_string(),
                    extension: ext.to_string(),
                };
                warn!(path = rel_path, error = %error, "file skipped");
                warnings.push(SourceWarning {
                    path: rel_path.to_string(),
                    reason: error.to_string(),
                });
            }
        }
    }
}

impl FileProcessor for FsFileProcessor {
    fn scan(&self) -> Result<SourceTree> {
        let mut documents = Vec::new();
        let mut warnings = Vec::new();

        // sort_by_file_name makes child order stable across runs, which the
        // snapshot checksum requires
        let mut stack: Vec<FileNode> = Vec::new();
        let mut root: Option<FileNode> = None;

        fn attach(stack: &mut Vec<FileNode>, root: &mut Option<FileNode>, node: FileNode) {
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => *root = Some(node),
            }
        }

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let depth = entry.depth();

            while stack.len() > depth {
                if let Some(done) = stack.pop() {
                    attach(&mut stack, &mut root, done);
                }
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let rel_path = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or_else(|_| Path::new(""))
                .to_string_lossy()
                .replace('\\', "/");

            if entry.file_type().is_dir() {
                stack.push(FileNode::directory(name, rel_path, Vec::new()));
            } else {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                self.process_file(entry.path(), &rel_path, &mut documents, &mut warnings);
                attach(
                    &mut stack,
                    &mut root,
                    FileNode::file(name, rel_path, size),
                );
            }
        }

        while let Some(done) = stack.pop() {
            attach(&mut stack, &mut root, done);
        }

        let structure = root.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("nothing to scan at {}", self.root.display()),
            )
        })?;

        Ok(SourceTree {
            structure,
            documents,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_builds_sorted_tree_and_documents() {
        let dir = tempdir().unwrap();
        write(dir.path(), "users.json", r#"[{"id": 1}, {"id": 2}]"#);
        write(dir.path(), "data/orders.json", r#"{"total": 9.5}"#);
        write(dir.path(), "data/archive.json", r#"[]"#);

        let tree = FsFileProcessor::new(dir.path()).scan().unwrap();

        // children sorted by name: data < users.json
        assert_eq!(tree.structure.children[0].name, "data");
        assert_eq!(tree.structure.children[1].name, "users.json");
        let data = &tree.structure.children[0];
        assert_eq!(data.children[0].name, "archive.json");
        assert_eq!(data.children[1].name, "orders.json");

        let names: Vec<&str> = tree.documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["data.archive", "data.orders", "users"]);

        let users = tree.documents.iter().find(|d| d.name == "users").unwrap();
        assert_eq!(users.records.len(), 2);
        assert!(tree.warnings.is_empty());
    }

    #[test]
    fn test_parse_failure_is_isolated() {
        let dir = tempdir().unwrap();
        write(dir.path(), "good.json", r#"[{"a": 1}]"#);
        write(dir.path(), "bad.json", "{ not valid");

        let tree = FsFileProcessor::new(dir.path()).scan().unwrap();

        assert_eq!(tree.documents.len(), 1);
        assert_eq!(tree.documents[0].name, "good");
        assert_eq!(tree.warnings.len(), 1);
        assert_eq!(tree.warnings[0].path, "bad.json");
        // the bad file still appears in the structure
        assert!(tree.structure.child("bad.json").is_some());
    }

    #[test]
    fn test_delegated_and_unsupported_extensions() {
        let dir = tempdir().unwrap();
        write(dir.path(), "table.csv", "a,b\n1,2");
        write(dir.path(), "notes.txt", "hello");

        let tree = FsFileProcessor::new(dir.path()).scan().unwrap();
        assert!(tree.documents.is_empty());
        assert_eq!(tree.warnings.len(), 2);
        assert!(tree.warnings.iter().any(|w| w.reason.contains("delegated")));
        assert!(tree
            .warnings
            .iter()
            .any(|w| w.reason.contains("unsupported")));
    }

    #[test]
    fn test_jsonl_records() {
        let dir = tempdir().unwrap();
        write(dir.path(), "events.jsonl", "{\"e\": 1}\n{\"e\": 2}\n\n{\"e\": 3}\n");

        let tree = FsFileProcessor::new(dir.path()).scan().unwrap();
        assert_eq!(tree.documents[0].records.len(), 3);
    }

    #[test]
    fn test_max_records_cap() {
        let dir = tempdir().unwrap();
        let body: Vec<String> = (0..50).map(|i| format!("{{\"i\": {}}}", i)).collect();
        write(dir.path(), "big.jsonl", &body.join("\n"));

        let tree = FsFileProcessor::new(dir.path())
            .with_max_records(10)
            .scan()
            .unwrap();
        assert_eq!(tree.documents[0].records.len(), 10);
    }
}
