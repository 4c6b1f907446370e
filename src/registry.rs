//! Version registry
//!
//! Owns the on-disk manifest and the per-version snapshot directories.
//! Versioning is a state machine: `Empty` (no manifest) produces 1.0.0
//! regardless of changes; every later state bumps according to the
//! aggregated change severity.
//!
//! Durability is write-then-publish: all version artifacts are written
//! before the manifest (which carries the `latest` pointer) is replaced.
//! A failed write therefore never advances `latest`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::diff::{aggregate_severity, FieldChange, Severity};
use crate::error::{DriftError, Result};
use crate::schema::SchemaType;
use crate::snapshot::{Checksum, FileNode, Snapshot, VersionMetadata};
use crate::store::{BlobStore, FsStore, RegistryLock};
use crate::version::{ChangeType, RegistryVersion};

use serde::{Deserialize, Serialize};

/// The registry manifest: ordered version history plus the latest pointer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub versions: Vec<VersionMetadata>,
    pub latest: Option<RegistryVersion>,
}

enum ManifestState {
    Missing,
    Corrupt(String),
    Ready(Manifest),
}

/// Versioned snapshot store for one export identity
pub struct VersionRegistry<S: BlobStore = FsStore> {
    root: PathBuf,
    store: S,
}

impl VersionRegistry<FsStore> {
    /// Open a registry rooted at `path` on the local filesystem
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::with_store(path, FsStore::new())
    }
}

impl<S: BlobStore> VersionRegistry<S> {
    pub fn with_store(path: impl AsRef<Path>, store: S) -> Self {
        Self {
            root: path.as_ref().to_path_buf(),
            store,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    fn version_dir(&self, version: &RegistryVersion) -> PathBuf {
        self.root.join("versions").join(version.dir_name())
    }

    fn load_manifest(&self) -> ManifestState {
        let path = self.manifest_path();
        if !self.store.exists(&path) {
            return ManifestState::Missing;
        }
        let bytes = match self.store.read(&path) {
            Ok(bytes) => bytes,
            Err(e) => return ManifestState::Corrupt(e.to_string()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(manifest) => ManifestState::Ready(manifest),
            Err(e) => ManifestState::Corrupt(e.to_string()),
        }
    }

    /// Manifest for read paths: missing or unreadable degrades to empty.
    pub fn manifest(&self) -> Manifest {
        match self.load_manifest() {
            ManifestState::Ready(manifest) => manifest,
            ManifestState::Missing => Manifest::default(),
            ManifestState::Corrupt(reason) => {
                warn!(
                    manifest = %self.manifest_path().display(),
                    %reason,
                    "manifest unreadable, treating registry as empty for reads"
                );
                Manifest::default()
            }
        }
    }

    /// Manifest for write paths: an unreadable manifest must never be
    /// silently overwritten.
    fn manifest_for_write(&self) -> Result<Manifest> {
        match self.load_manifest() {
            ManifestState::Ready(manifest) => Ok(manifest),
            ManifestState::Missing => Ok(Manifest::default()),
            ManifestState::Corrupt(reason) => Err(DriftError::CorruptManifest {
                path: self.manifest_path(),
                reason,
            }),
        }
    }

    /// Create and persist the next version for the given validated state.
    ///
    /// From the empty state this is always 1.0.0 with `change_type =
    /// initial`; afterwards the aggregated change severity selects the bump.
    /// The registry lock serializes concurrent runs on the same root.
    pub fn create_version(
        &self,
        structure: FileNode,
        schemas: BTreeMap<String, SchemaType>,
        changes: &[FieldChange],
    ) -> Result<Snapshot> {
        let _lock = RegistryLock::acquire(&self.root)?;
        let mut manifest = self.manifest_for_write()?;

        let aggregate = aggregate_severity(changes);
        let (version, change_type, previous_version) = match &manifest.latest {
            None => (RegistryVersion::initial(), ChangeType::Initial, None),
            Some(latest) => {
                let change_type = ChangeType::from_aggregate(aggregate);
                (latest.bump(change_type), change_type, Some(latest.clone()))
            }
        };

        let metadata = VersionMetadata {
            version: version.clone(),
            timestamp: Utc::now(),
            previous_version,
            change_type,
            breaking: aggregate == Some(Severity::Breaking),
            content_hash: Snapshot::content_hash(&structure, &schemas),
        };
        let snapshot = Snapshot::new(metadata.clone(), structure, schemas);

        // published versions are immutable; unpublished leftovers from a
        // failed run are dead and safe to overwrite
        if manifest.versions.iter().any(|m| m.version == version) {
            return Err(DriftError::AlreadyExists {
                version: version.version_string(),
            });
        }
        let dir = self.version_dir(&version);

        // write every version artifact before touching the manifest
        let artifacts: [(&str, Vec<u8>); 4] = [
            ("metadata.json", serde_json::to_vec_pretty(&metadata)?),
            ("structure.json", serde_json::to_vec_pretty(&snapshot.structure)?),
            ("snapshot.json", serde_json::to_vec_pretty(&snapshot)?),
            ("changes.json", serde_json::to_vec_pretty(changes)?),
        ];
        let mut checksum_lines = Vec::new();
        for (name, bytes) in &artifacts {
            self.store.write(&dir.join(name), bytes)?;
            checksum_lines.push(format!("{}  {}", Checksum::from_bytes(bytes), name));
        }
        self.store.write(
            &dir.join("checksums.sha256"),
            checksum_lines.join("\n").as_bytes(),
        )?;
        // reserved for external schema generators
        self.store.create_dir_all(&dir.join("schemas"))?;

        // publish: the manifest write is the commit point
        manifest.versions.push(metadata);
        manifest.latest = Some(version.clone());
        self.store
            .write(&self.manifest_path(), &serde_json::to_vec_pretty(&manifest)?)?;

        // convenience link only, never read back
        let link = self.root.join("versions").join("latest");
        if let Err(e) = self.store.symlink(Path::new(&version.dir_name()), &link) {
            debug!(error = %e, "latest symlink not updated");
        }

        debug!(version = %version, change_type = %change_type, "version published");
        Ok(snapshot)
    }

    /// Version history, newest first, optionally truncated.
    pub fn history(&self, limit: Option<usize>) -> Vec<VersionMetadata> {
        let mut versions = self.manifest().versions;
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        if let Some(limit) = limit {
            versions.truncate(limit);
        }
        versions
    }

    /// Load the snapshot the `latest` pointer refers to, if any.
    pub fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        match self.manifest().latest {
            Some(version) => Ok(Some(self.snapshot(&version)?)),
            None => Ok(None),
        }
    }

    /// Load a persisted snapshot by version.
    pub fn snapshot(&self, version: &RegistryVersion) -> Result<Snapshot> {
        let path = self.version_dir(version).join("snapshot.json");
        if !self.store.exists(&path) {
            return Err(DriftError::NotFound {
                version: version.version_string(),
            });
        }
        let bytes = self.store.read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load two persisted snapshots for external diffing. The registry only
    /// retrieves state here; severity is the change detector's concern.
    pub fn compare(&self, a: &str, b: &str) -> Result<(Snapshot, Snapshot)> {
        let version_a = RegistryVersion::parse(a)?;
        let version_b = RegistryVersion::parse(b)?;
        Ok((self.snapshot(&version_a)?, self.snapshot(&version_b)?))
    }

    /// Recompute the checksums sidecar of a version directory.
    pub fn verify_version(&self, version: &str) -> Result<bool> {
        let version = RegistryVersion::parse(version)?;
        let dir = self.version_dir(&version);
        let sidecar = dir.join("checksums.sha256");
        if !self.store.exists(&sidecar) {
            return Err(DriftError::NotFound {
                version: version.version_string(),
            });
        }
        let listing = String::from_utf8_lossy(&self.store.read(&sidecar)?).into_owned();
        for line in listing.lines().filter(|l| !l.trim().is_empty()) {
            let Some((expected, name)) = line.split_once("  ") else {
                return Ok(false);
            };
            let bytes = self.store.read(&dir.join(name))?;
            if Checksum::from_bytes(&bytes).as_str() != expected {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{ChangeKind, ChangeStatus};
    use crate::schema::PrimitiveKind;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn tree() -> FileNode {
        FileNode::directory(
            "export",
            "",
            vec![FileNode::file("users.json", "users.json", 100)],
        )
    }

    fn schemas() -> BTreeMap<String, SchemaType> {
        let mut map = BTreeMap::new();
        map.insert(
            "users".to_string(),
            SchemaType::primitive(PrimitiveKind::String),
        );
        map
    }

    fn change(severity: Severity) -> FieldChange {
        let (status, kind) = match severity {
            Severity::Breaking => (ChangeStatus::Removed, ChangeKind::FieldRemoved),
            Severity::Minor => (ChangeStatus::Added, ChangeKind::FieldAdded),
            Severity::Patch => (ChangeStatus::Modified, ChangeKind::SizeChanged),
        };
        FieldChange {
            path: "users.field".to_string(),
            status,
            change_kinds: BTreeSet::from([kind]),
            severity,
            previous_type: None,
            current_type: None,
            migration_hint: None,
        }
    }

    #[test]
    fn test_empty_registry_produces_initial_version() {
        let dir = tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path());

        // severity is ignored from the empty state
        let snapshot = registry
            .create_version(tree(), schemas(), &[change(Severity::Breaking)])
            .unwrap();
        assert_eq!(snapshot.metadata.version.version_string(), "1.0.0");
        assert_eq!(snapshot.metadata.change_type, ChangeType::Initial);
        assert!(snapshot.metadata.previous_version.is_none());
    }

    #[test]
    fn test_version_sequence() {
        let dir = tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path());

        let v1 = registry.create_version(tree(), schemas(), &[]).unwrap();
        assert_eq!(v1.metadata.version.version_string(), "1.0.0");

        let v2 = registry
            .create_version(tree(), schemas(), &[change(Severity::Minor)])
            .unwrap();
        assert_eq!(v2.metadata.version.version_string(), "1.1.0");
        assert_eq!(v2.metadata.change_type, ChangeType::Minor);

        let v3 = registry
            .create_version(tree(), schemas(), &[change(Severity::Breaking)])
            .unwrap();
        assert_eq!(v3.metadata.version.version_string(), "2.0.0");
        assert!(v3.metadata.breaking);

        let v4 = registry
            .create_version(tree(), schemas(), &[change(Severity::Patch)])
            .unwrap();
        assert_eq!(v4.metadata.version.version_string(), "2.0.1");
        assert_eq!(
            v4.metadata.previous_version.as_ref().unwrap().version_string(),
            "2.0.0"
        );
    }

    #[test]
    fn test_history_is_descending_and_truncated() {
        let dir = tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path());

        registry.create_version(tree(), schemas(), &[]).unwrap();
        registry
            .create_version(tree(), schemas(), &[change(Severity::Minor)])
            .unwrap();
        registry
            .create_version(tree(), schemas(), &[change(Severity::Breaking)])
            .unwrap();

        let history = registry.history(None);
        let versions: Vec<String> = history
            .iter()
            .map(|m| m.version.version_string())
            .collect();
        assert_eq!(versions, vec!["2.0.0", "1.1.0", "1.0.0"]);

        assert_eq!(registry.history(Some(2)).len(), 2);
    }

    #[test]
    fn test_compare_retrieves_persisted_snapshots() {
        let dir = tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path());

        registry.create_version(tree(), schemas(), &[]).unwrap();
        registry
            .create_version(tree(), BTreeMap::new(), &[change(Severity::Breaking)])
            .unwrap();

        let (a, b) = registry.compare("1.0.0", "v2.0.0").unwrap();
        assert_eq!(a.metadata.version.version_string(), "1.0.0");
        assert_eq!(b.metadata.version.version_string(), "2.0.0");
        assert!(a.schemas.contains_key("users"));
        assert!(b.schemas.is_empty());
    }

    #[test]
    fn test_missing_version_is_not_found() {
        let dir = tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path());
        let err = registry.compare("1.0.0", "2.0.0").unwrap_err();
        assert!(matches!(err, DriftError::NotFound { .. }));
    }

    #[test]
    fn test_corrupt_manifest_degrades_reads_but_fails_writes() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.json"), b"{not json").unwrap();
        let registry = VersionRegistry::open(dir.path());

        // reads degrade to empty
        assert!(registry.history(None).is_empty());
        assert!(registry.latest_snapshot().unwrap().is_none());

        // writes surface the corruption
        let err = registry
            .create_version(tree(), schemas(), &[])
            .unwrap_err();
        assert!(matches!(err, DriftError::CorruptManifest { .. }));
    }

    #[test]
    fn test_verify_version_checksums() {
        let dir = tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path());
        registry.create_version(tree(), schemas(), &[]).unwrap();

        assert!(registry.verify_version("1.0.0").unwrap());

        // tamper with a persisted artifact
        let path = dir
            .path()
            .join("versions")
            .join("v1.0.0")
            .join("structure.json");
        std::fs::write(&path, b"{}").unwrap();
        assert!(!registry.verify_version("1.0.0").unwrap());
    }

    #[test]
    fn test_published_version_is_immutable() {
        let dir = tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path());
        registry.create_version(tree(), schemas(), &[]).unwrap();

        // a manifest that lists 1.0.0 but lost its latest pointer
        let mut manifest = registry.manifest();
        manifest.latest = None;
        std::fs::write(
            dir.path().join("manifest.json"),
            serde_json::to_vec_pretty(&manifest).unwrap(),
        )
        .unwrap();

        // the next run would mint 1.0.0 again; the published entry wins
        let err = registry.create_version(tree(), schemas(), &[]).unwrap_err();
        assert!(matches!(err, DriftError::AlreadyExists { .. }));
    }

    /// Store wrapper that fails when writing a specific artifact name.
    struct FailOn {
        inner: FsStore,
        needle: &'static str,
    }

    impl BlobStore for FailOn {
        fn read(&self, path: &Path) -> crate::error::Result<Vec<u8>> {
            self.inner.read(path)
        }
        fn write(&self, path: &Path, bytes: &[u8]) -> crate::error::Result<()> {
            if path.to_string_lossy().ends_with(self.needle) {
                return Err(DriftError::Persistence {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "injected"),
                });
            }
            self.inner.write(path, bytes)
        }
        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }
        fn create_dir_all(&self, path: &Path) -> crate::error::Result<()> {
            self.inner.create_dir_all(path)
        }
    }

    #[test]
    fn test_failed_write_does_not_advance_latest() {
        let dir = tempdir().unwrap();

        let registry = VersionRegistry::open(dir.path());
        registry.create_version(tree(), schemas(), &[]).unwrap();

        let failing = VersionRegistry::with_store(
            dir.path(),
            FailOn {
                inner: FsStore::new(),
                needle: "changes.json",
            },
        );
        let err = failing
            .create_version(tree(), schemas(), &[change(Severity::Breaking)])
            .unwrap_err();
        assert!(matches!(err, DriftError::Persistence { .. }));

        // the latest pointer still refers to the published version
        let manifest = registry.manifest();
        assert_eq!(
            manifest.latest.unwrap().version_string(),
            "1.0.0"
        );
        assert_eq!(manifest.versions.len(), 1);

        // a retry with a healthy store publishes over the dead leftovers
        let retried = registry
            .create_version(tree(), schemas(), &[change(Severity::Breaking)])
            .unwrap();
        assert_eq!(retried.metadata.version.version_string(), "2.0.0");
        assert_eq!(
            registry.manifest().latest.unwrap().version_string(),
            "2.0.0"
        );
    }
}
