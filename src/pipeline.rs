//! Validation pipeline
//!
//! Ties the stages together: scan -> infer -> diff -> version -> persist.
//! The pipeline is sequential per run; all configuration is passed in at
//! construction time so independent pipelines never share state.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::DriftConfig;
use crate::diff::{self, FieldChange};
use crate::error::Result;
use crate::infer::SchemaInferrer;
use crate::registry::VersionRegistry;
use crate::schema::SchemaType;
use crate::snapshot::{Snapshot, VersionMetadata};
use crate::source::{FileProcessor, SourceWarning};
use crate::store::{BlobStore, FsStore};

/// Everything one validation run produces
#[derive(Debug)]
pub struct ValidationOutcome {
    pub snapshot: Snapshot,
    pub changes: Vec<FieldChange>,
    pub metadata: VersionMetadata,
    /// Per-file skips; non-fatal by design
    pub warnings: Vec<SourceWarning>,
}

/// The drift pipeline for one export identity
pub struct Pipeline<S: BlobStore = FsStore> {
    config: DriftConfig,
    registry: VersionRegistry<S>,
    inferrer: SchemaInferrer,
}

impl Pipeline<FsStore> {
    pub fn new(config: DriftConfig) -> Self {
        let registry = VersionRegistry::open(&config.registry.path);
        Self::with_registry(config, registry)
    }
}

impl<S: BlobStore> Pipeline<S> {
    pub fn with_registry(config: DriftConfig, registry: VersionRegistry<S>) -> Self {
        let inferrer = SchemaInferrer::with_config(config.inference.clone());
        Self {
            config,
            registry,
            inferrer,
        }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub fn registry(&self) -> &VersionRegistry<S> {
        &self.registry
    }

    /// Run one validation: scan the input, infer schemas, diff against the
    /// latest persisted snapshot, create and persist the next version.
    pub fn validate(&self, processor: &dyn FileProcessor) -> Result<ValidationOutcome> {
        if let Some(identity) = &self.config.registry.identity {
            info!(identity = %identity, "validation run started");
        }

        let source = processor.scan()?;
        debug!(
            documents = source.documents.len(),
            warnings = source.warnings.len(),
            "scan complete"
        );

        let mut schemas: BTreeMap<String, SchemaType> = BTreeMap::new();
        for document in &source.documents {
            let schema = self.inferrer.infer(&document.records);
            schemas.insert(document.name.clone(), schema);
        }

        let previous = self.registry.latest_snapshot()?;
        let changes = match &previous {
            Some(prev) => diff::diff_parts(
                &source.structure,
                &schemas,
                &prev.structure,
                &prev.schemas,
            ),
            None => Vec::new(),
        };

        let snapshot = self
            .registry
            .create_version(source.structure, schemas, &changes)?;

        info!(
            version = %snapshot.metadata.version,
            changes = changes.len(),
            breaking = snapshot.metadata.breaking,
            "validation run persisted"
        );

        Ok(ValidationOutcome {
            metadata: snapshot.metadata.clone(),
            snapshot,
            changes,
            warnings: source.warnings,
        })
    }

    /// Version history, newest first.
    pub fn history(&self, limit: Option<usize>) -> Vec<VersionMetadata> {
        self.registry.history(limit)
    }

    /// Load two persisted snapshots for external diff rendering.
    pub fn compare(&self, a: &str, b: &str) -> Result<(Snapshot, Snapshot)> {
        self.registry.compare(a, b)
    }
}
