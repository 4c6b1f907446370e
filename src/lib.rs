//! Schema Drift Registry
//!
//! A versioned pipeline for semi-structured data exports: infer structural
//! schemas from sampled records, diff the result against the previously
//! persisted snapshot, and record each observed state under a monotonically
//! increasing semantic version.
//!
//! ## Features
//!
//! - **Schema Inference**: recursive type unification over sampled records,
//!   with string-format detection and configurable nullability policies
//! - **Change Detection**: tree + schema diff with breaking/minor/patch
//!   severity classification and migration hints
//! - **Semantic Versioning**: severity aggregates drive major/minor/patch
//!   bumps; history forms an append-only chain
//! - **Durable Snapshots**: write-then-publish persistence; a failed run
//!   never moves the `latest` pointer
//!
//! ## Architecture
//!
//! ```text
//! <registry root>/
//! ├── manifest.json            version list + latest pointer
//! └── versions/
//!     ├── v1.0.0/
//!     │   ├── metadata.json
//!     │   ├── structure.json
//!     │   ├── snapshot.json
//!     │   ├── changes.json
//!     │   ├── checksums.sha256
//!     │   └── schemas/         populated by external generators
//!     ├── v1.1.0/
//!     └── latest -> v1.1.0     convenience link, never read back
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod formats;
pub mod infer;
pub mod pipeline;
pub mod registry;
pub mod sampling;
pub mod schema;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod version;

pub use config::DriftConfig;
pub use diff::{diff_snapshots, ChangeKind, ChangeStatus, FieldChange, Severity};
pub use error::{DriftError, Result};
pub use formats::{detect_format, ValueFormat};
pub use infer::{InferenceConfig, InferenceMode, SchemaInferrer};
pub use pipeline::{Pipeline, ValidationOutcome};
pub use registry::{Manifest, VersionRegistry};
pub use sampling::SampleStrategy;
pub use schema::{PrimitiveKind, SchemaType};
pub use snapshot::{Checksum, FileNode, NodeKind, Snapshot, VersionMetadata};
pub use source::{FileProcessor, FsFileProcessor};
pub use store::{BlobStore, FsStore};
pub use version::{ChangeType, RegistryVersion};
