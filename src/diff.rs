//! Structural change detection
//!
//! Compares two snapshots (file tree + named schemas) and emits a
//! severity-classified change list. The guiding rule: a change that could
//! make previously-valid consumer code fail to parse new data is breaking,
//! a change that only widens the accepted surface is minor, and
//! cosmetic/metadata deltas are patch.
//!
//! Output order is deterministic: tree changes in depth-first tree order,
//! then schema changes in lexical name order.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::schema::{PrimitiveKind, SchemaType};
use crate::snapshot::{FileNode, NodeKind, Snapshot};

/// Breaking/minor/patch classification driving version increments
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Patch,
    Minor,
    Breaking,
}

/// Field-level change status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// What kind of change was detected at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    TypeChanged,
    NullableAdded,
    NullableRemoved,
    OptionalAdded,
    OptionalRemoved,
    FieldAdded,
    FieldRemoved,
    /// Detected string-format delta
    ConstraintChanged,
    /// File/directory kind flip in the tree
    KindChanged,
    /// File byte-size delta in the tree
    SizeChanged,
    /// Tree entry only present on one side
    EntryAdded,
    EntryRemoved,
    /// Logical schema only present on one side
    SchemaAdded,
    SchemaRemoved,
}

/// One detected change between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Dotted path for schema changes, '/'-separated for tree changes
    pub path: String,
    pub status: ChangeStatus,
    pub change_kinds: BTreeSet<ChangeKind>,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_type: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_type: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_hint: Option<String>,
}

impl FieldChange {
    fn new(
        path: impl Into<String>,
        status: ChangeStatus,
        kinds: impl IntoIterator<Item = ChangeKind>,
        severity: Severity,
    ) -> Self {
        let path = path.into();
        let change_kinds: BTreeSet<ChangeKind> = kinds.into_iter().collect();
        Self {
            path,
            status,
            change_kinds,
            severity,
            previous_type: None,
            current_type: None,
            migration_hint: None,
        }
    }

    fn with_types(
        mut self,
        previous: Option<&SchemaType>,
        current: Option<&SchemaType>,
    ) -> Self {
        self.previous_type = previous.cloned();
        self.current_type = current.cloned();
        self
    }

    fn finish(mut self) -> Self {
        self.migration_hint = migration_hint(&self);
        self
    }
}

/// Diff two snapshots: tree changes first, then schema changes.
pub fn diff_snapshots(current: &Snapshot, previous: &Snapshot) -> Vec<FieldChange> {
    diff_parts(
        &current.structure,
        &current.schemas,
        &previous.structure,
        &previous.schemas,
    )
}

/// Diff a candidate (not yet versioned) state against a persisted snapshot.
pub fn diff_parts(
    current_tree: &FileNode,
    current_schemas: &std::collections::BTreeMap<String, SchemaType>,
    previous_tree: &FileNode,
    previous_schemas: &std::collections::BTreeMap<String, SchemaType>,
) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    diff_trees(current_tree, previous_tree, &mut changes);
    diff_schema_maps(current_schemas, previous_schemas, &mut changes);
    changes
}

/// The strongest severity present, `None` for an empty change list.
pub fn aggregate_severity(changes: &[FieldChange]) -> Option<Severity> {
    changes.iter().map(|c| c.severity).max()
}

fn diff_trees(current: &FileNode, previous: &FileNode, out: &mut Vec<FieldChange>) {
    if current.kind != previous.kind {
        // file<->directory flip invalidates the whole subtree, do not descend
        out.push(
            FieldChange::new(
                current.path.clone(),
                ChangeStatus::Modified,
                [ChangeKind::KindChanged],
                Severity::Breaking,
            )
            .finish(),
        );
        return;
    }

    match current.kind {
        NodeKind::File => {
            if current.size != previous.size {
                out.push(
                    FieldChange::new(
                        current.path.clone(),
                        ChangeStatus::Modified,
                        [ChangeKind::SizeChanged],
                        Severity::Patch,
                    )
                    .finish(),
                );
            }
        }
        NodeKind::Directory => {
            for child in &current.children {
                match previous.child(&child.name) {
                    Some(prev_child) => diff_trees(child, prev_child, out),
                    None => out.push(
                        FieldChange::new(
                            child.path.clone(),
                            ChangeStatus::Added,
                            [ChangeKind::EntryAdded],
                            Severity::Minor,
                        )
                        .finish(),
                    ),
                }
            }
            for prev_child in &previous.children {
                if current.child(&prev_child.name).is_none() {
                    out.push(
                        FieldChange::new(
                            prev_child.path.clone(),
                            ChangeStatus::Removed,
                            [ChangeKind::EntryRemoved],
                            Severity::Breaking,
                        )
                        .finish(),
                    );
                }
            }
        }
    }
}

fn diff_schema_maps(
    current: &std::collections::BTreeMap<String, SchemaType>,
    previous: &std::collections::BTreeMap<String, SchemaType>,
    out: &mut Vec<FieldChange>,
) {
    let names: BTreeSet<&String> = current.keys().chain(previous.keys()).collect();

    for name in names {
        match (previous.get(name.as_str()), current.get(name.as_str())) {
            (Some(prev), Some(cur)) => diff_types(name, prev, cur, out),
            (None, Some(cur)) => out.push(
                FieldChange::new(
                    name.clone(),
                    ChangeStatus::Added,
                    [ChangeKind::SchemaAdded],
                    Severity::Minor,
                )
                .with_types(None, Some(cur))
                .finish(),
            ),
            (Some(prev), None) => out.push(
                FieldChange::new(
                    name.clone(),
                    ChangeStatus::Removed,
                    [ChangeKind::SchemaRemoved],
                    Severity::Breaking,
                )
                .with_types(Some(prev), None)
                .finish(),
            ),
            (None, None) => unreachable!(),
        }
    }
}

/// Recursive structural comparison of two schema types at `path`.
fn diff_types(path: &str, previous: &SchemaType, current: &SchemaType, out: &mut Vec<FieldChange>) {
    if previous == current {
        return;
    }

    let (prev_base, prev_opt, prev_null) = previous.decompose();
    let (cur_base, cur_opt, cur_null) = current.decompose();

    let mut local: Vec<(ChangeKind, Severity)> = Vec::new();

    // Wrapper deltas: widening is minor, narrowing is breaking.
    if cur_opt && !prev_opt {
        local.push((ChangeKind::OptionalAdded, Severity::Minor));
    }
    if prev_opt && !cur_opt {
        local.push((ChangeKind::OptionalRemoved, Severity::Breaking));
    }
    if cur_null && !prev_null {
        local.push((ChangeKind::NullableAdded, Severity::Minor));
    }
    if prev_null && !cur_null {
        local.push((ChangeKind::NullableRemoved, Severity::Breaking));
    }

    match (prev_base, cur_base) {
        (a, b) if a == b => {}
        (
            SchemaType::Object {
                fields: prev_fields,
                ..
            },
            SchemaType::Object {
                fields: cur_fields, ..
            },
        ) => {
            let names: BTreeSet<&String> = prev_fields.keys().chain(cur_fields.keys()).collect();
            for name in names {
                let child_path = format!("{}.{}", path, name);
                match (prev_fields.get(name.as_str()), cur_fields.get(name.as_str())) {
                    (Some(p), Some(c)) => diff_types(&child_path, p, c, out),
                    (None, Some(c)) => out.push(
                        FieldChange::new(
                            child_path,
                            ChangeStatus::Added,
                            [ChangeKind::FieldAdded],
                            Severity::Minor,
                        )
                        .with_types(None, Some(c))
                        .finish(),
                    ),
                    (Some(p), None) => out.push(
                        FieldChange::new(
                            child_path,
                            ChangeStatus::Removed,
                            [ChangeKind::FieldRemoved],
                            Severity::Breaking,
                        )
                        .with_types(Some(p), None)
                        .finish(),
                    ),
                    (None, None) => unreachable!(),
                }
            }
        }
        (SchemaType::Array { element: prev_el }, SchemaType::Array { element: cur_el }) => {
            diff_types(&format!("{}[]", path), prev_el, cur_el, out);
        }
        (
            SchemaType::Union {
                members: prev_members,
            },
            SchemaType::Union {
                members: cur_members,
            },
        ) => {
            let prev_keys: BTreeSet<String> =
                prev_members.iter().map(|m| m.canonical_key()).collect();
            let cur_keys: BTreeSet<String> =
                cur_members.iter().map(|m| m.canonical_key()).collect();
            if prev_keys.difference(&cur_keys).next().is_some() {
                // a previously accepted member is gone
                local.push((ChangeKind::TypeChanged, Severity::Breaking));
            } else if cur_keys.difference(&prev_keys).next().is_some() {
                local.push((ChangeKind::TypeChanged, Severity::Minor));
            }
        }
        (
            SchemaType::Primitive {
                kind: prev_kind,
                format: prev_format,
            },
            SchemaType::Primitive {
                kind: cur_kind,
                format: cur_format,
            },
        ) => {
            if prev_kind == cur_kind {
                if prev_format != cur_format {
                    // adding or replacing a format narrows the accepted
                    // string domain; dropping one widens it
                    let severity = if cur_format.is_some() {
                        Severity::Breaking
                    } else {
                        Severity::Patch
                    };
                    local.push((ChangeKind::ConstraintChanged, severity));
                }
            } else if *prev_kind == PrimitiveKind::Unknown {
                local.push((ChangeKind::TypeChanged, Severity::Breaking));
            } else if *cur_kind == PrimitiveKind::Unknown {
                local.push((ChangeKind::TypeChanged, Severity::Minor));
            } else {
                local.push((ChangeKind::TypeChanged, Severity::Breaking));
            }
        }
        (prev_other, SchemaType::Union { members }) => {
            // widening into a union that still accepts the old type is minor
            let prev_key = prev_other.canonical_key();
            let widened = members.iter().any(|m| m.canonical_key() == prev_key);
            let severity = if widened {
                Severity::Minor
            } else {
                Severity::Breaking
            };
            local.push((ChangeKind::TypeChanged, severity));
        }
        (_, _) => {
            local.push((ChangeKind::TypeChanged, Severity::Breaking));
        }
    }

    if !local.is_empty() {
        let severity = local
            .iter()
            .map(|(_, s)| *s)
            .max()
            .unwrap_or(Severity::Patch);
        out.push(
            FieldChange::new(
                path,
                ChangeStatus::Modified,
                local.into_iter().map(|(k, _)| k),
                severity,
            )
            .with_types(Some(previous), Some(current))
            .finish(),
        );
    }
}

/// Templated free-text hint for a change; produced for every breaking and
/// minor change, omitted for patch-level deltas.
fn migration_hint(change: &FieldChange) -> Option<String> {
    if change.severity == Severity::Patch {
        return None;
    }

    let path = &change.path;
    let prev = change
        .previous_type
        .as_ref()
        .map(|t| t.canonical_key())
        .unwrap_or_else(|| "unknown".to_string());
    let cur = change
        .current_type
        .as_ref()
        .map(|t| t.canonical_key())
        .unwrap_or_else(|| "unknown".to_string());

    let kinds = &change.change_kinds;
    let hint = if kinds.contains(&ChangeKind::SchemaRemoved) {
        format!(
            "Schema '{}' was removed; pin an older version or drop the dependency (was {})",
            path, prev
        )
    } else if kinds.contains(&ChangeKind::SchemaAdded) {
        format!("Schema '{}' is new ({}); consumers may adopt it", path, cur)
    } else if kinds.contains(&ChangeKind::FieldRemoved) {
        format!(
            "Field '{}' was removed; stop reading it (previously {})",
            path, prev
        )
    } else if kinds.contains(&ChangeKind::FieldAdded) {
        format!(
            "Field '{}' is new ({}); existing consumers are unaffected",
            path, cur
        )
    } else if kinds.contains(&ChangeKind::EntryRemoved) {
        format!(
            "'{}' no longer exists in the export; remove readers or pin an older version",
            path
        )
    } else if kinds.contains(&ChangeKind::EntryAdded) {
        format!("'{}' is new in the export", path)
    } else if kinds.contains(&ChangeKind::KindChanged) {
        format!(
            "'{}' flipped between file and directory; update path handling",
            path
        )
    } else if kinds.contains(&ChangeKind::TypeChanged) {
        format!("Update consumers of '{}' from {} to {}", path, prev, cur)
    } else if kinds.contains(&ChangeKind::NullableRemoved) {
        format!(
            "'{}' can no longer be null; verify writers never send null before removing null handling",
            path
        )
    } else if kinds.contains(&ChangeKind::NullableAdded) {
        format!("'{}' may now be null; add null handling", path)
    } else if kinds.contains(&ChangeKind::OptionalRemoved) {
        format!("'{}' is now always present; absence handling can be dropped only after verifying producers", path)
    } else if kinds.contains(&ChangeKind::OptionalAdded) {
        format!("'{}' may now be absent; guard reads with a presence check", path)
    } else if kinds.contains(&ChangeKind::ConstraintChanged) {
        format!("'{}' now requires format {}; verify producers conform", path, cur)
    } else {
        format!("'{}' changed from {} to {}", path, prev, cur)
    };

    Some(hint)
}
