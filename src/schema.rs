//! Structural schema types
//!
//! `SchemaType` is a closed sum type: every schema the pipeline infers,
//! diffs, or persists is one of these variants. Structural equality and the
//! serialized form are defined here and nowhere else.
//!
//! Two invariants are maintained by the constructors:
//! - `Union` members are pairwise distinct, keyed and ordered by
//!   [`SchemaType::canonical_key`]
//! - `Optional`/`Nullable` never directly wrap another wrapper of the same
//!   kind

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::formats::ValueFormat;

/// Scalar kind of a primitive schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
    Null,
    Unknown,
}

impl PrimitiveKind {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Null => "null",
            PrimitiveKind::Unknown => "unknown",
        }
    }
}

/// A structural schema description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaType {
    /// Scalar value, optionally refined by a detected string format
    Primitive {
        kind: PrimitiveKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<ValueFormat>,
    },
    /// Object with named fields; `required` lists fields present in every sample
    Object {
        fields: BTreeMap<String, SchemaType>,
        required: BTreeSet<String>,
    },
    /// Homogeneous-element array (element may itself be a union)
    Array { element: Box<SchemaType> },
    /// One of several structurally distinct member types
    Union { members: Vec<SchemaType> },
    /// Field may be absent
    Optional { inner: Box<SchemaType> },
    /// Value may be null
    Nullable { inner: Box<SchemaType> },
}

impl SchemaType {
    /// Bare primitive without a format
    pub fn primitive(kind: PrimitiveKind) -> Self {
        SchemaType::Primitive { kind, format: None }
    }

    /// String primitive refined by a detected format
    pub fn string_with_format(format: Option<ValueFormat>) -> Self {
        SchemaType::Primitive {
            kind: PrimitiveKind::String,
            format,
        }
    }

    pub fn unknown() -> Self {
        Self::primitive(PrimitiveKind::Unknown)
    }

    /// Build an object, deriving the required set from wrapper types: a field
    /// is required unless its type is `Optional` at the outermost level.
    pub fn object(fields: BTreeMap<String, SchemaType>) -> Self {
        let required = fields
            .iter()
            .filter(|(_, t)| !matches!(t, SchemaType::Optional { .. }))
            .map(|(name, _)| name.clone())
            .collect();
        SchemaType::Object { fields, required }
    }

    pub fn array(element: SchemaType) -> Self {
        SchemaType::Array {
            element: Box::new(element),
        }
    }

    /// Wrap in `Optional`, flattening nested `Optional`s.
    pub fn optional(inner: SchemaType) -> Self {
        match inner {
            already @ SchemaType::Optional { .. } => already,
            other => SchemaType::Optional {
                inner: Box::new(other),
            },
        }
    }

    /// Wrap in `Nullable`, flattening nested `Nullable`s.
    pub fn nullable(inner: SchemaType) -> Self {
        match inner {
            already @ SchemaType::Nullable { .. } => already,
            other => SchemaType::Nullable {
                inner: Box::new(other),
            },
        }
    }

    /// Build a union from candidate members.
    ///
    /// Nested unions are flattened, members are deduplicated by canonical key
    /// and stored in canonical-key order. Zero members collapse to `unknown`,
    /// a single member collapses to itself.
    pub fn union(candidates: Vec<SchemaType>) -> Self {
        let mut flat = Vec::new();
        for candidate in candidates {
            match candidate {
                SchemaType::Union { members } => flat.extend(members),
                other => flat.push(other),
            }
        }

        let mut seen = BTreeSet::new();
        let mut members: Vec<SchemaType> = Vec::new();
        for member in flat {
            if seen.insert(member.canonical_key()) {
                members.push(member);
            }
        }
        members.sort_by_key(|m| m.canonical_key());

        match members.len() {
            0 => SchemaType::unknown(),
            1 => members.into_iter().next().unwrap(),
            _ => SchemaType::Union { members },
        }
    }

    /// Stable, compact textual identity used for union deduplication,
    /// checksums, and migration hints.
    pub fn canonical_key(&self) -> String {
        match self {
            SchemaType::Primitive { kind, format } => match format {
                Some(f) => format!("{}<{}>", kind.name(), f),
                None => kind.name().to_string(),
            },
            SchemaType::Object { fields, required } => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(name, t)| {
                        let marker = if required.contains(name) { "" } else { "?" };
                        format!("{}{}:{}", name, marker, t.canonical_key())
                    })
                    .collect();
                format!("object{{{}}}", parts.join(","))
            }
            SchemaType::Array { element } => format!("array<{}>", element.canonical_key()),
            SchemaType::Union { members } => {
                let keys: Vec<String> = members.iter().map(|m| m.canonical_key()).collect();
                format!("union<{}>", keys.join("|"))
            }
            SchemaType::Optional { inner } => format!("optional<{}>", inner.canonical_key()),
            SchemaType::Nullable { inner } => format!("nullable<{}>", inner.canonical_key()),
        }
    }

    /// Strip `Optional`/`Nullable` wrappers, returning the base type and
    /// which wrappers were present.
    pub fn decompose(&self) -> (&SchemaType, bool, bool) {
        let mut current = self;
        let mut optional = false;
        let mut nullable = false;
        loop {
            match current {
                SchemaType::Optional { inner } => {
                    optional = true;
                    current = inner;
                }
                SchemaType::Nullable { inner } => {
                    nullable = true;
                    current = inner;
                }
                base => return (base, optional, nullable),
            }
        }
    }

    /// Top-level kind name for display purposes
    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaType::Primitive { kind, .. } => kind.name(),
            SchemaType::Object { .. } => "object",
            SchemaType::Array { .. } => "array",
            SchemaType::Union { .. } => "union",
            SchemaType::Optional { .. } => "optional",
            SchemaType::Nullable { .. } => "nullable",
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_dedup_and_order() {
        let a = SchemaType::primitive(PrimitiveKind::String);
        let b = SchemaType::primitive(PrimitiveKind::Number);
        let union = SchemaType::union(vec![a.clone(), b.clone(), a.clone()]);

        match &union {
            SchemaType::Union { members } => {
                assert_eq!(members.len(), 2);
                // canonical-key order: "number" < "string"
                assert_eq!(members[0], b);
                assert_eq!(members[1], a);
            }
            other => panic!("Expected Union, got {:?}", other),
        }
    }

    #[test]
    fn test_union_collapses_single_member() {
        let t = SchemaType::union(vec![SchemaType::primitive(PrimitiveKind::Boolean)]);
        assert_eq!(t, SchemaType::primitive(PrimitiveKind::Boolean));
    }

    #[test]
    fn test_union_flattens_nested() {
        let inner = SchemaType::union(vec![
            SchemaType::primitive(PrimitiveKind::String),
            SchemaType::primitive(PrimitiveKind::Number),
        ]);
        let outer = SchemaType::union(vec![inner, SchemaType::primitive(PrimitiveKind::Boolean)]);
        match outer {
            SchemaType::Union { members } => assert_eq!(members.len(), 3),
            other => panic!("Expected Union, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_union_is_unknown() {
        assert_eq!(SchemaType::union(vec![]), SchemaType::unknown());
    }

    #[test]
    fn test_wrapper_flattening() {
        let t = SchemaType::optional(SchemaType::optional(SchemaType::primitive(
            PrimitiveKind::String,
        )));
        assert_eq!(t.canonical_key(), "optional<string>");

        let t = SchemaType::nullable(SchemaType::nullable(SchemaType::primitive(
            PrimitiveKind::Number,
        )));
        assert_eq!(t.canonical_key(), "nullable<number>");
    }

    #[test]
    fn test_decompose() {
        let t = SchemaType::optional(SchemaType::nullable(SchemaType::primitive(
            PrimitiveKind::String,
        )));
        let (base, optional, nullable) = t.decompose();
        assert_eq!(base, &SchemaType::primitive(PrimitiveKind::String));
        assert!(optional);
        assert!(nullable);
    }

    #[test]
    fn test_object_required_derivation() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "id".to_string(),
            SchemaType::primitive(PrimitiveKind::Number),
        );
        fields.insert(
            "nickname".to_string(),
            SchemaType::optional(SchemaType::primitive(PrimitiveKind::String)),
        );
        let obj = SchemaType::object(fields);

        match &obj {
            SchemaType::Object { required, .. } => {
                assert!(required.contains("id"));
                assert!(!required.contains("nickname"));
            }
            other => panic!("Expected Object, got {:?}", other),
        }
    }

    #[test]
    fn test_canonical_key_stability() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "name".to_string(),
            SchemaType::string_with_format(Some(crate::formats::ValueFormat::Email)),
        );
        let obj = SchemaType::object(fields);
        assert_eq!(obj.canonical_key(), "object{name:string<email>}");
    }

    #[test]
    fn test_serde_round_trip() {
        let t = SchemaType::array(SchemaType::union(vec![
            SchemaType::primitive(PrimitiveKind::String),
            SchemaType::primitive(PrimitiveKind::Number),
        ]));
        let json = serde_json::to_string(&t).unwrap();
        let back: SchemaType = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
