//! Schema inference engine
//!
//! Converts a sequence of sampled records into a [`SchemaType`]. Sibling
//! objects are merged field-by-field with occurrence and null counting;
//! everything else unifies into deduplicated unions.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::formats::detect_format;
use crate::sampling::{rng_for_seed, select_indices, SampleStrategy};
use crate::schema::{PrimitiveKind, SchemaType};

/// Nullability policy applied during object inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InferenceMode {
    /// Any observed null wraps the field in `Nullable`
    Strict,
    /// Null presence alone never produces `Nullable`
    Loose,
    /// `Nullable` when the null ratio exceeds [`AUTO_NULL_RATIO`]
    #[default]
    Auto,
}

/// Null ratio above which `auto` mode marks a field nullable.
/// The boundary is strict: exactly 5% stays non-nullable.
pub const AUTO_NULL_RATIO: f64 = 0.05;

/// Configuration for schema inference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct InferenceConfig {
    /// Nullability policy
    pub mode: InferenceMode,
    /// Maximum number of records to sample per document
    pub sample_size: usize,
    /// Record selection strategy
    pub sample_strategy: SampleStrategy,
    /// Nesting depth beyond which values degrade to `unknown`
    pub max_depth: usize,
    /// Maximum number of array elements sampled per array value
    pub max_array_sample: usize,
    /// RNG seed for `random`/`stratified`; system entropy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            mode: InferenceMode::Auto,
            sample_size: 1000,
            sample_strategy: SampleStrategy::First,
            max_depth: 10,
            max_array_sample: 100,
            seed: None,
        }
    }
}

impl InferenceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InferenceConfigBuilder {
        InferenceConfigBuilder::default()
    }
}

/// Builder for [`InferenceConfig`]
#[derive(Debug, Default)]
pub struct InferenceConfigBuilder {
    config: InferenceConfig,
}

impl InferenceConfigBuilder {
    pub fn mode(mut self, mode: InferenceMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn sample_size(mut self, size: usize) -> Self {
        self.config.sample_size = size;
        self
    }

    pub fn sample_strategy(mut self, strategy: SampleStrategy) -> Self {
        self.config.sample_strategy = strategy;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn max_array_sample(mut self, max: usize) -> Self {
        self.config.max_array_sample = max;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> InferenceConfig {
        self.config
    }
}

/// Schema inference engine
pub struct SchemaInferrer {
    config: InferenceConfig,
}

impl SchemaInferrer {
    pub fn new() -> Self {
        Self::with_config(InferenceConfig::default())
    }

    pub fn with_config(config: InferenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Infer a schema from a sequence of sampled records.
    ///
    /// An empty sequence infers `unknown`. Given a fixed seed the result is
    /// structurally identical across calls.
    pub fn infer(&self, samples: &[Value]) -> SchemaType {
        let mut rng = rng_for_seed(self.config.seed);
        let indices = select_indices(
            self.config.sample_strategy,
            samples.len(),
            self.config.sample_size,
            &mut rng,
        );
        let selected: Vec<&Value> = indices.iter().map(|i| &samples[*i]).collect();
        if selected.is_empty() {
            return SchemaType::unknown();
        }
        self.unify(&selected, 0, &mut rng)
    }

    /// Unify a set of sibling values into a single type.
    ///
    /// All object values in the set merge into one object schema; null
    /// contributes a `null` member; every other value contributes its own
    /// inferred type. Distinct results become a `Union`.
    fn unify(&self, values: &[&Value], depth: usize, rng: &mut StdRng) -> SchemaType {
        if depth > self.config.max_depth {
            return SchemaType::unknown();
        }

        let mut members = Vec::new();
        let mut objects: Vec<&serde_json::Map<String, Value>> = Vec::new();
        let mut saw_null = false;

        for &value in values {
            match value {
                Value::Object(map) => objects.push(map),
                Value::Null => saw_null = true,
                other => members.push(self.infer_value(other, depth, rng)),
            }
        }

        if !objects.is_empty() {
            members.push(self.infer_object(&objects, depth, rng));
        }
        if saw_null {
            members.push(SchemaType::primitive(PrimitiveKind::Null));
        }

        SchemaType::union(members)
    }

    /// Merge a sampled set of sibling objects into an object schema.
    fn infer_object(
        &self,
        objects: &[&serde_json::Map<String, Value>],
        depth: usize,
        rng: &mut StdRng,
    ) -> SchemaType {
        let sample_count = objects.len();

        let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
        let mut null_counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut present_values: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();

        for object in objects {
            for (name, value) in object.iter() {
                *occurrences.entry(name).or_insert(0) += 1;
                if value.is_null() {
                    *null_counts.entry(name).or_insert(0) += 1;
                } else {
                    present_values.entry(name).or_default().push(value);
                }
            }
        }

        let mut fields = BTreeMap::new();
        for (name, occurrence) in &occurrences {
            let non_null = present_values.get(name).map(Vec::as_slice).unwrap_or(&[]);
            let mut field_type = if non_null.is_empty() {
                SchemaType::unknown()
            } else {
                self.unify(non_null, depth + 1, rng)
            };

            let null_count = null_counts.get(name).copied().unwrap_or(0);
            if self.is_nullable(null_count, sample_count) {
                field_type = SchemaType::nullable(field_type);
            }
            if *occurrence < sample_count {
                field_type = SchemaType::optional(field_type);
            }

            fields.insert(name.to_string(), field_type);
        }

        SchemaType::object(fields)
    }

    fn is_nullable(&self, null_count: usize, sample_count: usize) -> bool {
        if null_count == 0 || sample_count == 0 {
            return false;
        }
        match self.config.mode {
            InferenceMode::Strict => true,
            InferenceMode::Loose => false,
            InferenceMode::Auto => null_count as f64 / sample_count as f64 > AUTO_NULL_RATIO,
        }
    }

    /// Infer the type of a single non-object value.
    fn infer_value(&self, value: &Value, depth: usize, rng: &mut StdRng) -> SchemaType {
        if depth > self.config.max_depth {
            return SchemaType::unknown();
        }

        match value {
            Value::Null => SchemaType::primitive(PrimitiveKind::Null),
            Value::Bool(_) => SchemaType::primitive(PrimitiveKind::Boolean),
            Value::Number(_) => SchemaType::primitive(PrimitiveKind::Number),
            Value::String(s) => SchemaType::string_with_format(detect_format(s)),
            Value::Array(elements) => {
                if elements.is_empty() {
                    return SchemaType::array(SchemaType::unknown());
                }
                let indices = select_indices(
                    self.config.sample_strategy,
                    elements.len(),
                    self.config.max_array_sample,
                    rng,
                );
                let sampled: Vec<&Value> = indices.iter().map(|i| &elements[*i]).collect();
                SchemaType::array(self.unify(&sampled, depth + 1, rng))
            }
            Value::Object(map) => self.infer_object(&[map], depth, rng),
        }
    }
}

impl Default for SchemaInferrer {
    fn default() -> Self {
        Self::new()
    }
}
