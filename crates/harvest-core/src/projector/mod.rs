//! Schema-driven record projection
//!
//! One `project` capability with three variant implementations, selected once
//! per extraction from the declared output format:
//!
//! - [`ObjectProjector`] for arbitrary nested JSON objects
//! - [`TabularProjector`] for positional rows of strings
//! - [`TypedProjector`] for fixed-schema structured records
//!
//! The variants deliberately disagree on missing fields: the object variant
//! preserves absence (a schema column missing from the input stays missing
//! from the output), while the typed variant pads every missing field with an
//! explicit null. That asymmetry is inherited per-format behavior and is part
//! of each variant's contract, not an accident to unify away.

pub mod object;
pub mod tabular;
pub mod typed;

pub use object::ObjectProjector;
pub use tabular::TabularProjector;
pub use typed::TypedProjector;

use harvest_common::{HarvestError, Result};
use serde::Serialize;
use serde_json::Value;

use crate::config::{ExtractionConfig, OutputFormat};
use crate::schema::IntermediateSchema;

/// A raw record in one of the shapes the engine understands
///
/// The projector never mutates its input; projection always produces a new
/// record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawRecord {
    /// Associative structure (JSON object, possibly nested)
    Object(Value),
    /// Positional row of string cells (delimited text and friends)
    Row(Vec<String>),
    /// Typed structured record with a fixed field list
    Typed(TypedRecord),
}

impl RawRecord {
    /// Classify an arbitrary JSON value into a record shape: arrays become
    /// positional rows (scalar cells keep their text, anything nested keeps
    /// its JSON encoding), everything else is an object record.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => RawRecord::Row(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            other => RawRecord::Object(other),
        }
    }

    /// Human-readable shape tag for diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            RawRecord::Object(_) => "object",
            RawRecord::Row(_) => "row",
            RawRecord::Typed(_) => "typed",
        }
    }
}

/// One named field of a [`TypedRecord`]
#[derive(Debug, Clone, PartialEq)]
pub struct TypedField {
    pub name: String,
    pub value: Value,
}

/// A structured record with an ordered, fixed field list
///
/// Unlike a JSON object, a typed record always carries every field its
/// schema declares; absent source data shows up as an explicit null.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedRecord {
    fields: Vec<TypedField>,
}

impl TypedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from (name, value) pairs, keeping their order
    pub fn from_pairs<N: Into<String>>(pairs: impl IntoIterator<Item = (N, Value)>) -> Self {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, value)| TypedField {
                    name: name.into(),
                    value,
                })
                .collect(),
        }
    }

    /// Append a field; replaces the value if the name already exists
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value,
            None => self.fields.push(TypedField { name, value }),
        }
    }

    /// Exact-name field lookup
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Field names in record order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn fields(&self) -> &[TypedField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for TypedRecord {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}

/// The per-extraction projection engine
///
/// Selected once from the declared output format and then driven for every
/// record of every page. Holds the tabular variant's resolved projection
/// cache, which is why projection takes `&mut self`.
#[derive(Debug)]
pub enum RecordProjector {
    Object(ObjectProjector),
    Tabular(TabularProjector),
    Typed(TypedProjector),
}

impl RecordProjector {
    pub fn object() -> Self {
        RecordProjector::Object(ObjectProjector)
    }

    pub fn tabular(explicit: Option<Vec<usize>>, header_row: bool) -> Self {
        RecordProjector::Tabular(TabularProjector::new(explicit, header_row))
    }

    pub fn typed() -> Self {
        RecordProjector::Typed(TypedProjector)
    }

    /// Select the variant declared by the job configuration
    pub fn from_config(config: &ExtractionConfig) -> Self {
        match config.output_format {
            OutputFormat::Json => Self::object(),
            OutputFormat::Tabular => {
                Self::tabular(config.column_projection.clone(), config.header_row)
            }
            OutputFormat::Typed => Self::typed(),
        }
    }

    /// Project one record against the schema.
    ///
    /// `Ok(None)` means the record produced no output (the tabular variant's
    /// empty-projection escape hatch and consumed header rows); it is not an
    /// error. A record whose shape does not match the selected variant is an
    /// unsupported-shape error.
    pub fn project(
        &mut self,
        schema: &IntermediateSchema,
        record: &RawRecord,
    ) -> Result<Option<RawRecord>> {
        match (self, record) {
            (RecordProjector::Object(p), RawRecord::Object(value)) => {
                p.project(schema, value).map(|v| Some(RawRecord::Object(v)))
            }
            (RecordProjector::Tabular(p), RawRecord::Row(row)) => {
                p.project(schema, row).map(|r| r.map(RawRecord::Row))
            }
            (RecordProjector::Typed(p), RawRecord::Typed(typed)) => p
                .project(schema, typed)
                .map(|r| Some(RawRecord::Typed(r))),
            (projector, record) => Err(HarvestError::UnsupportedShape(format!(
                "{} projector cannot process a {} record",
                projector.variant(),
                record.shape()
            ))),
        }
    }

    fn variant(&self) -> &'static str {
        match self {
            RecordProjector::Object(_) => "object",
            RecordProjector::Tabular(_) => "tabular",
            RecordProjector::Typed(_) => "typed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaColumn;
    use serde_json::json;

    #[test]
    fn test_shape_mismatch_is_unsupported() {
        let schema = IntermediateSchema::new(vec![SchemaColumn::primitive("id", "string")]);
        let mut projector = RecordProjector::object();
        let err = projector
            .project(&schema, &RawRecord::Row(vec!["1".into()]))
            .unwrap_err();
        assert!(matches!(err, HarvestError::UnsupportedShape(_)));
    }

    #[test]
    fn test_typed_record_serializes_in_field_order() {
        let record = TypedRecord::from_pairs([("b", json!(1)), ("a", json!(2))]);
        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(text, r#"{"b":1,"a":2}"#);
    }

    #[test]
    fn test_from_json_classifies_shapes() {
        assert_eq!(
            RawRecord::from_json(json!({"id": "a"})),
            RawRecord::Object(json!({"id": "a"}))
        );
        assert_eq!(
            RawRecord::from_json(json!(["AA", 7, null])),
            RawRecord::Row(vec!["AA".into(), "7".into(), "null".into()])
        );
    }

    #[test]
    fn test_typed_record_set_replaces() {
        let mut record = TypedRecord::new();
        record.set("id", json!("x"));
        record.set("id", json!("y"));
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("id"), Some(&json!("y")));
    }
}
