//! Object-shaped record projection
//!
//! Recursively filters a JSON object against the intermediate schema. Fields
//! the schema does not declare are dropped; schema columns absent from the
//! input are simply absent from the output. This variant never pads with
//! null: presence is preserved, absence is preserved.

use harvest_common::{HarvestError, Result};
use serde_json::{Map, Value};

use crate::schema::{DataType, IntermediateSchema, SchemaColumn};

/// Projector for arbitrary nested JSON objects
#[derive(Debug, Default)]
pub struct ObjectProjector;

impl ObjectProjector {
    /// Project `record` against `schema`, producing a new object.
    ///
    /// Idempotent: projecting an already-projected record returns an equal
    /// object.
    pub fn project(&self, schema: &IntermediateSchema, record: &Value) -> Result<Value> {
        let Some(object) = record.as_object() else {
            return Err(HarvestError::UnsupportedShape(format!(
                "object projection expects a JSON object, got {}",
                json_kind(record)
            )));
        };
        project_columns(schema.columns(), object).map(Value::Object)
    }
}

fn project_columns(columns: &[SchemaColumn], object: &Map<String, Value>) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for column in columns {
        // Exact-name match; absent columns stay absent.
        if let Some(value) = object.get(&column.column_name) {
            out.insert(
                column.column_name.clone(),
                project_value(&column.data_type, value)?,
            );
        }
    }
    Ok(out)
}

fn project_value(data_type: &DataType, value: &Value) -> Result<Value> {
    match data_type {
        DataType::Primitive(_) => Ok(value.clone()),
        DataType::Record(columns) => match value.as_object() {
            Some(object) => project_columns(columns, object).map(Value::Object),
            // Non-object data under a record column is copied verbatim rather
            // than invented; the declared schema wins on the next level down.
            None => Ok(value.clone()),
        },
        DataType::Array(item) => match value.as_array() {
            Some(elements) => Ok(Value::Array(
                elements
                    .iter()
                    .map(|element| project_value(item, element))
                    .collect::<Result<Vec<_>>>()?,
            )),
            None => Ok(value.clone()),
        },
        DataType::Map(value_type) => match value.as_object() {
            Some(entries) => {
                // Every map key is preserved; only the values are filtered.
                let mut out = Map::new();
                for (key, entry) in entries {
                    out.insert(key.clone(), project_value(value_type, entry)?);
                }
                Ok(Value::Object(out))
            }
            None => Ok(value.clone()),
        },
        DataType::Union(_) => Err(HarvestError::UnsupportedShape(
            "union-typed columns are not supported by the object projector".to_string(),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaColumn;
    use serde_json::json;

    fn nested_schema() -> IntermediateSchema {
        IntermediateSchema::new(vec![
            SchemaColumn::primitive("id", "string"),
            SchemaColumn::new(
                "owner",
                DataType::Record(vec![SchemaColumn::primitive("name", "string")]),
            ),
            SchemaColumn::new(
                "tags",
                DataType::Array(Box::new(DataType::Primitive("string".into()))),
            ),
            SchemaColumn::new(
                "attributes",
                DataType::Map(Box::new(DataType::Record(vec![SchemaColumn::primitive(
                    "value", "string",
                )]))),
            ),
        ])
    }

    #[test]
    fn test_drops_undeclared_fields() {
        let schema = IntermediateSchema::new(vec![SchemaColumn::primitive("id", "string")]);
        let projector = ObjectProjector;
        let out = projector
            .project(&schema, &json!({"id": "1", "noise": true}))
            .unwrap();
        assert_eq!(out, json!({"id": "1"}));
    }

    #[test]
    fn test_absent_column_stays_absent() {
        let schema = IntermediateSchema::new(vec![
            SchemaColumn::primitive("id", "string"),
            SchemaColumn::primitive("email", "string"),
        ]);
        let projector = ObjectProjector;
        let out = projector.project(&schema, &json!({"id": "1"})).unwrap();
        // No present-with-null padding in the object variant.
        assert_eq!(out, json!({"id": "1"}));
        assert!(out.get("email").is_none());
    }

    #[test]
    fn test_nested_record_array_and_map() {
        let projector = ObjectProjector;
        let record = json!({
            "id": "1",
            "owner": {"name": "ada", "secret": "x"},
            "tags": ["a", "b"],
            "attributes": {
                "k1": {"value": "v1", "extra": 9},
                "k2": {"value": "v2"}
            }
        });
        let out = projector.project(&nested_schema(), &record).unwrap();
        assert_eq!(
            out,
            json!({
                "id": "1",
                "owner": {"name": "ada"},
                "tags": ["a", "b"],
                "attributes": {"k1": {"value": "v1"}, "k2": {"value": "v2"}}
            })
        );
    }

    #[test]
    fn test_projection_is_idempotent() {
        let projector = ObjectProjector;
        let record = json!({
            "id": "1",
            "owner": {"name": "ada", "secret": "x"},
            "tags": ["a"],
            "attributes": {"k": {"value": "v", "junk": 1}},
            "undeclared": []
        });
        let once = projector.project(&nested_schema(), &record).unwrap();
        let twice = projector.project(&nested_schema(), &once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_union_column_is_unsupported() {
        let schema = IntermediateSchema::new(vec![SchemaColumn::new(
            "mixed",
            DataType::Union(vec![DataType::Primitive("string".into())]),
        )]);
        let projector = ObjectProjector;
        let err = projector
            .project(&schema, &json!({"mixed": "x"}))
            .unwrap_err();
        assert!(matches!(err, HarvestError::UnsupportedShape(_)));
    }

    #[test]
    fn test_non_object_input_is_unsupported() {
        let schema = IntermediateSchema::new(vec![SchemaColumn::primitive("id", "string")]);
        let projector = ObjectProjector;
        assert!(projector.project(&schema, &json!([1, 2])).is_err());
    }
}
