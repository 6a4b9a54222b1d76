//! Typed-structured record projection
//!
//! Builds a brand-new record conforming exactly to the target schema's field
//! list. Each target field is copied by name from the source when present,
//! otherwise set to explicit null. Unlike the object variant, this one DOES
//! pad missing fields: downstream consumers of typed records expect every
//! declared field to exist.

use harvest_common::{HarvestError, Result};
use serde_json::Value;

use super::TypedRecord;
use crate::schema::{DataType, IntermediateSchema};

/// Projector for fixed-schema structured records
#[derive(Debug, Default)]
pub struct TypedProjector;

impl TypedProjector {
    /// Project `record` onto exactly the target schema's field list.
    pub fn project(&self, schema: &IntermediateSchema, record: &TypedRecord) -> Result<TypedRecord> {
        let mut out = TypedRecord::new();
        for column in schema.columns() {
            if matches!(column.data_type, DataType::Union(_)) {
                return Err(HarvestError::UnsupportedShape(format!(
                    "union-typed column '{}' is not supported by the typed projector",
                    column.column_name
                )));
            }
            let value = record
                .get(&column.column_name)
                .cloned()
                .unwrap_or(Value::Null);
            out.set(column.column_name.clone(), value);
        }
        Ok(out)
    }
}
