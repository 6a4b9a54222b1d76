//! Intermediate schema model
//!
//! The canonical column/type model every extraction projects into. A schema
//! is an ordered list of named columns; column order is stable and defines
//! output field order. Names are stored case-sensitively but matched
//! case-insensitively during header-based inference.
//!
//! The declared wire shape is a JSON array of
//! `{"columnName", "isNullable", "dataType"}` entries, where `dataType` is
//! recursively one of:
//!
//! ```json
//! {"type": "string"}
//! {"type": "array", "items": {"type": "long"}}
//! {"type": "record", "values": [ ...columns... ]}
//! {"type": "map", "values": {"type": "string"}}
//! {"type": "union", "items": [ ...data types... ]}
//! ```
//!
//! Unions parse so a declared schema never fails to load, but the projectors
//! reject them as an unsupported shape.

use harvest_common::{HarvestError, Result};
use serde::{Deserialize, Serialize};

/// One declared output column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Column name, case-sensitive as stored
    #[serde(rename = "columnName")]
    pub column_name: String,

    /// Whether null is an acceptable value for this column
    #[serde(rename = "isNullable", default = "default_nullable")]
    pub is_nullable: bool,

    /// Declared type of the column
    #[serde(rename = "dataType")]
    pub data_type: DataType,
}

fn default_nullable() -> bool {
    true
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            column_name: name.into(),
            is_nullable: true,
            data_type,
        }
    }

    /// Convenience constructor for primitive columns
    pub fn primitive(name: impl Into<String>, primitive: impl Into<String>) -> Self {
        Self::new(name, DataType::Primitive(primitive.into()))
    }
}

/// Declared data type of a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DataTypeWire", into = "DataTypeWire")]
pub enum DataType {
    /// A scalar type, named as declared ("string", "long", "boolean", ...)
    Primitive(String),
    /// Homogeneous list with a single item type
    Array(Box<DataType>),
    /// Nested structure with its own ordered column list
    Record(Vec<SchemaColumn>),
    /// String-keyed mapping with a single value type
    Map(Box<DataType>),
    /// Declared union of alternatives; representable but not projectable
    Union(Vec<DataType>),
}

impl DataType {
    /// Human-readable tag for diagnostics
    pub fn kind(&self) -> &str {
        match self {
            DataType::Primitive(name) => name,
            DataType::Array(_) => "array",
            DataType::Record(_) => "record",
            DataType::Map(_) => "map",
            DataType::Union(_) => "union",
        }
    }
}

/// Serde mirror of the declared JSON shape
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DataTypeWire {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<ItemsWire>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<ValuesWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ItemsWire {
    One(Box<DataTypeWire>),
    Many(Vec<DataTypeWire>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ValuesWire {
    Columns(Vec<SchemaColumn>),
    Single(Box<DataTypeWire>),
}

impl TryFrom<DataTypeWire> for DataType {
    type Error = String;

    fn try_from(wire: DataTypeWire) -> std::result::Result<Self, Self::Error> {
        match wire.kind.as_str() {
            "array" => match wire.items {
                Some(ItemsWire::One(item)) => {
                    Ok(DataType::Array(Box::new(DataType::try_from(*item)?)))
                }
                Some(ItemsWire::Many(_)) => {
                    Err("array 'items' must be a single data type".to_string())
                }
                None => Err("array type is missing 'items'".to_string()),
            },
            "record" => match wire.values {
                Some(ValuesWire::Columns(columns)) => Ok(DataType::Record(columns)),
                Some(ValuesWire::Single(_)) => {
                    Err("record 'values' must be a column list".to_string())
                }
                None => Err("record type is missing 'values'".to_string()),
            },
            "map" => match wire.values {
                Some(ValuesWire::Single(value)) => {
                    Ok(DataType::Map(Box::new(DataType::try_from(*value)?)))
                }
                Some(ValuesWire::Columns(_)) => {
                    Err("map 'values' must be a single data type".to_string())
                }
                None => Err("map type is missing 'values'".to_string()),
            },
            "union" => match wire.items {
                Some(ItemsWire::Many(alternatives)) => Ok(DataType::Union(
                    alternatives
                        .into_iter()
                        .map(DataType::try_from)
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                )),
                Some(ItemsWire::One(alternative)) => {
                    Ok(DataType::Union(vec![DataType::try_from(*alternative)?]))
                }
                None => Err("union type is missing 'items'".to_string()),
            },
            _ => Ok(DataType::Primitive(wire.kind)),
        }
    }
}

impl From<DataType> for DataTypeWire {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::Primitive(name) => DataTypeWire {
                kind: name,
                items: None,
                values: None,
            },
            DataType::Array(item) => DataTypeWire {
                kind: "array".to_string(),
                items: Some(ItemsWire::One(Box::new((*item).into()))),
                values: None,
            },
            DataType::Record(columns) => DataTypeWire {
                kind: "record".to_string(),
                items: None,
                values: Some(ValuesWire::Columns(columns)),
            },
            DataType::Map(value) => DataTypeWire {
                kind: "map".to_string(),
                items: None,
                values: Some(ValuesWire::Single(Box::new((*value).into()))),
            },
            DataType::Union(alternatives) => DataTypeWire {
                kind: "union".to_string(),
                items: Some(ItemsWire::Many(
                    alternatives.into_iter().map(Into::into).collect(),
                )),
                values: None,
            },
        }
    }
}

/// Ordered, immutable projection target for one extraction
///
/// Built once per extraction from the declared schema definition and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntermediateSchema {
    columns: Vec<SchemaColumn>,
}

impl IntermediateSchema {
    pub fn new(columns: Vec<SchemaColumn>) -> Self {
        Self { columns }
    }

    /// Parse a schema from its declared JSON definition
    pub fn parse(definition: &str) -> Result<Self> {
        let columns: Vec<SchemaColumn> = serde_json::from_str(definition)
            .map_err(|e| HarvestError::Schema(format!("invalid schema definition: {}", e)))?;
        Ok(Self { columns })
    }

    /// Columns in declared order
    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    /// Exact-name column lookup
    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    /// Case-insensitive position lookup, used during header inference
    pub fn position_ci(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.column_name.eq_ignore_ascii_case(name))
    }

    /// Column names in declared order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
