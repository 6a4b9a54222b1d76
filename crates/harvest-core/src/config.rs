//! Extraction job configuration
//!
//! Validated options consumed by the core: pacing, retry policy, batching,
//! output format, the declared schema, and an opaque options block handed to
//! the selected transport.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::schema::{IntermediateSchema, SchemaColumn};

/// Declared shape of the extraction's output records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Arbitrary nested JSON objects
    #[default]
    Json,
    /// Positional rows of string cells
    Tabular,
    /// Fixed-schema structured records
    Typed,
}

/// Configuration for one extraction job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Registry identifier of the transport to use (e.g. "http")
    pub transport: String,

    /// Request template with `{{name}}` placeholders
    pub request_template: String,

    /// Initial dynamic parameters; pagination state is folded in as the
    /// extraction progresses
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// Inter-call pacing delay in milliseconds (default: 0, no pacing)
    #[serde(default)]
    pub call_interval_ms: u64,

    /// Maximum transport attempts per logical call when authentication is
    /// retriable (default: 3)
    #[serde(default = "default_auth_retry_limit")]
    pub auth_retry_limit: u32,

    /// Backoff between authentication retries in milliseconds (default: 1000)
    #[serde(default = "default_auth_retry_backoff_ms")]
    pub auth_retry_backoff_ms: u64,

    /// Records per emitted output batch (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Output record shape; selects the projector variant
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Declared schema, in the intermediate-schema wire shape
    pub schema: Vec<SchemaColumn>,

    /// Explicit tabular column projection (tabular output only)
    #[serde(default)]
    pub column_projection: Option<Vec<usize>>,

    /// Whether the first tabular row is a header to infer the projection from
    #[serde(default)]
    pub header_row: bool,

    /// Error on unresolved template placeholders instead of leaving them
    /// verbatim
    #[serde(default)]
    pub strict_templates: bool,

    /// Opaque options for the transport implementation
    #[serde(default)]
    pub transport_options: serde_json::Value,
}

fn default_auth_retry_limit() -> u32 {
    3
}

fn default_auth_retry_backoff_ms() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    100
}

impl ExtractionConfig {
    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.transport.is_empty() {
            anyhow::bail!("transport identifier cannot be empty");
        }
        if self.request_template.is_empty() {
            anyhow::bail!("request_template cannot be empty");
        }
        if self.schema.is_empty() {
            anyhow::bail!("schema must declare at least one column");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be greater than 0");
        }
        if self.auth_retry_limit == 0 {
            anyhow::bail!("auth_retry_limit must allow at least one attempt");
        }
        if self.auth_retry_limit > 1 && self.auth_retry_backoff_ms == 0 {
            anyhow::bail!("auth_retry_backoff_ms must be nonzero when retries are enabled");
        }
        if self.column_projection.is_some() && self.output_format != OutputFormat::Tabular {
            anyhow::bail!("column_projection only applies to tabular output");
        }
        Ok(())
    }

    /// The declared schema as an immutable projection target
    pub fn intermediate_schema(&self) -> IntermediateSchema {
        IntermediateSchema::new(self.schema.clone())
    }

    /// Inter-call pacing delay as a Duration
    pub fn call_interval(&self) -> Duration {
        Duration::from_millis(self.call_interval_ms)
    }

    /// Authentication retry backoff as a Duration
    pub fn auth_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.auth_retry_backoff_ms)
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            transport: "http".to_string(),
            request_template: String::new(),
            parameters: BTreeMap::new(),
            call_interval_ms: 0,
            auth_retry_limit: default_auth_retry_limit(),
            auth_retry_backoff_ms: default_auth_retry_backoff_ms(),
            batch_size: default_batch_size(),
            output_format: OutputFormat::Json,
            schema: Vec::new(),
            column_projection: None,
            header_row: false,
            strict_templates: false,
            transport_options: serde_json::Value::Null,
        }
    }
}
