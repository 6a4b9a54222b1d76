//! Extraction runner
//!
//! Loads a job configuration, builds the transport out of the registry, and
//! drives the session page by page, projecting and batching records into
//! JSON-lines output.

use anyhow::Context;
use harvest_core::batch::PageBatcher;
use harvest_core::config::ExtractionConfig;
use harvest_core::projector::{RawRecord, RecordProjector};
use harvest_core::registry::TransportRegistry;
use harvest_core::schema::IntermediateSchema;
use harvest_core::session::ConnectionSession;
use harvest_core::transport::Transport;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::http::HttpTransport;

/// Registry holding every transport this binary ships
pub fn default_registry() -> TransportRegistry {
    let mut registry = TransportRegistry::new();
    registry.register("http", |config| {
        let transport = HttpTransport::from_config(config)
            .map_err(|e| harvest_common::HarvestError::Config(e.to_string()))?;
        Ok(Box::new(transport) as Box<dyn Transport>)
    });
    registry
}

/// Load and validate a job configuration from a JSON file
pub fn load_config(path: &Path) -> anyhow::Result<ExtractionConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: ExtractionConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(config)
}

/// Counters reported after a run
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub pages: u64,
    pub records_fetched: u64,
    pub records_emitted: u64,
    pub batches: u64,
}

/// Run one extraction to completion (or cancellation), writing projected
/// records as JSON lines to `output` or stdout.
pub async fn run(
    registry: &TransportRegistry,
    config: ExtractionConfig,
    output: Option<PathBuf>,
    cancel: CancellationToken,
) -> anyhow::Result<RunSummary> {
    let schema = config.intermediate_schema();
    let mut projector = RecordProjector::from_config(&config);
    let mut batcher: PageBatcher<RawRecord> = PageBatcher::new(config.batch_size);

    let mut sink: Box<dyn Write> = match &output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output file: {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(std::io::stdout().lock()),
    };

    let transport = registry.build(&config)?;
    let mut session = ConnectionSession::open(config, transport, cancel);

    let mut summary = RunSummary::default();
    let mut page = session.first().await?;
    while let Some(status) = page {
        summary.pages += 1;
        summary.records_fetched += status.records.len() as u64;
        let drained = drain_page(
            &mut projector,
            &schema,
            &status.records,
            &mut batcher,
            &mut sink,
            &mut summary,
        );
        if let Err(e) = drained {
            // The transport is released even when the failure is ours, not
            // the session's.
            session.close("record processing failed").await;
            return Err(e);
        }
        page = session.next().await?;
    }
    if let Some(batch) = batcher.flush() {
        write_batch(&mut sink, &batch, &mut summary)?;
    }
    sink.flush().context("failed to flush output")?;

    if summary.records_fetched > summary.records_emitted {
        warn!(
            dropped = summary.records_fetched - summary.records_emitted,
            "some records were withheld by the projector"
        );
    }
    info!(
        signature = %session.signature(),
        pages = summary.pages,
        records = summary.records_emitted,
        batches = summary.batches,
        "extraction finished"
    );
    Ok(summary)
}

fn drain_page(
    projector: &mut RecordProjector,
    schema: &IntermediateSchema,
    records: &[RawRecord],
    batcher: &mut PageBatcher<RawRecord>,
    sink: &mut Box<dyn Write>,
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    for record in records {
        if let Some(projected) = projector.project(schema, record)? {
            if let Some(batch) = batcher.accumulate(projected) {
                write_batch(sink, &batch, summary)?;
            }
        }
    }
    Ok(())
}

fn write_batch(
    sink: &mut Box<dyn Write>,
    batch: &[RawRecord],
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    for record in batch {
        let line = serde_json::to_string(record).context("failed to encode record")?;
        writeln!(sink, "{line}").context("failed to write record")?;
    }
    summary.batches += 1;
    summary.records_emitted += batch.len() as u64;
    Ok(())
}

/// Print the declared schema of a job configuration
pub fn describe_schema(config: &ExtractionConfig) -> anyhow::Result<String> {
    let schema: IntermediateSchema = config.intermediate_schema();
    let mut out = String::new();
    for column in schema.columns() {
        out.push_str(&format!(
            "{}  nullable={}  {}\n",
            column.column_name,
            column.is_nullable,
            serde_json::to_string(&column.data_type)?
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::schema::SchemaColumn;

    #[test]
    fn test_default_registry_knows_http() {
        let registry = default_registry();
        assert!(registry.contains("http"));
        assert_eq!(registry.identifiers(), vec!["http"]);
    }

    #[test]
    fn test_load_config_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "transport": "http",
                "request_template": "https://x/items?page={{{{page}}}}",
                "schema": [{{"columnName": "id", "dataType": {{"type": "string"}}}}]
            }}"#
        )
        .unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.transport, "http");
    }

    #[test]
    fn test_load_config_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"transport": "", "request_template": "x", "schema": []}}"#).unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_describe_schema_lists_columns() {
        let config = ExtractionConfig {
            schema: vec![
                SchemaColumn::primitive("id", "string"),
                SchemaColumn::primitive("count", "int"),
            ],
            ..Default::default()
        };
        let text = describe_schema(&config).unwrap();
        assert!(text.contains("id"));
        assert!(text.contains("count"));
    }
}
