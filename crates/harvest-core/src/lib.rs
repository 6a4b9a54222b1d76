//! Harvest Core Library
//!
//! Protocol-agnostic multi-page extraction engine: the session control
//! loop, the intermediate schema, schema-driven record projection, request
//! template substitution, output batching, and the transport registry.
//!
//! # Overview
//!
//! A job configuration selects a transport out of the [`registry`], a
//! [`session::ConnectionSession`] drives it page by page, and each fetched
//! record passes through a [`projector::RecordProjector`] before a
//! [`batch::PageBatcher`] regroups the output stream.
//!
//! # Example
//!
//! ```no_run
//! use harvest_core::config::ExtractionConfig;
//! use harvest_core::registry::TransportRegistry;
//! use harvest_core::session::ConnectionSession;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn extract(registry: &TransportRegistry, config: ExtractionConfig) -> anyhow::Result<()> {
//!     config.validate()?;
//!     let transport = registry.build(&config)?;
//!     let mut session = ConnectionSession::open(config, transport, CancellationToken::new());
//!     let mut page = session.first().await?;
//!     while let Some(status) = page {
//!         // process status.records
//!         page = session.next().await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod projector;
pub mod registry;
pub mod schema;
pub mod session;
pub mod template;
pub mod transport;

pub use config::{ExtractionConfig, OutputFormat};
pub use projector::{RawRecord, RecordProjector};
pub use registry::TransportRegistry;
pub use schema::IntermediateSchema;
pub use session::{ConnectionSession, SessionPhase};
pub use transport::{PageStatus, Transport, TransportError};
