//! Transport collaborator contract
//!
//! Concrete protocol clients (HTTP, database, object store, file transfer)
//! live outside the core; the session drives them through this trait. A
//! transport receives the resolved request and the prior pagination state,
//! executes one call, and returns the page it fetched plus any continuation
//! token it extracted.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::projector::RawRecord;
use crate::session::state::ConnectionState;

/// Error surface of a transport call
///
/// The two variants map to the session's two recovery policies: retriable
/// authentication failures are retried with backoff up to the configured
/// bound; everything else is fatal for the work unit.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("authentication rejected (retriable): {0}")]
    RetriableAuth(String),

    #[error("transport failure: {0}")]
    Fatal(#[from] anyhow::Error),
}

impl TransportError {
    pub fn fatal(message: impl Into<String>) -> Self {
        TransportError::Fatal(anyhow::anyhow!(message.into()))
    }
}

/// One fetched page
#[derive(Debug, Clone, Default)]
pub struct PageStatus {
    /// Records carried by this page, already decoded into raw record shapes
    pub records: Vec<RawRecord>,

    /// Continuation token extracted from the page, if pagination continues
    pub cursor: Option<String>,

    /// Raw response payload, kept on the connection state for diagnostics
    /// and cursor re-extraction
    pub raw: Option<Value>,
}

impl PageStatus {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            cursor: None,
            raw: None,
        }
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

/// Protocol client driven by the session
///
/// `execute_first` and `execute_next` return `Ok(None)` when the source has
/// no further page; what counts as terminal (empty body, missing cursor,
/// explicit end marker) is the transport's own contract.
#[async_trait]
pub trait Transport: Send {
    /// Execute the first call of an extraction
    async fn execute_first(
        &mut self,
        state: &ConnectionState,
    ) -> Result<Option<PageStatus>, TransportError>;

    /// Execute a follow-up call with the prior status available on `state`
    async fn execute_next(
        &mut self,
        state: &ConnectionState,
    ) -> Result<Option<PageStatus>, TransportError>;

    /// Release pooled connections; returns whether anything was closed
    async fn close_all(&mut self, message: &str) -> bool;

    /// Close any open response stream; returns whether a stream was open
    async fn close_stream(&mut self) -> bool;
}
