//! HTTP transport
//!
//! Executes the session's resolved request as an HTTP GET and decodes the
//! JSON response into records and a continuation cursor. Where records and
//! cursor live in the payload is configured with JSON pointers in the job's
//! transport options.

use async_trait::async_trait;
use harvest_core::config::ExtractionConfig;
use harvest_core::projector::RawRecord;
use harvest_core::session::state::ConnectionState;
use harvest_core::transport::{PageStatus, Transport, TransportError};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_records_pointer() -> String {
    "/results".to_string()
}

/// Authentication attached to every request
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum HttpAuth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// Options decoded from the job's `transport_options` block
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    /// JSON pointer to the array of records in the response body
    pub records_pointer: String,

    /// JSON pointer to the continuation cursor; absent means the source
    /// paginates purely through template parameters
    pub cursor_pointer: Option<String>,

    /// Extra headers attached to every request
    pub headers: BTreeMap<String, String>,

    pub auth: Option<HttpAuth>,

    pub timeout_secs: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            records_pointer: default_records_pointer(),
            cursor_pointer: None,
            headers: BTreeMap::new(),
            auth: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpOptions {
    /// Decode options from the job configuration; a null block means all
    /// defaults.
    pub fn from_config(config: &ExtractionConfig) -> anyhow::Result<Self> {
        if config.transport_options.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(config.transport_options.clone())
            .map_err(|e| anyhow::anyhow!("invalid http transport options: {e}"))
    }
}

/// JSON-over-HTTP paging transport
pub struct HttpTransport {
    client: Client,
    options: HttpOptions,
    open: bool,
}

impl HttpTransport {
    pub fn from_config(config: &ExtractionConfig) -> anyhow::Result<Self> {
        let options = HttpOptions::from_config(config)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            options,
            open: true,
        })
    }

    async fn fetch(
        &self,
        state: &ConnectionState,
    ) -> Result<Option<PageStatus>, TransportError> {
        let url = state
            .resolved_request()
            .ok_or_else(|| TransportError::fatal("no resolved request on the connection state"))?;

        let mut request = self.client.get(url);
        for (name, value) in &self.options.headers {
            request = request.header(name, value);
        }
        match &self.options.auth {
            Some(HttpAuth::Basic { username, password }) => {
                request = request.basic_auth(username, Some(password));
            }
            Some(HttpAuth::Bearer { token }) => {
                request = request.bearer_auth(token);
            }
            None => {}
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Fatal(e.into()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::RetriableAuth(format!(
                "server returned {status} for {url}"
            )));
        }
        if !status.is_success() {
            return Err(TransportError::fatal(format!(
                "server returned {status} for {url}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::Fatal(e.into()))?;

        let records = match body.pointer(&self.options.records_pointer) {
            Some(serde_json::Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|item| RawRecord::from_json(item.clone()))
                .collect::<Vec<_>>(),
            // An absent or empty record array is the end of the source.
            Some(serde_json::Value::Array(_)) | None => {
                debug!(url, "response carries no records");
                return Ok(None);
            }
            Some(other) => {
                return Err(TransportError::fatal(format!(
                    "expected an array at {}, found {}",
                    self.options.records_pointer,
                    match other {
                        serde_json::Value::Object(_) => "an object",
                        serde_json::Value::String(_) => "a string",
                        serde_json::Value::Number(_) => "a number",
                        serde_json::Value::Bool(_) => "a boolean",
                        _ => "null",
                    }
                )));
            }
        };

        let cursor = self
            .options
            .cursor_pointer
            .as_deref()
            .and_then(|pointer| body.pointer(pointer))
            .and_then(|value| value.as_str())
            .map(str::to_string);

        debug!(url, records = records.len(), cursor = ?cursor, "fetched http page");

        let mut page = PageStatus::new(records).with_raw(body);
        if let Some(cursor) = cursor {
            page = page.with_cursor(cursor);
        }
        Ok(Some(page))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute_first(
        &mut self,
        state: &ConnectionState,
    ) -> Result<Option<PageStatus>, TransportError> {
        self.fetch(state).await
    }

    async fn execute_next(
        &mut self,
        state: &ConnectionState,
    ) -> Result<Option<PageStatus>, TransportError> {
        self.fetch(state).await
    }

    async fn close_all(&mut self, _message: &str) -> bool {
        // reqwest pools connections internally; dropping the client on
        // session teardown is the release.
        std::mem::replace(&mut self.open, false)
    }

    async fn close_stream(&mut self) -> bool {
        false
    }
}
