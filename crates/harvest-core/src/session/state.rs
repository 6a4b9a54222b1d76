//! Per-work-unit connection state
//!
//! Owned exclusively by one session; never shared between sessions. Created
//! at extraction start, mutated after every call, discarded when the
//! extraction reaches a terminal state.

use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::transport::PageStatus;

/// Dynamic parameter carrying the 1-based page number of the upcoming call
pub const PARAM_PAGE: &str = "page";

/// Dynamic parameter carrying the continuation token of the last page
pub const PARAM_CURSOR: &str = "cursor";

/// Rolling state of one logical extraction
#[derive(Debug, Clone)]
pub struct ConnectionState {
    params: BTreeMap<String, String>,
    call_count: u64,
    signature: String,
    cursor: Option<String>,
    last_raw: Option<Value>,
    resolved_request: Option<String>,
}

impl ConnectionState {
    /// `prefix` identifies the transport for log correlation; the initial
    /// parameter set comes from the job configuration.
    pub fn new(prefix: &str, initial_params: BTreeMap<String, String>) -> Self {
        let mut token = Uuid::new_v4().simple().to_string();
        token.truncate(8);

        let mut params = initial_params;
        params.insert(PARAM_PAGE.to_string(), "1".to_string());

        Self {
            params,
            call_count: 0,
            signature: format!("{}-{}", prefix, token),
            cursor: None,
            last_raw: None,
            resolved_request: None,
        }
    }

    /// Work-unit signature for logging and correlation
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Current dynamic parameter set
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    /// Completed calls so far
    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    /// Continuation token extracted from the last page
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Raw payload of the last page
    pub fn last_raw(&self) -> Option<&Value> {
        self.last_raw.as_ref()
    }

    /// Request string resolved for the in-flight call
    pub fn resolved_request(&self) -> Option<&str> {
        self.resolved_request.as_deref()
    }

    pub fn set_resolved_request(&mut self, request: String) {
        self.resolved_request = Some(request);
    }

    /// Fold a completed page back into the dynamic parameter set: the page
    /// counter advances and the cursor becomes visible to the next template
    /// resolution.
    pub fn record_page(&mut self, status: &PageStatus) {
        self.call_count += 1;
        self.params
            .insert(PARAM_PAGE.to_string(), (self.call_count + 1).to_string());

        self.cursor = status.cursor.clone();
        match &status.cursor {
            Some(cursor) => {
                self.params.insert(PARAM_CURSOR.to_string(), cursor.clone());
            }
            None => {
                self.params.remove(PARAM_CURSOR);
            }
        }

        self.last_raw = status.raw.clone();
    }
}
