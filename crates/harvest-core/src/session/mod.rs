//! Extraction control loop
//!
//! A [`ConnectionSession`] owns one transport and one connection state and
//! drives a multi-page extraction through a small state machine:
//!
//! ```text
//! UNSTARTED → ACTIVE → (ACTIVE | EXHAUSTED | FAILED)
//! ```
//!
//! Each call resolves the request template against the current parameter
//! set, paces itself (follow-up calls only), executes the transport with a
//! bounded authentication retry loop, and folds the resulting page back
//! into the state. Reaching a terminal phase closes the transport exactly
//! once; an explicit [`ConnectionSession::close`] is idempotent.

pub mod state;

use harvest_common::{HarvestError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ExtractionConfig;
use crate::template::ParameterSubstitutor;
use crate::transport::{PageStatus, Transport, TransportError};
use state::ConnectionState;

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created but no call issued yet
    Unstarted,
    /// At least one page fetched, more may follow
    Active,
    /// The source reported no further page
    Exhausted,
    /// A fatal error or exhausted retry bound ended the extraction
    Failed,
    /// Closed before reaching a natural end (cancellation, explicit close)
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Unstarted => "unstarted",
            SessionPhase::Active => "active",
            SessionPhase::Exhausted => "exhausted",
            SessionPhase::Failed => "failed",
            SessionPhase::Closed => "closed",
        }
    }

    /// Whether the session can issue no further calls
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Exhausted | SessionPhase::Failed | SessionPhase::Closed
        )
    }
}

enum CallKind {
    First,
    Next,
}

/// Drives one extraction across a transport
pub struct ConnectionSession {
    config: ExtractionConfig,
    transport: Box<dyn Transport>,
    substitutor: ParameterSubstitutor,
    state: ConnectionState,
    phase: SessionPhase,
    cancel: CancellationToken,
    closed: bool,
}

impl ConnectionSession {
    /// Open a session over an already-constructed transport.
    ///
    /// The cancellation token is observed between calls and during pacing
    /// sleeps; it never interrupts an in-flight transport call.
    pub fn open(
        config: ExtractionConfig,
        transport: Box<dyn Transport>,
        cancel: CancellationToken,
    ) -> Self {
        let state = ConnectionState::new(&config.transport, config.parameters.clone());
        info!(
            signature = %state.signature(),
            transport = %config.transport,
            "opened extraction session"
        );
        Self {
            config,
            transport,
            substitutor: ParameterSubstitutor::new(),
            state,
            phase: SessionPhase::Unstarted,
            cancel,
            closed: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn signature(&self) -> &str {
        self.state.signature()
    }

    /// Whether the transport has been released
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Issue the first call of the extraction. Never paces.
    pub async fn first(&mut self) -> Result<Option<PageStatus>> {
        if self.phase != SessionPhase::Unstarted {
            return Err(HarvestError::Session(format!(
                "first call issued in {} phase",
                self.phase.as_str()
            )));
        }
        self.resolve_request();
        let page = self.call(CallKind::First).await?;
        self.finish_call(page).await
    }

    /// Issue a follow-up call. Paces by the configured interval first, and
    /// returns `Ok(None)` without calling the transport when cancellation
    /// was requested.
    pub async fn next(&mut self) -> Result<Option<PageStatus>> {
        if self.phase != SessionPhase::Active {
            return Err(HarvestError::Session(format!(
                "follow-up call issued in {} phase",
                self.phase.as_str()
            )));
        }
        if self.cancel.is_cancelled() {
            info!(
                signature = %self.signature(),
                pages = self.state.call_count(),
                "cancellation requested; stopping extraction"
            );
            self.close("cancelled").await;
            return Ok(None);
        }
        self.pace().await;
        self.resolve_request();
        let page = self.call(CallKind::Next).await?;
        self.finish_call(page).await
    }

    /// Release the transport. Safe to call in any phase, any number of
    /// times; only the first call reaches the transport.
    pub async fn close(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        if !self.phase.is_terminal() {
            self.phase = SessionPhase::Closed;
        }
        let stream_open = self.transport.close_stream().await;
        let released = self.transport.close_all(reason).await;
        info!(
            signature = %self.state.signature(),
            reason,
            stream_open,
            released,
            pages = self.state.call_count(),
            "closed extraction session"
        );
    }

    /// Resolve the request template against the current parameters. A
    /// substitution failure is logged and the raw template is used as the
    /// request; it never ends the extraction.
    fn resolve_request(&mut self) {
        match self.substitutor.resolve(
            &self.config.request_template,
            self.state.params(),
            self.config.strict_templates,
        ) {
            Ok(resolved) => {
                debug!(
                    signature = %self.state.signature(),
                    consumed = resolved.consumed.len(),
                    "resolved request template"
                );
                self.state.set_resolved_request(resolved.text);
            }
            Err(e) => {
                warn!(
                    signature = %self.state.signature(),
                    error = %e,
                    "template substitution failed; issuing the unsubstituted template"
                );
                self.state
                    .set_resolved_request(self.config.request_template.clone());
            }
        }
    }

    /// Sleep the configured inter-call interval. Cancellation cuts the
    /// sleep short but the call still proceeds; the cancellation itself is
    /// honored at the next call boundary.
    async fn pace(&self) {
        let interval = self.config.call_interval();
        if interval.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = self.cancel.cancelled() => {
                warn!(
                    signature = %self.state.signature(),
                    "pacing sleep interrupted; proceeding with the call"
                );
            }
        }
    }

    /// Execute one logical call with the bounded authentication retry
    /// loop. The bound counts total transport attempts: a limit of 2 means
    /// at most two attempts, never a third.
    async fn call(&mut self, kind: CallKind) -> Result<Option<PageStatus>> {
        let limit = self.config.auth_retry_limit.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = match kind {
                CallKind::First => self.transport.execute_first(&self.state).await,
                CallKind::Next => self.transport.execute_next(&self.state).await,
            };
            match result {
                Ok(page) => return Ok(page),
                Err(TransportError::RetriableAuth(reason)) if attempt < limit => {
                    warn!(
                        signature = %self.state.signature(),
                        attempt,
                        limit,
                        %reason,
                        "retriable authentication failure; backing off"
                    );
                    tokio::time::sleep(self.config.auth_retry_backoff()).await;
                }
                Err(TransportError::RetriableAuth(reason)) => {
                    error!(
                        signature = %self.state.signature(),
                        attempts = attempt,
                        %reason,
                        "authentication retries exhausted"
                    );
                    self.phase = SessionPhase::Failed;
                    self.close("authentication retries exhausted").await;
                    return Err(HarvestError::RetriableAuth(reason));
                }
                Err(TransportError::Fatal(e)) => {
                    error!(
                        signature = %self.state.signature(),
                        error = %e,
                        "transport call failed"
                    );
                    self.phase = SessionPhase::Failed;
                    self.close("transport failure").await;
                    return Err(HarvestError::Transport(e.to_string()));
                }
            }
        }
    }

    async fn finish_call(&mut self, page: Option<PageStatus>) -> Result<Option<PageStatus>> {
        match page {
            Some(status) => {
                self.state.record_page(&status);
                debug!(
                    signature = %self.state.signature(),
                    page = self.state.call_count(),
                    records = status.records.len(),
                    cursor = ?status.cursor,
                    "fetched page"
                );
                self.phase = SessionPhase::Active;
                Ok(Some(status))
            }
            None => {
                info!(
                    signature = %self.state.signature(),
                    pages = self.state.call_count(),
                    "source exhausted"
                );
                self.phase = SessionPhase::Exhausted;
                self.close("source exhausted").await;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::RawRecord;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    enum Step {
        Page(PageStatus),
        End,
        AuthFail(&'static str),
        Fatal(&'static str),
    }

    #[derive(Default)]
    struct Recorded {
        attempts: u32,
        requests: Vec<String>,
        close_reasons: Vec<String>,
    }

    struct ScriptedTransport {
        script: Mutex<VecDeque<Step>>,
        recorded: Arc<Mutex<Recorded>>,
    }

    impl ScriptedTransport {
        fn new(steps: Vec<Step>) -> (Self, Arc<Mutex<Recorded>>) {
            let recorded = Arc::new(Mutex::new(Recorded::default()));
            (
                Self {
                    script: Mutex::new(steps.into()),
                    recorded: Arc::clone(&recorded),
                },
                recorded,
            )
        }

        fn step(
            &self,
            state: &ConnectionState,
        ) -> std::result::Result<Option<PageStatus>, TransportError> {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.attempts += 1;
            recorded
                .requests
                .push(state.resolved_request().unwrap_or_default().to_string());
            match self.script.lock().unwrap().pop_front() {
                Some(Step::Page(status)) => Ok(Some(status)),
                Some(Step::End) | None => Ok(None),
                Some(Step::AuthFail(reason)) => {
                    Err(TransportError::RetriableAuth(reason.to_string()))
                }
                Some(Step::Fatal(message)) => Err(TransportError::fatal(message)),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute_first(
            &mut self,
            state: &ConnectionState,
        ) -> std::result::Result<Option<PageStatus>, TransportError> {
            self.step(state)
        }

        async fn execute_next(
            &mut self,
            state: &ConnectionState,
        ) -> std::result::Result<Option<PageStatus>, TransportError> {
            self.step(state)
        }

        async fn close_all(&mut self, message: &str) -> bool {
            self.recorded
                .lock()
                .unwrap()
                .close_reasons
                .push(message.to_string());
            true
        }

        async fn close_stream(&mut self) -> bool {
            false
        }
    }

    fn record(id: &str) -> RawRecord {
        RawRecord::Object(json!({"id": id}))
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig {
            request_template: "https://api.example.com/items?page={{page}}".to_string(),
            schema: vec![crate::schema::SchemaColumn::primitive("id", "string")],
            auth_retry_backoff_ms: 10,
            ..Default::default()
        }
    }

    fn session_with(
        config: ExtractionConfig,
        steps: Vec<Step>,
    ) -> (ConnectionSession, Arc<Mutex<Recorded>>) {
        let (transport, recorded) = ScriptedTransport::new(steps);
        let session = ConnectionSession::open(config, Box::new(transport), CancellationToken::new());
        (session, recorded)
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_page_extraction_reaches_exhausted() {
        let (mut session, recorded) = session_with(
            config(),
            vec![
                Step::Page(PageStatus::new(vec![record("a")]).with_cursor("c1")),
                Step::Page(PageStatus::new(vec![record("b")])),
                Step::End,
            ],
        );

        let first = session.first().await.unwrap().unwrap();
        assert_eq!(first.records.len(), 1);
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.state().cursor(), Some("c1"));

        let second = session.next().await.unwrap().unwrap();
        assert_eq!(second.records.len(), 1);
        assert!(session.state().cursor().is_none());

        assert!(session.next().await.unwrap().is_none());
        assert_eq!(session.phase(), SessionPhase::Exhausted);
        assert!(session.is_closed());

        let recorded = recorded.lock().unwrap();
        // The page parameter advanced between requests.
        assert_eq!(recorded.requests[0], "https://api.example.com/items?page=1");
        assert_eq!(recorded.requests[1], "https://api.example.com/items?page=2");
        assert_eq!(recorded.requests[2], "https://api.example.com/items?page=3");
        assert_eq!(recorded.close_reasons, vec!["source exhausted"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_retry_bound_counts_total_attempts() {
        let mut config = config();
        config.auth_retry_limit = 2;
        let (mut session, recorded) = session_with(
            config,
            vec![
                Step::AuthFail("expired"),
                Step::AuthFail("expired"),
                Step::AuthFail("expired"),
            ],
        );

        let err = session.first().await.unwrap_err();
        assert!(matches!(err, HarvestError::RetriableAuth(_)));
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert!(session.is_closed());
        // Exactly two attempts: the bound leaves no room for a third.
        assert_eq!(recorded.lock().unwrap().attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_retry_recovers_within_bound() {
        let (mut session, recorded) = session_with(
            config(),
            vec![
                Step::AuthFail("expired"),
                Step::Page(PageStatus::new(vec![record("a")])),
            ],
        );

        assert!(session.first().await.unwrap().is_some());
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(recorded.lock().unwrap().attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_fails_and_closes() {
        let (mut session, recorded) = session_with(config(), vec![Step::Fatal("connection reset")]);

        let err = session.first().await.unwrap_err();
        assert!(matches!(err, HarvestError::Transport(_)));
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert_eq!(
            recorded.lock().unwrap().close_reasons,
            vec!["transport failure"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_substitution_failure_falls_back_to_raw_template() {
        let mut config = config();
        config.request_template = "https://api.example.com/{{missing}}".to_string();
        config.strict_templates = true;
        let (mut session, recorded) = session_with(config, vec![Step::End]);

        assert!(session.first().await.unwrap().is_none());
        // Strict resolution failed, so the transport saw the raw template.
        assert_eq!(
            recorded.lock().unwrap().requests[0],
            "https://api.example.com/{{missing}}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_before_the_next_call() {
        let cancel = CancellationToken::new();
        let (transport, recorded) = ScriptedTransport::new(vec![
            Step::Page(PageStatus::new(vec![record("a")]).with_cursor("c1")),
            Step::Page(PageStatus::new(vec![record("b")])),
        ]);
        let mut session = ConnectionSession::open(config(), Box::new(transport), cancel.clone());

        assert!(session.first().await.unwrap().is_some());
        cancel.cancel();

        assert!(session.next().await.unwrap().is_none());
        assert_eq!(session.phase(), SessionPhase::Closed);
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.attempts, 1);
        assert_eq!(recorded.close_reasons, vec!["cancelled"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_applies_to_follow_up_calls_only() {
        let mut config = config();
        config.call_interval_ms = 5_000;
        let (mut session, _) = session_with(
            config,
            vec![
                Step::Page(PageStatus::new(vec![record("a")]).with_cursor("c1")),
                Step::End,
            ],
        );

        let before = tokio::time::Instant::now();
        session.first().await.unwrap();
        assert_eq!(before.elapsed(), std::time::Duration::ZERO);

        session.next().await.unwrap();
        assert!(before.elapsed() >= std::time::Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_pacing_sleep_still_completes_the_call() {
        let mut config = config();
        config.call_interval_ms = 60_000;
        let cancel = CancellationToken::new();
        let (transport, recorded) = ScriptedTransport::new(vec![
            Step::Page(PageStatus::new(vec![record("a")]).with_cursor("c1")),
            Step::Page(PageStatus::new(vec![record("b")])),
        ]);
        let mut session = ConnectionSession::open(config, Box::new(transport), cancel.clone());

        session.first().await.unwrap();

        // Cancellation arrives while next() is inside its pacing sleep.
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let before = tokio::time::Instant::now();
        let page = session.next().await.unwrap();

        // The interrupted sleep is cut short and the call still proceeds.
        assert!(page.is_some());
        assert!(before.elapsed() < std::time::Duration::from_secs(60));
        assert_eq!(recorded.lock().unwrap().attempts, 2);
        assert_eq!(session.phase(), SessionPhase::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_out_of_phase_are_rejected() {
        let (mut session, _) = session_with(config(), vec![Step::End]);

        // next() before any first() is a phase error.
        assert!(matches!(
            session.next().await,
            Err(HarvestError::Session(_))
        ));

        session.first().await.unwrap();
        assert!(matches!(
            session.first().await,
            Err(HarvestError::Session(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent() {
        let (mut session, recorded) = session_with(
            config(),
            vec![Step::Page(PageStatus::new(vec![record("a")]))],
        );

        session.first().await.unwrap();
        session.close("shutdown").await;
        session.close("shutdown").await;
        assert_eq!(recorded.lock().unwrap().close_reasons, vec!["shutdown"]);
        assert_eq!(session.phase(), SessionPhase::Closed);
    }
}
