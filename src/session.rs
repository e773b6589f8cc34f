use crate::diagnostics::ScreeningEvent;
use crate::directory::ContactDirectory;
use crate::engine::{ScreeningDecision, ScreeningEngine};
use crate::error::{DirectoryError, ScreeningError};
use crate::normalization::{normalize, NormalizedNumber};
use crate::response::ScreeningResponse;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Lookups allowed in flight per session unless configured otherwise.
pub const DEFAULT_MAX_PENDING_LOOKUPS: usize = 64;

/// One incoming call as delivered by the telephony stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEvent {
    pub call_id: String,
    /// Raw caller identifier; `None` for restricted or unknown callers.
    pub caller: Option<String>,
}

impl CallEvent {
    pub fn new(call_id: impl Into<String>, caller: Option<&str>) -> Self {
        Self {
            call_id: call_id.into(),
            caller: caller.map(str::to_string),
        }
    }
}

/// Applies a screening response to the live call.
pub trait CallResponder: Send + Sync {
    fn respond(&self, call_id: &str, response: &ScreeningResponse);
}

/// Responder that only logs what would be applied.
#[derive(Debug, Default)]
pub struct LoggingResponder;

impl CallResponder for LoggingResponder {
    fn respond(&self, call_id: &str, response: &ScreeningResponse) {
        log::debug!(
            "Responding to {}: disallow={} reject={} skip_call_log={} skip_notification={}",
            call_id,
            response.disallow,
            response.reject,
            response.skip_call_log,
            response.skip_notification
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    pub call_id: String,
    pub decision: ScreeningDecision,
    pub response: ScreeningResponse,
    pub event: ScreeningEvent,
    pub elapsed_ms: u64,
}

/// Feeds call events into the engine and applies the result to each call.
///
/// Directory lookups run on the blocking pool under `lookup_timeout`. A
/// timeout or failed lookup resolves to the engine's fail-safe disposition.
///
/// A lookup that times out keeps its blocking thread until the directory
/// returns. At most `max_pending_lookups` such threads exist per session;
/// once they are all taken, further calls wait for a slot within their own
/// timeout and fall back to the fail-safe.
pub struct ScreeningSession<D: ?Sized, R: ?Sized> {
    engine: Arc<ScreeningEngine>,
    directory: Arc<D>,
    responder: Arc<R>,
    lookup_timeout: Duration,
    lookup_slots: Arc<Semaphore>,
}

impl<D: ?Sized, R: ?Sized> Clone for ScreeningSession<D, R> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            directory: self.directory.clone(),
            responder: self.responder.clone(),
            lookup_timeout: self.lookup_timeout,
            lookup_slots: self.lookup_slots.clone(),
        }
    }
}

impl<D, R> ScreeningSession<D, R>
where
    D: ContactDirectory + ?Sized + 'static,
    R: CallResponder + ?Sized + 'static,
{
    pub fn new(
        engine: Arc<ScreeningEngine>,
        directory: Arc<D>,
        responder: Arc<R>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            directory,
            responder,
            lookup_timeout,
            lookup_slots: Arc::new(Semaphore::new(DEFAULT_MAX_PENDING_LOOKUPS)),
        }
    }

    /// Cap the directory lookups running at once. Zero is treated as one.
    pub fn with_max_pending_lookups(mut self, max: usize) -> Self {
        self.lookup_slots = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn engine(&self) -> &ScreeningEngine {
        &self.engine
    }

    /// Screen one call: decide, respond exactly once, then record diagnostics.
    pub async fn screen_call(&self, event: CallEvent) -> ScreeningOutcome {
        self.screen_call_tracked(event, &AtomicBool::new(false)).await
    }

    /// Screen a batch of calls concurrently. Outcomes keep the input order.
    ///
    /// A call whose screening task dies before answering still gets the
    /// fail-safe response.
    pub async fn screen_calls(&self, events: Vec<CallEvent>) -> Vec<ScreeningOutcome> {
        let mut handles = Vec::with_capacity(events.len());
        for event in events {
            let session = self.clone();
            let answered = Arc::new(AtomicBool::new(false));
            let pending = (event.clone(), answered.clone(), Instant::now());
            let task =
                tokio::spawn(async move { session.screen_call_tracked(event, &answered).await });
            handles.push((pending, task));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for ((event, answered, started), handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if answered.load(Ordering::SeqCst) => {
                    log::error!(
                        "Screening task for call {} failed after responding: {e}",
                        event.call_id
                    );
                }
                Err(e) => {
                    log::error!("Screening task for call {} failed: {e}", event.call_id);
                    let error =
                        DirectoryError::Unavailable(format!("screening task failed: {e}"));
                    let decision = self
                        .engine
                        .fail_safe(normalize(event.caller.as_deref()), &error);
                    outcomes.push(self.finish(event.call_id, decision, started, &answered));
                }
            }
        }
        outcomes
    }

    async fn screen_call_tracked(
        &self,
        event: CallEvent,
        answered: &AtomicBool,
    ) -> ScreeningOutcome {
        let started = Instant::now();
        log::debug!(
            "Screening call {} (identifier present: {})",
            event.call_id,
            event.caller.is_some()
        );

        let decision = match normalize(event.caller.as_deref()) {
            None => ScreeningEngine::missing_identifier(),
            Some(number) => self.lookup(number).await,
        };

        self.finish(event.call_id, decision, started, answered)
    }

    fn finish(
        &self,
        call_id: String,
        decision: ScreeningDecision,
        started: Instant,
        answered: &AtomicBool,
    ) -> ScreeningOutcome {
        let response = decision.response();
        self.responder.respond(&call_id, &response);
        answered.store(true, Ordering::SeqCst);
        let diagnostic = self.engine.emit(Some(&call_id), &decision);

        ScreeningOutcome {
            call_id,
            decision,
            response,
            event: diagnostic,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn lookup(&self, number: NormalizedNumber) -> ScreeningDecision {
        let engine = self.engine.clone();
        let directory = self.directory.clone();
        let query = number.clone();
        let slots = self.lookup_slots.clone();

        // The slot moves into the blocking task and is freed only when the
        // directory returns, even if the caller has already timed out.
        let task = async move {
            let slot = slots.acquire_owned().await.map_err(|_| {
                DirectoryError::Unavailable("lookup slots closed".to_string())
            })?;
            tokio::task::spawn_blocking(move || {
                let _slot = slot;
                engine.match_number(query, &*directory)
            })
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("lookup task failed: {e}")))
        };

        let error = match tokio::time::timeout(self.lookup_timeout, task).await {
            Ok(Ok(Ok(decision))) => return decision,
            Ok(Ok(Err(ScreeningError::DirectoryUnavailable(err)))) => err,
            Ok(Err(err)) => err,
            Err(_) => DirectoryError::Timeout(self.lookup_timeout.as_millis() as u64),
        };

        self.engine.fail_safe(Some(number), &error)
    }
}
