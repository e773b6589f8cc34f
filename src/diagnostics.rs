use crate::engine::{DecisionReason, ScreeningDecision};
use crate::normalization::NormalizedNumber;
use crate::response::Disposition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};

/// Structured record of one screening decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningEvent {
    pub timestamp: DateTime<Utc>,
    pub call_id: Option<String>,
    pub identifier_present: bool,
    /// Normalized number, masked when redaction is on.
    pub number: Option<String>,
    pub disposition: Disposition,
    pub reason: DecisionReason,
    pub detail: Option<String>,
}

impl ScreeningEvent {
    pub fn from_decision(
        call_id: Option<&str>,
        decision: &ScreeningDecision,
        redact_numbers: bool,
    ) -> Self {
        let number = decision.number.as_ref().map(|number| {
            if redact_numbers {
                redact(number)
            } else {
                number.to_string()
            }
        });

        Self {
            timestamp: Utc::now(),
            call_id: call_id.map(str::to_string),
            identifier_present: decision.number.is_some(),
            number,
            disposition: decision.disposition,
            reason: decision.reason,
            detail: decision.detail.clone(),
        }
    }

    pub fn summary(&self) -> String {
        let caller = match (&self.number, self.identifier_present) {
            (Some(number), _) if !number.is_empty() => number.as_str(),
            (_, true) => "<no digits>",
            (_, false) => "<unknown caller>",
        };
        let mut line = format!("{} call from {} ({})", self.disposition, caller, self.reason);
        if let Some(call_id) = &self.call_id {
            line = format!("[{call_id}] {line}");
        }
        if let Some(detail) = &self.detail {
            line.push_str(": ");
            line.push_str(detail);
        }
        line
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::warn!("Failed to serialize screening event: {e}");
            self.summary()
        })
    }
}

/// Mask all but the last four digits, keeping a leading `+`.
pub fn redact(number: &NormalizedNumber) -> String {
    let digits = number.digits();
    let prefix = if number.is_international() { "+" } else { "" };
    let visible = if digits.len() > 4 { 4 } else { 0 };
    let hidden = digits.len() - visible;

    format!("{}{}{}", prefix, "*".repeat(hidden), &digits[hidden..])
}

/// Running totals of screening decisions. Kept in memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningStats {
    pub total: u64,
    pub allowed: u64,
    pub blocked: u64,
    pub missing_identifier: u64,
    pub contact_matches: u64,
    pub no_contact_matches: u64,
    pub no_dialable_digits: u64,
    pub fail_safe: u64,
}

impl ScreeningStats {
    pub fn record(&mut self, event: &ScreeningEvent) {
        self.total += 1;
        match event.disposition {
            Disposition::Allow => self.allowed += 1,
            Disposition::Block => self.blocked += 1,
        }
        match event.reason {
            DecisionReason::MissingIdentifier => self.missing_identifier += 1,
            DecisionReason::ContactMatch => self.contact_matches += 1,
            DecisionReason::NoContactMatch => self.no_contact_matches += 1,
            DecisionReason::NoDialableDigits => self.no_dialable_digits += 1,
            DecisionReason::DirectoryUnavailable => self.fail_safe += 1,
        }
    }
}

/// Collects screening events off the decision path.
///
/// Events go through an unbounded channel to a worker task, so recording
/// never blocks the caller. Must be created inside a tokio runtime.
pub struct DiagnosticsCollector {
    sender: mpsc::UnboundedSender<ScreeningEvent>,
    stats: Arc<Mutex<ScreeningStats>>,
    handle: tokio::task::JoinHandle<()>,
}

impl DiagnosticsCollector {
    pub fn new(summary_interval_seconds: u64) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stats = Arc::new(Mutex::new(ScreeningStats::default()));

        let worker_stats = stats.clone();
        let handle = tokio::spawn(async move {
            Self::diagnostics_worker(receiver, worker_stats, summary_interval_seconds).await;
        });

        Self {
            sender,
            stats,
            handle,
        }
    }

    pub fn record_event(&self, event: ScreeningEvent) {
        if let Err(e) = self.sender.send(event) {
            log::warn!("Failed to send screening event: {e}");
        }
    }

    pub fn snapshot(&self) -> ScreeningStats {
        lock_stats(&self.stats).clone()
    }

    /// Stop accepting events, drain the queue and return the final totals.
    pub async fn shutdown(self) -> ScreeningStats {
        let Self {
            sender,
            stats,
            handle,
        } = self;
        drop(sender);

        if let Err(e) = handle.await {
            log::error!("Diagnostics worker error: {e}");
        }
        let final_stats = lock_stats(&stats).clone();
        final_stats
    }

    async fn diagnostics_worker(
        mut receiver: mpsc::UnboundedReceiver<ScreeningEvent>,
        stats: Arc<Mutex<ScreeningStats>>,
        summary_interval_seconds: u64,
    ) {
        let period = Duration::from_secs(summary_interval_seconds.max(1));
        let mut summary_timer = interval_at(Instant::now() + period, period);
        let mut last_reported_total = 0;

        loop {
            tokio::select! {
                event = receiver.recv() => {
                    match event {
                        Some(event) => lock_stats(&stats).record(&event),
                        None => {
                            // Channel closed, report and exit
                            log_summary(&lock_stats(&stats));
                            break;
                        }
                    }
                }
                _ = summary_timer.tick() => {
                    let current = lock_stats(&stats).clone();
                    if current.total != last_reported_total {
                        log_summary(&current);
                        last_reported_total = current.total;
                    }
                }
            }
        }
    }
}

fn lock_stats(stats: &Mutex<ScreeningStats>) -> MutexGuard<'_, ScreeningStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn log_summary(stats: &ScreeningStats) {
    log::info!(
        "Screening summary: {} calls, {} allowed, {} blocked, {} unknown callers, {} fail-safe",
        stats.total,
        stats.allowed,
        stats.blocked,
        stats.missing_identifier,
        stats.fail_safe
    );
}
