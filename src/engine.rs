//! Screening Decision Engine
//!
//! Turns a raw caller identifier into an Allow/Block disposition using the
//! contact directory as an allow-list. Directory failures are resolved with a
//! configurable fail-safe disposition.

use crate::diagnostics::{DiagnosticsCollector, ScreeningEvent};
use crate::directory::ContactDirectory;
use crate::error::{DirectoryError, Result, ScreeningError};
use crate::normalization::{normalize, NormalizedNumber};
use crate::response::{build_response, Disposition, ScreeningResponse};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Why a disposition was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionReason {
    /// No caller identifier was delivered (restricted or unknown caller).
    MissingIdentifier,
    /// The number belongs to a known contact.
    ContactMatch,
    /// The number is not in the directory.
    NoContactMatch,
    /// The identifier had no dialable digits.
    NoDialableDigits,
    /// The directory failed or timed out; the fail-safe default applied.
    DirectoryUnavailable,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::MissingIdentifier => "missing_identifier",
            DecisionReason::ContactMatch => "contact_match",
            DecisionReason::NoContactMatch => "no_contact_match",
            DecisionReason::NoDialableDigits => "no_dialable_digits",
            DecisionReason::DirectoryUnavailable => "directory_unavailable",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningDecision {
    pub disposition: Disposition,
    pub reason: DecisionReason,
    /// Normalized caller number; `None` when no identifier was delivered.
    pub number: Option<NormalizedNumber>,
    /// Failure description when the fail-safe default was applied.
    pub detail: Option<String>,
}

impl ScreeningDecision {
    pub fn response(&self) -> ScreeningResponse {
        build_response(self.disposition)
    }

    pub fn is_fail_safe(&self) -> bool {
        self.reason == DecisionReason::DirectoryUnavailable
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Disposition applied when the directory cannot answer.
    pub fail_safe: Disposition,
    /// Mask caller numbers in diagnostic events.
    pub redact_numbers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fail_safe: Disposition::Allow,
            redact_numbers: true,
        }
    }
}

pub struct ScreeningEngine {
    config: EngineConfig,
    diagnostics: Option<Arc<DiagnosticsCollector>>,
}

impl Default for ScreeningEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ScreeningEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            diagnostics: None,
        }
    }

    /// Forward every decision event to `collector` in addition to the log.
    pub fn with_diagnostics(mut self, collector: Arc<DiagnosticsCollector>) -> Self {
        self.diagnostics = Some(collector);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Screen a caller, surfacing directory failures to the caller.
    ///
    /// No diagnostic event is emitted and no fail-safe is applied.
    pub fn evaluate<D>(&self, raw: Option<&str>, directory: &D) -> Result<ScreeningDecision>
    where
        D: ContactDirectory + ?Sized,
    {
        match normalize(raw) {
            None => Ok(Self::missing_identifier()),
            Some(number) => self.match_number(number, directory),
        }
    }

    /// Screen a caller. Always yields a decision: directory failures resolve
    /// to the configured fail-safe disposition.
    pub fn decide<D>(&self, raw: Option<&str>, directory: &D) -> ScreeningDecision
    where
        D: ContactDirectory + ?Sized,
    {
        let decision = match self.evaluate(raw, directory) {
            Ok(decision) => decision,
            Err(ScreeningError::DirectoryUnavailable(err)) => self.fail_safe(normalize(raw), &err),
        };
        self.emit(None, &decision);
        decision
    }

    /// Decision for a call that carried no identifier at all.
    pub fn missing_identifier() -> ScreeningDecision {
        ScreeningDecision {
            disposition: Disposition::Allow,
            reason: DecisionReason::MissingIdentifier,
            number: None,
            detail: None,
        }
    }

    /// Look up an already-normalized number. An empty number blocks without
    /// querying the directory.
    pub fn match_number<D>(
        &self,
        number: NormalizedNumber,
        directory: &D,
    ) -> Result<ScreeningDecision>
    where
        D: ContactDirectory + ?Sized,
    {
        if number.is_empty() {
            return Ok(ScreeningDecision {
                disposition: Disposition::Block,
                reason: DecisionReason::NoDialableDigits,
                number: Some(number),
                detail: None,
            });
        }

        let (disposition, reason) = if directory.contains(&number)? {
            (Disposition::Allow, DecisionReason::ContactMatch)
        } else {
            (Disposition::Block, DecisionReason::NoContactMatch)
        };

        Ok(ScreeningDecision {
            disposition,
            reason,
            number: Some(number),
            detail: None,
        })
    }

    /// Resolve a failed lookup with the configured fail-safe disposition.
    pub fn fail_safe(
        &self,
        number: Option<NormalizedNumber>,
        error: &DirectoryError,
    ) -> ScreeningDecision {
        log::warn!(
            "Contact lookup failed, applying fail-safe {}: {}",
            self.config.fail_safe,
            error
        );
        ScreeningDecision {
            disposition: self.config.fail_safe,
            reason: DecisionReason::DirectoryUnavailable,
            number,
            detail: Some(error.to_string()),
        }
    }

    /// Log the decision and hand it to the diagnostics collector, if any.
    pub fn emit(&self, call_id: Option<&str>, decision: &ScreeningDecision) -> ScreeningEvent {
        let event = ScreeningEvent::from_decision(call_id, decision, self.config.redact_numbers);

        if decision.is_fail_safe() {
            log::warn!("{}", event.summary());
        } else {
            log::info!("{}", event.summary());
        }
        log::debug!("screening event: {}", event.to_json_line());

        if let Some(collector) = &self.diagnostics {
            collector.record_event(event.clone());
        }
        event
    }
}

/// Screen `raw` against `directory` with the default engine (fail-safe Allow).
pub fn decide<D>(raw: Option<&str>, directory: &D) -> Disposition
where
    D: ContactDirectory + ?Sized,
{
    ScreeningEngine::default().decide(raw, directory).disposition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::normalization::normalize_str;
    use proptest::prelude::*;
    use std::collections::HashSet;

    struct BrokenDirectory;

    impl ContactDirectory for BrokenDirectory {
        fn contains(
            &self,
            _number: &NormalizedNumber,
        ) -> std::result::Result<bool, DirectoryError> {
            Err(DirectoryError::Unavailable("provider crashed".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn contacts() -> InMemoryDirectory {
        InMemoryDirectory::from_numbers(["+15551234567"])
    }

    #[test]
    fn test_formatted_contact_number_is_allowed() {
        let decision =
            ScreeningEngine::default().decide(Some("+1 (555) 123-4567"), &contacts());

        assert_eq!(decision.disposition, Disposition::Allow);
        assert_eq!(decision.reason, DecisionReason::ContactMatch);
        assert_eq!(decision.number.unwrap().as_str(), "+15551234567");
    }

    #[test]
    fn test_unknown_number_is_blocked() {
        let decision = ScreeningEngine::default().decide(Some("555-0000"), &contacts());

        assert_eq!(decision.disposition, Disposition::Block);
        assert_eq!(decision.reason, DecisionReason::NoContactMatch);
        assert_eq!(decision.number.as_ref().unwrap().as_str(), "5550000");

        let response = decision.response();
        assert!(response.disallow);
        assert!(response.reject);
        assert!(!response.skip_call_log);
        assert!(!response.skip_notification);
    }

    #[test]
    fn test_missing_identifier_is_allowed_for_any_directory() {
        assert_eq!(decide(None, &contacts()), Disposition::Allow);
        assert_eq!(decide(None, &InMemoryDirectory::new()), Disposition::Allow);
        assert_eq!(decide(None, &BrokenDirectory), Disposition::Allow);
    }

    #[test]
    fn test_identifier_without_digits_is_blocked() {
        let decision = ScreeningEngine::default().decide(Some("Private"), &BrokenDirectory);

        // The directory is never consulted for an empty number.
        assert_eq!(decision.disposition, Disposition::Block);
        assert_eq!(decision.reason, DecisionReason::NoDialableDigits);
    }

    #[test]
    fn test_number_without_country_code_does_not_match() {
        assert_eq!(decide(Some("555 123 4567"), &contacts()), Disposition::Block);
    }

    #[test]
    fn test_directory_failure_applies_fail_safe_allow() {
        let decision = ScreeningEngine::default().decide(Some("555-0000"), &BrokenDirectory);

        assert_eq!(decision.disposition, Disposition::Allow);
        assert!(decision.is_fail_safe());
        assert!(decision.detail.unwrap().contains("provider crashed"));
    }

    #[test]
    fn test_fail_safe_can_be_configured_to_block() {
        let engine = ScreeningEngine::new(EngineConfig {
            fail_safe: Disposition::Block,
            ..Default::default()
        });
        let decision = engine.decide(Some("555-0000"), &BrokenDirectory);

        assert_eq!(decision.disposition, Disposition::Block);
        assert_eq!(decision.reason, DecisionReason::DirectoryUnavailable);
    }

    #[test]
    fn test_evaluate_surfaces_directory_failure() {
        let result = ScreeningEngine::default().evaluate(Some("555-0000"), &BrokenDirectory);
        assert!(matches!(result, Err(ScreeningError::DirectoryUnavailable(_))));
    }

    #[test]
    fn test_directory_membership_decides_for_many_inputs() {
        let directory =
            InMemoryDirectory::from_numbers(["+15551234567", "5550000", "+442079460958"]);
        let engine = ScreeningEngine::default();

        let known = [
            "+1.555.123.4567",
            "(555) 0000",
            "+44 20 7946 0958",
            "tel:555-0000",
        ];
        for raw in known {
            assert_eq!(
                engine.decide(Some(raw), &directory).disposition,
                Disposition::Allow,
                "{raw} should be allowed"
            );
        }

        let unknown = ["+1 555 123 4568", "5550001", "442079460958", "0"];
        for raw in unknown {
            assert_eq!(
                engine.decide(Some(raw), &directory).disposition,
                Disposition::Block,
                "{raw} should be blocked"
            );
        }
    }

    proptest! {
        #[test]
        fn test_saved_contacts_are_allowed_however_formatted(
            numbers in prop::collection::vec("\\+?[0-9]{1,12}", 1..8),
            pick in any::<prop::sample::Index>(),
        ) {
            let directory = InMemoryDirectory::from_numbers(numbers.iter().map(String::as_str));
            let stored = pick.get(&numbers);
            let digits: Vec<String> = stored.chars().map(String::from).collect();
            let caller = format!("tel: ({})", digits.join("-"));

            let decision = ScreeningEngine::default().decide(Some(&caller), &directory);
            prop_assert_eq!(decision.disposition, Disposition::Allow);
            prop_assert_eq!(decision.reason, DecisionReason::ContactMatch);
        }

        #[test]
        fn test_callers_outside_directory_are_blocked(
            numbers in prop::collection::vec("\\+?[0-9]{1,12}", 0..8),
            caller in "\\+?[0-9 ()\\-]{0,16}",
        ) {
            let directory = InMemoryDirectory::from_numbers(numbers.iter().map(String::as_str));
            let saved: HashSet<NormalizedNumber> =
                numbers.iter().map(|n| normalize_str(n)).collect();
            let incoming = normalize_str(&caller);

            let expected = if saved.contains(&incoming) && !incoming.is_empty() {
                Disposition::Allow
            } else {
                Disposition::Block
            };
            prop_assert_eq!(decide(Some(&caller), &directory), expected);
        }

        #[test]
        fn test_absent_caller_is_allowed_for_any_directory(
            numbers in prop::collection::vec("\\+?[0-9]{1,12}", 0..8),
        ) {
            let directory = InMemoryDirectory::from_numbers(numbers.iter().map(String::as_str));
            prop_assert_eq!(decide(None, &directory), Disposition::Allow);
        }
    }
}
