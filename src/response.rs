use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of screening one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    Allow,
    Block,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Allow => "Allow",
            Disposition::Block => "Block",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags handed to the telephony stack for a screened call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningResponse {
    pub disallow: bool,
    pub reject: bool,
    pub skip_call_log: bool,
    pub skip_notification: bool,
}

impl ScreeningResponse {
    pub fn is_blocking(&self) -> bool {
        self.disallow || self.reject
    }
}

/// Build the response for a disposition.
///
/// A blocked call is rejected but still logged and still notified, so the
/// user can see it and add the number to their contacts.
pub fn build_response(disposition: Disposition) -> ScreeningResponse {
    match disposition {
        Disposition::Allow => ScreeningResponse {
            disallow: false,
            reject: false,
            skip_call_log: false,
            skip_notification: false,
        },
        Disposition::Block => ScreeningResponse {
            disallow: true,
            reject: true,
            skip_call_log: false,
            skip_notification: false,
        },
    }
}

impl From<Disposition> for ScreeningResponse {
    fn from(disposition: Disposition) -> Self {
        build_response(disposition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_response_lets_the_call_through() {
        let response = build_response(Disposition::Allow);
        assert!(!response.disallow);
        assert!(!response.reject);
        assert!(!response.is_blocking());
    }

    #[test]
    fn test_block_response_keeps_call_log_and_notification() {
        let response = build_response(Disposition::Block);
        assert!(response.disallow);
        assert!(response.reject);
        assert!(!response.skip_call_log);
        assert!(!response.skip_notification);
        assert!(response.is_blocking());
    }

    #[test]
    fn test_response_serializes_flag_names() {
        let json = serde_json::to_value(ScreeningResponse::from(Disposition::Block)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "disallow": true,
                "reject": true,
                "skip_call_log": false,
                "skip_notification": false,
            })
        );
    }
}
