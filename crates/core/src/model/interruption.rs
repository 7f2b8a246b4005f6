use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why the current question was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptionReason {
    /// The phone started ringing.
    Call,
    /// An SMS arrived.
    Sms,
    /// Anything else, including returning from the background.
    Other,
}

impl InterruptionReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InterruptionReason::Call => "call",
            InterruptionReason::Sms => "sms",
            InterruptionReason::Other => "other",
        }
    }

    /// Lenient mapping for tags coming from event sources; unknown tags become `Other`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        tag.parse().unwrap_or(InterruptionReason::Other)
    }

    /// User-facing message shown alongside the skip.
    #[must_use]
    pub fn notice(self) -> &'static str {
        match self {
            InterruptionReason::Call => "Incoming call detected! Question skipped.",
            InterruptionReason::Sms => "New SMS received! Question skipped.",
            InterruptionReason::Other => "Question skipped due to interruption.",
        }
    }
}

impl fmt::Display for InterruptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseReasonError {
    raw: String,
}

impl fmt::Display for ParseReasonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown interruption reason: {}", self.raw)
    }
}

impl std::error::Error for ParseReasonError {}

impl FromStr for InterruptionReason {
    type Err = ParseReasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(InterruptionReason::Call),
            "sms" => Ok(InterruptionReason::Sms),
            "other" => Ok(InterruptionReason::Other),
            _ => Err(ParseReasonError { raw: s.to_owned() }),
        }
    }
}
