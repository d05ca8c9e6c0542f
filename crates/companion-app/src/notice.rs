//! Transient operator notices.

use serde::Serialize;

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Action completed.
    Success,
    /// Action completed with a caveat.
    Warning,
    /// Action failed; nothing changed locally.
    Error,
}

/// Short message shown to the operator after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorNotice {
    /// Severity.
    pub severity: Severity,
    /// Message text.
    pub message: String,
}

impl OperatorNotice {
    /// Success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    /// Warning notice.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    /// Error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Returns `true` for error notices.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for OperatorNotice {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "[{:?}] {}", self.severity, self.message)
    }
}
