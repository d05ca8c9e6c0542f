//! Command vocabulary, confirmation tokens and delivery payloads.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

/// Status written on every new command document.
pub const PENDING_STATUS: &str = "pending";
/// `eventType` of outbound audit entries.
pub const AUDIT_EVENT_TYPE: &str = "COMMAND_SENT";
/// `direction` of outbound audit entries.
pub const AUDIT_DIRECTION: &str = "OUTBOUND";

/// Remote action a device can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    /// Sound a loud alarm.
    Ring,
    /// Lock the device.
    Lock,
    /// Factory-reset the device.
    Wipe,
}

impl DeviceAction {
    /// Every action, mildest first.
    pub const ALL: [DeviceAction; 3] = [DeviceAction::Ring, DeviceAction::Lock, DeviceAction::Wipe];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ring => "ring",
            Self::Lock => "lock",
            Self::Wipe => "wipe",
        }
    }

    /// Parses a wire name, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Returns `true` when dispatch needs a confirmation token.
    pub fn is_destructive(self) -> bool {
        matches!(self, Self::Lock | Self::Wipe)
    }

    /// Prompt shown to the operator before issuing a token.
    pub fn confirmation_prompt(self) -> &'static str {
        match self {
            Self::Ring => "This will trigger a loud alarm on the user's device. Continue?",
            Self::Lock => "This will remotely lock the user's device. Continue?",
            Self::Wipe => {
                "CRITICAL: This will factory reset the user's device and delete all data. \
                 ARE YOU ABSOLUTELY SURE?"
            }
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Proof that an operator confirmed one action against one target.
///
/// The token is the hex SHA-256 of `action|target`, so it cannot be replayed
/// for another action or device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationToken(String);

impl ConfirmationToken {
    /// Issues a token after the operator confirmed `action` on `target_id`.
    pub fn issue(action: DeviceAction, target_id: &str) -> Self {
        Self(token_digest(action, target_id))
    }

    /// Wraps a token received from elsewhere.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns `true` when this token was issued for `action` on `target_id`.
    pub fn authorizes(&self, action: DeviceAction, target_id: &str) -> bool {
        self.0 == token_digest(action, target_id)
    }

    /// Hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn token_digest(action: DeviceAction, target_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(action.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(target_id.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Device owner the command is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTarget {
    /// User document id.
    pub user_id: String,
    /// User email, when known.
    pub user_email: Option<String>,
}

/// Staff member requesting the command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester {
    /// Staff user id.
    pub id: Option<String>,
    /// Staff email.
    pub email: Option<String>,
}

/// One operator request.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Action to perform.
    pub action: DeviceAction,
    /// Target device owner.
    pub target: CommandTarget,
    /// Requesting staff member.
    pub requested_by: Requester,
    /// Confirmation for destructive actions.
    pub confirmation: Option<ConfirmationToken>,
    /// Request time.
    pub requested_at: OffsetDateTime,
}

impl CommandRequest {
    /// Builds an unconfirmed request stamped with the current UTC time.
    pub fn new(action: DeviceAction, target: CommandTarget, requested_by: Requester) -> Self {
        Self {
            action,
            target,
            requested_by,
            confirmation: None,
            requested_at: OffsetDateTime::now_utc(),
        }
    }

    /// Attaches a confirmation token.
    pub fn confirmed(mut self, token: ConfirmationToken) -> Self {
        self.confirmation = Some(token);
        self
    }

    /// Overrides the request time.
    pub fn at(mut self, requested_at: OffsetDateTime) -> Self {
        self.requested_at = requested_at;
        self
    }
}

/// Payload handed to the live delivery transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPayload {
    /// Persisted command id.
    pub command_id: String,
    /// Target user id.
    pub user_id: String,
    /// Target user email.
    pub user_email: Option<String>,
    /// Requested action.
    pub action_type: DeviceAction,
    /// Stable key for de-duplicating repeated deliveries.
    pub idempotency_key: String,
}

/// Acknowledgement from the delivery transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryAck {
    /// Optional transport message.
    pub message: Option<String>,
}

/// Live delivery failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Delivery service did not answer in time.
    #[error("delivery timed out")]
    Timeout,
    /// Delivery service is unreachable or not deployed.
    #[error("delivery unavailable: {0}")]
    Unavailable(String),
    /// Delivery service refused the command.
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Failure class for delivery errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying later.
    Retriable,
    /// Retrying the same payload will not help.
    Permanent,
}

/// Classifies a delivery failure.
pub fn classify_delivery_error(error: &DeliveryError) -> FailureClass {
    match error {
        DeliveryError::Timeout | DeliveryError::Unavailable(_) => FailureClass::Retriable,
        DeliveryError::Rejected(_) => FailureClass::Permanent,
    }
}

/// Stable delivery key derived from command id, target and action.
pub fn idempotency_key_for_delivery(command_id: &str, user_id: &str, action: DeviceAction) -> String {
    let mut hasher = Sha256::new();
    hasher.update(command_id.as_bytes());
    hasher.update(b"|");
    hasher.update(user_id.as_bytes());
    hasher.update(b"|");
    hasher.update(action.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_lock_and_wipe_are_destructive() {
        assert!(!DeviceAction::Ring.is_destructive());
        assert!(DeviceAction::Lock.is_destructive());
        assert!(DeviceAction::Wipe.is_destructive());
    }

    #[test]
    fn parse_accepts_any_case() {
        assert_eq!(DeviceAction::parse(" WIPE "), Some(DeviceAction::Wipe));
        assert_eq!(DeviceAction::parse("reboot"), None);
    }

    #[test]
    fn tokens_bind_action_and_target() {
        let token = ConfirmationToken::issue(DeviceAction::Lock, "u1");
        assert!(token.authorizes(DeviceAction::Lock, "u1"));
        assert!(!token.authorizes(DeviceAction::Wipe, "u1"));
        assert_eq!(token.as_str().len(), 64);
    }

    #[test]
    fn delivery_errors_are_classified() {
        assert_eq!(classify_delivery_error(&DeliveryError::Timeout), FailureClass::Retriable);
        assert_eq!(
            classify_delivery_error(&DeliveryError::Rejected("bad token".to_string())),
            FailureClass::Permanent
        );
    }
}
