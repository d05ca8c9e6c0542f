#![warn(missing_docs)]
//! # companion-commands
//!
//! ## Purpose
//! Sends remote device actions with a durable audit trail.
//!
//! ## Responsibilities
//! - Gate destructive actions behind a confirmation token bound to the action
//!   and target.
//! - Persist the command document, then the audit document, before any live
//!   delivery is attempted.
//! - Attempt best-effort live delivery and report its outcome as advice.
//!
//! ## Data flow
//! [`CommandRequest`] -> confirmation check -> `device_commands` write ->
//! `device_command_audit` write -> [`CommandTransport::send_command`] ->
//! [`DispatchReport`].
//!
//! ## Ownership and lifetimes
//! The dispatcher shares its store and transport through `Arc` handles and
//! keeps no per-command state; every report is owned by the caller.
//!
//! ## Error model
//! Missing or mismatched confirmation and failed durable writes are
//! [`CommandError`]s. Delivery failures are never errors: they land in
//! [`DeliveryOutcome::Failed`] and the persisted records stand.
//!
//! ## Security and privacy notes
//! Logs carry the action, command id and failure class, never user emails.
//!
//! ## Example
//! ```rust
//! use companion_commands::{ConfirmationToken, DeviceAction};
//!
//! let token = ConfirmationToken::issue(DeviceAction::Wipe, "user-1");
//! assert!(token.authorizes(DeviceAction::Wipe, "user-1"));
//! assert!(!token.authorizes(DeviceAction::Wipe, "user-2"));
//! ```

mod dispatch;
mod model;

pub use dispatch::{
    CommandDispatcher, CommandState, DeliveryOutcome, DispatchReport, audit_document,
    command_document,
};
pub use model::{
    AUDIT_DIRECTION, AUDIT_EVENT_TYPE, CommandRequest, CommandTarget, ConfirmationToken,
    DeliveryAck, DeliveryError, DeliveryPayload, DeviceAction, FailureClass, PENDING_STATUS,
    Requester, classify_delivery_error, idempotency_key_for_delivery,
};

use companion_sync::StoreError;
use thiserror::Error;

/// Transport for live command delivery.
pub trait CommandTransport: Send + Sync {
    /// Pushes one command to the target device.
    fn send_command(&self, payload: &DeliveryPayload) -> Result<DeliveryAck, DeliveryError>;
}

/// Error type for command dispatch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Destructive action requested without a confirmation token.
    #[error("{action} requires operator confirmation")]
    MissingConfirmation {
        /// Requested action.
        action: DeviceAction,
    },
    /// Token was issued for a different action or target.
    #[error("confirmation does not match {action} for this device")]
    ConfirmationMismatch {
        /// Requested action.
        action: DeviceAction,
    },
    /// Target user id is blank.
    #[error("command target is missing a user id")]
    MissingTarget,
    /// Request time could not be rendered.
    #[error("invalid request time: {0}")]
    Clock(String),
    /// Command document could not be written; nothing was persisted.
    #[error("failed to persist command: {0}")]
    Persist(StoreError),
    /// Command was persisted but its audit entry was not; delivery was not
    /// attempted.
    #[error("command {command_id} persisted but audit write failed: {source}")]
    AuditWrite {
        /// Persisted command id.
        command_id: String,
        /// Underlying store failure.
        source: StoreError,
    },
}
