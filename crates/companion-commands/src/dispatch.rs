//! Durable-then-best-effort command dispatch.

use std::sync::Arc;

use companion_core::collections;
use companion_sync::DocumentStore;
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, warn};

use crate::model::{
    AUDIT_DIRECTION, AUDIT_EVENT_TYPE, CommandRequest, DeliveryAck, DeliveryError, DeliveryPayload,
    DeviceAction, FailureClass, PENDING_STATUS, classify_delivery_error,
    idempotency_key_for_delivery,
};
use crate::{CommandError, CommandTransport};

/// Where a request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Accepted but not yet written.
    Requested,
    /// Command and audit documents are durable; no delivery attempted.
    Persisted,
    /// Delivery was attempted; see [`DeliveryOutcome`] for the advisory result.
    DeliveryAttempted,
}

/// Advisory result of live delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Transport acknowledged the command.
    Delivered(DeliveryAck),
    /// Transport failed; the persisted command stands.
    Failed {
        /// Transport error.
        error: DeliveryError,
        /// Failure class.
        class: FailureClass,
    },
    /// No transport is configured; the device picks the command up from the
    /// queue.
    NotAttempted,
}

/// Outcome of one dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Id of the `device_commands` document.
    pub command_id: String,
    /// Id of the `device_command_audit` document.
    pub audit_id: String,
    /// Dispatched action.
    pub action: DeviceAction,
    /// Final state.
    pub state: CommandState,
    /// Delivery advice.
    pub delivery: DeliveryOutcome,
}

impl DispatchReport {
    /// Message for the operator.
    pub fn operator_message(&self) -> String {
        match &self.delivery {
            DeliveryOutcome::Delivered(_) | DeliveryOutcome::NotAttempted => {
                format!("Command {} sent successfully!", self.action)
            }
            DeliveryOutcome::Failed { .. } => format!(
                "Command {} recorded, but live delivery failed. The device will pick it up from \
                 the command queue.",
                self.action
            ),
        }
    }
}

/// Writes commands durably and then attempts live delivery.
pub struct CommandDispatcher {
    store: Arc<dyn DocumentStore>,
    transport: Option<Arc<dyn CommandTransport>>,
}

impl CommandDispatcher {
    /// Creates a dispatcher that only persists commands.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            transport: None,
        }
    }

    /// Adds a live delivery transport.
    pub fn with_transport(mut self, transport: Arc<dyn CommandTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Dispatches one request.
    ///
    /// The command document is written first and the audit document second;
    /// delivery runs only after both are durable and its failure is reported,
    /// not returned.
    ///
    /// # Errors
    /// Returns [`CommandError::MissingConfirmation`] or
    /// [`CommandError::ConfirmationMismatch`] before anything is written,
    /// [`CommandError::Persist`] when the command write fails and
    /// [`CommandError::AuditWrite`] when the audit write fails after the
    /// command was persisted.
    pub fn dispatch(&self, request: &CommandRequest) -> Result<DispatchReport, CommandError> {
        let user_id = request.target.user_id.trim();
        if user_id.is_empty() {
            return Err(CommandError::MissingTarget);
        }
        check_confirmation(request, user_id)?;

        let command = command_document(request)?;
        let command_id = self
            .store
            .add(collections::DEVICE_COMMANDS, command)
            .map_err(|source| {
                error!(
                    stage = "command",
                    action = "persist_failed",
                    command = %request.action,
                    error = %source
                );
                CommandError::Persist(source)
            })?;

        let audit = audit_document(request, &command_id)?;
        let audit_id = self
            .store
            .add(collections::DEVICE_COMMAND_AUDIT, audit)
            .map_err(|source| {
                error!(
                    stage = "command",
                    action = "audit_failed",
                    command_id = %command_id,
                    error = %source
                );
                CommandError::AuditWrite {
                    command_id: command_id.clone(),
                    source,
                }
            })?;
        info!(
            stage = "command",
            action = "persisted",
            command = %request.action,
            command_id = %command_id
        );

        let Some(transport) = &self.transport else {
            return Ok(DispatchReport {
                command_id,
                audit_id,
                action: request.action,
                state: CommandState::Persisted,
                delivery: DeliveryOutcome::NotAttempted,
            });
        };

        let payload = DeliveryPayload {
            idempotency_key: idempotency_key_for_delivery(&command_id, user_id, request.action),
            command_id: command_id.clone(),
            user_id: user_id.to_string(),
            user_email: request.target.user_email.clone(),
            action_type: request.action,
        };
        let delivery = match transport.send_command(&payload) {
            Ok(ack) => DeliveryOutcome::Delivered(ack),
            Err(error) => {
                let class = classify_delivery_error(&error);
                warn!(
                    stage = "command",
                    action = "delivery_failed",
                    command_id = %command_id,
                    class = ?class,
                    error = %error
                );
                DeliveryOutcome::Failed { error, class }
            }
        };

        Ok(DispatchReport {
            command_id,
            audit_id,
            action: request.action,
            state: CommandState::DeliveryAttempted,
            delivery,
        })
    }
}

fn check_confirmation(request: &CommandRequest, user_id: &str) -> Result<(), CommandError> {
    if !request.action.is_destructive() {
        return Ok(());
    }

    match &request.confirmation {
        None => Err(CommandError::MissingConfirmation {
            action: request.action,
        }),
        Some(token) if token.authorizes(request.action, user_id) => Ok(()),
        Some(_) => Err(CommandError::ConfirmationMismatch {
            action: request.action,
        }),
    }
}

/// Builds the `device_commands` document for a request.
///
/// # Errors
/// Returns [`CommandError::Clock`] when the request time cannot be formatted.
pub fn command_document(request: &CommandRequest) -> Result<Map<String, Value>, CommandError> {
    let timestamp = request
        .requested_at
        .format(&Rfc3339)
        .map_err(|error| CommandError::Clock(error.to_string()))?;
    let action = Value::String(request.action.as_str().to_string());

    let mut document = Map::new();
    document.insert(
        "userId".to_string(),
        Value::String(request.target.user_id.trim().to_string()),
    );
    document.insert("userEmail".to_string(), optional(&request.target.user_email));
    document.insert("command".to_string(), action.clone());
    document.insert("actionType".to_string(), action);
    document.insert("timestamp".to_string(), Value::String(timestamp));
    document.insert(
        "status".to_string(),
        Value::String(PENDING_STATUS.to_string()),
    );
    document.insert("requestedBy".to_string(), optional(&request.requested_by.id));
    document.insert(
        "requestedByEmail".to_string(),
        optional(&request.requested_by.email),
    );
    Ok(document)
}

/// Builds the `device_command_audit` document for a persisted command.
///
/// # Errors
/// Same as [`command_document`].
pub fn audit_document(
    request: &CommandRequest,
    command_id: &str,
) -> Result<Map<String, Value>, CommandError> {
    let mut document = command_document(request)?;
    document.insert(
        "commandId".to_string(),
        Value::String(command_id.to_string()),
    );
    document.insert(
        "eventType".to_string(),
        Value::String(AUDIT_EVENT_TYPE.to_string()),
    );
    document.insert(
        "direction".to_string(),
        Value::String(AUDIT_DIRECTION.to_string()),
    );
    Ok(document)
}

fn optional(value: &Option<String>) -> Value {
    value
        .as_ref()
        .map_or(Value::Null, |value| Value::String(value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandTarget, ConfirmationToken, Requester};
    use time::macros::datetime;

    fn request(action: DeviceAction) -> CommandRequest {
        CommandRequest::new(
            action,
            CommandTarget {
                user_id: "u1".to_string(),
                user_email: Some("u1@example.org".to_string()),
            },
            Requester::default(),
        )
        .at(datetime!(2024-05-01 10:00 UTC))
    }

    #[test]
    fn ring_needs_no_confirmation() {
        assert_eq!(check_confirmation(&request(DeviceAction::Ring), "u1"), Ok(()));
    }

    #[test]
    fn token_for_another_target_is_rejected() {
        let request = request(DeviceAction::Wipe)
            .confirmed(ConfirmationToken::issue(DeviceAction::Wipe, "u2"));
        assert_eq!(
            check_confirmation(&request, "u1"),
            Err(CommandError::ConfirmationMismatch {
                action: DeviceAction::Wipe
            })
        );
    }

    #[test]
    fn documents_carry_expected_fields() {
        let audit = audit_document(&request(DeviceAction::Ring), "cmd-1").unwrap();
        assert_eq!(audit["status"], "pending");
        assert_eq!(audit["command"], "ring");
        assert_eq!(audit["timestamp"], "2024-05-01T10:00:00Z");
        assert_eq!(audit["commandId"], "cmd-1");
        assert_eq!(audit["eventType"], "COMMAND_SENT");
        assert_eq!(audit["direction"], "OUTBOUND");
        assert_eq!(audit["requestedBy"], Value::Null);
    }
}
