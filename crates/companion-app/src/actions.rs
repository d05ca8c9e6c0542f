//! Operator write-back actions.
//!
//! Every action writes straight to the store and reports an
//! [`OperatorNotice`]. Nothing is changed locally; open views pick the
//! result up from the next snapshot.

use companion_auth::StaffIdentity;
use companion_commands::{
    CommandRequest, CommandTarget, ConfirmationToken, DeliveryOutcome, DeviceAction,
    DispatchReport, Requester,
};
use companion_core::{AccountStatus, Role, collections};
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use crate::{AppError, DashboardSession, OperatorNotice, redact_sensitive};

const ACCOUNT_ADMINS: [Role; 1] = [Role::SuperAdmin];
const USER_MODERATORS: [Role; 2] = [Role::SuperAdmin, Role::Moderator];
const CONTENT_EDITORS: [Role; 3] = [Role::SuperAdmin, Role::Moderator, Role::HealthAdmin];
const DEVICE_OPERATORS: [Role; 2] = [Role::SuperAdmin, Role::CyberAdmin];

/// Station status shown as open.
pub const STATION_OPEN: &str = "Open";
/// Station status shown as closed.
pub const STATION_CLOSED: &str = "Closed";

/// Editable content collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Emergency service stations.
    Station,
    /// Doctor directory entries.
    Doctor,
    /// News items.
    News,
}

impl ContentKind {
    /// Backing collection.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Station => collections::STATIONS,
            Self::Doctor => collections::DOCTORS,
            Self::News => collections::NEWS,
        }
    }

    /// Field that must be non-blank on every entry.
    pub fn title_field(self) -> &'static str {
        match self {
            Self::Station | Self::Doctor => "name",
            Self::News => "title",
        }
    }

    /// Defaults merged under the operator's fields when adding an entry.
    pub fn template(self) -> Map<String, Value> {
        let template = match self {
            Self::Station => json!({
                "name": "", "type": "Police", "phone": "", "location": "",
                "rating": 4.0, "status": STATION_OPEN,
            }),
            Self::Doctor => json!({
                "name": "", "specialization": "", "phone": "",
                "rating": 5.0, "availability": "Mon-Fri",
            }),
            Self::News => json!({
                "title": "", "source": "", "publishedAt": "", "imageUrl": "", "pinned": false,
            }),
        };
        match template {
            Value::Object(fields) => fields,
            _ => Map::new(),
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::Station => "station",
            Self::Doctor => "doctor",
            Self::News => "news item",
        }
    }
}

/// Operator acknowledgement required before every user is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkDeleteConfirmation {
    /// Number of users the operator was shown.
    pub expected_count: usize,
    /// Operator confirmed the deletion cannot be undone.
    pub acknowledged_irreversible: bool,
}

impl DashboardSession {
    /// Flips a user between active and suspended.
    pub fn toggle_user_status(&self, user_id: &str, current: AccountStatus) -> OperatorNotice {
        let next = current.toggled();
        let result = self
            .require_role("toggle user status", &USER_MODERATORS)
            .and_then(|operator| {
                self.update_fields(
                    &operator,
                    collections::USERS,
                    user_id,
                    fields([("status", Value::from(next.as_str()))]),
                )
            });
        notice_from(
            result,
            match next {
                AccountStatus::Active => "Account reactivated.",
                AccountStatus::Suspended => "Account suspended.",
            },
            "Failed to update account status.",
        )
    }

    /// Assigns a new role to a user.
    pub fn change_role(&self, user_id: &str, role: &Role) -> OperatorNotice {
        let result = self
            .require_role("change role", &ACCOUNT_ADMINS)
            .and_then(|operator| {
                self.update_fields(
                    &operator,
                    collections::USERS,
                    user_id,
                    fields([("role", Value::from(role.as_str()))]),
                )
            });
        notice_from(
            result,
            &format!("Role changed to {}.", role.label()),
            "Failed to change role.",
        )
    }

    /// Deletes one user record.
    pub fn delete_user(&self, user_id: &str) -> OperatorNotice {
        let result = self
            .require_role("delete user", &ACCOUNT_ADMINS)
            .and_then(|operator| self.delete_document(&operator, collections::USERS, user_id));
        notice_from(result, "User deleted.", "Failed to delete user.")
    }

    /// Deletes every user record once the operator has confirmed the count.
    ///
    /// Deletions run independently; the notice reports any that failed.
    pub fn delete_all_users(&self, confirmation: BulkDeleteConfirmation) -> OperatorNotice {
        let result = self
            .require_role("delete all users", &ACCOUNT_ADMINS)
            .and_then(|operator| self.delete_all_users_confirmed(&operator, confirmation));
        match result {
            Ok((deleted, 0)) => OperatorNotice::success(format!("Deleted {deleted} users.")),
            Ok((deleted, failed)) => OperatorNotice::error(format!(
                "Failed to delete all users. {deleted} deleted, {failed} failed."
            )),
            Err(AppError::InvalidInput(message)) => OperatorNotice::error(message),
            Err(error) => failure_notice(&error, "Failed to delete all users."),
        }
    }

    /// Flips a station between open and closed.
    pub fn toggle_station(&self, station_id: &str, current_status: &str) -> OperatorNotice {
        let next = if current_status == STATION_OPEN {
            STATION_CLOSED
        } else {
            STATION_OPEN
        };
        let result = self
            .require_role("toggle station", &CONTENT_EDITORS)
            .and_then(|operator| {
                self.update_fields(
                    &operator,
                    collections::STATIONS,
                    station_id,
                    fields([("status", Value::from(next))]),
                )
            });
        notice_from(
            result,
            &format!("Station marked {next}."),
            "Failed to update station status.",
        )
    }

    /// Adds a content entry on top of the kind's defaults.
    pub fn add_content(&self, kind: ContentKind, entry: Map<String, Value>) -> OperatorNotice {
        let result = self
            .require_role("add content", &CONTENT_EDITORS)
            .and_then(|operator| {
                let mut document = kind.template();
                document.extend(entry);
                require_title(kind, &document)?;
                let id = self.store.add(kind.collection(), document)?;
                info!(stage = "action", action = "add", collection = kind.collection(), id = %id,
                    operator = %operator.id);
                Ok(())
            });
        notice_from(
            result,
            &format!("Added {}.", kind.noun()),
            &format!("Failed to save {}.", kind.noun()),
        )
    }

    /// Merges edited fields into a content entry.
    pub fn update_content(
        &self,
        kind: ContentKind,
        id: &str,
        entry: Map<String, Value>,
    ) -> OperatorNotice {
        let result = self
            .require_role("update content", &CONTENT_EDITORS)
            .and_then(|operator| {
                if entry.contains_key(kind.title_field()) {
                    require_title(kind, &entry)?;
                }
                self.update_fields(&operator, kind.collection(), id, entry)
            });
        notice_from(
            result,
            &format!("Saved {}.", kind.noun()),
            &format!("Failed to save {}.", kind.noun()),
        )
    }

    /// Deletes a content entry.
    pub fn delete_content(&self, kind: ContentKind, id: &str) -> OperatorNotice {
        let result = self
            .require_role("delete content", &CONTENT_EDITORS)
            .and_then(|operator| self.delete_document(&operator, kind.collection(), id));
        notice_from(
            result,
            &format!("Deleted {}.", kind.noun()),
            &format!("Failed to delete {}.", kind.noun()),
        )
    }

    /// Persists, audits and delivers one device command.
    ///
    /// # Errors
    /// Returns [`AppError::CommandsDisabled`] when the kill switch is off,
    /// [`AppError::NotAuthenticated`] / [`AppError::Forbidden`] for auth
    /// failures and [`AppError::Command`] when confirmation or a durable
    /// write fails.
    pub fn dispatch_device_command(
        &self,
        action: DeviceAction,
        target: CommandTarget,
        confirmation: Option<ConfirmationToken>,
    ) -> Result<DispatchReport, AppError> {
        if !self.config.commands_enabled {
            warn!(stage = "command", action = "disabled", command = action.as_str());
            return Err(AppError::CommandsDisabled);
        }

        let operator = self.require_role("send device command", &DEVICE_OPERATORS)?;
        let mut request = CommandRequest::new(
            action,
            target,
            Requester {
                id: Some(operator.id.clone()),
                email: Some(operator.email.clone()),
            },
        )
        .at(self.clock.now());
        if let Some(token) = confirmation {
            request = request.confirmed(token);
        }

        Ok(self.dispatcher.dispatch(&request)?)
    }

    /// Operator-facing wrapper around
    /// [`DashboardSession::dispatch_device_command`].
    pub fn send_device_command(
        &self,
        action: DeviceAction,
        target: CommandTarget,
        confirmation: Option<ConfirmationToken>,
    ) -> OperatorNotice {
        match self.dispatch_device_command(action, target, confirmation) {
            Ok(report) => match report.delivery {
                DeliveryOutcome::Failed { .. } => OperatorNotice::warning(report.operator_message()),
                _ => OperatorNotice::success(report.operator_message()),
            },
            Err(AppError::CommandsDisabled) => {
                OperatorNotice::warning("Device commands are currently disabled.")
            }
            Err(error) => failure_notice(&error, &format!("Failed to send command {action}.")),
        }
    }

    fn update_fields(
        &self,
        operator: &StaffIdentity,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<(), AppError> {
        self.store.update(collection, id, data)?;
        info!(stage = "action", action = "update", collection, id, operator = %operator.id);
        Ok(())
    }

    fn delete_document(
        &self,
        operator: &StaffIdentity,
        collection: &str,
        id: &str,
    ) -> Result<(), AppError> {
        self.store.delete(collection, id)?;
        info!(stage = "action", action = "delete", collection, id, operator = %operator.id);
        Ok(())
    }

    fn delete_all_users_confirmed(
        &self,
        operator: &StaffIdentity,
        confirmation: BulkDeleteConfirmation,
    ) -> Result<(usize, usize), AppError> {
        if !confirmation.acknowledged_irreversible {
            return Err(AppError::InvalidInput(
                "Confirm that deleting every user cannot be undone.".to_string(),
            ));
        }

        let users = self.store.get_all(collections::USERS)?;
        if users.len() != confirmation.expected_count {
            return Err(AppError::InvalidInput(format!(
                "User list changed ({} users now); confirm again.",
                users.len()
            )));
        }

        let mut failed = 0;
        for user in &users {
            if let Err(error) = self.delete_document(operator, collections::USERS, &user.id) {
                error!(stage = "action", action = "delete_failed", id = %user.id,
                    error = %redact_sensitive(&error.to_string()));
                failed += 1;
            }
        }
        Ok((users.len() - failed, failed))
    }
}

fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn require_title(kind: ContentKind, entry: &Map<String, Value>) -> Result<(), AppError> {
    let title = entry
        .get(kind.title_field())
        .and_then(Value::as_str)
        .unwrap_or_default();
    if title.trim().is_empty() {
        return Err(AppError::InvalidInput(format!(
            "{} {} is required",
            kind.noun(),
            kind.title_field()
        )));
    }
    Ok(())
}

fn notice_from(result: Result<(), AppError>, success: &str, failure: &str) -> OperatorNotice {
    match result {
        Ok(()) => OperatorNotice::success(success),
        Err(error) => failure_notice(&error, failure),
    }
}

fn failure_notice(error: &AppError, failure: &str) -> OperatorNotice {
    error!(stage = "action", action = "failed", error = %redact_sensitive(&error.to_string()));
    match error {
        AppError::NotAuthenticated => OperatorNotice::error("Sign in to continue."),
        AppError::Forbidden { required, .. } => {
            OperatorNotice::error(format!("{failure} Requires: {required}."))
        }
        AppError::InvalidInput(message) => OperatorNotice::error(format!("{failure} {message}")),
        _ => OperatorNotice::error(failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_carry_required_fields() {
        for kind in [ContentKind::Station, ContentKind::Doctor, ContentKind::News] {
            assert!(kind.template().contains_key(kind.title_field()));
        }
        assert_eq!(
            ContentKind::Station.template().get("status"),
            Some(&Value::from(STATION_OPEN))
        );
    }

    #[test]
    fn blank_title_is_rejected() {
        let entry = fields([("title", Value::from("  "))]);
        assert!(matches!(
            require_title(ContentKind::News, &entry),
            Err(AppError::InvalidInput(_))
        ));
    }
}
