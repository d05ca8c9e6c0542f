//! Auth-gated dashboard session.

use std::sync::Arc;

use companion_auth::{AuthContext, StaffIdentity};
use companion_commands::{CommandDispatcher, CommandTransport};
use companion_core::Role;
use companion_geocode::{Pacer, ReverseGeocoder, StaggeredGeocoder};
use companion_sync::DocumentStore;
use companion_views::{
    Clock, CyberSafetyView, DeviceLocatorView, EmergencyCallsView, LiveView, OverviewView,
    UsersDirectoryView, ViewSpec,
};
use tracing::{info, warn};

use crate::{AppConfig, AppError};

/// One operator's dashboard: auth context, store, clock and configuration.
pub struct DashboardSession {
    pub(crate) auth: Arc<AuthContext>,
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: AppConfig,
    pub(crate) dispatcher: CommandDispatcher,
}

impl DashboardSession {
    /// Creates a session without a live command transport.
    pub fn new(
        auth: Arc<AuthContext>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        config: AppConfig,
    ) -> Self {
        let dispatcher = CommandDispatcher::new(Arc::clone(&store));
        Self {
            auth,
            store,
            clock,
            config,
            dispatcher,
        }
    }

    /// Attaches the live delivery transport used after commands are persisted.
    pub fn with_transport(mut self, transport: Arc<dyn CommandTransport>) -> Self {
        self.dispatcher = CommandDispatcher::new(Arc::clone(&self.store)).with_transport(transport);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared auth context.
    pub fn auth(&self) -> &Arc<AuthContext> {
        &self.auth
    }

    /// Current epoch milliseconds according to the session clock.
    pub fn now_ms(&self) -> u64 {
        let millis = self.clock.now().unix_timestamp_nanos() / 1_000_000;
        u64::try_from(millis).unwrap_or(0)
    }

    /// Signed-in staff member.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] when nobody is signed in or the
    /// session has expired.
    pub fn operator(&self) -> Result<StaffIdentity, AppError> {
        let now_ms = self.now_ms();
        self.auth.tick(now_ms)?;
        self.auth
            .current_user(now_ms)
            .ok_or(AppError::NotAuthenticated)
    }

    /// Signed-in staff member holding one of `roles`.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] without a session and
    /// [`AppError::Forbidden`] when the role does not match.
    pub fn require_role(
        &self,
        action: &'static str,
        roles: &[Role],
    ) -> Result<StaffIdentity, AppError> {
        let operator = self.operator()?;
        if roles.contains(&operator.role) {
            return Ok(operator);
        }

        warn!(stage = "auth", action = "forbidden", refused = action, role = operator.role.as_str());
        Err(AppError::Forbidden {
            action,
            required: roles
                .iter()
                .map(|role| role.label().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Opens any view for the signed-in operator.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] without a session and
    /// [`AppError::View`] when subscriptions cannot be registered.
    pub fn open<S: ViewSpec>(&self, spec: S) -> Result<LiveView<S>, AppError> {
        let operator = self.operator()?;
        let name = spec.name();
        let view = LiveView::open(Arc::clone(&self.store), spec, Arc::clone(&self.clock))?;
        info!(stage = "session", action = "view_opened", view = name, operator = %operator.id);
        Ok(view)
    }

    /// Opens the overview.
    ///
    /// # Errors
    /// See [`DashboardSession::open`].
    pub fn overview(&self) -> Result<LiveView<OverviewView>, AppError> {
        self.open(OverviewView {
            trend_days: self.config.trend_days,
        })
    }

    /// Opens the emergency calls view.
    ///
    /// # Errors
    /// See [`DashboardSession::open`].
    pub fn emergency_calls(&self) -> Result<LiveView<EmergencyCallsView>, AppError> {
        self.open(EmergencyCallsView::new(
            self.config.trend_days,
            self.config.join_truncate,
        ))
    }

    /// Opens the device locator filtered by `search`.
    ///
    /// # Errors
    /// See [`DashboardSession::open`].
    pub fn device_locator(
        &self,
        search: impl Into<String>,
    ) -> Result<LiveView<DeviceLocatorView>, AppError> {
        self.open(DeviceLocatorView::with_search(search))
    }

    /// Opens the cyber safety view.
    ///
    /// # Errors
    /// See [`DashboardSession::open`].
    pub fn cyber_safety(&self) -> Result<LiveView<CyberSafetyView>, AppError> {
        self.open(CyberSafetyView {
            join_truncate: self.config.join_truncate,
        })
    }

    /// Opens the users directory.
    ///
    /// # Errors
    /// See [`DashboardSession::open`].
    pub fn users_directory(
        &self,
        search: impl Into<String>,
        role_filter: Option<Role>,
    ) -> Result<LiveView<UsersDirectoryView>, AppError> {
        self.open(UsersDirectoryView {
            search: search.into(),
            role_filter,
        })
    }

    /// Builds a paced place-name resolver for locator markers.
    pub fn geocoder(
        &self,
        geocoder: Arc<dyn ReverseGeocoder>,
        pacer: Arc<dyn Pacer>,
    ) -> StaggeredGeocoder {
        StaggeredGeocoder::new(geocoder, pacer, self.config.geocode())
    }
}
