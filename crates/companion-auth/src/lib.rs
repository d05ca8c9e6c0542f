#![warn(missing_docs)]
//! # companion-auth
//!
//! ## Purpose
//! Implements staff authentication and the explicit auth context handed to
//! dashboard views.
//!
//! ## Responsibilities
//! - Validate auth endpoint policy (HTTPS only).
//! - Execute login through an injectable [`AuthProvider`].
//! - Model session transitions (restore, login, expiry, logout) in
//!   [`AuthStateMachine`].
//! - Publish state changes to subscribers registered on [`AuthContext`], with
//!   an explicit unsubscribe.
//!
//! ## Data flow
//! Login form -> [`AuthContext::login`] -> [`AuthClient::login`] ->
//! [`AuthProvider::sign_in`] -> [`StaffSession`] -> [`AuthStateMachine`] ->
//! subscriber callbacks.
//!
//! ## Ownership and lifetimes
//! Identities and sessions are owned values so views can keep a copy after the
//! context changes state.
//!
//! ## Error model
//! Endpoint policy violations, blank or rejected credentials, and provider
//! failures surface as [`AuthError`].
//!
//! ## Security and privacy notes
//! This crate never logs credentials. Login events log the staff id only.
//!
//! ## Example
//! ```rust
//! use companion_auth::{AuthState, AuthStateMachine};
//!
//! let machine = AuthStateMachine::new();
//! assert!(matches!(machine.state(), AuthState::Restoring));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use companion_core::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Operator-facing message for rejected credentials.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password.";

/// Staff login credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Staff email.
    pub email: String,
    /// Staff password.
    pub password: String,
}

/// Login request forwarded to the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Staff email.
    pub email: String,
    /// Staff password.
    pub password: String,
}

/// Identity payload returned by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Provider-issued staff id.
    pub user_id: String,
    /// Verified staff email.
    pub email: String,
    /// Display name, when the provider knows one.
    #[serde(default)]
    pub name: Option<String>,
    /// Stored role string.
    pub role: String,
    /// Session lifetime in seconds.
    pub expires_in_seconds: u64,
}

/// Authenticated staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffIdentity {
    /// Staff id.
    pub id: String,
    /// Staff email.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Staff role.
    pub role: Role,
}

/// Staff session with absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffSession {
    /// Identity the session belongs to.
    pub identity: StaffIdentity,
    /// Absolute epoch milliseconds when the session expires.
    pub expires_at_ms: u64,
}

impl StaffSession {
    /// Builds a session from a provider response observed at `now_ms`.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidResponse`] when id or email is blank.
    pub fn from_response(response: LoginResponse, now_ms: u64) -> Result<Self, AuthError> {
        if response.user_id.trim().is_empty() || response.email.trim().is_empty() {
            return Err(AuthError::InvalidResponse(
                "response missing user id or email".to_string(),
            ));
        }

        let expires_at_ms = now_ms.saturating_add(response.expires_in_seconds.saturating_mul(1000));
        Ok(Self {
            identity: StaffIdentity {
                id: response.user_id,
                email: response.email,
                name: response.name,
                role: Role::parse(Some(&response.role)),
            },
            expires_at_ms,
        })
    }

    /// Returns `true` when the session has expired at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Auth state observed by views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Persisted session lookup has not finished yet.
    Restoring,
    /// No session exists.
    Unauthenticated,
    /// Session is valid.
    Authenticated(StaffSession),
    /// Session expired; staff must log in again.
    ReauthRequired,
}

/// Auth state machine with explicit legal transitions.
#[derive(Debug, Clone)]
pub struct AuthStateMachine {
    state: AuthState,
}

impl AuthStateMachine {
    /// Creates a machine in the `Restoring` state.
    pub fn new() -> Self {
        Self {
            state: AuthState::Restoring,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Completes restoration with whatever session was persisted.
    pub fn on_restored(&mut self, session: Option<StaffSession>, now_ms: u64) {
        if !matches!(self.state, AuthState::Restoring) {
            return;
        }

        self.state = match session {
            Some(session) if !session.is_expired(now_ms) => AuthState::Authenticated(session),
            Some(_) => AuthState::ReauthRequired,
            None => AuthState::Unauthenticated,
        };
    }

    /// Applies a login success.
    pub fn on_login_success(&mut self, session: StaffSession) {
        self.state = AuthState::Authenticated(session);
    }

    /// Re-evaluates the state against session expiry.
    pub fn on_tick(&mut self, now_ms: u64) {
        if let AuthState::Authenticated(session) = &self.state
            && session.is_expired(now_ms)
        {
            self.state = AuthState::ReauthRequired;
        }
    }

    /// Explicit logout.
    pub fn logout(&mut self) {
        self.state = AuthState::Unauthenticated;
    }

    /// Returns the session when it is valid at `now_ms`.
    pub fn session(&self, now_ms: u64) -> Option<&StaffSession> {
        match &self.state {
            AuthState::Authenticated(session) if !session.is_expired(now_ms) => Some(session),
            _ => None,
        }
    }
}

impl Default for AuthStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// External identity provider.
pub trait AuthProvider: Send + Sync {
    /// Verifies credentials against the provider.
    fn sign_in(&self, endpoint: &str, request: &LoginRequest)
    -> Result<LoginResponse, AuthError>;

    /// Ends the provider-side session.
    fn sign_out(&self) -> Result<(), AuthError>;

    /// Returns a persisted session from a previous run, if any.
    fn restore(&self) -> Result<Option<LoginResponse>, AuthError>;
}

/// Auth client that validates endpoint policy and executes login.
#[derive(Clone)]
pub struct AuthClient {
    endpoint: String,
    provider: Arc<dyn AuthProvider>,
}

impl AuthClient {
    /// Creates a validated auth client.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidEndpoint`] when the URL is not HTTPS.
    pub fn new(
        endpoint: impl Into<String>,
        provider: Arc<dyn AuthProvider>,
    ) -> Result<Self, AuthError> {
        let endpoint = endpoint.into();
        validate_https_endpoint(&endpoint)?;
        Ok(Self { endpoint, provider })
    }

    /// Executes login and converts the provider response into a session.
    ///
    /// # Errors
    /// Returns [`AuthError::EmptyCredential`] for blank input and propagates
    /// provider errors unchanged.
    pub fn login(&self, credentials: &Credentials, now_ms: u64) -> Result<StaffSession, AuthError> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(AuthError::EmptyCredential);
        }

        let response = self.provider.sign_in(
            &self.endpoint,
            &LoginRequest {
                email: credentials.email.trim().to_string(),
                password: credentials.password.clone(),
            },
        )?;

        StaffSession::from_response(response, now_ms)
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the underlying provider.
    pub fn provider(&self) -> &Arc<dyn AuthProvider> {
        &self.provider
    }
}

/// Identifier returned by [`AuthContext::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthSubscription(u64);

type AuthListener = Arc<dyn Fn(&AuthState) + Send + Sync>;

/// Explicit auth context passed to views.
///
/// Replaces ambient global auth state: views receive the context, subscribe to
/// changes, and must unsubscribe on teardown.
pub struct AuthContext {
    client: AuthClient,
    machine: Mutex<AuthStateMachine>,
    listeners: Mutex<Vec<(AuthSubscription, AuthListener)>>,
    next_subscription: AtomicU64,
}

impl AuthContext {
    /// Creates a context in the `Restoring` state.
    pub fn new(client: AuthClient) -> Self {
        Self {
            client,
            machine: Mutex::new(AuthStateMachine::new()),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Returns a snapshot of the current state.
    ///
    /// # Errors
    /// Returns [`AuthError::StatePoisoned`] when the state lock is poisoned.
    pub fn state(&self) -> Result<AuthState, AuthError> {
        Ok(self.lock_machine()?.state().clone())
    }

    /// Restores a persisted session, leaving `Restoring`.
    ///
    /// A provider failure here is logged and treated as "no session".
    ///
    /// # Errors
    /// Returns [`AuthError::StatePoisoned`] when the state lock is poisoned.
    pub fn restore(&self, now_ms: u64) -> Result<(), AuthError> {
        let session = match self.client.provider().restore() {
            Ok(Some(response)) => match StaffSession::from_response(response, now_ms) {
                Ok(session) => Some(session),
                Err(error) => {
                    warn!(stage = "auth", action = "restore_rejected", error = %error);
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                warn!(stage = "auth", action = "restore_failed", error = %error);
                None
            }
        };

        self.transition(|machine| machine.on_restored(session, now_ms))
    }

    /// Logs in and returns the authenticated identity.
    ///
    /// # Errors
    /// Propagates [`AuthClient::login`] errors; the state is left unchanged.
    pub fn login(&self, credentials: &Credentials, now_ms: u64) -> Result<StaffIdentity, AuthError> {
        let session = match self.client.login(credentials, now_ms) {
            Ok(session) => session,
            Err(error) => {
                warn!(stage = "auth", action = "login_failed", error = %error);
                return Err(error);
            }
        };

        let identity = session.identity.clone();
        info!(stage = "auth", action = "login_success", staff_id = %identity.id);
        self.transition(|machine| machine.on_login_success(session))?;
        Ok(identity)
    }

    /// Logs out. Provider sign-out failures are logged; local state is
    /// cleared regardless.
    ///
    /// # Errors
    /// Returns [`AuthError::StatePoisoned`] when the state lock is poisoned.
    pub fn logout(&self) -> Result<(), AuthError> {
        if let Err(error) = self.client.provider().sign_out() {
            warn!(stage = "auth", action = "sign_out_failed", error = %error);
        }
        self.transition(AuthStateMachine::logout)
    }

    /// Re-evaluates session expiry.
    ///
    /// # Errors
    /// Returns [`AuthError::StatePoisoned`] when the state lock is poisoned.
    pub fn tick(&self, now_ms: u64) -> Result<(), AuthError> {
        self.transition(|machine| machine.on_tick(now_ms))
    }

    /// Returns the signed-in identity when the session is valid.
    pub fn current_user(&self, now_ms: u64) -> Option<StaffIdentity> {
        let machine = self.lock_machine().ok()?;
        machine
            .session(now_ms)
            .map(|session| session.identity.clone())
    }

    /// Returns `true` when the signed-in staff member holds one of `roles`.
    pub fn has_role(&self, roles: &[Role], now_ms: u64) -> bool {
        self.current_user(now_ms)
            .is_some_and(|identity| roles.contains(&identity.role))
    }

    /// Registers a state-change listener.
    ///
    /// # Errors
    /// Returns [`AuthError::StatePoisoned`] when the listener lock is poisoned.
    pub fn subscribe(
        &self,
        listener: impl Fn(&AuthState) + Send + Sync + 'static,
    ) -> Result<AuthSubscription, AuthError> {
        let subscription = AuthSubscription(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .map_err(|_| AuthError::StatePoisoned)?
            .push((subscription, Arc::new(listener)));
        Ok(subscription)
    }

    /// Removes a listener. Returns `false` when it was already removed.
    pub fn unsubscribe(&self, subscription: AuthSubscription) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    fn transition(&self, apply: impl FnOnce(&mut AuthStateMachine)) -> Result<(), AuthError> {
        let (before, after) = {
            let mut machine = self.lock_machine()?;
            let before = machine.state().clone();
            apply(&mut machine);
            (before, machine.state().clone())
        };

        if before != after {
            self.notify(&after);
        }
        Ok(())
    }

    fn notify(&self, state: &AuthState) {
        let listeners: Vec<AuthListener> = match self.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|(_, listener)| listener.clone()).collect(),
            Err(_) => return,
        };

        for listener in listeners {
            listener(state);
        }
    }

    fn lock_machine(&self) -> Result<std::sync::MutexGuard<'_, AuthStateMachine>, AuthError> {
        self.machine.lock().map_err(|_| AuthError::StatePoisoned)
    }
}

/// In-process provider backed by a fixed account list, for demos and tests.
#[derive(Debug, Default)]
pub struct StaticAuthProvider {
    accounts: Vec<(String, String, LoginResponse)>,
    persisted: Mutex<Option<LoginResponse>>,
}

impl StaticAuthProvider {
    /// Creates a provider with no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account.
    pub fn with_account(
        mut self,
        email: impl Into<String>,
        password: impl Into<String>,
        response: LoginResponse,
    ) -> Self {
        self.accounts.push((email.into(), password.into(), response));
        self
    }
}

impl AuthProvider for StaticAuthProvider {
    fn sign_in(
        &self,
        _endpoint: &str,
        request: &LoginRequest,
    ) -> Result<LoginResponse, AuthError> {
        let response = self
            .accounts
            .iter()
            .find(|(email, password, _)| {
                email.eq_ignore_ascii_case(&request.email) && *password == request.password
            })
            .map(|(_, _, response)| response.clone())
            .ok_or(AuthError::InvalidCredentials)?;

        if let Ok(mut persisted) = self.persisted.lock() {
            *persisted = Some(response.clone());
        }
        Ok(response)
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        let mut persisted = self.persisted.lock().map_err(|_| AuthError::StatePoisoned)?;
        *persisted = None;
        Ok(())
    }

    fn restore(&self) -> Result<Option<LoginResponse>, AuthError> {
        Ok(self
            .persisted
            .lock()
            .map_err(|_| AuthError::StatePoisoned)?
            .clone())
    }
}

/// Validates that `endpoint` is an absolute HTTPS URL.
///
/// # Errors
/// Returns [`AuthError::InvalidEndpoint`] for unparsable or non-HTTPS URLs.
pub fn validate_https_endpoint(endpoint: &str) -> Result<(), AuthError> {
    let parsed = Url::parse(endpoint)
        .map_err(|error| AuthError::InvalidEndpoint(format!("invalid url: {error}")))?;

    if parsed.scheme() != "https" {
        return Err(AuthError::InvalidEndpoint(
            "endpoint must use https".to_string(),
        ));
    }

    Ok(())
}

/// Errors produced by auth client and context logic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Endpoint violates transport policy.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Email or password is blank.
    #[error("email and password must be non-empty")]
    EmptyCredential,
    /// Provider rejected the credentials.
    #[error("Invalid email or password.")]
    InvalidCredentials,
    /// Provider could not be reached.
    #[error("auth provider failure: {0}")]
    Transport(String),
    /// Provider response violated the contract.
    #[error("invalid auth response: {0}")]
    InvalidResponse(String),
    /// Internal state lock was poisoned by a panicking listener.
    #[error("auth state is unavailable")]
    StatePoisoned,
}
