//! Integration tests for the explicit auth context lifecycle.

use std::sync::{Arc, Mutex};

use companion_auth::{
    AuthClient, AuthContext, AuthError, AuthState, Credentials, LoginResponse, StaticAuthProvider,
};
use companion_core::Role;

fn provider() -> Arc<StaticAuthProvider> {
    Arc::new(StaticAuthProvider::new().with_account(
        "admin@mycompanion.app",
        "admin123",
        LoginResponse {
            user_id: "u1".to_string(),
            email: "admin@mycompanion.app".to_string(),
            name: Some("Amara Nkosi".to_string()),
            role: "super_admin".to_string(),
            expires_in_seconds: 60,
        },
    ))
}

fn context_with(provider: Arc<StaticAuthProvider>) -> AuthContext {
    let client =
        AuthClient::new("https://auth.example.test/v1", provider).expect("client should build");
    AuthContext::new(client)
}

fn credentials(password: &str) -> Credentials {
    Credentials {
        email: "admin@mycompanion.app".to_string(),
        password: password.to_string(),
    }
}

#[test]
fn auth_context_lifecycle_tests_login_notifies_and_unsubscribe_stops_delivery() {
    let context = context_with(provider());
    context.restore(0).expect("restore should work");
    assert_eq!(context.state().unwrap(), AuthState::Unauthenticated);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = context
        .subscribe(move |state| sink.lock().unwrap().push(state.clone()))
        .expect("subscribe should work");

    let identity = context
        .login(&credentials("admin123"), 0)
        .expect("login should work");
    assert_eq!(identity.role, Role::SuperAdmin);
    assert!(context.has_role(&[Role::SuperAdmin, Role::Moderator], 1));
    assert_eq!(seen.lock().unwrap().len(), 1);

    assert!(context.unsubscribe(subscription));
    assert!(!context.unsubscribe(subscription));
    context.logout().expect("logout should work");
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(context.current_user(1).is_none());
}

#[test]
fn auth_context_lifecycle_tests_rejects_bad_password() {
    let context = context_with(provider());
    context.restore(0).expect("restore should work");

    let error = context.login(&credentials("nope"), 0).unwrap_err();
    assert_eq!(error, AuthError::InvalidCredentials);
    assert_eq!(error.to_string(), "Invalid email or password.");
    assert_eq!(context.state().unwrap(), AuthState::Unauthenticated);
}

#[test]
fn auth_context_lifecycle_tests_restores_persisted_session_until_expiry() {
    let shared = provider();
    let first = context_with(shared.clone());
    first
        .login(&credentials("admin123"), 0)
        .expect("login should work");

    let second = context_with(shared);
    second.restore(1_000).expect("restore should work");
    assert!(second.current_user(1_000).is_some());

    second.tick(61_000).expect("tick should work");
    assert_eq!(second.state().unwrap(), AuthState::ReauthRequired);
}
