//! Shared fixtures for app integration tests.

use std::sync::{Arc, Mutex};

use companion_app::{AppConfig, DashboardSession};
use companion_auth::{AuthClient, AuthContext, Credentials, LoginResponse, StaticAuthProvider};
use companion_sync::MemoryStore;
use companion_views::Clock;
use serde_json::json;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

/// Password shared by every fixture account.
#[allow(dead_code)]
pub const PASSWORD: &str = "fixture-password";

/// Clock the tests can move forward.
pub struct ManualClock(Mutex<OffsetDateTime>);

impl ManualClock {
    /// Clock at 2026-02-22 18:00 UTC.
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self(Mutex::new(datetime!(2026-02-22 18:00 UTC)))
    }

    /// Moves the clock forward.
    #[allow(dead_code)]
    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().expect("clock lock should not be poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.0.lock().expect("clock lock should not be poisoned")
    }
}

/// Session plus handles the tests poke at.
#[allow(dead_code)]
pub struct Fixture {
    pub session: DashboardSession,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

fn account(email: &str, role: &str) -> LoginResponse {
    LoginResponse {
        user_id: format!("staff-{role}"),
        email: email.to_string(),
        name: None,
        role: role.to_string(),
        expires_in_seconds: 3_600,
    }
}

/// Store seeded with two users and two stations.
#[allow(dead_code)]
pub fn seeded_store() -> MemoryStore {
    MemoryStore::new()
        .with_document(
            "users",
            "u1",
            json!({"name": "Amara Nkosi", "email": "amara@example.com", "role": "user",
                   "status": "active", "createdAt": "2026-01-05"}),
        )
        .with_document(
            "users",
            "u2",
            json!({"name": "Sipho Dlamini", "email": "sipho@example.com", "role": "moderator",
                   "status": "suspended", "createdAt": "2026-02-01"}),
        )
        .with_document("stations", "st1", json!({"name": "Soweto Police", "status": "Open"}))
        .with_document("stations", "st2", json!({"name": "Helen Joseph", "status": "Closed"}))
}

/// Session over `store` with `config`, not signed in.
#[allow(dead_code)]
pub fn fixture_with(store: MemoryStore, config: AppConfig) -> Fixture {
    let provider = StaticAuthProvider::new()
        .with_account("root@example.org", PASSWORD, account("root@example.org", "super_admin"))
        .with_account("mod@example.org", PASSWORD, account("mod@example.org", "moderator"))
        .with_account("cyber@example.org", PASSWORD, account("cyber@example.org", "cyber_admin"))
        .with_account("user@example.org", PASSWORD, account("user@example.org", "user"));
    let client = AuthClient::new(config.auth_endpoint.clone(), Arc::new(provider))
        .expect("fixture endpoint should be https");
    let auth = Arc::new(AuthContext::new(client));
    let store = Arc::new(store);
    let clock = Arc::new(ManualClock::new());
    let session = DashboardSession::new(auth, store.clone(), clock.clone(), config);
    Fixture {
        session,
        store,
        clock,
    }
}

/// Seeded session signed in as `email`.
#[allow(dead_code)]
pub fn signed_in(email: &str) -> Fixture {
    let fixture = fixture_with(seeded_store(), AppConfig::default());
    sign_in(&fixture, email);
    fixture
}

/// Signs `email` in on the fixture's auth context.
#[allow(dead_code)]
pub fn sign_in(fixture: &Fixture, email: &str) {
    let now_ms = fixture.session.now_ms();
    fixture
        .session
        .auth()
        .restore(now_ms)
        .expect("restore should succeed");
    fixture
        .session
        .auth()
        .login(
            &Credentials {
                email: email.to_string(),
                password: PASSWORD.to_string(),
            },
            now_ms,
        )
        .expect("fixture login should succeed");
}
