//! Command-line demo of the admin dashboard against an in-memory store.

use std::process::ExitCode;
use std::sync::Arc;

use companion_app::{AppConfig, AppError, DashboardSession, app_version, init_tracing};
use companion_auth::{AuthClient, AuthContext, Credentials, LoginResponse, StaticAuthProvider};
use companion_commands::{CommandTarget, DeviceAction};
use companion_sync::MemoryStore;
use companion_views::FixedClock;
use time::macros::datetime;

const DEMO_EMAIL: &str = "amara@example.com";
const DEMO_PASSWORD: &str = "demo-password";

fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid configuration: {error}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = init_tracing(&config.log_filter) {
        eprintln!("{error}");
    }

    println!("companion-admin {}", app_version());
    println!(
        "commands_enabled={} (COMPANION_ADMIN_COMMANDS_ENABLED)",
        config.commands_enabled
    );

    match run_demo(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("demo failed: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo(config: AppConfig) -> Result<(), AppError> {
    let provider = StaticAuthProvider::new().with_account(
        DEMO_EMAIL,
        DEMO_PASSWORD,
        LoginResponse {
            user_id: "u1".to_string(),
            email: DEMO_EMAIL.to_string(),
            name: Some("Amara Nkosi".to_string()),
            role: "super_admin".to_string(),
            expires_in_seconds: 3_600,
        },
    );
    let auth = Arc::new(AuthContext::new(AuthClient::new(
        config.auth_endpoint.clone(),
        Arc::new(provider),
    )?));
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock(datetime!(2026-02-22 18:00 UTC)));
    let session = DashboardSession::new(auth, store, clock, config);

    session.auth().restore(session.now_ms())?;
    let operator = session.auth().login(
        &Credentials {
            email: DEMO_EMAIL.to_string(),
            password: DEMO_PASSWORD.to_string(),
        },
        session.now_ms(),
    )?;
    println!("signed in as {} ({})", operator.email, operator.role.label());

    let migration = session.seed_demo_data()?;
    for line in &migration.log {
        println!("  {line}");
    }

    let overview = session.overview()?;
    if let Some(summary) = overview.output() {
        println!(
            "users={} active={} calls={} scam_reports={} high_risk={}",
            summary.total_users,
            summary.active_users,
            summary.emergency_calls,
            summary.scam_reports,
            summary.high_risk_reports
        );
    }

    let calls = session.emergency_calls()?;
    if let Some(summary) = calls.output() {
        for bucket in &summary.trend.buckets {
            println!("  {} total={}", bucket.label, bucket.total());
        }
        for row in summary.rows.iter().take(3) {
            println!("  {} {} {}", row.time, row.category.label(), row.caller.text());
        }
    }

    let notice = session.send_device_command(
        DeviceAction::Ring,
        CommandTarget {
            user_id: "u7".to_string(),
            user_email: Some("kagiso@example.com".to_string()),
        },
        None,
    );
    println!("{notice}");

    calls.close()?;
    overview.close()?;
    session.auth().logout()?;
    Ok(())
}
