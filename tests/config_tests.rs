use std::env;

use serial_test::serial;
use staffroom::config::StaffroomConfig;

const VARS: &[&str] = &[
    "STAFFROOM_SERVER_PORT",
    "STAFFROOM_DATABASE_TYPE",
    "STAFFROOM_DATABASE_URL",
    "STAFFROOM_LOG_LEVEL",
    "STAFFROOM_AUTH_ENABLED",
    "STAFFROOM_JWT_SECRET",
    "STAFFROOM_MAX_CANDIDATES",
    "STAFFROOM_JOBS_ENABLED",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn loads_defaults_without_overrides() {
    clear_env();

    let config = StaffroomConfig::load().unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.database.db_type, "sqlite");
    assert!(!config.auth.enabled);
    assert!(!config.jobs.enabled);
    assert_eq!(config.jobs.notification_retention_days, 30);
}

#[test]
#[serial]
fn environment_overrides_file_and_defaults() {
    clear_env();
    env::set_var("STAFFROOM_SERVER_PORT", "9191");
    env::set_var("STAFFROOM_DATABASE_URL", "sqlite::memory:");
    env::set_var("STAFFROOM_LOG_LEVEL", "debug");
    env::set_var("STAFFROOM_MAX_CANDIDATES", "5");
    env::set_var("STAFFROOM_JOBS_ENABLED", "true");

    let config = StaffroomConfig::load().unwrap();
    clear_env();

    assert_eq!(config.server.port, 9191);
    assert_eq!(config.database_url(), "sqlite::memory:");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.substitutions.max_candidates, 5);
    assert!(config.jobs.enabled);
}

#[test]
#[serial]
fn postgres_url_only_applies_to_postgres() {
    clear_env();
    env::set_var("STAFFROOM_DATABASE_TYPE", "postgres");
    env::set_var("STAFFROOM_DATABASE_URL", "postgres://db.internal/staffroom");

    let config = StaffroomConfig::load().unwrap();
    clear_env();

    assert_eq!(config.database_url(), "postgres://db.internal/staffroom");
    assert_eq!(config.database.sqlite_url, "sqlite://staffroom.db");
}

#[test]
#[serial]
fn auth_without_secret_fails_validation() {
    clear_env();
    env::set_var("STAFFROOM_AUTH_ENABLED", "true");

    let config = StaffroomConfig::load().unwrap();
    let err = config.validate().unwrap_err();

    env::set_var("STAFFROOM_JWT_SECRET", "a-long-enough-secret");
    let config = StaffroomConfig::load().unwrap();
    clear_env();

    assert!(err.to_string().contains("jwt_secret"));
    assert!(config.validate().is_ok());
}
