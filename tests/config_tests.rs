use console_rbac::{AppConfig, config::{Env, parse_id_list}};
use serial_test::serial;
use std::{collections::BTreeSet, env, panic};

const VARS: [&str; 6] = [
    "APP_ENV",
    "DATABASE_URL",
    "JWT_SECRET",
    "BIND_ADDR",
    "ROOT_AUTHORITY_ID",
    "BOOTSTRAP_MENU_IDS",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with the given variables set (and every other config variable
/// cleared), restoring the original environment afterwards.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> =
        VARS.iter().map(|&var| (var, env::var(var).ok())).collect();

    unsafe {
        for var in VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original) in originals {
        unsafe {
            match original {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_local_defaults() {
    let config = run_with_env(&[("DATABASE_URL", "postgres://u:p@localhost/rbac")], AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.db_url, "postgres://u:p@localhost/rbac");
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.root_authority_id, 888);
    assert_eq!(config.bootstrap_menu_ids, BTreeSet::from([1, 2]));
    assert!(!config.jwt_secret.is_empty());
}

#[test]
#[serial]
fn test_overrides_are_read() {
    let config = run_with_env(
        &[
            ("DATABASE_URL", "postgres://db"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("ROOT_AUTHORITY_ID", "1"),
            ("BOOTSTRAP_MENU_IDS", "5, 7,,9"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.bind_addr, "127.0.0.1:8080");
    let policy = config.menu_policy();
    assert_eq!(policy.root_authority_id, 1);
    assert_eq!(policy.bootstrap_menu_ids, BTreeSet::from([5, 7, 9]));
}

#[test]
#[serial]
fn test_production_requires_jwt_secret() {
    let result = panic::catch_unwind(|| {
        run_with_env(
            &[("APP_ENV", "production"), ("DATABASE_URL", "postgres://db")],
            AppConfig::load,
        )
    });
    assert!(result.is_err(), "production must not start without JWT_SECRET");

    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://db"),
            ("JWT_SECRET", "prod-secret"),
        ],
        AppConfig::load,
    );
    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
}

#[test]
#[serial]
fn test_missing_database_url_fails_fast() {
    let result = panic::catch_unwind(|| run_with_env(&[], AppConfig::load));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_malformed_bootstrap_ids_fail_fast() {
    let result = panic::catch_unwind(|| {
        run_with_env(
            &[("DATABASE_URL", "postgres://db"), ("BOOTSTRAP_MENU_IDS", "1,two")],
            AppConfig::load,
        )
    });
    assert!(result.is_err());
}

#[test]
fn test_parse_id_list() {
    assert_eq!(parse_id_list("").unwrap(), BTreeSet::new());
    assert_eq!(parse_id_list(" 3 ,1,3").unwrap(), BTreeSet::from([1, 3]));
    assert!(parse_id_list("x").is_err());
}

#[test]
fn test_default_config_matches_default_policy() {
    let config = AppConfig::default();
    assert_eq!(config.env, Env::Local);
    assert_eq!(config.menu_policy(), console_rbac::MenuPolicy::default());
}
