use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use signoff_cli::commands::event_value::{self, EventValueArgs};
use signoff_cli::commands::status::{self, StatusArgs};
use signoff_cli::commands::{doctor, migrate, seed};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("SIGNOFF_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("SIGNOFF_DATABASE_URL", "postgres://localhost/dhis")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[("SIGNOFF_DATABASE_URL", "sqlite::memory:")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["status"], "ok");

        let message = first_payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("workflow WfMonthly01 for period 202403"));
        assert!(message.contains("users: admin, district, clerk"));

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        assert_eq!(first_payload["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn seeded_database_answers_status_and_event_value_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("signoff.db").display());

    with_env(&[("SIGNOFF_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "seed should succeed on a fresh file");

        let doctor_report = parse_payload(&doctor::run(true));
        assert_eq!(doctor_report["overall_status"], "pass", "{doctor_report}");

        let result = status::run(StatusArgs {
            workflow: "WfMonthly01".to_owned(),
            period: "202403".to_owned(),
            org_units: Vec::new(),
            level: None,
            attribute_combo: None,
            option_combos: Vec::new(),
            user: "district".to_owned(),
        });
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let report = parse_payload(&result.output);
        let statuses = report["statuses"].as_array().expect("statuses array");
        assert_eq!(statuses.len(), 4, "district sees two facilities and two shared combos");
        assert!(statuses.iter().all(|status| status["state"] == "UNAPPROVED_READY"));

        let stored = event_value::run(EventValueArgs {
            event: "EvVisit0001".to_owned(),
            data_element: "DeWeight001".to_owned(),
            value: "3.4".to_owned(),
            user: "clerk".to_owned(),
        });
        assert_eq!(parse_payload(&stored.output)["status"], "ok");

        let rejected = event_value::run(EventValueArgs {
            event: "EvVisit0001".to_owned(),
            data_element: "DeWeight001".to_owned(),
            value: "heavy".to_owned(),
            user: "clerk".to_owned(),
        });
        assert_eq!(rejected.exit_code, 7);
        assert_eq!(parse_payload(&rejected.output)["error_class"], "validation");
    });
}

#[test]
fn status_reports_unknown_workflow_as_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("signoff.db").display());

    with_env(&[("SIGNOFF_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = status::run(StatusArgs {
            workflow: "WfMissing01".to_owned(),
            period: "202403".to_owned(),
            org_units: Vec::new(),
            level: None,
            attribute_combo: None,
            option_combos: Vec::new(),
            user: "admin".to_owned(),
        });

        assert_eq!(result.exit_code, 8);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "status");
        assert_eq!(payload["error_class"], "not_found");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SIGNOFF_DATABASE_URL",
        "SIGNOFF_DATABASE_MAX_CONNECTIONS",
        "SIGNOFF_DATABASE_TIMEOUT_SECS",
        "SIGNOFF_APPROVAL_ACCEPTANCE_REQUIRED",
        "SIGNOFF_APPROVAL_CACHE_MAX_ENTRIES",
        "SIGNOFF_APPROVAL_CACHE_IDLE_SECS",
        "SIGNOFF_LOGGING_LEVEL",
        "SIGNOFF_LOGGING_FORMAT",
        "SIGNOFF_LOG_LEVEL",
        "SIGNOFF_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
