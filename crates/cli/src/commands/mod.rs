pub mod config;
pub mod doctor;
pub mod event_value;
pub mod migrate;
pub mod seed;
pub mod status;

use serde::Serialize;
use signoff_core::config::{AppConfig, LoadOptions};
use signoff_core::InterfaceError;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Failure carrying the user-safe message of an interface error.
    pub fn from_interface(command: &str, error: &InterfaceError) -> Self {
        let exit_code = match error {
            InterfaceError::BadRequest { .. } => 7,
            InterfaceError::NotFound { .. } => 8,
            InterfaceError::ServiceUnavailable { .. } => 4,
            InterfaceError::Internal { .. } => 9,
        };
        Self::failure(
            command,
            error.error_class(),
            format!("{} ({error})", error.user_message()),
            exit_code,
        )
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::CommandResult;
    use signoff_core::ApplicationError;

    #[test]
    fn failure_payload_carries_error_class_and_exit_code() {
        let result = CommandResult::failure("migrate", "migration", "table exists", 5);
        let payload: serde_json::Value =
            serde_json::from_str(&result.output).expect("payload is json");

        assert_eq!(result.exit_code, 5);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "migration");
        assert_eq!(payload["message"], "table exists");
    }

    #[test]
    fn interface_errors_map_to_distinct_exit_codes() {
        let not_found = ApplicationError::not_found("workflow", "WfMissing01").into_interface("c1");
        let result = CommandResult::from_interface("status", &not_found);
        let payload: serde_json::Value =
            serde_json::from_str(&result.output).expect("payload is json");

        assert_eq!(result.exit_code, 8);
        assert_eq!(payload["error_class"], "not_found");
        assert!(payload["message"].as_str().is_some_and(|message| message.contains("WfMissing01")));

        let unavailable =
            ApplicationError::Persistence("disk I/O error".to_owned()).into_interface("c2");
        assert_eq!(CommandResult::from_interface("status", &unavailable).exit_code, 4);
    }
}
