use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;

/// One row of the structured command execution log.
#[derive(Serialize, Debug)]
pub struct ExecutionRecord<'a> {
    pub user_id: i64,
    pub user_name: &'a str,
    pub channel_id: Option<i64>,
    pub platform_id: Option<i64>,
    pub command_id: i64,
    pub invocation: &'a str,
    pub args: &'a [String],
    pub started_at: DateTime<Utc>,
    pub execution_time_ms: u64,
    pub success: bool,
    pub result: Option<&'a str>,
}

/// Sink for successful command executions.
pub trait ExecutionLogger: Send + Sync {
    fn log(&self, record: &ExecutionRecord<'_>);
}

/// Sink for internal faults. Returns the correlation ID that is embedded in
/// the user-facing failure reply instead of any error detail.
pub trait SystemLogger: Send + Sync {
    fn send_error(&self, origin: &str, error: &Error, context: &str) -> Uuid;
}

/// Default execution logger: one info line per execution with the record
/// serialized as JSON.
pub struct LogExecutionLogger;

impl ExecutionLogger for LogExecutionLogger {
    fn log(&self, record: &ExecutionRecord<'_>) {
        match serde_json::to_string(record) {
            Ok(serialized) => info!("command executed: {}", serialized),
            Err(err) => warn!("execution record failed to serialize: {}", err),
        }
    }
}

/// Default system logger: logs the error and hands back a fresh v4 UUID.
pub struct LogSystemLogger;

impl SystemLogger for LogSystemLogger {
    fn send_error(&self, origin: &str, error: &Error, context: &str) -> Uuid {
        let correlation = Uuid::new_v4();
        error!(
            "[{}] error {}: {} (context: {})",
            origin, correlation, error, context
        );
        correlation
    }
}
