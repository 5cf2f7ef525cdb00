//! Error types for the monitor bulk editor

use crate::monitor::MonitorType;

/// Errors that can occur while talking to the monitor service or applying updates
#[derive(Debug, thiserror::Error)]
pub enum BulkEditError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Malformed GraphQL query: {0}")]
    MalformedQuery(String),

    /// Network failure, timeout or 5xx that survived every retry
    #[error("Transient error after {attempts} attempt(s): {message}")]
    Transient { attempts: u32, message: String },

    /// 4xx response or GraphQL `errors` payload, messages kept verbatim
    #[error("API error{}: {}", status_suffix(.status), .messages.join("; "))]
    Api {
        status: Option<u16>,
        messages: Vec<String>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Monitor not found: {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Local template/type mismatches, caught before any request is sent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("field '{field}' cannot be updated on {monitor_type} monitors")]
    UnsupportedField {
        monitor_type: MonitorType,
        field: String,
    },

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("template has nothing to update")]
    EmptyTemplate,

    #[error("monitor type '{0}' is not supported")]
    UnsupportedMonitorType(String),
}

impl BulkEditError {
    pub fn api(message: impl Into<String>) -> Self {
        BulkEditError::Api {
            status: None,
            messages: vec![message.into()],
        }
    }

    /// Whether the executor should try the request again
    pub fn is_transient(&self) -> bool {
        matches!(self, BulkEditError::Http(_) | BulkEditError::Transient { .. })
    }

    /// Copy of this error, for reporting one request failure against several monitors
    pub fn duplicate(&self) -> Self {
        match self {
            BulkEditError::Authentication(m) => BulkEditError::Authentication(m.clone()),
            BulkEditError::MalformedQuery(m) => BulkEditError::MalformedQuery(m.clone()),
            BulkEditError::Transient { attempts, message } => BulkEditError::Transient {
                attempts: *attempts,
                message: message.clone(),
            },
            BulkEditError::Api { status, messages } => BulkEditError::Api {
                status: *status,
                messages: messages.clone(),
            },
            BulkEditError::Validation(e) => BulkEditError::Validation(e.clone()),
            BulkEditError::NotFound(m) => BulkEditError::NotFound(m.clone()),
            BulkEditError::Http(m) => BulkEditError::Http(m.clone()),
            BulkEditError::Config(m) => BulkEditError::Config(m.clone()),
            BulkEditError::Template(m) => BulkEditError::Template(m.clone()),
            BulkEditError::Io(e) => BulkEditError::Io(std::io::Error::new(e.kind(), e.to_string())),
            BulkEditError::Json(e) => BulkEditError::api(format!("invalid JSON: {}", e)),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

/// Result type alias for bulk edit operations
pub type Result<T> = std::result::Result<T, BulkEditError>;
