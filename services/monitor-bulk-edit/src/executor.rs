//! Safe GraphQL execution
//!
//! Every request to the monitor service goes through [`GraphqlExecutor`]. It
//! checks the document parses before sending anything, attaches credentials,
//! retries transport failures and 5xx responses with exponential backoff, and
//! normalizes 4xx responses and GraphQL `errors` payloads into
//! [`BulkEditError::Api`] without retrying them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::{ApiConfig, RetryConfig};
use crate::credentials::Credentials;
use crate::io::{HttpClient, HttpResponse};
use crate::BulkEditError;

/// Per-call request policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub timeout: Duration,
    pub max_retries: u32,
}

/// A GraphQL document with its variables
#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlRequest {
    pub document: String,
    pub variables: Value,
    /// Overrides the executor defaults when set
    pub options: Option<ExecuteOptions>,
}

impl GraphqlRequest {
    pub fn new(document: impl Into<String>, variables: Value) -> Self {
        Self {
            document: document.into(),
            variables,
            options: None,
        }
    }

    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Executes GraphQL requests and returns the response `data`
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, request: &GraphqlRequest) -> crate::Result<Value>;
}

/// Check a document is syntactically valid GraphQL
pub fn validate_document(document: &str) -> crate::Result<()> {
    async_graphql_parser::parse_query(document)
        .map(|_| ())
        .map_err(|e| BulkEditError::MalformedQuery(e.to_string()))
}

enum RetryState {
    Attempting { attempt: u32 },
    Backoff { attempt: u32, delay: Duration, last_error: String },
    Exhausted { attempts: u32, last_error: String },
    Succeeded(Value),
}

/// Production executor posting to the service's GraphQL endpoint
pub struct GraphqlExecutor {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    credentials: Credentials,
    defaults: ExecuteOptions,
    retry: RetryConfig,
}

impl std::fmt::Debug for GraphqlExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlExecutor")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl GraphqlExecutor {
    pub fn new(config: &ApiConfig, credentials: Credentials, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!(
            "Created GraphqlExecutor for {} using {}",
            config.endpoint,
            credentials.source()
        );
        Self {
            http,
            endpoint: config.endpoint.clone(),
            credentials,
            defaults: ExecuteOptions {
                timeout: config.timeout,
                max_retries: config.retry.max_retries,
            },
            retry: config.retry.clone(),
        }
    }

    pub fn default_options(&self) -> ExecuteOptions {
        self.defaults
    }

    async fn attempt(&self, body: &Value, timeout: Duration) -> crate::Result<Value> {
        let headers = self.credentials.headers();
        let response = self
            .http
            .post_json(&self.endpoint, &headers, body, timeout)
            .await?;
        interpret_response(response)
    }
}

#[async_trait]
impl QueryExecutor for GraphqlExecutor {
    async fn execute(&self, request: &GraphqlRequest) -> crate::Result<Value> {
        validate_document(&request.document)?;

        let options = request.options.unwrap_or(self.defaults);
        let body = json!({
            "query": request.document,
            "variables": request.variables,
        });
        tracing::trace!("GraphQL variables: {}", request.variables);

        let mut state = RetryState::Attempting { attempt: 1 };
        loop {
            state = match state {
                RetryState::Attempting { attempt } => {
                    tracing::debug!("GraphQL attempt {}/{}", attempt, options.max_retries + 1);
                    match self.attempt(&body, options.timeout).await {
                        Ok(data) => RetryState::Succeeded(data),
                        Err(e) if e.is_transient() && attempt <= options.max_retries => {
                            RetryState::Backoff {
                                attempt,
                                delay: self.retry.delay_for(attempt),
                                last_error: e.to_string(),
                            }
                        }
                        Err(e) if e.is_transient() => RetryState::Exhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        },
                        Err(e) => return Err(e),
                    }
                }
                RetryState::Backoff {
                    attempt,
                    delay,
                    last_error,
                } => {
                    tracing::warn!(
                        "GraphQL request failed ({}), retrying in {:?} ({}/{})",
                        last_error,
                        delay,
                        attempt,
                        options.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    RetryState::Attempting {
                        attempt: attempt + 1,
                    }
                }
                RetryState::Exhausted {
                    attempts,
                    last_error,
                } => {
                    return Err(BulkEditError::Transient {
                        attempts,
                        message: last_error,
                    });
                }
                RetryState::Succeeded(data) => return Ok(data),
            };
        }
    }
}

/// Map an HTTP response onto `data` or a normalized error
fn interpret_response(response: HttpResponse) -> crate::Result<Value> {
    let HttpResponse { status, body } = response;

    if status == 429 || status >= 500 {
        return Err(BulkEditError::Http(format!(
            "server returned HTTP {}: {}",
            status,
            body.trim()
        )));
    }

    if !(200..300).contains(&status) {
        let messages = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| error_messages(&v))
            .unwrap_or_else(|| vec![body.trim().to_string()]);
        return Err(BulkEditError::Api {
            status: Some(status),
            messages,
        });
    }

    let parsed: Value = serde_json::from_str(&body)
        .map_err(|e| BulkEditError::api(format!("response is not valid JSON: {}", e)))?;

    if let Some(messages) = error_messages(&parsed) {
        return Err(BulkEditError::Api {
            status: None,
            messages,
        });
    }

    match parsed.get("data") {
        Some(data) if !data.is_null() => Ok(data.clone()),
        _ => Err(BulkEditError::api("response contained no data")),
    }
}

/// Messages from a non-empty GraphQL `errors` array
fn error_messages(body: &Value) -> Option<Vec<String>> {
    let errors = body.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|e| match e.get("message").and_then(Value::as_str) {
                Some(message) => message.to_string(),
                None => e.to_string(),
            })
            .collect(),
    )
}
