//! In-memory monitor service shared by the integration and BDD tests
//!
//! Implements `HttpClient` by interpreting the GraphQL documents the crate
//! sends: `getMonitors` listing and lookup, the per-type rule detail queries,
//! the monitor update mutations and schema introspection. Mutations really
//! change the stored records so tests can read them back. Rule mutations are
//! rejected unless their input carries every required field of the rule.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use monitor_bulk_edit::config::{ApiConfig, Config, RetryConfig};
use monitor_bulk_edit::credentials::{CredentialRequest, Credentials};
use monitor_bulk_edit::executor::GraphqlExecutor;
use monitor_bulk_edit::io::{HttpClient, HttpResponse};
use monitor_bulk_edit::prompt::Prompter;
use monitor_bulk_edit::{BulkEditError, Environment, RunOptions};
use serde_json::{json, Map, Value};

pub type ScriptedEnvironment = Environment<Cursor<Vec<u8>>, Vec<u8>>;

struct DetailQuery {
    field: &'static str,
    argument: &'static str,
    types: &'static [&'static str],
}

static DETAIL_QUERIES: [DetailQuery; 3] = [
    DetailQuery {
        field: "getCustomRule",
        argument: "ruleId",
        types: &["CUSTOM_SQL"],
    },
    DetailQuery {
        field: "getMetricMonitor",
        argument: "monitorUuid",
        types: &["METRIC", "STATS"],
    },
    DetailQuery {
        field: "getComparisonRule",
        argument: "ruleId",
        types: &["COMPARISON"],
    },
];

/// Rule mutation, its payload field and the input fields it requires
static RULE_MUTATIONS: [(&str, &str, &[&str]); 3] = [
    (
        "createOrUpdateCustomSqlRule",
        "customRule",
        &["uuid", "description", "dwId", "sql", "scheduleConfig", "alertConditions"],
    ),
    (
        "createOrUpdateMetricMonitor",
        "metricMonitor",
        &["uuid", "dwId", "scheduleConfig", "alertConditions"],
    ),
    (
        "createOrUpdateComparisonRule",
        "comparisonRule",
        &["uuid", "dwId", "scheduleConfig", "alertConditions", "comparisons"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    /// Every request fails at the transport level
    Transport,
    /// Every request gets this HTTP status
    Status(u16),
}

#[derive(Debug, Default)]
struct State {
    monitors: Vec<Value>,
    requests: Vec<Value>,
    failure: Option<Failure>,
    rejected_mutations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeMonitorService {
    state: Arc<Mutex<State>>,
}

impl FakeMonitorService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_monitor(&self, uuid: &str, monitor_type: &str) {
        let mut record = json!({
            "uuid": uuid,
            "monitorType": monitor_type,
            "name": format!("{} monitor {}", monitor_type.to_lowercase(), uuid),
            "description": "original",
            "dwId": "dw-1",
            "scheduleConfig": {
                "scheduleType": "FIXED",
                "intervalMinutes": 60,
                "startTime": "2023-01-01T00:00:00.000Z"
            },
            "alertConditions": [{"operator": "AUTO"}],
            "createdTime": "2023-01-01T00:00:00Z"
        });
        match monitor_type {
            "CUSTOM_SQL" => record["customSql"] = json!("select 1"),
            "COMPARISON" => record["comparisons"] = json!([{"metric": "ROW_COUNT", "operator": "GT", "threshold": 0}]),
            _ => {}
        }
        self.add_record(record);
    }

    pub fn add_record(&self, record: Value) {
        self.state.lock().unwrap().monitors.push(record);
    }

    /// Adds `count` monitors named `<prefix>-<i>`
    pub fn add_many(&self, prefix: &str, monitor_type: &str, count: usize) {
        for i in 0..count {
            self.add_monitor(&format!("{}-{}", prefix, i), monitor_type);
        }
    }

    pub fn fail_with(&self, failure: Failure) {
        self.state.lock().unwrap().failure = Some(failure);
    }

    /// Mutations with this root field report `success: false`
    pub fn reject_mutation(&self, field: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_mutations
            .push(field.to_string());
    }

    pub fn monitor(&self, uuid: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .monitors
            .iter()
            .find(|m| m["uuid"] == uuid)
            .cloned()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn mutation_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r["query"].as_str().is_some_and(|q| q.trim_start().starts_with("mutation")))
            .count()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.state.lock().unwrap().requests.clone()
    }

    fn handle(&self, body: &Value) -> Value {
        let query = body["query"].as_str().unwrap_or_default();
        let variables = &body["variables"];
        if query.contains("__schema") {
            json!({"data": schema()})
        } else if query.trim_start().starts_with("mutation") {
            self.mutate(query, variables)
        } else if let Some(field) = DETAIL_QUERIES.iter().find(|d| query.contains(&format!("{}(", d.field))) {
            let mut data = Map::new();
            data.insert(field.field.to_string(), self.details(field, variables));
            json!({ "data": data })
        } else if query.contains("getMonitors") {
            json!({"data": {"getMonitors": self.list(variables)}})
        } else {
            json!({"errors": [{"message": "unsupported operation"}]})
        }
    }

    fn list(&self, variables: &Value) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        if let Some(uuids) = variables["uuids"].as_array() {
            return state
                .monitors
                .iter()
                .filter(|m| uuids.contains(&m["uuid"]))
                .cloned()
                .collect();
        }
        let types = variables["monitorTypes"].as_array();
        let offset = variables["offset"].as_u64().unwrap_or(0) as usize;
        let limit = variables["limit"].as_u64().unwrap_or(u64::MAX) as usize;
        state
            .monitors
            .iter()
            .filter(|m| types.is_none_or(|t| t.contains(&m["monitorType"])))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Rule record projected to the fields its input mutation takes
    fn details(&self, query: &DetailQuery, variables: &Value) -> Value {
        let state = self.state.lock().unwrap();
        let uuid = &variables[query.argument];
        let Some(record) = state
            .monitors
            .iter()
            .find(|m| &m["uuid"] == uuid && query.types.iter().any(|t| m["monitorType"] == *t))
        else {
            return Value::Null;
        };
        let mut details = Map::new();
        for key in ["uuid", "description", "dwId", "scheduleConfig", "alertConditions", "comparisons"] {
            if let Some(value) = record.get(key) {
                details.insert(key.to_string(), value.clone());
            }
        }
        if let Some(sql) = record.get("customSql") {
            details.insert("sql".to_string(), sql.clone());
        }
        Value::Object(details)
    }

    fn mutate(&self, query: &str, variables: &Value) -> Value {
        let mut state = self.state.lock().unwrap();
        let mut data = Map::new();

        let root_uuid = variables["monitorUuid"].as_str().map(str::to_string);
        let input_uuid = variables["input"]["uuid"].as_str().map(str::to_string);
        let Some(uuid) = root_uuid.or(input_uuid) else {
            return json!({"errors": [{"message": "Variable \"$monitorUuid\" of required type \"UUID!\" was not provided."}]});
        };
        let rejected = state.rejected_mutations.clone();
        let Some(record) = state.monitors.iter_mut().find(|m| m["uuid"] == uuid.as_str()) else {
            return json!({"errors": [{"message": format!("Monitor {} does not exist", uuid)}]});
        };

        let mut apply = |field: &str, update: &dyn Fn(&mut Value)| -> Value {
            if rejected.iter().any(|r| r == field) {
                return json!({"success": false});
            }
            update(&mut *record);
            json!({"success": true})
        };

        if query.contains("updateMonitorDescription(") {
            let description = variables["description"].clone();
            let result = apply("updateMonitorDescription", &|r: &mut Value| r["description"] = description.clone());
            data.insert("updateMonitorDescription".into(), result);
        }
        if query.contains("updateMonitorsSchedules(") {
            let schedule = variables["scheduleConfig"].clone();
            let result = apply("updateMonitorsSchedules", &|r: &mut Value| r["scheduleConfig"] = schedule.clone());
            data.insert("updateMonitorsSchedules".into(), result);
        }
        for (field, payload, required) in RULE_MUTATIONS {
            if !query.contains(&format!("{}(", field)) {
                continue;
            }
            let input = variables["input"].clone();
            let missing: Vec<&str> = required
                .iter()
                .copied()
                .filter(|key| input.get(*key).is_none_or(Value::is_null))
                .collect();
            if !missing.is_empty() {
                return json!({"errors": [{"message": format!(
                    "Field {} of {} input is required but not provided",
                    missing.join(", "),
                    field
                )}]});
            }
            let result = apply(field, &|r: &mut Value| {
                for (key, stored) in [
                    ("description", "description"),
                    ("scheduleConfig", "scheduleConfig"),
                    ("alertConditions", "alertConditions"),
                    ("sql", "customSql"),
                    ("comparisons", "comparisons"),
                ] {
                    if let Some(value) = input.get(key) {
                        r[stored] = value.clone();
                    }
                }
            });
            let result = if result["success"] == true {
                let mut created = Map::new();
                created.insert(payload.to_string(), json!({"uuid": uuid}));
                Value::Object(created)
            } else {
                result
            };
            data.insert(field.into(), result);
        }

        json!({ "data": data })
    }
}

#[async_trait]
impl HttpClient for FakeMonitorService {
    async fn post_json(
        &self,
        _url: &str,
        headers: &[(&str, &str)],
        body: &Value,
        _timeout: Duration,
    ) -> monitor_bulk_edit::Result<HttpResponse> {
        let failure = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(body.clone());
            state.failure
        };
        match failure {
            Some(Failure::Transport) => {
                return Err(BulkEditError::Http("connection reset by peer".to_string()))
            }
            Some(Failure::Status(status)) => {
                return Ok(HttpResponse {
                    status,
                    body: "service unavailable".to_string(),
                })
            }
            None => {}
        }

        if !headers.contains(&("x-mcd-token", "test-token")) {
            return Ok(HttpResponse {
                status: 401,
                body: json!({"errors": [{"message": "Invalid credentials"}]}).to_string(),
            });
        }

        Ok(HttpResponse {
            status: 200,
            body: self.handle(body).to_string(),
        })
    }
}

fn schema() -> Value {
    json!({
        "__schema": {
            "queryType": {"name": "Query", "fields": [{"name": "getMonitors", "args": [{"name": "uuids"}]}]},
            "mutationType": {
                "name": "Mutation",
                "fields": [
                    {"name": "updateMonitorDescription", "args": [{"name": "monitorUuid"}, {"name": "description"}]},
                    {"name": "updateMonitorsSchedules", "args": [{"name": "monitorUuids"}, {"name": "scheduleConfig"}]},
                    {"name": "createWarehouse", "args": []}
                ]
            },
            "types": [
                {"name": "ScheduleConfigInput", "kind": "INPUT_OBJECT", "inputFields": [{"name": "scheduleType"}]},
                {"name": "CreateOrUpdateMetricMonitorInput", "kind": "INPUT_OBJECT", "inputFields": [{"name": "uuid"}, {"name": "alertConditions"}]}
            ]
        }
    })
}

/// Configuration with millisecond backoff so retry tests stay fast
pub fn test_config(max_retries: u32) -> Config {
    let mut config = Config::default();
    config.api = ApiConfig {
        endpoint: "https://monitors.test/graphql".to_string(),
        timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
    };
    config.repository.page_size = 10;
    config
}

pub fn credentials() -> Credentials {
    Credentials::new("test-id", "test-token")
}

pub fn executor(service: &FakeMonitorService, max_retries: u32) -> Arc<GraphqlExecutor> {
    Arc::new(GraphqlExecutor::new(
        &test_config(max_retries).api,
        credentials(),
        Arc::new(service.clone()),
    ))
}

pub fn options() -> RunOptions {
    RunOptions {
        credentials: CredentialRequest {
            mcd_id: Some("test-id".to_string()),
            mcd_token: Some("test-token".to_string()),
            profile: None,
        },
        ..Default::default()
    }
}

/// Environment answering prompts from `script`, clock fixed at 2023-05-01 09:30 UTC
pub fn environment(service: &FakeMonitorService, script: &str) -> ScriptedEnvironment {
    let mut env = Environment::new(
        Arc::new(service.clone()),
        Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new()),
    );
    env.now = Utc.with_ymd_and_hms(2023, 5, 1, 9, 30, 0).unwrap();
    env
}

pub fn transcript(env: &mut ScriptedEnvironment) -> String {
    String::from_utf8(env.prompter.writer().clone()).unwrap()
}
