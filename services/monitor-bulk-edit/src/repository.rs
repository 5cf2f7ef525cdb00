//! Monitor listing and lookup
//!
//! Listing pages through `getMonitors` by offset until a short page or the
//! requested limit. UUID filters bypass paging and are fetched in fixed-size
//! chunks, one request per chunk. Rule updates need the full per-type record,
//! which comes from the type's own detail query.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Map, Value};

use crate::config::RepositoryConfig;
use crate::error::ValidationError;
use crate::executor::{GraphqlRequest, QueryExecutor};
use crate::monitor::{Monitor, MonitorType};
use crate::BulkEditError;

const MONITOR_FIELDS: &str = "uuid
    monitorType
    name
    description
    scheduleConfig { scheduleType intervalMinutes startTime cronExpression }
    createdTime
    consolidatedMonitorStatus";

fn list_query() -> String {
    format!(
        "query listMonitors($limit: Int, $offset: Int, $monitorTypes: [UserDefinedMonitors]) {{
  getMonitors(limit: $limit, offset: $offset, monitorTypes: $monitorTypes) {{
    {}
  }}
}}",
        MONITOR_FIELDS
    )
}

fn uuid_query() -> String {
    format!(
        "query monitorsByUuid($uuids: [String]) {{
  getMonitors(uuids: $uuids) {{
    {}
  }}
}}",
        MONITOR_FIELDS
    )
}

/// Query for the record a type's create-or-update mutation takes as input
struct DetailQuery {
    document: &'static str,
    root_field: &'static str,
    argument: &'static str,
}

static CUSTOM_RULE_DETAILS: DetailQuery = DetailQuery {
    document: "query customRuleDetails($ruleId: String!) {
  getCustomRule(ruleId: $ruleId) {
    uuid
    description
    dwId
    sql: customSql
    scheduleConfig { scheduleType intervalMinutes startTime cronExpression }
    alertConditions
  }
}",
    root_field: "getCustomRule",
    argument: "ruleId",
};

static METRIC_MONITOR_DETAILS: DetailQuery = DetailQuery {
    document: "query metricMonitorDetails($monitorUuid: UUID!) {
  getMetricMonitor(monitorUuid: $monitorUuid) {
    uuid
    description
    dwId
    scheduleConfig { scheduleType intervalMinutes startTime cronExpression }
    alertConditions
  }
}",
    root_field: "getMetricMonitor",
    argument: "monitorUuid",
};

static COMPARISON_RULE_DETAILS: DetailQuery = DetailQuery {
    document: "query comparisonRuleDetails($ruleId: String!) {
  getComparisonRule(ruleId: $ruleId) {
    uuid
    description
    dwId
    scheduleConfig { scheduleType intervalMinutes startTime cronExpression }
    alertConditions
    comparisons { comparisonType metric operator threshold }
  }
}",
    root_field: "getComparisonRule",
    argument: "ruleId",
};

fn detail_query(monitor_type: MonitorType) -> Option<&'static DetailQuery> {
    match monitor_type {
        MonitorType::Validation => None,
        MonitorType::CustomSql => Some(&CUSTOM_RULE_DETAILS),
        MonitorType::Metric | MonitorType::Stats => Some(&METRIC_MONITOR_DETAILS),
        MonitorType::Comparison => Some(&COMPARISON_RULE_DETAILS),
    }
}

/// Which monitors to list; `uuids` overrides the other two
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorFilter {
    pub monitor_type: Option<MonitorType>,
    pub limit: Option<usize>,
    pub uuids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
struct PageCursor {
    offset: usize,
    remaining: Option<usize>,
}

/// Reads monitor records through the executor
pub struct MonitorRepository {
    executor: Arc<dyn QueryExecutor>,
    page_size: usize,
    chunk_size: usize,
}

impl MonitorRepository {
    pub fn new(executor: Arc<dyn QueryExecutor>, config: &RepositoryConfig) -> Self {
        Self {
            executor,
            page_size: config.page_size.max(1),
            chunk_size: config.uuid_chunk_size.max(1),
        }
    }

    /// Lazily list monitors matching `filter`
    ///
    /// Each call starts a fresh listing. A failing page ends the listing after
    /// yielding its error; a failing UUID chunk yields its error and the
    /// remaining chunks are still fetched. A record that cannot be decoded is
    /// yielded as its own error next to the good records of its page.
    pub fn list(&self, filter: &MonitorFilter) -> BoxStream<'static, crate::Result<Monitor>> {
        match &filter.uuids {
            Some(uuids) => self.list_by_uuid(uuids.clone()),
            None => self.list_pages(filter.monitor_type, filter.limit),
        }
    }

    fn list_by_uuid(&self, uuids: Vec<String>) -> BoxStream<'static, crate::Result<Monitor>> {
        let executor = Arc::clone(&self.executor);
        let chunks: Vec<Vec<String>> = uuids.chunks(self.chunk_size).map(<[String]>::to_vec).collect();
        tracing::debug!("Fetching {} monitor(s) in {} chunk(s)", uuids.len(), chunks.len());

        stream::iter(chunks)
            .then(move |chunk| {
                let executor = Arc::clone(&executor);
                async move {
                    match fetch_chunk(executor.as_ref(), &chunk).await {
                        Ok(entries) => entries.into_iter().filter_map(Entry::into_item).collect(),
                        Err(e) => {
                            tracing::warn!("Failed to fetch {} monitor(s): {}", chunk.len(), e);
                            vec![Err(e)]
                        }
                    }
                }
            })
            .flat_map(stream::iter)
            .boxed()
    }

    fn list_pages(
        &self,
        monitor_type: Option<MonitorType>,
        limit: Option<usize>,
    ) -> BoxStream<'static, crate::Result<Monitor>> {
        let executor = Arc::clone(&self.executor);
        let page_size = self.page_size;
        let start = PageCursor {
            offset: 0,
            remaining: limit,
        };

        stream::unfold(Some(start), move |cursor| {
            let executor = Arc::clone(&executor);
            async move {
                let cursor = cursor?;
                let wanted = cursor.remaining.map_or(page_size, |r| r.min(page_size));
                if wanted == 0 {
                    return None;
                }

                let page = match fetch_page(executor.as_ref(), monitor_type, wanted, cursor.offset).await {
                    Ok(page) => page,
                    Err(e) => {
                        tracing::warn!("Failed to list monitors at offset {}: {}", cursor.offset, e);
                        return Some((vec![Err(e)], None));
                    }
                };

                let mut items: Vec<crate::Result<Monitor>> =
                    page.entries.into_iter().filter_map(Entry::into_item).collect();
                items.truncate(wanted);
                let remaining = cursor.remaining.map(|r| r - items.len());
                let next = if page.raw_len < wanted || remaining == Some(0) {
                    None
                } else {
                    Some(PageCursor {
                        offset: cursor.offset + page.raw_len,
                        remaining,
                    })
                };
                Some((items, next))
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }

    /// Fetch a single monitor
    pub async fn get(&self, uuid: &str) -> crate::Result<Monitor> {
        fetch_chunk(self.executor.as_ref(), &[uuid.to_string()])
            .await?
            .into_iter()
            .find(|entry| entry.uuid() == Some(uuid))
            .map(Entry::into_result)
            .unwrap_or_else(|| Err(BulkEditError::NotFound(uuid.to_string())))
    }

    /// Resolve each requested UUID to its record, keeping request order and duplicates
    ///
    /// A UUID that exists with an unsupported type or an undecodable record
    /// gets its own error; only UUIDs the service does not return are `NotFound`.
    pub async fn lookup(&self, uuids: &[String]) -> Vec<(String, crate::Result<Monitor>)> {
        let mut unique: Vec<String> = Vec::new();
        for uuid in uuids {
            if !unique.contains(uuid) {
                unique.push(uuid.clone());
            }
        }

        let mut resolved: HashMap<String, crate::Result<Monitor>> = HashMap::new();
        for chunk in unique.chunks(self.chunk_size) {
            match fetch_chunk(self.executor.as_ref(), chunk).await {
                Ok(entries) => {
                    for entry in entries {
                        match entry.uuid().map(str::to_string) {
                            Some(uuid) => {
                                resolved.insert(uuid, entry.into_result());
                            }
                            None => tracing::warn!("Ignoring monitor record without a uuid"),
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to look up {} monitor(s): {}", chunk.len(), e);
                    for uuid in chunk {
                        resolved.insert(uuid.clone(), Err(e.duplicate()));
                    }
                }
            }
        }

        uuids
            .iter()
            .map(|uuid| {
                let entry = match resolved.get(uuid) {
                    Some(Ok(monitor)) => Ok(monitor.clone()),
                    Some(Err(e)) => Err(e.duplicate()),
                    None => Err(BulkEditError::NotFound(uuid.clone())),
                };
                (uuid.clone(), entry)
            })
            .collect()
    }

    /// Drain a listing into records and the errors met along the way
    pub async fn collect(&self, filter: &MonitorFilter) -> (Vec<Monitor>, Vec<BulkEditError>) {
        let mut monitors = Vec::new();
        let mut errors = Vec::new();
        let mut listing = self.list(filter);
        while let Some(item) = listing.next().await {
            match item {
                Ok(monitor) => monitors.push(monitor),
                Err(e) => errors.push(e),
            }
        }
        tracing::debug!(
            "Listed {} monitor(s) with {} error(s)",
            monitors.len(),
            errors.len()
        );
        (monitors, errors)
    }

    /// Fetch the rule record the monitor's type-specific mutation takes as input
    pub async fn details(&self, monitor: &Monitor) -> crate::Result<Option<Map<String, Value>>> {
        fetch_details(self.executor.as_ref(), monitor).await
    }
}

/// Fetch the full rule record behind `monitor`
///
/// Returns `None` for types updated only through the generic monitor
/// mutations. A missing record is `NotFound`.
pub async fn fetch_details(
    executor: &dyn QueryExecutor,
    monitor: &Monitor,
) -> crate::Result<Option<Map<String, Value>>> {
    let Some(query) = detail_query(monitor.monitor_type) else {
        return Ok(None);
    };
    let mut variables = Map::new();
    variables.insert(query.argument.to_string(), json!(monitor.uuid));
    let data = executor
        .execute(&GraphqlRequest::new(query.document, Value::Object(variables)))
        .await?;

    match data.get(query.root_field) {
        Some(Value::Object(record)) => {
            tracing::debug!("Fetched {} details for monitor {}", monitor.monitor_type, monitor.uuid);
            Ok(Some(record.clone()))
        }
        None | Some(Value::Null) => Err(BulkEditError::NotFound(monitor.uuid.clone())),
        Some(other) => Err(BulkEditError::api(format!(
            "{} returned {} instead of a record",
            query.root_field, other
        ))),
    }
}

/// One `getMonitors` record, decoded on its own
#[derive(Debug)]
enum Entry {
    Monitor(Monitor),
    Unsupported { uuid: String, kind: String },
    Undecodable { uuid: Option<String>, error: BulkEditError },
}

impl Entry {
    fn decode(item: &Value) -> Self {
        let uuid = item.get("uuid").and_then(Value::as_str).map(str::to_string);
        let kind = item.get("monitorType").and_then(Value::as_str).unwrap_or_default();
        if kind.parse::<MonitorType>().is_err() {
            return Entry::Unsupported {
                uuid: uuid.unwrap_or_default(),
                kind: kind.to_string(),
            };
        }
        match serde_json::from_value::<Monitor>(item.clone()) {
            Ok(monitor) => Entry::Monitor(monitor),
            Err(e) => {
                let label = uuid.as_deref().unwrap_or("?");
                let error = BulkEditError::api(format!("could not decode monitor {}: {}", label, e));
                Entry::Undecodable { uuid, error }
            }
        }
    }

    fn uuid(&self) -> Option<&str> {
        match self {
            Entry::Monitor(monitor) => Some(&monitor.uuid),
            Entry::Unsupported { uuid, .. } => Some(uuid),
            Entry::Undecodable { uuid, .. } => uuid.as_deref(),
        }
    }

    /// Listing item; unsupported kinds are left out of listings
    fn into_item(self) -> Option<crate::Result<Monitor>> {
        match self {
            Entry::Unsupported { uuid, kind } => {
                tracing::debug!("Skipping monitor {} of unsupported type '{}'", uuid, kind);
                None
            }
            other => Some(other.into_result()),
        }
    }

    fn into_result(self) -> crate::Result<Monitor> {
        match self {
            Entry::Monitor(monitor) => Ok(monitor),
            Entry::Unsupported { kind, .. } => {
                Err(ValidationError::UnsupportedMonitorType(kind).into())
            }
            Entry::Undecodable { error, .. } => Err(error),
        }
    }
}

struct Page {
    raw_len: usize,
    entries: Vec<Entry>,
}

async fn fetch_page(
    executor: &dyn QueryExecutor,
    monitor_type: Option<MonitorType>,
    limit: usize,
    offset: usize,
) -> crate::Result<Page> {
    let mut variables = json!({ "limit": limit, "offset": offset });
    if let Some(t) = monitor_type {
        variables["monitorTypes"] = json!([t.as_str()]);
    }
    let data = executor
        .execute(&GraphqlRequest::new(list_query(), variables))
        .await?;
    decode_monitors(&data)
}

async fn fetch_chunk(executor: &dyn QueryExecutor, uuids: &[String]) -> crate::Result<Vec<Entry>> {
    let data = executor
        .execute(&GraphqlRequest::new(uuid_query(), json!({ "uuids": uuids })))
        .await?;
    Ok(decode_monitors(&data)?.entries)
}

/// Decode a `getMonitors` payload record by record
fn decode_monitors(data: &Value) -> crate::Result<Page> {
    let items = match data.get("getMonitors") {
        None | Some(Value::Null) => return Ok(Page { raw_len: 0, entries: Vec::new() }),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(BulkEditError::api(format!(
                "getMonitors returned {} instead of a list",
                other
            )))
        }
    };

    Ok(Page {
        raw_len: items.len(),
        entries: items.iter().map(Entry::decode).collect(),
    })
}
