//! Monitor records as returned by the remote service

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of monitor kinds the editor knows how to update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorType {
    Validation,
    CustomSql,
    Metric,
    Stats,
    Comparison,
}

impl MonitorType {
    pub const ALL: [MonitorType; 5] = [
        MonitorType::Validation,
        MonitorType::CustomSql,
        MonitorType::Metric,
        MonitorType::Stats,
        MonitorType::Comparison,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorType::Validation => "VALIDATION",
            MonitorType::CustomSql => "CUSTOM_SQL",
            MonitorType::Metric => "METRIC",
            MonitorType::Stats => "STATS",
            MonitorType::Comparison => "COMPARISON",
        }
    }
}

impl fmt::Display for MonitorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        MonitorType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown monitor type '{}' (expected one of VALIDATION, CUSTOM_SQL, METRIC, STATS, COMPARISON)",
                    s
                )
            })
    }
}

/// Schedule as stored on a monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    pub schedule_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
}

/// A monitor record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub uuid: String,
    pub monitor_type: MonitorType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schedule_config: Option<ScheduleConfig>,
    /// Everything else the service returned, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Full rule record from the type's detail query, fetched before rule updates
    #[serde(skip)]
    pub details: Option<Map<String, Value>>,
}

impl Monitor {
    pub fn new(uuid: impl Into<String>, monitor_type: MonitorType) -> Self {
        Self {
            uuid: uuid.into(),
            monitor_type,
            name: None,
            description: None,
            schedule_config: None,
            extra: Map::new(),
            details: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed")
    }
}
