//! Update templates: which monitor fields to change and to what

use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::monitor::{Monitor, ScheduleConfig};
use crate::BulkEditError;

/// A declarative set of field changes applied to every monitor in a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_config: Option<ScheduleConfig>,
    /// Replaces the monitor's alert rules wholesale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_conditions: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparisons: Option<Vec<Value>>,
}

/// Template keys, in the order they are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateField {
    Description,
    ScheduleConfig,
    AlertConditions,
    CustomSql,
    Comparisons,
}

impl TemplateField {
    pub const ALL: [TemplateField; 5] = [
        TemplateField::Description,
        TemplateField::ScheduleConfig,
        TemplateField::AlertConditions,
        TemplateField::CustomSql,
        TemplateField::Comparisons,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            TemplateField::Description => "description",
            TemplateField::ScheduleConfig => "scheduleConfig",
            TemplateField::AlertConditions => "alertConditions",
            TemplateField::CustomSql => "customSql",
            TemplateField::Comparisons => "comparisons",
        }
    }
}

impl fmt::Display for TemplateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which part of a template an update run applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum UpdateKind {
    Schedule,
    Description,
    Alerts,
    Interactive,
}

impl UpdateKind {
    pub fn allows(&self, field: TemplateField) -> bool {
        match self {
            UpdateKind::Schedule => field == TemplateField::ScheduleConfig,
            UpdateKind::Description => field == TemplateField::Description,
            UpdateKind::Alerts => field == TemplateField::AlertConditions,
            UpdateKind::Interactive => true,
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateKind::Schedule => "schedule",
            UpdateKind::Description => "description",
            UpdateKind::Alerts => "alerts",
            UpdateKind::Interactive => "interactive",
        };
        f.write_str(name)
    }
}

impl UpdateTemplate {
    /// Fields this template sets
    pub fn fields(&self) -> Vec<TemplateField> {
        let mut fields = Vec::new();
        if self.description.is_some() {
            fields.push(TemplateField::Description);
        }
        if self.schedule_config.is_some() {
            fields.push(TemplateField::ScheduleConfig);
        }
        if self.alert_conditions.is_some() {
            fields.push(TemplateField::AlertConditions);
        }
        if self.custom_sql.is_some() {
            fields.push(TemplateField::CustomSql);
        }
        if self.comparisons.is_some() {
            fields.push(TemplateField::Comparisons);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Check the template only carries fields the update kind applies
    pub fn restrict_to(self, kind: UpdateKind) -> crate::Result<Self> {
        let fields = self.fields();
        if let Some(field) = fields.iter().find(|f| !kind.allows(**f)) {
            return Err(BulkEditError::Template(format!(
                "field '{}' is not applied by a {} update",
                field, kind
            )));
        }
        if fields.is_empty() {
            return Err(BulkEditError::Template(format!(
                "template sets no field for a {} update",
                kind
            )));
        }
        Ok(self)
    }

    /// Daily fixed schedule starting at 02:00 UTC on the day of `now`
    pub fn default_schedule(now: DateTime<Utc>) -> Self {
        let start = now
            .date_naive()
            .and_time(NaiveTime::from_hms_opt(2, 0, 0).unwrap_or_default())
            .and_utc();
        Self {
            schedule_config: Some(ScheduleConfig {
                schedule_type: "FIXED".to_string(),
                interval_minutes: Some(1440),
                start_time: Some(start.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
                cron_expression: None,
            }),
            ..Default::default()
        }
    }

    /// Template that re-applies a monitor's current schedule
    pub fn current_schedule_of(monitor: &Monitor) -> Option<Self> {
        monitor.schedule_config.clone().map(|schedule| Self {
            schedule_config: Some(schedule),
            ..Default::default()
        })
    }
}

/// Parse a template document
pub fn parse_template(content: &str) -> crate::Result<UpdateTemplate> {
    serde_json::from_str(content).map_err(|e| BulkEditError::Template(e.to_string()))
}

/// Load a template from a JSON file
pub fn load_template(path: &Path) -> crate::Result<UpdateTemplate> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BulkEditError::Template(format!("Failed to read template file {:?}: {}", path, e))
    })?;
    let template = parse_template(&content)?;
    tracing::debug!(
        "Loaded template from {:?} setting {:?}",
        path,
        template.fields()
    );
    Ok(template)
}
