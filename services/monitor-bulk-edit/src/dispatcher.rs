//! Type dispatch: turning a template into the mutation for one monitor
//!
//! Each monitor type has a fixed set of fields it accepts. Description and
//! schedule go through the generic monitor mutations; alert rules, SQL and
//! comparison targets go through the type's own create-or-update mutation,
//! which takes the whole rule record. Everything here is local; nothing is sent.

use chrono::DateTime;
use serde_json::{json, Map, Value};

use crate::error::ValidationError;
use crate::executor::GraphqlRequest;
use crate::monitor::{Monitor, MonitorType, ScheduleConfig};
use crate::template::{TemplateField, UpdateTemplate};
use crate::BulkEditError;

const OPERATION_NAME: &str = "bulkUpdateMonitor";

const DESCRIPTION_FIELD: &str = "updateMonitorDescription";
const SCHEDULE_FIELD: &str = "updateMonitorsSchedules";

/// Type-specific create-or-update mutation used for rule payload fields
struct InputMutation {
    field: &'static str,
    input_type: &'static str,
    selection: &'static str,
}

struct TypeProfile {
    eligible: &'static [TemplateField],
    input_mutation: Option<InputMutation>,
}

static VALIDATION: TypeProfile = TypeProfile {
    eligible: &[TemplateField::Description, TemplateField::ScheduleConfig],
    input_mutation: None,
};

static CUSTOM_SQL: TypeProfile = TypeProfile {
    eligible: &[
        TemplateField::Description,
        TemplateField::ScheduleConfig,
        TemplateField::AlertConditions,
        TemplateField::CustomSql,
    ],
    input_mutation: Some(InputMutation {
        field: "createOrUpdateCustomSqlRule",
        input_type: "CreateOrUpdateCustomSqlRuleInput",
        selection: "customRule { uuid }",
    }),
};

static METRIC: TypeProfile = TypeProfile {
    eligible: &[
        TemplateField::Description,
        TemplateField::ScheduleConfig,
        TemplateField::AlertConditions,
    ],
    input_mutation: Some(InputMutation {
        field: "createOrUpdateMetricMonitor",
        input_type: "CreateOrUpdateMetricMonitorInput",
        selection: "metricMonitor { uuid }",
    }),
};

static COMPARISON: TypeProfile = TypeProfile {
    eligible: &[
        TemplateField::Description,
        TemplateField::ScheduleConfig,
        TemplateField::AlertConditions,
        TemplateField::Comparisons,
    ],
    input_mutation: Some(InputMutation {
        field: "createOrUpdateComparisonRule",
        input_type: "CreateOrUpdateComparisonRuleInput",
        selection: "comparisonRule { uuid }",
    }),
};

fn profile(monitor_type: MonitorType) -> &'static TypeProfile {
    match monitor_type {
        MonitorType::Validation => &VALIDATION,
        MonitorType::CustomSql => &CUSTOM_SQL,
        // Stats monitors share the metric monitor mutation
        MonitorType::Metric | MonitorType::Stats => &METRIC,
        MonitorType::Comparison => &COMPARISON,
    }
}

/// Fields a monitor of this type accepts in a template
pub fn eligible_fields(monitor_type: MonitorType) -> &'static [TemplateField] {
    profile(monitor_type).eligible
}

/// Fields accepted by every one of `types`, in template order
pub fn common_fields(types: &[MonitorType]) -> Vec<TemplateField> {
    TemplateField::ALL
        .into_iter()
        .filter(|field| types.iter().all(|t| eligible_fields(*t).contains(field)))
        .collect()
}

/// A ready-to-send mutation for one monitor
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub monitor_uuid: String,
    pub document: String,
    pub variables: Value,
    /// Root fields selected by the document, checked in the response
    pub root_fields: Vec<&'static str>,
}

impl Mutation {
    pub fn request(&self) -> GraphqlRequest {
        GraphqlRequest::new(self.document.clone(), self.variables.clone())
    }

    /// Check every mutation in the response produced a result and none reported failure
    pub fn verify(&self, data: &Value) -> crate::Result<()> {
        for field in &self.root_fields {
            let result = data.get(*field).filter(|v| !v.is_null()).ok_or_else(|| {
                BulkEditError::api(format!("{} returned no result", field))
            })?;
            if result.get("success") == Some(&Value::Bool(false)) {
                return Err(BulkEditError::api(format!("{} reported success=false", field)));
            }
        }
        Ok(())
    }
}

/// Check `template` against the monitor type, returning the normalized schedule
///
/// Runs before anything is fetched or sent for the monitor.
pub fn check_template(
    monitor_type: MonitorType,
    template: &UpdateTemplate,
) -> Result<Option<ScheduleConfig>, ValidationError> {
    let fields = template.fields();
    if fields.is_empty() {
        return Err(ValidationError::EmptyTemplate);
    }

    let eligible = eligible_fields(monitor_type);
    if let Some(field) = fields.iter().find(|f| !eligible.contains(f)) {
        return Err(ValidationError::UnsupportedField {
            monitor_type,
            field: field.key().to_string(),
        });
    }

    template
        .schedule_config
        .as_ref()
        .map(validate_schedule)
        .transpose()
}

fn sets_rule_payload(template: &UpdateTemplate) -> bool {
    template.alert_conditions.is_some() || template.custom_sql.is_some() || template.comparisons.is_some()
}

/// Whether the update goes through the type's own mutation, which needs the
/// full rule record in [`Monitor::details`]
pub fn needs_details(monitor_type: MonitorType, template: &UpdateTemplate) -> bool {
    sets_rule_payload(template) && profile(monitor_type).input_mutation.is_some()
}

/// Build the mutation applying `template` to `monitor`
///
/// Alert rules, SQL and comparisons are sent through the type's
/// create-or-update mutation as the monitor's full rule record with the
/// template laid over it; description and schedule ride along in that input.
/// Otherwise description and schedule use the generic monitor mutations.
pub fn build_mutation(
    monitor: &Monitor,
    template: &UpdateTemplate,
) -> Result<Mutation, ValidationError> {
    let schedule = check_template(monitor.monitor_type, template)?;
    let profile = profile(monitor.monitor_type);

    let mut definitions = Vec::new();
    let mut selections = Vec::new();
    let mut root_fields = Vec::new();
    let mut variables = Map::new();

    match &profile.input_mutation {
        // Eligibility already guarantees rule payloads only reach types with an input mutation
        Some(mutation) if sets_rule_payload(template) => {
            let mut input = monitor.details.clone().unwrap_or_default();
            if let Some(description) = &template.description {
                input.insert("description".into(), json!(description));
            }
            if let Some(schedule) = &schedule {
                input.insert("scheduleConfig".into(), json!(schedule));
            }
            if let Some(alerts) = &template.alert_conditions {
                input.insert("alertConditions".into(), Value::Array(alerts.clone()));
            }
            if let Some(sql) = &template.custom_sql {
                input.insert("sql".into(), json!(sql));
            }
            if let Some(comparisons) = &template.comparisons {
                input.insert("comparisons".into(), Value::Array(comparisons.clone()));
            }
            input.insert("uuid".into(), json!(monitor.uuid));

            definitions.push(format!("$input: {}!", mutation.input_type));
            variables.insert("input".into(), Value::Object(input));
            selections.push(format!(
                "{}(input: $input) {{ {} }}",
                mutation.field, mutation.selection
            ));
            root_fields.push(mutation.field);
        }
        _ => {
            definitions.push("$monitorUuid: UUID!".to_string());
            variables.insert("monitorUuid".into(), json!(monitor.uuid));

            if let Some(description) = &template.description {
                definitions.push("$description: String!".to_string());
                variables.insert("description".into(), json!(description));
                selections.push(format!(
                    "{}(monitorUuid: $monitorUuid, description: $description) {{ success }}",
                    DESCRIPTION_FIELD
                ));
                root_fields.push(DESCRIPTION_FIELD);
            }

            if let Some(schedule) = &schedule {
                definitions.push("$scheduleConfig: ScheduleConfigInput!".to_string());
                variables.insert("scheduleConfig".into(), json!(schedule));
                selections.push(format!(
                    "{}(monitorUuids: [$monitorUuid], scheduleConfig: $scheduleConfig) {{ success }}",
                    SCHEDULE_FIELD
                ));
                root_fields.push(SCHEDULE_FIELD);
            }
        }
    }

    let document = format!(
        "mutation {}({}) {{\n  {}\n}}",
        OPERATION_NAME,
        definitions.join(", "),
        selections.join("\n  ")
    );

    Ok(Mutation {
        monitor_uuid: monitor.uuid.clone(),
        document,
        variables: Value::Object(variables),
        root_fields,
    })
}

/// Check a schedule is internally consistent, normalizing its type name
pub fn validate_schedule(schedule: &ScheduleConfig) -> Result<ScheduleConfig, ValidationError> {
    let invalid = |msg: String| ValidationError::InvalidSchedule(msg);
    let schedule_type = schedule.schedule_type.trim().to_ascii_uppercase();

    if let Some(start) = &schedule.start_time {
        DateTime::parse_from_rfc3339(start)
            .map_err(|e| invalid(format!("startTime '{}' is not RFC 3339: {}", start, e)))?;
    }

    match schedule_type.as_str() {
        "FIXED" => {
            match schedule.interval_minutes {
                Some(minutes) if minutes > 0 => {}
                _ => return Err(invalid("FIXED schedules need intervalMinutes > 0".into())),
            }
            if schedule.start_time.is_none() {
                return Err(invalid("FIXED schedules need a startTime".into()));
            }
            if schedule.cron_expression.is_some() {
                return Err(invalid("FIXED schedules cannot set cronExpression".into()));
            }
        }
        "CRON" => {
            let fields = schedule
                .cron_expression
                .as_deref()
                .map(|c| c.split_whitespace().count())
                .unwrap_or(0);
            if !(5..=6).contains(&fields) {
                return Err(invalid(
                    "CRON schedules need a cronExpression with 5 or 6 fields".into(),
                ));
            }
            if schedule.interval_minutes.is_some() {
                return Err(invalid("CRON schedules cannot set intervalMinutes".into()));
            }
        }
        "DYNAMIC" => {
            if schedule.interval_minutes.is_some() || schedule.cron_expression.is_some() {
                return Err(invalid(
                    "DYNAMIC schedules cannot set intervalMinutes or cronExpression".into(),
                ));
            }
        }
        other => {
            return Err(invalid(format!(
                "unknown scheduleType '{}' (expected FIXED, CRON or DYNAMIC)",
                other
            )));
        }
    }

    Ok(ScheduleConfig {
        schedule_type,
        ..schedule.clone()
    })
}
