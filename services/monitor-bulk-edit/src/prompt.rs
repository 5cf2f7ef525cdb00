//! Line-oriented operator prompts
//!
//! Works over any `BufRead`/`Write` pair so the binary can use stdin/stdout
//! and tests can script the conversation.

use std::io::{BufRead, Write};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::monitor::{Monitor, ScheduleConfig};
use crate::template::{TemplateField, UpdateTemplate};
use crate::BulkEditError;

/// Turn `all` or a comma separated list of 1-based indices into 0-based indices
pub fn parse_selection(input: &str, count: usize) -> Result<Vec<usize>, String> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return Ok((0..count).collect());
    }
    if input.is_empty() {
        return Err("no monitors selected".to_string());
    }
    input
        .split(',')
        .map(str::trim)
        .map(|part| match part.parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => Ok(n - 1),
            _ => Err(format!("'{}' is not a number between 1 and {}", part, count)),
        })
        .collect()
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn say(&mut self, line: &str) -> crate::Result<()> {
        writeln!(self.output, "{}", line)?;
        Ok(())
    }

    fn ask(&mut self, question: &str) -> crate::Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(BulkEditError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            )));
        }
        Ok(line.trim().to_string())
    }

    fn confirm(&mut self, question: &str) -> crate::Result<bool> {
        let answer = self.ask(&format!("{} (y/n): ", question))?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    /// Numbered listing of monitors
    pub fn show_listing(&mut self, monitors: &[Monitor]) -> crate::Result<()> {
        for (i, monitor) in monitors.iter().enumerate() {
            writeln!(
                self.output,
                "{}. {} ({}) - {}",
                i + 1,
                monitor.display_name(),
                monitor.monitor_type,
                monitor.uuid
            )?;
        }
        Ok(())
    }

    /// Ask which listed monitors to update until the answer is valid
    pub fn select_monitors(&mut self, monitors: &[Monitor]) -> crate::Result<Vec<Monitor>> {
        self.show_listing(monitors)?;
        loop {
            let answer =
                self.ask("Select monitors to update (comma separated numbers, or 'all'): ")?;
            match parse_selection(&answer, monitors.len()) {
                Ok(indices) => return Ok(indices.into_iter().map(|i| monitors[i].clone()).collect()),
                Err(reason) => self.say(&format!("Invalid selection: {}", reason))?,
            }
        }
    }

    /// Build a template by asking about each of `fields`
    pub fn fill_template(
        &mut self,
        fields: &[TemplateField],
        now: DateTime<Utc>,
    ) -> crate::Result<UpdateTemplate> {
        let mut template = UpdateTemplate::default();
        for field in fields {
            match field {
                TemplateField::Description => {
                    if self.confirm("Update description?")? {
                        template.description = Some(self.ask("Enter new description: ")?);
                    }
                }
                TemplateField::ScheduleConfig => {
                    if self.confirm("Update schedule?")? {
                        template.schedule_config = Some(self.ask_schedule(now)?);
                    }
                }
                TemplateField::AlertConditions => {
                    if self.confirm("Replace alert conditions?")? {
                        template.alert_conditions =
                            Some(self.ask_json_array("Alert conditions as a JSON array: ")?);
                    }
                }
                TemplateField::CustomSql => {
                    if self.confirm("Update custom SQL?")? {
                        template.custom_sql = Some(self.ask("Enter SQL: ")?);
                    }
                }
                TemplateField::Comparisons => {
                    if self.confirm("Update comparisons?")? {
                        template.comparisons =
                            Some(self.ask_json_array("Comparisons as a JSON array: ")?);
                    }
                }
            }
        }
        Ok(template)
    }

    fn ask_schedule(&mut self, now: DateTime<Utc>) -> crate::Result<ScheduleConfig> {
        let schedule_type = self.ask("Schedule type (FIXED, CRON or DYNAMIC, blank for FIXED): ")?;
        let schedule_type = if schedule_type.is_empty() {
            "FIXED".to_string()
        } else {
            schedule_type.to_ascii_uppercase()
        };

        let mut schedule = ScheduleConfig {
            schedule_type,
            interval_minutes: None,
            start_time: None,
            cron_expression: None,
        };
        match schedule.schedule_type.as_str() {
            "FIXED" => {
                schedule.interval_minutes = Some(self.ask_interval()?);
                let start = self.ask("Start time, RFC 3339 (blank for 02:00 UTC today): ")?;
                schedule.start_time = if start.is_empty() {
                    UpdateTemplate::default_schedule(now)
                        .schedule_config
                        .and_then(|s| s.start_time)
                } else {
                    Some(start)
                };
            }
            "CRON" => {
                schedule.cron_expression = Some(self.ask("Cron expression: ")?);
            }
            _ => {}
        }
        Ok(schedule)
    }

    fn ask_interval(&mut self) -> crate::Result<u32> {
        loop {
            let answer = self.ask("Interval in minutes (blank for 1440): ")?;
            if answer.is_empty() {
                return Ok(1440);
            }
            match answer.parse::<u32>() {
                Ok(minutes) => return Ok(minutes),
                Err(_) => self.say(&format!("'{}' is not a whole number of minutes", answer))?,
            }
        }
    }

    fn ask_json_array(&mut self, question: &str) -> crate::Result<Vec<Value>> {
        loop {
            let answer = self.ask(question)?;
            match serde_json::from_str::<Vec<Value>>(&answer) {
                Ok(items) => return Ok(items),
                Err(e) => self.say(&format!("Not a JSON array: {}", e))?,
            }
        }
    }
}
