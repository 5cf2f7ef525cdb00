//! BDD step definitions for update templates

use cucumber::{given, then, when};
use monitor_bulk_edit::monitor::ScheduleConfig;
use monitor_bulk_edit::template::{parse_template, UpdateKind, UpdateTemplate};

use crate::world::BulkEditWorld;

fn parse_into(world: &mut BulkEditWorld, content: &str) {
    match parse_template(content) {
        Ok(template) => world.template = Some(template),
        Err(e) => world.template_error = Some(e),
    }
}

#[given(expr = "the template {string}")]
fn the_template(world: &mut BulkEditWorld, content: String) {
    parse_into(world, &content);
}

#[when(expr = "the template {string} is parsed")]
fn template_is_parsed(world: &mut BulkEditWorld, content: String) {
    parse_into(world, &content);
}

#[given(expr = "a {word} schedule every {int} minutes starting {string}")]
fn a_schedule(world: &mut BulkEditWorld, schedule_type: String, minutes: u32, start: String) {
    world.template = Some(UpdateTemplate {
        schedule_config: Some(ScheduleConfig {
            schedule_type,
            interval_minutes: Some(minutes),
            start_time: Some(start),
            cron_expression: None,
        }),
        ..Default::default()
    });
}

#[when(expr = "the template is restricted to {word} updates")]
fn restrict(world: &mut BulkEditWorld, kind: String) {
    let kind = match kind.as_str() {
        "schedule" => UpdateKind::Schedule,
        "description" => UpdateKind::Description,
        "alerts" => UpdateKind::Alerts,
        _ => UpdateKind::Interactive,
    };
    let template = world.template.take().expect("no template");
    match template.restrict_to(kind) {
        Ok(template) => world.template = Some(template),
        Err(e) => world.template_error = Some(e),
    }
}

#[then(expr = "the template is rejected mentioning {string}")]
fn template_rejected(world: &mut BulkEditWorld, text: String) {
    let err = world.template_error.as_ref().expect("template was accepted");
    assert!(err.to_string().contains(&text), "{err}");
}

#[then("the template is accepted")]
fn template_accepted(world: &mut BulkEditWorld) {
    assert!(world.template_error.is_none(), "{:?}", world.template_error);
    assert!(world.template.is_some());
}
