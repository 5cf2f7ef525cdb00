//! BDD step definitions for bulk updates

use cucumber::{then, when};
use monitor_bulk_edit::orchestrator::BulkUpdater;
use monitor_bulk_edit::template::UpdateTemplate;

use crate::world::BulkEditWorld;

#[when(expr = "the template is applied to monitors {string}")]
async fn apply_to(world: &mut BulkEditWorld, uuids: String) {
    let uuids: Vec<String> = uuids.split(',').map(|s| s.trim().to_string()).collect();
    let targets = world.repository().lookup(&uuids).await;
    let template = world.template.clone().expect("no template");
    let result = BulkUpdater::new(world.executor(), 1)
        .apply_resolved(targets, &template)
        .await;
    world.result = Some(result);
}

#[when(expr = "the current schedule of {string} is re-applied")]
async fn reapply_schedule(world: &mut BulkEditWorld, uuid: String) {
    let monitor = world.repository().get(&uuid).await.unwrap();
    let template = UpdateTemplate::current_schedule_of(&monitor).expect("monitor has no schedule");
    let result = BulkUpdater::new(world.executor(), 1)
        .apply_bulk(std::slice::from_ref(&monitor), &template)
        .await;
    world.snapshot = Some(monitor);
    world.result = Some(result);
}

#[then(expr = "{int} monitor(s) succeed(s)")]
fn successes(world: &mut BulkEditWorld, count: usize) {
    assert_eq!(world.result().successes(), count);
}

#[then(expr = "{int} outcome(s) are reported")]
fn outcome_count(world: &mut BulkEditWorld, count: usize) {
    assert_eq!(world.result().len(), count);
}

#[then(expr = "monitor {string} fails with {string}")]
fn monitor_fails(world: &mut BulkEditWorld, uuid: String, text: String) {
    let outcome = world
        .result()
        .outcomes
        .iter()
        .find(|o| o.uuid() == uuid)
        .expect("no outcome for monitor");
    let error = outcome.error().expect("monitor succeeded").to_string();
    assert!(
        error.to_lowercase().contains(&text.to_lowercase()),
        "{error}"
    );
}

#[then(expr = "monitor {string} has description {string}")]
fn has_description(world: &mut BulkEditWorld, uuid: String, description: String) {
    let record = world.service.monitor(&uuid).expect("unknown monitor");
    assert_eq!(record["description"], description.as_str());
}

#[then(expr = "monitor {string} runs every {int} minutes")]
fn runs_every(world: &mut BulkEditWorld, uuid: String, minutes: u64) {
    let record = world.service.monitor(&uuid).expect("unknown monitor");
    assert_eq!(record["scheduleConfig"]["intervalMinutes"], minutes);
}

#[then("no mutation was sent")]
fn no_mutation(world: &mut BulkEditWorld) {
    assert_eq!(world.service.mutation_count(), 0);
}

#[then(expr = "monitor {string} is unchanged")]
async fn unchanged(world: &mut BulkEditWorld, uuid: String) {
    let after = world.repository().get(&uuid).await.unwrap();
    assert_eq!(world.snapshot.as_ref(), Some(&after));
}
