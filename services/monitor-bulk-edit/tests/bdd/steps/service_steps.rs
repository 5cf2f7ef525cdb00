//! BDD step definitions for the fake monitor service

use cucumber::given;

use crate::common::Failure;
use crate::world::BulkEditWorld;

#[given(expr = "a {word} monitor {string}")]
fn a_monitor(world: &mut BulkEditWorld, monitor_type: String, uuid: String) {
    world.service.add_monitor(&uuid, &monitor_type);
}

#[given(expr = "{int} {word} monitors")]
fn many_monitors(world: &mut BulkEditWorld, count: usize, monitor_type: String) {
    world
        .service
        .add_many(&monitor_type.to_lowercase(), &monitor_type, count);
}

#[given(expr = "the service answers every request with HTTP {int}")]
fn service_fails_with_status(world: &mut BulkEditWorld, status: u16) {
    world.service.fail_with(Failure::Status(status));
}

#[given("the service is unreachable")]
fn service_unreachable(world: &mut BulkEditWorld) {
    world.service.fail_with(Failure::Transport);
}

#[given(expr = "the service reports failure for {word}")]
fn service_rejects(world: &mut BulkEditWorld, field: String) {
    world.service.reject_mutation(&field);
}

#[given(expr = "the executor retries {int} time(s)")]
fn executor_retries(world: &mut BulkEditWorld, retries: u32) {
    world.max_retries = retries;
}
