//! BDD test world for the monitor bulk editor

use std::sync::Arc;

use cucumber::World;
use monitor_bulk_edit::executor::GraphqlExecutor;
use monitor_bulk_edit::monitor::Monitor;
use monitor_bulk_edit::orchestrator::BatchResult;
use monitor_bulk_edit::repository::MonitorRepository;
use monitor_bulk_edit::template::UpdateTemplate;

use crate::common::{self, FakeMonitorService};

#[derive(Debug, Default, World)]
pub struct BulkEditWorld {
    pub service: FakeMonitorService,
    pub max_retries: u32,

    // Templates
    pub template: Option<UpdateTemplate>,
    pub template_error: Option<monitor_bulk_edit::BulkEditError>,

    // Listing
    pub listed: Vec<Monitor>,
    pub listing_errors: usize,

    // Updates
    pub result: Option<BatchResult>,
    pub snapshot: Option<Monitor>,
}

impl BulkEditWorld {
    pub fn executor(&self) -> Arc<GraphqlExecutor> {
        common::executor(&self.service, self.max_retries)
    }

    pub fn repository(&self) -> MonitorRepository {
        MonitorRepository::new(
            self.executor(),
            &common::test_config(self.max_retries).repository,
        )
    }

    pub fn result(&self) -> &BatchResult {
        self.result.as_ref().expect("no batch has been applied")
    }
}
