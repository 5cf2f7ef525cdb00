//! Bulk update orchestration
//!
//! Applies one template to many monitors. Every monitor gets exactly one
//! outcome, in input order; one monitor failing never affects the others.

use std::sync::Arc;

use futures::future;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::dispatcher::{build_mutation, check_template, needs_details};
use crate::executor::QueryExecutor;
use crate::monitor::Monitor;
use crate::repository::fetch_details;
use crate::template::UpdateTemplate;
use crate::BulkEditError;

/// Result of updating one monitor
#[derive(Debug)]
pub enum Outcome {
    Success { uuid: String },
    Failure { uuid: String, error: BulkEditError },
}

impl Outcome {
    pub fn uuid(&self) -> &str {
        match self {
            Outcome::Success { uuid } | Outcome::Failure { uuid, .. } => uuid,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn error(&self) -> Option<&BulkEditError> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { error, .. } => Some(error),
        }
    }
}

/// Ordered outcomes of one batch
#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<Outcome>,
    /// Set when the run stopped early; `outcomes` then covers a prefix of the input
    pub cancelled: bool,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.len() - self.successes()
    }
}

/// Applies update templates through the executor
pub struct BulkUpdater {
    executor: Arc<dyn QueryExecutor>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl BulkUpdater {
    pub fn new(executor: Arc<dyn QueryExecutor>, concurrency: usize) -> Self {
        Self {
            executor,
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop starting new monitors once `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Apply `template` to every monitor
    pub async fn apply_bulk(&self, monitors: &[Monitor], template: &UpdateTemplate) -> BatchResult {
        let targets = monitors
            .iter()
            .map(|m| (m.uuid.clone(), Ok(m.clone())))
            .collect();
        self.apply_resolved(targets, template).await
    }

    /// Apply `template` to looked-up monitors; failed lookups become failures
    pub async fn apply_resolved(
        &self,
        targets: Vec<(String, crate::Result<Monitor>)>,
        template: &UpdateTemplate,
    ) -> BatchResult {
        let total = targets.len();
        tracing::info!(
            "Updating {} monitor(s) setting {:?} (concurrency {})",
            total,
            template.fields(),
            self.concurrency
        );

        // Cancellation is checked when the next monitor is pulled, so the
        // outcomes always form a contiguous prefix of the input.
        let cancel = self.cancel.clone();
        let outcomes: Vec<Outcome> = stream::iter(targets)
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(|(uuid, monitor)| self.apply_one(uuid, monitor, template))
            .buffered(self.concurrency)
            .collect()
            .await;

        let cancelled = outcomes.len() < total;
        if cancelled {
            tracing::warn!(
                "Batch cancelled after {} of {} monitor(s)",
                outcomes.len(),
                total
            );
        }
        BatchResult {
            outcomes,
            cancelled,
        }
    }

    async fn apply_one(
        &self,
        uuid: String,
        monitor: crate::Result<Monitor>,
        template: &UpdateTemplate,
    ) -> Outcome {
        let result = match monitor {
            Ok(monitor) => self.update(monitor, template).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                tracing::debug!("Updated monitor {}", uuid);
                Outcome::Success { uuid }
            }
            Err(error) => {
                tracing::warn!("Monitor {} not updated: {}", uuid, error);
                Outcome::Failure { uuid, error }
            }
        }
    }

    async fn update(&self, mut monitor: Monitor, template: &UpdateTemplate) -> crate::Result<()> {
        // Template problems fail the monitor before its rule record is fetched
        check_template(monitor.monitor_type, template)?;
        if monitor.details.is_none() && needs_details(monitor.monitor_type, template) {
            monitor.details = fetch_details(self.executor.as_ref(), &monitor).await?;
        }
        let mutation = build_mutation(&monitor, template)?;
        let data = self.executor.execute(&mutation.request()).await?;
        mutation.verify(&data)
    }
}
