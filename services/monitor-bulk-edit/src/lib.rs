//! monitor-bulk-edit - Bulk editing of data-observability monitors
//!
//! Lists monitors through the service's GraphQL API, lets the operator pick a
//! batch, and applies one update template to every monitor in it with
//! per-monitor success/failure accounting.

pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod io;
pub mod monitor;
pub mod orchestrator;
pub mod prompt;
pub mod report;
pub mod repository;
pub mod schema;
pub mod template;

pub use config::{load_config, Config};
pub use error::{BulkEditError, Result, ValidationError};

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialRequest;
use crate::executor::{GraphqlExecutor, QueryExecutor};
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::monitor::{Monitor, MonitorType};
use crate::orchestrator::{BatchResult, BulkUpdater};
use crate::prompt::Prompter;
use crate::repository::{MonitorFilter, MonitorRepository};
use crate::template::{UpdateKind, UpdateTemplate};

/// What the operator asked for
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub credentials: CredentialRequest,
    pub filter: MonitorFilter,
    pub update_kind: UpdateKind,
    pub template_file: Option<PathBuf>,
    pub get_schema: bool,
    pub schema_out: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            credentials: CredentialRequest::default(),
            filter: MonitorFilter::default(),
            update_kind: UpdateKind::Interactive,
            template_file: None,
            get_schema: false,
            schema_out: None,
        }
    }
}

/// The process surroundings a run talks to
pub struct Environment<R, W> {
    pub http: Arc<dyn HttpClient>,
    pub prompter: Prompter<R, W>,
    pub cancel: CancellationToken,
    /// Cancel `cancel` on Ctrl-C while updates are being applied
    pub cancel_on_interrupt: bool,
    pub now: DateTime<Utc>,
}

impl<R: BufRead, W: Write> Environment<R, W> {
    pub fn new(http: Arc<dyn HttpClient>, prompter: Prompter<R, W>) -> Self {
        Self {
            http,
            prompter,
            cancel: CancellationToken::new(),
            cancel_on_interrupt: false,
            now: Utc::now(),
        }
    }
}

/// A selected batch and the template to apply to it
pub struct Plan {
    executor: Arc<dyn QueryExecutor>,
    targets: Vec<(String, Result<Monitor>)>,
    template: UpdateTemplate,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn template(&self) -> &UpdateTemplate {
        &self.template
    }
}

/// Resolve credentials and build the executor; no request is sent
pub fn connect(
    config: &Config,
    options: &RunOptions,
    http: Arc<dyn HttpClient>,
) -> Result<Arc<dyn QueryExecutor>> {
    let profiles_path = config
        .profiles_path
        .clone()
        .or_else(credentials::default_profiles_path);
    let credentials = credentials::resolve(&options.credentials, profiles_path.as_deref())?;
    tracing::info!("Using {} for {}", credentials.source(), config.api.endpoint);
    Ok(Arc::new(GraphqlExecutor::new(&config.api, credentials, http)))
}

/// Fetch the schema, print the monitor related parts and save or print the rest
pub async fn show_schema<R: BufRead, W: Write>(
    executor: &dyn QueryExecutor,
    options: &RunOptions,
    env: &mut Environment<R, W>,
) -> Result<()> {
    let schema = schema::fetch_schema(executor).await?;

    env.prompter.say("Monitor/alert/rule mutations:")?;
    for mutation in schema.monitor_mutations() {
        env.prompter
            .say(&format!("- {}({})", mutation.name, mutation.args.join(", ")))?;
    }
    env.prompter.say("Monitor/alert/rule input types:")?;
    for input in schema.monitor_input_types() {
        env.prompter
            .say(&format!("- {}: {}", input.name, input.fields.join(", ")))?;
    }

    match &options.schema_out {
        Some(dir) => {
            for path in schema.write_files(dir)? {
                env.prompter.say(&format!("Wrote {}", path.display()))?;
            }
        }
        None => env.prompter.say(&schema.to_pretty_json()?)?,
    }
    Ok(())
}

fn template_from_options(options: &RunOptions, now: DateTime<Utc>) -> Result<Option<UpdateTemplate>> {
    match (&options.template_file, options.update_kind) {
        (Some(path), kind) => {
            let template = template::load_template(path)?.restrict_to(kind)?;
            tracing::info!("Loaded {} template from {}", kind, path.display());
            Ok(Some(template))
        }
        (None, UpdateKind::Schedule) => Ok(Some(UpdateTemplate::default_schedule(now))),
        (None, UpdateKind::Interactive) => Ok(None),
        (None, kind) => Err(BulkEditError::Template(format!(
            "a template file is required for {} updates",
            kind
        ))),
    }
}

/// Choose the batch and the template; `None` when there is nothing to do
pub async fn plan_batch<R: BufRead, W: Write>(
    config: &Config,
    options: &RunOptions,
    executor: Arc<dyn QueryExecutor>,
    env: &mut Environment<R, W>,
) -> Result<Option<Plan>> {
    // Template problems are fatal and surface before any listing request
    let template = template_from_options(options, env.now)?;
    let repository = MonitorRepository::new(Arc::clone(&executor), &config.repository);

    let targets = match &options.filter.uuids {
        Some(uuids) => repository.lookup(uuids).await,
        None => {
            let (monitors, errors) = repository.collect(&options.filter).await;
            for error in &errors {
                tracing::warn!("Listing error: {}", error);
            }
            if monitors.is_empty() {
                env.prompter.say("No monitors found.")?;
                return Ok(None);
            }
            env.prompter
                .say(&format!("Found {} monitor(s):", monitors.len()))?;
            env.prompter
                .select_monitors(&monitors)?
                .into_iter()
                .map(|m| (m.uuid.clone(), Ok(m)))
                .collect()
        }
    };
    env.prompter
        .say(&format!("Selected {} monitor(s) for update.", targets.len()))?;

    let mut types: Vec<MonitorType> = Vec::new();
    for monitor in targets.iter().filter_map(|(_, m)| m.as_ref().ok()) {
        if !types.contains(&monitor.monitor_type) {
            types.push(monitor.monitor_type);
        }
    }

    let template = match template {
        Some(template) => template,
        // Every lookup failed; report the failures without asking for fields
        None if types.is_empty() => {
            env.prompter
                .say("None of the selected monitors could be resolved.")?;
            return Ok(Some(Plan {
                executor,
                targets,
                template: UpdateTemplate::default(),
            }));
        }
        None => {
            let fields = dispatcher::common_fields(&types);
            env.prompter.fill_template(&fields, env.now)?
        }
    };
    if template.is_empty() {
        env.prompter.say("Nothing to update.")?;
        return Ok(None);
    }

    Ok(Some(Plan {
        executor,
        targets,
        template,
    }))
}

/// Apply a plan and report each outcome plus the tally
pub async fn apply_plan<R: BufRead, W: Write>(
    config: &Config,
    plan: Plan,
    env: &mut Environment<R, W>,
) -> Result<BatchResult> {
    let updater = BulkUpdater::new(plan.executor, config.bulk.concurrency)
        .with_cancellation(env.cancel.clone());
    let watcher = env.cancel_on_interrupt.then(|| watch_interrupt(env.cancel.clone()));
    let result = updater.apply_resolved(plan.targets, &plan.template).await;
    if let Some(watcher) = watcher {
        watcher.abort();
    }

    report::write_report(env.prompter.writer(), &result)?;
    tracing::info!("{}", report::tally_line(&result));
    Ok(result)
}

/// Full run against the given surroundings; `None` when no batch was applied
pub async fn run_in<R: BufRead, W: Write>(
    config: &Config,
    options: &RunOptions,
    env: &mut Environment<R, W>,
) -> Result<Option<BatchResult>> {
    let executor = connect(config, options, Arc::clone(&env.http))?;
    if options.get_schema {
        show_schema(executor.as_ref(), options, env).await?;
        return Ok(None);
    }
    match plan_batch(config, options, executor, env).await? {
        Some(plan) => Ok(Some(apply_plan(config, plan, env).await?)),
        None => Ok(None),
    }
}

/// Ctrl-C stops the batch between monitors once updates have started
fn watch_interrupt(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing the current monitor");
            cancel.cancel();
        }
    })
}

/// Run the bulk editor on stdin/stdout with the production HTTP client
pub async fn run(config: Config, options: RunOptions) -> Result<()> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let stdin = std::io::stdin();
    let mut env = Environment::new(http, Prompter::new(stdin.lock(), std::io::stdout()));
    env.cancel_on_interrupt = true;

    tracing::info!("Starting {} update run", options.update_kind);
    run_in(&config, &options, &mut env).await?;
    Ok(())
}
