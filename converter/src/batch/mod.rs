//! Pipeline orchestrator.
//!
//! Fans input files out to a bounded pool of workers. Each file is one unit:
//! it is matched to a department, converted, written and archived on its
//! own, and its failure never touches another unit.
//!
//! ```text
//!            ┌──────────┐
//!  inputs ──▶│  queue   │──▶ worker 1 ─┐
//!            │ (shared) │──▶ worker 2 ─┼──▶ results channel ──▶ RunSummary
//!            └──────────┘──▶ worker N ─┘
//! ```
//!
//! Results arrive in completion order, not submission order.

pub mod files;
pub mod report;

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};

use crate::config::{department_by_code, find_department, DepartmentConfig, MainConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::template::TemplateRegistry;
use crate::transform::pipeline::{convert_file, UnitStats};
use crate::validation::ValidationFinding;

pub use files::{archive_file, discover_inputs, output_file_name, write_output};
pub use report::{render_error_log, render_summary, write_reports};

// =============================================================================
// Run context
// =============================================================================

/// Everything a unit reads. Shared read-only by all workers.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub config: MainConfig,
    pub departments: Vec<DepartmentConfig>,
    pub templates: TemplateRegistry,
    /// Convert and validate without writing or archiving
    pub dry_run: bool,
    /// Department code forced for every unit
    pub department_override: Option<String>,
}

impl RunContext {
    /// Department owning `file_name`.
    pub fn department_for(&self, file_name: &str) -> PipelineResult<&DepartmentConfig> {
        let department = match &self.department_override {
            Some(code) => department_by_code(&self.departments, code),
            None => find_department(&self.departments, file_name),
        };
        department.ok_or_else(|| PipelineError::NoDepartment(file_name.to_string()))
    }
}

// =============================================================================
// Unit results
// =============================================================================

/// Outcome of one unit
#[derive(Debug, Clone, Default, Serialize)]
pub struct UnitResult {
    pub input: PathBuf,
    pub department: Option<String>,
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub stats: UnitStats,
    /// Validation findings, kept for the error log
    pub findings: Vec<ValidationFinding>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl UnitResult {
    fn new(input: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            ..Default::default()
        }
    }

    fn aborted(input: PathBuf, reason: String) -> Self {
        Self {
            input,
            error: Some(PipelineError::WorkerAborted(reason).to_string()),
            ..Default::default()
        }
    }

    pub fn file_name(&self) -> String {
        file_name(&self.input)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run one unit to completion. Never fails; errors land in the result.
pub fn run_unit(input: &Path, ctx: &RunContext) -> UnitResult {
    let started = Instant::now();
    let name = file_name(input);
    let _span = tracing::info_span!("unit", file = %name).entered();

    let mut result = UnitResult::new(input);
    match execute_unit(input, &name, ctx, &mut result) {
        Ok(()) => {
            result.success = true;
            match &result.output_path {
                Some(path) => log_success(format!("{} -> {}", name, path.display())),
                None => log_success(format!("{} converted (dry run)", name)),
            }
        }
        Err(err) => {
            log_error(format!("{} failed: {}", name, err));
            if let PipelineError::ValidationFailed { findings, .. } = &err {
                result.findings = findings.clone();
            }
            result.error = Some(err.to_string());
        }
    }

    result.elapsed = started.elapsed();
    result
}

fn execute_unit(input: &Path, name: &str, ctx: &RunContext, result: &mut UnitResult) -> PipelineResult<()> {
    let department = ctx.department_for(name)?;
    result.department = Some(department.department_code.clone());
    log_info(format!("Department: {}", department.name()));

    let schema = ctx.templates.resolve(
        name,
        &department.template_mapping,
        department.default_template.as_deref(),
    )?;
    log_info(format!("Template: {} ({} fields)", schema.name, schema.len()));

    let output = convert_file(input, department, &schema, ctx.config.continue_on_error)?;
    result.stats = output.stats;
    result.findings = output.report.findings;

    if ctx.dry_run {
        return Ok(());
    }

    let now = Local::now().naive_local();
    let output_dir = &ctx.config.output_dir;
    let file_name = output_file_name(&ctx.config.output_name_format, &department.department_code, input, now);
    let output_path = write_output(output_dir, &file_name, output.xml.as_bytes()).map_err(|source| {
        PipelineError::Output {
            path: output_dir.join(&file_name),
            source,
        }
    })?;
    result.output_path = Some(output_path.clone());

    if ctx.config.archive {
        if let Err(e) = archive_file(input, &ctx.config.input_archive_dir, now, true) {
            log_warning(format!("Could not archive input {}: {}", input.display(), e));
        }
        if let Err(e) = archive_file(&output_path, &ctx.config.output_archive_dir, now, false) {
            log_warning(format!("Could not archive output {}: {}", output_path.display(), e));
        }
    }

    Ok(())
}

// =============================================================================
// Worker pool
// =============================================================================

/// Run `work` over `jobs` on at most `workers` concurrent blocking tasks.
///
/// Results come back in completion order. A job whose task panics yields
/// `on_abort(job, reason)` instead.
pub async fn run_pool<J, R, F, A>(jobs: Vec<J>, workers: usize, work: F, on_abort: A) -> Vec<R>
where
    J: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(J) -> R + Send + Sync + 'static,
    A: Fn(J, String) -> R + Send + Sync + 'static,
{
    if jobs.is_empty() {
        return Vec::new();
    }

    let workers = workers.clamp(1, jobs.len());
    let total = jobs.len();
    let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
    let work = Arc::new(work);
    let on_abort = Arc::new(on_abort);
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<R>();

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let work = Arc::clone(&work);
        let on_abort = Arc::clone(&on_abort);
        let results = result_tx.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let Some(job) = queue.lock().await.pop_front() else {
                    break;
                };
                let retained = job.clone();
                let work = Arc::clone(&work);

                let result = match tokio::task::spawn_blocking(move || (*work)(job)).await {
                    Ok(result) => result,
                    Err(join_err) => (*on_abort)(retained, join_err.to_string()),
                };
                if results.send(result).is_err() {
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    let mut results = Vec::with_capacity(total);
    while let Some(result) = result_rx.recv().await {
        results.push(result);
    }

    for handle in handles {
        if let Err(join_err) = handle.await {
            log_error(format!("worker task failed: {join_err}"));
        }
    }

    results
}

// =============================================================================
// Run
// =============================================================================

/// Aggregate of one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub dry_run: bool,
    pub results: Vec<UnitResult>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Counters summed over all units.
    pub fn totals(&self) -> UnitStats {
        self.results.iter().fold(UnitStats::default(), |acc, r| UnitStats {
            rows_processed: acc.rows_processed + r.stats.rows_processed,
            transactions_created: acc.transactions_created + r.stats.transactions_created,
            line_items_created: acc.line_items_created + r.stats.line_items_created,
            fields_transformed: acc.fields_transformed + r.stats.fields_transformed,
            validation_errors: acc.validation_errors + r.stats.validation_errors,
            validation_warnings: acc.validation_warnings + r.stats.validation_warnings,
        })
    }
}

/// Process `inputs` with the configured concurrency.
pub async fn process(ctx: Arc<RunContext>, inputs: Vec<PathBuf>) -> RunSummary {
    let started_at = Local::now();
    let started = Instant::now();
    let workers = ctx.config.concurrency();
    let dry_run = ctx.dry_run;

    log_info(format!(
        "Processing {} file(s) with up to {} worker(s){}",
        inputs.len(),
        workers.min(inputs.len().max(1)),
        if dry_run { " (dry run)" } else { "" }
    ));

    let results = run_pool(
        inputs,
        workers,
        move |input: PathBuf| run_unit(&input, &ctx),
        UnitResult::aborted,
    )
    .await;

    RunSummary {
        started_at,
        elapsed: started.elapsed(),
        dry_run,
        results,
    }
}
