//! Sequential orchestration of the weekly report stages.
//!
//! Every stage is attempted in order regardless of earlier outcomes. Stage
//! failures are logged and collected; the only fatal outcome is a missing
//! `report.md` once all stages have been attempted.
use crate::config::{ensure_out_dir, RunConfig, StageLayout};
use crate::runner::{StageOutput, StageRunner};
use crate::stage::{plan_stages, StageDescriptor, StageKind};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Terminal artifact written by the render stage.
pub const REPORT_FILE_NAME: &str = "report.md";

/// What happened when a stage was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Succeeded(StageOutput),
    /// Ran to completion with a non-zero or abnormal exit.
    Failed(StageOutput),
    /// Executable not found; nothing was spawned.
    Missing,
    /// Executable present but the process could not be started.
    SpawnFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub kind: StageKind,
    pub outcome: StageOutcome,
    pub duration_ms: u64,
}

impl StageRecord {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, StageOutcome::Succeeded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunVerdict {
    Success,
    SuccessWithWarnings { failed_stages: Vec<&'static str> },
    Failed,
}

impl RunVerdict {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunVerdict::Success | RunVerdict::SuccessWithWarnings { .. } => 0,
            RunVerdict::Failed => 1,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RunVerdict::Success => "success",
            RunVerdict::SuccessWithWarnings { .. } => "success_with_warnings",
            RunVerdict::Failed => "failed",
        }
    }
}

/// Everything observed during one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub out_dir: PathBuf,
    pub report_path: PathBuf,
    pub report_exists: bool,
    pub stages: Vec<StageRecord>,
    pub verdict: RunVerdict,
}

impl RunReport {
    pub fn failed_stages(&self) -> Vec<&'static str> {
        failed_stage_names(&self.stages)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            out_dir: self.out_dir.display().to_string(),
            report_path: self.report_path.display().to_string(),
            report_exists: self.report_exists,
            verdict: self.verdict.label(),
            failed_stages: self.failed_stages(),
            stages: self.stages.iter().map(StageSummary::from).collect(),
        }
    }
}

/// Serializable view of a run, printed by `--json`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub out_dir: String,
    pub report_path: String,
    pub report_exists: bool,
    pub verdict: &'static str,
    pub failed_stages: Vec<&'static str>,
    pub stages: Vec<StageSummary>,
}

#[derive(Debug, Serialize)]
pub struct StageSummary {
    pub name: StageKind,
    pub status: &'static str,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl From<&StageRecord> for StageSummary {
    fn from(record: &StageRecord) -> Self {
        let (status, output, error) = match &record.outcome {
            StageOutcome::Succeeded(output) => ("ok", Some(output), None),
            StageOutcome::Failed(output) => ("failed", Some(output), None),
            StageOutcome::Missing => ("missing", None, None),
            StageOutcome::SpawnFailed(message) => ("spawn_error", None, Some(message.clone())),
        };
        Self {
            name: record.kind,
            status,
            exit_code: output.and_then(|output| output.exit_code),
            exit_signal: output.and_then(|output| output.exit_signal),
            error,
            duration_ms: record.duration_ms,
        }
    }
}

/// Run all stages for `config` and derive the verdict.
///
/// `Err` is reserved for setup failures before any stage runs.
pub fn run_pipeline(
    config: &RunConfig,
    layout: &StageLayout,
    runner: &dyn StageRunner,
    today: NaiveDate,
) -> Result<RunReport> {
    let out_dir = config.resolve_out_dir(today);
    ensure_out_dir(&out_dir)?;
    debug!(out_dir = %out_dir.display(), "output directory ready");

    let stages = plan_stages(config, &out_dir, layout);
    let records: Vec<StageRecord> = stages
        .iter()
        .map(|stage| attempt_stage(stage, runner))
        .collect();

    let report_path = out_dir.join(REPORT_FILE_NAME);
    let report_exists = report_path.exists();
    let verdict = compute_verdict(report_exists, &records);
    log_verdict(&verdict, &report_path);

    Ok(RunReport {
        out_dir,
        report_path,
        report_exists,
        stages: records,
        verdict,
    })
}

/// The report's presence alone decides pass/fail; stage failures only warn.
pub fn compute_verdict(report_exists: bool, records: &[StageRecord]) -> RunVerdict {
    if !report_exists {
        return RunVerdict::Failed;
    }
    let failed_stages = failed_stage_names(records);
    if failed_stages.is_empty() {
        RunVerdict::Success
    } else {
        RunVerdict::SuccessWithWarnings { failed_stages }
    }
}

fn failed_stage_names(records: &[StageRecord]) -> Vec<&'static str> {
    records
        .iter()
        .filter(|record| !record.succeeded())
        .map(|record| record.kind.name())
        .collect()
}

fn attempt_stage(stage: &StageDescriptor, runner: &dyn StageRunner) -> StageRecord {
    let name = stage.name();
    if !runner.is_available(stage) {
        error!(
            "step failed: {name}: missing stage executable {}",
            stage.program.display()
        );
        return StageRecord {
            kind: stage.kind,
            outcome: StageOutcome::Missing,
            duration_ms: 0,
        };
    }

    info!("==> {name}: {}", runner.describe(stage));
    let start = Instant::now();
    let result = runner.run(stage);
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    debug!(stage = name, duration_ms, "stage finished");

    let outcome = match result {
        Ok(output) if output.success() => {
            if !output.stdout.is_empty() {
                info!("{}", output.stdout.trim_end());
            }
            StageOutcome::Succeeded(output)
        }
        Ok(output) => {
            log_stage_failure(name, &output);
            StageOutcome::Failed(output)
        }
        Err(err) => {
            error!("step failed: {name}");
            error!("{err:#}");
            StageOutcome::SpawnFailed(format!("{err:#}"))
        }
    };
    StageRecord {
        kind: stage.kind,
        outcome,
        duration_ms,
    }
}

fn log_stage_failure(name: &str, output: &StageOutput) {
    error!("step failed: {name}");
    error!("exit code: {}", output.status_string());
    if !output.stdout.is_empty() {
        error!("stdout:\n{}", output.stdout.trim_end());
    }
    if !output.stderr.is_empty() {
        error!("stderr:\n{}", output.stderr.trim_end());
    }
}

fn log_verdict(verdict: &RunVerdict, report_path: &Path) {
    match verdict {
        RunVerdict::Failed => {
            error!("{REPORT_FILE_NAME} not generated. Failing run.");
            return;
        }
        RunVerdict::SuccessWithWarnings { failed_stages } => {
            warn!("Some steps failed but {REPORT_FILE_NAME} exists:");
            for stage in failed_stages {
                warn!("  - {stage}");
            }
        }
        RunVerdict::Success => info!("All steps completed successfully."),
    }
    info!("Report generated: {}", report_path.display());
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
