//! The four pipeline stages and the arguments each one receives.
use crate::config::{RunConfig, StageLayout};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    CollectRss,
    Normalize,
    DedupeRank,
    RenderReport,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::CollectRss,
        StageKind::Normalize,
        StageKind::DedupeRank,
        StageKind::RenderReport,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::CollectRss => "collect_rss",
            StageKind::Normalize => "normalize",
            StageKind::DedupeRank => "dedupe_rank",
            StageKind::RenderReport => "render_report",
        }
    }

    /// Arguments forwarded to this stage; each stage sees only its own subset.
    ///
    /// `out_dir` is forwarded as raw OS bytes so stages write where the
    /// orchestrator looks for the report.
    pub fn args(self, config: &RunConfig, out_dir: &Path) -> Vec<OsString> {
        let out_dir = out_dir.as_os_str().to_os_string();
        match self {
            StageKind::CollectRss => vec![
                os("--since_days"),
                os(config.since_days.to_string()),
                os("--topics"),
                os(config.topics_arg()),
                os("--max_items"),
                os(config.max_items.to_string()),
                os("--out_dir"),
                out_dir,
                os("--max_per_source"),
                os(config.max_per_source.to_string()),
            ],
            StageKind::Normalize => vec![os("--out_dir"), out_dir],
            StageKind::DedupeRank => vec![
                os("--out_dir"),
                out_dir,
                os("--max_items"),
                os(config.max_items.to_string()),
            ],
            StageKind::RenderReport => vec![
                os("--out_dir"),
                out_dir,
                os("--topics"),
                os(config.topics_arg()),
                os("--lang"),
                os(config.lang.as_str()),
            ],
        }
    }
}

fn os(value: impl Into<OsString>) -> OsString {
    value.into()
}

/// One stage invocation, consumed exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    pub kind: StageKind,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl StageDescriptor {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Build the descriptors for a run, in execution order.
pub fn plan_stages(
    config: &RunConfig,
    out_dir: &Path,
    layout: &StageLayout,
) -> Vec<StageDescriptor> {
    StageKind::ALL
        .iter()
        .map(|&kind| StageDescriptor {
            kind,
            program: layout.executable_path(kind.name()),
            args: kind.args(config, out_dir),
        })
        .collect()
}
