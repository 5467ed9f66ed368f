//! Run configuration and stage layout.
//!
//! Defaults are built by plain constructors so a run is fully described by
//! its `RunConfig` plus the `StageLayout` that locates the executables.
use crate::cli::RunArgs;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SINCE_DAYS: i64 = 7;
pub const DEFAULT_TOPICS: [&str; 2] = ["LLM", "Agent"];
pub const DEFAULT_LANG: &str = "zh";
pub const DEFAULT_MAX_ITEMS: i64 = 12;
pub const DEFAULT_MAX_PER_SOURCE: i64 = 30;

/// Parent of the dated default output directories.
pub const RUNS_DIR: &str = "runs";

/// Immutable parameters for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub since_days: i64,
    pub topics: Vec<String>,
    pub lang: String,
    pub max_items: i64,
    /// Explicit output directory; `None` means `runs/<today>`.
    pub out_dir: Option<PathBuf>,
    pub max_per_source: i64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            since_days: DEFAULT_SINCE_DAYS,
            topics: DEFAULT_TOPICS.iter().map(|topic| topic.to_string()).collect(),
            lang: DEFAULT_LANG.to_string(),
            max_items: DEFAULT_MAX_ITEMS,
            out_dir: None,
            max_per_source: DEFAULT_MAX_PER_SOURCE,
        }
    }
}

impl RunConfig {
    /// Apply CLI overrides on top of the defaults.
    pub fn from_args(args: &RunArgs) -> Self {
        let defaults = Self::default();
        Self {
            since_days: args.since_days.unwrap_or(defaults.since_days),
            topics: args
                .topics
                .as_deref()
                .map(split_topics)
                .unwrap_or(defaults.topics),
            lang: args.lang.clone().unwrap_or(defaults.lang),
            max_items: args.max_items.unwrap_or(defaults.max_items),
            out_dir: args.out_dir.clone(),
            max_per_source: args.max_per_source.unwrap_or(defaults.max_per_source),
        }
    }

    /// Topic filter in the comma-separated form the stages accept.
    ///
    /// Joining the unmodified split pieces reproduces the caller's string.
    pub fn topics_arg(&self) -> String {
        self.topics.join(",")
    }

    pub fn resolve_out_dir(&self, today: NaiveDate) -> PathBuf {
        match &self.out_dir {
            Some(path) => path.clone(),
            None => default_out_dir(today),
        }
    }
}

fn split_topics(raw: &str) -> Vec<String> {
    raw.split(',').map(|topic| topic.to_string()).collect()
}

pub fn default_out_dir(today: NaiveDate) -> PathBuf {
    Path::new(RUNS_DIR).join(today.format("%Y-%m-%d").to_string())
}

/// Create the output directory and any missing parents.
pub fn ensure_out_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create output dir {}", path.display()))
}

/// Command prefix used to launch stages that are not directly executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Where the stage executables live and how they are launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLayout {
    pub stage_dir: PathBuf,
    pub extension: Option<String>,
    pub interpreter: Option<Interpreter>,
}

impl StageLayout {
    pub fn from_args(args: &RunArgs) -> Result<Self> {
        let stage_dir = match &args.stage_dir {
            Some(dir) => dir.clone(),
            None => default_stage_dir()?,
        };
        let extension = args
            .stage_ext
            .as_deref()
            .map(|ext| ext.trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(str::to_string);
        let interpreter = args
            .interpreter
            .as_deref()
            .map(parse_interpreter)
            .transpose()?;
        Ok(Self {
            stage_dir,
            extension,
            interpreter,
        })
    }

    /// Location of the executable for the stage called `name`.
    pub fn executable_path(&self, name: &str) -> PathBuf {
        let file_name = match &self.extension {
            Some(ext) => format!("{name}.{ext}"),
            None => name.to_string(),
        };
        self.stage_dir.join(file_name)
    }
}

fn default_stage_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locate run-weekly executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("executable {} has no parent directory", exe.display()))
}

fn parse_interpreter(raw: &str) -> Result<Interpreter> {
    let mut parts =
        shell_words::split(raw).with_context(|| format!("parse interpreter command: {raw}"))?;
    if parts.is_empty() {
        return Err(anyhow!("interpreter command is empty"));
    }
    let name = parts.remove(0);
    let program =
        which::which(&name).with_context(|| format!("resolve interpreter {name} on PATH"))?;
    Ok(Interpreter {
        program,
        args: parts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["run-weekly"];
        full.extend_from_slice(argv);
        RunArgs::try_parse_from(full).expect("parse args")
    }

    #[test]
    fn defaults_match_weekly_schedule() {
        let config = RunConfig::from_args(&args(&[]));
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.since_days, 7);
        assert_eq!(config.topics_arg(), "LLM,Agent");
        assert_eq!(config.lang, "zh");
        assert_eq!(config.max_items, 12);
        assert_eq!(config.max_per_source, 30);
        assert!(config.out_dir.is_none());
    }

    #[test]
    fn topics_round_trip_verbatim() {
        let config = RunConfig::from_args(&args(&["--topics", "LLM, Agent,,RAG"]));
        assert_eq!(config.topics.len(), 4);
        assert_eq!(config.topics_arg(), "LLM, Agent,,RAG");
    }

    #[test]
    fn out_dir_defaults_to_dated_runs_dir() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let config = RunConfig::default();
        assert_eq!(config.resolve_out_dir(today), PathBuf::from("runs/2024-01-01"));

        let explicit = RunConfig {
            out_dir: Some(PathBuf::from("/tmp/weekly")),
            ..RunConfig::default()
        };
        assert_eq!(explicit.resolve_out_dir(today), PathBuf::from("/tmp/weekly"));
    }

    #[test]
    fn ensure_out_dir_creates_parents() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let nested = temp.path().join("runs").join("2024-01-01");
        ensure_out_dir(&nested).expect("create nested dir");
        assert!(nested.is_dir());
        ensure_out_dir(&nested).expect("existing dir is fine");
    }

    #[test]
    fn executable_path_applies_extension() {
        let layout = StageLayout::from_args(&args(&["--stage_dir", "scripts", "--stage_ext", ".py"]))
            .expect("layout");
        assert_eq!(
            layout.executable_path("normalize"),
            PathBuf::from("scripts/normalize.py")
        );

        let bare = StageLayout::from_args(&args(&["--stage_dir", "bin"])).expect("layout");
        assert_eq!(bare.executable_path("normalize"), PathBuf::from("bin/normalize"));
    }

    #[test]
    fn stage_dir_defaults_next_to_executable() {
        let layout = StageLayout::from_args(&args(&[])).expect("layout");
        let exe = std::env::current_exe().expect("current exe");
        assert_eq!(Some(layout.stage_dir.as_path()), exe.parent());
    }

    #[cfg(unix)]
    #[test]
    fn interpreter_resolves_on_path() {
        let layout = StageLayout::from_args(&args(&["--interpreter", "sh -e"])).expect("layout");
        let interpreter = layout.interpreter.expect("interpreter");
        assert!(interpreter.program.is_absolute());
        assert_eq!(interpreter.args, vec!["-e".to_string()]);
    }

    #[test]
    fn rejects_blank_or_unknown_interpreter() {
        assert!(StageLayout::from_args(&args(&["--interpreter", "  "])).is_err());
        assert!(
            StageLayout::from_args(&args(&["--interpreter", "no-such-interpreter-xyz"])).is_err()
        );
    }
}
