//! Stage execution backends.
//!
//! The orchestrator only talks to `StageRunner`; `ProcessRunner` is the
//! production backend that launches each stage as a child process.
use crate::config::Interpreter;
use crate::stage::StageDescriptor;
use anyhow::{Context, Result};
use std::process::{Command, ExitStatus};

/// Captured outcome of one stage execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub exit_signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl StageOutput {
    #[cfg(test)]
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            exit_signal: None,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    fn from_process(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            exit_code: status.code(),
            exit_signal: exit_signal(&status),
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }

    /// Only a clean zero exit counts as success.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn status_string(&self) -> String {
        match (self.exit_code, self.exit_signal) {
            (Some(code), _) => format!("{code}"),
            (None, Some(signal)) => format!("terminated by signal {signal}"),
            (None, None) => "terminated abnormally".to_string(),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Capability to execute one stage.
pub trait StageRunner {
    /// Whether the stage can be attempted at all; unavailable stages are
    /// recorded as failures without running anything.
    fn is_available(&self, stage: &StageDescriptor) -> bool {
        stage.program.exists()
    }

    /// Human-readable invocation used in logs.
    fn describe(&self, stage: &StageDescriptor) -> String {
        let mut argv = vec![stage.program.display().to_string()];
        argv.extend(stage.args.iter().map(|arg| arg.to_string_lossy().into_owned()));
        shell_words::join(argv)
    }

    /// Run the stage to completion. `Err` means it could not be started.
    fn run(&self, stage: &StageDescriptor) -> Result<StageOutput>;
}

/// Runs stages as child processes, blocking until each one exits.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    interpreter: Option<Interpreter>,
}

impl ProcessRunner {
    pub fn new(interpreter: Option<Interpreter>) -> Self {
        Self { interpreter }
    }

    fn argv(&self, stage: &StageDescriptor) -> Vec<String> {
        let mut argv = Vec::with_capacity(stage.args.len() + 2);
        if let Some(interpreter) = &self.interpreter {
            argv.push(interpreter.program.display().to_string());
            argv.extend(interpreter.args.iter().cloned());
        }
        argv.push(stage.program.display().to_string());
        argv.extend(stage.args.iter().map(|arg| arg.to_string_lossy().into_owned()));
        argv
    }

    fn command(&self, stage: &StageDescriptor) -> Command {
        match &self.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(&interpreter.program);
                command.args(&interpreter.args).arg(&stage.program);
                command.args(&stage.args);
                command
            }
            None => {
                let mut command = Command::new(&stage.program);
                command.args(&stage.args);
                command
            }
        }
    }
}

impl StageRunner for ProcessRunner {
    fn describe(&self, stage: &StageDescriptor) -> String {
        shell_words::join(self.argv(stage))
    }

    fn run(&self, stage: &StageDescriptor) -> Result<StageOutput> {
        let output = self
            .command(stage)
            .output()
            .with_context(|| format!("spawn stage {}: {}", stage.name(), stage.program.display()))?;
        Ok(StageOutput::from_process(
            output.status,
            &output.stdout,
            &output.stderr,
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::stage::StageKind;
    use std::ffi::OsString;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn write_script(dir: &Path, name: &str, body: &str, executable: bool) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mode = if executable { 0o755 } else { 0o644 };
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .expect("set permissions");
        path
    }

    fn descriptor(program: PathBuf, args: &[&str]) -> StageDescriptor {
        StageDescriptor {
            kind: StageKind::Normalize,
            program,
            args: args.iter().map(OsString::from).collect(),
        }
    }

    #[test]
    fn captures_stdout_stderr_and_exit_code() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let script = write_script(
            temp.path(),
            "normalize",
            "echo \"out:$1:$2\"\necho oops >&2\nexit 3",
            true,
        );
        let output = ProcessRunner::default()
            .run(&descriptor(script, &["--out_dir", "x y"]))
            .expect("run stage");

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout, "out:--out_dir:x y\n");
        assert_eq!(output.stderr, "oops\n");
        assert_eq!(output.status_string(), "3");
    }

    #[test]
    fn zero_exit_is_success() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let script = write_script(temp.path(), "normalize", "exit 0", true);
        let output = ProcessRunner::default()
            .run(&descriptor(script, &[]))
            .expect("run stage");
        assert!(output.success());
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn signal_termination_is_failure() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let script = write_script(temp.path(), "normalize", "kill -9 $$", true);
        let output = ProcessRunner::default()
            .run(&descriptor(script, &[]))
            .expect("run stage");
        assert!(!output.success());
        assert_eq!(output.exit_code, None);
        assert_eq!(output.exit_signal, Some(9));
        assert_eq!(output.status_string(), "terminated by signal 9");
    }

    #[test]
    fn interpreter_launches_non_executable_script() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let script = write_script(temp.path(), "normalize.sh", "echo \"$#\"", false);
        let runner = ProcessRunner::new(Some(Interpreter {
            program: PathBuf::from("/bin/sh"),
            args: Vec::new(),
        }));
        let stage = descriptor(script.clone(), &["--out_dir", "o"]);

        let output = runner.run(&stage).expect("run stage");
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "2");
        assert_eq!(
            runner.describe(&stage),
            format!("/bin/sh {} --out_dir o", script.display())
        );
    }

    #[test]
    fn unspawnable_stage_is_an_error() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let script = write_script(temp.path(), "normalize", "exit 0", false);
        assert!(ProcessRunner::default().run(&descriptor(script, &[])).is_err());
    }
}
