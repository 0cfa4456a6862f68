//! External process execution.
//!
//! Release steps describe commands as [`CommandSpec`]s and hand them to a
//! [`ProcessRunner`]. The runner streams output to an [`OutputSink`] while the
//! process runs and reports how it ended in a [`ProcessOutcome`].

mod system;

pub use system::SystemRunner;

use crate::error::ProcessFailure;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of trailing output lines kept per stream
pub const OUTPUT_TAIL_LINES: usize = 50;

/// Receives process output as it is produced
pub trait OutputSink {
    /// A line written to stdout
    fn stdout_line(&self, line: &str);
    /// A line written to stderr
    fn stderr_line(&self, line: &str);

    /// A step announcement from the caller, not from the process
    fn progress(&self, _message: &str) {}
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn stdout_line(&self, _line: &str) {}
    fn stderr_line(&self, _line: &str) {}
}

/// Description of a process to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments, passed verbatim without a shell
    pub args: Vec<String>,
    /// Working directory
    pub current_dir: Option<PathBuf>,
    /// Maximum run time before the process is killed
    pub timeout: Duration,
}

impl CommandSpec {
    /// New command with a default 900s timeout
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout: Duration::from_secs(900),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set the timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// How a process ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code; `None` when killed by a signal or timeout
    pub exit_code: Option<i32>,
    /// Set when the process was killed for exceeding its timeout
    pub timed_out: bool,
    /// Last [`OUTPUT_TAIL_LINES`] lines of stdout
    pub stdout: Vec<String>,
    /// Last [`OUTPUT_TAIL_LINES`] lines of stderr
    pub stderr: Vec<String>,
}

impl ProcessOutcome {
    /// Outcome of a process that exited with `code`
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    /// Whether the process exited with status 0
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Convert a non-successful outcome into a [`ProcessFailure`]
    pub fn check(self, spec: &CommandSpec) -> std::result::Result<Self, ProcessFailure> {
        if self.success() {
            return Ok(self);
        }

        Err(ProcessFailure {
            command: spec.to_string(),
            exit_code: self.exit_code,
            timed_out: self.timed_out.then_some(spec.timeout),
            stderr: self.stderr,
            spawn_error: None,
        })
    }
}

/// Runs external processes
pub trait ProcessRunner {
    /// Run `spec` to completion, streaming its output to `sink`.
    ///
    /// Returns `Err` only when the process could not be started. Non-zero
    /// exits and timeouts are reported through [`ProcessOutcome`].
    fn run(
        &self,
        spec: &CommandSpec,
        sink: &dyn OutputSink,
    ) -> impl Future<Output = std::io::Result<ProcessOutcome>>;
}

/// Run a command and require it to succeed
pub async fn run_checked<R: ProcessRunner + ?Sized>(
    runner: &R,
    spec: &CommandSpec,
    sink: &dyn OutputSink,
) -> std::result::Result<ProcessOutcome, ProcessFailure> {
    log::debug!("Running `{}`", spec);
    let outcome = runner
        .run(spec, sink)
        .await
        .map_err(|e| ProcessFailure::spawn(spec.to_string(), &e))?;
    outcome.check(spec)
}

/// Bounded buffer holding the last lines of a stream
#[derive(Debug, Default)]
pub(crate) struct Tail {
    lines: VecDeque<String>,
}

impl Tail {
    pub(crate) fn push(&mut self, line: String) {
        if self.lines.len() == OUTPUT_TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub(crate) fn into_vec(self) -> Vec<String> {
        self.lines.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_string_quotes_arguments_with_spaces() {
        let spec = CommandSpec::new("git")
            .args(["tag", "-m", "Release one"])
            .arg("");
        assert_eq!(spec.to_string(), "git tag -m 'Release one' ''");
    }

    #[test]
    fn check_reports_exit_code_and_stderr() {
        let spec = CommandSpec::new("git").arg("fetch");
        let outcome = ProcessOutcome {
            exit_code: Some(128),
            stderr: vec!["fatal: no remote".to_string()],
            ..ProcessOutcome::default()
        };

        let failure = outcome.check(&spec).unwrap_err();
        assert_eq!(failure.exit_code, Some(128));
        assert!(failure.to_string().contains("exited with code 128"));
        assert!(failure.to_string().contains("fatal: no remote"));
    }

    #[test]
    fn check_reports_timeout() {
        let spec = CommandSpec::new("php")
            .arg("composer.phar")
            .timeout(Duration::from_secs(900));
        let outcome = ProcessOutcome {
            timed_out: true,
            ..ProcessOutcome::default()
        };

        let failure = outcome.check(&spec).unwrap_err();
        assert_eq!(failure.timed_out, Some(Duration::from_secs(900)));
        assert!(failure.to_string().contains("timed out after 900s"));
    }

    #[test]
    fn tail_keeps_last_lines() {
        let mut tail = Tail::default();
        for i in 0..(OUTPUT_TAIL_LINES + 5) {
            tail.push(i.to_string());
        }
        let lines = tail.into_vec();
        assert_eq!(lines.len(), OUTPUT_TAIL_LINES);
        assert_eq!(lines[0], "5");
    }
}
