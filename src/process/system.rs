//! Process runner backed by `tokio::process`.

use super::{CommandSpec, OutputSink, ProcessOutcome, ProcessRunner, Tail};
use std::cell::RefCell;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Grace period for reaping a killed child
const KILL_GRACE: Duration = Duration::from_secs(10);

/// Runs commands on the host, streaming stdout and stderr line by line
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    /// Create a system runner
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        sink: &dyn OutputSink,
    ) -> std::io::Result<ProcessOutcome> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Tails live outside the timed future so a timeout still reports them.
        let out_tail = RefCell::new(Tail::default());
        let err_tail = RefCell::new(Tail::default());

        // Both pipes are drained concurrently so neither can fill up and block the child.
        let pump = async {
            tokio::join!(
                pump_lines(stdout, &out_tail, |line| sink.stdout_line(line)),
                pump_lines(stderr, &err_tail, |line| sink.stderr_line(line)),
            );
            child.wait().await
        };

        let result = tokio::time::timeout(spec.timeout, pump).await;

        let (exit_code, timed_out) = match result {
            Ok(status) => (status?.code(), false),
            Err(_elapsed) => {
                log::warn!(
                    "`{}` timed out after {}s, terminating",
                    spec,
                    spec.timeout.as_secs()
                );

                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill `{}`: {}", spec.program, e);
                }
                let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
                (None, true)
            }
        };

        Ok(ProcessOutcome {
            exit_code,
            timed_out,
            stdout: out_tail.into_inner().into_vec(),
            stderr: err_tail.into_inner().into_vec(),
        })
    }
}

/// Forward every line of `reader` to `emit` until EOF.
///
/// Lines that are not UTF-8 are decoded lossily so the pipe keeps draining.
async fn pump_lines<R, F>(reader: Option<R>, tail: &RefCell<Tail>, emit: F)
where
    R: AsyncRead + Unpin,
    F: Fn(&str),
{
    let Some(reader) = reader else {
        return;
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                emit(&line);
                tail.borrow_mut().push(line);
            }
            Err(e) => {
                log::debug!("Stopped reading process output: {}", e);
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        out: RefCell<Vec<String>>,
        err: RefCell<Vec<String>>,
    }

    impl OutputSink for Recorder {
        fn stdout_line(&self, line: &str) {
            self.out.borrow_mut().push(line.to_string());
        }
        fn stderr_line(&self, line: &str) {
            self.err.borrow_mut().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn streams_stdout_and_stderr_separately() {
        let recorder = Recorder::default();
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err 1>&2; exit 3"]);

        let outcome = SystemRunner::new().run(&spec, &recorder).await.unwrap();

        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.success());
        assert_eq!(*recorder.out.borrow(), vec!["out".to_string()]);
        assert_eq!(*recorder.err.borrow(), vec!["err".to_string()]);
        assert_eq!(outcome.stderr, vec!["err".to_string()]);
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();
        let spec = CommandSpec::new("pwd").current_dir(dir.path());

        let outcome = SystemRunner::new().run(&spec, &recorder).await.unwrap();

        assert!(outcome.success());
        let printed = std::path::PathBuf::from(&recorder.out.borrow()[0]);
        assert_eq!(
            printed.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn kills_process_after_timeout() {
        let spec = CommandSpec::new("sleep")
            .arg("30")
            .timeout(Duration::from_millis(200));

        let outcome = SystemRunner::new()
            .run(&spec, &super::super::NullSink)
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn undecodable_output_does_not_stop_the_stream() {
        let recorder = Recorder::default();
        let script = "printf 'caf\\351\\n'; i=0; while [ $i -lt 2000 ]; do echo line $i; i=$((i+1)); done; exit 0";
        let spec = CommandSpec::new("sh").args(["-c", script]);

        let outcome = SystemRunner::new().run(&spec, &recorder).await.unwrap();

        assert!(outcome.success(), "outcome: {outcome:?}");
        let out = recorder.out.borrow();
        assert_eq!(out.len(), 2001);
        assert_eq!(out[0], "caf\u{FFFD}");
        assert_eq!(out[2000], "line 1999");
        assert_eq!(outcome.stdout.len(), crate::process::OUTPUT_TAIL_LINES);
    }

    #[tokio::test]
    async fn timeout_keeps_stderr_tail() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo 'fatal: stalled' 1>&2; sleep 30"])
            .timeout(Duration::from_millis(500));

        let outcome = SystemRunner::new()
            .run(&spec, &super::super::NullSink)
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.stderr, vec!["fatal: stalled".to_string()]);

        let failure = outcome.check(&spec).unwrap_err();
        assert!(failure.to_string().contains("fatal: stalled"));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let spec = CommandSpec::new("definitely-not-a-real-program-7f3a");
        let result = SystemRunner::new().run(&spec, &super::super::NullSink).await;
        assert!(result.is_err());
    }
}
