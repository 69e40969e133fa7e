//! Helpers for running assistant processes with timeouts and bounded output.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long to keep draining pipes after a timed-out child was killed.
/// Grandchildren may still hold the pipes open; their output is abandoned.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Stdout as text, with a marker when bytes were dropped.
    pub fn stdout_text(&self) -> String {
        lossy_with_notice(&self.stdout, self.stdout_truncated, "stdout")
    }

    /// Stderr as text, with a marker when bytes were dropped.
    pub fn stderr_text(&self) -> String {
        lossy_with_notice(&self.stderr, self.stderr_truncated, "stderr")
    }
}

fn lossy_with_notice(bytes: &[u8], truncated: usize, label: &str) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if truncated > 0 {
        text.push_str(&format!("\n[{label} truncated {truncated} bytes]\n"));
    }
    text
}

/// Run `argv` with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Stdin is closed. Output is read concurrently while the child runs;
/// `output_limit_bytes` bounds what is kept in memory per stream (the rest is
/// drained and counted). A timed-out child is killed and reported through
/// `timed_out` rather than as an error.
#[instrument(skip_all, fields(program = argv.first().map(String::as_str), timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    argv: &[String],
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("empty command line"))?;
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {program}"));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_rx = spawn_reader(stdout, output_limit_bytes);
    let stderr_rx = spawn_reader(stderr, output_limit_bytes);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let grace = timed_out.then_some(DRAIN_GRACE);
    let (stdout, stdout_truncated) = collect_output(&stdout_rx, grace).context("collect stdout")?;
    let (stderr, stderr_truncated) = collect_output(&stderr_rx, grace).context("collect stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

type StreamResult = Result<(Vec<u8>, usize)>;

fn spawn_reader<R: Read + Send + 'static>(reader: R, limit: usize) -> Receiver<StreamResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver is gone once the caller stopped waiting.
        let _ = tx.send(read_stream_limited(reader, limit));
    });
    rx
}

/// Wait for a reader's result. With a `grace` period, a reader still blocked
/// after it yields empty output instead of holding up the caller.
fn collect_output(rx: &Receiver<StreamResult>, grace: Option<Duration>) -> StreamResult {
    match grace {
        None => rx
            .recv()
            .map_err(|_| anyhow!("output reader thread exited without a result"))?,
        Some(grace) => match rx.recv_timeout(grace) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!("output pipe still held open after kill, abandoning reader");
                Ok((Vec::new(), 0))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("output reader thread exited without a result"))
            }
        },
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn captures_output_and_exit_code() {
        let out = run_command_with_timeout(
            &sh("echo hello; echo oops >&2; exit 3"),
            Duration::from_secs(10),
            1000,
        )
        .expect("run");
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stdout_text(), "hello\n");
        assert_eq!(out.stderr_text(), "oops\n");
        assert!(!out.timed_out);
    }

    #[test]
    fn output_beyond_limit_is_counted_not_kept() {
        let out = run_command_with_timeout(&sh("printf 0123456789"), Duration::from_secs(10), 4)
            .expect("run");
        assert_eq!(out.stdout, b"0123");
        assert_eq!(out.stdout_truncated, 6);
        assert!(out.stdout_text().contains("[stdout truncated 6 bytes]"));
    }

    #[test]
    fn slow_command_is_killed_on_timeout() {
        let out = run_command_with_timeout(&sh("sleep 5"), Duration::from_millis(200), 1000)
            .expect("run");
        assert!(out.timed_out);
        assert!(!out.status.success());
    }

    #[test]
    fn timeout_does_not_wait_for_grandchildren_holding_pipes() {
        let started = std::time::Instant::now();
        let out = run_command_with_timeout(&sh("sleep 4 & wait"), Duration::from_millis(300), 1000)
            .expect("run");
        assert!(out.timed_out);
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "blocked for {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn empty_argv_is_rejected() {
        let err = run_command_with_timeout(&[], Duration::from_secs(1), 10).unwrap_err();
        assert!(err.to_string().contains("empty command line"));
    }
}
