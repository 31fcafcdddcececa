//! Child process execution with captured output and an optional deadline

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of running an external tool to completion
#[derive(Debug)]
pub(crate) enum Finished {
    /// The process exited on its own
    Exited(Output),
    /// The deadline passed and the process was killed
    TimedOut(Duration),
}

/// Runs `command` with stdout and stderr captured.
///
/// Returns `Err` when the process could not be started or its status could
/// not be polled; in the latter case it has already been killed.
pub(crate) fn run_captured(command: &mut Command, timeout: Option<Duration>) -> io::Result<Finished> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let Some(timeout) = timeout else {
        return command.output().map(Finished::Exited);
    };

    let mut child = command.spawn()?;
    // Drain both pipes on their own threads so a chatty tool cannot block on
    // a full pipe while we poll.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_until(&mut child, Instant::now() + timeout, Child::try_wait)?;

    // After a kill, grandchildren may still hold the pipes open; the drain
    // threads are left detached rather than joined.
    Ok(match status {
        Some(status) => Finished::Exited(Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        }),
        None => Finished::TimedOut(timeout),
    })
}

/// Polls `child` until it exits or `deadline` passes.
///
/// The child is killed on timeout and when polling itself fails, so no
/// compiler outlives the call.
fn wait_until(
    child: &mut Child,
    deadline: Instant,
    mut poll: impl FnMut(&mut Child) -> io::Result<Option<ExitStatus>>,
) -> io::Result<Option<ExitStatus>> {
    loop {
        match poll(child) {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if Instant::now() >= deadline => {
                kill(child);
                return Ok(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill(child);
                return Err(e);
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::warn!("Failed to kill process {}: {}", child.id(), e);
    }
    let _ = child.wait();
}

/// Picks the most useful diagnostic text from a finished process.
pub(crate) fn diagnostic_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim_end().to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        return stdout.trim_end().to_string();
    }
    format!("process exited with {}", output.status)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stderr() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo oops >&2; exit 3"]);
        match run_captured(&mut command, None).unwrap() {
            Finished::Exited(output) => {
                assert_eq!(output.status.code(), Some(3));
                assert_eq!(diagnostic_text(&output), "oops");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_timeout_kills() {
        let mut command = Command::new("sh");
        command.args(["-c", "exec sleep 5"]);
        let started = Instant::now();
        let finished = run_captured(&mut command, Some(Duration::from_millis(100))).unwrap();
        assert!(matches!(finished, Finished::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_poll_error_kills_child() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);

        let result = wait_until(&mut child, deadline, |_| Err(io::Error::other("poll failed")));

        assert_eq!(result.unwrap_err().to_string(), "poll failed");
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_finishes_before_deadline() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo done"]);
        match run_captured(&mut command, Some(Duration::from_secs(10))).unwrap() {
            Finished::Exited(output) => {
                assert!(output.status.success());
                assert_eq!(diagnostic_text(&output), "done");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_program() {
        let mut command = Command::new("/nonexistent/shaderbuild-tool");
        assert!(run_captured(&mut command, None).is_err());
    }
}
