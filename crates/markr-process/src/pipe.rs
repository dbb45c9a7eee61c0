//! Concurrent stdin/stdout/stderr relaying for a child process.

use std::fmt;
use std::io::{self, Read, Write};
use std::process::{ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, ScopedJoinHandle};

/// Relay copy buffer size.
const RELAY_BUFFER: usize = 8 * 1024;

/// One of the three standard channels of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        })
    }
}

/// A relay that could not move all of its bytes.
#[derive(Debug, thiserror::Error)]
#[error("{channel} relay failed: {source}")]
pub struct RelayError {
    /// Channel the relay was attached to.
    pub channel: Channel,
    /// Underlying I/O failure.
    #[source]
    pub source: io::Error,
}

/// Error returned by [`run`].
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The command could not be started.
    #[error("starting command {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// Waiting for the child to exit failed.
    #[error("waiting for command {program:?}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The child exited unsuccessfully.
    ///
    /// Relay failures observed during the same run are attached as secondary
    /// diagnostics; the exit status is the primary cause.
    #[error("command {program:?} exited with {status}{}", relay_summary(.relays))]
    Exit {
        program: String,
        status: ExitStatus,
        relays: Vec<RelayError>,
    },
    /// The child succeeded but one of its streams was not fully relayed.
    #[error("command {program:?} succeeded but its {}", .source)]
    Relay {
        program: String,
        #[source]
        source: RelayError,
    },
}

impl ProcessError {
    /// Exit code of the child, if it exited normally with a failure status.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { status, .. } => status.code(),
            _ => None,
        }
    }
}

fn relay_summary(relays: &[RelayError]) -> String {
    if relays.is_empty() {
        return String::new();
    }
    let joined = relays
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!(" ({joined})")
}

/// Render a command line for logs and error messages.
#[must_use]
pub fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `command`, feeding it `input` and relaying its output streams.
///
/// The child's stdin, stdout and stderr are replaced with pipes. Three scoped
/// threads then run alongside the child: one writes `input` to stdin and
/// closes it, one copies stdout into `stdout`, one copies stderr into
/// `stderr`. The call returns only after the child has exited and all three
/// relays have finished.
///
/// A child that exits without reading all of its input is not an error: the
/// resulting broken pipe on stdin is ignored. If a sink rejects a write, the
/// relay keeps draining (and discarding) the channel so the child can never
/// block on a full pipe; the failure is reported after the child exits.
///
/// # Errors
///
/// - [`ProcessError::Spawn`] if the command cannot be started
/// - [`ProcessError::Exit`] if it exits unsuccessfully, with any relay
///   failures attached
/// - [`ProcessError::Relay`] if it succeeds but a relay failed
pub fn run<O, E>(
    command: &mut Command,
    input: &[u8],
    stdout: &mut O,
    stderr: &mut E,
) -> Result<(), ProcessError>
where
    O: Write + Send + ?Sized,
    E: Write + Send + ?Sized,
{
    let program = command.get_program().to_string_lossy().into_owned();
    tracing::info!(command = %describe(command), input_bytes = input.len(), "running");

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

    let child_stdin = child.stdin.take();
    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();

    let (status, outcomes) = thread::scope(|scope| {
        let feeder = scope.spawn(move || feed(child_stdin, input));
        let out = scope.spawn(move || drain(child_stdout, stdout));
        let err = scope.spawn(move || drain(child_stderr, stderr));

        let status = child.wait();
        let outcomes = [
            (Channel::Stdin, join(feeder)),
            (Channel::Stdout, join(out)),
            (Channel::Stderr, join(err)),
        ];
        (status, outcomes)
    });

    let status = status.map_err(|source| ProcessError::Wait {
        program: program.clone(),
        source,
    })?;

    let relays: Vec<RelayError> = outcomes
        .into_iter()
        .filter_map(|(channel, outcome)| outcome.err().map(|source| RelayError { channel, source }))
        .collect();
    for relay in &relays {
        tracing::warn!(
            command = %program,
            channel = %relay.channel,
            "relay failed: {}",
            relay.source
        );
    }

    if !status.success() {
        return Err(ProcessError::Exit {
            program,
            status,
            relays,
        });
    }
    if let Some(source) = relays.into_iter().next() {
        return Err(ProcessError::Relay { program, source });
    }

    tracing::debug!(command = %program, "finished");
    Ok(())
}

/// Write all of `input` to the child's stdin, then close it.
fn feed(pipe: Option<ChildStdin>, input: &[u8]) -> io::Result<()> {
    let Some(mut pipe) = pipe else {
        return Ok(());
    };
    match pipe.write_all(input) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            tracing::debug!("child closed stdin before consuming all input");
            Ok(())
        }
        result => result,
    }
    // Dropping `pipe` closes the child's stdin.
}

/// Copy a child output channel into `sink` until end of stream.
///
/// After the first sink failure the remaining bytes are read and discarded.
fn drain<R, W>(pipe: Option<R>, sink: &mut W) -> io::Result<()>
where
    R: Read,
    W: Write + ?Sized,
{
    let Some(mut pipe) = pipe else {
        return Ok(());
    };
    let mut buf = [0u8; RELAY_BUFFER];
    let mut failure = None;
    loop {
        let n = match pipe.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(failure.unwrap_or(e)),
        };
        if failure.is_none()
            && let Err(e) = sink.write_all(&buf[..n])
        {
            failure = Some(e);
        }
    }
    if failure.is_none()
        && let Err(e) = sink.flush()
    {
        failure = Some(e);
    }
    failure.map_or(Ok(()), Err)
}

fn join(handle: ScopedJoinHandle<'_, io::Result<()>>) -> io::Result<()> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("relay thread panicked")))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(script);
        command
    }

    /// Sink that rejects every write.
    struct Rejecting;

    impl Write for Rejecting {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("sink full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_input_is_relayed_to_output() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        run(&mut sh("cat"), b"@startuml\nA -> B\n@enduml\n", &mut out, &mut err).unwrap();

        assert_eq!(out, b"@startuml\nA -> B\n@enduml\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_diagnostics_are_kept_out_of_output() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        run(
            &mut sh("echo payload; echo warning >&2"),
            b"",
            &mut out,
            &mut err,
        )
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "payload\n");
        assert_eq!(String::from_utf8(err).unwrap(), "warning\n");
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = run(&mut sh("echo broken >&2; exit 3"), b"", &mut out, &mut err);

        let error = result.unwrap_err();
        assert_eq!(error.exit_code(), Some(3));
        assert!(matches!(&error, ProcessError::Exit { relays, .. } if relays.is_empty()));
        assert_eq!(String::from_utf8(err).unwrap(), "broken\n");
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut command = Command::new("/nonexistent/markr-test-tool");
        let result = run(&mut command, b"", &mut out, &mut err);

        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    /// The child writes far more to stderr than a pipe can buffer while only
    /// reading one byte of a large input. Any relay run inline would hang.
    #[test]
    fn test_heavy_diagnostics_with_unread_input_does_not_deadlock() {
        let script = "head -c 1 >/dev/null; i=0; \
                      while [ $i -lt 4000 ]; do \
                      echo \"diagnostic line $i padded to exceed the pipe buffer\" >&2; \
                      i=$((i+1)); done; echo done";
        let input = vec![b'x'; 4 * 1024 * 1024];
        let mut out = Vec::new();
        let mut err = Vec::new();

        run(&mut sh(script), &input, &mut out, &mut err).unwrap();

        assert_eq!(out, b"done\n");
        assert!(err.len() > 64 * 1024);
    }

    #[test]
    fn test_heavy_diagnostics_keep_real_exit_status() {
        let script = "i=0; while [ $i -lt 4000 ]; do \
                      echo \"noise $i noise noise noise noise noise noise noise\" >&2; \
                      i=$((i+1)); done; exit 7";
        let input = vec![b'x'; 1024 * 1024];
        let mut out = Vec::new();
        let mut err = Vec::new();

        let error = run(&mut sh(script), &input, &mut out, &mut err).unwrap_err();
        assert_eq!(error.exit_code(), Some(7));
    }

    #[test]
    fn test_rejecting_sink_does_not_block_child() {
        let script = "i=0; while [ $i -lt 4000 ]; do \
                      echo \"output line $i output output output output output\"; \
                      i=$((i+1)); done";
        let mut err = Vec::new();

        let error = run(&mut sh(script), b"", &mut Rejecting, &mut err).unwrap_err();
        match error {
            ProcessError::Relay { source, .. } => assert_eq!(source.channel, Channel::Stdout),
            other => panic!("expected relay error, got {other:?}"),
        }
    }

    #[test]
    fn test_relay_errors_are_secondary_to_exit_status() {
        let mut out = Vec::new();
        let error = run(
            &mut sh("echo oops >&2; exit 2"),
            b"",
            &mut out,
            &mut Rejecting,
        )
        .unwrap_err();

        assert_eq!(error.exit_code(), Some(2));
        let message = error.to_string();
        assert!(message.contains("stderr relay failed"), "{message}");
    }

    #[test]
    fn test_describe_joins_program_and_args() {
        let mut command = Command::new("inkscape");
        command.args(["--export-dpi", "300", "--file", "/dev/stdin"]);
        assert_eq!(describe(&command), "inkscape --export-dpi 300 --file /dev/stdin");
    }
}
