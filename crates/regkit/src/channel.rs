#![allow(missing_docs)]

//! Run an external tool and capture what it prints.
//!
//! Standard output and standard error go to the same pipe, so the capture
//! holds both interleaved the way the tool wrote them. Only the first
//! `capacity - 1` bytes are kept; anything after that is read and dropped.
//!
//! Reading stops shortly after the tool itself exits, even if a process it
//! left behind still holds the pipe open.

use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Capture capacity used unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 4096;

/// How long output is still collected after the tool has exited.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Running the tool or collecting its output failed.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to create the output pipe: {0}")]
    Pipe(#[source] std::io::Error),

    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for `{program}` to exit: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read the output of `{program}`: {source}")]
    Read {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` did not exit within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// What one run of a tool printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    bytes: Vec<u8>,
    truncated: bool,
    exit_code: Option<i32>,
}

impl CapturedOutput {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The capture as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Did the tool print more than was kept?
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// `None` if the tool was ended by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

/// Spawns tools and captures their combined output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessChannel {
    capacity: usize,
    timeout: Option<Duration>,
}

impl Default for ProcessChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ProcessChannel {
    /// Keep at most `capacity - 1` bytes of output. Waits forever.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            timeout: None,
        }
    }

    /// Fail with `TimedOut` if a call takes longer than `timeout`.
    /// The tool is killed when that happens.
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        Self { timeout, ..self }
    }

    /// Run `command` to completion and return what it printed.
    /// A non-zero exit is not an error here.
    #[tracing::instrument(skip_all, fields(command = %command))]
    pub async fn run(&self, command: &CommandLine) -> ChannelResult<CapturedOutput> {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let program = command.program.clone();
        let (reader, writer) = std::io::pipe().map_err(ChannelError::Pipe)?;
        let stderr_writer = writer.try_clone().map_err(ChannelError::Pipe)?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer)
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        let mut child = cmd.spawn().map_err(|source| ChannelError::Spawn {
            program: program.clone(),
            source,
        })?;
        // Our copies of the write end must go, or the reader never sees the end.
        drop(cmd);

        // A plain thread, so a reader stuck on a leftover writer never holds
        // up runtime shutdown.
        let limit = self.capacity.saturating_sub(1);
        let capture = Arc::new(Mutex::new(Capture::default()));
        let (s_done, r_done) = oneshot::channel();
        let shared = capture.clone();
        std::thread::Builder::new()
            .name("regkit-capture".into())
            .spawn(move || {
                let _ = s_done.send(read_bounded(reader, limit, &shared));
            })
            .map_err(|source| ChannelError::Read {
                program: program.clone(),
                source,
            })?;

        let waited = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(error = %e, "failed to kill timed out child");
                    }
                    return Err(ChannelError::TimedOut { program, timeout });
                }
            },
            None => child.wait().await,
        };
        let status = waited.map_err(|source| ChannelError::Wait {
            program: program.clone(),
            source,
        })?;

        let grace = Instant::now() + DRAIN_GRACE;
        let drain_until = deadline.map_or(grace, |deadline| grace.min(deadline));
        match tokio::time::timeout_at(drain_until, r_done).await {
            Ok(read) => read
                .unwrap_or_else(|e| Err(std::io::Error::other(e)))
                .map_err(|source| ChannelError::Read {
                    program: program.clone(),
                    source,
                })?,
            Err(_) => tracing::debug!("output pipe still open after the tool exited"),
        }
        let Capture { kept, truncated } = std::mem::take(&mut *capture.lock());
        tracing::debug!(status = %status, len = kept.len(), truncated, "tool finished");

        Ok(CapturedOutput {
            bytes: kept,
            truncated,
            exit_code: status.code(),
        })
    }
}

/// Output collected so far.
#[derive(Debug, Default)]
struct Capture {
    kept: Vec<u8>,
    truncated: bool,
}

impl Capture {
    /// Keep what fits under `limit` and note whether anything was dropped.
    fn push(&mut self, chunk: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.kept.len()).min(chunk.len());
        self.kept.extend_from_slice(&chunk[..room]);
        self.truncated |= room < chunk.len();
    }
}

/// Read `reader` to the end, keeping the first `limit` bytes in `capture`.
fn read_bounded(
    mut reader: impl Read,
    limit: usize,
    capture: &Mutex<Capture>,
) -> std::io::Result<()> {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => capture.lock().push(&buf[..n], limit),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(input: &[u8], limit: usize) -> (Vec<u8>, bool) {
        let capture = Mutex::new(Capture::default());
        read_bounded(input, limit, &capture).unwrap();
        let Capture { kept, truncated } = capture.into_inner();
        (kept, truncated)
    }

    #[test]
    fn read_bounded_keeps_prefix() {
        let (kept, truncated) = read_all(b"hello world", 5);
        assert_eq!(b"hello", kept.as_slice());
        assert!(truncated);

        let (kept, truncated) = read_all(b"hi", 5);
        assert_eq!(b"hi", kept.as_slice());
        assert!(!truncated);

        let (kept, truncated) = read_all(b"exact", 5);
        assert_eq!(b"exact", kept.as_slice());
        assert!(!truncated);
    }

    #[test]
    fn capture_push_across_chunks() {
        let mut capture = Capture::default();
        capture.push(b"abc", 5);
        capture.push(b"de", 5);
        assert!(!capture.truncated);
        capture.push(b"f", 5);
        assert_eq!(b"abcde", capture.kept.as_slice());
        assert!(capture.truncated);
    }

    #[test]
    fn command_line_display() {
        let cmd = CommandLine::new("REG")
            .arg("FLAGS")
            .arg(r"HKLM\SOFTWARE")
            .arg("QUERY");
        assert_eq!("REG", cmd.program);
        assert_eq!(r"REG FLAGS HKLM\SOFTWARE QUERY", cmd.to_string());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn spawn_failure() {
        let err = ProcessChannel::default()
            .run(&CommandLine::new("regkit-no-such-tool-0b7e"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn sh(script: &str) -> CommandLine {
        CommandLine::new("sh").arg("-c").arg(script)
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn captures_stdout_and_stderr() {
        let out = ProcessChannel::default()
            .run(&sh("printf out; printf err >&2"))
            .await
            .unwrap();
        assert_eq!("outerr", out.text());
        assert!(!out.truncated());
        assert_eq!(Some(0), out.exit_code());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn non_zero_exit_is_not_a_failure() {
        let out = ProcessChannel::default()
            .run(&sh("printf 'ERROR: bad key'; exit 3"))
            .await
            .unwrap();
        assert_eq!("ERROR: bad key", out.text());
        assert_eq!(Some(3), out.exit_code());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn long_output_is_truncated() {
        let out = ProcessChannel::new(DEFAULT_CAPACITY)
            .run(&sh("i=0; while [ $i -lt 200 ]; do printf '%0100d' 0; i=$((i+1)); done"))
            .await
            .unwrap();
        assert_eq!(DEFAULT_CAPACITY - 1, out.as_bytes().len());
        assert!(out.as_bytes().iter().all(|b| *b == b'0'));
        assert!(out.truncated());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn output_larger_than_a_pipe_does_not_block() {
        let out = ProcessChannel::new(16)
            .run(&sh("head -c 300000 /dev/zero"))
            .await
            .unwrap();
        assert_eq!(15, out.as_bytes().len());
        assert!(out.truncated());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn timeout_kills_the_tool() {
        let err = ProcessChannel::default()
            .with_timeout(Some(Duration::from_millis(200)))
            .run(&CommandLine::new("sleep").arg("5"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::TimedOut { .. }));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn leftover_background_process_does_not_hold_the_call() {
        let started = std::time::Instant::now();
        let out = ProcessChannel::default()
            .with_timeout(Some(Duration::from_secs(1)))
            .run(&sh("echo x; sleep 6 &"))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(out.text().contains('x'));
        assert_eq!(Some(0), out.exit_code());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn timeout_bounds_the_whole_call() {
        let started = std::time::Instant::now();
        let err = ProcessChannel::default()
            .with_timeout(Some(Duration::from_secs(1)))
            .run(&sh("sleep 6; echo x"))
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(err, ChannelError::TimedOut { .. }));
    }
}
