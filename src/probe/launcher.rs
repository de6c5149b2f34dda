//! Platform layer: launching a continuous `ping` and reading its output.

use std::fmt::Debug;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, Command};

use super::ProbeError;

/// Placeholder replaced by the host in [`SystemPing`] argument templates.
pub const HOST_PLACEHOLDER: &str = "{host}";

/// Starts a continuous ping to a host and hands back its output lines.
///
/// Implementations must be callable from inside a tokio runtime; the
/// probe invokes this from its own task.
pub trait PingLauncher: Send + Sync + Debug {
    fn start_continuous_ping(&self, host: &str) -> Result<LineStream, ProbeError>;
}

/// Launches the operating system's `ping` program.
#[derive(Debug, Clone)]
pub struct SystemPing {
    program: String,
    args: Vec<String>,
}

impl Default for SystemPing {
    fn default() -> Self {
        Self::for_platform()
    }
}

impl SystemPing {
    /// `ping -t <host>` on Windows, `ping <host>` elsewhere. Both run until killed.
    pub fn for_platform() -> Self {
        let args = if cfg!(windows) {
            vec!["-t".to_string(), HOST_PLACEHOLDER.to_string()]
        } else {
            vec![HOST_PLACEHOLDER.to_string()]
        };
        Self {
            program: "ping".to_string(),
            args,
        }
    }

    /// Use a custom program and argument template.
    ///
    /// Every `{host}` inside an argument is replaced with the host. When no
    /// argument mentions `{host}`, the host is appended as the last argument.
    pub fn with_command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument list used for `host`.
    pub fn args_for(&self, host: &str) -> Vec<String> {
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(HOST_PLACEHOLDER, host))
            .collect();
        if !self.args.iter().any(|arg| arg.contains(HOST_PLACEHOLDER)) {
            args.push(host.to_string());
        }
        args
    }
}

impl PingLauncher for SystemPing {
    fn start_continuous_ping(&self, host: &str) -> Result<LineStream, ProbeError> {
        let child = Command::new(&self.program)
            .args(self.args_for(host))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProbeError::Spawn {
                host: host.to_string(),
                source,
            })?;

        LineStream::from_child(child).map_err(|source| ProbeError::Spawn {
            host: host.to_string(),
            source,
        })
    }
}

/// How a [`LineStream`]'s process ended when it was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// There was no process, or it had already exited.
    NotRunning,
    /// The process exited within the grace period.
    Graceful,
    /// The grace period elapsed and the process was killed.
    Forced,
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// A lazily read, effectively infinite sequence of output lines.
///
/// Owns the child process (if any) producing the lines; dropping the stream
/// kills it.
pub struct LineStream {
    lines: Lines<BufReader<BoxedReader>>,
    child: Option<Child>,
}

impl Debug for LineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineStream")
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

impl LineStream {
    /// Read lines from any async reader, with no process attached.
    ///
    /// ```
    /// use std::io::Cursor;
    /// use pingscope::LineStream;
    ///
    /// # tokio_test::block_on(async {
    /// let mut stream = LineStream::from_reader(Cursor::new(b"time=1 ms\n".to_vec()));
    /// assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("time=1 ms"));
    /// assert_eq!(stream.next_line().await.unwrap(), None);
    /// # });
    /// ```
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let reader: BoxedReader = Box::new(reader);
        Self {
            lines: BufReader::new(reader).lines(),
            child: None,
        }
    }

    /// Read lines from a spawned child's stdout.
    pub fn from_child(mut child: Child) -> io::Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stdout not piped"))?;
        let reader: BoxedReader = Box::new(stdout);
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            child: Some(child),
        })
    }

    /// Process id of the attached child, while it has not been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Next line, or `None` at end of stream. Cancel safe.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }

    /// Wait up to `timeout` for the attached process to exit.
    ///
    /// Returns `None` without a process or if it is still running.
    pub async fn wait_exit(&mut self, timeout: Duration) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        tokio::time::timeout(timeout, child.wait()).await.ok()?.ok()
    }

    /// Stop the attached process and reap it.
    ///
    /// Sends SIGTERM on unix and waits up to `grace`, then kills. On other
    /// platforms the process is killed straight away.
    pub async fn terminate(&mut self, grace: Duration) -> Termination {
        let Some(child) = self.child.as_mut() else {
            return Termination::NotRunning;
        };

        if let Ok(Some(_)) = child.try_wait() {
            return Termination::NotRunning;
        }

        if request_exit(child) {
            if let Ok(Ok(_)) = tokio::time::timeout(grace, child.wait()).await {
                return Termination::Graceful;
            }
        }

        if let Err(e) = child.start_kill() {
            tracing::warn!(error = %e, "Failed to kill ping process");
        }
        let _ = child.wait().await;
        Termination::Forced
    }
}

#[cfg(unix)]
fn request_exit(child: &Child) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return false;
    };
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_platform_args_place_host() {
        let ping = SystemPing::for_platform();
        let args = ping.args_for("8.8.8.8");
        assert_eq!(args.last().map(String::as_str), Some("8.8.8.8"));
        assert_eq!(ping.program(), "ping");
    }

    #[test]
    fn test_custom_template_substitutes_host() {
        let ping = SystemPing::with_command(
            "ping",
            vec!["-i".to_string(), "0.2".to_string(), "{host}".to_string()],
        );
        assert_eq!(ping.args_for("example.com"), vec!["-i", "0.2", "example.com"]);

        let ping = SystemPing::with_command("ping6", vec!["-n".to_string()]);
        assert_eq!(ping.args_for("::1"), vec!["-n", "::1"]);
    }

    #[tokio::test]
    async fn test_reader_stream_yields_lines_then_ends() {
        let mut stream = LineStream::from_reader(Cursor::new(b"a\nb\n".to_vec()));
        assert_eq!(stream.pid(), None);
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("a"));
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("b"));
        assert_eq!(stream.next_line().await.unwrap(), None);
        assert_eq!(stream.terminate(Duration::from_millis(10)).await, Termination::NotRunning);
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let ping = SystemPing::with_command("definitely-not-a-ping-binary", Vec::new());
        let err = ping.start_continuous_ping("localhost").unwrap_err();
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_stops_running_process() {
        let ping = SystemPing::with_command(
            "sh",
            vec![
                "-c".to_string(),
                "echo {host}; exec sleep 30".to_string(),
            ],
        );
        let mut stream = ping.start_continuous_ping("ready").unwrap();
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("ready"));
        assert!(stream.pid().is_some());

        let outcome = stream.terminate(Duration::from_secs(2)).await;
        assert_eq!(outcome, Termination::Graceful);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_kills_process_ignoring_sigterm() {
        let ping = SystemPing::with_command(
            "sh",
            vec![
                "-c".to_string(),
                "trap '' TERM; echo {host}; while true; do sleep 0.05; done".to_string(),
            ],
        );
        let mut stream = ping.start_continuous_ping("ready").unwrap();
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("ready"));

        let grace = Duration::from_millis(300);
        let started = std::time::Instant::now();
        let outcome = stream.terminate(grace).await;

        assert_eq!(outcome, Termination::Forced);
        assert!(started.elapsed() >= grace);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(stream.terminate(grace).await, Termination::NotRunning);
    }
}
