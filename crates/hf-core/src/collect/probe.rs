//! Probes: single reads of one OS data source.
//!
//! A probe never raises. A missing file, an unreadable pseudo-filesystem
//! entry, an absent tool, or a failed spawn all report "absent" uniformly
//! (`None`); the caller decides what omission means. Command probes expose
//! both captured stdout and the exit status, because some parsers tolerate
//! partial output from a non-zero exit (the IPv6 route query).
//!
//! Every command probe is bounded by a timeout with SIGTERM → SIGKILL
//! escalation so a hung tool cannot stall the whole collection pass.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace, warn};

/// Default timeout per external command in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Maximum captured output per stream in bytes (1MB).
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Grace period between SIGTERM and SIGKILL in milliseconds.
const SIGTERM_GRACE_MS: u64 = 500;

/// Directories searched for external tools, in order. `ip` commonly lives
/// in a sbin directory that is not on a service account's PATH.
const TOOL_SEARCH_DIRS: &[&str] = &["/sbin", "/usr/sbin", "/bin", "/usr/bin", "/usr/local/bin"];

/// Read one file-backed data source.
///
/// Returns `None` on any failure: missing path, permission denied,
/// non-UTF-8 content.
pub fn read_file(path: impl AsRef<Path>) -> Option<String> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            trace!(path = %path.display(), error = %e, "probe absent");
            None
        }
    }
}

/// Read one file-backed data source and trim surrounding whitespace.
///
/// Sysfs attribute files carry a trailing newline; most single-value
/// probes want it gone.
pub fn read_file_trimmed(path: impl AsRef<Path>) -> Option<String> {
    read_file(path).map(|s| s.trim().to_string())
}

/// Whether a path exists. Presence itself is a signal for some probes
/// (`/proc/xen`, `/sys/fs/selinux`).
pub fn path_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Output captured from one external command probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutput {
    /// Captured standard output (lossy UTF-8, possibly truncated).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8, possibly truncated).
    pub stderr: String,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Whether the command hit its timeout and was killed.
    pub timed_out: bool,
    /// Wall-clock execution time.
    pub duration: Duration,
}

impl ProbeOutput {
    /// Whether the command exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// External command probe with a bounded execution time.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    timeout: Duration,
}

impl Default for CommandProbe {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl CommandProbe {
    /// Create a probe with the default timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a probe with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `cmd` with `args`, capturing output and exit status.
    ///
    /// Returns `None` only when the command cannot be run at all (not
    /// found, spawn failure). A non-zero exit still returns the captured
    /// output; callers treat it as absent unless their parser tolerates
    /// partial output.
    #[instrument(skip(self), fields(cmd = %cmd))]
    pub fn run(&self, cmd: &str, args: &[&str]) -> Option<ProbeOutput> {
        let resolved = resolve_command(cmd)?;

        let mut command = Command::new(&resolved);
        command.args(args);
        // A fixed locale keeps tool output shapes stable for the parsers.
        command.env("LC_ALL", "C");
        command.env("LANG", "C");

        let start = Instant::now();
        let mut child = match command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                debug!(cmd, error = %e, "command probe failed to spawn");
                return None;
            }
        };

        let (stdout, stderr, exit_code, timed_out) = self.wait_with_timeout(&mut child);
        let duration = start.elapsed();

        debug!(
            cmd,
            exit_code = ?exit_code,
            timed_out,
            duration_ms = duration.as_millis() as u64,
            "command probe complete"
        );

        Some(ProbeOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
            timed_out,
            duration,
        })
    }

    /// Poll the child until exit or deadline, draining output as it comes.
    fn wait_with_timeout(&self, child: &mut Child) -> (Vec<u8>, Vec<u8>, Option<i32>, bool) {
        let deadline = Instant::now() + self.timeout;
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut chunk = vec![0u8; 8192];
        let mut timed_out = false;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        loop {
            if Instant::now() >= deadline {
                timed_out = true;
                warn!("command probe timed out, killing");
                kill_with_grace(child);
                break;
            }

            let mut did_read = false;
            if let Some(ref mut out) = stdout {
                if let Ok(n) = try_read_nonblocking(out, &mut chunk) {
                    if n > 0 {
                        did_read = true;
                        append_capped(&mut stdout_buf, &chunk[..n]);
                    }
                }
            }
            if let Some(ref mut err) = stderr {
                if let Ok(n) = try_read_nonblocking(err, &mut chunk) {
                    if n > 0 {
                        did_read = true;
                        append_capped(&mut stderr_buf, &chunk[..n]);
                    }
                }
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    if let Some(ref mut out) = stdout {
                        drain_available(out, &mut stdout_buf, &mut chunk);
                    }
                    if let Some(ref mut err) = stderr {
                        drain_available(err, &mut stderr_buf, &mut chunk);
                    }
                    return (stdout_buf, stderr_buf, status.code(), timed_out);
                }
                Ok(None) => {
                    if !did_read {
                        thread::sleep(Duration::from_millis(10));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to wait for command probe");
                    break;
                }
            }
        }

        let exit_code = child.wait().ok().and_then(|s| s.code());
        (stdout_buf, stderr_buf, exit_code, timed_out)
    }
}

/// Run `cmd` with `args` under the default timeout.
pub fn run(cmd: &str, args: &[&str]) -> Option<ProbeOutput> {
    CommandProbe::new().run(cmd, args)
}

/// Resolve a command name to an executable path.
///
/// Absolute paths are used as-is if they exist. Bare names are looked up
/// on `PATH` first, then in the fixed sbin/bin search list.
fn resolve_command(cmd: &str) -> Option<PathBuf> {
    let candidate = Path::new(cmd);
    if candidate.is_absolute() {
        if candidate.exists() {
            return Some(candidate.to_path_buf());
        }
        trace!(cmd, "command probe absent");
        return None;
    }

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let full = dir.join(cmd);
            if full.exists() {
                return Some(full);
            }
        }
    }

    for dir in TOOL_SEARCH_DIRS {
        let full = Path::new(dir).join(cmd);
        if full.exists() {
            return Some(full);
        }
    }

    trace!(cmd, "command probe absent");
    None
}

/// Append a chunk to a capture buffer, honoring the output cap.
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8]) {
    let space = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
    if space > 0 {
        buf.extend_from_slice(&chunk[..chunk.len().min(space)]);
    }
}

/// Drain whatever is immediately available after the child exited.
///
/// Non-blocking, because a grandchild may still hold the pipe open.
fn drain_available<R: Read + std::os::unix::io::AsRawFd>(
    stream: &mut R,
    buf: &mut Vec<u8>,
    chunk: &mut [u8],
) {
    loop {
        match try_read_nonblocking(stream, chunk) {
            Ok(0) => break,
            Ok(n) => append_capped(buf, &chunk[..n]),
            Err(_) => break,
        }
    }
}

/// Kill a child with SIGTERM, then SIGKILL after the grace period.
fn kill_with_grace(child: &mut Child) {
    let pid = child.id() as i32;
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
    thread::sleep(Duration::from_millis(SIGTERM_GRACE_MS));
    if let Ok(None) = child.try_wait() {
        warn!(pid, "probe did not exit after SIGTERM, sending SIGKILL");
        unsafe {
            libc::kill(pid, libc::SIGKILL);
        }
        let _ = child.wait();
    }
}

/// Read from a stream without blocking.
///
/// Sets O_NONBLOCK for the read and restores the original flags after.
/// Returns Ok(0) when no data is available.
fn try_read_nonblocking<R: Read + std::os::unix::io::AsRawFd>(
    stream: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let fd = stream.as_raw_fd();

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }

    let was_nonblocking = (flags & libc::O_NONBLOCK) != 0;
    if !was_nonblocking {
        let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if result < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }

    let result = stream.read(buf);

    if !was_nonblocking {
        unsafe {
            libc::fcntl(fd, libc::F_SETFL, flags);
        }
    }

    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_file_absent_is_none() {
        assert!(read_file("/nonexistent/hostfacts/probe").is_none());
    }

    #[test]
    fn test_read_file_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mtu");
        std::fs::write(&path, "1500\n").unwrap();
        assert_eq!(read_file_trimmed(&path).as_deref(), Some("1500"));
    }

    #[test]
    fn test_command_probe_captures_stdout_and_exit() {
        let out = run("sh", &["-c", "echo hello"]).expect("sh exists");
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.success());
        assert!(!out.timed_out);
    }

    #[test]
    fn test_command_probe_nonzero_exit_is_visible() {
        let out = run("sh", &["-c", "echo partial; exit 3"]).expect("sh exists");
        assert_eq!(out.stdout.trim(), "partial");
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
    }

    #[test]
    fn test_command_probe_missing_tool_is_absent() {
        assert!(run("hostfacts-no-such-tool", &[]).is_none());
    }

    #[test]
    fn test_command_probe_timeout_kills() {
        let probe = CommandProbe::with_timeout(Duration::from_millis(200));
        let out = probe.run("sleep", &["30"]).expect("sleep exists");
        assert!(out.timed_out);
        assert!(out.duration < Duration::from_secs(10));
    }
}
