//! Child process execution with a timeout and bounded output capture.

use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::RunnerError;
use super::types::ProcessResult;

/// Longest line kept in a tail, in bytes.
const MAX_LINE_BYTES: usize = 4096;

/// Returns the last `n` lines of `text`.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// What to run: program, arguments, working directory and extra environment.
#[derive(Debug, Clone, Default)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Runs one child per call.
///
/// The child starts with an empty environment plus the allow-listed
/// variables from this process and the command's own variables. On unix it
/// leads its own process group, and the whole group is killed when the
/// timeout expires or when the returned future is dropped.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    inherit_env: Vec<String>,
    tail_lines: usize,
}

impl ProcessRunner {
    pub fn new(inherit_env: Vec<String>, tail_lines: usize) -> Self {
        Self {
            inherit_env,
            tail_lines: tail_lines.max(1),
        }
    }

    /// Runs `command` to completion or until `timeout`.
    ///
    /// Non-zero exit is [`RunnerError::Failed`]; expiry is
    /// [`RunnerError::Timeout`], after which the child has been killed and
    /// reaped.
    pub async fn run(
        &self,
        command: &ProcessCommand,
        timeout: Duration,
    ) -> Result<ProcessResult, RunnerError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env_clear();

        for key in &self.inherit_env {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }
        cmd.envs(&command.env);

        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| RunnerError::Spawn {
            program: command.program.clone(),
            reason: e.to_string(),
        })?;

        let mut group = ProcessGroup::new(child.id());

        debug!(
            program = %command.program.display(),
            pid = child.id(),
            "Process started"
        );

        let stdout_tail = Arc::new(Mutex::new(Tail::new(self.tail_lines)));
        let stderr_tail = Arc::new(Mutex::new(Tail::new(self.tail_lines)));
        let readers = Readers(vec![
            spawn_reader(child.stdout.take(), Arc::clone(&stdout_tail)),
            spawn_reader(child.stderr.take(), Arc::clone(&stderr_tail)),
        ]);

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    program = %command.program.display(),
                    timeout_secs = timeout.as_secs_f64(),
                    "Process timed out, killing"
                );
                group.kill();
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed out process");
                }
                drop(readers);
                return Err(RunnerError::Timeout {
                    timeout,
                    stderr_tail: snapshot(&stderr_tail),
                });
            }
        };

        group.disarm();

        // Pipes may be held open by grandchildren; don't wait on them forever.
        readers.finish(Duration::from_secs(2)).await;

        let result = ProcessResult {
            exit_code: status.code(),
            stdout_tail: snapshot(&stdout_tail),
            stderr_tail: snapshot(&stderr_tail),
            duration: started.elapsed(),
        };

        debug!(
            program = %command.program.display(),
            exit_code = ?result.exit_code,
            elapsed_ms = result.duration.as_millis() as u64,
            "Process exited"
        );

        if status.success() {
            Ok(result)
        } else {
            Err(RunnerError::Failed {
                exit_code: result.exit_code,
                stderr_tail: result.stderr_tail,
            })
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(vec!["PATH".to_string(), "HOME".to_string()], 40)
    }
}

/// Ring buffer of the most recent lines.
#[derive(Debug)]
struct Tail {
    lines: VecDeque<String>,
    max: usize,
}

impl Tail {
    fn new(max: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max),
            max,
        }
    }

    fn push(&mut self, raw: &[u8]) {
        let mut line = String::from_utf8_lossy(raw).trim_end_matches(['\r', '\n']).to_string();
        if line.len() > MAX_LINE_BYTES {
            let mut cut = MAX_LINE_BYTES;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
        }
        if self.lines.len() == self.max {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

fn snapshot(tail: &Mutex<Tail>) -> String {
    tail.lock().unwrap_or_else(|e| e.into_inner()).joined()
}

fn spawn_reader<R>(pipe: Option<R>, tail: Arc<Mutex<Tail>>) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let pipe = pipe?;
    Some(tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => tail.lock().unwrap_or_else(|e| e.into_inner()).push(&buf),
                Err(e) => {
                    debug!(error = %e, "Stopped reading process output");
                    break;
                }
            }
        }
    }))
}

/// Output reader tasks; aborted on drop.
struct Readers(Vec<Option<JoinHandle<()>>>);

impl Readers {
    async fn finish(mut self, grace: Duration) {
        for handle in self.0.iter_mut().flatten() {
            let _ = tokio::time::timeout(grace, handle).await;
        }
    }
}

impl Drop for Readers {
    fn drop(&mut self) {
        for handle in self.0.iter().flatten() {
            handle.abort();
        }
    }
}

/// The child's process group, killed on drop unless disarmed.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    /// Called once the leader has exited on its own.
    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg only sends a signal. A group that is already gone
    // yields ESRCH.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid, error = %err, "Failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

/// Checks that `path` is a non-empty regular file.
pub(crate) async fn output_exists(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_lines() {
        assert_eq!(tail_lines("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail_lines("a\nb", 5), "a\nb");
        assert_eq!(tail_lines("", 3), "");
    }

    #[test]
    fn test_tail_ring_buffer() {
        let mut tail = Tail::new(2);
        tail.push(b"one\n");
        tail.push(b"two\r\n");
        tail.push(b"three");
        assert_eq!(tail.joined(), "two\nthree");
    }

    #[test]
    fn test_tail_truncates_long_lines() {
        let mut tail = Tail::new(1);
        tail.push(&vec![b'x'; MAX_LINE_BYTES * 2]);
        assert_eq!(tail.joined().len(), MAX_LINE_BYTES);
    }

    #[test]
    fn test_tail_lossy_utf8() {
        let mut tail = Tail::new(1);
        tail.push(&[0x66, 0x6f, 0xff, 0x6f]);
        assert!(tail.joined().starts_with("fo"));
    }

    #[test]
    fn test_command_builder() {
        let command = ProcessCommand::new("sh")
            .arg("-c")
            .args(["exit 0"])
            .current_dir("/tmp")
            .env("A", "1");
        assert_eq!(command.program, PathBuf::from("sh"));
        assert_eq!(command.args, vec![OsString::from("-c"), OsString::from("exit 0")]);
        assert_eq!(command.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(command.env.get("A").map(String::as_str), Some("1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_captures_stdout() {
        let command = ProcessCommand::new("sh").args(["-c", "echo one; echo two; echo oops >&2"]);
        let result = ProcessRunner::default()
            .run(&command, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout_tail, "one\ntwo");
        assert_eq!(result.stderr_tail, "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_environment_is_allow_listed() {
        std::env::set_var("SWAPD_RUNNER_TEST_SECRET", "hunter2");
        let command = ProcessCommand::new("sh")
            .args(["-c", "echo \"secret=$SWAPD_RUNNER_TEST_SECRET extra=$EXTRA\""])
            .env("EXTRA", "yes");
        let result = ProcessRunner::default()
            .run(&command, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(result.stdout_tail, "secret= extra=yes");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let command = ProcessCommand::new("sh")
            .args(["-c", "pwd"])
            .current_dir(dir.path());
        let result = ProcessRunner::default()
            .run(&command, Duration::from_secs(10))
            .await
            .unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(PathBuf::from(result.stdout_tail).canonicalize().unwrap(), expected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr_tail() {
        let command = ProcessCommand::new("sh")
            .args(["-c", "echo 'face not found in source' >&2; exit 3"]);
        let err = ProcessRunner::default()
            .run(&command, Duration::from_secs(10))
            .await
            .unwrap_err();
        match err {
            RunnerError::Failed {
                exit_code,
                stderr_tail,
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr_tail, "face not found in source");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let command = ProcessCommand::new("/nonexistent/definitely-not-here");
        let err = ProcessRunner::default()
            .run(&command, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(err.is_spawn(), "got {:?}", err);
    }

    /// True while `pid` exists and is not a zombie.
    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid.trim())) {
            Ok(stat) => stat
                .rsplit_once(") ")
                .map(|(_, rest)| !rest.starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    async fn wait_until_gone(pid: &str) -> bool {
        for _ in 0..40 {
            if !is_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let grandchild_file = dir.path().join("grandchild");
        let script = format!(
            "sleep 30 & echo $! > '{}'; echo $$ > '{}'; wait",
            grandchild_file.display(),
            pid_file.display()
        );
        let command = ProcessCommand::new("sh").args(["-c", script.as_str()]);

        let started = Instant::now();
        let err = ProcessRunner::default()
            .run(&command, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "got {:?}", err);
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(wait_until_gone(&pid).await, "child {} still running", pid.trim());

        let grandchild = std::fs::read_to_string(&grandchild_file).unwrap();
        assert!(
            wait_until_gone(&grandchild).await,
            "grandchild {} still running",
            grandchild.trim()
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_run_kills_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let grandchild_file = dir.path().join("grandchild");
        let script = format!(
            "sleep 30 & echo $! > '{}'; wait",
            grandchild_file.display()
        );
        let command = ProcessCommand::new("sh").args(["-c", script.as_str()]);

        let runner = ProcessRunner::default();
        let run = runner.run(&command, Duration::from_secs(30));
        let cancelled = tokio::time::timeout(Duration::from_millis(500), run).await;
        assert!(cancelled.is_err());

        let grandchild = std::fs::read_to_string(&grandchild_file).unwrap();
        assert!(
            wait_until_gone(&grandchild).await,
            "grandchild {} still running",
            grandchild.trim()
        );
    }

    #[tokio::test]
    async fn test_output_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        assert!(!output_exists(&path).await);
        std::fs::write(&path, b"").unwrap();
        assert!(!output_exists(&path).await);
        std::fs::write(&path, b"data").unwrap();
        assert!(output_exists(&path).await);
        assert!(!output_exists(dir.path()).await);
    }
}
