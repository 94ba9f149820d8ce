//! External command execution
//!
//! Commands that are neither builtins nor intercepted run as subprocesses
//! with the script's working directory, exported variables and queued
//! stdin. Output is collected and forwarded to the state's streams.

use std::io::{self, Read, Write};
use std::process::{Child, Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use crate::engine::{CmdResult, ExecHandler};
use crate::error::{ErrorKind, ScriptError};
use crate::state::State;

/// How long an external command may run before it is killed
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long pipes may stay open after their process group was killed
const KILL_GRACE: Duration = Duration::from_millis(200);

/// Runs commands as external processes.
#[derive(Debug, Clone)]
pub struct ExternalExec {
    pub timeout: Duration,
}

impl Default for ExternalExec {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT }
    }
}

impl ExternalExec {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ExecHandler for ExternalExec {
    fn exec(&self, state: &mut State, args: &[String]) -> Result<CmdResult, ScriptError> {
        let Some(program) = args.first() else {
            return Err(ScriptError::usage("exec", "program [args...]"));
        };

        let resolved = look_path(state, program).ok_or_else(|| {
            ScriptError::new(ErrorKind::NotFound, "command not found")
                .with_command(program.clone())
        })?;

        let mut cmd = ProcessCommand::new(&resolved);
        cmd.args(&args[1..]);
        cmd.current_dir(&state.pwd);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        cmd.env_clear();
        for (k, v) in state.environ() {
            cmd.env(k, v);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Timeouts kill the whole group
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ScriptError::failed(126, format!("failed to execute: {}", e))
                .with_command(program.clone())
        })?;
        let deadline = Instant::now() + self.timeout;

        let input = state.take_stdin();
        if let Some(mut pipe) = child.stdin.take() {
            thread::spawn(move || {
                // The child may exit without reading; a broken pipe is fine
                let _ = pipe.write_all(input.as_bytes());
            });
        }
        let (done_tx, done_rx) = mpsc::channel();
        let out = child.stdout.take().map(|pipe| spawn_reader(pipe, done_tx.clone()));
        let err = child.stderr.take().map(|pipe| spawn_reader(pipe, done_tx.clone()));
        drop(done_tx);

        let waited = wait_until(&mut child, deadline);
        if !readers_finished(&done_rx, deadline) {
            log::warn!("{}: output still open after {:?}, killing its process group", program, self.timeout);
            kill_group(&mut child);
            readers_finished(&done_rx, Instant::now() + KILL_GRACE);
        }

        state.stdout.write_all(&take(out))?;
        state.stderr.write_all(&take(err))?;

        match waited? {
            Some(status) => Ok(status_result(status)),
            None => {
                log::warn!("{} did not finish within {:?}, killed", program, self.timeout);
                Err(ScriptError::new(ErrorKind::Timeout,
                    format!("timed out after {:?}", self.timeout))
                    .with_command(program.clone()))
            }
        }
    }
}

type Collected = Arc<Mutex<Vec<u8>>>;

/// Read a pipe to its end on a thread. `done` is dropped when the pipe
/// closes; whatever was read so far stays available if it never does.
fn spawn_reader<R: Read + Send + 'static>(mut pipe: R, done: Sender<()>) -> Collected {
    let collected = Collected::default();
    let sink = Arc::clone(&collected);
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => lock(&sink).extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        drop(done);
    });
    collected
}

fn lock(buf: &Collected) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}

fn take(buf: Option<Collected>) -> Vec<u8> {
    buf.map(|b| std::mem::take(&mut *lock(&b))).unwrap_or_default()
}

/// Wait until every reader has seen the end of its pipe, or the deadline.
fn readers_finished(done: &Receiver<()>, deadline: Instant) -> bool {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok(()) => continue,
            Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => return false,
        }
    }
}

/// Wait for the child, killing its process group once the deadline passes.
/// Returns `None` when the child was killed.
fn wait_until(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>, ScriptError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            kill_group(child);
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    if let Ok(pid) = i32::try_from(child.id()) {
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn status_result(status: ExitStatus) -> CmdResult {
    if status.success() {
        return CmdResult::Ok;
    }
    if let Some(code) = status.code() {
        return CmdResult::Status(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return CmdResult::Status(128 + sig);
        }
    }
    CmdResult::Status(1)
}

/// Look up an executable by name using the script's PATH variable rather
/// than the parent process's.
pub(crate) fn look_path(state: &State, command: &str) -> Option<String> {
    if command.contains(std::path::MAIN_SEPARATOR) || command.contains('/') {
        let path = state.resolve_path(command);
        return is_executable(&path).then(|| path.to_string_lossy().to_string());
    }

    #[cfg(windows)]
    let extensions: Vec<String> = std::env::var("PATHEXT")
        .unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string())
        .split(';')
        .map(|s| s.to_lowercase())
        .collect();

    let path_env = state.getenv("PATH").unwrap_or("");
    for dir in std::env::split_paths(path_env) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(command);
        if is_executable(&candidate) {
            return Some(candidate.to_string_lossy().to_string());
        }

        #[cfg(windows)]
        for ext in &extensions {
            let with_ext = dir.join(format!("{}{}", command, ext));
            if with_ext.is_file() {
                return Some(with_ext.to_string_lossy().to_string());
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}
