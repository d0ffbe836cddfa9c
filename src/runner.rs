/// Child process execution with streamed output and pre-exec resource limits
use crate::types::{ExecutionResult, ResourceLimits};
use log::{error, warn};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::Read;
use std::os::fd::AsFd;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};

/// Bytes read from a pipe per readiness wake-up.
const PIPE_BUF: usize = 4096;

/// Idle poll timeout; a wake-up to probe child liveness, not a deadline.
const IDLE_TIMEOUT_MS: u16 = 5000;

/// Kill switch for an in-flight job's child process.
///
/// The runner registers each child's process group while the child is
/// alive and clears it after the reap. `cancel` kills the registered
/// group; a child registered after cancellation is killed immediately.
#[derive(Debug, Default)]
pub struct CancelToken {
    inner: Mutex<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: bool,
    pgid: Option<i32>,
}

impl CancelToken {
    pub fn cancel(&self) {
        let mut state = self.lock();
        state.cancelled = true;
        if let Some(pgid) = state.pgid.take() {
            kill_group(pgid);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    fn register(&self, pgid: i32) {
        let mut state = self.lock();
        if state.cancelled {
            kill_group(pgid);
        } else {
            state.pgid = Some(pgid);
        }
    }

    fn clear(&self) {
        self.lock().pgid = None;
    }

    fn lock(&self) -> MutexGuard<'_, CancelState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn kill_group(pgid: i32) {
    // ESRCH means the group is already gone.
    if let Err(err) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        if err != nix::errno::Errno::ESRCH {
            warn!("failed to kill process group {pgid}: {err}");
        }
    }
}

/// Runs `argv[0]` with `argv[1..]`, streaming output to `sink` until both
/// pipes reach EOF and the child has been reaped.
///
/// Each sink call carries bytes from exactly one side: stdout chunks
/// arrive as `sink(bytes, b"")`, stderr chunks as `sink(b"", bytes)`.
/// When `sandboxed`, resource limits are installed in the child before
/// exec. Spawn failure yields `{success: false, exit_code: -1}` without
/// invoking the sink.
pub fn run(
    argv: &[String],
    sink: &mut dyn FnMut(&[u8], &[u8]),
    sandboxed: bool,
    limits: Option<&ResourceLimits>,
    cancel: &CancelToken,
) -> ExecutionResult {
    if argv.is_empty() {
        return ExecutionResult::spawn_failure("empty command");
    }

    let limits = limits.cloned().unwrap_or_default();

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Safety: the hook only calls async-signal-safe syscalls (setsid,
    // setrlimit) between fork and exec.
    unsafe {
        cmd.pre_exec(move || child_setup(sandboxed, &limits));
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!("failed to spawn {}: {}", argv[0], err);
            return ExecutionResult::spawn_failure(format!("failed to spawn {}: {}", argv[0], err));
        }
    };

    // The child is its own process group leader (setsid in child_setup),
    // so its pid doubles as the pgid.
    cancel.register(child.id() as i32);

    drain_pipes(&mut child, sink);

    let status = match child.wait() {
        Ok(status) => status,
        Err(err) => {
            cancel.clear();
            error!("failed to reap child: {err}");
            return ExecutionResult::spawn_failure(format!("failed to reap child: {err}"));
        }
    };
    cancel.clear();

    let exit_code = status.code().unwrap_or(-1);
    ExecutionResult {
        success: status.success(),
        exit_code,
        error_message: if status.success() {
            None
        } else {
            Some(format!("process exited with non-zero status {exit_code}"))
        },
    }
}

/// Child-side setup between fork and exec.
fn child_setup(sandboxed: bool, limits: &ResourceLimits) -> std::io::Result<()> {
    // Own session and process group, so cancellation can kill the whole tree.
    nix::unistd::setsid().map_err(io_err)?;

    if sandboxed {
        use nix::sys::resource::{setrlimit, Resource};

        // Soft limit delivers SIGXCPU at the budget; the hard limit one
        // second later is the SIGKILL backstop.
        setrlimit(
            Resource::RLIMIT_CPU,
            limits.cpu_time_seconds,
            limits.cpu_time_seconds + 1,
        )
        .map_err(io_err)?;

        setrlimit(Resource::RLIMIT_AS, limits.memory_bytes, limits.memory_bytes)
            .map_err(io_err)?;

        // NPROC stays Linux-only: macOS interpreter shims spawn helpers
        // and fail under a tight cap.
        #[cfg(target_os = "linux")]
        {
            let nproc = u64::from(limits.max_processes);
            setrlimit(Resource::RLIMIT_NPROC, nproc, nproc).map_err(io_err)?;
        }
    }

    Ok(())
}

fn io_err(err: nix::errno::Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(err as i32)
}

/// Multiplexes both pipe read ends until each reaches EOF.
fn drain_pipes(child: &mut Child, sink: &mut dyn FnMut(&[u8], &[u8])) {
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let mut buf = [0u8; PIPE_BUF];

    while stdout_pipe.is_some() || stderr_pipe.is_some() {
        let mut fds = Vec::with_capacity(2);
        if let Some(out) = stdout_pipe.as_ref() {
            fds.push(PollFd::new(out.as_fd(), PollFlags::POLLIN));
        }
        if let Some(err) = stderr_pipe.as_ref() {
            fds.push(PollFd::new(err.as_fd(), PollFlags::POLLIN));
        }

        let ready = match poll(&mut fds, PollTimeout::from(IDLE_TIMEOUT_MS)) {
            Ok(n) => n,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(err) => {
                warn!("poll on child pipes failed: {err}");
                break;
            }
        };

        if ready == 0 {
            // No output for a while. Probe the child; if it already
            // exited there is nothing left to wait for.
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => continue,
                Err(err) => {
                    warn!("child liveness probe failed: {err}");
                    break;
                }
            }
        }

        let mut stdout_ready = false;
        let mut stderr_ready = false;
        let mut idx = 0;
        if stdout_pipe.is_some() {
            stdout_ready = readable(&fds[idx]);
            idx += 1;
        }
        if stderr_pipe.is_some() {
            stderr_ready = readable(&fds[idx]);
        }
        drop(fds);

        if stdout_ready {
            if let Some(out) = stdout_pipe.as_mut() {
                match read_chunk(out, &mut buf) {
                    Some(n) => sink(&buf[..n], b""),
                    None => stdout_pipe = None,
                }
            }
        }
        if stderr_ready {
            if let Some(err) = stderr_pipe.as_mut() {
                match read_chunk(err, &mut buf) {
                    Some(n) => sink(b"", &buf[..n]),
                    None => stderr_pipe = None,
                }
            }
        }
    }
}

fn readable(fd: &PollFd) -> bool {
    fd.revents()
        .map(|revents| revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR))
        .unwrap_or(false)
}

/// Reads one chunk; `None` marks the side closed (EOF or read error).
fn read_chunk(pipe: &mut impl Read, buf: &mut [u8]) -> Option<usize> {
    loop {
        match pipe.read(buf) {
            Ok(0) => return None,
            Ok(n) => return Some(n),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("read from child pipe failed: {err}");
                return None;
            }
        }
    }
}
