//! Lifetime guard for spawned external processes.

use std::io;
use std::process::ExitStatus;

use tokio::process::Child;

type AbortHook = Box<dyn FnOnce() + Send + 'static>;

/// Owns a running child process until it has been waited on.
///
/// Dropping the guard before [`ProcessGuard::wait`] completes kills the
/// child, reaps it on the current runtime, and runs the abort hook (used to
/// remove partially written output). After a successful wait the guard is
/// disarmed and dropping it does nothing.
///
/// A child spawned as the leader of its own process group (see
/// [`ProcessGuard::kill_process_group`]) is killed together with everything
/// it started, such as a merging ffmpeg, before the hook runs.
pub struct ProcessGuard {
    tool: &'static str,
    child: Option<Child>,
    on_abort: Option<AbortHook>,
    group: bool,
}

impl ProcessGuard {
    pub fn new(tool: &'static str, child: Child) -> Self {
        Self {
            tool,
            child: Some(child),
            on_abort: None,
            group: false,
        }
    }

    /// Kill the child's whole process group on abort. The child must have
    /// been spawned with `process_group(0)`.
    pub fn kill_process_group(mut self) -> Self {
        self.group = true;
        self
    }

    /// Run `hook` if the guard is dropped while the process is still owned.
    pub fn on_abort(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_abort = Some(Box::new(hook));
        self
    }

    /// OS process id, if the child is still owned and running.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Wait for the process to exit and disarm the guard.
    ///
    /// Cancel-safe: if this future is dropped mid-wait the guard still owns
    /// the child and will kill it.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        let Some(child) = self.child.as_mut() else {
            return Err(io::Error::other(format!("{} already reaped", self.tool)));
        };
        let status = child.wait().await?;
        self.child = None;
        self.on_abort = None;
        Ok(status)
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        tracing::info!(tool = self.tool, pid = ?child.id(), "Killing abandoned process");
        if self.group {
            kill_group(self.tool, &child);
        }
        if let Err(e) = child.start_kill() {
            tracing::debug!(tool = self.tool, "kill failed: {e}");
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = child.wait().await;
                });
            }
            // No runtime: kill_on_drop on the Child still sends the signal.
            Err(_) => drop(child),
        }

        if let Some(hook) = self.on_abort.take() {
            hook();
        }
    }
}

#[cfg(unix)]
fn kill_group(tool: &str, child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        tracing::debug!(tool, "killpg failed: {e}");
    }
}

#[cfg(not(unix))]
fn kill_group(_tool: &str, _child: &Child) {}

/// Exit code of a finished process; termination by signal counts as `-1`.
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
