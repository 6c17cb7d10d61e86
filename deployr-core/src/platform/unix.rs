use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Appends the arguments one by one; quotes embedded in them are passed through.
pub fn append_args(command: &mut Command, args: &[String]) {
    command.args(args);
}

/// Starts the utility as the leader of a new process group.
///
/// Helpers it forks inherit the group, so [`terminate`] can reach all of them
/// with one signal.
pub fn isolate(command: &mut Command) {
    command.process_group(0);
}

/// Stops a running child and every process in its group, then waits until the
/// child has exited.
///
/// The group first receives `SIGTERM` so the utility can release the volume
/// cleanly. Once the child has exited, or `grace` has elapsed, whatever is
/// left of the group is killed with `SIGKILL`.
pub async fn terminate(child: &mut Child, grace: Duration) -> io::Result<()> {
    let Some(pid) = child.id() else {
        // Already reaped.
        return Ok(());
    };

    let pid = i32::try_from(pid).map_err(|_| io::Error::other("process id out of range"))?;
    let group = Pid::from_raw(pid);

    match signal::killpg(group, Signal::SIGTERM) {
        Ok(()) => match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => {
                debug!(pid, "Process exited after SIGTERM");
                status?;
            }
            Err(_) => warn!(pid, ?grace, "Process ignored SIGTERM, killing its group"),
        },
        Err(e) => warn!(pid, "Failed to send SIGTERM to the process group: {}", e),
    }

    kill_group(group);
    child.wait().await.map(|_| ())
}

fn kill_group(group: Pid) {
    match signal::killpg(group, Signal::SIGKILL) {
        // ESRCH: every member has already exited.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = group.as_raw(), "Failed to send SIGKILL to the process group: {}", e),
    }
}

/// Where DISM is looked up when no path is configured.
///
/// DISM is a Windows tool; on other hosts it is expected on `PATH` under a
/// compatible wrapper.
pub fn default_dism_path() -> PathBuf {
    PathBuf::from("dism")
}

pub fn default_wimlib_path() -> PathBuf {
    PathBuf::from("wimlib-imagex")
}
