use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Appends the arguments verbatim.
///
/// DISM parses its own command line and expects tokens such as
/// `/Driver:"C:\My Drivers"` exactly as written, so the standard
/// quoting/escaping of `Command::arg` must not be applied.
pub fn append_args(command: &mut Command, args: &[String]) {
    for arg in args {
        command.raw_arg(arg);
    }
}

/// Nothing to set up; [`terminate`] finds the helpers the utility started
/// (such as `DismHost.exe`) by walking its process tree.
pub fn isolate(_command: &mut Command) {}

/// Stops a running child and the processes it started, then waits until the
/// child has exited.
///
/// Windows has no polite equivalent of `SIGTERM` for console tools, so the
/// whole tree is terminated right away with `taskkill /T /F`. `grace` bounds
/// how long we wait for the handle to report exit before logging and waiting
/// on.
pub async fn terminate(child: &mut Child, grace: Duration) -> io::Result<()> {
    if let Some(pid) = child.id() {
        let pid = pid.to_string();
        let status = Command::new("taskkill")
            .args(["/PID", pid.as_str(), "/T", "/F"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(status) if status.success() => debug!(%pid, "Process tree terminated"),
            Ok(status) => warn!(%pid, %status, "taskkill did not terminate the process tree"),
            Err(e) => warn!(%pid, "Failed to run taskkill: {}", e),
        }
    }

    if let Err(e) = child.start_kill() {
        debug!("Direct termination failed, the process may have exited: {}", e);
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status.map(|_| ()),
        Err(_) => {
            warn!(?grace, "Process did not report exit after termination, waiting");
            child.wait().await.map(|_| ())
        }
    }
}

/// `%SystemRoot%\System32\Dism.exe`, falling back to `dism.exe` on `PATH`.
pub fn default_dism_path() -> PathBuf {
    std::env::var_os("SystemRoot")
        .map(|root| PathBuf::from(root).join("System32").join("Dism.exe"))
        .unwrap_or_else(|| PathBuf::from("dism.exe"))
}

pub fn default_wimlib_path() -> PathBuf {
    PathBuf::from("wimlib-imagex.exe")
}
