//! Platform-specific process signaling.

use crate::error::{NodeKeeperError, Result};
use tracing::debug;

/// Ask a process to shut down gracefully.
///
/// # Platform Behavior
/// - **Unix**: Sends SIGTERM. A process that no longer exists counts as
///   success.
/// - **Other**: No graceful signal is available; returns an error so the
///   caller falls back to a hard kill.
pub fn send_terminate(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid).map_err(|_| NodeKeeperError::Process {
            message: format!("PID {} out of range", pid),
        })?;

        debug!("Sending SIGTERM to process {}", pid);
        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => {
                debug!("Process {} already gone", pid);
                Ok(())
            }
            Err(e) => Err(NodeKeeperError::Process {
                message: format!("Failed to send SIGTERM to {}: {}", pid, e),
            }),
        }
    }

    #[cfg(not(unix))]
    {
        debug!("No graceful terminate signal for process {} on this platform", pid);
        Err(NodeKeeperError::Process {
            message: "Graceful termination not supported on this platform".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_send_terminate_stops_child() {
        use std::time::{Duration, Instant};

        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();

        send_terminate(child.id()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let status = loop {
            if let Some(status) = child.try_wait().unwrap() {
                break status;
            }
            assert!(Instant::now() < deadline, "child ignored SIGTERM");
            std::thread::sleep(Duration::from_millis(50));
        };
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_send_terminate_out_of_range_pid() {
        assert!(send_terminate(u32::MAX).is_err());
    }
}
