//! The daemon lifecycle state machine.

use super::launcher::{data_dir_from_args, LaunchPlan};
use super::output::{spawn_drain, LineSink, OutputStream, TracingSink};
use super::state::{ProcessState, StateChange};
use crate::config::{PathsConfig, ProcessConfig};
use crate::error::{NodeKeeperError, Result};
use crate::platform::{self, Platform};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 64;

/// What to run. Replaced wholesale by [`ProcessSupervisor::configure`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// `None` when no binary could be resolved for this host.
    pub binary_path: Option<PathBuf>,
    /// Writable directory used for staging; overrides the supervisor's
    /// private directory when set.
    pub working_dir: Option<PathBuf>,
    pub args: Vec<String>,
}

impl SupervisorConfig {
    pub fn new(binary_path: Option<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary_path,
            working_dir: None,
            args,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Serializable status summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorStatus {
    pub state: ProcessState,
    pub is_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Spawned child shared between the supervisor and its monitor thread.
#[derive(Debug)]
struct ProcessHandle {
    pid: u32,
    child: Mutex<Child>,
}

impl ProcessHandle {
    fn try_wait(&self) -> std::io::Result<Option<ExitStatus>> {
        self.child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_wait()
    }

    /// Poll for exit until `timeout` elapses.
    fn wait_for_exit(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_wait()?.is_some() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(ProcessConfig::MONITOR_INTERVAL);
        }
    }

    fn kill(&self) -> Result<()> {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        match child.kill() {
            Ok(()) => Ok(()),
            // Already exited and reaped
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(NodeKeeperError::Process {
                message: format!("Failed to kill process {}: {}", self.pid, e),
            }),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: ProcessState,
    last_error: Option<String>,
    config: Option<SupervisorConfig>,
    handle: Option<Arc<ProcessHandle>>,
}

/// Shared between the supervisor and its monitor thread.
struct Shared {
    inner: Mutex<Inner>,
    events: broadcast::Sender<StateChange>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` and notify subscribers. The caller holds the lock, so
    /// events go out in transition order.
    fn transition(&self, inner: &mut Inner, next: ProcessState) {
        let previous = inner.state;
        inner.state = next;
        debug!("Daemon state: {} -> {}", previous, next);
        // No subscribers is fine
        let _ = self.events.send(StateChange {
            previous,
            current: next,
            last_error: inner.last_error.clone(),
        });
    }

    fn fail(&self, inner: &mut Inner, message: impl Into<String>) {
        let message = message.into();
        error!("Daemon error: {}", message);
        inner.last_error = Some(message);
        self.transition(inner, ProcessState::Error);
    }
}

/// Owns the lifecycle of one `monerod` process.
///
/// State lives behind a single mutex. A spawned daemon gets two drain threads
/// (stdout, stderr) and one monitor thread; none are joined, they end when the
/// pipes close and the process exits.
pub struct ProcessSupervisor {
    platform: Platform,
    private_dir: PathBuf,
    sink: Arc<dyn LineSink>,
    stop_timeout: Duration,
    shared: Arc<Shared>,
}

impl ProcessSupervisor {
    pub fn new(platform: Platform) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            platform,
            private_dir: PathBuf::from(PathsConfig::ANDROID_PRIVATE_FALLBACK),
            sink: Arc::new(TracingSink),
            stop_timeout: ProcessConfig::STOP_TIMEOUT,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                events,
            }),
        }
    }

    /// App-private directory the binary is staged into on Android.
    pub fn with_private_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.private_dir = dir.into();
        self
    }

    /// Where daemon output lines go. Defaults to [`TracingSink`].
    pub fn with_line_sink(mut self, sink: Arc<dyn LineSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Grace period [`stop`](Self::stop) gives the daemon after the
    /// terminate signal.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn private_dir(&self) -> &Path {
        &self.private_dir
    }

    /// Replace the configuration and reset to `Stopped`.
    ///
    /// A running daemon is not killed; its handle is released and its exit is
    /// no longer tracked. Call [`stop`](Self::stop) first.
    pub fn configure(&self, config: SupervisorConfig) {
        let mut inner = self.shared.lock();
        if inner.handle.take().is_some() {
            warn!("Reconfigured while a daemon was running; releasing its handle");
        }
        inner.config = Some(config);
        inner.last_error = None;
        self.shared.transition(&mut inner, ProcessState::Stopped);
    }

    /// Launch the daemon. Returns `true` once it is running.
    ///
    /// Returns `false` without a state change when a start is already in
    /// progress or has succeeded, or while a stop is in progress. Every other
    /// failure is recorded in [`last_error`](Self::last_error) and moves the
    /// supervisor to `Error`.
    pub fn start(&self) -> bool {
        let mut inner = self.shared.lock();

        if inner.state.is_active() || inner.state == ProcessState::Stopping {
            warn!("Start ignored, daemon is {}", inner.state);
            return false;
        }

        let Some((binary, args, private_dir)) = inner.config.as_ref().and_then(|c| {
            let private_dir = c.working_dir.clone().unwrap_or_else(|| self.private_dir.clone());
            c.binary_path
                .clone()
                .map(|binary| (binary, c.args.clone(), private_dir))
        }) else {
            self.shared.fail(&mut inner, "Configuration missing");
            return false;
        };

        let Some(data_dir) = data_dir_from_args(&args) else {
            self.shared.fail(&mut inner, "No --data-dir specified");
            return false;
        };

        inner.last_error = None;
        self.shared.transition(&mut inner, ProcessState::Starting);
        // Staging can copy a large binary; other callers see `Starting`
        drop(inner);

        let spawned = self.spawn(&binary, &args, &data_dir, &private_dir);

        let mut inner = self.shared.lock();
        if inner.state != ProcessState::Starting {
            // Reconfigured while launching; the new config wins
            drop(inner);
            if let Ok(handle) = spawned {
                warn!("Discarding daemon {} launched from a stale config", handle.pid);
                discard(&handle);
            }
            return false;
        }

        match spawned {
            Ok(handle) => {
                info!("Daemon started with PID {}", handle.pid);
                inner.handle = Some(handle.clone());
                self.shared.transition(&mut inner, ProcessState::Running);
                drop(inner);
                self.spawn_monitor(handle);
                true
            }
            Err(e) => {
                self.shared.fail(&mut inner, e.to_string());
                false
            }
        }
    }

    fn spawn(
        &self,
        binary: &Path,
        args: &[String],
        data_dir: &Path,
        private_dir: &Path,
    ) -> Result<Arc<ProcessHandle>> {
        let plan = LaunchPlan::prepare(self.platform, binary, args, data_dir, private_dir)?;

        info!(
            "Launching {} in {}",
            plan.program.display(),
            plan.data_dir.display()
        );
        let mut child = plan.command().spawn().map_err(|e| NodeKeeperError::Process {
            message: format!("Failed to spawn {}: {}", plan.program.display(), e),
        })?;

        let handle = Arc::new(ProcessHandle {
            pid: child.id(),
            child: Mutex::new(child),
        });
        if let Err(e) = self.spawn_drains(&handle) {
            discard(&handle);
            return Err(e);
        }
        Ok(handle)
    }

    fn spawn_drains(&self, handle: &ProcessHandle) -> Result<()> {
        let (stdout, stderr) = {
            let mut child = handle.child.lock().unwrap_or_else(PoisonError::into_inner);
            (child.stdout.take(), child.stderr.take())
        };
        if let Some(stdout) = stdout {
            spawn_drain(stdout, OutputStream::Stdout, self.sink.clone())?;
        }
        if let Some(stderr) = stderr {
            spawn_drain(stderr, OutputStream::Stderr, self.sink.clone())?;
        }
        Ok(())
    }

    /// Watch for the child exiting on its own.
    ///
    /// Only acts when the handle is still current and the state is still
    /// `Running`, so a stop in progress or a reconfigure is left alone.
    fn spawn_monitor(&self, handle: Arc<ProcessHandle>) {
        let shared = self.shared.clone();
        let monitored = handle.clone();
        let spawned = thread::Builder::new()
            .name("monerod-monitor".into())
            .spawn(move || {
                let outcome = loop {
                    match monitored.try_wait() {
                        Ok(Some(status)) => break Ok(status),
                        Ok(None) => thread::sleep(ProcessConfig::MONITOR_INTERVAL),
                        Err(e) => break Err(e),
                    }
                };

                let mut inner = shared.lock();
                let is_current = inner
                    .handle
                    .as_ref()
                    .is_some_and(|h| Arc::ptr_eq(h, &monitored));
                if !is_current || inner.state != ProcessState::Running {
                    debug!("Daemon {} exited after hand-off; ignoring", monitored.pid);
                    return;
                }

                inner.handle = None;
                match outcome {
                    Ok(status) => match exit_code(status) {
                        0 => {
                            info!("Daemon exited cleanly");
                            shared.transition(&mut inner, ProcessState::Stopped);
                        }
                        code => shared.fail(&mut inner, format!("Exited with code {}", code)),
                    },
                    Err(e) => shared.fail(&mut inner, format!("Lost track of daemon: {}", e)),
                }
            });

        if let Err(e) = spawned {
            // Without a monitor the exit would go unnoticed; stop() still works
            error!("Failed to start monitor thread for PID {}: {}", handle.pid, e);
        }
    }

    /// Terminate the daemon. Returns `false` when there is nothing to stop.
    ///
    /// Sends a terminate signal, waits for the stop timeout (10 s unless
    /// overridden), then force-kills and waits up to 2 s more.
    pub fn stop(&self) -> bool {
        let handle = {
            let mut inner = self.shared.lock();
            let Some(handle) = inner.handle.clone() else {
                debug!("Stop ignored, no daemon handle");
                return false;
            };
            self.shared.transition(&mut inner, ProcessState::Stopping);
            handle
        };

        info!("Stopping daemon (PID {})", handle.pid);
        let result = terminate(&handle, self.stop_timeout);

        let mut inner = self.shared.lock();
        if inner
            .handle
            .as_ref()
            .is_some_and(|h| Arc::ptr_eq(h, &handle))
        {
            inner.handle = None;
        }
        match result {
            Ok(()) => {
                info!("Daemon stopped");
                self.shared.transition(&mut inner, ProcessState::Stopped);
                true
            }
            Err(e) => {
                self.shared.fail(&mut inner, e.to_string());
                false
            }
        }
    }

    pub fn state(&self) -> ProcessState {
        self.shared.lock().state
    }

    pub fn is_running(&self) -> bool {
        let inner = self.shared.lock();
        inner.state == ProcessState::Running && inner.handle.is_some()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    pub fn pid(&self) -> Option<u32> {
        self.shared.lock().handle.as_ref().map(|h| h.pid)
    }

    pub fn config(&self) -> Option<SupervisorConfig> {
        self.shared.lock().config.clone()
    }

    pub fn status(&self) -> SupervisorStatus {
        let inner = self.shared.lock();
        SupervisorStatus {
            state: inner.state,
            is_running: inner.state == ProcessState::Running && inner.handle.is_some(),
            pid: inner.handle.as_ref().map(|h| h.pid),
            last_error: inner.last_error.clone(),
        }
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.shared.events.subscribe()
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("platform", &self.platform)
            .field("private_dir", &self.private_dir)
            .field("stop_timeout", &self.stop_timeout)
            .field("state", &self.state())
            .finish()
    }
}

fn terminate(handle: &ProcessHandle, stop_timeout: Duration) -> Result<()> {
    if handle.try_wait()?.is_some() {
        return Ok(());
    }

    if let Err(e) = platform::send_terminate(handle.pid) {
        warn!("Graceful terminate failed for PID {}: {}", handle.pid, e);
        handle.kill()?;
    }
    if handle.wait_for_exit(stop_timeout)? {
        return Ok(());
    }

    warn!("Daemon did not exit within {:?}, killing", stop_timeout);
    handle.kill()?;
    if handle.wait_for_exit(ProcessConfig::KILL_TIMEOUT)? {
        Ok(())
    } else {
        Err(NodeKeeperError::Process {
            message: format!("Process {} did not exit after kill", handle.pid),
        })
    }
}

/// Kill a child nobody will supervise and reap it.
fn discard(handle: &ProcessHandle) {
    if let Err(e) = handle.kill() {
        warn!("{}", e);
        return;
    }
    if let Err(e) = handle.wait_for_exit(ProcessConfig::KILL_TIMEOUT) {
        warn!("Failed to reap process {}: {}", handle.pid, e);
    }
}

/// Exit code, with death by signal `N` reported as `-N`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_without_config() {
        let supervisor = ProcessSupervisor::new(Platform::Desktop);
        assert!(!supervisor.start());
        assert_eq!(supervisor.state(), ProcessState::Error);
        assert_eq!(supervisor.last_error().as_deref(), Some("Configuration missing"));
    }

    #[test]
    fn test_start_without_binary() {
        let supervisor = ProcessSupervisor::new(Platform::Desktop);
        supervisor.configure(SupervisorConfig::new(None, vec!["--data-dir".into(), "/tmp/x".into()]));
        assert!(!supervisor.start());
        assert_eq!(supervisor.last_error().as_deref(), Some("Configuration missing"));
    }

    #[test]
    fn test_start_without_data_dir() {
        let supervisor = ProcessSupervisor::new(Platform::Desktop);
        supervisor.configure(SupervisorConfig::new(
            Some(PathBuf::from("/opt/monero/monerod")),
            vec!["--non-interactive".into()],
        ));

        assert!(!supervisor.start());
        assert_eq!(supervisor.state(), ProcessState::Error);
        assert_eq!(supervisor.last_error().as_deref(), Some("No --data-dir specified"));
        assert!(supervisor.pid().is_none());
    }

    #[test]
    fn test_configure_resets_error() {
        let supervisor = ProcessSupervisor::new(Platform::Desktop);
        assert!(!supervisor.start());
        assert_eq!(supervisor.state(), ProcessState::Error);

        let first = SupervisorConfig::new(Some(PathBuf::from("monerod")), vec![]);
        let second = SupervisorConfig::new(
            Some(PathBuf::from("/opt/monero/monerod")),
            vec!["--data-dir".into(), "/srv/monero".into()],
        )
        .with_working_dir("/var/lib/nodekeeper");
        supervisor.configure(first);
        supervisor.configure(second.clone());

        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert!(supervisor.last_error().is_none());
        assert_eq!(supervisor.config(), Some(second));
    }

    #[test]
    fn test_stop_without_handle() {
        let supervisor = ProcessSupervisor::new(Platform::Desktop);
        let mut events = supervisor.subscribe();

        assert!(!supervisor.stop());
        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_spawn_failure_is_error_state() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        let supervisor = ProcessSupervisor::new(Platform::Desktop);
        supervisor.configure(SupervisorConfig::new(
            Some(temp_dir.path().join("no-such-monerod")),
            vec!["--data-dir".into(), data_dir.to_string_lossy().into_owned()],
        ));
        let mut events = supervisor.subscribe();

        assert!(!supervisor.start());
        assert_eq!(supervisor.state(), ProcessState::Error);
        assert!(supervisor.last_error().unwrap().contains("Failed to spawn"));

        let first = events.try_recv().unwrap();
        assert_eq!(first.previous, ProcessState::Stopped);
        assert_eq!(first.current, ProcessState::Starting);
        let second = events.try_recv().unwrap();
        assert_eq!(second.current, ProcessState::Error);
        assert!(second.last_error.is_some());
    }

    /// Staging from a FIFO blocks in open() until a writer shows up, which
    /// holds the start inside its launch step.
    #[cfg(unix)]
    #[test]
    fn test_configure_during_launch_wins() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let fifo = temp_dir.path().join("libmonerod.so");
        let made = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
        assert!(made.success());

        let data_dir = temp_dir.path().join("data");
        let supervisor = ProcessSupervisor::new(Platform::Android)
            .with_private_dir(temp_dir.path().join("private"));
        supervisor.configure(SupervisorConfig::new(
            Some(fifo.clone()),
            vec!["--data-dir".into(), data_dir.to_string_lossy().into_owned()],
        ));
        let replacement = SupervisorConfig::new(None, vec!["--prune-blockchain".into()]);

        thread::scope(|scope| {
            let starter = scope.spawn(|| supervisor.start());

            let deadline = Instant::now() + Duration::from_secs(5);
            while supervisor.state() != ProcessState::Starting {
                assert!(Instant::now() < deadline, "start never reached Starting");
                thread::sleep(Duration::from_millis(10));
            }
            // The lock is free while the launch is blocked
            assert!(supervisor.pid().is_none());
            assert!(!supervisor.start());
            supervisor.configure(replacement.clone());

            // Release the blocked open(); copying a FIFO then fails
            drop(std::fs::OpenOptions::new().write(true).open(&fifo).unwrap());
            assert!(!starter.join().unwrap());
        });

        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert!(supervisor.last_error().is_none());
        assert_eq!(supervisor.config(), Some(replacement));
    }

    /// Same blocked launch, left alone: the staging failure is reported.
    #[cfg(unix)]
    #[test]
    fn test_launch_failure_after_unlocked_staging() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let fifo = temp_dir.path().join("libmonerod.so");
        let made = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
        assert!(made.success());

        let data_dir = temp_dir.path().join("data");
        let supervisor = ProcessSupervisor::new(Platform::Android)
            .with_private_dir(temp_dir.path().join("private"));
        supervisor.configure(SupervisorConfig::new(
            Some(fifo.clone()),
            vec!["--data-dir".into(), data_dir.to_string_lossy().into_owned()],
        ));

        thread::scope(|scope| {
            let starter = scope.spawn(|| supervisor.start());

            let deadline = Instant::now() + Duration::from_secs(5);
            while supervisor.state() != ProcessState::Starting {
                assert!(Instant::now() < deadline, "start never reached Starting");
                thread::sleep(Duration::from_millis(10));
            }
            assert!(!supervisor.stop());

            drop(std::fs::OpenOptions::new().write(true).open(&fifo).unwrap());
            assert!(!starter.join().unwrap());
        });

        assert_eq!(supervisor.state(), ProcessState::Error);
        assert!(supervisor.last_error().unwrap().contains("Failed to stage"));
    }

    #[test]
    fn test_status_serialization() {
        let supervisor = ProcessSupervisor::new(Platform::Desktop);
        let json = serde_json::to_value(supervisor.status()).unwrap();
        assert_eq!(json["state"], "stopped");
        assert_eq!(json["isRunning"], false);
        assert!(json.get("pid").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_from_signal() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(exit_code(ExitStatus::from_raw(9)), -9);
    }
}
