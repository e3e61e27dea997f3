//! Integration tests for the daemon supervisor.
//!
//! A shell script stands in for `monerod`, so these only run on Unix.

#![cfg(unix)]

use nodekeeper_core::platform::set_executable;
use nodekeeper_core::{
    LineSink, OutputStream, Platform, ProcessState, ProcessSupervisor, SupervisorConfig,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Sink that keeps every line it receives.
#[derive(Default)]
struct CollectingSink {
    lines: Mutex<Vec<(OutputStream, String)>>,
}

impl CollectingSink {
    fn lines_from(&self, stream: OutputStream) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, line)| line.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }
}

impl LineSink for CollectingSink {
    fn line(&self, stream: OutputStream, line: &str) {
        self.lines.lock().unwrap().push((stream, line.to_string()));
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    set_executable(&path).unwrap();
    path
}

fn args_for(data_dir: &Path) -> Vec<String> {
    vec![
        "--non-interactive".to_string(),
        "--data-dir".to_string(),
        data_dir.to_string_lossy().into_owned(),
    ]
}

/// Poll `condition` until it holds or the timeout passes.
fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

#[test]
fn test_output_lines_forwarded_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(
        temp_dir.path(),
        "monerod",
        "i=1\nwhile [ $i -le 200 ]; do echo \"line $i\"; i=$((i+1)); done\necho 'disk warning' >&2\nexit 0",
    );
    let sink = Arc::new(CollectingSink::default());
    let supervisor = ProcessSupervisor::new(Platform::Desktop).with_line_sink(sink.clone());
    supervisor.configure(SupervisorConfig::new(
        Some(script),
        args_for(&temp_dir.path().join("data")),
    ));

    assert!(supervisor.start());
    assert!(wait_until(Duration::from_secs(10), || sink.len() == 201));
    assert!(wait_until(Duration::from_secs(5), || {
        supervisor.state() == ProcessState::Stopped
    }));

    let stdout = sink.lines_from(OutputStream::Stdout);
    let expected: Vec<String> = (1..=200).map(|i| format!("line {}", i)).collect();
    assert_eq!(stdout, expected);
    assert_eq!(sink.lines_from(OutputStream::Stderr), vec!["disk warning"]);
    assert!(supervisor.last_error().is_none());
    assert!(supervisor.pid().is_none());
}

#[test]
fn test_start_creates_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "monerod", "exit 0");
    let data_dir = temp_dir.path().join("nested").join("data");

    let supervisor = ProcessSupervisor::new(Platform::Desktop);
    supervisor.configure(SupervisorConfig::new(Some(script), args_for(&data_dir)));

    assert!(supervisor.start());
    assert!(data_dir.is_dir());
    assert!(wait_until(Duration::from_secs(5), || {
        supervisor.state() == ProcessState::Stopped
    }));
}

#[test]
fn test_nonzero_exit_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "monerod", "exit 3");

    let supervisor = ProcessSupervisor::new(Platform::Desktop);
    supervisor.configure(SupervisorConfig::new(
        Some(script),
        args_for(&temp_dir.path().join("data")),
    ));

    assert!(supervisor.start());
    assert!(wait_until(Duration::from_secs(5), || {
        supervisor.state() == ProcessState::Error
    }));
    assert_eq!(
        supervisor.last_error().as_deref(),
        Some("Exited with code 3")
    );
    assert!(!supervisor.is_running());
}

#[test]
fn test_stop_running_daemon() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "monerod", "exec sleep 30");

    let supervisor = ProcessSupervisor::new(Platform::Desktop);
    supervisor.configure(SupervisorConfig::new(
        Some(script),
        args_for(&temp_dir.path().join("data")),
    ));

    assert!(supervisor.start());
    assert!(supervisor.is_running());
    assert!(supervisor.pid().is_some());

    // A second start while running is refused without a state change
    assert!(!supervisor.start());
    assert_eq!(supervisor.state(), ProcessState::Running);

    assert!(supervisor.stop());
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    assert!(supervisor.pid().is_none());
    assert!(supervisor.last_error().is_none());

    // Nothing left to stop
    assert!(!supervisor.stop());
}

#[test]
fn test_state_events() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "monerod", "exec sleep 30");

    let supervisor = ProcessSupervisor::new(Platform::Desktop);
    supervisor.configure(SupervisorConfig::new(
        Some(script),
        args_for(&temp_dir.path().join("data")),
    ));
    let mut events = supervisor.subscribe();

    assert!(supervisor.start());
    assert!(supervisor.stop());

    let mut seen = Vec::new();
    while let Ok(change) = events.try_recv() {
        seen.push((change.previous, change.current));
    }
    assert_eq!(
        seen,
        vec![
            (ProcessState::Stopped, ProcessState::Starting),
            (ProcessState::Starting, ProcessState::Running),
            (ProcessState::Running, ProcessState::Stopping),
            (ProcessState::Stopping, ProcessState::Stopped),
        ]
    );
}

#[test]
fn test_restart_after_exit() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "monerod", "exit 1");

    let supervisor = ProcessSupervisor::new(Platform::Desktop);
    supervisor.configure(SupervisorConfig::new(
        Some(script),
        args_for(&temp_dir.path().join("data")),
    ));

    assert!(supervisor.start());
    assert!(wait_until(Duration::from_secs(5), || {
        supervisor.state() == ProcessState::Error
    }));

    // Error is not a terminal state
    assert!(supervisor.start());
    assert!(wait_until(Duration::from_secs(5), || {
        supervisor.state() == ProcessState::Error
    }));
}

#[test]
fn test_stop_kills_daemon_ignoring_terminate() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(
        temp_dir.path(),
        "monerod",
        "trap '' TERM\necho ready\nwhile true; do sleep 0.1; done",
    );
    let sink = Arc::new(CollectingSink::default());
    let supervisor = ProcessSupervisor::new(Platform::Desktop)
        .with_line_sink(sink.clone())
        .with_stop_timeout(Duration::from_millis(500));
    supervisor.configure(SupervisorConfig::new(
        Some(script),
        args_for(&temp_dir.path().join("data")),
    ));

    assert!(supervisor.start());
    // The trap is installed once the script has printed
    assert!(wait_until(Duration::from_secs(5), || {
        sink.lines_from(OutputStream::Stdout) == vec!["ready"]
    }));
    let mut events = supervisor.subscribe();

    let started = Instant::now();
    assert!(supervisor.stop());
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(500), "killed after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "stop took {:?}", elapsed);
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    assert!(supervisor.last_error().is_none());
    assert!(supervisor.pid().is_none());

    assert_eq!(events.try_recv().unwrap().current, ProcessState::Stopping);
    assert_eq!(events.try_recv().unwrap().current, ProcessState::Stopped);
}
