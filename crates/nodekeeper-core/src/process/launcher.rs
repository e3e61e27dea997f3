//! Building the daemon command line and environment.

use crate::config::{PathsConfig, ProcessConfig};
use crate::error::{NodeKeeperError, Result};
use crate::platform::{self, Platform};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Everything needed to spawn the daemon.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    /// Executable to run: the daemon itself, or the system linker on Android.
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Working directory and `HOME` of the child.
    pub data_dir: PathBuf,
    pub env: Vec<(String, OsString)>,
}

impl LaunchPlan {
    /// Prepare the executable and the data directory, then describe the
    /// invocation.
    ///
    /// On Android the binary is staged into `<private_dir>/bin/` first, since
    /// the native library directory is not executable in place.
    pub fn prepare(
        platform: Platform,
        binary: &Path,
        args: &[String],
        data_dir: &Path,
        private_dir: &Path,
    ) -> Result<Self> {
        let executable = if platform.is_android() {
            stage_binary(binary, private_dir)?
        } else {
            binary.to_path_buf()
        };

        fs::create_dir_all(data_dir).map_err(|e| NodeKeeperError::io_with_path(e, data_dir))?;

        let mut cmd_args: Vec<OsString> = Vec::with_capacity(args.len() + 3);
        let program = match android_linker(platform) {
            Some(linker) => {
                cmd_args.push(executable.clone().into_os_string());
                linker
            }
            None => executable,
        };
        cmd_args.extend(args.iter().map(OsString::from));
        if !has_log_file(args) {
            cmd_args.push(ProcessConfig::LOG_FILE_FLAG.into());
            cmd_args.push(data_dir.join(ProcessConfig::LOG_FILE_NAME).into_os_string());
        }

        let mut env = vec![("HOME".to_string(), data_dir.as_os_str().to_os_string())];
        if platform.is_android() {
            if let Some(lib_dir) = binary.parent() {
                env.push(("LD_LIBRARY_PATH".to_string(), library_path(lib_dir)));
            }
        }

        Ok(Self {
            program,
            args: cmd_args,
            data_dir: data_dir.to_path_buf(),
            env,
        })
    }

    /// Command with null stdin and piped stdout/stderr.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.data_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Value following `--data-dir` (or given as `--data-dir=<dir>`).
pub fn data_dir_from_args(args: &[String]) -> Option<PathBuf> {
    let inline_prefix = format!("{}=", ProcessConfig::DATA_DIR_FLAG);
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let value = if arg == ProcessConfig::DATA_DIR_FLAG {
            iter.next().map(String::as_str)
        } else {
            arg.strip_prefix(&inline_prefix)
        };
        if let Some(value) = value {
            return (!value.is_empty()).then(|| PathBuf::from(value));
        }
    }
    None
}

fn has_log_file(args: &[String]) -> bool {
    let inline_prefix = format!("{}=", ProcessConfig::LOG_FILE_FLAG);
    args.iter()
        .any(|arg| arg == ProcessConfig::LOG_FILE_FLAG || arg.starts_with(&inline_prefix))
}

/// Copy the packaged binary to `<private_dir>/bin/monerod` and make it
/// executable.
///
/// An existing copy with the same size as the source is reused as-is.
pub fn stage_binary(source: &Path, private_dir: &Path) -> Result<PathBuf> {
    let staging_err = |path: &Path, message: String| NodeKeeperError::Staging {
        path: path.to_path_buf(),
        message,
    };

    let bin_dir = private_dir.join(PathsConfig::STAGED_BIN_DIR_NAME);
    fs::create_dir_all(&bin_dir).map_err(|e| staging_err(&bin_dir, e.to_string()))?;
    let target = bin_dir.join(PathsConfig::STAGED_BINARY_NAME);

    let source_len = fs::metadata(source)
        .map_err(|e| staging_err(source, e.to_string()))?
        .len();
    let is_current = fs::metadata(&target)
        .map(|meta| meta.len() == source_len)
        .unwrap_or(false);

    if is_current {
        debug!("Staged binary is current: {}", target.display());
    } else {
        fs::copy(source, &target).map_err(|e| staging_err(&target, e.to_string()))?;
        info!("Staged {} -> {}", source.display(), target.display());
    }

    platform::set_executable(&target).map_err(|e| staging_err(&target, e.to_string()))?;
    if !platform::is_executable(&target) {
        return Err(staging_err(&target, "not executable after chmod".into()));
    }

    Ok(target)
}

/// System dynamic linker used to start the staged binary on Android.
fn android_linker(platform: Platform) -> Option<PathBuf> {
    if !platform.is_android() {
        return None;
    }
    let linker = if platform::is_64bit() {
        PathsConfig::ANDROID_LINKER_64
    } else {
        PathsConfig::ANDROID_LINKER_32
    };
    let linker = Path::new(linker);
    linker.exists().then(|| linker.to_path_buf())
}

/// `dir` prepended to the inherited `LD_LIBRARY_PATH`.
fn library_path(dir: &Path) -> OsString {
    let mut value = dir.as_os_str().to_os_string();
    if let Some(existing) = std::env::var_os("LD_LIBRARY_PATH").filter(|v| !v.is_empty()) {
        value.push(":");
        value.push(existing);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_data_dir_separate_value() {
        let args = strings(&["--non-interactive", "--data-dir", "/srv/monero", "--prune-blockchain"]);
        assert_eq!(data_dir_from_args(&args), Some(PathBuf::from("/srv/monero")));
    }

    #[test]
    fn test_data_dir_inline_value() {
        let args = strings(&["--data-dir=/srv/monero"]);
        assert_eq!(data_dir_from_args(&args), Some(PathBuf::from("/srv/monero")));
    }

    #[test]
    fn test_data_dir_missing() {
        assert_eq!(data_dir_from_args(&strings(&["--non-interactive"])), None);
        assert_eq!(data_dir_from_args(&strings(&["--data-dir"])), None);
        assert_eq!(data_dir_from_args(&strings(&["--data-dir", ""])), None);
    }

    #[test]
    fn test_desktop_plan_appends_log_file() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("chain").join("main");
        let args = strings(&["--data-dir", data_dir.to_str().unwrap()]);

        let plan = LaunchPlan::prepare(
            Platform::Desktop,
            Path::new("/opt/monero/monerod"),
            &args,
            &data_dir,
            temp_dir.path(),
        )
        .unwrap();

        assert!(data_dir.is_dir());
        assert_eq!(plan.program, PathBuf::from("/opt/monero/monerod"));
        assert_eq!(plan.args.len(), 4);
        assert_eq!(plan.args[2], OsString::from("--log-file"));
        assert_eq!(plan.args[3], data_dir.join("monerod.log").into_os_string());
        assert_eq!(
            plan.env,
            vec![("HOME".to_string(), data_dir.clone().into_os_string())]
        );
    }

    #[test]
    fn test_existing_log_file_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        let args = strings(&[
            "--data-dir",
            data_dir.to_str().unwrap(),
            "--log-file=/var/log/monerod.log",
        ]);

        let plan = LaunchPlan::prepare(
            Platform::Desktop,
            Path::new("monerod"),
            &args,
            &data_dir,
            temp_dir.path(),
        )
        .unwrap();

        assert_eq!(plan.args.len(), 3);
    }

    #[test]
    fn test_stage_binary_copies_and_marks_executable() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("libmonerod_arm64.so");
        fs::write(&source, b"binary-v1").unwrap();
        let private_dir = temp_dir.path().join("private");

        let staged = stage_binary(&source, &private_dir).unwrap();

        assert_eq!(staged, private_dir.join("bin").join("monerod"));
        assert_eq!(fs::read(&staged).unwrap(), b"binary-v1");
        #[cfg(unix)]
        assert!(platform::is_executable(&staged));
    }

    #[test]
    fn test_stage_binary_size_only_staleness() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("libmonerod_arm64.so");
        let private_dir = temp_dir.path().join("private");

        fs::write(&source, b"binary-v1").unwrap();
        let staged = stage_binary(&source, &private_dir).unwrap();

        // Same size, different content: the old copy is kept
        fs::write(&source, b"binary-v2").unwrap();
        stage_binary(&source, &private_dir).unwrap();
        assert_eq!(fs::read(&staged).unwrap(), b"binary-v1");

        // Size change triggers a fresh copy
        fs::write(&source, b"binary-v10").unwrap();
        stage_binary(&source, &private_dir).unwrap();
        assert_eq!(fs::read(&staged).unwrap(), b"binary-v10");
    }

    #[test]
    fn test_stage_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = stage_binary(&temp_dir.path().join("missing.so"), temp_dir.path()).unwrap_err();
        assert!(matches!(err, NodeKeeperError::Staging { .. }));
    }

    #[test]
    fn test_android_plan_sets_library_path() {
        let temp_dir = TempDir::new().unwrap();
        let lib_dir = temp_dir.path().join("lib");
        fs::create_dir_all(&lib_dir).unwrap();
        let source = lib_dir.join("libmonerod_arm64.so");
        fs::write(&source, b"binary").unwrap();
        let data_dir = temp_dir.path().join("data");
        let args = strings(&["--data-dir", data_dir.to_str().unwrap()]);

        let plan = LaunchPlan::prepare(
            Platform::Android,
            &source,
            &args,
            &data_dir,
            &temp_dir.path().join("private"),
        )
        .unwrap();

        let (_, ld_path) = plan
            .env
            .iter()
            .find(|(key, _)| key == "LD_LIBRARY_PATH")
            .unwrap();
        assert!(ld_path.to_string_lossy().starts_with(lib_dir.to_str().unwrap()));

        let staged = temp_dir.path().join("private").join("bin").join("monerod");
        if android_linker(Platform::Android).is_some() {
            assert_eq!(plan.args[0], staged.into_os_string());
        } else {
            assert_eq!(plan.program, staged);
        }
    }
}
