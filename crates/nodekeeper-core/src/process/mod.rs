//! Daemon process supervision.
//!
//! [`ProcessSupervisor`] owns one `monerod` child: it builds the command line
//! (staging the binary and going through the system linker on Android),
//! forwards stdout/stderr line by line to a [`LineSink`], watches for exit and
//! publishes every [`ProcessState`] transition to [`subscribe`]rs.
//!
//! [`subscribe`]: ProcessSupervisor::subscribe
//!
//! # Example
//!
//! ```rust,no_run
//! use nodekeeper_core::platform::Platform;
//! use nodekeeper_core::process::{ProcessSupervisor, SupervisorConfig};
//!
//! let supervisor = ProcessSupervisor::new(Platform::Desktop);
//! supervisor.configure(SupervisorConfig::new(
//!     Some("/opt/monero/monerod".into()),
//!     vec!["--data-dir".into(), "/srv/monero".into()],
//! ));
//!
//! if supervisor.start() {
//!     println!("running as PID {:?}", supervisor.pid());
//!     supervisor.stop();
//! }
//! ```

mod launcher;
mod output;
mod state;
mod supervisor;

pub use launcher::{data_dir_from_args, stage_binary, LaunchPlan};
pub use output::{LineSink, OutputStream, TracingSink};
pub use state::{ProcessState, StateChange};
pub use supervisor::{ProcessSupervisor, SupervisorConfig, SupervisorStatus};
