//! Run orchestration for ldapsync.
//!
//! Sequences one invocation end to end:
//!
//! 1. **Validate** the [`Settings`] for the chosen [`Command`]
//! 2. **Connect** to the directory and open a paged search
//! 3. **Write** the artifact, or **page** the records
//! 4. **Deliver** over SFTP or HTTP
//! 5. **Report** an [`ExitStatus`], writing an [`ErrorLog`] on failure
//!
//! The pipelines themselves live on [`SyncRunner`], which takes its entry
//! source and delivery clients as arguments.

mod error;
mod error_log;
mod run;
mod runner;
mod settings;
mod status;

pub use error::{ConfigError, EngineError, EngineResult};
pub use error_log::ErrorLog;
pub use run::{run, Command};
pub use runner::{DestinationSummary, FilesSummary, ProbeSummary, SyncRunner, WebSummary};
pub use settings::{Settings, SftpSettings, WebSettings};
pub use status::ExitStatus;
