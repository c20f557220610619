//! SpringRoll Connect game downloader
//!
//! Resolves releases for a batch of games against a SpringRoll Connect
//! server, downloads each release archive and extracts it into
//! `{dest}/{game}`, optionally writing the release metadata next to it.
//!
//! ```no_run
//! # async fn demo() -> Result<(), springroll_fetch::FetchError> {
//! use springroll_fetch::{Batch, ItemSpec, ProgressSink, RunConfig, run_batch};
//!
//! let config = RunConfig::new("https://connect.example.com", "deploy/games");
//! let batch = Batch::new(vec![ItemSpec::new("my-game")], config)?;
//! let outcome = run_batch(&batch, &ProgressSink::disabled()).await?;
//! assert!(!outcome.is_aborted());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod install;
pub mod orchestration;
pub mod progress;
pub mod release;

pub use config::{
    BatchSpec, DEFAULT_STATUS, Environment, GameEntry, GameTable, ItemSpec, RunConfig, RunOptions,
    TaskFile, check_identifier, resolve_config,
};
pub use error::{ExtractError, FetchError, InstallFailure, TransportError};
pub use install::Installer;
pub use orchestration::{Batch, BatchOutcome, BatchState, FailurePolicy, ItemReport, run_batch};
pub use progress::{ItemPhase, ItemProgress, ProgressSink};
pub use release::{ReleaseClient, ReleaseResult, RetryPolicy, build_request_url};
