//! Error taxonomy for release fetching and installation
//!
//! Errors fall into two groups:
//! - fatal errors stop a batch before (or while) it runs: configuration,
//!   empty batch, missing token, duplicate identifiers, unusable destination
//! - per-item errors are recorded against a single game and, under the
//!   default failure policy, do not affect the rest of the batch

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error for every operation in this crate
#[derive(Debug, Error)]
pub enum FetchError {
    /// Missing or malformed run-level configuration
    #[error("{0}")]
    Config(String),

    /// A batch was requested without any games
    #[error("task must have games")]
    EmptyBatch,

    /// Non-production statuses are only served to authenticated clients
    #[error("non-production status \"{status}\" requires a token")]
    TokenRequired { status: String },

    /// Two items would install into the same directory
    #[error("game \"{0}\" is listed more than once")]
    DuplicateIdentifier(String),

    /// The destination root could not be created
    #[error("unable to create destination {}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Item has neither a slug nor a bundle id
    #[error("game must contain a slug or bundleId")]
    InvalidItem,

    /// Identifier is not a single plain path name (`..`, `a/b`, ...)
    #[error("game identifier \"{0}\" is not a valid directory name")]
    UnsafeIdentifier(String),

    /// The release server answered with `success: false`
    #[error("{message} with game \"{identifier}\"")]
    Release { message: String, identifier: String },

    /// The release request could not complete or its body was unreadable
    #[error("release request failed for game \"{identifier}\"")]
    Transport {
        identifier: String,
        #[source]
        source: TransportError,
    },

    /// Downloading or extracting the archive failed
    #[error("unable to download archive for game \"{identifier}\"")]
    Install {
        identifier: String,
        #[source]
        source: InstallFailure,
    },
}

impl FetchError {
    /// Whether this error stops the whole batch regardless of failure policy
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::Config(_)
                | FetchError::EmptyBatch
                | FetchError::TokenRequired { .. }
                | FetchError::DuplicateIdentifier(_)
                | FetchError::Destination { .. }
        )
    }

    /// Render the error with its full source chain on one line
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }
        rendered
    }
}

/// Network-level failures for API calls and archive downloads
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("server responded with HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("response body is not valid release JSON")]
    Decode(#[from] serde_json::Error),

    #[error("no data received for {0} seconds")]
    Stalled(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Failures worth another attempt: connection problems, timeouts, 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_connect() || e.is_timeout(),
            TransportError::Status(status) => status.is_server_error(),
            TransportError::Stalled(_) => true,
            TransportError::Decode(_) | TransportError::Io(_) => false,
        }
    }
}

/// Cause attached to [`FetchError::Install`]
#[derive(Debug, Error)]
pub enum InstallFailure {
    #[error("release does not provide an archive url")]
    MissingArchiveUrl,

    #[error("download failed")]
    Download(#[source] TransportError),

    #[error("extraction failed")]
    Extract(#[source] ExtractError),
}

/// Archive decoding and unpacking failures
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unrecognized archive format")]
    UnknownFormat,

    #[error("archive entry {0} escapes the target directory")]
    UnsafePath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
