//! Archive installation into the destination directory
//!
//! ## Module Organization
//!
//! - `metadata` - optional `{id}.json` sidecar
//! - `download` - streamed archive download
//! - `extract` - format detection and unpacking (zip, tar.gz, tar)

mod download;
mod extract;
mod metadata;

use std::path::{Path, PathBuf};

use log::{info, warn};

pub use extract::{ArchiveFormat, EXTRACTED_FILE_MODE, extract_archive};
pub use metadata::sidecar_path;

use crate::config::{RunConfig, check_identifier};
use crate::error::{FetchError, InstallFailure, TransportError};
use crate::release::{ReleaseClient, ReleaseResult};

/// Install directory for `identifier`, always a direct child of `destination`
pub fn target_dir(destination: &Path, identifier: &str) -> Result<PathBuf, FetchError> {
    check_identifier(identifier)?;
    Ok(destination.join(identifier))
}

/// Downloads and unpacks release archives
#[derive(Debug, Clone)]
pub struct Installer {
    client: ReleaseClient,
}

impl Installer {
    pub fn new(client: ReleaseClient) -> Self {
        Self { client }
    }

    /// Write the sidecar (if enabled), download the archive and extract it
    /// into `{destination}/{identifier}`. Returns the extracted file paths.
    pub async fn install(
        &self,
        identifier: &str,
        release: &ReleaseResult,
        config: &RunConfig,
    ) -> Result<Vec<PathBuf>, FetchError> {
        let fail = |source: InstallFailure| FetchError::Install {
            identifier: identifier.to_string(),
            source,
        };

        let target = target_dir(&config.destination, identifier)?;
        if config.write_metadata {
            let path = sidecar_path(&config.destination, identifier)?;
            match metadata::write_sidecar(&path, &release.metadata, config.debug).await {
                Ok(()) => info!("{identifier}: wrote {}", path.display()),
                Err(e) => warn!("{identifier}: unable to write release json: {e}"),
            }
        }

        let archive_url = release
            .archive_url
            .as_deref()
            .ok_or_else(|| fail(InstallFailure::MissingArchiveUrl))?;

        // Temp dir lives until extraction finishes, removed on drop
        let scratch = tempfile::tempdir()
            .map_err(|e| fail(InstallFailure::Download(TransportError::Io(e))))?;
        let archive_path = scratch.path().join("archive");

        let bytes = download::download_to(self.client.http(), self.client.retry(), archive_url, &archive_path)
            .await
            .map_err(|e| fail(InstallFailure::Download(e)))?;
        info!("{identifier}: downloaded {bytes} bytes, installing");

        let files = extract_archive(&archive_path, &target)
            .await
            .map_err(|e| fail(InstallFailure::Extract(e)))?;

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::RetryPolicy;

    #[test]
    fn target_is_a_direct_child_of_destination() {
        let dest = Path::new("games");
        assert_eq!(target_dir(dest, "demo").unwrap(), dest.join("demo"));
        for id in ["..", ".", "a/../b", "../escape"] {
            assert!(matches!(target_dir(dest, id), Err(FetchError::UnsafeIdentifier(_))));
        }
        assert!(matches!(target_dir(dest, ""), Err(FetchError::InvalidItem)));
    }

    #[tokio::test]
    async fn unsafe_identifier_touches_nothing() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("dest");
        std::fs::create_dir(&dest).unwrap();
        let mut config = RunConfig::new("http://127.0.0.1:9", &dest);
        config.write_metadata = true;
        let release = ReleaseResult {
            success: true,
            error: None,
            archive_url: Some("http://127.0.0.1:9/a.tar.gz".into()),
            metadata: serde_json::json!({}),
        };
        let installer = Installer::new(ReleaseClient::new(config.request_timeout, RetryPolicy::none()).unwrap());

        let err = installer.install("../escape", &release, &config).await.unwrap_err();
        assert!(matches!(err, FetchError::UnsafeIdentifier(_)));
        assert!(!root.path().join("escape.json").exists());
        assert!(!root.path().join("escape").exists());
    }
}
