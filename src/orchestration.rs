//! Batch orchestration
//!
//! A batch is validated up front (configuration, empty batch, token,
//! duplicate identifiers), then every item runs the request → fetch →
//! install pipeline. Results are folded in input order into a
//! [`BatchOutcome`], even when several items are in flight at once.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use log::{info, warn};

use crate::config::{DEFAULT_STATUS, ItemSpec, RunConfig};
use crate::error::FetchError;
use crate::install::Installer;
use crate::progress::{ItemPhase, ItemProgress, ProgressSink};
use crate::release::{ReleaseClient, build_request_url};

/// What a failed item does to the rest of the batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next item
    #[default]
    ContinueOnError,
    /// Stop at the first failed item (in input order)
    FailFast,
}

/// Final state of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Every item resolved, successfully or with a recorded failure
    AllDone,
    /// Stopped at the item with this 0-based index
    Aborted { index: usize },
}

/// Result of one item
#[derive(Debug)]
pub struct ItemReport {
    pub index: usize,
    pub identifier: String,
    pub result: Result<Vec<PathBuf>, FetchError>,
}

impl ItemReport {
    pub fn is_installed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-item outcomes in input order plus the batch state
#[derive(Debug)]
pub struct BatchOutcome {
    reports: Vec<ItemReport>,
    state: BatchState,
}

impl BatchOutcome {
    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn reports(&self) -> &[ItemReport] {
        &self.reports
    }

    /// Report for `identifier`
    pub fn get(&self, identifier: &str) -> Option<&ItemReport> {
        self.reports.iter().find(|r| r.identifier == identifier)
    }

    pub fn installed(&self) -> impl Iterator<Item = &ItemReport> {
        self.reports.iter().filter(|r| r.is_installed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemReport> {
        self.reports.iter().filter(|r| !r.is_installed())
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.state, BatchState::Aborted { .. })
    }

    /// The error that stopped an aborted batch
    pub fn abort_error(&self) -> Option<&FetchError> {
        match self.state {
            BatchState::AllDone => None,
            BatchState::Aborted { index } => self
                .reports
                .iter()
                .find(|r| r.index == index)
                .and_then(|r| r.result.as_ref().err()),
        }
    }
}

/// A validated list of items bound to its run configuration
#[derive(Debug, Clone)]
pub struct Batch {
    items: Vec<ItemSpec>,
    config: RunConfig,
}

impl Batch {
    /// Validate everything that can be checked before touching the network
    pub fn new(items: Vec<ItemSpec>, config: RunConfig) -> Result<Self, FetchError> {
        if config.server.trim().is_empty() {
            return Err(FetchError::Config("Server (options.server) is required".to_string()));
        }
        url::Url::parse(&config.server)
            .map_err(|e| FetchError::Config(format!("Invalid server url {}: {e}", config.server)))?;
        if config.destination.as_os_str().is_empty() {
            return Err(FetchError::Config("Destination (options.dest) is required".to_string()));
        }
        if config.jobs == 0 {
            return Err(FetchError::Config("jobs must be at least 1".to_string()));
        }

        if items.is_empty() {
            return Err(FetchError::EmptyBatch);
        }

        if config.default_status != DEFAULT_STATUS && config.token().is_none() {
            return Err(FetchError::TokenRequired {
                status: config.default_status.clone(),
            });
        }

        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !item.identifier.is_empty() && !seen.insert(item.identifier.as_str()) {
                return Err(FetchError::DuplicateIdentifier(item.identifier.clone()));
            }
        }

        Ok(Self { items, config })
    }

    pub fn items(&self) -> &[ItemSpec] {
        &self.items
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

/// Run every item of `batch`, reporting phases through `progress`.
///
/// Returns `Err` only for fatal problems (destination, HTTP client setup).
/// Item failures are recorded in the outcome; under
/// [`FailurePolicy::FailFast`] the first one ends the batch as aborted.
/// No new item starts after that, but items already in flight run to
/// completion before this returns, so nothing writes into the destination
/// afterwards. Their results are not part of the outcome.
pub async fn run_batch(batch: &Batch, progress: &ProgressSink) -> Result<BatchOutcome, FetchError> {
    let config = &batch.config;

    tokio::fs::create_dir_all(&config.destination)
        .await
        .map_err(|source| FetchError::Destination {
            path: config.destination.clone(),
            source,
        })?;

    let client = ReleaseClient::new(config.request_timeout, config.retry)
        .map_err(|e| FetchError::Config(format!("Unable to create HTTP client: {e}")))?;
    let installer = Installer::new(client.clone());

    let total = batch.items.len();
    for (i, item) in batch.items.iter().enumerate() {
        progress.emit(ItemProgress {
            index: i + 1,
            total,
            identifier: item.identifier.clone(),
            phase: ItemPhase::Pending,
        });
    }

    let client = &client;
    let installer = &installer;
    let stop = AtomicBool::new(false);
    let stop = &stop;
    let mut pipelines = std::pin::pin!(
        futures::stream::iter(batch.items.iter().enumerate())
            .take_while(move |_| futures::future::ready(!stop.load(Ordering::Relaxed)))
            .map(move |(index, item)| run_item(index, total, item, config, client, installer, progress))
            .buffered(config.jobs.max(1))
    );

    let mut reports = Vec::with_capacity(total);
    let mut state = BatchState::AllDone;

    while let Some(report) = pipelines.next().await {
        let failed = report.result.is_err();
        let index = report.index;
        reports.push(report);

        if failed && config.failure_policy == FailurePolicy::FailFast {
            state = BatchState::Aborted { index };
            stop.store(true, Ordering::Relaxed);
            break;
        }
    }

    let mut drained = 0;
    while pipelines.next().await.is_some() {
        drained += 1;
    }
    if drained > 0 {
        info!("Discarded {drained} items that were in flight when the batch aborted");
    }

    Ok(BatchOutcome { reports, state })
}

async fn run_item(
    index: usize,
    total: usize,
    item: &ItemSpec,
    config: &RunConfig,
    client: &ReleaseClient,
    installer: &Installer,
    progress: &ProgressSink,
) -> ItemReport {
    let emit = |phase: ItemPhase| {
        progress.emit(ItemProgress {
            index: index + 1,
            total,
            identifier: item.identifier.clone(),
            phase,
        })
    };

    info!("Downloading {} ({}/{total})", item.identifier, index + 1);
    let result = pipeline(item, config, client, installer, &emit).await;

    match &result {
        Ok(files) => {
            info!("{}: installed {} files", item.identifier, files.len());
            emit(ItemPhase::Done { files: files.len() });
        }
        Err(e) => {
            warn!("{}", e.chain());
            emit(ItemPhase::Failed { reason: e.chain() });
        }
    }

    ItemReport {
        index,
        identifier: item.identifier.clone(),
        result,
    }
}

/// Request → fetch → install for one item
async fn pipeline(
    item: &ItemSpec,
    config: &RunConfig,
    client: &ReleaseClient,
    installer: &Installer,
    emit: &(dyn Fn(ItemPhase) + Sync),
) -> Result<Vec<PathBuf>, FetchError> {
    emit(ItemPhase::Requesting);
    let url = build_request_url(item, config)?;
    let release = client.fetch_release(&item.identifier, &url).await?;

    emit(ItemPhase::Installing);
    installer.install(&item.identifier, &release, config).await
}
