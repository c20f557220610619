//! Run options, task file parsing and configuration resolution
//!
//! Options come from three places, highest precedence first: command line,
//! the `[options]` table of the task file, and the process environment
//! (`SPRINGROLL_SERVER`, `SPRINGROLL_TOKEN`). They are merged once into a
//! [`RunConfig`] by [`resolve_config`]; nothing downstream reads the
//! environment.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::FetchError;
use crate::orchestration::{Batch, FailurePolicy};
use crate::release::RetryPolicy;

/// Status used when neither the item nor the task selects one
pub const DEFAULT_STATUS: &str = "prod";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One requested game
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSpec {
    pub identifier: String,
    pub version: Option<String>,
    pub commit: Option<String>,
    pub status: Option<String>,
}

impl ItemSpec {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// Check that `identifier` can be used both as a URL path segment and as a
/// directory name directly under the destination.
///
/// Empty identifiers are [`FetchError::InvalidItem`]; anything that is not
/// one plain path name (separators, `.`, `..`, drive prefixes) is
/// [`FetchError::UnsafeIdentifier`].
pub fn check_identifier(identifier: &str) -> Result<(), FetchError> {
    if identifier.is_empty() {
        return Err(FetchError::InvalidItem);
    }
    let mut components = Path::new(identifier).components();
    let single_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == identifier
    );
    if !single_name || identifier.contains(['/', '\\']) {
        return Err(FetchError::UnsafeIdentifier(identifier.to_string()));
    }
    Ok(())
}

/// Batch-wide settings, fully resolved
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub server: String,
    pub token: Option<String>,
    pub destination: PathBuf,
    pub default_status: String,
    pub debug: bool,
    pub write_metadata: bool,
    pub jobs: usize,
    pub failure_policy: FailurePolicy,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl RunConfig {
    /// Minimal config with defaults for everything but server and destination
    pub fn new(server: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            server: server.into(),
            token: None,
            destination: destination.into(),
            default_status: DEFAULT_STATUS.to_string(),
            debug: false,
            write_metadata: false,
            jobs: 1,
            failure_policy: FailurePolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Token, if set and non-empty
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Partially specified options as written in the task file or on the CLI
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunOptions {
    pub server: Option<String>,
    pub token: Option<String>,
    pub dest: Option<PathBuf>,
    pub status: Option<String>,
    pub debug: Option<bool>,
    pub json: Option<bool>,
    pub jobs: Option<usize>,
    pub fail_fast: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
}

impl RunOptions {
    /// Layer `higher` on top of `self`; fields set in `higher` win
    pub fn overlay(self, higher: RunOptions) -> RunOptions {
        RunOptions {
            server: higher.server.or(self.server),
            token: higher.token.or(self.token),
            dest: higher.dest.or(self.dest),
            status: higher.status.or(self.status),
            debug: higher.debug.or(self.debug),
            json: higher.json.or(self.json),
            jobs: higher.jobs.or(self.jobs),
            fail_fast: higher.fail_fast.or(self.fail_fast),
            timeout_secs: higher.timeout_secs.or(self.timeout_secs),
            retries: higher.retries.or(self.retries),
        }
    }
}

/// Environment-sourced fallbacks, captured once
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub server: Option<String>,
    pub token: Option<String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            server: std::env::var("SPRINGROLL_SERVER").ok(),
            token: std::env::var("SPRINGROLL_TOKEN").ok(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Merge explicit options with environment fallbacks and apply defaults
pub fn resolve_config(options: RunOptions, env: &Environment) -> Result<RunConfig, FetchError> {
    let server = non_empty(options.server)
        .or_else(|| non_empty(env.server.clone()))
        .ok_or_else(|| FetchError::Config("Server (options.server) is required".to_string()))?;

    let destination = options
        .dest
        .filter(|d| !d.as_os_str().is_empty())
        .ok_or_else(|| FetchError::Config("Destination (options.dest) is required".to_string()))?;

    if options.jobs == Some(0) {
        return Err(FetchError::Config("jobs must be at least 1".to_string()));
    }

    let mut config = RunConfig::new(server, destination);
    config.token = non_empty(options.token).or_else(|| non_empty(env.token.clone()));
    if let Some(status) = non_empty(options.status) {
        config.default_status = status;
    }
    config.debug = options.debug.unwrap_or(false);
    config.write_metadata = options.json.unwrap_or(false);
    config.jobs = options.jobs.unwrap_or(1);
    if options.fail_fast.unwrap_or(false) {
        config.failure_policy = FailurePolicy::FailFast;
    }
    if let Some(secs) = options.timeout_secs {
        config.request_timeout = Duration::from_secs(secs.max(1));
    }
    if let Some(retries) = options.retries {
        config.retry.attempts = retries.max(1);
    }
    Ok(config)
}

/// Game entry in a task: a bare slug or a table with selectors
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum GameEntry {
    Slug(String),
    Detailed(GameTable),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GameTable {
    pub slug: Option<String>,
    pub bundle_id: Option<String>,
    pub version: Option<String>,
    pub commit: Option<String>,
    pub status: Option<String>,
}

impl From<GameEntry> for ItemSpec {
    fn from(entry: GameEntry) -> Self {
        match entry {
            GameEntry::Slug(slug) => ItemSpec::new(slug),
            GameEntry::Detailed(table) => ItemSpec {
                identifier: non_empty(table.slug)
                    .or_else(|| non_empty(table.bundle_id))
                    .unwrap_or_default(),
                version: non_empty(table.version),
                commit: non_empty(table.commit),
                status: non_empty(table.status),
            },
        }
    }
}

/// A named batch: either a plain list of games or a table with a status
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BatchSpec {
    Short(Vec<GameEntry>),
    Verbose {
        status: Option<String>,
        games: Vec<GameEntry>,
    },
}

impl BatchSpec {
    /// Status override for the whole task, if any
    pub fn status(&self) -> Option<&str> {
        match self {
            BatchSpec::Short(_) => None,
            BatchSpec::Verbose { status, .. } => status.as_deref().filter(|s| !s.is_empty()),
        }
    }

    pub fn items(&self) -> Vec<ItemSpec> {
        let games = match self {
            BatchSpec::Short(games) | BatchSpec::Verbose { games, .. } => games,
        };
        games.iter().cloned().map(ItemSpec::from).collect()
    }

    /// Run options for this task: its own `status` replaces whatever status
    /// `base` carries, command line included.
    pub fn options(&self, mut base: RunOptions) -> RunOptions {
        if let Some(status) = self.status() {
            base.status = Some(status.to_string());
        }
        base
    }

    /// Resolve options for this task and validate its games
    pub fn batch(&self, base: RunOptions, env: &Environment) -> Result<Batch, FetchError> {
        let config = resolve_config(self.options(base), env)?;
        Batch::new(self.items(), config)
    }
}

/// Contents of a task file (`springroll.toml`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskFile {
    #[serde(default)]
    pub options: RunOptions,
    #[serde(default)]
    pub tasks: BTreeMap<String, BatchSpec>,
}

impl TaskFile {
    pub fn parse(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Tasks to run for `names`: all of them in name order when `names` is
    /// empty, otherwise exactly the named ones in the order given.
    pub fn select(&self, names: &[String]) -> Result<Vec<(&str, &BatchSpec)>, FetchError> {
        if self.tasks.is_empty() {
            return Err(FetchError::Config("No tasks defined in the [tasks] table".to_string()));
        }
        if names.is_empty() {
            return Ok(self.tasks.iter().map(|(k, v)| (k.as_str(), v)).collect());
        }
        names
            .iter()
            .map(|name| {
                self.tasks
                    .get_key_value(name)
                    .map(|(k, v)| (k.as_str(), v))
                    .ok_or_else(|| FetchError::Config(format!("Unknown task \"{name}\"")))
            })
            .collect()
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read task file {}", path.display()))?;
        Self::parse(&source).with_context(|| format!("Failed to parse task file {}", path.display()))
    }
}
