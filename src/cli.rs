use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use springroll_fetch::RunOptions;

#[derive(Parser, Debug)]
#[command(version, about = "Download games from SpringRoll Connect")]
pub struct Args {
    /// Task file with `[options]` and `[tasks]` tables
    #[arg(long, short = 'c', global = true, default_value = "springroll.toml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub options: OptionArgs,

    #[command(subcommand)]
    pub sub: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Run tasks from the task file (all tasks when none are named)
    Run { tasks: Vec<String> },
    /// Fetch the given slugs or bundle ids with the resolved options
    Fetch {
        #[arg(required = true)]
        games: Vec<String>,
    },
}

/// Run options settable from the command line; unset flags fall through
/// to the task file and then the environment
#[derive(ClapArgs, Debug, Default)]
pub struct OptionArgs {
    /// Release server base url [env fallback: SPRINGROLL_SERVER]
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Access token, required for non-prod statuses [env fallback: SPRINGROLL_TOKEN]
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Destination root directory
    #[arg(long, global = true)]
    pub dest: Option<PathBuf>,

    /// Default release status when a game selects none
    #[arg(long, global = true)]
    pub status: Option<String>,

    /// Request debug builds and pretty-print release json
    #[arg(long, global = true)]
    pub debug: bool,

    /// Write `{dest}/{game}.json` with the release metadata
    #[arg(long, global = true)]
    pub json: bool,

    /// Number of games processed at once
    #[arg(long, global = true)]
    pub jobs: Option<usize>,

    /// Stop at the first game that fails
    #[arg(long, global = true)]
    pub fail_fast: bool,

    /// Release request timeout in seconds
    #[arg(long = "timeout", global = true)]
    pub timeout_secs: Option<u64>,

    /// Attempts per network call
    #[arg(long, global = true)]
    pub retries: Option<u32>,
}

impl OptionArgs {
    /// Boolean flags only override when present
    pub fn into_options(self) -> RunOptions {
        RunOptions {
            server: self.server,
            token: self.token,
            dest: self.dest,
            status: self.status,
            debug: self.debug.then_some(true),
            json: self.json.then_some(true),
            jobs: self.jobs,
            fail_fast: self.fail_fast.then_some(true),
            timeout_secs: self.timeout_secs,
            retries: self.retries,
        }
    }
}
