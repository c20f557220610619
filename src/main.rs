mod cli;
mod report;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use tokio::sync::mpsc;

use springroll_fetch::{BatchSpec, Environment, ProgressSink, RunOptions, TaskFile, run_batch};

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main()) {
        report::print_fatal(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn real_main() -> Result<()> {
    let args = cli::Args::parse();
    let env = Environment::from_process();
    let cli_options = args.options.into_options();

    match args.sub {
        cli::Cmd::Run { tasks } => {
            let file = TaskFile::load(&args.config)?;
            let base = file.options.clone().overlay(cli_options);
            let selected = file.select(&tasks)?;
            for (name, spec) in selected {
                run_task(name, spec, base.clone(), &env).await?;
            }
            Ok(())
        }
        cli::Cmd::Fetch { games } => {
            // Task file is optional here, but only a missing file is tolerated
            let file = if args.config.exists() {
                TaskFile::load(&args.config)?
            } else {
                TaskFile::default()
            };
            let base = file.options.overlay(cli_options);
            let spec = BatchSpec::Short(
                games
                    .into_iter()
                    .map(springroll_fetch::GameEntry::Slug)
                    .collect(),
            );
            run_task("fetch", &spec, base, &env).await
        }
    }
}

async fn run_task(name: &str, spec: &BatchSpec, options: RunOptions, env: &Environment) -> Result<()> {
    let batch = spec.batch(options, env).with_context(|| format!("Task \"{name}\""))?;

    info!(
        "Running task {name}: {} games into {}",
        batch.items().len(),
        batch.config().destination.display()
    );

    // Each item emits at most four events, so the channel never fills
    let (tx, rx) = mpsc::channel(batch.items().len() * 4 + 1);
    let printer = report::spawn_progress_printer(rx);
    let sink = ProgressSink::new(tx);

    let outcome = run_batch(&batch, &sink).await;
    drop(sink);
    printer.await.ok();

    let outcome = outcome.with_context(|| format!("Task \"{name}\""))?;
    report::print_summary(name, &outcome);

    if outcome.is_aborted() {
        bail!("Task \"{name}\" aborted");
    }
    Ok(())
}
