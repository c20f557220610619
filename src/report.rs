//! Colored console output for batch progress and results

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use springroll_fetch::{BatchOutcome, FetchError, ItemPhase, ItemProgress};

fn colored(stream: &mut StandardStream, color: Color, bold: bool, text: &str) {
    let _ = stream.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
    let _ = write!(stream, "{text}");
    let _ = stream.reset();
}

/// Print progress events as they arrive; finishes when every sender is dropped
pub fn spawn_progress_printer(mut rx: mpsc::Receiver<ItemProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdout = StandardStream::stdout(ColorChoice::Auto);
        while let Some(progress) = rx.recv().await {
            let prefix = format!("[{}/{}] ", progress.index, progress.total);
            match &progress.phase {
                ItemPhase::Pending => continue,
                ItemPhase::Requesting => {
                    colored(&mut stdout, Color::White, false, &prefix);
                    colored(&mut stdout, Color::White, false, "Downloading ");
                    colored(&mut stdout, Color::Yellow, false, &progress.identifier);
                    let _ = writeln!(stdout, " ...");
                }
                ItemPhase::Installing => {
                    colored(&mut stdout, Color::White, false, &prefix);
                    colored(&mut stdout, Color::Yellow, false, &progress.identifier);
                    let _ = writeln!(stdout, " installing ...");
                }
                ItemPhase::Done { files } => {
                    colored(&mut stdout, Color::White, false, &prefix);
                    colored(&mut stdout, Color::Yellow, false, &progress.identifier);
                    colored(&mut stdout, Color::Green, false, " Done.");
                    let _ = writeln!(stdout, " ({files} files)");
                }
                ItemPhase::Failed { reason } => {
                    colored(&mut stdout, Color::White, false, &prefix);
                    colored(&mut stdout, Color::Yellow, false, &progress.identifier);
                    colored(&mut stdout, Color::Red, false, " Failed: ");
                    let _ = writeln!(stdout, "{reason}");
                }
            }
        }
    })
}

/// Summary for one task after its batch finished
pub fn print_summary(task: &str, outcome: &BatchOutcome) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let installed = outcome.installed().count();
    let failed = outcome.failed().count();

    let _ = writeln!(stdout);
    colored(&mut stdout, Color::Cyan, true, task);
    let _ = writeln!(stdout, ": {installed} installed, {failed} failed");

    for report in outcome.failed() {
        let reason = report
            .result
            .as_ref()
            .err()
            .map(FetchError::chain)
            .unwrap_or_default();
        colored(&mut stdout, Color::Red, false, "  ✗ ");
        let label = if report.identifier.is_empty() {
            format!("#{}", report.index + 1)
        } else {
            report.identifier.clone()
        };
        let _ = writeln!(stdout, "{label}: {reason}");
    }

    if let Some(err) = outcome.abort_error() {
        let mut stderr = StandardStream::stderr(ColorChoice::Auto);
        colored(&mut stderr, Color::Red, true, "Aborted: ");
        let _ = writeln!(stderr, "{}", err.chain());
    }
}

/// Fatal error before or outside a batch
pub fn print_fatal(message: &str) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    colored(&mut stderr, Color::Red, true, ">> ");
    let _ = writeln!(stderr, "{message}");
}
