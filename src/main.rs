//! CLI entry point for `pst-harvest`.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use pst_harvest::archive::json;
use pst_harvest::config::{self, Config};
use pst_harvest::context::ExtractContext;
use pst_harvest::error::HarvestError;
use pst_harvest::walker::{self, WalkStats};

/// Extract mail items and attachments from a mailbox archive into SQLite.
#[derive(Parser)]
#[command(name = "pst-harvest", version, about)]
struct Cli {
    /// Archive dump to extract
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _log_guard = setup_logging(log_level, &config);

    cmd_extract(&cli.archive, &config)
}

/// Set up tracing with stderr output and a daily-rotated log file.
///
/// The returned guard flushes the file writer on drop.
fn setup_logging(
    level: &str,
    config: &Config,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "pst-harvest.log");
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
        Some(guard)
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        None
    }
}

/// Extract one archive and print a summary.
fn cmd_extract(path: &Path, config: &Config) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("Archive not found: {}", path.display());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&cancel))?;

    let ctx = ExtractContext::from_config(config, path)?.with_cancel_flag(cancel);
    let mut archive = json::open(path).map_err(|e| HarvestError::ArchiveAccess {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Extracting {msg} [{elapsed_precise}]")
            .expect("valid template"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let start = Instant::now();
    let result = walker::harvest(&mut archive, path, &ctx, &|stats: &WalkStats| {
        pb.set_message(format!(
            "{} messages, {} saved",
            stats.messages_seen, stats.persisted
        ));
    });
    pb.finish_and_clear();

    let stats = result?;
    print_summary(path, &ctx, &stats, start.elapsed());

    if stats.cancelled {
        anyhow::bail!("Interrupted after {} saved message(s)", stats.persisted);
    }
    Ok(())
}

fn print_summary(path: &Path, ctx: &ExtractContext, stats: &WalkStats, elapsed: Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  Extraction complete:");
    println!("  {:<25} {}", "Archive", path.display());
    println!("  {:<25} {}", "Database", ctx.database.display());
    println!("  {:<25} {}", "Folders", stats.folders);
    println!("  {:<25} {}", "Messages seen", stats.messages_seen);
    println!("  {:<25} {}", "Saved", stats.persisted);
    println!("  {:<25} {}", "Skipped (not mail)", stats.skipped_non_mail);
    if stats.revisits > 0 {
        println!("  {:<25} {}", "Skipped (revisited)", stats.revisits);
    }
    println!("  {:<25} {}", "Failed", stats.failed);
    println!(
        "  {:<25} {} ({})",
        "Attachments",
        stats.attachments,
        format_size(stats.attachment_bytes, BINARY)
    );
    println!(
        "  {:<25} {}",
        "Attachment folder",
        ctx.materializer.base_dir().display()
    );
    println!("  {:<25} {:.2?}", "Elapsed", elapsed);
    println!();
}
