//! dirstream - A streaming disk usage analyzer.
//!
//! Usage:
//!   dirstream [PATH]              Stream a scan and print the tree
//!   dirstream scan [PATH]         Scan with summary and display options
//!   dirstream export [PATH]       Export the scanned tree to JSON
//!   dirstream --help              Show help

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dirstream_core::{
    DirTree, DirectoryNode, FileEntry, ReadError, ScanConfig, ScanEvent, ScanProgress,
    SyncOutcome, TreeSynchronizer,
};
use dirstream_scan::StreamingScanner;

#[derive(Parser)]
#[command(
    name = "dirstream",
    version,
    about = "A streaming disk usage analyzer",
    long_about = "dirstream reports directory sizes as they are discovered.\n\n\
                  Run `dirstream [PATH]` to watch a scan stream in, or use \
                  subcommands for more control over the output."
)]
struct Cli {
    /// Path to analyze (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    #[command(flatten)]
    scan: ScanArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Clone)]
struct ScanArgs {
    /// Number of scan workers (0 = auto)
    #[arg(short, long, default_value = "0", global = true)]
    workers: usize,

    /// Skip entries whose names start with a dot
    #[arg(long, global = true)]
    no_hidden: bool,

    /// Skip entries matching a pattern (`*.log`, `cache*`, `*tmp*`, or an exact name)
    #[arg(short, long, global = true)]
    ignore: Vec<String>,

    /// Suppress progress lines on stderr
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Scan and show a summary followed by the largest entries
    Scan {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum depth to display
        #[arg(short, long, default_value = "3")]
        depth: u32,

        /// Show all entries (no depth limit on display)
        #[arg(short, long)]
        all: bool,

        /// Number of top entries to show per directory
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },

    /// Export scan results to JSON
    Export {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Everything a finished scan produced.
struct ScanOutcome {
    tree: DirTree,
    errors: Vec<ReadError>,
    progress: Option<ScanProgress>,
    elapsed: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli.scan)?;

    match cli.command {
        Some(Command::Scan {
            path,
            depth,
            all,
            top,
        }) => {
            run_scan(&path, config, !cli.scan.quiet, if all { None } else { Some(depth) }, top)
                .await?;
        }
        Some(Command::Export { path, output }) => {
            run_export(&path, config, output).await?;
        }
        None => {
            run_scan(&cli.path, config, !cli.scan.quiet, Some(1), 20).await?;
        }
    }

    Ok(())
}

fn build_config(args: &ScanArgs) -> Result<ScanConfig> {
    ScanConfig::builder()
        .workers(args.workers)
        .include_hidden(!args.no_hidden)
        .ignore_patterns(args.ignore.clone())
        .build()
        .map_err(|e| eyre!("Invalid scan settings: {e}"))
}

/// Stream a scan of `path` into a tree, reporting progress on stderr.
async fn stream_scan(path: &Path, config: ScanConfig, show_progress: bool) -> Result<ScanOutcome> {
    let start = Instant::now();
    let (handle, mut streams) = StreamingScanner::new(config)
        .start(path)
        .context("Failed to start scan")?;
    let mut sync = TreeSynchronizer::new(path);

    while let Some(event) = streams.updates.recv().await {
        if let (true, ScanEvent::Progress(progress)) = (show_progress, &event) {
            eprint!(
                "\r {} dirs, {} files, {} ({} queued, {} active)   ",
                progress.dirs_scanned,
                progress.files_scanned,
                format_size(progress.bytes_scanned),
                progress.queued,
                progress.active
            );
        }
        if sync.apply(event) == SyncOutcome::Finished {
            break;
        }
    }
    if show_progress {
        eprintln!();
    }

    let completed = sync.is_finished();
    handle.stop().await;
    if !completed {
        return Err(eyre!("Scan of {} ended before completion", path.display()));
    }

    let mut errors = Vec::new();
    while let Some(err) = streams.errors.recv().await {
        errors.push(err);
    }
    debug!(stats = ?sync.stats(), "Tree synchronized");

    let progress = sync.last_progress().cloned();
    let mut tree = sync.into_tree();
    tree.root.sort_by_size();

    Ok(ScanOutcome {
        tree,
        errors,
        progress,
        elapsed: start.elapsed(),
    })
}

/// Run a scan and display the summary and tree.
async fn run_scan(
    path: &Path,
    config: ScanConfig,
    show_progress: bool,
    max_depth: Option<u32>,
    top_n: usize,
) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;

    eprintln!("Scanning {}...", path.display());
    let outcome = stream_scan(&path, config, show_progress).await?;
    let summary = outcome.tree.summary();

    // Print summary
    println!();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", path.display(), format_size(summary.total_size));
    println!(
        " {} files, {} directories",
        summary.files, summary.dirs_loaded
    );
    match &outcome.progress {
        Some(progress) => println!(
            " Scanned in {:.2}s ({:.0} dirs/s)",
            outcome.elapsed.as_secs_f64(),
            progress.dirs_per_second()
        ),
        None => println!(" Scanned in {:.2}s", outcome.elapsed.as_secs_f64()),
    }
    println!("{}", "─".repeat(60));
    println!();

    // Print tree
    print_dir(
        &outcome.tree.root,
        0,
        max_depth.unwrap_or(u32::MAX),
        top_n,
        outcome.tree.total_size(),
    );

    if !outcome.errors.is_empty() {
        println!();
        println!("{} director(ies) could not be read:", outcome.errors.len());
        for err in outcome.errors.iter().take(top_n) {
            println!("  {err}");
        }
    }

    Ok(())
}

/// Export scan results to JSON.
async fn run_export(path: &Path, config: ScanConfig, output: Option<PathBuf>) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;

    eprintln!("Scanning {}...", path.display());
    let outcome = stream_scan(&path, config, false).await?;

    let json = serde_json::to_string_pretty(&outcome.tree)?;

    match output {
        Some(output_path) => {
            std::fs::write(&output_path, json)?;
            eprintln!("Exported to {}", output_path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

/// Child of a directory as shown in the printout.
enum Entry<'a> {
    Dir(&'a DirectoryNode),
    File(&'a FileEntry),
}

impl Entry<'_> {
    fn size(&self) -> u64 {
        match self {
            Entry::Dir(dir) => dir.size,
            Entry::File(file) => file.size,
        }
    }
}

/// Print a directory and its largest children.
fn print_dir(node: &DirectoryNode, depth: u32, max_depth: u32, top_n: usize, root_size: u64) {
    let name = if depth == 0 {
        node.path.display().to_string()
    } else {
        node.name()
    };
    print_line(&format!("{}/", name), node.size, depth, true, root_size);

    if depth >= max_depth {
        return;
    }

    let mut children: Vec<Entry<'_>> = node
        .subdirs
        .iter()
        .map(Entry::Dir)
        .chain(node.files.iter().map(Entry::File))
        .collect();
    children.sort_by(|a, b| b.size().cmp(&a.size()));
    let remaining = children.len().saturating_sub(top_n);

    for child in children.iter().take(top_n) {
        match child {
            Entry::Dir(dir) => print_dir(dir, depth + 1, max_depth, top_n, root_size),
            Entry::File(file) => print_line(&file.name, file.size, depth + 1, false, root_size),
        }
    }

    if remaining > 0 {
        let indent = "  ".repeat((depth + 1) as usize);
        println!("{}  ... and {} more", indent, remaining);
    }
}

fn print_line(name: &str, size: u64, depth: u32, is_dir: bool, root_size: u64) {
    let indent = "  ".repeat(depth as usize);
    let ratio = if root_size > 0 {
        size as f64 / root_size as f64 * 100.0
    } else {
        0.0
    };

    println!(
        "{}{}{:<40} {:>10} {:>5.1}% {}",
        indent,
        if is_dir { "▼ " } else { "  " },
        truncate(name, 40),
        format_size(size),
        ratio,
        make_bar(ratio / 100.0, 10)
    );
}

/// Create a simple ASCII bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{kept}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "éé…");
    }

    #[test]
    fn test_make_bar() {
        assert_eq!(make_bar(0.5, 4), "[██░░]");
        assert_eq!(make_bar(0.0, 2), "[░░]");
    }

    #[test]
    fn test_build_config_from_args() {
        let cli = Cli::parse_from(["dirstream", "--no-hidden", "-i", "*.log", "-w", "3"]);
        let config = build_config(&cli.scan).unwrap();
        assert!(!config.include_hidden);
        assert_eq!(config.ignore_patterns, vec!["*.log".to_string()]);
        assert_eq!(config.effective_workers(), 3);
    }
}
