use anyhow::{bail, Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tape_merge::codec::open_capture;
use tape_merge::export::{export_file, ExportStats};
use tape_merge::merge::Multiplexer;
use tape_merge::roll::{RollSelector, RollWindow, SymbolCache};
use tape_merge::source::{check_session_bounds, EventSource};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Merge per-feed session captures into time-ordered CSV exports")]
struct Args {
    /// Source folder, one per feed/subscription; repeat for each feed
    #[arg(long = "source", short = 's', required = true)]
    sources: Vec<PathBuf>,

    /// Output directory for per-session CSV files
    #[arg(long, env = "OUT_DIR", default_value = "output")]
    out_dir: PathBuf,

    /// Capture file extension matched across source folders
    #[arg(long, default_value = "bin")]
    ext: String,

    /// Export trade events only
    #[arg(long, default_value_t = false)]
    trades_only: bool,

    /// Contract-roll cutoff, UNIX epoch seconds; requires --pre and --post
    #[arg(long, env = "ROLL_CUTOFF")]
    cutoff: Option<i64>,

    /// Contracts active before the cutoff (comma separated, e.g. MESU4,ESU4)
    #[arg(long, value_delimiter = ',')]
    pre: Vec<String>,

    /// Contracts active from the cutoff on (comma separated, e.g. MESZ4,ESZ4)
    #[arg(long, value_delimiter = ',')]
    post: Vec<String>,
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

/// Union of capture filenames across all source folders, sorted for a
/// deterministic batch order.
fn discover(folders: &[PathBuf], ext: &str) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for folder in folders {
        let entries = fs::read_dir(folder)
            .with_context(|| format!("read source folder {}", folder.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.insert(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Merge and export one nominal session file across every folder that has it.
///
/// Errors here are fatal for this file only; the batch moves on.
fn process_file(args: &Args, name: &str, window: Option<&RollWindow>) -> Result<ExportStats> {
    let mut sources = Vec::new();
    for folder in &args.sources {
        let path = folder.join(name);
        if !path.exists() {
            continue;
        }
        let (header, reader) = open_capture(&path)?;
        let selector = RollSelector::new(SymbolCache::from_header(&header), window.cloned());
        sources.push(EventSource::new(
            path,
            header,
            reader,
            selector,
            args.trades_only,
        ));
    }

    let (start_ts, end_ts) = check_session_bounds(&sources)?;

    let stem = name.split('.').next().unwrap_or(name);
    let out_path = args.out_dir.join(format!("{stem}.csv"));
    let out = BufWriter::new(
        File::create(&out_path).with_context(|| format!("create {}", out_path.display()))?,
    );

    let mut mux = Multiplexer::new(sources);
    export_file(&mut mux, out, start_ts, end_ts)
}

fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing("info");
    let args = Args::parse();

    let window = match args.cutoff {
        Some(cutoff_secs) => {
            if args.pre.is_empty() || args.post.is_empty() {
                bail!("--cutoff requires --pre and --post contract lists");
            }
            Some(RollWindow {
                cutoff_secs,
                pre: args.pre.clone(),
                post: args.post.clone(),
            })
        }
        None => None,
    };

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir {}", args.out_dir.display()))?;

    let names = discover(&args.sources, &args.ext)?;
    if names.is_empty() {
        info!("no capture files found");
        return Ok(());
    }
    info!(files = names.len(), sources = args.sources.len(), "starting batch");

    let mut done = 0usize;
    for name in &names {
        match process_file(&args, name, window.as_ref()) {
            Ok(stats) => {
                done += 1;
                info!(file = %name, rows = stats.rows, skipped = stats.skipped, "exported");
            }
            Err(e) => error!(file = %name, error = %format!("{e:#}"), "file skipped"),
        }
    }
    info!(done, total = names.len(), "batch complete");
    Ok(())
}
