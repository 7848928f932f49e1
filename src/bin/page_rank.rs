use anyhow::Result;
use clap::Parser;
use irondia::page_rank::page_rank;
use irondia::{Context, ContextConfig, read_lines};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Compute PageRank over a tab-separated link list.
#[derive(Parser, Debug)]
#[command(name = "page_rank", version, about)]
struct Cli {
    /// Input file with one "<src>\t<tgt>" link per line
    input: PathBuf,

    /// Number of iterations
    #[arg(short, long, default_value_t = 10)]
    iterations: usize,

    /// Logical workers (overrides IRONDIA_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Compute threads (overrides IRONDIA_THREADS)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Write ranks to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 2)
        .init();
    debug!("page_rank started with verbosity level: {}", cli.verbose);

    let mut config = ContextConfig::from_env()?;
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }
    let ctx = Context::new(config)?;

    let links = read_lines(&ctx, &cli.input)?;
    let ranks = page_rank(&links, cli.iterations)?;
    match &cli.output {
        Some(path) => ranks.write_lines(path)?,
        None => ranks.print_lines()?,
    }

    info!(
        memory = ctx.memory().total(),
        peak = ctx.memory().peak(),
        allocations = ctx.memory().alloc_count(),
        "done"
    );
    debug!("{}", ctx.metrics().to_json());
    Ok(())
}
