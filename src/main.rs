use std::{
    io::{self, Write},
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use anyhow::Context;
use cache_warmer::{
    fetcher::HttpFetcher,
    reporter::{ProgressReporter, StdoutReporter},
    runner::FailurePolicy,
    types::Direction,
    utils::DEFAULT_TIMEOUT_SECS,
    warmer::{WarmSession, WarmerOptions},
};
use clap::Parser;
use log::debug;
use signal_hook::consts::{SIGINT, SIGTERM};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Sitemap driven full page cache warmer", long_about = None)]
struct Args {
    /// URL of the sitemap listing the pages to warm
    sitemap_url: String,
    /// Seconds to wait after each request
    #[arg(short = 'd', long, default_value_t = 0)]
    delay: u64,
    /// Skip TLS certificate and hostname verification
    #[arg(short = 'k', long)]
    insecure: bool,
    /// Only measure the average page time, without warming the cache
    #[arg(short = 't', long)]
    test_only: bool,
    /// Timeout of a single request in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
    /// Leave pages that fail to download out of the timings instead of stopping
    #[arg(long)]
    skip_failed: bool,
    /// Print the final summary as JSON, progress goes to stderr
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    debug!("Starting cache warmer with {:#?}", args);

    let should_terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))?;
    signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))?;

    let failure_policy = if args.skip_failed {
        FailurePolicy::Skip
    } else {
        FailurePolicy::Abort
    };
    let options = WarmerOptions::default_builder()
        .sitemap_url(args.sitemap_url.clone())
        .delay_secs(args.delay)
        .insecure(args.insecure)
        .failure_policy(failure_policy)
        .build()?;

    let fetcher = HttpFetcher::new(options.insecure(), Duration::from_secs(args.timeout))
        .context("could not build the http client")?;
    let reporter: Box<dyn ProgressReporter> = if args.json {
        Box::new(|m: &str| -> io::Result<()> { writeln!(io::stderr(), "{}", m) })
    } else {
        Box::new(StdoutReporter)
    };

    let mut session = WarmSession::new(
        options,
        Box::new(fetcher),
        reporter,
        Box::new(rand::thread_rng()),
        should_terminate,
    );
    session
        .load()
        .context(format!("could not load sitemap {}", args.sitemap_url))?;

    if args.test_only {
        let stats = session.test().context("test pass failed")?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        return Ok(());
    }

    let report = session.warm_report().context("warming failed")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Average page time went from {:.2}ms to {:.2}ms",
        report.before.average_duration_millis, report.after.average_duration_millis
    );
    match report.direction {
        Direction::Faster => println!("Pages are {}% faster", report.percent_change),
        Direction::Slower => println!("Pages are {}% slower", report.percent_change),
        Direction::Unchanged => println!("No measurable change in page time"),
    }

    Ok(())
}
