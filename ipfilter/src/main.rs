use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use ipfilter::{Firewall, RuleSet, DEFAULT_CAPACITY, INPUT_STREAM, OUTPUT_STREAM};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[clap(version, about = "Filters length-prefixed IPv4 packets between two streams")]
struct Opt {
    /// Rule configuration file.
    config: PathBuf,
    /// Stream packets are read from.
    #[clap(short, long, default_value = INPUT_STREAM)]
    input: PathBuf,
    /// Stream allowed packets are written to.
    #[clap(short, long, default_value = OUTPUT_STREAM)]
    output: PathBuf,
    /// Largest record accepted, longer ones are skipped.
    #[clap(short, long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,
    /// Log every packet as JSON on the `packet_log` target.
    #[clap(long)]
    log_packets: bool,
}

fn main() -> ExitCode {
    let opt = Opt::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(opt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(opt: Opt) -> anyhow::Result<()> {
    let rules = RuleSet::load(&opt.config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let result = runtime.block_on(serve(opt, rules));
    // A stream open or read still parked on a FIFO must not hold up exit.
    runtime.shutdown_background();
    result
}

async fn serve(opt: Opt, rules: RuleSet) -> anyhow::Result<()> {
    let firewall = Firewall::new(rules)
        .with_capacity(opt.capacity)
        .with_packet_log(opt.log_packets);
    let dispatcher = firewall.spawn_on_paths(&opt.input, &opt.output);
    let stats = firewall
        .controller(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .run(dispatcher)
        .await?;
    tracing::info!(
        received = stats.received,
        forwarded = stats.forwarded,
        dropped = stats.dropped,
        rejected = stats.rejected,
        "exiting"
    );
    Ok(())
}
