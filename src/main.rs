#[macro_use]
extern crate log;

use anyhow::{bail, Result};
use clap::Parser;
use seqfan::parallel::IngressPool;
use seqfan::{ConvertConfig, Converter};

mod cli;

use cli::{Cli, OutputPattern};

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .format_target(false)
        .init();

    let outputs = cli.outputs as usize;
    let pattern_str = cli.output_pattern();
    let pattern = OutputPattern::parse(&pattern_str)?;
    if outputs > 1 && !pattern.has_placeholder() {
        bail!("Output pattern {pattern_str:?} needs a %d placeholder to split into {outputs} files");
    }

    let workers = IngressPool::worker_count(cli.threads, cli.inputs.len());
    info!("Using {workers} CPUs for splitting");
    info!(
        "Splitting {} inputs into {} outputs.",
        cli.inputs.len(),
        outputs
    );
    info!("Output file pattern is: '{pattern_str}'");

    let config = ConvertConfig {
        threads: cli.threads,
        progress: !cli.quiet,
        ..Default::default()
    };
    let summary = Converter::new(&cli.inputs, outputs, |i| pattern.render(i))
        .with_config(config)
        .run()?;

    debug!(
        "{} records read by {} workers from {} files",
        summary.total_read(),
        summary.workers,
        summary.files
    );
    for (path, written) in summary.outputs.iter().zip(&summary.records_written) {
        debug!("{}: {written} records", path.display());
    }
    Ok(())
}
