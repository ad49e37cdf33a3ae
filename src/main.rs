use anyhow::{Context, Result};
use bencher::Benchmark;
use bencher::cli::{CliArgs, CliConfig, report};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let cli = CliConfig::from_args(args).context("invalid benchmark configuration")?;

    let result = Benchmark::new(cli.benchmark)
        .run()
        .await
        .context("benchmark aborted")?;

    let output = report::render(&result, cli.output_format).context("failed to render report")?;
    println!("{output}");

    Ok(())
}
