//! core-ci - build the native core in a container and run its unit tests

use anyhow::Context;
use clap::Parser;
use core_ci::cli::Args;
use core_ci::errors::RunError;
use core_ci::observability::init_logging;
use core_ci::runner::{report, Runner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format());

    let result = run(&args).await;

    let code = report(&result, &mut std::io::stdout()).context("failed to write the run report")?;
    std::process::exit(code);
}

async fn run(args: &Args) -> Result<(), RunError> {
    let runner = Runner::new(args.runner_config()?)?;
    let base_dir = std::env::current_dir()?;
    runner.connect_and_run(&base_dir, &mut std::io::stdout()).await
}
