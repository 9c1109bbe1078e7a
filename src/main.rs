use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use company_research::app::launch;
use company_research::cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    // RUST_LOG 优先，其次是 --verbose
    let default_level = if args.verbose {
        "company_research=debug"
    } else {
        "company_research=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    launch(args).await
}
