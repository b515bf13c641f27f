use anyhow::Result;
use clap::Parser;
use gcclite::cmd::pipeline::Args;
use gcclite::cmd::PipelineConfig;
use gcclite::standalone;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PipelineConfig::from(Args::parse());
    let report = standalone::run(config).await?;
    println!("{report}");
    Ok(())
}
