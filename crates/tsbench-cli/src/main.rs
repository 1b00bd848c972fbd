//! tsbench binary.

mod config;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tsbench_core::ChunkReader;

use crate::config::{Args, BenchConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("tsbench=info,tsbench_core=info,tsbench_adapters=info"))?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();
    let config = BenchConfig::from(&args);
    let output = config.output_path();

    info!(
        backend = %config.adapter.kind,
        data_dir = %config.dataset.dir.display(),
        output = %output.display(),
        "Starting benchmark"
    );

    let mut adapter = tsbench_adapters::connect(&config.adapter).await?;
    let reader = ChunkReader::new(config.dataset.clone());
    let result = tsbench_core::execute(reader, adapter.as_mut(), &output).await?;

    info!(
        backend = %result.db_type(),
        chunks = result.ingestion().len(),
        records = result.total_records(),
        output = %output.display(),
        "Benchmark complete"
    );

    Ok(())
}
