//! Example: Processing a batch of raw samples from a JSON file
//!
//! Reads a JSON array of raw samples (flat objects with an `eventType`
//! discriminator, as emitted by the monitoring agents), runs one pipeline
//! cycle and prints the resulting entities and relationships as JSON.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=queuescope_engine=debug cargo run --example process_batch -- samples.json [config.toml]
//! ```

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use queuescope_engine::{ExtensionPoint, HookOptions, Pipeline, PipelineConfig, PipelineData};
use queuescope_types::RawSample;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("Usage: cargo run --example process_batch -- <samples.json> [config.toml]");
        eprintln!();
        eprintln!("The file should contain a JSON array of samples, e.g.:");
        eprintln!(r#"  [{{"eventType": "KafkaBrokerSample", "clusterName": "prod", "broker.id": 1}}]"#);
        std::process::exit(1);
    };
    let config_path = env::args().nth(2);

    let config = PipelineConfig::load(config_path.as_deref().map(Path::new))?;
    let raw = fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
    let samples: Vec<RawSample> =
        serde_json::from_str(&raw).with_context(|| format!("{path} is not a JSON array of samples"))?;

    let pipeline = Pipeline::new(config);

    // Report every sample the transformers reject
    pipeline.hooks().register(
        ExtensionPoint::TransformationError,
        |data: PipelineData, _ctx| async move {
            if let PipelineData::Failure(notice) = data {
                eprintln!("skipped sample {:?}: {}", notice.index, notice.message);
            }
            Ok(None)
        },
        HookOptions::default().name("report-rejects"),
    )?;

    let output = pipeline.run_cycle(samples).await?;

    eprintln!(
        "{} samples -> {} entities, {} relationships",
        output.report.samples_received, output.report.entities_created, output.report.relationships_created
    );
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
