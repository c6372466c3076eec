use anyhow::Context;
use eqforge::config::ConfigManager;
use eqforge::engines::evaluation::{Problem, SampledProblem};
use eqforge::engines::generation::GenomeFactory;
use eqforge::engines::pipeline::{spawn_observer, LogObserver, PipelineNetwork};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let manager = ConfigManager::new();
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("--manifest") => {
            let manifests = manager.get().manifests();
            println!("{}", serde_json::to_string_pretty(&manifests)?);
            return Ok(());
        }
        Some(path) => manager
            .load_from_file(path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => log::info!("No configuration file given, using defaults"),
    }
    let config = manager.get();

    let factory = Arc::new(GenomeFactory::from_config(config.factory.clone())?);
    let problem = SampledProblem::from_config(
        config.sampling.target.clone(),
        config.factory.parameter_count,
        config.sampling.clone(),
    )?;
    let problems: Vec<Arc<dyn Problem>> = vec![Arc::new(problem)];

    let network = PipelineNetwork::new(factory, problems, config.pipeline.clone())?;
    let observer = spawn_observer(network.subscribe(), LogObserver);

    let report = network.run().await.context("pipeline run failed")?;
    drop(network);
    let _ = tokio::time::timeout(Duration::from_secs(1), observer).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
