mod config;
mod uploader;

use config::ServiceConfig;
use docpipe_runner::Runner;
use docpipe_topology::{apply, EventSourceMappingSpec, QueueSpec, Topology, TopologyBuilder};
use ingestion_worker::{IngestionWorker, IngestionWorkerConfig};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uploader::{run_demo_uploader, DemoUploaderConfig};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting docpipe all-in-one service");
    info!("Configuration: {:?}", config);

    let topology = match build_topology(&config) {
        Ok(topology) => topology,
        Err(e) => {
            error!("Invalid topology: {}", e);
            std::process::exit(1);
        }
    };

    let deployment = match apply(&topology).await {
        Ok(deployment) => deployment,
        Err(e) => {
            error!("Failed to apply topology: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match deployment.queue(&config.transfer_queue) {
        Ok(queue) => queue,
        Err(e) => {
            error!("Failed to look up transfer queue: {}", e);
            std::process::exit(1);
        }
    };

    let worker = IngestionWorker::new(
        deployment.store(),
        queue,
        IngestionWorkerConfig {
            destination_container: config.cached_container.clone(),
            batch_size: config.max_batch_size,
            max_batching_window: Duration::from_secs(config.max_batching_window_secs),
            report_item_failures: config.report_item_failures,
        },
    );

    let mut runner = Runner::new().with_closer(|| async move {
        info!("Running cleanup tasks...");
        Ok(())
    });

    for process in worker.into_runner_processes() {
        runner = runner.with_boxed_process(process);
    }

    if config.demo_uploader_enabled {
        let store = deployment.store();
        let uploader_config = DemoUploaderConfig {
            interval: Duration::from_secs(config.demo_upload_interval_secs),
            container: config.master_container.clone(),
        };
        runner = runner
            .with_process(move |ctx| run_demo_uploader(ctx, uploader_config, store));
    }

    let outcome = runner.run().await;
    std::process::exit(outcome.exit_code());
}

fn build_topology(config: &ServiceConfig) -> docpipe_domain::DomainResult<Topology> {
    TopologyBuilder::new()
        .container(&config.master_container, true)
        .container(&config.cached_container, true)
        .queue(
            QueueSpec::new(&config.transfer_queue)
                .visibility_timeout(Duration::from_secs(config.visibility_timeout_secs))
                .retention_period(Duration::from_secs(config.retention_days * 24 * 60 * 60)),
        )
        .notification(&config.master_container, &config.transfer_queue)
        .event_source_mapping(
            EventSourceMappingSpec::new(&config.transfer_queue, "document-transfer")
                .batch_size(config.max_batch_size)
                .max_batching_window(Duration::from_secs(config.max_batching_window_secs))
                .report_item_failures(config.report_item_failures),
        )
        .build()
}
