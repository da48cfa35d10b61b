use crate::domain::DocumentTransferService;
use crate::queue::create_notification_processor;
use docpipe_domain::{DeliveryQueue, ObjectStore};
use docpipe_queue::{ConsumerConfig, QueueConsumer};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct IngestionWorkerConfig {
    pub destination_container: String,
    pub batch_size: usize,
    pub max_batching_window: Duration,
    pub report_item_failures: bool,
}

/// Assembles the file-ingestion pipeline consumer: object-created
/// notifications pulled in batches and run through the document transfer
/// service.
pub struct IngestionWorker {
    consumer: QueueConsumer,
}

impl IngestionWorker {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn DeliveryQueue>,
        config: IngestionWorkerConfig,
    ) -> Self {
        info!(
            destination_container = %config.destination_container,
            batch_size = config.batch_size,
            "Initializing ingestion worker"
        );

        let service = Arc::new(DocumentTransferService::new(
            store,
            config.destination_container,
        ));
        let processor = create_notification_processor(service);
        let consumer = QueueConsumer::new(
            queue,
            ConsumerConfig {
                batch_size: config.batch_size,
                max_batching_window: config.max_batching_window,
                report_item_failures: config.report_item_failures,
            },
            processor,
        );

        Self { consumer }
    }

    pub fn into_runner_processes(
        self,
    ) -> Vec<
        Box<
            dyn FnOnce(
                    CancellationToken,
                )
                    -> Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>
                + Send,
        >,
    > {
        vec![Box::new({
            let consumer = self.consumer;
            move |ctx| Box::pin(async move { consumer.run(ctx).await })
        })]
    }
}
