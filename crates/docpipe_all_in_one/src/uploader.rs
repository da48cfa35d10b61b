use anyhow::Result;
use bytes::Bytes;
use docpipe_domain::{ObjectStore, PutObjectInput};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Configuration for the demo uploader service
pub struct DemoUploaderConfig {
    /// Interval between uploads
    pub interval: Duration,
    /// Container to upload into
    pub container: String,
}

impl Default for DemoUploaderConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            container: "master-documents".to_string(),
        }
    }
}

/// Run a demo uploader that periodically writes a sample document.
///
/// Each write re-uses the same key, so the pipeline can be watched handling
/// fresh versions of one document end to end. Runs until cancelled.
pub async fn run_demo_uploader(
    ctx: CancellationToken,
    config: DemoUploaderConfig,
    store: Arc<dyn ObjectStore>,
) -> Result<()> {
    info!(
        container = %config.container,
        interval_secs = config.interval.as_secs(),
        "Starting demo uploader"
    );

    let mut counter = 0u64;
    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                info!("Received shutdown signal, stopping demo uploader");
                break;
            }
            _ = tokio::time::sleep(config.interval) => {
                counter += 1;
                let body = format!("sample document, upload #{counter}\n");
                match store
                    .put_object(PutObjectInput {
                        container: config.container.clone(),
                        key: "demo/sample-document.txt".to_string(),
                        body: Bytes::from(body),
                    })
                    .await
                {
                    Ok(stored) => {
                        info!(
                            key = %stored.key,
                            version_id = %stored.version_id,
                            upload = counter,
                            "Uploaded demo document"
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to upload demo document");
                    }
                }
            }
        }
    }

    Ok(())
}
