#![cfg(feature = "integration-tests")]

use anyhow::Result;
use bytes::Bytes;
use docpipe_domain::DeliveryQueue;
use docpipe_queue::{connect_jetstream, JetStreamDeliveryQueue, JetStreamQueueConfig};
use std::time::Duration;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, Image};
use tokio::time::sleep;

/// NATS image with JetStream enabled.
#[derive(Debug, Clone)]
struct NatsWithJetStream {
    ports: Vec<ContainerPort>,
}

impl Default for NatsWithJetStream {
    fn default() -> Self {
        Self {
            ports: vec![ContainerPort::Tcp(4222)],
        }
    }
}

impl Image for NatsWithJetStream {
    fn name(&self) -> &str {
        "nats"
    }

    fn tag(&self) -> &str {
        "latest"
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        vec![WaitFor::seconds(3)]
    }

    fn cmd(&self) -> impl IntoIterator<Item = impl Into<std::borrow::Cow<'_, str>>> {
        vec!["--js"]
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &self.ports
    }
}

async fn start_queue(
    visibility_timeout: Duration,
) -> Result<(ContainerAsync<NatsWithJetStream>, JetStreamDeliveryQueue)> {
    let nats = NatsWithJetStream::default().start().await?;
    let host = nats.get_host().await?;
    let port = nats.get_host_port_ipv4(4222).await?;
    let url = format!("nats://{}:{}", host, port);

    let jetstream = connect_jetstream(&url, Duration::from_secs(10)).await?;
    let queue = JetStreamDeliveryQueue::connect(
        jetstream,
        JetStreamQueueConfig {
            stream: "file_transfer".to_string(),
            subject: "file_transfer.events".to_string(),
            consumer_name: "docpipe-test".to_string(),
            visibility_timeout,
            retention_period: Duration::from_secs(3600),
        },
    )
    .await?;

    Ok((nats, queue))
}

#[tokio::test]
async fn send_receive_delete_roundtrip() -> Result<()> {
    let (_nats, queue) = start_queue(Duration::from_secs(30)).await?;

    queue.send_message(Bytes::from_static(b"doc-1")).await?;

    let records = queue.receive(10, Duration::from_secs(5)).await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].body, Bytes::from_static(b"doc-1"));
    assert_eq!(records[0].receive_count, 1);

    queue.delete_message(&records[0].receipt_handle).await?;

    let after = queue.receive(10, Duration::from_secs(2)).await?;
    assert!(after.is_empty());
    Ok(())
}

#[tokio::test]
async fn unacknowledged_message_is_redelivered_with_higher_count() -> Result<()> {
    let (_nats, queue) = start_queue(Duration::from_secs(2)).await?;

    queue.send_message(Bytes::from_static(b"doc-2")).await?;

    let first = queue.receive(10, Duration::from_secs(5)).await?;
    assert_eq!(first.len(), 1);

    // Let the server lease lapse without acknowledging.
    sleep(Duration::from_secs(3)).await;

    let second = queue.receive(10, Duration::from_secs(5)).await?;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].message_id, first[0].message_id);
    assert!(second[0].receive_count > first[0].receive_count);

    // The old handle was pruned when its lease lapsed.
    assert!(queue.delete_message(&first[0].receipt_handle).await.is_err());
    Ok(())
}

#[tokio::test]
async fn visibility_zero_requests_prompt_redelivery() -> Result<()> {
    let (_nats, queue) = start_queue(Duration::from_secs(30)).await?;

    queue.send_message(Bytes::from_static(b"doc-3")).await?;

    let first = queue.receive(10, Duration::from_secs(5)).await?;
    assert_eq!(first.len(), 1);

    queue
        .change_visibility(&first[0].receipt_handle, Duration::ZERO)
        .await?;

    let second = queue.receive(10, Duration::from_secs(5)).await?;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].message_id, first[0].message_id);
    Ok(())
}
