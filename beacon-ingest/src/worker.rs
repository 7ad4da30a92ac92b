//! Batching loop that runs on the forwarder's runtime thread.

use std::sync::Arc;
use std::time::Duration;

use futures_channel::oneshot;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{select, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{IntervalStream, ReceiverStream};
use url::Url;

use crate::client::{HttpError, IngestClient};

/// A delivery that got a response but not a usable acknowledgement.
#[derive(Error, Debug)]
enum DeliveryError {
    #[error("request failed: {0}")]
    Http(HttpError),
    #[error("unreadable acknowledgement: {0}")]
    Ack(#[from] serde_json::Error),
    #[error("acknowledgement carries no byte count: {0}")]
    MissingAck(String),
}

/// One request/response cycle: POST the batch, then require a JSON reply
/// whose `bytes` field confirms how much the endpoint accepted.
async fn deliver(
    client: Arc<dyn IngestClient>,
    endpoint: Url,
    access_key: String,
    body: String,
) -> Result<u64, DeliveryError> {
    let reply = client
        .send(&endpoint, &access_key, body)
        .await
        .map_err(DeliveryError::Http)?;
    let ack: serde_json::Value = serde_json::from_str(&reply)?;
    match ack.get("bytes").and_then(serde_json::Value::as_u64) {
        Some(bytes) => Ok(bytes),
        None => Err(DeliveryError::MissingAck(reply)),
    }
}

pub(crate) struct ForwarderWorker {
    endpoint: Url,
    access_key: String,
    client: Arc<dyn IngestClient>,
    flush_interval: Duration,
    buffer: Vec<String>,
    export_tasks: FuturesUnordered<BoxFuture<'static, ()>>,
}

impl ForwarderWorker {
    pub(crate) fn new(
        endpoint: Url,
        access_key: String,
        client: Arc<dyn IngestClient>,
        flush_interval: Duration,
    ) -> Self {
        ForwarderWorker {
            endpoint,
            access_key,
            client,
            flush_interval,
            buffer: Vec::new(),
            export_tasks: FuturesUnordered::new(),
        }
    }

    /// Move the buffered lines into a detached delivery task.
    ///
    /// Deliveries run concurrently with intake; a batch that fails is
    /// logged and dropped rather than retried.
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let body = self.buffer.split_off(0).join("\n");
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let access_key = self.access_key.clone();
        self.export_tasks.push(Box::pin(async move {
            match deliver(client, endpoint, access_key, body).await {
                Ok(bytes) => {
                    tracing::debug!(name: "BatchForwarder.Delivered", target: env!("CARGO_PKG_NAME"), bytes);
                }
                Err(error) => {
                    tracing::warn!(
                        name: "BatchForwarder.DeliveryFailed",
                        target: env!("CARGO_PKG_NAME"),
                        error = %error,
                        "batch dropped"
                    );
                }
            }
        }));
    }

    pub(crate) async fn run(mut self, intake: mpsc::Receiver<String>, drained: oneshot::Sender<()>) {
        let mut messages = ReceiverStream::new(intake).fuse();
        // An interval yields immediately; skip that first tick so flushes
        // follow the configured cadence.
        let mut ticker = IntervalStream::new(tokio::time::interval(self.flush_interval))
            .skip(1)
            .fuse();

        loop {
            select! {
                _ = self.export_tasks.next() => {
                    // An in-flight delivery finished.
                }
                line = messages.next() => match line {
                    Some(line) => self.buffer.push(line),
                    None => break,
                },
                _ = ticker.next() => self.flush(),
            }
        }

        // Intake closed: ship the residue and wait out every in-flight
        // delivery before acknowledging the drain.
        self.flush();
        while self.export_tasks.next().await.is_some() {}
        let _ = drained.send(());
    }
}
