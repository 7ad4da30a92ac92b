//! Remote delivery for [`beacon`] event streams.
//!
//! [`BatchForwarder`] is a [`beacon::export::Exporter`] that hands each
//! encoded record to a dedicated forwarder thread, where records are
//! buffered and shipped to an HTTP ingestion endpoint as newline-separated
//! batches. A slow or unreachable endpoint never stalls the logger worker
//! for longer than it takes to enqueue a line.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use beacon::{Logger, Record};
//! use beacon_ingest::BatchForwarder;
//!
//! # fn main() -> Result<(), beacon_ingest::Error> {
//! let forwarder = BatchForwarder::builder("https://ingest.example.com/1/http/input", "access-key")
//!     .with_param("sourcetype", "json_auto_timestamp")
//!     .with_flush_interval(Duration::from_secs(2))
//!     .build()?;
//!
//! let logger = Logger::new("api");
//! logger.export(forwarder);
//! logger.info("service.start", Record::new());
//! logger.close();
//! # Ok(())
//! # }
//! ```
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(test, deny(warnings))]

mod client;
mod worker;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use beacon::export::Exporter;
use beacon::{ExportError, ExportResult, Record};
use futures_channel::oneshot;
use futures_util::future::{self, BoxFuture};
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

pub use crate::client::{HttpError, IngestClient};
use crate::worker::ForwarderWorker;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_QUEUE_SIZE: usize = 256;

/// Errors surfaced while constructing a [`BatchForwarder`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The endpoint string did not parse as a URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// The forwarder thread or its runtime could not be started.
    #[error("failed to start the forwarder: {0}")]
    Runtime(#[from] std::io::Error),

    /// No HTTP client is available.
    #[error(
        "no HTTP client configured; enable the `reqwest-client` feature or pass one to `with_client`"
    )]
    NoClient,
}

/// Ships encoded records to a remote ingestion endpoint in batches.
///
/// Registered with a logger through [`Logger::export`]. Each record becomes
/// one JSON line; lines accumulate on the forwarder thread and go out
/// together when the flush interval elapses or the forwarder shuts down.
/// Failed deliveries are logged and dropped, never retried.
///
/// [`Logger::export`]: beacon::Logger::export
#[derive(Debug)]
pub struct BatchForwarder {
    sender: Option<mpsc::Sender<String>>,
    drained: Option<oneshot::Receiver<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BatchForwarder {
    /// Start configuring a forwarder for `endpoint`, authenticated with
    /// `access_key`.
    pub fn builder(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
    ) -> BatchForwarderBuilder {
        BatchForwarderBuilder {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            params: Vec::new(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            queue_size: DEFAULT_QUEUE_SIZE,
            client: None,
        }
    }
}

impl Exporter for BatchForwarder {
    fn send(&mut self, record: &Record) -> BoxFuture<'static, ExportResult> {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(error) => return Box::pin(future::ready(Err(ExportError::Serialize(error)))),
        };
        let sender = match self.sender.clone() {
            Some(sender) => sender,
            None => return Box::pin(future::ready(Err(ExportError::AlreadyShutdown))),
        };
        Box::pin(async move {
            sender
                .send(line)
                .await
                .map_err(|_| ExportError::AlreadyShutdown)
        })
    }

    fn shutdown(&mut self) {
        // Closing the intake is the drain signal; wait until the worker has
        // delivered what it holds, then reap the thread.
        drop(self.sender.take());
        if let Some(drained) = self.drained.take() {
            let _ = futures_executor::block_on(drained);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Configures and starts a [`BatchForwarder`].
#[derive(Debug)]
pub struct BatchForwarderBuilder {
    endpoint: String,
    access_key: String,
    params: Vec<(String, String)>,
    flush_interval: Duration,
    queue_size: usize,
    client: Option<Arc<dyn IngestClient>>,
}

impl BatchForwarderBuilder {
    /// Append a query parameter to the endpoint, such as the project id or
    /// source type the ingestion service expects.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// How long the worker buffers between deliveries. Defaults to two
    /// seconds; a zero interval is raised to one millisecond.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Capacity of the channel between exporter and worker. Defaults
    /// to 256.
    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size.max(1);
        self
    }

    /// Ship batches with `client` instead of the built-in one.
    pub fn with_client(mut self, client: impl IngestClient + 'static) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    /// Parse the endpoint, start the worker thread, and hand back the
    /// running forwarder.
    pub fn build(self) -> Result<BatchForwarder, Error> {
        let mut endpoint = Url::parse(&self.endpoint)?;
        if !self.params.is_empty() {
            endpoint.query_pairs_mut().extend_pairs(&self.params);
        }
        let client = match self.client {
            Some(client) => client,
            None => default_client()?,
        };

        let (sender, receiver) = mpsc::channel(self.queue_size);
        let (drained_sender, drained_receiver) = oneshot::channel();
        let worker = ForwarderWorker::new(endpoint, self.access_key, client, self.flush_interval);

        // Built here so a failure surfaces from build(); the spawned thread
        // only drives it.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let handle = thread::Builder::new()
            .name("beacon-ingest-forwarder".to_string())
            .spawn(move || runtime.block_on(worker.run(receiver, drained_sender)))?;

        Ok(BatchForwarder {
            sender: Some(sender),
            drained: Some(drained_receiver),
            handle: Some(handle),
        })
    }
}

#[cfg(feature = "reqwest-client")]
fn default_client() -> Result<Arc<dyn IngestClient>, Error> {
    Ok(Arc::new(reqwest::Client::new()))
}

#[cfg(not(feature = "reqwest-client"))]
fn default_client() -> Result<Arc<dyn IngestClient>, Error> {
    Err(Error::NoClient)
}
