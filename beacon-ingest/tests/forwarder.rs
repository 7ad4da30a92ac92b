//! End-to-end tests driving a [`BatchForwarder`] through a real logger,
//! with a recording client standing in for the network.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use beacon::export::Exporter;
use beacon::{ExportError, Logger, Record};
use beacon_ingest::{BatchForwarder, Error, HttpError, IngestClient};
use url::Url;

#[derive(Debug, Clone)]
struct Request {
    url: String,
    access_key: String,
    body: String,
}

#[derive(Debug, Clone, Default)]
struct RecordingClient {
    requests: Arc<Mutex<Vec<Request>>>,
    reply_without_bytes: bool,
}

#[async_trait]
impl IngestClient for RecordingClient {
    async fn send(
        &self,
        endpoint: &Url,
        access_key: &str,
        body: String,
    ) -> Result<String, HttpError> {
        let bytes = body.len();
        self.requests.lock().unwrap().push(Request {
            url: endpoint.to_string(),
            access_key: access_key.to_string(),
            body,
        });
        if self.reply_without_bytes {
            Ok(r#"{"ok":true}"#.to_string())
        } else {
            Ok(format!(r#"{{"bytes":{bytes}}}"#))
        }
    }
}

impl RecordingClient {
    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

fn forwarder(client: &RecordingClient, flush_interval: Duration) -> BatchForwarder {
    BatchForwarder::builder("http://localhost:8088/1/http/input", "test-key")
        .with_flush_interval(flush_interval)
        .with_client(client.clone())
        .build()
        .unwrap()
}

#[test]
fn close_ships_buffered_records_in_one_batch() {
    let client = RecordingClient::default();
    // An interval this long never fires; only the shutdown drain flushes.
    let logger = Logger::new("ingest-test");
    logger.export(forwarder(&client, Duration::from_secs(3600)));

    logger.info("job.start", Record::new().with("attempt", 1i64));
    logger.info("job.done", Record::new());
    logger.close();

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    let lines: Vec<&str> = requests[0].body.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["name"], "job.start");
    assert_eq!(first["type"], "info");
    assert_eq!(first["service"], "ingest-test");
    assert_eq!(first["attempt"], 1);
    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["name"], "job.done");
}

#[test]
fn the_timer_ships_batches_while_the_logger_stays_open() {
    let client = RecordingClient::default();
    let logger = Logger::new("ingest-test");
    logger.export(forwarder(&client, Duration::from_millis(50)));

    logger.info("tick", Record::new()).wait();

    let deadline = Instant::now() + Duration::from_secs(5);
    while client.requests().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }

    assert_eq!(client.requests().len(), 1);
    logger.close();
}

#[test]
fn params_and_key_reach_the_endpoint() {
    let client = RecordingClient::default();
    let forwarder = BatchForwarder::builder("http://localhost:8088/1/http/input", "test-key")
        .with_param("project", "P-123")
        .with_param("sourcetype", "json_auto_timestamp")
        .with_flush_interval(Duration::from_secs(3600))
        .with_client(client.clone())
        .build()
        .unwrap();
    let logger = Logger::new("ingest-test");
    logger.export(forwarder);

    logger.info("auth.check", Record::new());
    logger.close();

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .url
        .ends_with("/1/http/input?project=P-123&sourcetype=json_auto_timestamp"));
    assert_eq!(requests[0].access_key, "test-key");
}

#[test]
fn a_bad_acknowledgement_drops_the_batch_without_retry() {
    let client = RecordingClient {
        reply_without_bytes: true,
        ..RecordingClient::default()
    };
    let logger = Logger::new("ingest-test");
    logger.export(forwarder(&client, Duration::from_secs(3600)));

    logger.info("job.start", Record::new());
    logger.close();

    // Attempted exactly once; the worker drops the batch instead of
    // resubmitting it.
    assert_eq!(client.requests().len(), 1);
}

#[test]
fn a_shut_down_forwarder_refuses_records() {
    let client = RecordingClient::default();
    let mut forwarder = forwarder(&client, Duration::from_secs(3600));
    forwarder.shutdown();

    let result = futures_executor::block_on(forwarder.send(&Record::new().with("late", true)));

    assert!(matches!(result, Err(ExportError::AlreadyShutdown)));
    assert!(client.requests().is_empty());
}

#[test]
fn an_unparseable_endpoint_is_rejected() {
    let error = BatchForwarder::builder("not a url", "key").build().unwrap_err();
    assert!(matches!(error, Error::InvalidEndpoint(_)));
}
