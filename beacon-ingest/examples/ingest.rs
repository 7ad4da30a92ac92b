//! Forward a short event stream to an HTTP ingestion endpoint.
//!
//! Usage:
//!
//! ```shell
//! cargo run --example ingest -- <endpoint-url> <access-key>
//! ```

use std::time::Duration;

use beacon::{Logger, Record};
use beacon_ingest::BatchForwarder;

fn main() -> Result<(), beacon_ingest::Error> {
    // Delivery failures are reported through `tracing`; show them on stderr.
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let endpoint = args
        .next()
        .unwrap_or_else(|| "http://localhost:8088/1/http/input".to_string());
    let access_key = args.next().unwrap_or_default();

    let forwarder = BatchForwarder::builder(endpoint, access_key)
        .with_param("sourcetype", "json_auto_timestamp")
        .with_flush_interval(Duration::from_secs(2))
        .build()?;

    let logger = Logger::new("ingest-demo");
    logger.export(forwarder);

    for sequence in 0..10i64 {
        logger.info("demo.tick", Record::new().with("sequence", sequence));
        std::thread::sleep(Duration::from_millis(300));
    }

    // Ships whatever the forwarder still buffers before returning.
    logger.close();
    Ok(())
}
