//! Emit structured events and a small trace as JSON lines on stdout.
//!
//! ```shell
//! cargo run --example basic
//! ```

use beacon::export::JsonExporter;
use beacon::{Logger, Record, Span};

fn main() {
    let logger = Logger::new("basic-demo");
    logger.export(JsonExporter::stdout());
    logger.baggage("region", "eu-west-1");

    logger.info(
        "demo.start",
        Record::new().with("pid", std::process::id() as i64),
    );

    // A root span with one child; the child record flushes first, with
    // the shared trace id tying the two together.
    let root = Span::begin("request.handle")
        .field("path", "/checkout")
        .child(Span::begin("db.query").field("rows", 3i64).end())
        .end();
    logger.trace(root);

    // Actions mark events an operator should look at; they double as the
    // logger's last error.
    logger
        .action("cache.miss_storm", Record::new().with("misses", 412i64))
        .wait();
    if let Some(error) = logger.last_error() {
        eprintln!("flagged: {error}");
    }

    logger.close();
}
