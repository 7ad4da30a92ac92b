//! Pluggable sinks consuming the event stream.

mod json;
mod memory;

pub use json::JsonExporter;
pub use memory::InMemoryExporter;

use std::fmt::Debug;

use futures_util::future::{self, BoxFuture};

use crate::data::Record;
use crate::error::ExportResult;

/// `Exporter` defines the interface sinks implement to receive the event
/// stream.
///
/// Implementations are expected to be simple encoders and transmitters. The
/// [`Logger`] worker drives the returned future to completion before touching
/// the next event, so `send` is never called concurrently for the same
/// exporter instance.
///
/// [`Logger`]: crate::Logger
pub trait Exporter: Send + Debug {
    /// Deliver one record to the sink.
    ///
    /// Any retry logic that is required by the sink is the responsibility of
    /// the implementation; a returned error is recorded as the owning
    /// logger's last error and the stream moves on.
    fn send(&mut self, record: &Record) -> BoxFuture<'static, ExportResult>;

    /// Shut the sink down, flushing anything it still buffers. Called once
    /// when the owning [`Logger`] closes; after it, `send` is not called
    /// again.
    ///
    /// [`Logger`]: crate::Logger
    fn shutdown(&mut self) {}
}

/// Fans one event stream out to two sinks in parallel.
///
/// Both sinks see every record; the reported outcome is the first failure
/// once both deliveries have finished.
#[derive(Debug)]
pub struct Tee<A, B> {
    left: A,
    right: B,
}

impl<A, B> Tee<A, B>
where
    A: Exporter,
    B: Exporter,
{
    /// Pair two sinks.
    pub fn new(left: A, right: B) -> Self {
        Tee { left, right }
    }
}

impl<A, B> Exporter for Tee<A, B>
where
    A: Exporter,
    B: Exporter,
{
    fn send(&mut self, record: &Record) -> BoxFuture<'static, ExportResult> {
        let left = self.left.send(record);
        let right = self.right.send(record);
        Box::pin(async move {
            let (left, right) = future::join(left, right).await;
            left.and(right)
        })
    }

    fn shutdown(&mut self) {
        self.left.shutdown();
        self.right.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use futures_executor::block_on;

    #[derive(Debug)]
    struct RefusingExporter;

    impl Exporter for RefusingExporter {
        fn send(&mut self, _record: &Record) -> BoxFuture<'static, ExportResult> {
            Box::pin(future::ready(Err(ExportError::AlreadyShutdown)))
        }
    }

    #[test]
    fn tee_delivers_to_both_sides() {
        let left = InMemoryExporter::new();
        let right = InMemoryExporter::new();
        let mut tee = Tee::new(left.clone(), right.clone());

        let record = Record::new().with("name", "tee.test");
        block_on(tee.send(&record)).unwrap();

        assert_eq!(left.records(), vec![record.clone()]);
        assert_eq!(right.records(), vec![record]);
    }

    #[test]
    fn tee_reports_failure_but_still_feeds_the_healthy_side() {
        let right = InMemoryExporter::new();
        let mut tee = Tee::new(RefusingExporter, right.clone());

        let record = Record::new().with("name", "tee.test");
        let result = block_on(tee.send(&record));

        assert!(matches!(result, Err(ExportError::AlreadyShutdown)));
        assert_eq!(right.records().len(), 1);
    }
}
