use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;

use crate::data::Record;
use crate::error::ExportResult;
use crate::export::Exporter;

/// An exporter that stores every record it receives in memory.
///
/// This exporter is useful for testing and debugging purposes. Clones share
/// the same backing store, so a test can hand one handle to a [`Logger`] and
/// inspect arrivals through the other.
///
/// [`Logger`]: crate::Logger
#[derive(Clone, Debug, Default)]
pub struct InMemoryExporter {
    records: Arc<Mutex<Vec<Record>>>,
}

impl InMemoryExporter {
    /// Create an exporter with an empty store.
    pub fn new() -> Self {
        InMemoryExporter::default()
    }

    /// Snapshot of everything received so far, in arrival order.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Discard everything received so far.
    pub fn reset(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Exporter for InMemoryExporter {
    fn send(&mut self, record: &Record) -> BoxFuture<'static, ExportResult> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Box::pin(futures_util::future::ready(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_executor::block_on;

    #[test]
    fn clones_share_the_backing_store() {
        let exporter = InMemoryExporter::new();
        let mut handle = exporter.clone();

        block_on(handle.send(&Record::new().with("name", "one"))).unwrap();
        assert_eq!(exporter.records().len(), 1);

        exporter.reset();
        assert!(exporter.records().is_empty());
    }
}
