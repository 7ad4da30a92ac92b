use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::BoxFuture;

use crate::data::Record;
use crate::error::{ExportError, ExportResult};
use crate::export::Exporter;

/// An exporter that writes each record to a writer as one JSON line.
pub struct JsonExporter<W: Write + Send> {
    writer: W,
    is_shutdown: AtomicBool,
}

impl JsonExporter<io::Stdout> {
    /// Write records to standard output.
    pub fn stdout() -> Self {
        JsonExporter::new(io::stdout())
    }
}

impl<W: Write + Send> JsonExporter<W> {
    /// Write records to `writer`, one JSON object per line.
    pub fn new(writer: W) -> Self {
        JsonExporter {
            writer,
            is_shutdown: AtomicBool::new(false),
        }
    }
}

impl<W: Write + Send> fmt::Debug for JsonExporter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonExporter")
    }
}

impl<W: Write + Send> Exporter for JsonExporter<W> {
    fn send(&mut self, record: &Record) -> BoxFuture<'static, ExportResult> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Box::pin(futures_util::future::ready(Err(
                ExportError::AlreadyShutdown,
            )));
        }
        let result = serde_json::to_vec(record)
            .map_err(ExportError::from)
            .and_then(|mut line| {
                line.push(b'\n');
                self.writer.write_all(&line).map_err(ExportError::other)
            });
        Box::pin(futures_util::future::ready(result))
    }

    fn shutdown(&mut self) {
        self.is_shutdown.store(true, Ordering::SeqCst);
        let _ = self.writer.flush();
    }
}
