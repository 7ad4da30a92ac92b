//! # Beacon
//!
//! Structured event logging and tracing for running services. Callers emit
//! informational events, actionable events and timed trace spans; a logger
//! serializes concurrent submissions into one ordered stream, enriches each
//! record with process-wide baggage, counts it and hands it to pluggable
//! [exporters](export). Emitting never fails on the hot path: every
//! submission returns an [`Ack`] and failures are read back through
//! [`Logger::last_error`].
//!
//! ```
//! use beacon::export::InMemoryExporter;
//! use beacon::{Logger, Record};
//!
//! let exporter = InMemoryExporter::new();
//! let logger = Logger::new("example");
//! logger.export(exporter.clone());
//!
//! logger.info("example.start", Record::new());
//! for sequence in 0..3i64 {
//!     logger.info("example.tick", Record::new().with("sequence", sequence));
//! }
//! logger.info("example.stop", Record::new()).wait();
//!
//! assert_eq!(logger.count("example.tick"), 3);
//! assert_eq!(exporter.records().len(), 5);
//! logger.close();
//! ```
//!
//! Traces are assembled from [`Span`] values and flushed through
//! [`Logger::trace`]; delivery to a remote collector is a separate exporter
//! crate on top of the [`export::Exporter`] trait.
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

mod data;
mod error;
mod logger;

pub mod export;
pub mod trace;

pub use data::{Record, Value};
pub use error::{Error, ExportError, ExportResult};
pub use logger::{Ack, Logger};
pub use trace::Span;
