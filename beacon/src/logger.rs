//! The event logger and its worker thread.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::thread;
use std::time::SystemTime;

use futures_channel::oneshot;
use futures_executor::block_on;

use crate::data::{rfc3339, Record, Value};
use crate::error::{Error, ExportResult};
use crate::export::Exporter;
use crate::trace::Span;

const DEFAULT_QUEUE_SIZE: usize = 2048;

/// Messages exchanged between caller threads and the worker thread.
#[derive(Debug)]
enum Command {
    Emit(Task),
    Count(String, oneshot::Sender<usize>),
    Baggage(String, Value),
    Export(Box<dyn Exporter>),
    Shutdown(oneshot::Sender<()>),
}

/// One event on its way to the worker.
#[derive(Debug)]
struct Task {
    kind: Kind,
    event: String,
    payload: Record,
    done: oneshot::Sender<()>,
}

/// How an event was submitted, deciding its `type` tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Info,
    Action,
    Span,
}

impl Kind {
    fn tag(self) -> &'static str {
        match self {
            Kind::Info => "info",
            Kind::Action => "action",
            Kind::Span => "span",
        }
    }
}

/// Completion handle for one submitted event.
///
/// Resolves once the worker has processed the event: counted it, stamped it
/// and handed it to every registered exporter. Either block on [`wait`] or
/// `.await` it; dropping the handle detaches from the outcome without
/// affecting processing.
///
/// [`wait`]: Ack::wait
#[derive(Debug)]
pub struct Ack(AckState);

#[derive(Debug)]
enum AckState {
    Pending(oneshot::Receiver<()>),
    Ready,
}

impl Ack {
    fn pending(receiver: oneshot::Receiver<()>) -> Self {
        Ack(AckState::Pending(receiver))
    }

    /// A handle that resolves immediately.
    pub(crate) fn ready() -> Self {
        Ack(AckState::Ready)
    }

    /// Block the calling thread until the event has been processed.
    pub fn wait(self) {
        if let AckState::Pending(receiver) = self.0 {
            let _ = block_on(receiver);
        }
    }
}

impl Future for Ack {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().0 {
            // A cancelled sender means the worker is gone; the event can
            // never be processed later, so resolve either way.
            AckState::Pending(receiver) => Pin::new(receiver).poll(cx).map(|_| ()),
            AckState::Ready => Poll::Ready(()),
        }
    }
}

/// Handle to an event logger.
///
/// All clones feed one dedicated worker thread, which serializes concurrent
/// submissions into a single ordered stream: each event is counted, stamped
/// with its name and timestamp, enriched with baggage, tagged, and handed to
/// every registered exporter. Emitting returns an [`Ack`] resolving once that
/// has happened; nothing on the emitting path returns an error, failures are
/// readable through [`last_error`].
///
/// # Example
///
/// ```
/// use beacon::{Logger, Record};
///
/// let logger = Logger::new("checkout");
/// logger.export(beacon::export::InMemoryExporter::new());
/// logger.info("checkout.start", Record::new().with("cart_items", 3i64)).wait();
/// assert_eq!(logger.count("checkout.start"), 1);
/// logger.close();
/// ```
///
/// A logger should be [`close`]d to flush exporters before the process ends;
/// dropping the last clone drains the queue as well. Using any clone after
/// `close` is a programming error and panics.
///
/// [`close`]: Logger::close
/// [`last_error`]: Logger::last_error
#[derive(Clone, Debug)]
pub struct Logger {
    sender: SyncSender<Command>,
    last_error: Arc<Mutex<Option<Error>>>,
    is_closed: Arc<AtomicBool>,
    handle: Arc<Mutex<Option<thread::JoinHandle<()>>>>,
}

impl Logger {
    /// Create a logger for `service`. Every emitted record carries the
    /// service name in its `service` field.
    pub fn new(service: impl Into<String>) -> Self {
        Logger::with_queue_size(service, DEFAULT_QUEUE_SIZE)
    }

    /// Create a logger with a caller-chosen queue bound. Submitting blocks
    /// while `queue_size` commands are waiting for the worker, so a slow
    /// exporter backpressures producers instead of dropping events.
    pub fn with_queue_size(service: impl Into<String>, queue_size: usize) -> Self {
        let service = service.into();
        let (sender, receiver) = sync_channel(queue_size);
        let last_error = Arc::new(Mutex::new(None));
        let worker = Worker::new(service.clone(), Arc::clone(&last_error));

        let handle = thread::Builder::new()
            .name(format!("beacon-logger-{service}"))
            .spawn(move || worker.run(receiver))
            .expect("failed to spawn logger worker thread");

        Logger {
            sender,
            last_error,
            is_closed: Arc::new(AtomicBool::new(false)),
            handle: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Emit an informational event.
    pub fn info(&self, event: impl Into<String>, payload: Record) -> Ack {
        self.submit(Kind::Info, event.into(), payload)
    }

    /// Emit an event requiring operator attention.
    ///
    /// Delivered like [`info`], and additionally recorded as the logger's
    /// last error so health checks can notice it.
    ///
    /// [`info`]: Logger::info
    pub fn action(&self, event: impl Into<String>, payload: Record) -> Ack {
        self.submit(Kind::Action, event.into(), payload)
    }

    /// Flush a finished trace: linked spans first, newest link to oldest,
    /// then the root span. Returns the root span's [`Ack`].
    pub fn trace(&self, span: Span) -> Ack {
        span.flush_into(self)
    }

    pub(crate) fn submit(&self, kind: Kind, event: String, payload: Record) -> Ack {
        let (done, ack) = oneshot::channel();
        self.send(Command::Emit(Task {
            kind,
            event,
            payload,
            done,
        }));
        Ack::pending(ack)
    }

    /// How many times `event` was emitted through this logger, zero if it
    /// never was.
    ///
    /// Blocks until the worker answers, so the count covers every event the
    /// calling thread emitted before asking.
    pub fn count(&self, event: impl Into<String>) -> usize {
        let (reply, answer) = oneshot::channel();
        self.send(Command::Count(event.into(), reply));
        block_on(answer).unwrap_or(0)
    }

    /// Attach `key`/`value` to every event emitted from now on.
    ///
    /// The change travels through the queue like an event: submissions
    /// already queued keep the old baggage, later ones by this caller see
    /// the new value. On key collision baggage overrides payload fields.
    pub fn baggage(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.send(Command::Baggage(key.into(), value.into()));
    }

    /// Register another sink for the event stream.
    ///
    /// Routed through the queue as well: events submitted after this call
    /// are delivered to the new sink, earlier ones are not.
    pub fn export(&self, exporter: impl Exporter + 'static) {
        self.send(Command::Export(Box::new(exporter)));
    }

    /// The most recent failure recorded while processing events, if any.
    ///
    /// Covers actionable events as well as exporter failures. Never cleared,
    /// only overwritten by the next failure.
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop intake, process everything already queued, shut every exporter
    /// down and join the worker thread.
    ///
    /// # Panics
    ///
    /// Like any other call on a closed logger, closing twice panics.
    pub fn close(&self) {
        if self.is_closed.swap(true, Ordering::SeqCst) {
            panic!("logger used after close");
        }
        let (done, closed) = oneshot::channel();
        if self.sender.send(Command::Shutdown(done)).is_ok() {
            let _ = block_on(closed);
        }
        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = handle.join();
        }
    }

    fn send(&self, command: Command) {
        if self.is_closed.load(Ordering::SeqCst) {
            panic!("logger used after close");
        }
        // Blocks while the queue is full; backpressure, not drops.
        if self.sender.send(command).is_err() {
            panic!("logger worker is gone");
        }
    }
}

/// State owned exclusively by the worker thread.
struct Worker {
    counts: HashMap<String, usize>,
    baggage: Record,
    exporters: Vec<Box<dyn Exporter>>,
    last_error: Arc<Mutex<Option<Error>>>,
}

impl Worker {
    fn new(service: String, last_error: Arc<Mutex<Option<Error>>>) -> Self {
        Worker {
            counts: HashMap::new(),
            baggage: Record::new().with("service", service),
            exporters: Vec::new(),
            last_error,
        }
    }

    fn run(mut self, receiver: Receiver<Command>) {
        // recv fails once every sender is gone, after yielding everything
        // still buffered; dropping the last handle therefore drains too.
        while let Ok(command) = receiver.recv() {
            match command {
                Command::Emit(task) => self.emit(task),
                Command::Count(event, reply) => {
                    let count = self.counts.get(&event).copied().unwrap_or(0);
                    let _ = reply.send(count);
                }
                Command::Baggage(key, value) => self.baggage.set(key, value),
                Command::Export(exporter) => self.exporters.push(exporter),
                Command::Shutdown(done) => {
                    self.shutdown();
                    let _ = done.send(());
                    return;
                }
            }
        }
        tracing::debug!(
            name: "Logger.ChannelDisconnected",
            target: env!("CARGO_PKG_NAME"),
            "every logger handle dropped, draining and shutting down"
        );
        self.shutdown();
    }

    fn emit(&mut self, task: Task) {
        let Task {
            kind,
            event,
            mut payload,
            done,
        } = task;

        *self.counts.entry(event.clone()).or_insert(0) += 1;

        payload.set("name", event.as_str());
        // Spans arrive with their start time already stamped; keep it.
        if !payload.contains("timestamp") {
            payload.set("timestamp", rfc3339(SystemTime::now()));
        }
        payload.merge(&self.baggage);
        payload.set("type", kind.tag());

        if kind == Kind::Action {
            self.record_error(Error::Actionable(event.clone()));
        }

        if let Err(err) = self.dispatch(&payload) {
            tracing::warn!(
                name: "Logger.ExportFailed",
                target: env!("CARGO_PKG_NAME"),
                event = event.as_str(),
                error = %err,
                "an exporter rejected the event"
            );
            self.record_error(Error::Export {
                event: event.clone(),
                reason: err.to_string(),
            });
        }

        let _ = done.send(());
    }

    /// Hand the record to every exporter, reporting the first failure.
    fn dispatch(&mut self, record: &Record) -> ExportResult {
        let mut outcome = Ok(());
        for exporter in self.exporters.iter_mut() {
            if let Err(err) = block_on(exporter.send(record)) {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        outcome
    }

    fn record_error(&mut self, error: Error) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    fn shutdown(&mut self) {
        for exporter in self.exporters.iter_mut() {
            exporter.shutdown();
        }
    }
}
