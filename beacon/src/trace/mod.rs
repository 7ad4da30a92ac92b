//! Timed spans linked into causal traces.

mod id;

pub use id::ulid;

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::data::{rfc3339, Record, Value};
use crate::logger::{Ack, Kind, Logger};

/// One timed unit of work.
///
/// A span is a plain value: every builder operation consumes it and returns
/// the span to keep working with, so assembling a trace is a chain of moves
/// with no shared state. Link sub-operations with [`child`], causally
/// sequential operations with [`followed_by`], [`end`] what you started, and
/// hand the root to [`Logger::trace`] to emit the whole tree.
///
/// # Example
///
/// ```
/// use beacon::{Logger, Span};
///
/// let logger = Logger::new("search");
/// let root = Span::begin("search.request")
///     .child(Span::begin("search.cache").end())
///     .child(Span::begin("search.index").field("shards", 4i64).end())
///     .end();
/// logger.trace(root).wait();
/// logger.close();
/// ```
///
/// [`child`]: Span::child
/// [`followed_by`]: Span::followed_by
/// [`end`]: Span::end
#[derive(Clone, Debug)]
pub struct Span {
    trace_id: String,
    span_id: String,
    parent_id: String,
    start: SystemTime,
    duration: Duration,
    is_ended: bool,
    event: String,
    error: Option<String>,
    data: Record,
    linked: Vec<Span>,
}

impl Span {
    /// Start a span named `event`, timestamped now.
    ///
    /// The new span is its own trace root: its trace id equals its span id
    /// and it has no parent. Linking it under another span restamps both,
    /// and [`with_trace_id`]/[`with_parent_id`] continue a trace started
    /// across a process boundary.
    ///
    /// [`with_trace_id`]: Span::with_trace_id
    /// [`with_parent_id`]: Span::with_parent_id
    pub fn begin(event: impl Into<String>) -> Self {
        let span_id = ulid();
        Span {
            trace_id: span_id.clone(),
            span_id,
            parent_id: String::new(),
            start: SystemTime::now(),
            duration: Duration::ZERO,
            is_ended: false,
            event: event.into(),
            error: None,
            data: Record::new(),
            linked: Vec::new(),
        }
    }

    /// Continue the trace `trace_id` instead of rooting a new one.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Record `parent_id` as the identifier of a parent span that lives
    /// elsewhere, such as in the calling service.
    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    /// Return the span with one data field set.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.set(key, value);
        self
    }

    /// Link `child` as a sub-operation and return the parent.
    ///
    /// The child and everything already linked under it join this span's
    /// trace; the child's parent id becomes this span's id.
    pub fn child(mut self, mut child: Span) -> Self {
        child.restamp(&self.trace_id, &self.span_id);
        self.linked.push(child);
        self
    }

    /// Link this span as the predecessor of `next` and return `next`.
    ///
    /// For causally sequential operations that are not nested. `next` is
    /// stamped like a [`child`], and this span moves into `next`'s linked
    /// list so that the whole chain flushes from whichever span ends it.
    ///
    /// [`child`]: Span::child
    pub fn followed_by(self, mut next: Span) -> Self {
        next.restamp(&self.trace_id, &self.span_id);
        next.linked.push(self);
        next
    }

    /// End the span: record `duration = now - start` and mark it flushable.
    pub fn end(self) -> Self {
        self.finish(None)
    }

    /// End the span, recording the error if `result` is an `Err`.
    ///
    /// To cover several fallible steps, combine their results first;
    /// `first.and(second)` keeps the earliest error.
    pub fn end_with<T, E: fmt::Display>(self, result: &Result<T, E>) -> Self {
        self.finish(result.as_ref().err().map(|err| err.to_string()))
    }

    /// The first error recorded anywhere in this span's causal chain,
    /// checking linked spans depth-first before the span itself.
    pub fn err(&self) -> Option<&str> {
        for linked in &self.linked {
            if let Some(err) = linked.err() {
                return Some(err);
            }
        }
        self.error.as_deref()
    }

    /// Identifier of the trace this span belongs to.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// This span's own identifier.
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    /// Identifier of the parent span, empty for a trace root.
    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    /// The event name the span was started with.
    pub fn name(&self) -> &str {
        &self.event
    }

    /// Whether the span has been ended.
    pub fn is_ended(&self) -> bool {
        self.is_ended
    }

    fn finish(mut self, error: Option<String>) -> Self {
        if self.error.is_none() {
            self.error = error;
        }
        self.duration = self.start.elapsed().unwrap_or_default();
        self.is_ended = true;
        self
    }

    fn restamp(&mut self, trace_id: &str, parent_id: &str) {
        self.set_trace_id(trace_id);
        self.parent_id = parent_id.to_owned();
    }

    // The trace id covers the whole linked subtree; parent ids stay
    // relative and are not touched.
    fn set_trace_id(&mut self, trace_id: &str) {
        self.trace_id = trace_id.to_owned();
        for linked in &mut self.linked {
            linked.set_trace_id(trace_id);
        }
    }

    /// Emit the span tree: linked spans first, newest link to oldest, each
    /// recursively, then the span itself. An unended span skips its own
    /// record but still flushes its links, and resolves immediately.
    pub(crate) fn flush_into(self, logger: &Logger) -> Ack {
        let Span {
            trace_id,
            span_id,
            parent_id,
            start,
            duration,
            is_ended,
            event,
            error,
            mut data,
            linked,
        } = self;

        for span in linked.into_iter().rev() {
            span.flush_into(logger);
        }

        if !is_ended {
            return Ack::ready();
        }

        data.set("duration_ms", duration.as_nanos() as f64 / 1e6);
        data.set("trace.span_id", span_id);
        data.set("trace.parent_id", parent_id);
        data.set("trace.trace_id", trace_id);
        data.set("timestamp", rfc3339(start));

        let kind = match error {
            Some(error) => {
                data.set("error", error);
                Kind::Action
            }
            None => Kind::Span,
        };
        logger.submit(kind, event, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_roots_its_own_trace() {
        let span = Span::begin("op");
        assert_eq!(span.trace_id(), span.span_id());
        assert_eq!(span.parent_id(), "");
        assert!(!span.is_ended());
        assert_eq!(span.name(), "op");
    }

    #[test]
    fn child_stamps_the_subtree_and_returns_the_parent() {
        let grandchild = Span::begin("op.gc");
        let child = Span::begin("op.child").child(grandchild);
        let parent = Span::begin("op");
        let parent_span_id = parent.span_id().to_owned();
        let parent_trace_id = parent.trace_id().to_owned();

        let parent = parent.child(child);

        assert_eq!(parent.span_id(), parent_span_id);
        let child = &parent.linked[0];
        assert_eq!(child.trace_id(), parent_trace_id);
        assert_eq!(child.parent_id(), parent_span_id);
        let grandchild = &child.linked[0];
        assert_eq!(grandchild.trace_id(), parent_trace_id);
        assert_eq!(grandchild.parent_id(), child.span_id());
    }

    #[test]
    fn followed_by_returns_next_carrying_the_predecessor() {
        let first = Span::begin("op.first").end();
        let first_span_id = first.span_id().to_owned();
        let first_trace_id = first.trace_id().to_owned();

        let next = first.followed_by(Span::begin("op.second"));

        assert_eq!(next.name(), "op.second");
        assert_eq!(next.trace_id(), first_trace_id);
        assert_eq!(next.parent_id(), first_span_id);
        assert_eq!(next.linked[0].span_id(), first_span_id);
    }

    #[test]
    fn err_prefers_descendants_over_self() {
        let ok: Result<(), String> = Ok(());
        let failed: Result<(), String> = Err("downstream timeout".into());

        let root = Span::begin("op")
            .child(Span::begin("op.inner").end_with(&failed))
            .end_with(&ok);

        assert_eq!(root.err(), Some("downstream timeout"));
    }

    #[test]
    fn end_with_keeps_the_first_error() {
        let first: Result<(), String> = Err("first".into());
        let second: Result<(), String> = Err("second".into());

        let span = Span::begin("op").end_with(&first.and(second));
        assert_eq!(span.err(), Some("first"));
        assert!(span.is_ended());
    }

    #[test]
    fn ending_twice_keeps_the_recorded_error() {
        let failed: Result<(), String> = Err("kept".into());
        let span = Span::begin("op").end_with(&failed).end();
        assert_eq!(span.err(), Some("kept"));
    }
}
