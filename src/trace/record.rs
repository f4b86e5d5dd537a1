//! Per-request trace record.
//!
//! A `TraceRecord` holds the root span and every child span opened while a
//! request is handled. Handlers reach it through a [`TraceHandle`] taken from
//! the request extensions; the handle never outlives its request in a way that
//! matters, since the record is snapshotted when the root span closes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::context::{SpanId, TraceContext, TraceId};
use super::span::{Span, SpanKind};

/// All spans of one request.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    context: TraceContext,
    root: Span,
    children: Vec<Span>,
}

impl TraceRecord {
    /// Open the root span. Its parent is the context's span id, if any.
    pub fn new(context: TraceContext, root_name: impl Into<String>) -> Self {
        let root = Span::start(root_name, SpanKind::RpcServer, context.span_id());
        Self {
            context,
            root,
            children: Vec::new(),
        }
    }

    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    pub fn trace_id(&self) -> &TraceId {
        self.context.trace_id()
    }

    pub fn root(&self) -> &Span {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Span {
        &mut self.root
    }

    pub fn children(&self) -> &[Span] {
        &self.children
    }

    /// Root first, then children in creation order.
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        std::iter::once(&self.root).chain(self.children.iter())
    }

    pub fn span(&self, span_id: SpanId) -> Option<&Span> {
        self.spans().find(|s| s.span_id() == span_id)
    }

    pub fn span_mut(&mut self, span_id: SpanId) -> Option<&mut Span> {
        if self.root.span_id() == span_id {
            return Some(&mut self.root);
        }
        self.children.iter_mut().find(|s| s.span_id() == span_id)
    }

    /// Open a child span; parented to the root when `parent` is `None`.
    pub fn create_span(&mut self, name: impl Into<String>, parent: Option<SpanId>) -> SpanId {
        let parent = parent.unwrap_or_else(|| self.root.span_id());
        let span = Span::start(name, SpanKind::SpanKindUnspecified, Some(parent));
        let span_id = span.span_id();
        self.children.push(span);
        span_id
    }

    /// Close one span. Returns false if unknown or already closed.
    pub fn finish_span(&mut self, span_id: SpanId) -> bool {
        self.span_mut(span_id).map(Span::finish).unwrap_or(false)
    }

    /// Close every open child, then the root. Returns true only on the call
    /// that actually closed the root.
    pub fn finish(&mut self) -> bool {
        for child in self.children.iter_mut() {
            child.finish();
        }
        self.root.finish()
    }

    pub fn is_finished(&self) -> bool {
        self.root.is_closed()
    }
}

/// Shared handle to the record of the request being served.
#[derive(Debug, Clone)]
pub struct TraceHandle {
    context: TraceContext,
    record: Arc<Mutex<TraceRecord>>,
}

impl TraceHandle {
    pub fn new(record: TraceRecord) -> Self {
        let context = record.context().clone();
        Self {
            context,
            record: Arc::new(Mutex::new(record)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TraceRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The resolved context of this request.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    pub fn trace_id(&self) -> &TraceId {
        self.context.trace_id()
    }

    pub fn is_sampled(&self) -> bool {
        self.context.sampled().is_sampled()
    }

    pub fn root_span_id(&self) -> SpanId {
        self.lock().root().span_id()
    }

    /// Context to propagate downstream: this request's trace with the root
    /// span as parent.
    pub fn propagation_context(&self) -> TraceContext {
        self.context.with_span_id(Some(self.root_span_id()))
    }

    /// Set a label on the root span.
    pub fn set_label(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().root_mut().set_label(key, value);
    }

    /// Open a child of the root span; closed when the guard drops.
    pub fn span(&self, name: impl Into<String>) -> SpanGuard {
        let span_id = self.lock().create_span(name, None);
        SpanGuard {
            handle: self.clone(),
            span_id,
        }
    }

    /// Run `f` inside a child span.
    pub fn in_span<R>(&self, name: impl Into<String>, f: impl FnOnce(&SpanGuard) -> R) -> R {
        let guard = self.span(name);
        f(&guard)
    }

    /// Copy of the record as it stands.
    pub fn snapshot(&self) -> TraceRecord {
        self.lock().clone()
    }

    /// Close the record. Returns the closed record only on the first call.
    pub fn finish(&self) -> Option<TraceRecord> {
        let mut record = self.lock();
        if record.finish() {
            Some(record.clone())
        } else {
            None
        }
    }

    pub fn is_finished(&self) -> bool {
        self.lock().is_finished()
    }

    pub(crate) fn with_record<R>(&self, f: impl FnOnce(&mut TraceRecord) -> R) -> R {
        f(&mut self.lock())
    }
}

/// An open child span; closes on drop.
#[derive(Debug)]
pub struct SpanGuard {
    handle: TraceHandle,
    span_id: SpanId,
}

impl SpanGuard {
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    pub fn set_label(&self, key: impl Into<String>, value: impl Into<String>) {
        let span_id = self.span_id;
        self.handle.with_record(|record| {
            if let Some(span) = record.span_mut(span_id) {
                span.set_label(key, value);
            }
        });
    }

    /// Open a nested span under this one.
    pub fn child(&self, name: impl Into<String>) -> SpanGuard {
        let span_id = self
            .handle
            .with_record(|record| record.create_span(name, Some(self.span_id)));
        SpanGuard {
            handle: self.handle.clone(),
            span_id,
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        let span_id = self.span_id;
        self.handle.with_record(|record| record.finish_span(span_id));
    }
}
