//! Call counting decorator.
//!
//! `Counted` bumps its counter before every attempt, so failed calls are
//! counted too. It keeps no history and is rejected by `replay`.

use crate::logging::{EventSink, LogEvent};
use crate::replay::recorder::{Callable, Instrumented};
use crate::replay::recording::HistoryLog;
use serde_json::json;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct Counted<F, A, R, E> {
    name: String,
    func: F,
    calls: AtomicU64,
    sink: Option<Arc<dyn EventSink>>,
    _signature: PhantomData<fn(A) -> Result<R, E>>,
}

pub fn counted<F, A, R, E>(name: impl Into<String>, func: F) -> Counted<F, A, R, E>
where
    F: Fn(A) -> Result<R, E>,
{
    Counted {
        name: name.into(),
        func,
        calls: AtomicU64::new(0),
        sink: None,
        _signature: PhantomData,
    }
}

impl<F, A, R, E> Counted<F, A, R, E>
where
    F: Fn(A) -> Result<R, E>,
{
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn call(&self, args: A) -> Result<R, E> {
        let attempt = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(sink) = &self.sink {
            sink.emit(&LogEvent {
                level: "debug",
                event_type: "call_counted",
                payload: json!({ "name": self.name, "attempt": attempt }),
            });
        }
        (self.func)(args)
    }

    /// Attempts so far, failed ones included.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl<F, A, R, E> Callable<A> for Counted<F, A, R, E>
where
    F: Fn(A) -> Result<R, E>,
{
    type Output = R;
    type Error = E;

    fn call(&self, args: A) -> Result<R, E> {
        Counted::call(self, args)
    }
}

impl<F, A, R, E> Instrumented for Counted<F, A, R, E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn history(&self) -> Option<&HistoryLog> {
        None
    }
}

impl<F, A, R, E> fmt::Debug for Counted<F, A, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counted")
            .field("name", &self.name)
            .field("calls", &self.calls.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
