//! The recording decorator.
//!
//! `Recorded` wraps a callable and appends one `HistoryEntry` per successful
//! call to a log it owns. Failures (an `Err` or a panic) propagate untouched
//! and leave the log as it was.

use crate::capture::{CallInputs, Capture, CapturePolicy};
use crate::logging::{EventSink, LogEvent};
use crate::replay::recording::{HistoryEntry, HistoryLog};
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Anything that can be called with `A` and may fail.
///
/// Implemented by every wrapper in this crate so decorators can be stacked.
pub trait Callable<A> {
    type Output;
    type Error;

    fn call(&self, args: A) -> Result<Self::Output, Self::Error>;
}

/// Wrappers that can be handed to `replay`.
pub trait Instrumented {
    fn name(&self) -> &str;

    /// The attached call history, if this wrapper keeps one.
    fn history(&self) -> Option<&HistoryLog>;
}

pub struct Recorded<F, A, R, E> {
    name: String,
    func: F,
    log: HistoryLog,
    policy: CapturePolicy,
    sink: Option<Arc<dyn EventSink>>,
    _signature: PhantomData<fn(A) -> Result<R, E>>,
}

/// Wraps `func` in a new recorder with an empty history.
///
/// Arguments must implement `CallInputs` and the output `Serialize`, since
/// both are kept as JSON snapshots. Functions returning non-serializable
/// handles have to be wrapped around a serializable projection instead.
pub fn recorder<F, A, R, E>(name: impl Into<String>, func: F) -> Recorded<F, A, R, E>
where
    F: Fn(A) -> Result<R, E>,
    A: CallInputs,
    R: Serialize,
{
    Recorded::new(name, func)
}

/// Like `recorder`, naming the wrapper after the function's type.
pub fn recorder_fn<F, A, R, E>(func: F) -> Recorded<F, A, R, E>
where
    F: Fn(A) -> Result<R, E>,
    A: CallInputs,
    R: Serialize,
{
    Recorded::new(std::any::type_name::<F>(), func)
}

/// Wraps a function that cannot fail. Call it through `Recorded::invoke`.
pub fn recorder_infallible<G, A, R>(
    name: impl Into<String>,
    func: G,
) -> Recorded<impl Fn(A) -> Result<R, Infallible>, A, R, Infallible>
where
    G: Fn(A) -> R,
    A: CallInputs,
    R: Serialize,
{
    Recorded::new(name, move |args: A| Ok(func(args)))
}

impl<F, A, R, E> Recorded<F, A, R, E>
where
    F: Fn(A) -> Result<R, E>,
    A: CallInputs,
    R: Serialize,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            log: HistoryLog::new(),
            policy: CapturePolicy::default(),
            sink: None,
            _signature: PhantomData,
        }
    }

    pub fn with_policy(mut self, policy: CapturePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Calls the wrapped function, recording the call if it succeeds.
    pub fn call(&self, args: A) -> Result<R, E> {
        let mut capture = Capture::new(&self.policy);
        args.capture_into(&mut capture);

        let result = (self.func)(args);

        match &result {
            Ok(output) => {
                let output = capture.value(output);
                let (inputs, fallbacks) = capture.finish();
                let index = self.log.append(HistoryEntry::new(inputs, output));
                self.emit("info", "call_recorded", json!({ "name": self.name, "index": index }));
                for reason in fallbacks {
                    self.emit(
                        "warn",
                        "capture_fallback",
                        json!({ "name": self.name, "index": index, "reason": reason }),
                    );
                }
            }
            Err(_) => self.emit(
                "warn",
                "call_failed",
                json!({ "name": self.name, "recorded": self.log.len() }),
            ),
        }

        result
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self) -> &HistoryLog {
        &self.log
    }

    /// Number of successful calls recorded so far.
    pub fn call_count(&self) -> usize {
        self.log.len()
    }

    fn emit(&self, level: &str, event_type: &str, payload: Value) {
        if let Some(sink) = &self.sink {
            sink.emit(&LogEvent {
                level,
                event_type,
                payload,
            });
        }
    }
}

impl<F, A, R> Recorded<F, A, R, Infallible>
where
    F: Fn(A) -> Result<R, Infallible>,
    A: CallInputs,
    R: Serialize,
{
    pub fn invoke(&self, args: A) -> R {
        match self.call(args) {
            Ok(output) => output,
            Err(never) => match never {},
        }
    }
}

impl<F, A, R, E> Callable<A> for Recorded<F, A, R, E>
where
    F: Fn(A) -> Result<R, E>,
    A: CallInputs,
    R: Serialize,
{
    type Output = R;
    type Error = E;

    fn call(&self, args: A) -> Result<R, E> {
        Recorded::call(self, args)
    }
}

impl<F, A, R, E> Instrumented for Recorded<F, A, R, E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn history(&self) -> Option<&HistoryLog> {
        Some(&self.log)
    }
}

impl<F, A, R, E> fmt::Debug for Recorded<F, A, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorded")
            .field("name", &self.name)
            .field("calls", &self.log.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use serde_json::json;

    fn double(args: (i64,)) -> Result<i64, String> {
        Ok(args.0 * 2)
    }

    #[test]
    fn successful_call_returns_result_and_records_entry() {
        let doubled = recorder("double", double);
        assert_eq!(doubled.call((21,)), Ok(42));

        let entries = doubled.log().snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].args(), &[json!(21)]);
        assert!(entries[0].kwargs().is_empty());
        assert_eq!(entries[0].output(), &json!(42));
    }

    #[test]
    fn failed_call_propagates_and_is_not_recorded() {
        let checked = recorder("checked", |(n,): (i64,)| {
            if n < 0 {
                Err(format!("negative: {n}"))
            } else {
                Ok(n)
            }
        });
        assert_eq!(checked.call((1,)), Ok(1));
        assert_eq!(checked.call((-3,)), Err("negative: -3".to_string()));
        assert_eq!(checked.call_count(), 1);
    }

    #[test]
    fn panicking_call_is_not_recorded() {
        let fragile = recorder("fragile", |(n,): (u8,)| -> Result<u8, String> {
            assert!(n != 0, "zero is not allowed");
            Ok(n)
        });
        fragile.call((1,)).expect("first call");
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fragile.call((0,))));
        assert!(outcome.is_err());
        assert_eq!(fragile.call_count(), 1);
    }

    #[test]
    fn infallible_recorder_invokes_directly() {
        let greet = recorder_infallible("greet", |(who,): (String,)| format!("hi {who}"));
        assert_eq!(greet.invoke(("ada".to_string(),)), "hi ada");
        assert_eq!(greet.log().snapshot()[0].output(), &json!("hi ada"));
    }

    #[test]
    fn recorder_fn_names_wrapper_after_function() {
        let doubled = recorder_fn(double);
        assert!(doubled.name().ends_with("double"), "{}", doubled.name());
    }

    #[test]
    fn sink_receives_recorded_and_failed_events() {
        let sink = Arc::new(MemorySink::default());
        let half = recorder("half", |(n,): (i64,)| {
            if n % 2 == 0 {
                Ok(n / 2)
            } else {
                Err(())
            }
        })
        .with_sink(sink.clone());

        half.call((4,)).expect("even");
        half.call((3,)).expect_err("odd");

        assert_eq!(sink.event_types(), vec!["call_recorded", "call_failed"]);
        assert_eq!(sink.events()[0].payload["index"], json!(1));
        assert_eq!(sink.events()[1].payload["recorded"], json!(1));
    }

    #[test]
    fn capture_fallback_is_reported_but_call_still_recorded() {
        let sink = Arc::new(MemorySink::default());
        let keyed = recorder("keyed", |(map,): (std::collections::HashMap<(u8, u8), u8>,)| {
            Ok::<_, ()>(map.len())
        })
        .with_sink(sink.clone());

        let mut map = std::collections::HashMap::new();
        map.insert((1, 1), 1);
        assert_eq!(keyed.call((map,)), Ok(1));
        assert_eq!(keyed.call_count(), 1);
        assert_eq!(sink.event_types(), vec!["call_recorded", "capture_fallback"]);
    }

    #[test]
    fn debug_output_shows_name_and_call_count() {
        let doubled = recorder("double", double);
        doubled.call((1,)).expect("call");
        let rendered = format!("{doubled:?}");
        assert!(rendered.contains("\"double\""));
        assert!(rendered.contains("calls: 1"));
    }
}
