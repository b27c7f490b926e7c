//! Conversion of typed call arguments into JSON snapshots.
//!
//! Every recorded call stores its inputs as `serde_json::Value`s so that a
//! history can be rendered without knowing the wrapped function's types.
//! Capturing never fails: values that refuse to serialize are stored as an
//! `<unserializable: ...>` marker and reported back to the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const DEFAULT_MAX_VALUE_BYTES: usize = 64 * 1024;

/// Limits applied to every captured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePolicy {
    /// Values whose compact JSON exceeds this are replaced by a hash marker.
    pub max_value_bytes: usize,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
        }
    }
}

impl CapturePolicy {
    pub fn snapshot<T: Serialize + ?Sized>(&self, value: &T) -> Result<Value, String> {
        let value = serde_json::to_value(value).map_err(|e| e.to_string())?;
        Ok(self.bound(value))
    }

    fn bound(&self, value: Value) -> Value {
        let rendered = serde_json::to_string(&value).unwrap_or_default();
        if rendered.len() <= self.max_value_bytes {
            return value;
        }
        let hash = Sha256::digest(rendered.as_bytes());
        // first 8 bytes (16 hex chars)
        Value::String(format!("<hash:sha256:{}>", hex_bytes(&hash[..8])))
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Positional and named inputs of a single call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Inputs {
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

/// Accumulates the snapshot of one call's inputs.
pub struct Capture<'a> {
    policy: &'a CapturePolicy,
    inputs: Inputs,
    fallbacks: Vec<String>,
}

impl<'a> Capture<'a> {
    pub fn new(policy: &'a CapturePolicy) -> Self {
        Self {
            policy,
            inputs: Inputs::default(),
            fallbacks: Vec::new(),
        }
    }

    pub fn arg<T: Serialize + ?Sized>(&mut self, value: &T) {
        let value = self.value(value);
        self.inputs.args.push(value);
    }

    pub fn kwarg<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        let value = self.value(value);
        self.inputs.kwargs.insert(key.to_string(), value);
    }

    /// Spreads a value that serializes to a JSON object into named inputs.
    /// `()` and unit structs contribute nothing.
    pub fn kwargs_object<T: Serialize + ?Sized>(&mut self, value: &T) {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => {
                for (key, value) in map {
                    let value = self.policy.bound(value);
                    self.inputs.kwargs.insert(key, value);
                }
            }
            Ok(Value::Null) => {}
            Ok(other) => self.fallbacks.push(format!(
                "keyword arguments must serialize to an object, got {}",
                json_kind(&other)
            )),
            Err(error) => self.fallbacks.push(error.to_string()),
        }
    }

    /// Snapshots a value under this capture's policy, noting any fallback.
    pub fn value<T: Serialize + ?Sized>(&mut self, value: &T) -> Value {
        match self.policy.snapshot(value) {
            Ok(value) => value,
            Err(error) => {
                let marker = Value::String(format!("<unserializable: {error}>"));
                self.fallbacks.push(error);
                marker
            }
        }
    }

    /// Returns the captured inputs and any fallback notes.
    pub fn finish(self) -> (Inputs, Vec<String>) {
        (self.inputs, self.fallbacks)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Argument types a recorder can snapshot.
pub trait CallInputs {
    fn capture_into(&self, capture: &mut Capture<'_>);
}

impl CallInputs for () {
    fn capture_into(&self, _capture: &mut Capture<'_>) {}
}

macro_rules! impl_call_inputs_for_tuple {
    ($($idx:tt : $name:ident),+) => {
        impl<$($name: Serialize),+> CallInputs for ($($name,)+) {
            fn capture_into(&self, capture: &mut Capture<'_>) {
                $(capture.arg(&self.$idx);)+
            }
        }
    };
}

impl_call_inputs_for_tuple!(0: A);
impl_call_inputs_for_tuple!(0: A, 1: B);
impl_call_inputs_for_tuple!(0: A, 1: B, 2: C);
impl_call_inputs_for_tuple!(0: A, 1: B, 2: C, 3: D);
impl_call_inputs_for_tuple!(0: A, 1: B, 2: C, 3: D, 4: E);
impl_call_inputs_for_tuple!(0: A, 1: B, 2: C, 3: D, 4: E, 5: F);
impl_call_inputs_for_tuple!(0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G);
impl_call_inputs_for_tuple!(0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H);

/// Dynamic inputs, for callables that take pre-built argument lists.
impl CallInputs for Inputs {
    fn capture_into(&self, capture: &mut Capture<'_>) {
        for value in &self.args {
            capture.arg(value);
        }
        for (key, value) in &self.kwargs {
            capture.kwarg(key, value);
        }
    }
}

/// Positional arguments `P` plus named arguments `N`.
///
/// `N` is usually a small `#[derive(Serialize)]` struct or a
/// `BTreeMap<String, _>`; each field becomes one keyword argument.
#[derive(Debug, Clone, PartialEq)]
pub struct WithKwargs<P, N> {
    pub args: P,
    pub kwargs: N,
}

pub fn with_kwargs<P, N>(args: P, kwargs: N) -> WithKwargs<P, N> {
    WithKwargs { args, kwargs }
}

impl<P: CallInputs, N: Serialize> CallInputs for WithKwargs<P, N> {
    fn capture_into(&self, capture: &mut Capture<'_>) {
        self.args.capture_into(capture);
        capture.kwargs_object(&self.kwargs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn capture_of(inputs: &impl CallInputs) -> (Inputs, Vec<String>) {
        let policy = CapturePolicy::default();
        let mut capture = Capture::new(&policy);
        inputs.capture_into(&mut capture);
        capture.finish()
    }

    #[derive(Serialize)]
    struct Opts {
        ttl: u32,
        tag: &'static str,
    }

    #[test]
    fn tuple_arguments_become_positional_values() {
        let (inputs, fallbacks) = capture_of(&("hello", 3, true));
        assert_eq!(inputs.args, vec![json!("hello"), json!(3), json!(true)]);
        assert!(inputs.kwargs.is_empty());
        assert!(fallbacks.is_empty());
    }

    #[test]
    fn unit_captures_nothing() {
        let (inputs, _) = capture_of(&());
        assert_eq!(inputs, Inputs::default());
    }

    #[test]
    fn kwargs_struct_spreads_into_named_values() {
        let (inputs, fallbacks) = capture_of(&with_kwargs(("k",), Opts { ttl: 10, tag: "x" }));
        assert_eq!(inputs.args, vec![json!("k")]);
        assert_eq!(inputs.kwargs.get("ttl"), Some(&json!(10)));
        assert_eq!(inputs.kwargs.get("tag"), Some(&json!("x")));
        assert!(fallbacks.is_empty());
    }

    #[test]
    fn non_object_kwargs_are_reported_not_fatal() {
        let (inputs, fallbacks) = capture_of(&with_kwargs((), 5));
        assert!(inputs.kwargs.is_empty());
        assert_eq!(fallbacks.len(), 1);
        assert!(fallbacks[0].contains("number"));
    }

    #[test]
    fn unserializable_values_become_markers() {
        let mut bad = std::collections::HashMap::new();
        bad.insert((1, 2), "tuple keys are not valid json keys");
        let (inputs, fallbacks) = capture_of(&(bad,));
        assert_eq!(fallbacks.len(), 1);
        let marker = inputs.args[0].as_str().expect("marker string");
        assert!(marker.starts_with("<unserializable: "));
    }

    #[test]
    fn oversized_values_are_replaced_by_hash_marker() {
        let policy = CapturePolicy {
            max_value_bytes: 16,
        };
        let value = policy.snapshot(&"x".repeat(100)).expect("snapshot");
        let text = value.as_str().expect("marker string");
        assert!(text.starts_with("<hash:sha256:"));
        assert_eq!(text.len(), "<hash:sha256:>".len() + 16);

        let small = policy.snapshot("tiny").expect("snapshot");
        assert_eq!(small, json!("tiny"));
    }
}
