//! Small helpers for reading and transforming `ToolArgs` values.

use dataguard_core::ToolArgs;
use serde_json::Value;

/// Read a string field, defaulting to `""` if absent or non-string.
pub(crate) fn str_field<'a>(args: &'a ToolArgs, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Clone `args` and set `key` to `value`.
pub(crate) fn with_field(args: &ToolArgs, key: &str, value: Value) -> ToolArgs {
    let mut out = args.clone();
    out.insert(key.to_string(), value);
    out
}

/// Recursively apply `f` to every string value reachable from `value`,
/// preserving object key order and array order.
pub(crate) fn map_strings(value: &Value, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| map_strings(v, f)).collect()),
        Value::Object(obj) => {
            let mut out = ToolArgs::new();
            for (k, v) in obj {
                out.insert(k.clone(), map_strings(v, f));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Apply [`map_strings`] across an entire `ToolArgs` map.
pub(crate) fn map_strings_in_args(args: &ToolArgs, f: &dyn Fn(&str) -> String) -> ToolArgs {
    match map_strings(&Value::Object(args.clone()), f) {
        Value::Object(obj) => obj,
        _ => unreachable!("map_strings preserves the Object variant"),
    }
}
