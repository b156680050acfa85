//! Builtin parameter types.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::value::Value;

use super::{DEFAULT_TYPE, TypeRegistry, Validator};

/// Register the builtin type set into `registry`.
pub(super) fn register(registry: &mut TypeRegistry) {
    // Scalar bases.
    registry.add_type("i", r"[+-]?%D+%T", Some(convert_integer()), false);
    registry.add_type(
        "n",
        r"[+-]?%D+(?:\.%D*)?(?:[eE][+-]?%D+)?%T",
        Some(convert_float()),
        false,
    );
    registry.add_type(
        "s",
        r#"(?:"(?:\\.|[^"\\])*"|\S+)%T"#,
        Some(unquote(false)),
        false,
    );
    registry.add_type(
        "qs",
        r#"(?:"(?:\\.|[^"\\])*"|\S+)%T"#,
        Some(unquote(true)),
        false,
    );
    registry.add_type("id", r"[A-Za-z_]\w*%T", None, false);

    // A parameter with no declared type is a plain string.
    registry.add_type(DEFAULT_TYPE, "s", None, true);

    // Filesystem types layer a check over the string base.
    registry.add_type("if", "s", Some(readable_file()), true);
    registry.add_type("of", "s", Some(writable_file()), true);
    registry.add_type("dir", "s", Some(readable_dir()), true);

    // Derived numeric constraints.
    registry.add_type("+i", "i", Some(require_int(|i| i > 0, "a positive integer")), true);
    registry.add_type("+n", "n", Some(require_float(|f| f > 0.0, "a positive number")), true);
    registry.add_type(
        "0+i",
        "i",
        Some(require_int(|i| i >= 0, "a non-negative integer")),
        true,
    );
    registry.add_type(
        "0+n",
        "n",
        Some(require_float(|f| f >= 0.0, "a non-negative number")),
        true,
    );
}

fn convert_integer() -> Validator {
    Arc::new(|name, value| {
        let raw = value.as_str().unwrap_or_default();
        raw.parse::<i64>()
            .map(|i| Some(Value::Int(i)))
            .map_err(|_| format!("parameter `{name}` is not an integer (got `{raw}`)"))
    })
}

fn convert_float() -> Validator {
    Arc::new(|name, value| {
        let raw = value.as_str().unwrap_or_default();
        raw.parse::<f64>()
            .map(|f| Some(Value::Float(f)))
            .map_err(|_| format!("parameter `{name}` is not a number (got `{raw}`)"))
    })
}

/// Strip surrounding double quotes; with `process_escapes`, also collapse
/// backslash escapes in the quoted form.
fn unquote(process_escapes: bool) -> Validator {
    Arc::new(move |_name, value| {
        let raw = match value.as_str() {
            Some(s) => s,
            None => return Ok(None),
        };
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            let inner = &raw[1..raw.len() - 1];
            let text = if process_escapes {
                let mut out = String::with_capacity(inner.len());
                let mut chars = inner.chars();
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else {
                        out.push(c);
                    }
                }
                out
            } else {
                inner.to_string()
            };
            Ok(Some(Value::Str(text)))
        } else {
            Ok(None)
        }
    })
}

fn readable_file() -> Validator {
    Arc::new(|name, value| {
        let path = value.as_str().unwrap_or_default();
        if path == "-" {
            return Ok(None);
        }
        if fs::File::open(path).is_ok() {
            Ok(None)
        } else {
            Err(format!("parameter `{name}`: cannot read file `{path}`"))
        }
    })
}

fn writable_file() -> Validator {
    Arc::new(|name, value| {
        let path = value.as_str().unwrap_or_default();
        if path == "-" || !Path::new(path).exists() {
            return Ok(None);
        }
        match fs::metadata(path) {
            Ok(meta) if !meta.permissions().readonly() => Ok(None),
            _ => Err(format!("parameter `{name}`: cannot write file `{path}`")),
        }
    })
}

fn readable_dir() -> Validator {
    Arc::new(|name, value| {
        let path = value.as_str().unwrap_or_default();
        if fs::read_dir(path).is_ok() {
            Ok(None)
        } else {
            Err(format!("parameter `{name}`: cannot read directory `{path}`"))
        }
    })
}

fn require_int(ok: impl Fn(i64) -> bool + Send + Sync + 'static, what: &'static str) -> Validator {
    Arc::new(move |name, value| match value.as_int() {
        Some(i) if ok(i) => Ok(None),
        Some(i) => Err(format!("parameter `{name}` must be {what} (got {i})")),
        None => Err(format!("parameter `{name}` must be {what}")),
    })
}

fn require_float(ok: impl Fn(f64) -> bool + Send + Sync + 'static, what: &'static str) -> Validator {
    Arc::new(move |name, value| match value.as_float() {
        Some(f) if ok(f) => Ok(None),
        Some(f) => Err(format!("parameter `{name}` must be {what} (got {f})")),
        None => Err(format!("parameter `{name}` must be {what}")),
    })
}
