//! `${path}` reference resolution
//!
//! Every string in the merged tree is scanned for `${`. A reference that
//! spans the whole string is replaced by the typed value it names; otherwise
//! the value's string form is spliced into the surrounding text. Referenced
//! values are resolved before they are substituted, so chains work, and a
//! reference back to any node currently being resolved is rejected as a cycle.

use crate::error::ConfigError;
use crate::value::{Array, Object, Value, ValuePath};

const OPEN: &str = "${";
const CLOSE: char = '}';

/// Resolve every reference in `tree`, returning the resolved copy.
pub(crate) fn resolve(tree: &Value) -> Result<Value, ConfigError> {
    let mut resolved = tree.clone();
    let mut in_progress = Vec::new();
    resolve_node(&mut resolved, &mut ValuePath::root(), &mut in_progress)?;
    Ok(resolved)
}

/// Resolve the node at `path` in place, then its children.
fn resolve_node(
    root: &mut Value,
    path: &mut ValuePath,
    in_progress: &mut Vec<String>,
) -> Result<(), ConfigError> {
    let pending = match root.get(&*path) {
        Ok(Value::String(text)) if text.contains(OPEN) => Some(text.clone()),
        _ => None,
    };

    if let Some(text) = pending {
        in_progress.push(path.to_string());
        let value = interpolate(root, &text, in_progress);
        in_progress.pop();
        let value = value?;
        if let Ok(slot) = root.get_mut(&*path) {
            *slot = value;
        }
    }

    let children: Vec<String> = match root.get(&*path) {
        Ok(Value::Object(map)) => map.keys().cloned().collect(),
        Ok(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => return Ok(()),
    };

    for key in children {
        path.push(key);
        resolve_node(root, path, in_progress)?;
        path.pop();
    }
    Ok(())
}

/// Substitute the references in one string.
fn interpolate(
    root: &Value,
    text: &str,
    in_progress: &mut Vec<String>,
) -> Result<Value, ConfigError> {
    let Some(start) = text.find(OPEN) else {
        return Ok(Value::from(text));
    };
    let Some(length) = text[start + OPEN.len()..].find(CLOSE) else {
        return Ok(Value::from(text));
    };
    let end = start + OPEN.len() + length;
    let reference = &text[start + OPEN.len()..end];

    let value = lookup(root, reference, in_progress)?;
    if start == 0 && end == text.len() - 1 {
        return Ok(value);
    }

    let rest = interpolate(root, &text[end + 1..], in_progress)?;
    Ok(Value::String(format!("{}{}{}", &text[..start], value, rest)))
}

/// Fully resolved copy of the value a reference names, or null.
fn lookup(
    root: &Value,
    reference: &str,
    in_progress: &mut Vec<String>,
) -> Result<Value, ConfigError> {
    let path = ValuePath::parse(reference.trim());
    match root.get(&path) {
        Ok(value) => resolve_detached(root, value, &path, in_progress),
        Err(_) => Ok(Value::Null),
    }
}

/// Resolve a copy of `value`, which lives at `at` in `root`.
fn resolve_detached(
    root: &Value,
    value: &Value,
    at: &ValuePath,
    in_progress: &mut Vec<String>,
) -> Result<Value, ConfigError> {
    match value {
        Value::String(text) if text.contains(OPEN) => {
            let key = at.to_string();
            if in_progress.contains(&key) {
                let mut chain = in_progress.clone();
                chain.push(key);
                return Err(ConfigError::CyclicReference(chain.join(" -> ")));
            }
            in_progress.push(key);
            let resolved = interpolate(root, text, in_progress);
            in_progress.pop();
            resolved
        }
        Value::Object(map) => {
            let mut out = Object::new();
            for (key, child) in map {
                let child = resolve_detached(root, child, &at.child(key.clone()), in_progress)?;
                out.insert(key.clone(), child);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Array::with_capacity(items.len());
            for (index, child) in items.iter().enumerate() {
                out.push(resolve_detached(root, child, &at.child(index.to_string()), in_progress)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}
