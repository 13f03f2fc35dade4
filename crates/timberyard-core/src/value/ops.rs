//! Path navigation, deep merge and traversal

use std::collections::BTreeSet;

use crate::error::ValueError;

use super::{Object, Value, ValuePath};

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

fn ensure_object(node: &mut Value) -> &mut Object {
    if !node.is_object() {
        *node = Value::object();
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was replaced with an object"),
    }
}

impl Value {
    /// Look up the node at `path`.
    pub fn get(&self, path: impl Into<ValuePath>) -> Result<&Value, ValueError> {
        let path = path.into();
        let mut node = self;
        for segment in path.segments() {
            node = child(node, segment).ok_or_else(|| ValueError::NotFound(path.to_string()))?;
        }
        Ok(node)
    }

    /// Mutable lookup of the node at `path`.
    pub fn get_mut(&mut self, path: impl Into<ValuePath>) -> Result<&mut Value, ValueError> {
        let path = path.into();
        let mut node = self;
        for segment in path.segments() {
            node = child_mut(node, segment)
                .ok_or_else(|| ValueError::NotFound(path.to_string()))?;
        }
        Ok(node)
    }

    /// Look up the node at `path`, falling back to `default` when absent.
    pub fn get_or(&self, path: impl Into<ValuePath>, default: impl Into<Value>) -> Value {
        match self.get(path) {
            Ok(value) => value.clone(),
            Err(_) => default.into(),
        }
    }

    /// Whether a node exists at `path`
    pub fn contains(&self, path: impl Into<ValuePath>) -> bool {
        self.get(path).is_ok()
    }

    /// Node at `path`, creating empty objects along the way.
    ///
    /// Intermediate nodes that are not objects (arrays included) are
    /// replaced by empty objects. A missing target is created as null.
    pub fn entry(&mut self, path: impl Into<ValuePath>) -> &mut Value {
        let path = path.into();
        let mut node = self;
        for segment in path.segments() {
            node = ensure_object(node)
                .entry(segment.clone())
                .or_insert(Value::Null);
        }
        node
    }

    /// Store `value` at `path`, creating intermediates as [`Value::entry`] does.
    pub fn set(&mut self, path: impl Into<ValuePath>, value: impl Into<Value>) {
        *self.entry(path) = value.into();
    }

    /// Remove and return the node at `path`.
    pub fn remove(&mut self, path: impl Into<ValuePath>) -> Option<Value> {
        let mut path = path.into();
        let key = path.pop()?;
        match self.get_mut(path).ok()? {
            Value::Object(map) => map.remove(&key),
            Value::Array(items) => {
                let index = key.parse::<usize>().ok().filter(|i| *i < items.len())?;
                Some(items.remove(index))
            }
            _ => None,
        }
    }

    /// Deep-merge `other` into this node.
    ///
    /// Objects merge key by key, arrays concatenate, anything else is
    /// replaced by a copy of `other`.
    pub fn merge(&mut self, other: &Value) {
        match (self, other) {
            (Value::Object(base), Value::Object(overlay)) => {
                for (key, value) in overlay {
                    match base.get_mut(key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            base.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            (Value::Array(base), Value::Array(overlay)) => {
                base.extend(overlay.iter().cloned());
            }
            (slot, _) => *slot = other.clone(),
        }
    }

    /// Deep-merge `other` into the node at `path`, creating it if needed.
    pub fn merge_at(&mut self, path: impl Into<ValuePath>, other: &Value) {
        self.entry(path).merge(other);
    }

    /// Pre-order walk over every node.
    ///
    /// The visitor may rewrite the node it is given; the children of the
    /// rewritten node are visited afterwards.
    pub fn traverse<F>(&mut self, mut visitor: F)
    where
        F: FnMut(&mut Value, &ValuePath),
    {
        let mut path = ValuePath::root();
        walk(self, &mut path, &mut visitor);
    }

    /// Remove structurally equal duplicates from an array, keeping the
    /// first occurrence. Other variants are left untouched.
    pub fn distinct(&mut self) {
        if let Value::Array(items) = self {
            unique(items);
        }
    }
}

fn walk<F>(node: &mut Value, path: &mut ValuePath, visitor: &mut F)
where
    F: FnMut(&mut Value, &ValuePath),
{
    visitor(node, path);
    match node {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                path.push(key.clone());
                walk(value, path, visitor);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter_mut().enumerate() {
                path.push(index.to_string());
                walk(value, path, visitor);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Remove structural duplicates from `values`, preserving first-seen order.
pub fn unique(values: &mut Vec<Value>) {
    let mut seen = BTreeSet::new();
    values.retain(|value| seen.insert(value.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_get_nested() {
        let tree = value(json!({"a": {"b": [10, {"c": "deep"}]}}));
        assert_eq!(tree.get("a.b.1.c").unwrap(), &Value::from("deep"));
        assert_eq!(tree.get(["a", "b", "0"]).unwrap(), &Value::from(10));
        assert_eq!(tree.get("").unwrap(), &tree);
    }

    #[test]
    fn test_get_not_found() {
        let tree = value(json!({"a": {"b": [1]}, "s": "text"}));
        assert_eq!(
            tree.get("a.x"),
            Err(ValueError::NotFound("a.x".to_string()))
        );
        assert!(tree.get("a.b.5").is_err());
        assert!(tree.get("a.b.first").is_err());
        assert!(tree.get("s.inner").is_err());
    }

    #[test]
    fn test_get_or_never_fails() {
        let tree = value(json!({"a": 1}));
        assert_eq!(tree.get_or("a", 0), Value::from(1));
        assert_eq!(tree.get_or("missing.deep", "fallback"), Value::from("fallback"));
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let mut tree = Value::Null;
        tree.set("meta.commit.id.long", "abc123");
        tree.set(["meta", "branch"], "main");
        assert_eq!(tree.get("meta.commit.id.long").unwrap(), &Value::from("abc123"));
        assert_eq!(tree.get("meta.branch").unwrap(), &Value::from("main"));
    }

    #[test]
    fn test_set_replaces_scalar_intermediates() {
        let mut tree = value(json!({"a": "scalar", "list": [1, 2]}));
        tree.set("a.b", 1);
        tree.set("list.x", true);
        assert_eq!(tree, value(json!({"a": {"b": 1}, "list": {"x": true}})));
    }

    #[test]
    fn test_merge_objects_recursively() {
        let mut base = value(json!({"a": {"x": 1, "y": 2}, "keep": true}));
        base.merge(&value(json!({"a": {"y": 3, "z": 4}})));
        assert_eq!(
            base,
            value(json!({"a": {"x": 1, "y": 3, "z": 4}, "keep": true}))
        );
    }

    #[test]
    fn test_merge_scalar_replaces() {
        let mut base = value(json!({"a": {"x": 1}}));
        base.merge(&value(json!({"a": "flat"})));
        assert_eq!(base, value(json!({"a": "flat"})));

        let mut base = value(json!({"a": "flat"}));
        base.merge(&value(json!({"a": {"x": 1}})));
        assert_eq!(base, value(json!({"a": {"x": 1}})));
    }

    #[test]
    fn test_merge_is_idempotent_without_arrays() {
        let overlay = value(json!({"a": {"b": 1, "c": "s"}, "d": false}));
        let mut once = value(json!({"a": {"b": 0}}));
        once.merge(&overlay);
        let mut twice = once.clone();
        twice.merge(&overlay);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_concatenates_arrays() {
        let overlay = value(json!({"list": [1, 2]}));
        let mut tree = Value::object();
        tree.merge(&overlay);
        tree.merge(&overlay);
        assert_eq!(tree, value(json!({"list": [1, 2, 1, 2]})));
    }

    #[test]
    fn test_merge_at_creates_path() {
        let mut tree = Value::Null;
        tree.merge_at("tasks.build", &value(json!({"type": "build:cmake"})));
        assert_eq!(tree.get("tasks.build.type").unwrap(), &Value::from("build:cmake"));
    }

    #[test]
    fn test_traverse_pre_order_with_paths() {
        let mut tree = value(json!({"a": {"b": 1}, "c": [true]}));
        let mut seen = Vec::new();
        tree.traverse(|_, path| seen.push(path.to_string()));
        assert_eq!(seen, vec!["", "a", "a.b", "c", "c.0"]);
    }

    #[test]
    fn test_traverse_visits_rewritten_children() {
        let mut tree = value(json!({"expand": "me"}));
        let mut seen = Vec::new();
        tree.traverse(|node, path| {
            if node.as_str() == Some("me") {
                *node = value(json!({"inner": 1}));
            }
            seen.push(path.to_string());
        });
        assert_eq!(seen, vec!["", "expand", "expand.inner"]);
    }

    #[test]
    fn test_remove() {
        let mut tree = value(json!({"a": {"b": 1, "c": 2}, "l": [1, 2, 3]}));
        assert_eq!(tree.remove("a.b"), Some(Value::from(1)));
        assert_eq!(tree.remove("l.1"), Some(Value::from(2)));
        assert_eq!(tree.remove("missing"), None);
        assert_eq!(tree, value(json!({"a": {"c": 2}, "l": [1, 3]})));
    }

    #[test]
    fn test_distinct_keeps_first_seen_order() {
        let mut list = value(json!(["b", "a", "b", {"x": 1}, "a", {"x": 1}]));
        list.distinct();
        assert_eq!(list, value(json!(["b", "a", {"x": 1}])));
    }
}
