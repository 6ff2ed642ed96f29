//! Evaluation context
//!
//! A [`Context`] maps reference names to the value (or error code) currently
//! known for them. It is the only state passed between evaluation passes. A
//! pass reads one context and produces a new one; nothing patches a context
//! that someone else is reading.

use crate::value::{ErrorCode, EvalResult, Value};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Mapping from reference name to value or error code
///
/// Backed by a `BTreeMap` so iteration order is stable across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    entries: BTreeMap<String, EvalResult>,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for a reference
    pub fn get(&self, reference: &str) -> Option<&EvalResult> {
        self.entries.get(reference)
    }

    /// Look up a reference, yielding the value only when it is not an error
    pub fn value(&self, reference: &str) -> Option<&Value> {
        self.entries.get(reference).and_then(|e| e.as_ref().ok())
    }

    /// Look up a reference, yielding the error code only when it is an error
    pub fn error(&self, reference: &str) -> Option<ErrorCode> {
        match self.entries.get(reference) {
            Some(Err(code)) => Some(*code),
            _ => None,
        }
    }

    /// Check whether a reference has an entry
    pub fn contains(&self, reference: &str) -> bool {
        self.entries.contains_key(reference)
    }

    /// Store an entry, returning the previous one
    pub fn insert(&mut self, reference: impl Into<String>, entry: EvalResult) -> Option<EvalResult> {
        self.entries.insert(reference.into(), entry)
    }

    /// Store a plain value
    pub fn set(&mut self, reference: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(reference.into(), Ok(value.into()));
    }

    /// Remove an entry
    pub fn remove(&mut self, reference: &str) -> Option<EvalResult> {
        self.entries.remove(reference)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the context has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in reference-name order
    pub fn iter(&self) -> btree_map::Iter<'_, String, EvalResult> {
        self.entries.iter()
    }

    /// Iterate over entries holding an error code
    pub fn errors(&self) -> impl Iterator<Item = (&str, ErrorCode)> + '_ {
        self.entries.iter().filter_map(|(k, v)| match v {
            Err(code) => Some((k.as_str(), *code)),
            Ok(_) => None,
        })
    }

    /// Copy of the successfully computed values only
    pub fn values_only(&self) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().ok().map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

impl FromIterator<(String, EvalResult)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, EvalResult)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<(String, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        iter.into_iter().map(|(k, v)| (k, Ok(v))).collect()
    }
}

impl Extend<(String, EvalResult)> for Context {
    fn extend<I: IntoIterator<Item = (String, EvalResult)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for Context {
    type Item = (String, EvalResult);
    type IntoIter = btree_map::IntoIter<String, EvalResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = (&'a String, &'a EvalResult);
    type IntoIter = btree_map::Iter<'a, String, EvalResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    //! An entry serializes as the bare value, or as `{"error": "#TAG"}`.

    use super::Context;
    use crate::value::{ErrorCode, Value};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    #[serde(untagged)]
    enum EntryRef<'a> {
        Error { error: ErrorCode },
        Value(&'a Value),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Error { error: ErrorCode },
        Value(Value),
    }

    impl Serialize for Context {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_map(self.entries.iter().map(|(k, v)| {
                let entry = match v {
                    Ok(value) => EntryRef::Value(value),
                    Err(code) => EntryRef::Error { error: *code },
                };
                (k, entry)
            }))
        }
    }

    impl<'de> Deserialize<'de> for Context {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let raw = BTreeMap::<String, Entry>::deserialize(deserializer)?;
            Ok(raw
                .into_iter()
                .map(|(k, entry)| match entry {
                    Entry::Error { error } => (k, Err(error)),
                    Entry::Value(value) => (k, Ok(value)),
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut ctx = Context::new();
        ctx.set("A", 5.0);
        ctx.insert("B", Err(ErrorCode::DivisionByZero));

        assert_eq!(ctx.value("A"), Some(&Value::Number(5.0)));
        assert_eq!(ctx.error("A"), None);
        assert_eq!(ctx.error("B"), Some(ErrorCode::DivisionByZero));
        assert_eq!(ctx.value("B"), None);
        assert!(ctx.get("C").is_none());
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let ctx: Context = vec![
            ("b".to_string(), Value::Number(2.0)),
            ("a".to_string(), Value::Number(1.0)),
        ]
        .into_iter()
        .collect();

        let keys: Vec<&str> = ctx.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_errors_and_values_only() {
        let mut ctx = Context::new();
        ctx.set("ok", 1.0);
        ctx.insert("bad", Err(ErrorCode::TypeMismatch));

        let errors: Vec<_> = ctx.errors().collect();
        assert_eq!(errors, vec![("bad", ErrorCode::TypeMismatch)]);
        assert_eq!(ctx.values_only().len(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip() {
        let json = r##"{"a": 1, "b": {"error": "#CYCLE!"}, "c": "x"}"##;
        let ctx: Context = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.value("a"), Some(&Value::Number(1.0)));
        assert_eq!(ctx.error("b"), Some(ErrorCode::DependencyCycle));

        let back = serde_json::to_value(&ctx).unwrap();
        assert_eq!(back["b"]["error"], "#CYCLE!");
        assert_eq!(back["c"], "x");
    }
}
