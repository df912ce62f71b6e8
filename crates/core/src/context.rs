//! The context map shared between phases, sessions and tools.
//!
//! Context is an open string-keyed JSON map. Fields every phase relies on are
//! accessed through typed [`ContextKey`]s so a wrong shape is caught at the
//! accessor instead of deep inside a prompt; anything else stays in the
//! residual map untouched.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Open context map (phase data, session context, context updates).
pub type ContextMap = serde_json::Map<String, serde_json::Value>;

/// A typed handle to a well-known context field.
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> std::fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ContextKey").field(&self.name).finish()
    }
}

impl<T> ContextKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Serialize + DeserializeOwned> ContextKey<T> {
    /// Read the field, `None` when absent or of the wrong shape.
    pub fn get(&self, map: &ContextMap) -> Option<T> {
        self.try_get(map).ok().flatten()
    }

    /// Read the field, distinguishing "absent" from "wrong shape".
    pub fn try_get(&self, map: &ContextMap) -> Result<Option<T>, serde_json::Error> {
        match map.get(self.name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some),
        }
    }

    pub fn set(&self, map: &mut ContextMap, value: T) -> Result<(), serde_json::Error> {
        map.insert(self.name.to_string(), serde_json::to_value(value)?);
        Ok(())
    }
}

/// Well-known context fields.
pub mod keys {
    use super::ContextKey;

    /// The user input a workflow run starts from.
    pub const INPUT: ContextKey<String> = ContextKey::new("input");
}

/// Shallow-merge `updates` into `target`. Keys in `updates` win; untouched
/// keys persist.
pub fn merge_context(target: &mut ContextMap, updates: &ContextMap) {
    for (key, value) in updates {
        target.insert(key.clone(), value.clone());
    }
}

/// JSON truthiness: null, false, 0, "" and empty collections are false.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}
