//! Key/value options store
//!
//! Options carry extension and override settings alongside resources,
//! metrics, auth and decoder definitions. Values are a tagged union of the
//! scalar kinds a TOML or DSL source can express, plus nested maps.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// OPTION VALUES
// ============================================================================

/// A single value held by an options store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Map(OptionsMap),
}

impl OptionValue {
    /// Name of the value kind, as reported by `StoreError::InvalidType`.
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Boolean(_) => "boolean",
            OptionValue::Integer(_) => "integer",
            OptionValue::Float(_) => "float",
            OptionValue::String(_) => "string",
            OptionValue::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Boolean(b) => write!(f, "{}", b),
            OptionValue::Integer(i) => write!(f, "{}", i),
            OptionValue::Float(x) => write!(f, "{}", x),
            OptionValue::String(s) => write!(f, "{:?}", s),
            OptionValue::Map(m) => {
                write!(f, "{{")?;
                for (i, key) in m.keys().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if let Some(value) = m.entries.get(key) {
                        write!(f, "{}: {}", key, value)?;
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Boolean(value)
    }
}

impl From<OptionsMap> for OptionValue {
    fn from(value: OptionsMap) -> Self {
        OptionValue::Map(value)
    }
}

impl TryFrom<toml::Value> for OptionValue {
    type Error = &'static str;

    /// Arrays and datetimes have no option representation; the error is the
    /// name of the offending TOML kind.
    fn try_from(value: toml::Value) -> Result<Self, Self::Error> {
        match value {
            toml::Value::String(s) => Ok(OptionValue::String(s)),
            toml::Value::Integer(i) => Ok(OptionValue::Integer(i)),
            toml::Value::Float(x) => Ok(OptionValue::Float(x)),
            toml::Value::Boolean(b) => Ok(OptionValue::Boolean(b)),
            toml::Value::Table(table) => {
                let mut map = OptionsMap::new();
                for (key, value) in table {
                    map.entries.insert(key, OptionValue::try_from(value)?);
                }
                Ok(OptionValue::Map(map))
            }
            toml::Value::Array(_) => Err("array"),
            toml::Value::Datetime(_) => Err("datetime"),
        }
    }
}

impl From<OptionValue> for toml::Value {
    fn from(value: OptionValue) -> Self {
        match value {
            OptionValue::Boolean(b) => toml::Value::Boolean(b),
            OptionValue::Integer(i) => toml::Value::Integer(i),
            OptionValue::Float(x) => toml::Value::Float(x),
            OptionValue::String(s) => toml::Value::String(s),
            OptionValue::Map(m) => toml::Value::Table(
                m.entries
                    .into_iter()
                    .map(|(k, v)| (k, toml::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// A mergeable key/value store.
///
/// `get_object`/`set_object`/`keys` are the primitives; everything else is
/// expressed on top of them so any backing store gets the same typed access,
/// clone and merge behaviour.
pub trait KeyValueStore {
    /// Return the value saved for `key`, or `StoreError::NotFound`.
    fn get_object(&self, key: &str) -> StoreResult<OptionValue>;

    /// Save `value` under `key`, returning whether the key already existed.
    fn set_object(&mut self, key: &str, value: OptionValue) -> StoreResult<bool>;

    /// All saved keys, sorted.
    fn keys(&self) -> Vec<String>;

    /// Return the string saved for `key`.
    ///
    /// Fails with `InvalidType` when the stored value is not a string and
    /// propagates `NotFound` from `get_object`.
    fn get_string(&self, key: &str) -> StoreResult<String> {
        match self.get_object(key)? {
            OptionValue::String(s) => Ok(s),
            other => Err(StoreError::InvalidType {
                key: key.to_string(),
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    fn set_string(&mut self, key: &str, value: &str) -> StoreResult<bool> {
        self.set_object(key, OptionValue::from(value))
    }

    /// Copy every value into a fresh in-memory store.
    fn clone_store(&self) -> StoreResult<OptionsMap> {
        let mut clone = OptionsMap::new();
        merge_stores_inplace(&mut clone, self)?;
        Ok(clone)
    }
}

/// Update key/values in `dst` with those in `src`, overwriting on conflict.
///
/// Stops at the first read or write failure.
pub fn merge_stores_inplace<D, S>(dst: &mut D, src: &S) -> StoreResult<()>
where
    D: KeyValueStore + ?Sized,
    S: KeyValueStore + ?Sized,
{
    for key in src.keys() {
        let value = src.get_object(&key)?;
        dst.set_object(&key, value)?;
    }
    Ok(())
}

/// Create a new store with the content of `src1` and `src2` merged.
///
/// `src2` wins on key conflicts, so specific settings override shared defaults.
pub fn merge_stores_in_a_new_one<A, B>(src1: &A, src2: &B) -> StoreResult<OptionsMap>
where
    A: KeyValueStore + ?Sized,
    B: KeyValueStore + ?Sized,
{
    let mut merged = OptionsMap::new();
    merge_stores_inplace(&mut merged, src1)?;
    merge_stores_inplace(&mut merged, src2)?;
    Ok(merged)
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory key/value store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionsMap {
    entries: HashMap<String, OptionValue>,
}

impl OptionsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Store `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Option<OptionValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.entries.iter()
    }
}

impl KeyValueStore for OptionsMap {
    fn get_object(&self, key: &str) -> StoreResult<OptionValue> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn set_object(&mut self, key: &str, value: OptionValue) -> StoreResult<bool> {
        Ok(self.entries.insert(key.to_string(), value).is_some())
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for OptionsMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// TOML tables are stores too, which lets raw `[options]` sections be merged
/// without first deserializing them.
impl KeyValueStore for toml::Table {
    fn get_object(&self, key: &str) -> StoreResult<OptionValue> {
        let value = self.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        OptionValue::try_from(value).map_err(|found| StoreError::InvalidType {
            key: key.to_string(),
            expected: "scalar or table",
            found,
        })
    }

    fn set_object(&mut self, key: &str, value: OptionValue) -> StoreResult<bool> {
        Ok(self
            .insert(key.to_string(), toml::Value::from(value))
            .is_some())
    }

    fn keys(&self) -> Vec<String> {
        // toml::Table is ordered by key already
        self.iter().map(|(k, _)| k.clone()).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
