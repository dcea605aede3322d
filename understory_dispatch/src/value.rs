// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic property values.
//!
//! This module provides [`Value`], the untyped value carried by a property
//! update, and [`PropertyMap`], the name → value mapping handed to the
//! dispatcher for one update pass.

use hashbrown::HashMap;
use hashbrown::hash_map::Iter;

/// An untyped property value.
///
/// Values arrive from outside the dispatcher (already decoded from whatever
/// wire format the host uses) and are converted to each handler's declared
/// parameter type by [`coerce`](crate::coerce()).
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// An absent value. Dispatch treats it exactly like a missing property
    /// and applies the handler's declared default.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An integral number.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered list of values.
    Array(Vec<Self>),
    /// A nested property map (for example a `style` sub-object).
    Map(PropertyMap),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the nested map, if this value is one.
    #[must_use]
    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns a short name for the kind of this value, used in error reports.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Self>> for Value {
    fn from(value: Vec<Self>) -> Self {
        Self::Array(value)
    }
}

impl From<PropertyMap> for Value {
    fn from(value: PropertyMap) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A mapping from property name to [`Value`].
///
/// Keys are unique and iteration order is unspecified; dispatch makes no
/// ordering promise between distinct properties of one pass.
///
/// # Example
///
/// ```rust
/// use understory_dispatch::{PropertyMap, Value};
///
/// let style: PropertyMap = [("opacity", Value::from(0.5))].into_iter().collect();
/// let mut props = PropertyMap::new();
/// props.insert("style", style);
/// props.insert("visible", true);
///
/// assert_eq!(props.len(), 2);
/// assert_eq!(props.get("visible"), Some(&Value::Bool(true)));
/// assert!(props.get("style").and_then(Value::as_map).is_some());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyMap {
    entries: HashMap<String, Value>,
}

impl PropertyMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value for `name` if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(name.into(), value.into())
    }

    /// Removes a property, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(name)
    }

    /// Returns the value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Returns `true` if the map holds `name`, even with a null value.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the number of properties.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map holds no properties.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in unspecified order.
    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a PropertyMap {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for PropertyMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.entries.extend(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
    }
}
