// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value coercion.
//!
//! Handlers declare the exact parameter type they accept through
//! [`FromProp`]. The declared type is recorded as a [`ParamType`] tag when the
//! handler is registered, and at dispatch time [`coerce`] (for supplied values)
//! or [`coerce_default`] (for declared defaults) turns the untyped input into
//! an [`Arg`] of that exact type.
//!
//! Number conversions never truncate silently: a float only becomes an integer
//! parameter if it is finite, integral and in range, and an integer only
//! becomes a float parameter if the float holds it exactly. Floats narrowed to
//! `f32` take the nearest representable value, but a finite input never
//! narrows to infinity.

use core::fmt;

use crate::error::CoerceError;
use crate::value::{PropertyMap, Value};

/// The parameter type a handler declares.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// `bool`
    Bool,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `String`
    String,
    /// [`PropertyMap`]
    Map,
    /// `Vec<Value>`
    Array,
    /// [`Value`], passed through unconverted.
    Value,
}

impl ParamType {
    /// Returns `true` for the four numeric parameter types.
    #[must_use]
    pub fn is_number(self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F32 | Self::F64)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "String",
            Self::Map => "PropertyMap",
            Self::Array => "Vec<Value>",
            Self::Value => "Value",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A declared default value.
///
/// This is the default kind and its payload in one: a handler either has no
/// default ([`PropDefault::None`], delivering null), or a boolean, number or
/// string default that is converted to the handler's parameter type.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum PropDefault {
    /// No default; an absent property delivers null.
    #[default]
    None,
    /// A boolean default.
    Bool(bool),
    /// A numeric default, converted to the handler's exact number type.
    Number(f64),
    /// A string default.
    String(&'static str),
}

impl PropDefault {
    /// Returns the default as an untyped value.
    #[must_use]
    pub fn to_value(self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Bool(value) => Value::Bool(value),
            Self::Number(value) => Value::Float(value),
            Self::String(value) => Value::String(value.into()),
        }
    }
}

/// A value converted to a handler's exact parameter type.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    /// Null, only accepted by optional parameters.
    Null,
    /// A `bool` argument.
    Bool(bool),
    /// An `i32` argument.
    I32(i32),
    /// An `i64` argument.
    I64(i64),
    /// An `f32` argument.
    F32(f32),
    /// An `f64` argument.
    F64(f64),
    /// A `String` argument.
    String(String),
    /// A [`PropertyMap`] argument.
    Map(PropertyMap),
    /// A `Vec<Value>` argument.
    Array(Vec<Value>),
    /// An unconverted [`Value`] argument.
    Value(Value),
}

impl Arg {
    /// Returns a short name for the kind of this argument.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::Map(_) => "map",
            Self::Array(_) => "array",
            Self::Value(_) => "value",
        }
    }
}

/// Converts a supplied value into an argument of type `param`.
///
/// [`Value::Null`] converts to [`Arg::Null`] for every parameter type; whether
/// null is acceptable is decided by the handler's [`FromProp`] impl.
///
/// # Errors
///
/// Returns a [`CoerceError`] if the value cannot be represented exactly as
/// `param`.
///
/// # Example
///
/// ```rust
/// use understory_dispatch::{Arg, ParamType, Value, coerce};
///
/// assert_eq!(coerce(ParamType::F32, &Value::Int(2)), Ok(Arg::F32(2.0)));
/// assert_eq!(coerce(ParamType::I32, &Value::from(" 7 ")), Ok(Arg::I32(7)));
/// assert!(coerce(ParamType::I32, &Value::Float(1.5)).is_err());
/// assert!(coerce(ParamType::F64, &Value::from("wide")).is_err());
/// ```
pub fn coerce(param: ParamType, value: &Value) -> Result<Arg, CoerceError> {
    match (param, value) {
        (_, Value::Null) => Ok(Arg::Null),
        (ParamType::Value, value) => Ok(Arg::Value(value.clone())),
        (ParamType::Bool, Value::Bool(value)) => Ok(Arg::Bool(*value)),
        (ParamType::String, Value::String(value)) => Ok(Arg::String(value.clone())),
        (ParamType::Map, Value::Map(value)) => Ok(Arg::Map(value.clone())),
        (ParamType::Array, Value::Array(value)) => Ok(Arg::Array(value.clone())),
        (param, Value::Int(value)) if param.is_number() => from_int(param, *value),
        (param, Value::Float(value)) if param.is_number() => from_float(param, *value),
        (param, Value::String(text)) if param.is_number() => from_text(param, text),
        (expected, value) => Err(CoerceError::Mismatch {
            expected,
            found: value.kind_name(),
        }),
    }
}

/// Converts a declared default into an argument of type `param`.
///
/// Defaults take the same path as supplied values, so `PropDefault::Number(0.0)`
/// becomes `Arg::I32(0)` for an `i32` handler and `Arg::F32(0.0)` for an `f32`
/// handler.
///
/// # Errors
///
/// Returns a [`CoerceError`] if the default cannot be represented exactly as
/// `param`, for example a boolean default on a number handler.
pub fn coerce_default(param: ParamType, default: PropDefault) -> Result<Arg, CoerceError> {
    coerce(param, &default.to_value())
}

fn from_int(param: ParamType, value: i64) -> Result<Arg, CoerceError> {
    match param {
        ParamType::I32 => i32::try_from(value)
            .map(Arg::I32)
            .map_err(|_| CoerceError::OutOfRange {
                expected: param,
                value: value.to_string(),
            }),
        ParamType::I64 => Ok(Arg::I64(value)),
        ParamType::F32 => {
            let narrowed = value as f32;
            exact(param, value, f64::from(narrowed)).map(|()| Arg::F32(narrowed))
        }
        ParamType::F64 => {
            let widened = value as f64;
            exact(param, value, widened).map(|()| Arg::F64(widened))
        }
        _ => Err(CoerceError::Mismatch {
            expected: param,
            found: "int",
        }),
    }
}

fn from_float(param: ParamType, value: f64) -> Result<Arg, CoerceError> {
    match param {
        ParamType::F32 => {
            let narrowed = narrow(value);
            if narrowed.is_infinite() && value.is_finite() {
                return Err(CoerceError::OutOfRange {
                    expected: param,
                    value: value.to_string(),
                });
            }
            Ok(Arg::F32(narrowed))
        }
        ParamType::F64 => Ok(Arg::F64(value)),
        ParamType::I32 | ParamType::I64 => {
            if !value.is_finite() || value.fract() != 0.0 {
                return Err(CoerceError::NotIntegral {
                    expected: param,
                    value,
                });
            }
            // 2^63 is exactly representable; every integral float below it fits.
            if !(-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&value) {
                return Err(CoerceError::OutOfRange {
                    expected: param,
                    value: value.to_string(),
                });
            }
            #[expect(clippy::cast_possible_truncation, reason = "integral and in range")]
            let whole = value as i64;
            from_int(param, whole)
        }
        _ => Err(CoerceError::Mismatch {
            expected: param,
            found: "float",
        }),
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "f32 parameters take the nearest representable value"
)]
fn narrow(value: f64) -> f32 {
    value as f32
}

/// Checks that `converted` holds the integer `value` exactly.
fn exact(param: ParamType, value: i64, converted: f64) -> Result<(), CoerceError> {
    // Saturates at 2^127, far outside the i64 range, so only exact values compare equal.
    #[expect(clippy::cast_possible_truncation, reason = "compared against the source")]
    let back = converted as i128;
    if back == i128::from(value) {
        Ok(())
    } else {
        Err(CoerceError::Inexact {
            expected: param,
            value,
        })
    }
}

fn from_text(param: ParamType, text: &str) -> Result<Arg, CoerceError> {
    let trimmed = text.trim();
    let invalid = || CoerceError::InvalidNumber {
        expected: param,
        text: text.to_string(),
    };
    match param {
        ParamType::I32 | ParamType::I64 => match trimmed.parse::<i64>() {
            Ok(value) => from_int(param, value),
            Err(_) => from_float(param, trimmed.parse().map_err(|_| invalid())?),
        },
        _ => from_float(param, trimmed.parse().map_err(|_| invalid())?),
    }
}

/// A type that a property handler can take as its value parameter.
///
/// Each implementation names its [`ParamType`] so the registry can record it
/// when the handler is declared, and extracts itself from the matching
/// [`Arg`] at invocation time.
pub trait FromProp: Sized + 'static {
    /// The parameter type values are coerced to before extraction.
    const PARAM: ParamType;

    /// Whether null (an absent value with no default) is accepted.
    const NULLABLE: bool = false;

    /// Extracts the typed value from a coerced argument.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::Null`] for null on a non-optional parameter and
    /// [`CoerceError::Mismatch`] if `arg` was coerced to another type.
    fn from_arg(arg: Arg) -> Result<Self, CoerceError>;
}

fn unexpected(expected: ParamType, arg: &Arg) -> CoerceError {
    match arg {
        Arg::Null => CoerceError::Null { expected },
        other => CoerceError::Mismatch {
            expected,
            found: other.kind_name(),
        },
    }
}

macro_rules! impl_from_prop {
    ($($ty:ty => $param:ident),* $(,)?) => {
        $(
            impl FromProp for $ty {
                const PARAM: ParamType = ParamType::$param;

                fn from_arg(arg: Arg) -> Result<Self, CoerceError> {
                    match arg {
                        Arg::$param(value) => Ok(value),
                        other => Err(unexpected(Self::PARAM, &other)),
                    }
                }
            }
        )*
    };
}

impl_from_prop! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    String => String,
    PropertyMap => Map,
    Vec<Value> => Array,
}

impl FromProp for Value {
    const PARAM: ParamType = ParamType::Value;
    const NULLABLE: bool = true;

    fn from_arg(arg: Arg) -> Result<Self, CoerceError> {
        match arg {
            Arg::Null => Ok(Self::Null),
            Arg::Value(value) => Ok(value),
            other => Err(unexpected(Self::PARAM, &other)),
        }
    }
}

impl<T: FromProp> FromProp for Option<T> {
    const PARAM: ParamType = T::PARAM;
    const NULLABLE: bool = true;

    fn from_arg(arg: Arg) -> Result<Self, CoerceError> {
        match arg {
            Arg::Null => Ok(None),
            other => T::from_arg(other).map(Some),
        }
    }
}
