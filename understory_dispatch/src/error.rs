// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dispatch errors and the reporting channel.
//!
//! Nothing in a dispatch pass is fatal. A property whose value cannot be
//! applied produces one [`DispatchError`], which goes to the dispatcher's
//! [`ErrorSink`]; the pass then continues with the remaining properties.

use core::fmt;

use thiserror::Error;
use tracing::warn;

use crate::class::ClassId;
use crate::coerce::ParamType;

/// Why a value could not be converted to a handler's parameter type.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CoerceError {
    /// The value kind has no conversion to the parameter type.
    #[error("expected {expected}, found {found}")]
    Mismatch {
        /// The declared parameter type.
        expected: ParamType,
        /// The kind of the supplied value.
        found: &'static str,
    },

    /// A non-integral or non-finite number for an integer parameter.
    #[error("{value} cannot be converted to {expected} without truncation")]
    NotIntegral {
        /// The declared parameter type.
        expected: ParamType,
        /// The supplied number.
        value: f64,
    },

    /// A number outside the range of the parameter type.
    #[error("{value} is out of range for {expected}")]
    OutOfRange {
        /// The declared parameter type.
        expected: ParamType,
        /// The supplied number, formatted.
        value: String,
    },

    /// An integer the float parameter type cannot hold exactly.
    #[error("{value} cannot be represented exactly as {expected}")]
    Inexact {
        /// The declared parameter type.
        expected: ParamType,
        /// The supplied integer.
        value: i64,
    },

    /// A string that does not hold a number, for a number parameter.
    #[error("{text:?} is not a valid {expected}")]
    InvalidNumber {
        /// The declared parameter type.
        expected: ParamType,
        /// The supplied string.
        text: String,
    },

    /// Null for a parameter that is not optional.
    #[error("null is not a valid {expected}")]
    Null {
        /// The declared parameter type.
        expected: ParamType,
    },
}

/// Failure of a single handler invocation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum InvokeError {
    /// The value or default could not be converted.
    #[error(transparent)]
    Coerce(#[from] CoerceError),

    /// The owner or target object is not the type the handler was declared for.
    #[error("receiver is not a `{expected}`")]
    Receiver {
        /// The type name the handler expected.
        expected: &'static str,
    },
}

/// Identity of a property handler: the class that declared it and its property name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId {
    owner: ClassId,
    property: &'static str,
}

impl HandlerId {
    /// Creates a handler identity.
    #[must_use]
    pub fn new(owner: ClassId, property: &'static str) -> Self {
        Self { owner, property }
    }

    /// Returns the class that declared the handler.
    #[must_use]
    #[inline]
    pub fn owner(self) -> ClassId {
        self.owner
    }

    /// Returns the property name the handler was declared for.
    #[must_use]
    #[inline]
    pub fn property(self) -> &'static str {
        self.property
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.property)
    }
}

/// A recoverable per-property failure reported during dispatch.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DispatchError {
    /// The supplied value or declared default could not be converted.
    #[error("failed to convert property `{property}` for {handler}")]
    Conversion {
        /// The property being applied.
        property: String,
        /// The handler that rejected it.
        handler: HandlerId,
        /// The underlying conversion failure.
        #[source]
        source: CoerceError,
    },

    /// The handler was handed an owner or target of the wrong concrete type.
    #[error("cannot apply property `{property}` with {handler}: receiver is not a `{expected}`")]
    Receiver {
        /// The property being applied.
        property: String,
        /// The handler that was invoked.
        handler: HandlerId,
        /// The type name the handler expected.
        expected: &'static str,
    },
}

impl DispatchError {
    pub(crate) fn from_invoke(error: InvokeError, property: &str, handler: HandlerId) -> Self {
        let property = property.to_string();
        match error {
            InvokeError::Coerce(source) => Self::Conversion {
                property,
                handler,
                source,
            },
            InvokeError::Receiver { expected } => Self::Receiver {
                property,
                handler,
                expected,
            },
        }
    }

    /// Returns the name of the property that failed.
    #[must_use]
    pub fn property(&self) -> &str {
        match self {
            Self::Conversion { property, .. } | Self::Receiver { property, .. } => property,
        }
    }

    /// Returns the identity of the handler that failed.
    #[must_use]
    pub fn handler(&self) -> HandlerId {
        match self {
            Self::Conversion { handler, .. } | Self::Receiver { handler, .. } => *handler,
        }
    }
}

/// Receives the recoverable failures of dispatch passes.
///
/// Any `Fn(DispatchError)` closure is a sink.
pub trait ErrorSink {
    /// Reports one failure. Dispatch continues after this returns.
    fn report(&self, error: DispatchError);
}

impl<F: Fn(DispatchError)> ErrorSink for F {
    fn report(&self, error: DispatchError) {
        self(error);
    }
}

/// An [`ErrorSink`] that emits every report as a `tracing` warning.
///
/// This is the sink a dispatcher uses unless another one is configured.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, error: DispatchError) {
        match &error {
            DispatchError::Conversion {
                property,
                handler,
                source,
            } => warn!(%property, %handler, cause = %source, "property conversion failed"),
            DispatchError::Receiver {
                property,
                handler,
                expected,
            } => warn!(%property, %handler, expected, "property handler receiver mismatch"),
        }
    }
}
