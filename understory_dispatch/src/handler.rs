// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property handlers.
//!
//! This module provides [`HandlerDescriptor`], the immutable record for one
//! declared handler, [`HandlerSet`] for declaring the handlers of a class,
//! and [`HandlerMap`], the flattened name → descriptor map of a class.
//!
//! Handlers are typed closures. Declaring one records the parameter type of
//! its value argument (through [`FromProp`]) and wraps the closure in a
//! type-erased setter that downcasts its receivers at invocation time.

use core::any::{Any, type_name};
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::class::ClassId;
use crate::coerce::{Arg, FromProp, ParamType, PropDefault, coerce, coerce_default};
use crate::error::{HandlerId, InvokeError};
use crate::value::Value;

/// Type-erased setter: `(owner, target, argument)`.
type Setter = dyn Fn(&mut dyn Any, &mut dyn Any, Arg) -> Result<(), InvokeError> + Send + Sync;

/// Immutable description of one property handler.
///
/// Descriptors are shared (`Arc`) between the handler map of the declaring
/// class and the maps of every class that extends it, so a property resolves
/// to the same descriptor everywhere it is inherited.
pub struct HandlerDescriptor {
    property: &'static str,
    owner: ClassId,
    default: PropDefault,
    param: ParamType,
    nullable: bool,
    setter: Box<Setter>,
}

impl HandlerDescriptor {
    /// Returns the property name this handler applies.
    #[must_use]
    #[inline]
    pub fn property(&self) -> &'static str {
        self.property
    }

    /// Returns the class that declared this handler.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> ClassId {
        self.owner
    }

    /// Returns the identity used in error reports.
    #[must_use]
    pub fn id(&self) -> HandlerId {
        HandlerId::new(self.owner, self.property)
    }

    /// Returns the declared default.
    #[must_use]
    #[inline]
    pub fn default(&self) -> PropDefault {
        self.default
    }

    /// Returns the parameter type values are converted to.
    #[must_use]
    #[inline]
    pub fn param_type(&self) -> ParamType {
        self.param
    }

    /// Returns whether the handler accepts null.
    #[must_use]
    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Converts `value` and applies it.
    ///
    /// A missing or null value applies the declared default instead.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::Coerce`] if the value or default cannot be
    /// converted, and [`InvokeError::Receiver`] if `owner` or `target` is not
    /// the type the handler was declared for. The handler is not called in
    /// either case.
    pub fn invoke(
        &self,
        owner: &mut dyn Any,
        target: &mut dyn Any,
        value: Option<&Value>,
    ) -> Result<(), InvokeError> {
        let arg = match value {
            None | Some(Value::Null) => coerce_default(self.param, self.default)?,
            Some(value) => coerce(self.param, value)?,
        };
        (self.setter)(owner, target, arg)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("property", &self.property)
            .field("owner", &self.owner)
            .field("default", &self.default)
            .field("param", &self.param)
            .field("nullable", &self.nullable)
            .finish_non_exhaustive()
    }
}

/// The handlers declared by one class.
///
/// A `HandlerSet` is handed to the `declare` function of a
/// [`ControllerClass`](crate::ControllerClass). Declaring the same property
/// twice keeps the later declaration.
///
/// # Example
///
/// ```rust
/// use understory_dispatch::{ControllerClass, PropDefault};
///
/// #[derive(Default)]
/// struct Image {
///     source: Option<String>,
///     radius: f32,
/// }
///
/// struct ImageController;
///
/// const IMAGE: ControllerClass = ControllerClass::new::<ImageController>("Image", |set| {
///     set.prop("src", PropDefault::None, |img: &mut Image, v: Option<String>| img.source = v)
///         .prop("borderRadius", PropDefault::Number(0.0), |img: &mut Image, v: f32| {
///             img.radius = v;
///         });
/// });
///
/// let set = IMAGE.declared_handlers();
/// assert_eq!(set.len(), 2);
/// ```
pub struct HandlerSet {
    owner: ClassId,
    handlers: Vec<Arc<HandlerDescriptor>>,
}

impl HandlerSet {
    pub(crate) fn new(owner: ClassId) -> Self {
        Self {
            owner,
            handlers: Vec::new(),
        }
    }

    /// Returns the class these handlers are declared for.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> ClassId {
        self.owner
    }

    /// Declares a handler that sets `property` on a target of type `T`.
    ///
    /// The value parameter type `A` decides how supplied values and `default`
    /// are converted.
    pub fn prop<T, A, F>(
        &mut self,
        property: &'static str,
        default: PropDefault,
        setter: F,
    ) -> &mut Self
    where
        T: Any,
        A: FromProp,
        F: Fn(&mut T, A) + Send + Sync + 'static,
    {
        self.push::<A>(
            property,
            default,
            Box::new(move |_: &mut dyn Any, target: &mut dyn Any, arg: Arg| -> Result<(), InvokeError> {
                let target = downcast::<T>(target)?;
                setter(target, A::from_arg(arg)?);
                Ok(())
            }),
        )
    }

    /// Declares a handler that also receives the controller that owns it.
    ///
    /// The owner is the controller instance the property is dispatched
    /// through: the primary or custom controller for view handlers, or the
    /// dispatcher's instance of the sub-component controller for component
    /// handlers.
    ///
    /// When the property is dispatched through a subclass, the owner is
    /// whatever the subclass controller returns from
    /// [`Controller::owner_for`](crate::Controller::owner_for) (or
    /// [`ComponentController::owner_for`](crate::ComponentController::owner_for))
    /// for this class. A subclass that does not provide one gets a
    /// [`DispatchError::Receiver`](crate::DispatchError::Receiver) for the
    /// property.
    pub fn prop_with_owner<O, T, A, F>(
        &mut self,
        property: &'static str,
        default: PropDefault,
        setter: F,
    ) -> &mut Self
    where
        O: Any,
        T: Any,
        A: FromProp,
        F: Fn(&mut O, &mut T, A) + Send + Sync + 'static,
    {
        self.push::<A>(
            property,
            default,
            Box::new(move |owner: &mut dyn Any, target: &mut dyn Any, arg: Arg| -> Result<(), InvokeError> {
                let owner = downcast::<O>(owner)?;
                let target = downcast::<T>(target)?;
                setter(owner, target, A::from_arg(arg)?);
                Ok(())
            }),
        )
    }

    fn push<A: FromProp>(
        &mut self,
        property: &'static str,
        default: PropDefault,
        setter: Box<Setter>,
    ) -> &mut Self {
        self.handlers.push(Arc::new(HandlerDescriptor {
            property,
            owner: self.owner,
            default,
            param: A::PARAM,
            nullable: A::NULLABLE,
            setter,
        }));
        self
    }

    /// Returns the number of declarations.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if nothing has been declared.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Iterates over the declared property names in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|h| h.property)
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("owner", &self.owner)
            .field("properties", &self.properties().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn downcast<T: Any>(receiver: &mut dyn Any) -> Result<&mut T, InvokeError> {
    receiver.downcast_mut::<T>().ok_or(InvokeError::Receiver {
        expected: type_name::<T>(),
    })
}

/// The flattened handlers of a class: its own declarations merged over those
/// of its ancestors.
#[derive(Clone, Debug, Default)]
pub struct HandlerMap {
    handlers: HashMap<&'static str, Arc<HandlerDescriptor>>,
}

impl HandlerMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handler for `property`.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Arc<HandlerDescriptor>> {
        self.handlers.get(property)
    }

    /// Returns `true` if a handler exists for `property`.
    #[must_use]
    pub fn contains(&self, property: &str) -> bool {
        self.handlers.contains_key(property)
    }

    /// Returns the number of handlers.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if the map holds no handlers.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Iterates over the property names in unspecified order.
    pub fn properties(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Iterates over `(property, descriptor)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Arc<HandlerDescriptor>)> + '_ {
        self.handlers.iter().map(|(name, handler)| (*name, handler))
    }

    /// Merges a class's own declarations over this map; declarations win.
    pub(crate) fn merge(&mut self, declared: HandlerSet) {
        for handler in declared.handlers {
            self.handlers.insert(handler.property, handler);
        }
    }
}
