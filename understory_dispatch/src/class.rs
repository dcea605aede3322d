// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Controller classes.
//!
//! A [`ControllerClass`] is the static description of one kind of controller:
//! its identity, the class it extends, and a function that declares its
//! property handlers. Classes are plain `const` values, so a hierarchy is
//! written as a chain of constants:
//!
//! ```rust
//! use understory_dispatch::{ControllerClass, PropDefault};
//!
//! #[derive(Default)]
//! struct Widget {
//!     opacity: f32,
//!     text: String,
//! }
//!
//! struct ViewController;
//! struct LabelController;
//!
//! const VIEW: ControllerClass = ControllerClass::new::<ViewController>("View", |set| {
//!     set.prop("opacity", PropDefault::Number(1.0), |w: &mut Widget, v: f32| w.opacity = v);
//! });
//!
//! const LABEL: ControllerClass = ControllerClass::new::<LabelController>("Label", |set| {
//!     set.prop("text", PropDefault::String(""), |w: &mut Widget, v: String| w.text = v);
//! })
//! .extends(&VIEW);
//!
//! assert_eq!(LABEL.parent().map(ControllerClass::name), Some("View"));
//! assert_eq!(LABEL.ancestors().count(), 2);
//! ```

use core::any::{Any, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::handler::HandlerSet;
use crate::value::Value;

/// The identity of a controller class.
///
/// Equality and hashing use the [`TypeId`] of the type the class was declared
/// for; the name is carried along for diagnostics.
#[derive(Copy, Clone)]
pub struct ClassId {
    type_id: TypeId,
    name: &'static str,
}

impl ClassId {
    /// Returns the identity for the class declared for type `C`.
    #[must_use]
    pub fn of<C: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name,
        }
    }

    /// Returns the class name.
    #[must_use]
    #[inline]
    pub fn name(self) -> &'static str {
        self.name
    }

    /// Returns the [`TypeId`] of the type the class was declared for.
    #[must_use]
    #[inline]
    pub fn type_id(self) -> TypeId {
        self.type_id
    }
}

impl PartialEq for ClassId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassId {}

impl Hash for ClassId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassId").field(&self.name).finish()
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Static description of a controller class and its property handlers.
///
/// The handler set of a class is the union of the handlers declared by the
/// class and all of its ancestors, with the class's own declarations taking
/// precedence on name collision. A class without a parent ends the chain.
///
/// The `declare` function is only called when the
/// [`Registry`](crate::Registry) first resolves the class.
#[derive(Copy, Clone)]
pub struct ControllerClass {
    type_id: fn() -> TypeId,
    name: &'static str,
    parent: Option<&'static Self>,
    declare: fn(&mut HandlerSet),
}

impl ControllerClass {
    /// Creates a class for controller type `C` with the given handler declarations.
    ///
    /// `C` is the class identity: declare at most one class per type. The
    /// registry caches handler maps by type, so a second class declared for
    /// the same `C` resolves to whichever map was built first (and a warning
    /// is logged when the names differ).
    #[must_use]
    pub const fn new<C: 'static>(name: &'static str, declare: fn(&mut HandlerSet)) -> Self {
        Self {
            type_id: TypeId::of::<C>,
            name,
            parent: None,
            declare,
        }
    }

    /// Creates a class for controller type `C` that declares no handlers of its own.
    #[must_use]
    pub const fn empty<C: 'static>(name: &'static str) -> Self {
        Self::new::<C>(name, no_handlers)
    }

    /// Makes this class extend `parent`, inheriting its handlers.
    #[must_use]
    pub const fn extends(mut self, parent: &'static Self) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Returns the identity of this class.
    #[must_use]
    pub fn id(&self) -> ClassId {
        ClassId {
            type_id: (self.type_id)(),
            name: self.name,
        }
    }

    /// Returns the class name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the class this one extends, if any.
    #[must_use]
    #[inline]
    pub fn parent(&self) -> Option<&'static Self> {
        self.parent
    }

    /// Iterates over this class and its ancestors, most specific first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Self> + '_ {
        core::iter::successors(Some(self), |class| class.parent)
    }

    /// Runs the handler declarations of this class alone, without ancestors.
    #[must_use]
    pub fn declared_handlers(&self) -> HandlerSet {
        let mut set = HandlerSet::new(self.id());
        (self.declare)(&mut set);
        set
    }
}

fn no_handlers(_: &mut HandlerSet) {}

impl fmt::Debug for ControllerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerClass")
            .field("name", &self.name)
            .field("parent", &self.parent.map(|p| p.name))
            .finish_non_exhaustive()
    }
}

/// A primary or custom controller that properties are dispatched through.
///
/// The controller names its [`ControllerClass`]; the dispatcher resolves the
/// class's handler set once and reuses it for every controller of that class.
///
/// # Example
///
/// ```rust
/// use core::any::Any;
/// use understory_dispatch::{Controller, ControllerClass, Value};
///
/// #[derive(Default)]
/// struct Widget {
///     extras: Vec<String>,
/// }
///
/// struct ViewController;
///
/// impl ViewController {
///     const CLASS: ControllerClass = ControllerClass::empty::<Self>("View");
/// }
///
/// impl Controller for ViewController {
///     fn class(&self) -> ControllerClass {
///         Self::CLASS
///     }
///
///     fn set_custom_prop(&mut self, view: &mut dyn Any, name: &str, _value: &Value) -> bool {
///         match view.downcast_mut::<Widget>() {
///             Some(widget) => {
///                 widget.extras.push(name.to_string());
///                 true
///             }
///             None => false,
///         }
///     }
/// }
/// ```
pub trait Controller: Any {
    /// Returns the class whose handlers apply to this controller.
    fn class(&self) -> ControllerClass;

    /// Applies a property no declared handler claimed, unconverted.
    ///
    /// Returns `false` if the controller does not take untyped properties,
    /// which is the default; the property is then dropped.
    fn set_custom_prop(&mut self, view: &mut dyn Any, name: &str, value: &Value) -> bool {
        let _ = (view, name, value);
        false
    }

    /// Returns the owner for handlers inherited from the ancestor `class`.
    ///
    /// Handlers declared with
    /// [`HandlerSet::prop_with_owner`](crate::HandlerSet::prop_with_owner) on
    /// the controller's own class receive the controller itself. Handlers an
    /// ancestor declared expect that ancestor's controller type, so a
    /// subclass controller embedding its parent's state returns it here.
    /// Returns `None` by default, and such handlers are then reported as
    /// [`DispatchError::Receiver`](crate::DispatchError::Receiver).
    ///
    /// ```rust
    /// use core::any::Any;
    /// use understory_dispatch::{ClassId, Controller, ControllerClass, PropDefault};
    ///
    /// #[derive(Default)]
    /// struct Widget {
    ///     opacity: f32,
    /// }
    ///
    /// #[derive(Default)]
    /// struct ViewController {
    ///     changes: u32,
    /// }
    ///
    /// const VIEW: ControllerClass = ControllerClass::new::<ViewController>("View", |set| {
    ///     set.prop_with_owner(
    ///         "opacity",
    ///         PropDefault::Number(1.0),
    ///         |c: &mut ViewController, w: &mut Widget, v: f32| {
    ///             c.changes += 1;
    ///             w.opacity = v;
    ///         },
    ///     );
    /// });
    ///
    /// #[derive(Default)]
    /// struct ButtonController {
    ///     view: ViewController,
    /// }
    ///
    /// impl Controller for ButtonController {
    ///     fn class(&self) -> ControllerClass {
    ///         const BUTTON: ControllerClass =
    ///             ControllerClass::empty::<ButtonController>("Button").extends(&VIEW);
    ///         BUTTON
    ///     }
    ///
    ///     fn owner_for(&mut self, class: ClassId) -> Option<&mut dyn Any> {
    ///         let view: &mut dyn Any = &mut self.view;
    ///         (class == VIEW.id()).then_some(view)
    ///     }
    /// }
    /// ```
    fn owner_for(&mut self, class: ClassId) -> Option<&mut dyn Any> {
        let _ = class;
        None
    }
}
