// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sub-component controllers.
//!
//! Some properties are not applied to a node's view but to a shared
//! sub-component (visual effects, image overlays, ...) that several node kinds
//! can carry. Each sub-component kind has a controller type implementing
//! [`ComponentController`]; its handlers are merged into the registry's single
//! component handler map, and every dispatcher keeps at most one lazily
//! created controller instance per kind.

use core::any::Any;
use core::fmt;

use smallvec::SmallVec;

use crate::class::{ClassId, ControllerClass};

/// Default inline capacity for per-dispatcher component controllers.
///
/// Hosts typically register a visual-effects kind and an image-overlay kind.
const INLINE_CAPACITY: usize = 2;

/// A shared sub-component controller.
///
/// Handlers of a component class are usually declared with
/// [`HandlerSet::prop_with_owner`](crate::HandlerSet::prop_with_owner), so they
/// receive the dispatcher's controller instance alongside the component the
/// node provides.
pub trait ComponentController: Any + Default {
    /// The class declaring this controller's handlers.
    const CLASS: ControllerClass;

    /// Returns the owner for handlers inherited from the ancestor `class`.
    ///
    /// Same contract as [`Controller::owner_for`](crate::Controller::owner_for):
    /// a component class extending another returns the embedded ancestor
    /// controller here. Returns `None` by default.
    fn owner_for(&mut self, class: ClassId) -> Option<&mut dyn Any> {
        let _ = class;
        None
    }
}

/// A registered sub-component kind: its class and how to create its controller.
#[derive(Copy, Clone)]
pub struct ComponentKind {
    class: ControllerClass,
    create: fn() -> Box<dyn Any>,
    owner: fn(&mut dyn Any, ClassId) -> Option<&mut dyn Any>,
}

impl ComponentKind {
    /// Returns the kind for controller type `K`.
    #[must_use]
    pub fn of<K: ComponentController>() -> Self {
        Self {
            class: K::CLASS,
            create: create_controller::<K>,
            owner: inherited_owner::<K>,
        }
    }

    /// Returns the identity of this kind.
    #[must_use]
    pub fn id(&self) -> ClassId {
        self.class.id()
    }

    /// Returns the class of this kind.
    #[must_use]
    #[inline]
    pub fn class(&self) -> ControllerClass {
        self.class
    }

    /// Returns the owner `controller` hands to handlers declared by `class`.
    ///
    /// `controller` is this kind's controller instance, as created by the pool.
    pub(crate) fn owner_for<'a>(
        &self,
        controller: &'a mut dyn Any,
        class: ClassId,
    ) -> Option<&'a mut dyn Any> {
        if class == self.id() {
            return Some(controller);
        }
        (self.owner)(controller, class)
    }
}

fn create_controller<K: ComponentController>() -> Box<dyn Any> {
    Box::new(K::default())
}

fn inherited_owner<K: ComponentController>(
    controller: &mut dyn Any,
    class: ClassId,
) -> Option<&mut dyn Any> {
    controller.downcast_mut::<K>()?.owner_for(class)
}

impl fmt::Debug for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentKind").field(&self.class.name()).finish()
    }
}

/// The controller instances one dispatcher has created, at most one per kind.
#[derive(Default)]
pub(crate) struct ComponentPool {
    controllers: SmallVec<[(ClassId, Box<dyn Any>); INLINE_CAPACITY]>,
}

impl ComponentPool {
    /// Returns the controller for `kind`, creating it on first use.
    pub(crate) fn controller_for(&mut self, kind: &ComponentKind) -> &mut dyn Any {
        let id = kind.id();
        let index = match self.controllers.iter().position(|(k, _)| *k == id) {
            Some(index) => index,
            None => {
                tracing::debug!(kind = %id, "creating component controller");
                self.controllers.push((id, (kind.create)()));
                self.controllers.len() - 1
            }
        };
        &mut *self.controllers[index].1
    }

    /// Returns the controller for `id` if it has been created.
    pub(crate) fn get(&self, id: ClassId) -> Option<&dyn Any> {
        self.controllers
            .iter()
            .find(|(k, _)| *k == id)
            .map(|(_, controller)| &**controller)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.controllers.len()
    }
}

impl fmt::Debug for ComponentPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentPool")
            .field(
                "kinds",
                &self.controllers.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Effects {
        applied: u32,
    }

    impl ComponentController for Effects {
        const CLASS: ControllerClass = ControllerClass::empty::<Self>("Effects");
    }

    #[derive(Default)]
    struct Overlay;

    impl ComponentController for Overlay {
        const CLASS: ControllerClass = ControllerClass::empty::<Self>("Overlay");
    }

    #[derive(Default)]
    struct Shadows {
        effects: Effects,
    }

    impl ComponentController for Shadows {
        const CLASS: ControllerClass =
            ControllerClass::empty::<Self>("Shadows").extends(&Effects::CLASS);

        fn owner_for(&mut self, class: ClassId) -> Option<&mut dyn Any> {
            let effects: &mut dyn Any = &mut self.effects;
            (class == Effects::CLASS.id()).then_some(effects)
        }
    }

    #[test]
    fn owner_for_inherited_classes() {
        let shadows = ComponentKind::of::<Shadows>();
        let overlay = ComponentKind::of::<Overlay>();
        let mut pool = ComponentPool::default();

        let controller = pool.controller_for(&shadows);
        assert!(
            shadows
                .owner_for(controller, Shadows::CLASS.id())
                .is_some_and(|owner| owner.is::<Shadows>())
        );
        let controller = pool.controller_for(&shadows);
        shadows
            .owner_for(controller, Effects::CLASS.id())
            .and_then(|owner| owner.downcast_mut::<Effects>())
            .unwrap()
            .applied += 1;

        let controller = pool.controller_for(&overlay);
        assert!(overlay.owner_for(controller, Effects::CLASS.id()).is_none());

        let created = pool.get(shadows.id()).unwrap();
        assert_eq!(created.downcast_ref::<Shadows>().unwrap().effects.applied, 1);
    }

    #[test]
    fn kind_identity() {
        let kind = ComponentKind::of::<Effects>();
        assert_eq!(kind.id(), Effects::CLASS.id());
        assert_eq!(kind.class().name(), "Effects");
        assert_eq!(format!("{kind:?}"), "ComponentKind(\"Effects\")");
    }

    #[test]
    fn pool_creates_once_per_kind() {
        let effects = ComponentKind::of::<Effects>();
        let overlay = ComponentKind::of::<Overlay>();
        let mut pool = ComponentPool::default();
        assert!(pool.get(effects.id()).is_none());

        pool.controller_for(&effects)
            .downcast_mut::<Effects>()
            .unwrap()
            .applied += 1;
        pool.controller_for(&effects)
            .downcast_mut::<Effects>()
            .unwrap()
            .applied += 1;
        assert_eq!(pool.len(), 1);

        pool.controller_for(&overlay);
        assert_eq!(pool.len(), 2);

        let created = pool.get(effects.id()).unwrap();
        assert_eq!(created.downcast_ref::<Effects>().unwrap().applied, 2);
        assert!(format!("{pool:?}").contains("Overlay"));
    }
}
