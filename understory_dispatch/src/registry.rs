// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared handler registries.
//!
//! A [`Registry`] holds everything about property handlers that does not
//! depend on a particular dispatcher:
//!
//! - the flattened [`HandlerMap`] of every controller class resolved so far,
//!   built on first request and never invalidated;
//! - one component handler map merging the handlers of every registered
//!   sub-component kind;
//! - the set of property names a text-layout stage consumes.
//!
//! Registries are built once with [`RegistryBuilder`] and shared between
//! dispatchers as `Arc<Registry>`.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::class::{ClassId, ControllerClass};
use crate::component::{ComponentController, ComponentKind};
use crate::handler::{HandlerDescriptor, HandlerMap};

/// A component property: the kind that owns it and its handler.
#[derive(Clone, Debug)]
pub struct ComponentHandler {
    kind: ComponentKind,
    handler: Arc<HandlerDescriptor>,
}

impl ComponentHandler {
    /// Returns the sub-component kind the property belongs to.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// Returns the handler descriptor.
    #[must_use]
    #[inline]
    pub fn handler(&self) -> &Arc<HandlerDescriptor> {
        &self.handler
    }
}

/// Handler maps shared by every dispatcher of a process.
///
/// `Registry` is `Send + Sync`. Class resolution may race between threads;
/// every racer builds an equivalent map, the first one to be stored wins and
/// all callers get that one.
///
/// # Example
///
/// ```rust
/// use understory_dispatch::{ControllerClass, PropDefault, RegistryBuilder};
///
/// #[derive(Default)]
/// struct Widget {
///     opacity: f32,
///     visible: bool,
/// }
///
/// struct ViewController;
/// struct ButtonController;
///
/// const VIEW: ControllerClass = ControllerClass::new::<ViewController>("View", |set| {
///     set.prop("opacity", PropDefault::Number(1.0), |w: &mut Widget, v: f32| w.opacity = v);
/// });
/// const BUTTON: ControllerClass = ControllerClass::new::<ButtonController>("Button", |set| {
///     set.prop("visible", PropDefault::Bool(true), |w: &mut Widget, v: bool| w.visible = v);
/// })
/// .extends(&VIEW);
///
/// let registry = RegistryBuilder::new().build();
/// let handlers = registry.resolve(BUTTON);
/// assert!(handlers.contains("opacity"));
/// assert!(handlers.contains("visible"));
/// assert!(!registry.resolve(VIEW).contains("visible"));
/// ```
pub struct Registry {
    classes: RwLock<HashMap<ClassId, Arc<HandlerMap>>>,
    components: HashMap<&'static str, ComponentHandler>,
    kinds: Vec<ComponentKind>,
    text_properties: HashSet<&'static str>,
}

impl Registry {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Returns the flattened handler map of `class`.
    ///
    /// The first call for a class resolves its ancestors (each cached under
    /// its own class), merges the class's own declarations over the inherited
    /// handlers, and caches the result. Later calls return the cached map.
    pub fn resolve(&self, class: ControllerClass) -> Arc<HandlerMap> {
        let id = class.id();
        if let Some(found) = self.cached(id) {
            return found;
        }

        // Built outside the lock; ancestors resolve (and cache) recursively.
        let mut handlers = match class.parent() {
            Some(parent) => HandlerMap::clone(&self.resolve(*parent)),
            None => HandlerMap::new(),
        };
        handlers.merge(class.declared_handlers());
        debug!(
            class = %id,
            handlers = handlers.len(),
            "built property handler map"
        );

        let built = Arc::new(handlers);
        let mut classes = self.classes.write();
        Arc::clone(classes.entry(id).or_insert(built))
    }

    fn cached(&self, id: ClassId) -> Option<Arc<HandlerMap>> {
        let classes = self.classes.read();
        let (built_for, handlers) = classes.get_key_value(&id)?;
        if built_for.name() != id.name() {
            warn!(
                class = %id,
                built_for = %built_for,
                "classes declared for the same type share one handler map"
            );
        }
        Some(Arc::clone(handlers))
    }

    /// Returns `true` if `class` has already been resolved.
    #[must_use]
    pub fn is_resolved(&self, class: ControllerClass) -> bool {
        self.classes.read().contains_key(&class.id())
    }

    /// Returns the component handler for `property`, if any sub-component kind declares it.
    #[must_use]
    pub fn component_handler(&self, property: &str) -> Option<&ComponentHandler> {
        self.components.get(property)
    }

    /// Returns `true` if `property` is handled by a sub-component kind.
    #[must_use]
    pub fn is_component_property(&self, property: &str) -> bool {
        self.components.contains_key(property)
    }

    /// Returns `true` if text layout consumes `property` on text nodes.
    #[must_use]
    pub fn is_text_property(&self, property: &str) -> bool {
        self.text_properties.contains(property)
    }

    /// Returns the registered sub-component kinds in registration order.
    #[must_use]
    pub fn component_kinds(&self) -> &[ComponentKind] {
        &self.kinds
    }
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("classes", &self.classes.read().keys().collect::<Vec<_>>())
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("kinds", &self.kinds)
            .field("text_properties", &self.text_properties)
            .finish()
    }
}

/// Builder for [`Registry`].
///
/// # Example
///
/// ```rust
/// use understory_dispatch::{
///     ComponentController, ControllerClass, PropDefault, RegistryBuilder,
/// };
///
/// #[derive(Default)]
/// struct Effects;
///
/// #[derive(Default)]
/// struct Layer {
///     shadow: f64,
/// }
///
/// impl ComponentController for Effects {
///     const CLASS: ControllerClass = ControllerClass::new::<Self>("Effects", |set| {
///         set.prop("shadowRadius", PropDefault::Number(0.0), |l: &mut Layer, v: f64| {
///             l.shadow = v;
///         });
///     });
/// }
///
/// struct TextNode;
/// const TEXT: ControllerClass = ControllerClass::new::<TextNode>("Text", |set| {
///     set.prop("fontSize", PropDefault::Number(14.0), |_: &mut Layer, _: f64| {});
/// });
///
/// let registry = RegistryBuilder::new()
///     .component::<Effects>()
///     .text_class(TEXT)
///     .text_property("lineHeight")
///     .build();
///
/// assert!(registry.is_component_property("shadowRadius"));
/// assert!(registry.is_text_property("fontSize"));
/// assert!(registry.is_text_property("lineHeight"));
/// ```
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    kinds: Vec<ComponentKind>,
    text_classes: Vec<ControllerClass>,
    text_properties: Vec<&'static str>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers sub-component kind `K`.
    #[must_use]
    pub fn component<K: ComponentController>(self) -> Self {
        self.component_kind(ComponentKind::of::<K>())
    }

    /// Registers a sub-component kind. Registering a kind twice has no effect.
    #[must_use]
    pub fn component_kind(mut self, kind: ComponentKind) -> Self {
        if !self.kinds.iter().any(|k| k.id() == kind.id()) {
            self.kinds.push(kind);
        }
        self
    }

    /// Marks every property `class` (with its ancestors) handles as consumed
    /// by text layout.
    #[must_use]
    pub fn text_class(mut self, class: ControllerClass) -> Self {
        self.text_classes.push(class);
        self
    }

    /// Marks a single property as consumed by text layout.
    #[must_use]
    pub fn text_property(mut self, property: &'static str) -> Self {
        self.text_properties.push(property);
        self
    }

    /// Builds the registry.
    ///
    /// Component handlers of all kinds are merged here, in registration
    /// order. When two kinds declare the same property the later kind wins
    /// and a warning is logged.
    #[must_use]
    pub fn build(self) -> Registry {
        let mut registry = Registry {
            classes: RwLock::new(HashMap::new()),
            components: HashMap::new(),
            kinds: Vec::new(),
            text_properties: self.text_properties.into_iter().collect(),
        };

        for class in self.text_classes {
            let handlers = registry.resolve(class);
            registry.text_properties.extend(handlers.properties());
        }

        for kind in &self.kinds {
            let handlers = registry.resolve(kind.class());
            for (property, handler) in handlers.iter() {
                let entry = ComponentHandler {
                    kind: *kind,
                    handler: Arc::clone(handler),
                };
                if let Some(shadowed) = registry.components.insert(property, entry) {
                    warn!(
                        property,
                        shadowed = %shadowed.kind.id(),
                        winner = %kind.id(),
                        "component property declared by more than one kind"
                    );
                }
            }
        }
        debug!(
            kinds = self.kinds.len(),
            properties = registry.components.len(),
            text_properties = registry.text_properties.len(),
            "built component handler registry"
        );

        registry.kinds = self.kinds;
        registry
    }
}
