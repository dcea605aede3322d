// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The property dispatcher.
//!
//! A [`Dispatcher`] applies one property map to one node per call of
//! [`Dispatcher::update_properties`]. Each property takes the first path
//! that claims it, in this order:
//!
//! 1. text nodes skip properties that text layout already applied;
//! 2. a handler of the controller's class, applied to the view;
//! 3. the nested style map, dispatched as a whole with the same arguments;
//! 4. a sub-component handler, applied to the node's component
//!    (or only marked as consumed while component properties are skipped);
//! 5. the custom controller's handlers, then the controller's untyped
//!    [`set_custom_prop`](Controller::set_custom_prop).
//!
//! A property no path claims is dropped.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::class::{ClassId, Controller};
use crate::component::{ComponentController, ComponentPool};
use crate::error::{DispatchError, ErrorSink, LogSink};
use crate::handler::{HandlerDescriptor, HandlerMap};
use crate::node::{NodeKind, RenderNode};
use crate::registry::Registry;
use crate::value::{PropertyMap, Value};

/// Per-dispatcher settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// The property whose map value is dispatched as a nested property map.
    pub style_key: &'static str,
    /// The `force` argument passed to [`RenderNode::create_view`] when a
    /// view handler needs a view the caller did not pass.
    pub force_view_creation: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            style_key: "style",
            force_view_creation: true,
        }
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    registry: Arc<Registry>,
    config: DispatchConfig,
    sink: Box<dyn ErrorSink>,
    custom: Option<Box<dyn Controller>>,
}

impl DispatcherBuilder {
    /// Creates a builder for a dispatcher over `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            config: DispatchConfig::default(),
            sink: Box::new(LogSink),
            custom: None,
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the reserved nested-style property name.
    #[must_use]
    pub fn style_key(mut self, key: &'static str) -> Self {
        self.config.style_key = key;
        self
    }

    /// Sets whether missing views are created on demand.
    #[must_use]
    pub fn force_view_creation(mut self, force: bool) -> Self {
        self.config.force_view_creation = force;
        self
    }

    /// Sets where conversion failures are reported. Defaults to [`LogSink`].
    #[must_use]
    pub fn error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Sets the custom controller.
    #[must_use]
    pub fn custom_controller(mut self, controller: Box<dyn Controller>) -> Self {
        self.custom = Some(controller);
        self
    }

    /// Builds the dispatcher.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            registry: self.registry,
            config: self.config,
            sink: self.sink,
            components: ComponentPool::default(),
            custom: self.custom,
        }
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("config", &self.config)
            .field("custom", &self.custom.as_ref().map(|c| c.class().name()))
            .finish_non_exhaustive()
    }
}

/// Applies property maps to render nodes.
///
/// A dispatcher owns its sub-component controllers and its custom
/// controller; the handler registry is shared. Dispatch is single-threaded:
/// every operation that can create state takes `&mut self`.
///
/// # Example
///
/// ```rust
/// use core::any::Any;
/// use std::sync::Arc;
///
/// use understory_dispatch::{
///     Controller, ControllerClass, Dispatcher, PropDefault, PropertyMap, RegistryBuilder,
///     RenderNode,
/// };
///
/// #[derive(Default)]
/// struct Widget {
///     opacity: f32,
/// }
///
/// #[derive(Default)]
/// struct Node {
///     view: Option<Widget>,
/// }
///
/// impl RenderNode for Node {
///     fn create_view(&mut self, force: bool) -> Option<&mut dyn Any> {
///         if force && self.view.is_none() {
///             self.view = Some(Widget::default());
///         }
///         self.view.as_mut().map(|w| w as &mut dyn Any)
///     }
/// }
///
/// struct ViewController;
///
/// impl ViewController {
///     const CLASS: ControllerClass = ControllerClass::new::<Self>("View", |set| {
///         set.prop("opacity", PropDefault::Number(1.0), |w: &mut Widget, v: f32| w.opacity = v);
///     });
/// }
///
/// impl Controller for ViewController {
///     fn class(&self) -> ControllerClass {
///         Self::CLASS
///     }
/// }
///
/// let mut dispatcher = Dispatcher::new(Arc::new(RegistryBuilder::new().build()));
/// let mut node = Node::default();
///
/// let mut style = PropertyMap::new();
/// style.insert("opacity", 0.5);
/// let mut props = PropertyMap::new();
/// props.insert("style", style);
///
/// dispatcher.update_properties(&mut node, &mut ViewController, None, Some(&props), false);
/// assert_eq!(node.view.unwrap().opacity, 0.5);
/// ```
pub struct Dispatcher {
    registry: Arc<Registry>,
    config: DispatchConfig,
    sink: Box<dyn ErrorSink>,
    components: ComponentPool,
    custom: Option<Box<dyn Controller>>,
}

impl Dispatcher {
    /// Creates a dispatcher with the default configuration, reporting to [`LogSink`].
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        DispatcherBuilder::new(registry).build()
    }

    /// Returns a builder for a dispatcher over `registry`.
    #[must_use]
    pub fn builder(registry: Arc<Registry>) -> DispatcherBuilder {
        DispatcherBuilder::new(registry)
    }

    /// Returns the shared registry.
    #[must_use]
    #[inline]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the configuration.
    #[must_use]
    #[inline]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Returns `true` if `name` is handled by a registered sub-component kind.
    #[must_use]
    pub fn is_component_property(&self, name: &str) -> bool {
        self.registry.is_component_property(name)
    }

    /// Sets or clears the custom controller, returning the previous one.
    pub fn set_custom_controller(
        &mut self,
        controller: Option<Box<dyn Controller>>,
    ) -> Option<Box<dyn Controller>> {
        core::mem::replace(&mut self.custom, controller)
    }

    /// Returns the custom controller, if one is set.
    #[must_use]
    pub fn custom_controller(&self) -> Option<&dyn Controller> {
        self.custom.as_deref()
    }

    /// Returns this dispatcher's controller for sub-component kind `K`, if it
    /// has been created.
    #[must_use]
    pub fn component_controller<K: ComponentController>(&self) -> Option<&K> {
        self.components
            .get(K::CLASS.id())
            .and_then(|controller| controller.downcast_ref::<K>())
    }

    /// Applies `props` to `node`.
    ///
    /// `view` is the node's view if the caller has it; otherwise view
    /// handlers ask the node to create one. The custom path only runs when
    /// `view` is given. With `skip_component_props`, properties handled by
    /// sub-components are consumed without being applied.
    ///
    /// Failures are reported to the error sink and never stop the pass.
    pub fn update_properties<N: RenderNode + ?Sized>(
        &mut self,
        node: &mut N,
        controller: &mut dyn Controller,
        view: Option<&mut dyn Any>,
        props: Option<&PropertyMap>,
        skip_component_props: bool,
    ) {
        let Some(props) = props.filter(|props| !props.is_empty()) else {
            return;
        };
        self.apply(node, controller, view, props, skip_component_props);
    }

    fn apply<N: RenderNode + ?Sized>(
        &mut self,
        node: &mut N,
        controller: &mut dyn Controller,
        mut view: Option<&mut dyn Any>,
        props: &PropertyMap,
        skip_component_props: bool,
    ) {
        let handlers = self.registry.resolve(controller.class());
        let custom_handlers = self
            .custom
            .as_deref()
            .map(|custom| self.registry.resolve(custom.class()));
        let text_node = node.kind() == NodeKind::Text;

        for (name, value) in props {
            let name = name.as_str();
            if text_node && self.registry.is_text_property(name) {
                trace!(property = name, "skipping property applied by text layout");
                continue;
            }

            if let Some(handler) = handlers.get(name) {
                let target = match view.as_deref_mut() {
                    Some(view) => Some(view),
                    None => node.create_view(self.config.force_view_creation),
                };
                match target {
                    Some(target) => {
                        let owner = controller_owner(&mut *controller, handler.owner());
                        invoke(&*self.sink, handler, owner, target, name, value);
                    }
                    None => trace!(property = name, "view not ready, property deferred"),
                }
                continue;
            }

            if name == self.config.style_key
                && let Value::Map(nested) = value
            {
                trace!(property = name, len = nested.len(), "dispatching nested style");
                self.apply(
                    node,
                    &mut *controller,
                    view.as_deref_mut(),
                    nested,
                    skip_component_props,
                );
                continue;
            }

            if self.apply_component(node, name, value, skip_component_props) {
                continue;
            }

            self.apply_custom(
                &mut *controller,
                custom_handlers.as_deref(),
                view.as_deref_mut(),
                name,
                value,
            );
        }
    }

    /// Returns `true` if a sub-component consumed the property.
    fn apply_component<N: RenderNode + ?Sized>(
        &mut self,
        node: &mut N,
        name: &str,
        value: &Value,
        skip_component_props: bool,
    ) -> bool {
        let Some(entry) = self.registry.component_handler(name) else {
            return false;
        };
        if skip_component_props {
            trace!(property = name, "component property suppressed");
            return true;
        }

        let kind = entry.kind();
        let Some(component) = node.ensure_component(kind.id()) else {
            trace!(
                property = name,
                kind = %kind.id(),
                "node provides no component"
            );
            return false;
        };
        let controller = self.components.controller_for(kind);
        let owner = kind.owner_for(controller, entry.handler().owner());
        invoke(&*self.sink, entry.handler(), owner, component, name, value);
        true
    }

    fn apply_custom(
        &mut self,
        controller: &mut dyn Controller,
        custom_handlers: Option<&HandlerMap>,
        view: Option<&mut dyn Any>,
        name: &str,
        value: &Value,
    ) {
        let Some(view) = view else {
            trace!(property = name, "no view for custom property, dropped");
            return;
        };

        if let Some(custom) = self.custom.as_deref_mut()
            && let Some(handler) = custom_handlers.and_then(|handlers| handlers.get(name))
        {
            let owner = controller_owner(custom, handler.owner());
            invoke(&*self.sink, handler, owner, view, name, value);
            return;
        }

        if !controller.set_custom_prop(view, name, value) {
            trace!(property = name, "unhandled property dropped");
        }
    }
}

/// Returns the owner `controller` hands to handlers declared by `class`.
fn controller_owner(controller: &mut dyn Controller, class: ClassId) -> Option<&mut dyn Any> {
    if controller.class().id() == class {
        let owner: &mut dyn Any = controller;
        return Some(owner);
    }
    controller.owner_for(class)
}

/// Stands in for an owner the controller could not provide.
struct NoOwner;

/// Calls `handler`, reporting failure to `sink`.
///
/// Without an owner the handler gets a placeholder, which only handlers that
/// ignore their owner accept.
fn invoke(
    sink: &dyn ErrorSink,
    handler: &HandlerDescriptor,
    owner: Option<&mut dyn Any>,
    target: &mut dyn Any,
    name: &str,
    value: &Value,
) {
    let mut detached = NoOwner;
    let owner = owner.unwrap_or(&mut detached);
    if let Err(error) = handler.invoke(owner, target, Some(value)) {
        sink.report(DispatchError::from_invoke(error, name, handler.id()));
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("components", &self.components)
            .field("custom", &self.custom.as_ref().map(|c| c.class().name()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassId, ControllerClass};
    use crate::coerce::PropDefault;
    use crate::registry::RegistryBuilder;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default, PartialEq)]
    struct Widget {
        opacity: f32,
        width: i32,
        extras: Vec<String>,
    }

    #[derive(Default)]
    struct Layer {
        blur: f64,
    }

    #[derive(Default)]
    struct Node {
        kind: NodeKind,
        view: Option<Widget>,
        layer: Option<Layer>,
        views_created: u32,
    }

    impl RenderNode for Node {
        fn kind(&self) -> NodeKind {
            self.kind
        }

        fn create_view(&mut self, force: bool) -> Option<&mut dyn Any> {
            if force && self.view.is_none() {
                self.views_created += 1;
                self.view = Some(Widget::default());
            }
            self.view.as_mut().map(|w| w as &mut dyn Any)
        }

        fn ensure_component(&mut self, kind: ClassId) -> Option<&mut dyn Any> {
            if kind != Effects::CLASS.id() {
                return None;
            }
            let layer: &mut dyn Any = self.layer.get_or_insert_with(Layer::default);
            Some(layer)
        }
    }

    #[derive(Default)]
    struct Effects {
        applied: u32,
    }

    impl ComponentController for Effects {
        const CLASS: ControllerClass = ControllerClass::new::<Self>("Effects", |set| {
            set.prop_with_owner(
                "blur",
                PropDefault::Number(0.0),
                |c: &mut Self, l: &mut Layer, v: f64| {
                    c.applied += 1;
                    l.blur = v;
                },
            );
        });
    }

    #[derive(Default)]
    struct ViewController {
        custom: Vec<String>,
    }

    impl ViewController {
        const CLASS: ControllerClass = ControllerClass::new::<Self>("View", |set| {
            set.prop("opacity", PropDefault::Number(1.0), |w: &mut Widget, v: f32| {
                w.opacity = v;
            })
            .prop("width", PropDefault::Number(0.0), |w: &mut Widget, v: i32| {
                w.width = v;
            });
        });
    }

    impl Controller for ViewController {
        fn class(&self) -> ControllerClass {
            Self::CLASS
        }

        fn set_custom_prop(&mut self, view: &mut dyn Any, name: &str, _: &Value) -> bool {
            self.custom.push(name.to_string());
            if let Some(widget) = view.downcast_mut::<Widget>() {
                widget.extras.push(name.to_string());
            }
            true
        }
    }

    fn registry() -> Arc<Registry> {
        Arc::new(
            RegistryBuilder::new()
                .component::<Effects>()
                .text_property("width")
                .build(),
        )
    }

    fn recording() -> (Dispatcher, Rc<RefCell<Vec<DispatchError>>>) {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        let dispatcher = Dispatcher::builder(registry())
            .error_sink(move |error: DispatchError| sink.borrow_mut().push(error))
            .build();
        (dispatcher, errors)
    }

    fn props(entries: &[(&str, Value)]) -> PropertyMap {
        entries.iter().cloned().collect()
    }

    #[test]
    fn empty_or_missing_map_is_a_no_op() {
        let (mut dispatcher, errors) = recording();
        let mut node = Node::default();
        let mut controller = ViewController::default();
        dispatcher.update_properties(&mut node, &mut controller, None, None, false);
        dispatcher.update_properties(
            &mut node,
            &mut controller,
            None,
            Some(&PropertyMap::new()),
            false,
        );
        assert_eq!(node.views_created, 0);
        assert!(errors.borrow().is_empty());
    }

    #[test]
    fn view_handlers_create_the_view_on_demand() {
        let (mut dispatcher, _) = recording();
        let mut node = Node::default();
        let mut controller = ViewController::default();
        let map = props(&[("opacity", Value::Float(0.5)), ("width", Value::Int(10))]);

        dispatcher.update_properties(&mut node, &mut controller, None, Some(&map), false);
        assert_eq!(node.views_created, 1);
        let view = node.view.as_ref().unwrap();
        assert_eq!(view.opacity, 0.5);
        assert_eq!(view.width, 10);
    }

    #[test]
    fn view_not_created_without_force() {
        let (mut dispatcher, errors) = recording();
        dispatcher.config.force_view_creation = false;
        let mut node = Node::default();
        let map = props(&[("opacity", Value::Float(0.5))]);

        dispatcher.update_properties(
            &mut node,
            &mut ViewController::default(),
            None,
            Some(&map),
            false,
        );
        assert!(node.view.is_none());
        assert!(errors.borrow().is_empty());
    }

    #[test]
    fn component_controller_is_created_once() {
        let (mut dispatcher, _) = recording();
        let mut node = Node::default();
        let mut controller = ViewController::default();
        assert!(dispatcher.component_controller::<Effects>().is_none());

        for blur in [1.0, 2.0] {
            let map = props(&[("blur", Value::Float(blur))]);
            dispatcher.update_properties(&mut node, &mut controller, None, Some(&map), false);
        }
        assert_eq!(dispatcher.component_controller::<Effects>().unwrap().applied, 2);
        assert_eq!(dispatcher.components.len(), 1);
        assert_eq!(node.layer.as_ref().unwrap().blur, 2.0);
        assert!(dispatcher.is_component_property("blur"));
    }

    #[test]
    fn missing_component_falls_through_to_custom() {
        let registry = Arc::new(RegistryBuilder::new().component::<Effects>().build());
        let mut dispatcher = Dispatcher::new(registry);
        let mut node = Node::default();
        let mut widget = Widget::default();
        let mut controller = ViewController::default();

        struct Bare;
        impl RenderNode for Bare {
            fn create_view(&mut self, _: bool) -> Option<&mut dyn Any> {
                None
            }
        }

        let map = props(&[("blur", Value::Float(1.0))]);
        dispatcher.update_properties(
            &mut Bare,
            &mut controller,
            Some(&mut widget),
            Some(&map),
            false,
        );
        assert_eq!(controller.custom, ["blur"]);
        assert!(dispatcher.component_controller::<Effects>().is_none());

        dispatcher.update_properties(&mut node, &mut controller, None, Some(&map), false);
        assert_eq!(controller.custom, ["blur"]);
        assert_eq!(dispatcher.component_controller::<Effects>().unwrap().applied, 1);
    }

    #[test]
    fn custom_path_requires_a_view() {
        let (mut dispatcher, _) = recording();
        let mut node = Node::default();
        let mut controller = ViewController::default();
        let map = props(&[("testID", Value::from("a"))]);

        dispatcher.update_properties(&mut node, &mut controller, None, Some(&map), false);
        assert!(controller.custom.is_empty());

        let mut widget = Widget::default();
        dispatcher.update_properties(
            &mut node,
            &mut controller,
            Some(&mut widget),
            Some(&map),
            false,
        );
        assert_eq!(controller.custom, ["testID"]);
        assert_eq!(widget.extras, ["testID"]);
    }

    #[test]
    fn text_properties_only_skip_on_text_nodes() {
        let (mut dispatcher, _) = recording();
        let mut controller = ViewController::default();
        let map = props(&[("width", Value::Int(7))]);

        let mut text = Node {
            kind: NodeKind::Text,
            ..Node::default()
        };
        dispatcher.update_properties(&mut text, &mut controller, None, Some(&map), false);
        assert!(text.view.is_none());

        let mut element = Node::default();
        dispatcher.update_properties(&mut element, &mut controller, None, Some(&map), false);
        assert_eq!(element.view.unwrap().width, 7);
    }

    #[test]
    fn custom_controller_can_be_replaced() {
        struct Custom;
        impl Controller for Custom {
            fn class(&self) -> ControllerClass {
                ControllerClass::empty::<Self>("Custom")
            }
        }

        let (mut dispatcher, _) = recording();
        assert!(dispatcher.custom_controller().is_none());
        assert!(dispatcher.set_custom_controller(Some(Box::new(Custom))).is_none());
        assert_eq!(
            dispatcher.custom_controller().map(|c| c.class().name()),
            Some("Custom")
        );
        assert!(format!("{dispatcher:?}").contains("Custom"));
        let previous = dispatcher.set_custom_controller(None);
        assert!(previous.is_some());
        assert!(dispatcher.custom_controller().is_none());
    }

    #[test]
    fn default_config() {
        let config = DispatchConfig::default();
        assert_eq!(config.style_key, "style");
        assert!(config.force_view_creation);

        let dispatcher = Dispatcher::builder(registry())
            .style_key("css")
            .force_view_creation(false)
            .build();
        assert_eq!(dispatcher.config().style_key, "css");
        assert!(!dispatcher.config().force_view_creation);
        assert!(dispatcher.registry().is_component_property("blur"));
    }
}
