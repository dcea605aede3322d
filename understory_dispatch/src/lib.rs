// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Dispatch: declarative property dispatch for render-tree controllers.
//!
//! This crate applies maps of named, dynamically typed property values to
//! the views and sub-components of render-tree nodes. Controllers declare
//! typed property handlers once per class; dispatch finds the handler for
//! each property, converts the value (or the declared default) to the
//! handler's parameter type, and calls it.
//!
//! ## Core Concepts
//!
//! ### Classes and Handlers
//!
//! A [`ControllerClass`] names a controller type, the class it extends, and
//! a function declaring its handlers on a [`HandlerSet`]. The
//! [`Registry`] flattens a class and its ancestors into one [`HandlerMap`]
//! the first time the class is dispatched, and reuses it afterwards.
//!
//! ### Conversion
//!
//! Every handler parameter type implements [`FromProp`]. Supplied values
//! and declared defaults both go through [`coerce`], so a default of
//! `PropDefault::Number(0.0)` reaches an `i32` handler as `0` and an `f32`
//! handler as `0.0`. Values that cannot be converted are reported as
//! [`DispatchError::Conversion`] through the dispatcher's [`ErrorSink`].
//!
//! ### Routing
//!
//! [`Dispatcher::update_properties`] routes each property through, in order:
//!
//! - **Text skip** - properties text layout already applied on text nodes
//! - **View handler** - a handler of the controller's class
//! - **Nested style** - the `"style"` map, dispatched recursively
//! - **Component** - a handler of a registered [`ComponentController`]
//! - **Custom** - the custom controller's handlers, then
//!   [`Controller::set_custom_prop`]
//!
//! ## Quick Start
//!
//! ```rust
//! use core::any::Any;
//! use std::sync::Arc;
//!
//! use understory_dispatch::{
//!     ClassId, ComponentController, Controller, ControllerClass, Dispatcher, PropDefault,
//!     PropertyMap, RegistryBuilder, RenderNode, Value,
//! };
//!
//! #[derive(Default)]
//! struct Widget {
//!     opacity: f32,
//!     radius: i32,
//! }
//!
//! #[derive(Default)]
//! struct Shadow {
//!     blur: f64,
//! }
//!
//! #[derive(Default)]
//! struct Node {
//!     view: Option<Widget>,
//!     shadow: Option<Shadow>,
//! }
//!
//! impl RenderNode for Node {
//!     fn create_view(&mut self, force: bool) -> Option<&mut dyn Any> {
//!         if force && self.view.is_none() {
//!             self.view = Some(Widget::default());
//!         }
//!         self.view.as_mut().map(|w| w as &mut dyn Any)
//!     }
//!
//!     fn ensure_component(&mut self, kind: ClassId) -> Option<&mut dyn Any> {
//!         if kind != Effects::CLASS.id() {
//!             return None;
//!         }
//!         let shadow: &mut dyn Any = self.shadow.get_or_insert_with(Shadow::default);
//!         Some(shadow)
//!     }
//! }
//!
//! // A shared sub-component handling effect properties for any node kind.
//! #[derive(Default)]
//! struct Effects;
//!
//! impl ComponentController for Effects {
//!     const CLASS: ControllerClass = ControllerClass::new::<Self>("Effects", |set| {
//!         set.prop("shadowBlur", PropDefault::Number(0.0), |s: &mut Shadow, v: f64| s.blur = v);
//!     });
//! }
//!
//! struct ViewController;
//! struct ImageController;
//!
//! const VIEW: ControllerClass = ControllerClass::new::<ViewController>("View", |set| {
//!     set.prop("opacity", PropDefault::Number(1.0), |w: &mut Widget, v: f32| w.opacity = v);
//! });
//! const IMAGE: ControllerClass = ControllerClass::new::<ImageController>("Image", |set| {
//!     set.prop("borderRadius", PropDefault::Number(0.0), |w: &mut Widget, v: i32| w.radius = v);
//! })
//! .extends(&VIEW);
//!
//! impl Controller for ImageController {
//!     fn class(&self) -> ControllerClass {
//!         IMAGE
//!     }
//! }
//!
//! // One registry per process, shared by every dispatcher.
//! let registry = Arc::new(RegistryBuilder::new().component::<Effects>().build());
//! let mut dispatcher = Dispatcher::new(Arc::clone(&registry));
//!
//! let mut props = PropertyMap::new();
//! props.insert("opacity", 0.25);
//! props.insert("borderRadius", "4");
//! props.insert("shadowBlur", 3);
//!
//! let mut node = Node::default();
//! dispatcher.update_properties(&mut node, &mut ImageController, None, Some(&props), false);
//!
//! let view = node.view.as_ref().unwrap();
//! assert_eq!(view.opacity, 0.25);
//! assert_eq!(view.radius, 4);
//! assert_eq!(node.shadow.as_ref().unwrap().blur, 3.0);
//!
//! // Absent means default: null applies the declared default.
//! props.insert("opacity", Value::Null);
//! dispatcher.update_properties(&mut node, &mut ImageController, None, Some(&props), false);
//! assert_eq!(node.view.as_ref().unwrap().opacity, 1.0);
//! ```
//!
//! ## Sharing
//!
//! [`Registry`] is `Send + Sync`; wrap it in an `Arc` and hand it to every
//! [`Dispatcher`]. Class resolution inserts at most one map per class even
//! when threads race to build it. A `Dispatcher` owns its component
//! controllers and custom controller and is used from one thread at a time.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` when handler maps are built,
//! `trace` for routing decisions, and `warn` for component property
//! collisions, for two classes declared for one type, and from [`LogSink`].
//! It never installs a subscriber.

mod class;
mod coerce;
mod component;
mod dispatcher;
mod error;
mod handler;
mod node;
mod registry;
mod value;

pub use class::{ClassId, Controller, ControllerClass};
pub use coerce::{Arg, FromProp, ParamType, PropDefault, coerce, coerce_default};
pub use component::{ComponentController, ComponentKind};
pub use dispatcher::{DispatchConfig, Dispatcher, DispatcherBuilder};
pub use error::{CoerceError, DispatchError, ErrorSink, HandlerId, InvokeError, LogSink};
pub use handler::{HandlerDescriptor, HandlerMap, HandlerSet};
pub use node::{NodeKind, RenderNode};
pub use registry::{ComponentHandler, Registry, RegistryBuilder};
pub use value::{PropertyMap, Value};
