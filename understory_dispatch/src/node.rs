// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The render-tree node seen by the dispatcher.

use core::any::Any;

use crate::class::ClassId;

/// The kind of a render node, as far as dispatch cares.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Any node whose properties all go through dispatch.
    #[default]
    Element,
    /// A text node. Properties already applied by text layout are skipped.
    Text,
}

/// A render-tree node that properties are dispatched for.
///
/// The node owns (or can reach) the materialized view and the sub-components
/// attached to it. Both are handed to handlers as `&mut dyn Any`; handlers
/// downcast them to the type they were declared for.
pub trait RenderNode {
    /// Returns the kind of this node.
    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    /// Returns the node's view, creating it if needed and allowed by `force`.
    ///
    /// `None` means the view is not ready; properties that need it are skipped
    /// for this pass without a report.
    fn create_view(&mut self, force: bool) -> Option<&mut dyn Any>;

    /// Returns the sub-component of kind `kind`, creating it if the node
    /// supports one.
    ///
    /// The default implementation provides no sub-components.
    fn ensure_component(&mut self, kind: ClassId) -> Option<&mut dyn Any> {
        let _ = kind;
        None
    }
}
