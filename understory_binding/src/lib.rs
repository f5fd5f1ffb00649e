// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Binding: live path expressions over dynamic objects.
//!
//! An [`ExpressionObserver`] evaluates a path such as `Foo.Bar[0].Name`
//! against a root and publishes the result as a [`ValueStream`]. While it has
//! observers it listens for changes on every object along the path, so a
//! change anywhere re-evaluates the rest of the chain and publishes the new
//! result.
//!
//! ## Paths
//!
//! - `Foo.Bar` - member access
//! - `Items[0]`, `Cells[1, 2]`, `Map[key]` - indexers
//! - `Child()` - zero-argument methods
//! - `!IsEnabled` - leading negation, applied to the result
//!
//! [`parse_path`] exposes the parser directly.
//!
//! ## Failures
//!
//! A missing member, a failed conversion or a failing root factory is
//! published as an error [`BindingNotification`] with an Unset value. The
//! stream keeps going and recovers as soon as the path resolves again.
//!
//! ## Lifetime
//!
//! The first subscriber starts the expression. When the last subscriber
//! leaves, every change listener and every reference to intermediate objects
//! is released. Literal object roots are never kept alive by an expression.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use understory_binding::ExpressionObserver;
//! use understory_property::{
//!     BindingPriority, PriorityValueBuilder, PropertyBag, Value,
//! };
//!
//! let model = Rc::new(PropertyBag::new().with("IsBusy", false));
//! let is_enabled = ExpressionObserver::new(Value::object(model.clone()), "!IsBusy").unwrap();
//!
//! let enabled = PriorityValueBuilder::new("IsEnabled")
//!     .priority(BindingPriority::LOCAL_VALUE)
//!     .build();
//! enabled.add_binding(BindingPriority::LOCAL_VALUE, &is_enabled);
//! assert_eq!(enabled.value(), Value::Bool(true));
//!
//! model.set("IsBusy", true);
//! assert_eq!(enabled.value(), Value::Bool(false));
//! ```
//!
//! [`ValueStream`]: understory_property::ValueStream
//! [`BindingNotification`]: understory_property::BindingNotification

#![no_std]

extern crate alloc;

mod node;
mod observer;
mod parser;

pub use observer::{ExpressionObserver, NodeInfo, RootFactory};
pub use parser::{IndexArgs, PathParseError, PathSegment, parse_path};
