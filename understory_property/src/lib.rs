// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Property: dynamic values, value streams and priority resolution.
//!
//! This crate provides the foundation that bindings are built on: a dynamic
//! [`Value`] model, the object capability contract used for path traversal,
//! a synchronous stream contract, and [`PriorityValue`], which combines
//! competing value sources for one property into a single value. Path
//! expressions live in `understory_binding`.
//!
//! ## Core Concepts
//!
//! ### Values
//!
//! [`Value`] carries primitives, shared objects ([`ObjectRef`]) and arbitrary
//! Rust values ([`ErasedValue`]). [`Value::Unset`] is the sentinel for "no
//! value currently available" and never equals a legitimate value, not even
//! [`Value::Null`].
//!
//! ### Objects
//!
//! Any type can take part in bindings by implementing [`DynamicObject`].
//! Optional capabilities are queried per object:
//!
//! - [`NotifyMemberChanged`] - reports member changes
//! - [`Indexable`] - supports `[index]` access
//!
//! [`PropertyBag`] and [`ValueList`] are ready-made implementations.
//!
//! ### Streams
//!
//! A [`ValueStream`] delivers [`BindingNotification`]s to an [`Observer`]
//! until it completes. Notifications carry either a plain value or a
//! recoverable [`BindingError`] next to Unset or a partial value; errors never
//! terminate a stream. [`Subject`] is a stream that callers push into.
//!
//! ### Priority resolution
//!
//! A [`PriorityValue`] owns one level per [`BindingPriority`]. The level with
//! the lowest rank that has an active source wins:
//!
//! **Animation → Local → Style Trigger → Templated Parent → Style**
//!
//! Within a level the most recently added source that holds a value wins.
//! Sources that complete are excluded from then on.
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_property::{BindingPriority, PriorityValueBuilder, Subject, Value};
//!
//! let width = PriorityValueBuilder::new("Width")
//!     .priorities([BindingPriority::ANIMATION, BindingPriority::LOCAL_VALUE])
//!     .build();
//!
//! width.set_value(Value::Float(100.0), BindingPriority::LOCAL_VALUE);
//! assert_eq!(width.value(), Value::Float(100.0));
//!
//! // Animation overrides local while it runs.
//! let animation = Subject::new();
//! width.add_binding(BindingPriority::ANIMATION, &animation);
//! animation.next(Value::Float(150.0));
//! assert_eq!(width.value(), Value::Float(150.0));
//!
//! // Once it completes, the local value is back.
//! animation.complete();
//! assert_eq!(width.value(), Value::Float(100.0));
//! ```
//!
//! ## Threading
//!
//! Everything here is single-threaded (`Rc`, `RefCell`). Callbacks run
//! synchronously inside the call that triggered them and may re-enter the
//! resolver; re-entrant recomputations are coalesced.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod bag;
mod entry;
mod error;
mod level;
mod notification;
mod object;
mod priority;
mod priority_value;
mod stream;
mod value;

pub use bag::{BagMethod, PropertyBag, ValueList};
pub use entry::{EntryOwner, PriorityBindingEntry};
pub use error::{BindingError, BindingErrorType};
pub use notification::BindingNotification;
pub use object::{ChangeCallback, DynamicObject, Indexable, NotifyMemberChanged};
pub use priority::BindingPriority;
pub use priority_value::{
    BindingHandle, CoerceCallback, EntryError, ErrorCallback, PriorityValue, PriorityValueBuilder,
};
pub use stream::{Observer, ObserverSet, Subject, Subscription, ValueStream};
pub use value::{ErasedValue, ObjectRef, Value, WeakObjectRef};
