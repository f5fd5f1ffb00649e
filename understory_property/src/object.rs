// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Object capability contract.
//!
//! Path traversal never requires a common base type. An object takes part in
//! bindings by implementing [`DynamicObject`], which exposes member reads and
//! writes by name. Optional capabilities are queried per object when a path
//! node attaches to it:
//!
//! - [`NotifyMemberChanged`]: the object reports member changes, so nodes can
//!   re-evaluate the rest of the chain.
//! - [`Indexable`]: the object supports `[index]` access.

use alloc::rc::Rc;
use core::any::Any;

use crate::stream::Subscription;
use crate::value::Value;

/// Callback invoked when an observed member or collection changes.
pub type ChangeCallback = Rc<dyn Fn()>;

/// An object whose members can be read and written by name.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use understory_property::{DynamicObject, Value};
///
/// struct Counter {
///     count: Cell<i64>,
/// }
///
/// impl DynamicObject for Counter {
///     fn type_name(&self) -> &str {
///         "Counter"
///     }
///
///     fn get_member(&self, name: &str) -> Option<Value> {
///         (name == "Count").then(|| Value::Int(self.count.get()))
///     }
///
///     fn set_member(&self, name: &str, value: Value) -> bool {
///         match (name, value) {
///             ("Count", Value::Int(count)) => {
///                 self.count.set(count);
///                 true
///             }
///             _ => false,
///         }
///     }
/// }
///
/// let counter = Counter { count: Cell::new(1) };
/// assert_eq!(counter.get_member("Count"), Some(Value::Int(1)));
/// assert!(counter.set_member("Count", Value::Int(2)));
/// assert!(!counter.set_member("Count", Value::from("two")));
/// assert_eq!(counter.get_member("Missing"), None);
/// ```
pub trait DynamicObject: Any {
    /// Returns a name for this object's type, used in diagnostics.
    fn type_name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Reads a member.
    ///
    /// Returns `None` if the object has no member with that name.
    fn get_member(&self, name: &str) -> Option<Value>;

    /// Writes a member.
    ///
    /// Returns `false` if the member does not exist, is read-only, or does not
    /// accept the value's type.
    fn set_member(&self, _name: &str, _value: Value) -> bool {
        false
    }

    /// Invokes a zero-argument method.
    ///
    /// Returns `None` if the object has no such method.
    fn invoke(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Returns the change-notification capability, if supported.
    fn notifier(&self) -> Option<&dyn NotifyMemberChanged> {
        None
    }

    /// Returns the indexing capability, if supported.
    fn indexer(&self) -> Option<&dyn Indexable> {
        None
    }
}

/// Change notification for named members.
pub trait NotifyMemberChanged {
    /// Registers `callback` to run whenever the member `name` changes.
    ///
    /// Dropping or disposing the returned [`Subscription`] unregisters it.
    fn subscribe_member(&self, name: &str, callback: ChangeCallback) -> Subscription;
}

/// Indexed element access.
pub trait Indexable {
    /// Reads the element addressed by `args`.
    ///
    /// Returns `None` if there is no such element.
    fn get_index(&self, args: &[Value]) -> Option<Value>;

    /// Writes the element addressed by `args`.
    fn set_index(&self, _args: &[Value], _value: Value) -> bool {
        false
    }

    /// Registers `callback` to run whenever the contents change.
    ///
    /// Returns `None` if the collection does not report changes.
    fn subscribe_index(&self, _callback: ChangeCallback) -> Option<Subscription> {
        None
    }
}
