// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ready-made dynamic objects.
//!
//! [`PropertyBag`] is a member map with change notification, comparable to an
//! expando object. [`ValueList`] is an observable list supporting `[index]`
//! access. Both implement the capability traits directly; applications are
//! free to implement [`DynamicObject`] on their own types instead.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::object::{ChangeCallback, DynamicObject, Indexable, NotifyMemberChanged};
use crate::stream::Subscription;
use crate::value::Value;

/// Zero-argument method registered on a [`PropertyBag`].
pub type BagMethod = Box<dyn Fn(&PropertyBag) -> Value>;

/// Registered change listeners.
///
/// A listener registered with `name: None` is notified about every change.
#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: SmallVec<[(u64, Option<String>, ChangeCallback); 4]>,
}

impl Listeners {
    fn register(
        listeners: &Rc<RefCell<Self>>,
        name: Option<&str>,
        callback: ChangeCallback,
    ) -> Subscription {
        let id = {
            let mut this = listeners.borrow_mut();
            let id = this.next_id;
            this.next_id += 1;
            this.entries.push((id, name.map(String::from), callback));
            id
        };
        let weak: Weak<RefCell<Self>> = Rc::downgrade(listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.borrow_mut().entries.retain(|(lid, _, _)| *lid != id);
            }
        })
    }

    /// Snapshots the callbacks interested in `name`.
    fn matching(&self, name: Option<&str>) -> SmallVec<[ChangeCallback; 4]> {
        self.entries
            .iter()
            .filter(|(_, filter, _)| match (filter, name) {
                (None, _) => true,
                (Some(filter), Some(name)) => filter == name,
                (Some(_), None) => false,
            })
            .map(|(_, _, callback)| callback.clone())
            .collect()
    }

    fn notify(listeners: &RefCell<Self>, name: Option<&str>) {
        let callbacks = listeners.borrow().matching(name);
        for callback in callbacks {
            callback();
        }
    }
}

/// A dynamic object holding named members.
///
/// Writes through [`PropertyBag::set`] always succeed. Writes arriving through
/// [`DynamicObject::set_member`] (that is, from bindings) succeed only for
/// existing members of a compatible type, and never on a read-only bag.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use understory_property::{DynamicObject, PropertyBag, Value};
///
/// let person = Rc::new(
///     PropertyBag::named("Person")
///         .with("Name", "Ada")
///         .with("Age", 36),
/// );
///
/// assert_eq!(person.get_member("Name"), Some(Value::from("Ada")));
/// assert!(person.set_member("Age", Value::Int(37)));
/// assert!(!person.set_member("Age", Value::from("old")));
/// assert!(!person.set_member("Email", Value::from("ada@example.com")));
/// ```
pub struct PropertyBag {
    type_name: String,
    members: RefCell<HashMap<String, Value>>,
    methods: HashMap<String, BagMethod>,
    read_only: bool,
    listeners: Rc<RefCell<Listeners>>,
}

impl PropertyBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::named("PropertyBag")
    }

    /// Creates an empty bag reporting `type_name` in diagnostics.
    #[must_use]
    pub fn named(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: RefCell::new(HashMap::new()),
            methods: HashMap::new(),
            read_only: false,
            listeners: Rc::new(RefCell::new(Listeners::default())),
        }
    }

    /// Adds a member.
    #[must_use]
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.borrow_mut().insert(name.into(), value.into());
        self
    }

    /// Adds a zero-argument method.
    #[must_use]
    pub fn with_method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&Self) -> Value + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Box::new(method));
        self
    }

    /// Rejects all writes that arrive through bindings.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Returns a member's value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.members.borrow().get(name).cloned()
    }

    /// Sets a member, adding it if needed, and notifies listeners on change.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let changed = {
            let mut members = self.members.borrow_mut();
            match members.get_mut(name) {
                Some(slot) if *slot == value => false,
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => {
                    members.insert(String::from(name), value);
                    true
                }
            }
        };
        if changed {
            Listeners::notify(&self.listeners, Some(name));
        }
    }

    /// Removes a member and notifies listeners.
    pub fn remove(&self, name: &str) -> Option<Value> {
        let removed = self.members.borrow_mut().remove(name);
        if removed.is_some() {
            Listeners::notify(&self.listeners, Some(name));
        }
        removed
    }

    /// Returns the number of attached change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }
}

impl Default for PropertyBag {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicObject for PropertyBag {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        self.get(name)
    }

    fn set_member(&self, name: &str, value: Value) -> bool {
        if self.read_only {
            return false;
        }
        let accepted = self.members.borrow().get(name).is_some_and(|current| {
            current.same_kind(&value) || current.is_absent() || value.is_null()
        });
        if accepted {
            self.set(name, value);
        }
        accepted
    }

    fn invoke(&self, name: &str) -> Option<Value> {
        self.methods.get(name).map(|method| method(self))
    }

    fn notifier(&self) -> Option<&dyn NotifyMemberChanged> {
        Some(self)
    }
}

impl NotifyMemberChanged for PropertyBag {
    fn subscribe_member(&self, name: &str, callback: ChangeCallback) -> Subscription {
        Listeners::register(&self.listeners, Some(name), callback)
    }
}

impl fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBag")
            .field("type_name", &self.type_name)
            .field("members", &self.members.borrow())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("read_only", &self.read_only)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// An observable list of values.
///
/// Elements are addressed with a single integer index. The `Count` member
/// reports the length. Every mutation notifies both collection listeners and
/// member listeners.
#[derive(Default)]
pub struct ValueList {
    items: RefCell<Vec<Value>>,
    listeners: Rc<RefCell<Listeners>>,
}

impl ValueList {
    /// Creates a list from the given items.
    #[must_use]
    pub fn new(items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            items: RefCell::new(items.into_iter().collect()),
            listeners: Rc::new(RefCell::new(Listeners::default())),
        }
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Returns `true` if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Returns the item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    /// Appends an item.
    pub fn push(&self, value: impl Into<Value>) {
        self.items.borrow_mut().push(value.into());
        Listeners::notify(&self.listeners, None);
    }

    /// Replaces the item at `index`. Returns `false` if out of range.
    pub fn replace(&self, index: usize, value: impl Into<Value>) -> bool {
        let replaced = match self.items.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        };
        if replaced {
            Listeners::notify(&self.listeners, None);
        }
        replaced
    }

    /// Removes the item at `index`.
    pub fn remove(&self, index: usize) -> Option<Value> {
        let removed = {
            let mut items = self.items.borrow_mut();
            (index < items.len()).then(|| items.remove(index))
        };
        if removed.is_some() {
            Listeners::notify(&self.listeners, None);
        }
        removed
    }

    /// Returns the number of attached change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }

    fn position(args: &[Value]) -> Option<usize> {
        match args {
            [Value::Int(i)] => usize::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl DynamicObject for ValueList {
    fn type_name(&self) -> &str {
        "ValueList"
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        match name {
            "Count" => i64::try_from(self.len()).ok().map(Value::Int),
            _ => None,
        }
    }

    fn notifier(&self) -> Option<&dyn NotifyMemberChanged> {
        Some(self)
    }

    fn indexer(&self) -> Option<&dyn Indexable> {
        Some(self)
    }
}

impl NotifyMemberChanged for ValueList {
    fn subscribe_member(&self, _name: &str, callback: ChangeCallback) -> Subscription {
        Listeners::register(&self.listeners, None, callback)
    }
}

impl Indexable for ValueList {
    fn get_index(&self, args: &[Value]) -> Option<Value> {
        Self::position(args).and_then(|i| self.get(i))
    }

    fn set_index(&self, args: &[Value], value: Value) -> bool {
        Self::position(args).is_some_and(|i| self.replace(i, value))
    }

    fn subscribe_index(&self, callback: ChangeCallback) -> Option<Subscription> {
        Some(Listeners::register(&self.listeners, None, callback))
    }
}

impl fmt::Debug for ValueList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueList")
            .field("items", &self.items.borrow())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
