// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The priority value resolver.
//!
//! A [`PriorityValue`] combines competing value sources for one property into
//! a single value. Sources are grouped into levels by [`BindingPriority`];
//! the lowest rank with an active source wins, and within a level the most
//! recently added source wins.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::entry::{EntryOwner, PriorityBindingEntry};
use crate::error::BindingError;
use crate::level::PriorityLevel;
use crate::notification::BindingNotification;
use crate::priority::BindingPriority;
use crate::stream::{Observer, ObserverSet, Subscription, ValueStream};
use crate::value::Value;

/// Callback applied to the winning value before it is emitted.
pub type CoerceCallback = Box<dyn Fn(Value) -> Value>;

/// Callback receiving errors reported by binding entries.
pub type ErrorCallback = Rc<dyn Fn(&EntryError)>;

/// An error reported by one of a [`PriorityValue`]'s bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryError {
    /// Priority of the binding that failed.
    pub priority: BindingPriority,
    /// Description of the binding's stream, if it supplied one.
    pub description: Option<String>,
    /// The error.
    pub error: BindingError,
}

/// Builder for [`PriorityValue`].
///
/// # Example
///
/// ```rust
/// use understory_property::{BindingPriority, PriorityValueBuilder, Value};
///
/// let width = PriorityValueBuilder::new("Width")
///     .priorities([BindingPriority::LOCAL_VALUE, BindingPriority::STYLE])
///     .coerce(|v| match v {
///         Value::Int(i) => Value::Int(i.clamp(0, 100)),
///         other => other,
///     })
///     .build();
///
/// width.set_value(Value::Int(250), BindingPriority::STYLE);
/// assert_eq!(width.value(), Value::Int(100));
/// ```
pub struct PriorityValueBuilder {
    name: String,
    priorities: SmallVec<[BindingPriority; 4]>,
    coerce: Option<CoerceCallback>,
}

impl PriorityValueBuilder {
    /// Creates a builder for the property `name`, with no levels.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priorities: SmallVec::new(),
            coerce: None,
        }
    }

    /// Adds a level.
    #[must_use]
    pub fn priority(mut self, priority: BindingPriority) -> Self {
        self.priorities.push(priority);
        self
    }

    /// Adds several levels.
    #[must_use]
    pub fn priorities(mut self, priorities: impl IntoIterator<Item = BindingPriority>) -> Self {
        self.priorities.extend(priorities);
        self
    }

    /// Sets a callback to coerce the winning value before it is emitted.
    ///
    /// The callback is never invoked with [`Value::Unset`].
    #[must_use]
    pub fn coerce<F>(mut self, callback: F) -> Self
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.coerce = Some(Box::new(callback));
        self
    }

    /// Builds the [`PriorityValue`].
    ///
    /// Duplicate levels are merged.
    #[must_use]
    pub fn build(mut self) -> PriorityValue {
        self.priorities.sort_unstable();
        self.priorities.dedup();
        let levels = self.priorities.into_iter().map(PriorityLevel::new).collect();
        PriorityValue {
            inner: Rc::new(Inner {
                name: self.name,
                levels: RefCell::new(levels),
                coerce: self.coerce,
                current: RefCell::new(Current::default()),
                observers: RefCell::new(ObserverSet::new()),
                error_observers: RefCell::new(ErrorObservers::default()),
                recomputing: Cell::new(false),
                pending: Cell::new(false),
            }),
        }
    }
}

impl fmt::Debug for PriorityValueBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityValueBuilder")
            .field("name", &self.name)
            .field("priorities", &self.priorities)
            .field("has_coerce_callback", &self.coerce.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
struct Current {
    value: Value,
    priority: Option<BindingPriority>,
}

#[derive(Default)]
struct ErrorObservers {
    next_id: u64,
    callbacks: Vec<(u64, ErrorCallback)>,
}

struct Inner {
    name: String,
    /// Sorted by rank, highest precedence first.
    levels: RefCell<SmallVec<[PriorityLevel; 4]>>,
    coerce: Option<CoerceCallback>,
    current: RefCell<Current>,
    observers: RefCell<ObserverSet>,
    error_observers: RefCell<ErrorObservers>,
    recomputing: Cell<bool>,
    pending: Cell<bool>,
}

impl Inner {
    /// Picks the winning value and its level.
    fn select(&self) -> (Value, Option<BindingPriority>) {
        self.levels
            .borrow()
            .iter()
            .find_map(|level| level.active_value().map(|v| (v, Some(level.priority()))))
            .unwrap_or((Value::Unset, None))
    }

    /// Recomputes the winner and emits it if it changed.
    ///
    /// Re-entrant calls are folded into the running one.
    fn recompute(&self) {
        if self.recomputing.replace(true) {
            self.pending.set(true);
            return;
        }
        loop {
            self.pending.set(false);
            let (value, priority) = self.select();
            let value = match &self.coerce {
                Some(coerce) if !value.is_unset() => coerce(value),
                _ => value,
            };
            let changed = {
                let mut current = self.current.borrow_mut();
                current.priority = priority;
                if current.value == value {
                    false
                } else {
                    current.value = value.clone();
                    true
                }
            };
            if changed {
                trace!(property = %self.name, ?priority, ?value, "priority value changed");
                self.publish(&value);
            }
            if !self.pending.get() {
                break;
            }
        }
        self.recomputing.set(false);
    }

    fn publish(&self, value: &Value) {
        let ids = self.observers.borrow().ids();
        for id in ids {
            let observer = self.observers.borrow().get(id);
            if let Some(observer) = observer {
                observer.next(BindingNotification::new(value.clone()));
            }
        }
    }

    fn description_of(&self, priority: BindingPriority, index: u64) -> Option<String> {
        self.levels
            .borrow()
            .iter()
            .find(|level| level.priority() == priority)
            .and_then(|level| level.entry(index))
            .and_then(|entry| entry.description())
    }
}

impl EntryOwner for Inner {
    fn entry_changed(&self, _priority: BindingPriority, _index: u64) {
        self.recompute();
    }

    fn entry_error(&self, priority: BindingPriority, index: u64, error: &BindingError) {
        let description = self.description_of(priority, index);
        debug!(
            property = %self.name,
            %priority,
            description = description.as_deref().unwrap_or(""),
            %error,
            "binding error"
        );
        let callbacks: Vec<ErrorCallback> = self
            .error_observers
            .borrow()
            .callbacks
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        if callbacks.is_empty() {
            return;
        }
        let report = EntryError {
            priority,
            description,
            error: error.clone(),
        };
        for callback in callbacks {
            callback(&report);
        }
    }

    fn entry_completed(&self, priority: BindingPriority, index: u64) {
        trace!(property = %self.name, %priority, index, "binding completed");
        self.recompute();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for level in self.levels.get_mut().iter_mut() {
            level.dispose();
        }
    }
}

/// Resolves one property's value from prioritized sources.
///
/// Cloning a `PriorityValue` creates a new handle to the same resolver.
///
/// `PriorityValue` is itself a [`ValueStream`]: each subscriber first receives
/// the current value and then every change. This allows resolvers to feed
/// other resolvers.
///
/// # Example
///
/// ```rust
/// use understory_property::{BindingPriority, PriorityValueBuilder, Subject, Value};
///
/// let value = PriorityValueBuilder::new("Foo")
///     .priorities([BindingPriority::LOCAL_VALUE, BindingPriority::STYLE])
///     .build();
///
/// let style = Subject::behavior(Value::from("style"));
/// let local = Subject::new();
/// value.add_binding(BindingPriority::STYLE, &style);
/// value.add_binding(BindingPriority::LOCAL_VALUE, &local);
/// assert_eq!(value.value(), Value::from("style"));
///
/// local.next(Value::from("local"));
/// assert_eq!(value.value(), Value::from("local"));
/// assert_eq!(value.value_priority(), Some(BindingPriority::LOCAL_VALUE));
///
/// local.next(Value::Unset);
/// assert_eq!(value.value(), Value::from("style"));
/// ```
#[derive(Clone)]
pub struct PriorityValue {
    inner: Rc<Inner>,
}

impl PriorityValue {
    /// Returns the property name this resolver was built for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the levels, highest precedence first.
    #[must_use]
    pub fn priorities(&self) -> Vec<BindingPriority> {
        self.inner
            .levels
            .borrow()
            .iter()
            .map(PriorityLevel::priority)
            .collect()
    }

    /// Returns the current value, or [`Value::Unset`] if no level is active.
    #[must_use]
    pub fn value(&self) -> Value {
        self.inner.current.borrow().value.clone()
    }

    /// Returns the priority of the level that supplies the current value.
    #[must_use]
    pub fn value_priority(&self) -> Option<BindingPriority> {
        self.inner.current.borrow().priority
    }

    /// Returns the number of bindings registered across all levels.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.inner
            .levels
            .borrow()
            .iter()
            .map(PriorityLevel::entry_count)
            .sum()
    }

    fn with_level<R>(&self, priority: BindingPriority, f: impl FnOnce(&mut PriorityLevel) -> R) -> R {
        let mut levels = self.inner.levels.borrow_mut();
        match levels.iter_mut().find(|level| level.priority() == priority) {
            Some(level) => f(level),
            None => panic!(
                "PriorityValue '{}' has no level for priority {priority}",
                self.inner.name
            ),
        }
    }

    /// Registers `stream` at `priority`.
    ///
    /// The binding is added after all existing bindings of that level, so it
    /// shadows them while it holds a value. The stream may deliver values
    /// synchronously while this call is in progress.
    ///
    /// # Panics
    ///
    /// Panics if the resolver has no level for `priority`.
    pub fn add_binding(&self, priority: BindingPriority, stream: &dyn ValueStream) -> BindingHandle {
        let entry = self.with_level(priority, PriorityLevel::add_entry);
        let owner: Weak<Inner> = Rc::downgrade(&self.inner);
        entry.start(stream, owner);
        self.inner.recompute();
        BindingHandle {
            owner: Rc::downgrade(&self.inner),
            entry,
        }
    }

    /// Writes a value directly into the level for `priority`.
    ///
    /// The value takes the next insertion slot of that level: it shadows
    /// bindings added before it and is shadowed by bindings added after it.
    /// Writing [`Value::Unset`] makes the level fall back to its bindings.
    ///
    /// # Panics
    ///
    /// Panics if the resolver has no level for `priority`.
    pub fn set_value(&self, value: impl Into<Value>, priority: BindingPriority) {
        let value = value.into();
        self.with_level(priority, |level| level.set_direct(value));
        self.inner.recompute();
    }

    /// Removes the direct value from the level for `priority`.
    ///
    /// # Panics
    ///
    /// Panics if the resolver has no level for `priority`.
    pub fn clear_value(&self, priority: BindingPriority) {
        if self.with_level(priority, PriorityLevel::clear_direct) {
            self.inner.recompute();
        }
    }

    /// Re-applies the coerce callback and emits the result if it changed.
    pub fn revalidate(&self) {
        self.inner.recompute();
    }

    /// Registers `callback` to receive the errors reported by bindings.
    pub fn subscribe_errors(&self, callback: impl Fn(&EntryError) + 'static) -> Subscription {
        let id = {
            let mut observers = self.inner.error_observers.borrow_mut();
            let id = observers.next_id;
            observers.next_id += 1;
            observers.callbacks.push((id, Rc::new(callback)));
            id
        };
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .error_observers
                    .borrow_mut()
                    .callbacks
                    .retain(|(cid, _)| *cid != id);
            }
        })
    }

    /// Returns the number of attached value subscribers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }
}

impl ValueStream for PriorityValue {
    fn subscribe(&self, observer: Observer) -> Subscription {
        let id = self.inner.observers.borrow_mut().insert(observer);
        let current = self.value();
        let observer = self.inner.observers.borrow().get(id);
        if let Some(observer) = observer {
            observer.next(BindingNotification::new(current));
        }
        // The subscription keeps the resolver alive, like any other source.
        let inner = self.inner.clone();
        Subscription::new(move || {
            inner.observers.borrow_mut().remove(id);
        })
    }

    fn description(&self) -> Option<String> {
        Some(self.inner.name.clone())
    }
}

impl fmt::Debug for PriorityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.inner.current.borrow();
        f.debug_struct("PriorityValue")
            .field("name", &self.inner.name)
            .field("value", &current.value)
            .field("priority", &current.priority)
            .field("levels", &self.inner.levels.borrow())
            .field("observers", &self.inner.observers.borrow().len())
            .finish_non_exhaustive()
    }
}

/// A binding registered with [`PriorityValue::add_binding`].
///
/// Dropping the handle leaves the binding in place; call
/// [`BindingHandle::remove`] to take it out.
#[derive(Debug)]
pub struct BindingHandle {
    owner: Weak<Inner>,
    entry: Rc<PriorityBindingEntry>,
}

impl BindingHandle {
    /// Returns the binding's priority.
    #[must_use]
    pub fn priority(&self) -> BindingPriority {
        self.entry.priority()
    }

    /// Returns the binding's insertion index within its level.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.entry.index()
    }

    /// Returns the binding's latest value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.entry.value()
    }

    /// Returns `true` once the binding's stream has completed.
    #[must_use]
    pub fn has_completed(&self) -> bool {
        self.entry.has_completed()
    }

    /// Disposes the binding, removes it from its level and recomputes.
    pub fn remove(self) {
        self.entry.dispose();
        let Some(inner) = self.owner.upgrade() else {
            return;
        };
        let removed = inner
            .levels
            .borrow_mut()
            .iter_mut()
            .find(|level| level.priority() == self.entry.priority())
            .is_some_and(|level| level.remove_entry(self.entry.index()));
        if removed {
            inner.recompute();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Subject;

    fn two_levels() -> PriorityValue {
        PriorityValueBuilder::new("Test")
            .priority(BindingPriority::STYLE)
            .priority(BindingPriority::LOCAL_VALUE)
            .build()
    }

    #[test]
    fn levels_are_sorted_and_deduplicated() {
        let value = PriorityValueBuilder::new("Test")
            .priorities([
                BindingPriority::STYLE,
                BindingPriority::ANIMATION,
                BindingPriority::STYLE,
            ])
            .build();
        assert_eq!(
            value.priorities(),
            [BindingPriority::ANIMATION, BindingPriority::STYLE]
        );
    }

    #[test]
    fn direct_value_and_binding_share_insertion_order() {
        let value = two_levels();
        let source = Subject::behavior(Value::Int(1));
        value.set_value(Value::Int(0), BindingPriority::LOCAL_VALUE);
        value.add_binding(BindingPriority::LOCAL_VALUE, &source);
        assert_eq!(value.value(), Value::Int(1));

        value.set_value(Value::Int(2), BindingPriority::LOCAL_VALUE);
        assert_eq!(value.value(), Value::Int(2));

        value.clear_value(BindingPriority::LOCAL_VALUE);
        assert_eq!(value.value(), Value::Int(1));
    }

    #[test]
    fn reentrant_writes_are_coalesced() {
        let value = two_levels();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let handle = value.clone();
        let _sub = value.subscribe(Observer::from_fn(move |n| {
            let v = n.value().cloned().unwrap_or_default();
            sink.borrow_mut().push(v.clone());
            if v == Value::Int(1) {
                handle.set_value(Value::Int(2), BindingPriority::LOCAL_VALUE);
            }
        }));
        value.set_value(Value::Int(1), BindingPriority::LOCAL_VALUE);
        assert_eq!(*seen.borrow(), [Value::Unset, Value::Int(1), Value::Int(2)]);
        assert_eq!(value.value(), Value::Int(2));
    }

    #[test]
    fn revalidate_reapplies_coercion() {
        let limit = Rc::new(Cell::new(10_i64));
        let l = limit.clone();
        let value = PriorityValueBuilder::new("Clamped")
            .priority(BindingPriority::LOCAL_VALUE)
            .coerce(move |v| match v {
                Value::Int(i) => Value::Int(i.min(l.get())),
                other => other,
            })
            .build();
        value.set_value(Value::Int(20), BindingPriority::LOCAL_VALUE);
        assert_eq!(value.value(), Value::Int(10));

        limit.set(15);
        assert_eq!(value.value(), Value::Int(10));
        value.revalidate();
        assert_eq!(value.value(), Value::Int(15));
    }

    #[test]
    fn dropping_the_resolver_disposes_bindings() {
        let source = Subject::new();
        let value = two_levels();
        value.add_binding(BindingPriority::STYLE, &source);
        assert_eq!(source.observer_count(), 1);
        drop(value);
        assert_eq!(source.observer_count(), 0);
    }

    #[test]
    #[should_panic(expected = "has no level for priority")]
    fn unknown_priority_panics() {
        let value = two_levels();
        value.set_value(Value::Int(1), BindingPriority::ANIMATION);
    }
}
