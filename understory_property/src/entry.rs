// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding entries: one value stream registered at a priority level.

use alloc::rc::{Rc, Weak};
use alloc::string::String;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::error::{BindingError, BindingErrorType};
use crate::notification::BindingNotification;
use crate::priority::BindingPriority;
use crate::stream::{Observer, Subscription, ValueStream};
use crate::value::Value;

/// Receives the events of the entries it owns.
///
/// Entries hold their owner weakly. Callbacks are never delivered after the
/// entry has been disposed.
pub trait EntryOwner {
    /// The entry's value changed.
    fn entry_changed(&self, priority: BindingPriority, index: u64);

    /// The entry's stream reported an error.
    fn entry_error(&self, priority: BindingPriority, index: u64, error: &BindingError);

    /// The entry's stream completed.
    fn entry_completed(&self, priority: BindingPriority, index: u64);
}

/// A value stream registered at a priority level.
///
/// An entry stores the latest value its stream delivered, starting at
/// [`Value::Unset`], and forwards every event to its [`EntryOwner`].
pub struct PriorityBindingEntry {
    priority: BindingPriority,
    index: u64,
    description: RefCell<Option<String>>,
    value: RefCell<Value>,
    started: Cell<bool>,
    completed: Cell<bool>,
    disposed: Cell<bool>,
    subscription: RefCell<Option<Subscription>>,
}

impl PriorityBindingEntry {
    /// Creates an entry. Later entries in a level must have higher indices.
    #[must_use]
    pub fn new(priority: BindingPriority, index: u64) -> Rc<Self> {
        Rc::new(Self {
            priority,
            index,
            description: RefCell::new(None),
            value: RefCell::new(Value::Unset),
            started: Cell::new(false),
            completed: Cell::new(false),
            disposed: Cell::new(false),
            subscription: RefCell::new(None),
        })
    }

    /// Returns the priority of the level owning this entry.
    #[must_use]
    #[inline]
    pub fn priority(&self) -> BindingPriority {
        self.priority
    }

    /// Returns the insertion index.
    #[must_use]
    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Returns the stream's description, if it supplied one.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        self.description.borrow().clone()
    }

    /// Returns the latest value received.
    #[must_use]
    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Returns `true` once the stream has completed.
    #[must_use]
    pub fn has_completed(&self) -> bool {
        self.completed.get()
    }

    /// Returns `true` once [`PriorityBindingEntry::dispose`] has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Returns `true` if this entry can determine its level's value: it has
    /// not completed and holds a value other than Unset.
    #[must_use]
    pub fn is_candidate(&self) -> bool {
        !self.completed.get() && !self.disposed.get() && !self.value.borrow().is_unset()
    }

    /// Starts observing `stream`.
    ///
    /// The stream may deliver values synchronously, before this returns.
    ///
    /// # Panics
    ///
    /// Panics if the entry has already been started.
    pub fn start(self: &Rc<Self>, stream: &dyn ValueStream, owner: Weak<dyn EntryOwner>) {
        assert!(
            !self.started.replace(true),
            "PriorityBindingEntry::start() called more than once"
        );
        *self.description.borrow_mut() = stream.description();

        let on_next = {
            let entry = Rc::downgrade(self);
            let owner = owner.clone();
            move |notification: BindingNotification| {
                let Some(entry) = entry.upgrade() else {
                    return;
                };
                if entry.disposed.get() {
                    return;
                }
                if let Some(value) = notification.value() {
                    *entry.value.borrow_mut() = value.clone();
                    if let Some(owner) = owner.upgrade() {
                        owner.entry_changed(entry.priority, entry.index);
                    }
                }
                if notification.error_type() == BindingErrorType::Error
                    && !entry.disposed.get()
                    && let Some(error) = notification.binding_error()
                    && let Some(owner) = owner.upgrade()
                {
                    owner.entry_error(entry.priority, entry.index, error);
                }
            }
        };
        let on_completed = {
            let entry = Rc::downgrade(self);
            move || {
                let Some(entry) = entry.upgrade() else {
                    return;
                };
                if entry.disposed.get() || entry.completed.replace(true) {
                    return;
                }
                if let Some(owner) = owner.upgrade() {
                    owner.entry_completed(entry.priority, entry.index);
                }
            }
        };

        let mut subscription = stream.subscribe(Observer::new(on_next, on_completed));
        if self.disposed.get() {
            subscription.dispose();
        } else {
            *self.subscription.borrow_mut() = Some(subscription);
        }
    }

    /// Cancels the subscription. Safe to call more than once.
    pub fn dispose(&self) {
        self.disposed.set(true);
        let subscription = self.subscription.borrow_mut().take();
        if let Some(mut subscription) = subscription {
            subscription.dispose();
        }
    }
}

impl fmt::Debug for PriorityBindingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityBindingEntry")
            .field("priority", &self.priority)
            .field("index", &self.index)
            .field("description", &self.description.borrow())
            .field("value", &self.value.borrow())
            .field("started", &self.started.get())
            .field("completed", &self.completed.get())
            .field("disposed", &self.disposed.get())
            .field("subscription", &self.subscription.borrow().is_some())
            .finish()
    }
}
