// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value stream contract.
//!
//! A [`ValueStream`] delivers [`BindingNotification`]s to [`Observer`]s until
//! it completes. Subscribing returns a [`Subscription`]; disposing it (or
//! dropping it) detaches the observer synchronously.
//!
//! All delivery is single-threaded and synchronous. Implementations must not
//! hold interior borrows while invoking observer callbacks, because callbacks
//! may subscribe, unsubscribe or push new values re-entrantly.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::notification::BindingNotification;

/// A source of binding notifications.
pub trait ValueStream {
    /// Attaches an observer.
    fn subscribe(&self, observer: Observer) -> Subscription;

    /// Returns a human-readable description of the stream, if any.
    fn description(&self) -> Option<String> {
        None
    }
}

/// Callbacks receiving a stream's notifications.
pub struct Observer {
    on_next: Box<dyn Fn(BindingNotification)>,
    on_completed: Box<dyn Fn()>,
}

impl Observer {
    /// Creates an observer with value and completion callbacks.
    pub fn new(
        on_next: impl Fn(BindingNotification) + 'static,
        on_completed: impl Fn() + 'static,
    ) -> Self {
        Self {
            on_next: Box::new(on_next),
            on_completed: Box::new(on_completed),
        }
    }

    /// Creates an observer that ignores completion.
    pub fn from_fn(on_next: impl Fn(BindingNotification) + 'static) -> Self {
        Self::new(on_next, || {})
    }

    /// Delivers a notification.
    #[inline]
    pub fn next(&self, notification: BindingNotification) {
        (self.on_next)(notification);
    }

    /// Delivers completion.
    #[inline]
    pub fn completed(&self) {
        (self.on_completed)();
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").finish_non_exhaustive()
    }
}

/// RAII guard for an attached observer or listener.
///
/// Disposal is idempotent. Dropping the guard disposes it.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Creates a subscription that runs `dispose` once when disposed.
    pub fn new(dispose: impl FnOnce() + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// Creates a subscription with nothing to release.
    pub fn empty() -> Self {
        Self { dispose: None }
    }

    /// Releases the subscription. Subsequent calls do nothing.
    pub fn dispose(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }

    /// Returns `true` once the subscription has been released.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.dispose.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Observers attached to a stream, keyed by subscription id.
///
/// Shared by the stream implementations in this workspace. Delivery iterates
/// over [`ObserverSet::ids`] and looks each observer up again right before
/// calling it, so callbacks may modify the set and an observer removed by an
/// earlier callback receives nothing further.
#[derive(Debug, Default)]
pub struct ObserverSet {
    observers: Vec<(u64, Rc<Observer>)>,
    next_id: u64,
}

impl ObserverSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer and returns its id.
    pub fn insert(&mut self, observer: Observer) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.push((id, Rc::new(observer)));
        id
    }

    /// Removes an observer. Returns `true` if it was present.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    /// Returns the observer with the given id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<Rc<Observer>> {
        self.observers
            .iter()
            .find(|(oid, _)| *oid == id)
            .map(|(_, o)| o.clone())
    }

    /// Returns the number of attached observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` if no observers are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Returns the ids of the attached observers, in subscription order.
    #[must_use]
    pub fn ids(&self) -> Vec<u64> {
        self.observers.iter().map(|(id, _)| *id).collect()
    }

    /// Removes and returns all observers.
    pub fn take_all(&mut self) -> Vec<Rc<Observer>> {
        self.observers.drain(..).map(|(_, o)| o).collect()
    }
}

struct SubjectInner {
    observers: ObserverSet,
    latest: Option<BindingNotification>,
    replay: bool,
    completed: bool,
    description: Option<String>,
}

/// A stream that callers push notifications into.
///
/// [`Subject::new`] creates a hot stream: observers only see what is pushed
/// after they subscribe. [`Subject::behavior`] additionally replays the latest
/// notification to each new observer.
///
/// Cloning a `Subject` creates a new handle to the same stream.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use understory_property::{Observer, Subject, Value, ValueStream};
///
/// let subject = Subject::behavior(Value::Int(1));
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let sink = seen.clone();
/// let sub = subject.subscribe(Observer::from_fn(move |n| {
///     sink.borrow_mut().push(n.value().cloned());
/// }));
/// subject.next(Value::Int(2));
/// drop(sub);
/// subject.next(Value::Int(3));
///
/// assert_eq!(*seen.borrow(), [Some(Value::Int(1)), Some(Value::Int(2))]);
/// assert_eq!(subject.observer_count(), 0);
/// ```
#[derive(Clone)]
pub struct Subject {
    inner: Rc<RefCell<SubjectInner>>,
}

impl Subject {
    /// Creates a hot subject.
    #[must_use]
    pub fn new() -> Self {
        Self::with_replay(None, false)
    }

    /// Creates a subject that replays its latest notification, starting with
    /// `initial`.
    #[must_use]
    pub fn behavior(initial: impl Into<BindingNotification>) -> Self {
        Self::with_replay(Some(initial.into()), true)
    }

    fn with_replay(latest: Option<BindingNotification>, replay: bool) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SubjectInner {
                observers: ObserverSet::new(),
                latest,
                replay,
                completed: false,
                description: None,
            })),
        }
    }

    /// Sets the description reported to consumers.
    #[must_use]
    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.inner.borrow_mut().description = Some(description.into());
        self
    }

    /// Pushes a notification to all observers.
    ///
    /// Does nothing once the subject has completed.
    pub fn next(&self, notification: impl Into<BindingNotification>) {
        let notification = notification.into();
        let ids = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed {
                return;
            }
            if inner.replay {
                inner.latest = Some(notification.clone());
            }
            inner.observers.ids()
        };
        for id in ids {
            let observer = self.inner.borrow().observers.get(id);
            if let Some(observer) = observer {
                observer.next(notification.clone());
            }
        }
    }

    /// Completes the stream, notifying and detaching all observers.
    pub fn complete(&self) {
        let observers = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed {
                return;
            }
            inner.completed = true;
            inner.observers.take_all()
        };
        for observer in observers {
            observer.completed();
        }
    }

    /// Returns `true` once [`Subject::complete`] has been called.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.borrow().completed
    }

    /// Returns the number of attached observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }
}

impl Default for Subject {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueStream for Subject {
    fn subscribe(&self, observer: Observer) -> Subscription {
        let (id, replay) = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed {
                drop(inner);
                observer.completed();
                return Subscription::empty();
            }
            let replay = inner.latest.clone().filter(|_| inner.replay);
            (inner.observers.insert(observer), replay)
        };

        if let Some(notification) = replay {
            let observer = self.inner.borrow().observers.get(id);
            if let Some(observer) = observer {
                observer.next(notification);
            }
        }

        let weak: Weak<RefCell<SubjectInner>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().observers.remove(id);
            }
        })
    }

    fn description(&self) -> Option<String> {
        self.inner.borrow().description.clone()
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Subject")
            .field("observers", &inner.observers.len())
            .field("latest", &inner.latest)
            .field("completed", &inner.completed)
            .finish()
    }
}
