// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Live path expressions.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use tracing::debug;
use understory_property::{
    BindingError, BindingErrorType, BindingNotification, ChangeCallback, Observer, ObserverSet,
    Subscription, Value, ValueStream, WeakObjectRef,
};

use crate::node::{ExpressionNode, negate};
use crate::parser::{PathParseError, PathSegment, parse_path};

/// Produces the root object of an expression.
pub type RootFactory = Box<dyn Fn() -> Result<Value, BindingError>>;

enum RootSource {
    /// Objects are held weakly; the application owns them.
    Object(WeakObjectRef),
    Value(Value),
    Stream(Rc<dyn ValueStream>),
    Factory(RootFactory),
}

/// A snapshot of one node's state.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeInfo {
    segment: PathSegment,
    has_target: bool,
    is_listening: bool,
}

impl NodeInfo {
    /// Returns the path segment this node evaluates.
    #[must_use]
    pub fn segment(&self) -> &PathSegment {
        &self.segment
    }

    /// Returns `true` if the node currently references a target.
    #[must_use]
    pub fn has_target(&self) -> bool {
        self.has_target
    }

    /// Returns `true` if the node is listening for changes on its target.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.is_listening
    }
}

struct ObserverInner {
    this: Weak<Self>,
    path: String,
    description: RefCell<String>,
    source: RootSource,
    update: RefCell<Option<Rc<dyn ValueStream>>>,
    chain: RefCell<Vec<ExpressionNode>>,
    /// Number of leading `!` segments.
    negations: usize,
    /// Latest root produced by a stream or factory.
    root: RefCell<Value>,
    observers: RefCell<ObserverSet>,
    latest: RefCell<Option<BindingNotification>>,
    root_subscription: RefCell<Option<Subscription>>,
    update_subscription: RefCell<Option<Subscription>>,
    live: Cell<bool>,
    evaluating: Cell<bool>,
    /// Lowest node index awaiting re-evaluation.
    dirty_from: Cell<Option<usize>>,
    /// Error from the root, attached to the next evaluation result.
    forwarded: RefCell<Option<(BindingError, BindingErrorType)>>,
    /// Teardown requested while an evaluation was running.
    stop_pending: Cell<bool>,
}

impl ObserverInner {
    fn root_value(&self) -> Value {
        match &self.source {
            RootSource::Object(weak) => weak.upgrade().map_or(Value::Unset, Value::Object),
            RootSource::Value(value) => value.clone(),
            RootSource::Stream(_) | RootSource::Factory(_) => self.root.borrow().clone(),
        }
    }

    fn listener_for(&self, index: usize) -> ChangeCallback {
        let this = self.this.clone();
        Rc::new(move || {
            if let Some(inner) = this.upgrade() {
                inner.invalidate(index);
            }
        })
    }

    /// Schedules re-evaluation from node `from` onward and runs it unless an
    /// evaluation is already in progress.
    fn invalidate(&self, from: usize) {
        if !self.live.get() {
            return;
        }
        let from = self.dirty_from.get().map_or(from, |dirty| dirty.min(from));
        self.dirty_from.set(Some(from));
        if self.evaluating.replace(true) {
            return;
        }
        loop {
            if !self.live.get() {
                self.dirty_from.set(None);
                break;
            }
            let Some(from) = self.dirty_from.take() else {
                break;
            };
            let evaluated = self.evaluate(from);
            let forwarded = self.forwarded.borrow_mut().take();
            let notification = match forwarded {
                None => evaluated,
                Some((error, BindingErrorType::Error)) => BindingNotification::error(error),
                Some((error, error_type)) => {
                    let value = evaluated.into_value().unwrap_or_default();
                    BindingNotification::error_with_value(error, error_type, value)
                }
            };
            if self.live.get() {
                self.publish(notification);
            }
        }
        self.evaluating.set(false);
        if self.stop_pending.replace(false) {
            self.stop();
        }
    }

    fn evaluate(&self, from: usize) -> BindingNotification {
        let mut chain = self.chain.borrow_mut();
        let mut current = match from {
            0 => self.root_value(),
            i => chain.get(i).map_or(Value::Unset, ExpressionNode::target_value),
        };
        let mut failure = None;
        for (index, node) in chain.iter_mut().enumerate().skip(from) {
            if failure.is_some() {
                node.set_target(Value::Unset, || self.listener_for(index));
                continue;
            }
            node.set_target(current, || self.listener_for(index));
            match node.read() {
                Ok(value) => current = value,
                Err(error) => {
                    failure = Some(error);
                    current = Value::Unset;
                }
            }
        }
        drop(chain);

        if let Some(error) = failure {
            return BindingNotification::error(error);
        }
        for _ in 0..self.negations {
            match negate(&current) {
                Ok(negated) => current = negated,
                Err(error) => return BindingNotification::error(error),
            }
        }
        BindingNotification::new(current)
    }

    /// Delivers `notification` unless it repeats the previous one.
    fn publish(&self, notification: BindingNotification) {
        {
            let mut latest = self.latest.borrow_mut();
            if latest.as_ref() == Some(&notification) {
                return;
            }
            *latest = Some(notification.clone());
        }
        let ids = self.observers.borrow().ids();
        for id in ids {
            let observer = self.observers.borrow().get(id);
            if let Some(observer) = observer {
                observer.next(notification.clone());
            }
        }
    }

    fn start(&self) {
        self.stop_pending.set(false);
        self.live.set(true);
        match &self.source {
            RootSource::Object(_) | RootSource::Value(_) => self.invalidate(0),
            RootSource::Stream(stream) => {
                let stream = stream.clone();
                let on_next = {
                    let this = self.this.clone();
                    move |notification: BindingNotification| {
                        if let Some(inner) = this.upgrade() {
                            inner.root_notified(notification);
                        }
                    }
                };
                let on_completed = Self::completion(self.this.clone());
                let subscription = stream.subscribe(Observer::new(on_next, on_completed));
                self.keep(&self.root_subscription, subscription);
            }
            RootSource::Factory(_) => {
                self.reload_root();
                let update = self.update.borrow().clone();
                if let Some(update) = update {
                    let on_next = {
                        let this = self.this.clone();
                        move |_: BindingNotification| {
                            if let Some(inner) = this.upgrade() {
                                inner.reload_root();
                            }
                        }
                    };
                    let on_completed = Self::completion(self.this.clone());
                    let subscription = update.subscribe(Observer::new(on_next, on_completed));
                    self.keep(&self.update_subscription, subscription);
                }
            }
        }
    }

    fn completion(this: Weak<Self>) -> impl Fn() {
        move || {
            if let Some(inner) = this.upgrade() {
                inner.complete();
            }
        }
    }

    /// Stores a root or update subscription, unless the expression stopped
    /// while it was being set up.
    fn keep(&self, slot: &RefCell<Option<Subscription>>, mut subscription: Subscription) {
        if self.live.get() {
            *slot.borrow_mut() = Some(subscription);
        } else {
            subscription.dispose();
        }
    }

    fn root_notified(&self, notification: BindingNotification) {
        if let Some(error) = notification.binding_error()
            && notification.error_type() != BindingErrorType::None
        {
            *self.forwarded.borrow_mut() = Some((error.clone(), notification.error_type()));
        }
        if let Some(root) = notification.into_value() {
            *self.root.borrow_mut() = root;
        }
        self.invalidate(0);
    }

    fn reload_root(&self) {
        let RootSource::Factory(factory) = &self.source else {
            return;
        };
        match factory() {
            Ok(root) => *self.root.borrow_mut() = root,
            Err(error) => {
                *self.root.borrow_mut() = Value::Unset;
                *self.forwarded.borrow_mut() = Some((error, BindingErrorType::Error));
            }
        }
        self.invalidate(0);
    }

    /// Completes every subscriber and tears the chain down.
    fn complete(&self) {
        let observers = self.observers.borrow_mut().take_all();
        debug!(expression = %self.description.borrow(), "expression completed");
        self.stop();
        for observer in observers {
            observer.completed();
        }
    }

    fn unsubscribe(&self, id: u64) {
        let now_empty = {
            let mut observers = self.observers.borrow_mut();
            observers.remove(id) && observers.is_empty()
        };
        if now_empty && self.live.get() {
            self.stop();
        }
    }

    /// Releases every subscription, listener and target reference.
    ///
    /// During an evaluation the chain is borrowed, so teardown waits until the
    /// evaluation loop has finished.
    fn stop(&self) {
        self.live.set(false);
        self.dirty_from.set(None);
        if self.evaluating.get() {
            self.stop_pending.set(true);
            return;
        }
        let root_subscription = self.root_subscription.borrow_mut().take();
        let update_subscription = self.update_subscription.borrow_mut().take();
        drop(root_subscription);
        drop(update_subscription);
        for node in self.chain.borrow_mut().iter_mut() {
            node.clear();
        }
        *self.root.borrow_mut() = Value::Unset;
        *self.latest.borrow_mut() = None;
        self.forwarded.borrow_mut().take();
    }
}

/// A live view of a path evaluated against a root.
///
/// The root is a literal value, a [`ValueStream`] of roots, or a factory that
/// is re-invoked whenever an optional update stream fires. While at least one
/// observer is subscribed, the expression listens for changes along the whole
/// path and re-evaluates the affected part of it. When the last observer
/// leaves, every listener and target reference is released.
///
/// Failures along the path (missing members, failed conversions) are
/// delivered as error notifications with an Unset value; they never end the
/// stream. The expression completes when its root stream or update stream
/// completes.
///
/// Cloning an `ExpressionObserver` creates a new handle to the same
/// expression.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use understory_binding::ExpressionObserver;
/// use understory_property::{Observer, PropertyBag, Value, ValueStream};
///
/// let child = Rc::new(PropertyBag::new().with("Name", "Ada"));
/// let root = Rc::new(PropertyBag::new().with("Child", Value::object(child.clone())));
///
/// let expression = ExpressionObserver::new(Value::object(root.clone()), "Child.Name").unwrap();
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
/// let subscription = expression.subscribe(Observer::from_fn(move |n| {
///     sink.borrow_mut().push(n.value().cloned().unwrap_or_default());
/// }));
///
/// child.set("Name", "Grace");
/// root.set("Child", Value::Null);
/// drop(subscription);
///
/// assert_eq!(
///     *seen.borrow(),
///     [Value::from("Ada"), Value::from("Grace"), Value::Unset]
/// );
/// assert_eq!(child.listener_count(), 0);
/// ```
#[derive(Clone)]
pub struct ExpressionObserver {
    inner: Rc<ObserverInner>,
}

impl ExpressionObserver {
    fn with_source(source: RootSource, path: &str) -> Result<Self, PathParseError> {
        let segments = parse_path(path)?;
        let negations = segments.iter().take_while(|s| s.is_not()).count();
        let chain = segments.into_iter().map(ExpressionNode::new).collect();
        Ok(Self {
            inner: Rc::new_cyclic(|this| ObserverInner {
                this: this.clone(),
                path: String::from(path),
                description: RefCell::new(String::from(path)),
                source,
                update: RefCell::new(None),
                chain: RefCell::new(chain),
                negations,
                root: RefCell::new(Value::Unset),
                observers: RefCell::new(ObserverSet::new()),
                latest: RefCell::new(None),
                root_subscription: RefCell::new(None),
                update_subscription: RefCell::new(None),
                live: Cell::new(false),
                evaluating: Cell::new(false),
                dirty_from: Cell::new(None),
                forwarded: RefCell::new(None),
                stop_pending: Cell::new(false),
            }),
        })
    }

    /// Creates an expression over a literal root.
    ///
    /// Object roots are not kept alive by the expression.
    pub fn new(root: impl Into<Value>, path: &str) -> Result<Self, PathParseError> {
        let source = match root.into() {
            Value::Object(object) => RootSource::Object(object.downgrade()),
            value => RootSource::Value(value),
        };
        Self::with_source(source, path)
    }

    /// Creates an expression whose root is the latest value of `root`.
    pub fn from_stream(root: impl ValueStream + 'static, path: &str) -> Result<Self, PathParseError> {
        Self::with_source(RootSource::Stream(Rc::new(root)), path)
    }

    /// Creates an expression whose root is produced by `factory`.
    ///
    /// The factory is invoked when the expression starts and each time the
    /// update stream set with [`ExpressionObserver::with_update`] fires. A
    /// factory error is published as an error notification.
    pub fn from_factory(
        factory: impl Fn() -> Result<Value, BindingError> + 'static,
        path: &str,
    ) -> Result<Self, PathParseError> {
        Self::with_source(RootSource::Factory(Box::new(factory)), path)
    }

    /// Sets the stream that triggers re-evaluation of a factory root.
    ///
    /// Takes effect the next time the expression starts. Only expressions
    /// created with [`ExpressionObserver::from_factory`] use the update
    /// stream; for other roots it is never subscribed.
    #[must_use]
    pub fn with_update(self, update: impl ValueStream + 'static) -> Self {
        *self.inner.update.borrow_mut() = Some(Rc::new(update));
        self
    }

    /// Overrides the description, which defaults to the path.
    #[must_use]
    pub fn with_description(self, description: impl Into<String>) -> Self {
        *self.inner.description.borrow_mut() = description.into();
        self
    }

    /// Returns the path this expression evaluates.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Returns `true` while at least one observer is subscribed.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.live.get()
    }

    /// Returns the number of subscribed observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    /// Returns the last notification delivered, while live.
    #[must_use]
    pub fn latest(&self) -> Option<BindingNotification> {
        self.inner.latest.borrow().clone()
    }

    /// Returns the number of nodes in the chain, negations included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.chain.borrow().len()
    }

    /// Returns a snapshot of node `index`.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<NodeInfo> {
        self.inner.chain.borrow().get(index).map(|node| NodeInfo {
            segment: node.segment().clone(),
            has_target: node.has_target(),
            is_listening: node.is_listening(),
        })
    }

    /// Writes `value` to the end of the path.
    ///
    /// Leading negations are applied to `value` first. Returns `false` if the
    /// expression is not live, the path has no writable leaf, the leaf has no
    /// target, or the target rejects the value.
    pub fn set_value(&self, value: impl Into<Value>) -> bool {
        let inner = &self.inner;
        let mut value = value.into();
        if !inner.live.get() {
            debug!(expression = %inner.description.borrow(), "set_value on an inactive expression");
            return false;
        }
        for _ in 0..inner.negations {
            match negate(&value) {
                Ok(negated) => value = negated,
                Err(error) => {
                    debug!(expression = %inner.description.borrow(), %error, "set_value rejected");
                    return false;
                }
            }
        }

        let leaf = {
            let chain = inner.chain.borrow();
            chain
                .last()
                .filter(|node| !node.segment().is_not())
                .and_then(|node| Some((node.target_object()?, node.segment().clone())))
        };
        // The write may notify synchronously, so the chain must not be borrowed.
        let written = leaf.is_some_and(|(target, segment)| {
            ExpressionNode::write(&target, &segment, value)
        });
        if !written {
            debug!(expression = %inner.description.borrow(), "set_value failed");
        }
        written
    }
}

impl ValueStream for ExpressionObserver {
    /// Attaches an observer.
    ///
    /// The first observer starts the expression. Every new observer
    /// immediately receives the latest notification, or Unset if the path has
    /// not produced one yet.
    fn subscribe(&self, observer: Observer) -> Subscription {
        let inner = &self.inner;
        let (id, first) = {
            let mut observers = inner.observers.borrow_mut();
            let first = observers.is_empty() && !inner.live.get();
            (observers.insert(observer), first)
        };
        if first {
            inner.start();
        }

        let observer = inner.observers.borrow().get(id);
        if let Some(observer) = observer {
            let initial = {
                let mut latest = inner.latest.borrow_mut();
                if latest.is_none() {
                    let unset = BindingNotification::new(Value::Unset);
                    *latest = Some(unset.clone());
                    Some(unset)
                } else if first {
                    // The first observer already saw whatever start produced.
                    None
                } else {
                    latest.clone()
                }
            };
            if let Some(initial) = initial {
                observer.next(initial);
            }
        }

        let inner = self.inner.clone();
        Subscription::new(move || inner.unsubscribe(id))
    }

    fn description(&self) -> Option<String> {
        Some(self.inner.description.borrow().clone())
    }
}

impl fmt::Debug for ExpressionObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = &self.inner;
        f.debug_struct("ExpressionObserver")
            .field("path", &inner.path)
            .field("description", &inner.description.borrow())
            .field("live", &inner.live.get())
            .field("observers", &inner.observers.borrow().len())
            .field("latest", &inner.latest.borrow())
            .field("chain", &inner.chain.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_property::PropertyBag;

    fn record(expression: &ExpressionObserver) -> (Rc<RefCell<Vec<Value>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = expression.subscribe(Observer::from_fn(move |n| {
            sink.borrow_mut().push(n.value().cloned().unwrap_or_default());
        }));
        (seen, subscription)
    }

    #[test]
    fn empty_path_yields_root() {
        let expression = ExpressionObserver::new(Value::Int(5), "").unwrap();
        let (seen, _sub) = record(&expression);
        assert_eq!(*seen.borrow(), [Value::Int(5)]);
        assert_eq!(expression.node_count(), 0);
    }

    #[test]
    fn change_during_publish_is_applied_after_it() {
        let bag = Rc::new(PropertyBag::new().with("Foo", 1));
        let expression = ExpressionObserver::new(Value::object(bag.clone()), "Foo").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let target = bag.clone();
        let _sub = expression.subscribe(Observer::from_fn(move |n| {
            let value = n.value().cloned().unwrap_or_default();
            sink.borrow_mut().push(value.clone());
            if value == Value::Int(1) {
                target.set("Foo", 2);
            }
        }));
        assert_eq!(*seen.borrow(), [Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn method_results_are_owned_by_the_chain() {
        let bag = Rc::new(PropertyBag::new().with_method("Child", |_| {
            Value::object(Rc::new(PropertyBag::new().with("Name", "fresh")))
        }));
        let expression =
            ExpressionObserver::new(Value::object(bag.clone()), "Child().Name").unwrap();
        let (seen, _sub) = record(&expression);
        assert_eq!(*seen.borrow(), [Value::from("fresh")]);
        assert!(!expression.node(0).unwrap().is_listening());
        assert!(expression.node(1).unwrap().is_listening());
    }

    #[test]
    fn description_defaults_to_path() {
        let expression = ExpressionObserver::new(Value::Null, "Foo.Bar").unwrap();
        assert_eq!(expression.description().as_deref(), Some("Foo.Bar"));
        let expression = expression.with_description("custom");
        assert_eq!(expression.description().as_deref(), Some("custom"));
        assert_eq!(expression.path(), "Foo.Bar");
    }

    #[test]
    fn invalid_path_is_rejected() {
        assert!(ExpressionObserver::new(Value::Null, "Foo..Bar").is_err());
    }
}
