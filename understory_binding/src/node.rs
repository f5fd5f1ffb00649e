// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Live traversal state for one path segment.

use alloc::string::{String, ToString};
use core::fmt;

use tracing::trace;
use understory_property::{
    BindingError, ChangeCallback, ObjectRef, Subscription, Value, WeakObjectRef,
};

use crate::parser::PathSegment;

/// What a node currently points at.
#[derive(Debug, Default)]
enum Target {
    #[default]
    Absent,
    /// Objects are never owned by the chain.
    Object(WeakObjectRef),
    /// A primitive that further segments cannot traverse into.
    Value(Value),
}

impl Target {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Unset | Value::Null => Self::Absent,
            Value::Object(object) => Self::Object(object.downgrade()),
            other => Self::Value(other),
        }
    }

    fn same_as(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Absent, Value::Unset | Value::Null) => true,
            (Self::Object(weak), Value::Object(object)) => {
                weak.upgrade().is_some_and(|current| current.ptr_eq(object))
            }
            (Self::Value(current), value) => current == value,
            _ => false,
        }
    }
}

/// One segment of an expression chain.
///
/// A node holds a non-owning reference to its target and, while it has one,
/// the change listener observing the member it reads.
pub(crate) struct ExpressionNode {
    segment: PathSegment,
    target: Target,
    listener: Option<Subscription>,
    /// Method results are owned here, as nothing else in the graph holds them.
    owned_result: Option<Value>,
}

impl ExpressionNode {
    pub(crate) fn new(segment: PathSegment) -> Self {
        Self {
            segment,
            target: Target::Absent,
            listener: None,
            owned_result: None,
        }
    }

    pub(crate) fn segment(&self) -> &PathSegment {
        &self.segment
    }

    pub(crate) fn has_target(&self) -> bool {
        !matches!(self.target, Target::Absent)
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Returns the current target as a value.
    pub(crate) fn target_value(&self) -> Value {
        match &self.target {
            Target::Absent => Value::Unset,
            Target::Object(weak) => weak.upgrade().map_or(Value::Unset, Value::Object),
            Target::Value(value) => value.clone(),
        }
    }

    /// Returns the target object, if the target is a live object.
    pub(crate) fn target_object(&self) -> Option<ObjectRef> {
        match &self.target {
            Target::Object(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// Points the node at `target`.
    ///
    /// The previous listener is released before a new one is attached. If the
    /// target is unchanged the existing listener is kept. `listener` is only
    /// called when a listener is attached.
    pub(crate) fn set_target(&mut self, target: Value, listener: impl FnOnce() -> ChangeCallback) {
        if self.target.same_as(&target) {
            return;
        }
        if let Some(mut old) = self.listener.take() {
            old.dispose();
        }
        self.owned_result = None;
        trace!(segment = %self.segment, target = ?target, "retarget");
        self.target = Target::from_value(target);

        if let Target::Object(weak) = &self.target
            && let Some(object) = weak.upgrade()
        {
            self.listener = match &self.segment {
                PathSegment::Member(name) => object
                    .notifier()
                    .map(|notifier| notifier.subscribe_member(name, listener())),
                PathSegment::Index(_) => object
                    .indexer()
                    .and_then(|indexer| indexer.subscribe_index(listener())),
                PathSegment::Not | PathSegment::Method(_) => None,
            };
        }
    }

    /// Releases the listener and the target.
    pub(crate) fn clear(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.dispose();
        }
        self.target = Target::Absent;
        self.owned_result = None;
    }

    /// Reads this node's value from its target.
    ///
    /// An absent target yields Unset without any lookup. Negation nodes pass
    /// their target through.
    pub(crate) fn read(&mut self) -> Result<Value, BindingError> {
        let object = match &self.target {
            Target::Absent => return Ok(Value::Unset),
            Target::Value(value) if self.segment.is_not() => return Ok(value.clone()),
            Target::Value(value) => return Err(self.missing(value.type_name())),
            Target::Object(weak) => match weak.upgrade() {
                Some(object) => object,
                None => return Ok(Value::Unset),
            },
        };

        match &self.segment {
            PathSegment::Not => Ok(Value::Object(object)),
            PathSegment::Member(name) => object
                .get_member(name)
                .ok_or_else(|| self.missing(object.type_name())),
            PathSegment::Index(args) => match object.indexer() {
                Some(indexer) => Ok(indexer.get_index(args).unwrap_or_default()),
                None => Err(self.missing(object.type_name())),
            },
            PathSegment::Method(name) => {
                let result = object
                    .invoke(name)
                    .ok_or_else(|| self.missing(object.type_name()))?;
                self.owned_result = Some(result.clone());
                Ok(result)
            }
        }
    }

    fn missing(&self, type_name: &str) -> BindingError {
        BindingError::MissingMember {
            member: self.segment.to_string(),
            type_name: String::from(type_name),
        }
    }

    /// Writes `value` through `segment` into `target`.
    ///
    /// Only member and indexer segments are writable.
    pub(crate) fn write(target: &ObjectRef, segment: &PathSegment, value: Value) -> bool {
        match segment {
            PathSegment::Member(name) => target.set_member(name, value),
            PathSegment::Index(args) => target
                .indexer()
                .is_some_and(|indexer| indexer.set_index(args, value)),
            PathSegment::Not | PathSegment::Method(_) => false,
        }
    }
}

impl fmt::Debug for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionNode")
            .field("segment", &self.segment)
            .field("target", &self.target)
            .field("listening", &self.listener.is_some())
            .field("owned_result", &self.owned_result)
            .finish()
    }
}

/// Logical negation as applied by `!` path segments.
///
/// Booleans are complemented, numbers are `true` when non-zero and strings
/// must spell `true` or `false` (case-insensitive). Null counts as `false`;
/// Unset stays Unset.
pub(crate) fn negate(value: &Value) -> Result<Value, BindingError> {
    let truth = match value {
        Value::Unset => return Ok(Value::Unset),
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                true
            } else if s.eq_ignore_ascii_case("false") {
                false
            } else {
                return Err(BindingError::Conversion {
                    value: String::from(s),
                    target: "bool",
                });
            }
        }
        Value::Object(_) | Value::Opaque(_) => {
            return Err(BindingError::Cast {
                type_name: String::from(value.type_name()),
                target: "bool",
            });
        }
    };
    Ok(Value::Bool(!truth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::Cell;
    use understory_property::PropertyBag;

    fn noop() -> ChangeCallback {
        Rc::new(|| {})
    }

    #[test]
    fn negation_table() {
        assert_eq!(negate(&Value::Bool(true)), Ok(Value::Bool(false)));
        assert_eq!(negate(&Value::Int(0)), Ok(Value::Bool(true)));
        assert_eq!(negate(&Value::Int(1)), Ok(Value::Bool(false)));
        assert_eq!(negate(&Value::Float(0.5)), Ok(Value::Bool(false)));
        assert_eq!(negate(&Value::from("false")), Ok(Value::Bool(true)));
        assert_eq!(negate(&Value::from("True")), Ok(Value::Bool(false)));
        assert_eq!(negate(&Value::Null), Ok(Value::Bool(true)));
        assert_eq!(negate(&Value::Unset), Ok(Value::Unset));
        assert!(matches!(
            negate(&Value::from("foo")),
            Err(BindingError::Conversion { .. })
        ));
        let object = Value::object(Rc::new(PropertyBag::new()));
        assert!(matches!(negate(&object), Err(BindingError::Cast { .. })));
    }

    #[test]
    fn absent_target_reads_unset() {
        let mut node = ExpressionNode::new(PathSegment::Member("Foo".into()));
        assert_eq!(node.read(), Ok(Value::Unset));
        node.set_target(Value::Null, noop);
        assert!(!node.has_target());
        assert_eq!(node.read(), Ok(Value::Unset));
    }

    #[test]
    fn member_on_primitive_is_missing() {
        let mut node = ExpressionNode::new(PathSegment::Member("Foo".into()));
        node.set_target(Value::Int(3), noop);
        assert_eq!(
            node.read(),
            Err(BindingError::MissingMember {
                member: "Foo".into(),
                type_name: "int".into(),
            })
        );
    }

    #[test]
    fn retargeting_swaps_listener() {
        let first = Rc::new(PropertyBag::new().with("Foo", 1));
        let second = Rc::new(PropertyBag::new().with("Foo", 2));
        let attached = Rc::new(Cell::new(0));
        let mut node = ExpressionNode::new(PathSegment::Member("Foo".into()));

        let counter = || {
            attached.set(attached.get() + 1);
            noop()
        };
        node.set_target(Value::object(first.clone()), counter);
        assert_eq!(first.listener_count(), 1);
        assert_eq!(node.read(), Ok(Value::Int(1)));

        // Same target keeps the listener.
        node.set_target(Value::object(first.clone()), counter);
        assert_eq!(attached.get(), 1);

        node.set_target(Value::object(second.clone()), counter);
        assert_eq!(first.listener_count(), 0);
        assert_eq!(second.listener_count(), 1);
        assert_eq!(node.read(), Ok(Value::Int(2)));

        node.clear();
        assert_eq!(second.listener_count(), 0);
        assert!(!node.has_target());
        assert!(!node.is_listening());
    }

    #[test]
    fn target_is_not_owned() {
        let bag = Rc::new(PropertyBag::new().with("Foo", 1));
        let mut node = ExpressionNode::new(PathSegment::Member("Foo".into()));
        node.set_target(Value::object(bag.clone()), noop);
        assert_eq!(Rc::strong_count(&bag), 1);
        drop(bag);
        assert_eq!(node.read(), Ok(Value::Unset));
    }

    #[test]
    fn write_through_member() {
        let bag = Rc::new(PropertyBag::new().with("Foo", "a"));
        let target = ObjectRef::new(bag.clone());
        let segment = PathSegment::Member("Foo".into());
        assert!(ExpressionNode::write(&target, &segment, Value::from("b")));
        assert_eq!(bag.get("Foo"), Some(Value::from("b")));
        assert!(!ExpressionNode::write(
            &target,
            &PathSegment::Method("Foo".into()),
            Value::from("c")
        ));
    }
}
