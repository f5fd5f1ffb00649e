// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for `PriorityValue`.
//!
//! These drive the resolver through `Subject` sources and check which source
//! wins as values arrive, complete and get removed.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use understory_property::{
    BindingError, BindingErrorType, BindingNotification, BindingPriority, EntryError, EntryOwner,
    Observer, PriorityBindingEntry, PriorityValue, PriorityValueBuilder, Subject, Subscription,
    Value, ValueStream,
};

fn high_low() -> PriorityValue {
    PriorityValueBuilder::new("Test")
        .priorities([BindingPriority::LOCAL_VALUE, BindingPriority::STYLE])
        .build()
}

fn record(stream: &dyn ValueStream) -> (Rc<RefCell<Vec<Value>>>, Subscription) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let sub = stream.subscribe(Observer::from_fn(move |n| {
        sink.borrow_mut().push(n.value().cloned().unwrap_or_default());
    }));
    (seen, sub)
}

#[test]
fn initial_value_is_unset() {
    let value = high_low();
    assert_eq!(value.value(), Value::Unset);
    assert_eq!(value.value_priority(), None);

    let (seen, _sub) = record(&value);
    assert_eq!(*seen.borrow(), [Value::Unset]);
}

#[test]
fn higher_priority_wins_and_reverts() {
    let value = high_low();
    let high = Subject::new();
    let low = Subject::new();
    value.add_binding(BindingPriority::LOCAL_VALUE, &high);
    value.add_binding(BindingPriority::STYLE, &low);

    low.next(Value::from("low"));
    assert_eq!(value.value(), Value::from("low"));
    assert_eq!(value.value_priority(), Some(BindingPriority::STYLE));

    high.next(Value::from("high"));
    assert_eq!(value.value(), Value::from("high"));
    assert_eq!(value.value_priority(), Some(BindingPriority::LOCAL_VALUE));

    // Unset without completing falls back to the lower level.
    high.next(Value::Unset);
    assert_eq!(value.value(), Value::from("low"));

    high.next(Value::from("again"));
    assert_eq!(value.value(), Value::from("again"));
}

#[test]
fn later_binding_shadows_earlier_within_level() {
    let value = high_low();
    let first = Subject::behavior(Value::Int(1));
    let second = Subject::behavior(Value::Int(2));
    value.add_binding(BindingPriority::STYLE, &first);
    assert_eq!(value.value(), Value::Int(1));
    value.add_binding(BindingPriority::STYLE, &second);
    assert_eq!(value.value(), Value::Int(2));

    // Updates to the shadowed binding are not visible.
    first.next(Value::Int(10));
    assert_eq!(value.value(), Value::Int(2));

    second.next(Value::Unset);
    assert_eq!(value.value(), Value::Int(10));
}

#[test]
fn completed_binding_is_excluded() {
    let value = high_low();
    let low = Subject::behavior(Value::from("low"));
    let high = Subject::behavior(Value::from("high"));
    value.add_binding(BindingPriority::STYLE, &low);
    let handle = value.add_binding(BindingPriority::LOCAL_VALUE, &high);
    assert_eq!(value.value(), Value::from("high"));

    high.complete();
    assert!(handle.has_completed());
    // The last value stays stored but no longer competes.
    assert_eq!(handle.value(), Value::from("high"));
    assert_eq!(value.value(), Value::from("low"));

    low.complete();
    assert_eq!(value.value(), Value::Unset);
    assert_eq!(value.value_priority(), None);
}

#[test]
fn emissions_skip_duplicates() {
    let value = high_low();
    let low = Subject::new();
    let high = Subject::new();
    value.add_binding(BindingPriority::STYLE, &low);
    value.add_binding(BindingPriority::LOCAL_VALUE, &high);
    let (seen, _sub) = record(&value);

    low.next(Value::Int(1));
    low.next(Value::Int(1));
    high.next(Value::Int(1));
    high.next(Value::Int(2));

    assert_eq!(*seen.borrow(), [Value::Unset, Value::Int(1), Value::Int(2)]);
    assert_eq!(value.value_priority(), Some(BindingPriority::LOCAL_VALUE));
}

#[test]
fn removing_a_binding_recomputes() {
    let value = high_low();
    let low = Subject::behavior(Value::Int(1));
    let high = Subject::behavior(Value::Int(2));
    value.add_binding(BindingPriority::STYLE, &low);
    let handle = value.add_binding(BindingPriority::LOCAL_VALUE, &high);
    assert_eq!(value.binding_count(), 2);
    assert_eq!(handle.priority(), BindingPriority::LOCAL_VALUE);
    assert_eq!(value.value(), Value::Int(2));

    handle.remove();
    assert_eq!(value.binding_count(), 1);
    assert_eq!(high.observer_count(), 0);
    assert_eq!(value.value(), Value::Int(1));

    // Values pushed after removal are ignored.
    high.next(Value::Int(3));
    assert_eq!(value.value(), Value::Int(1));
}

#[test]
fn errors_are_forwarded_and_degrade_to_lower_level() {
    let value = high_low();
    let low = Subject::behavior(Value::from("fallback"));
    let high = Subject::new().with_description("Foo.Bar");
    value.add_binding(BindingPriority::STYLE, &low);
    value.add_binding(BindingPriority::LOCAL_VALUE, &high);

    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    let _errors_sub = value.subscribe_errors(move |e| sink.borrow_mut().push(e.clone()));

    high.next(Value::from("ok"));
    assert_eq!(value.value(), Value::from("ok"));

    let error = BindingError::MissingMember {
        member: "Bar".into(),
        type_name: "Foo".into(),
    };
    high.next(BindingNotification::error(error.clone()));
    assert_eq!(value.value(), Value::from("fallback"));
    assert_eq!(
        *errors.borrow(),
        [EntryError {
            priority: BindingPriority::LOCAL_VALUE,
            description: Some("Foo.Bar".into()),
            error: error.clone(),
        }]
    );

    // Validation errors carry a value and are not reported as failures.
    high.next(BindingNotification::error_with_value(
        error,
        BindingErrorType::DataValidationError,
        Value::from("validated"),
    ));
    assert_eq!(value.value(), Value::from("validated"));
    assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn error_without_value_keeps_last_value() {
    let value = high_low();
    let source = Subject::behavior(Value::Int(4));
    value.add_binding(BindingPriority::STYLE, &source);
    source.next(BindingNotification::error_without_value(
        BindingError::Source("offline".into()),
        BindingErrorType::Error,
    ));
    assert_eq!(value.value(), Value::Int(4));
}

#[test]
fn resolvers_nest() {
    let inner = PriorityValueBuilder::new("Inner")
        .priority(BindingPriority::LOCAL_VALUE)
        .build();
    let outer = high_low();
    outer.set_value(Value::Int(0), BindingPriority::STYLE);
    outer.add_binding(BindingPriority::LOCAL_VALUE, &inner);
    assert_eq!(outer.value(), Value::Int(0));

    inner.set_value(Value::Int(7), BindingPriority::LOCAL_VALUE);
    assert_eq!(outer.value(), Value::Int(7));

    inner.clear_value(BindingPriority::LOCAL_VALUE);
    assert_eq!(outer.value(), Value::Int(0));

    // The outer binding keeps the inner resolver alive.
    drop(inner);
    assert_eq!(outer.value(), Value::Int(0));
}

#[test]
fn synchronous_source_applies_during_add() {
    let value = high_low();
    let (seen, _sub) = record(&value);
    let source = Subject::behavior(Value::from("now"));
    value.add_binding(BindingPriority::STYLE, &source);
    assert_eq!(*seen.borrow(), [Value::Unset, Value::from("now")]);
}

struct NoOwner;

impl EntryOwner for NoOwner {
    fn entry_changed(&self, _: BindingPriority, _: u64) {}
    fn entry_error(&self, _: BindingPriority, _: u64, _: &BindingError) {}
    fn entry_completed(&self, _: BindingPriority, _: u64) {}
}

#[test]
#[should_panic(expected = "PriorityBindingEntry::start() called more than once")]
fn starting_an_entry_twice_panics() {
    let owner = Rc::new(NoOwner);
    let weak: Weak<NoOwner> = Rc::downgrade(&owner);
    let entry = PriorityBindingEntry::new(BindingPriority::STYLE, 0);
    let source = Subject::new();
    entry.start(&source, weak.clone());
    entry.start(&source, weak);
}

#[test]
#[should_panic(expected = "has no level for priority")]
fn binding_at_unknown_priority_panics() {
    let value = high_low();
    let source = Subject::new();
    value.add_binding(BindingPriority::ANIMATION, &source);
}
