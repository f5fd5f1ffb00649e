// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic values carried through bindings.
//!
//! [`Value`] is what every stream delivers, what every path node produces and
//! what the priority resolver picks between. [`Value::Unset`] is the sentinel
//! for "no value currently available"; it is distinct from [`Value::Null`],
//! which is a legitimate value meaning "absent object".
//!
//! Objects in the traversed graph are carried as [`ObjectRef`], a shared
//! handle compared by identity. Arbitrary Rust values that are not part of the
//! object graph travel as [`ErasedValue`].

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use core::any::{Any, TypeId};
use core::fmt;
use core::ops::Deref;

use crate::object::DynamicObject;

/// A dynamically typed value.
///
/// Equality is structural for primitives and by identity for
/// [`Value::Object`]. [`Value::Unset`] only ever equals itself.
///
/// # Example
///
/// ```rust
/// use understory_property::Value;
///
/// let unset = Value::default();
/// assert!(unset.is_unset());
/// assert_ne!(unset, Value::Null);
///
/// assert_eq!(Value::from("foo").as_str(), Some("foo"));
/// assert_eq!(Value::from(42), Value::Int(42));
/// ```
#[derive(Clone, Default)]
pub enum Value {
    /// No value is currently available.
    #[default]
    Unset,
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// An immutable string.
    String(Rc<str>),
    /// An object from the application's object graph.
    Object(ObjectRef),
    /// Any other Rust value.
    Opaque(ErasedValue),
}

impl Value {
    /// Wraps a shared object.
    #[must_use]
    pub fn object<T: DynamicObject>(object: Rc<T>) -> Self {
        Self::Object(ObjectRef::new(object))
    }

    /// Wraps an arbitrary Rust value.
    #[must_use]
    pub fn opaque<T: Clone + PartialEq + fmt::Debug + 'static>(value: T) -> Self {
        Self::Opaque(ErasedValue::new(value))
    }

    /// Returns `true` for the [`Value::Unset`] sentinel.
    #[must_use]
    #[inline]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if there is nothing to traverse into: Unset or Null.
    #[must_use]
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Unset | Self::Null)
    }

    /// Returns the boolean, if this is a [`Value::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is a [`Value::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the number, if this is a [`Value::Float`] or [`Value::Int`].
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the object handle, if this is a [`Value::Object`].
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Attempts to downcast an opaque value.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Opaque(v) => v.downcast_ref(),
            _ => None,
        }
    }

    /// Returns a short name for the runtime type of this value.
    ///
    /// Used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Unset => "unset",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Object(o) => o.type_name(),
            Self::Opaque(v) => v.type_name(),
        }
    }

    /// Returns `true` if both values have the same variant.
    #[must_use]
    pub fn same_kind(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unset, Self::Unset) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("Unset"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Object(o) => fmt::Debug::fmt(o, f),
            Self::Opaque(v) => fmt::Debug::fmt(v, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("(unset)"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::Object(o) => write!(f, "<{}>", o.type_name()),
            Self::Opaque(v) => write!(f, "<{}>", v.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

/// A shared handle to an object in the application's object graph.
///
/// The handle owns a strong reference. Binding internals keep only
/// [`WeakObjectRef`]s so that the graph stays owned by the application.
#[derive(Clone)]
pub struct ObjectRef(Rc<dyn DynamicObject>);

impl ObjectRef {
    /// Wraps a concrete shared object.
    #[must_use]
    pub fn new<T: DynamicObject>(object: Rc<T>) -> Self {
        Self(object)
    }

    /// Wraps an already type-erased shared object.
    #[must_use]
    pub fn from_rc(object: Rc<dyn DynamicObject>) -> Self {
        Self(object)
    }

    /// Creates a non-owning reference to the same object.
    #[must_use]
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Rc::downgrade(&self.0))
    }

    /// Returns `true` if both handles refer to the same object.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Attempts to downcast to the concrete object type.
    #[must_use]
    pub fn downcast_ref<T: DynamicObject>(&self) -> Option<&T> {
        let any: &dyn Any = &*self.0;
        any.downcast_ref()
    }
}

impl Deref for ObjectRef {
    type Target = dyn DynamicObject;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Object").field(&self.0.type_name()).finish()
    }
}

/// A non-owning reference to an object in the application's object graph.
#[derive(Clone)]
pub struct WeakObjectRef(Weak<dyn DynamicObject>);

impl WeakObjectRef {
    /// Returns a strong handle if the object is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    /// Returns `true` if both references point at the same allocation.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObjectRef")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

/// A type-erased Rust value.
///
/// This wraps a value of any `'static + Clone + PartialEq + Debug` type,
/// storing it on the heap with its type information for later downcasting.
///
/// # Example
///
/// ```rust
/// use understory_property::ErasedValue;
///
/// let value = ErasedValue::new(42_i32);
/// assert!(value.is::<i32>());
/// assert_eq!(value.downcast_ref::<i32>(), Some(&42));
/// assert_eq!(value, ErasedValue::new(42_i32));
/// ```
pub struct ErasedValue {
    inner: Box<dyn ErasedValueTrait>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ErasedValue {
    /// Creates a new erased value from a concrete value.
    #[must_use]
    pub fn new<T: Clone + PartialEq + fmt::Debug + 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            inner: Box::new(value),
        }
    }

    /// Returns the [`TypeId`] of the contained value.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the contained value.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the contained value is of type `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Attempts to downcast to a reference of type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if self.is::<T>() {
            self.inner.as_any().downcast_ref()
        } else {
            None
        }
    }
}

impl Clone for ErasedValue {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_boxed(),
            type_id: self.type_id,
            type_name: self.type_name,
        }
    }
}

impl PartialEq for ErasedValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.inner.eq_erased(other.inner.as_any())
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque(")?;
        self.inner.fmt_erased(f)?;
        f.write_str(")")
    }
}

trait ErasedValueTrait: Any {
    fn as_any(&self) -> &dyn Any;
    fn clone_boxed(&self) -> Box<dyn ErasedValueTrait>;
    fn eq_erased(&self, other: &dyn Any) -> bool;
    fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> ErasedValueTrait for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn ErasedValueTrait> {
        Box::new(self.clone())
    }

    fn eq_erased(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
