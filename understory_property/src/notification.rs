// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Values tagged with binding errors.

use crate::error::{BindingError, BindingErrorType};
use crate::value::Value;

/// A notification delivered by a [`ValueStream`](crate::ValueStream).
///
/// Plain values are notifications without an error. Failed bindings deliver a
/// notification that carries the error, its [`BindingErrorType`], and usually
/// [`Value::Unset`] as the value.
///
/// # Example
///
/// ```rust
/// use understory_property::{BindingError, BindingErrorType, BindingNotification, Value};
///
/// let plain = BindingNotification::from(Value::Int(1));
/// assert_eq!(plain.value(), Some(&Value::Int(1)));
/// assert!(!plain.is_error());
///
/// let failed = BindingNotification::error(BindingError::Source("offline".into()));
/// assert_eq!(failed.value(), Some(&Value::Unset));
/// assert_eq!(failed.error_type(), BindingErrorType::Error);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BindingNotification {
    value: Option<Value>,
    error: Option<BindingError>,
    error_type: BindingErrorType,
}

impl BindingNotification {
    /// Creates a plain value notification.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value: Some(value),
            error: None,
            error_type: BindingErrorType::None,
        }
    }

    /// Creates an error notification whose value is Unset.
    #[must_use]
    pub fn error(error: BindingError) -> Self {
        Self::error_with_value(error, BindingErrorType::Error, Value::Unset)
    }

    /// Creates an error notification carrying a fallback or partial value.
    #[must_use]
    pub fn error_with_value(error: BindingError, error_type: BindingErrorType, value: Value) -> Self {
        Self {
            value: Some(value),
            error: Some(error),
            error_type,
        }
    }

    /// Creates an error notification that carries no value at all.
    ///
    /// Consumers keep whatever value they last held.
    #[must_use]
    pub fn error_without_value(error: BindingError, error_type: BindingErrorType) -> Self {
        Self {
            value: None,
            error: Some(error),
            error_type,
        }
    }

    /// Returns the value, if the notification carries one.
    #[must_use]
    #[inline]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Consumes the notification and returns its value.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    /// Returns `true` if the notification carries a value.
    #[must_use]
    #[inline]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Returns the error, if any.
    #[must_use]
    #[inline]
    pub fn binding_error(&self) -> Option<&BindingError> {
        self.error.as_ref()
    }

    /// Returns how this notification is tagged.
    #[must_use]
    #[inline]
    pub fn error_type(&self) -> BindingErrorType {
        self.error_type
    }

    /// Returns `true` if the notification is tagged as an error.
    #[must_use]
    #[inline]
    pub fn is_error(&self) -> bool {
        self.error_type == BindingErrorType::Error
    }
}

impl From<Value> for BindingNotification {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
