// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding priority ranks.

use core::fmt;

/// The precedence rank of a value source.
///
/// Lower ranks win. The well-known ranks leave room for application-defined
/// levels in between or beyond them.
///
/// # Example
///
/// ```rust
/// use understory_property::BindingPriority;
///
/// assert!(BindingPriority::ANIMATION < BindingPriority::LOCAL_VALUE);
/// assert!(BindingPriority::LOCAL_VALUE.outranks(BindingPriority::STYLE));
/// assert_eq!(BindingPriority::new(7).rank(), 7);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingPriority(i32);

impl BindingPriority {
    /// A value that comes from an animation.
    pub const ANIMATION: Self = Self(-1);
    /// A local value.
    pub const LOCAL_VALUE: Self = Self(0);
    /// A triggered style setter.
    pub const STYLE_TRIGGER: Self = Self(1);
    /// A binding to a property on the templated parent.
    pub const TEMPLATED_PARENT: Self = Self(2);
    /// A style setter.
    pub const STYLE: Self = Self(3);

    /// Creates a priority with the given rank.
    #[must_use]
    #[inline]
    pub const fn new(rank: i32) -> Self {
        Self(rank)
    }

    /// Returns the rank. Lower ranks take precedence.
    #[must_use]
    #[inline]
    pub const fn rank(self) -> i32 {
        self.0
    }

    /// Returns `true` if `self` takes precedence over `other`.
    #[must_use]
    #[inline]
    pub const fn outranks(self, other: Self) -> bool {
        self.0 < other.0
    }

    fn name(self) -> Option<&'static str> {
        match self {
            Self::ANIMATION => Some("Animation"),
            Self::LOCAL_VALUE => Some("LocalValue"),
            Self::STYLE_TRIGGER => Some("StyleTrigger"),
            Self::TEMPLATED_PARENT => Some("TemplatedParent"),
            Self::STYLE => Some("Style"),
            _ => None,
        }
    }
}

impl fmt::Debug for BindingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BindingPriority").field(&self.0).finish()
    }
}

impl fmt::Display for BindingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn ordering() {
        let mut ranks = [
            BindingPriority::STYLE,
            BindingPriority::ANIMATION,
            BindingPriority::TEMPLATED_PARENT,
            BindingPriority::LOCAL_VALUE,
        ];
        ranks.sort();
        assert_eq!(
            ranks,
            [
                BindingPriority::ANIMATION,
                BindingPriority::LOCAL_VALUE,
                BindingPriority::TEMPLATED_PARENT,
                BindingPriority::STYLE,
            ]
        );
        assert!(!BindingPriority::STYLE.outranks(BindingPriority::STYLE));
    }

    #[test]
    fn formatting() {
        assert_eq!(format!("{}", BindingPriority::STYLE_TRIGGER), "StyleTrigger");
        assert_eq!(format!("{}", BindingPriority::new(12)), "12");
        assert_eq!(
            format!("{:?}", BindingPriority::LOCAL_VALUE),
            "BindingPriority(0)"
        );
    }
}
