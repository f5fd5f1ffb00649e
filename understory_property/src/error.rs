// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recoverable binding errors.
//!
//! These never cross a subscribe boundary as a panic or a stream failure.
//! They travel inside a [`BindingNotification`](crate::BindingNotification)
//! next to an Unset (or partial) value so that one bad binding cannot tear
//! down the rest of the resolution graph.

use alloc::string::String;

use thiserror::Error;

/// A recoverable error produced while resolving a binding.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindingError {
    /// A path segment was not found on the current target.
    #[error("could not find member '{member}' on '{type_name}'")]
    MissingMember {
        /// The member, indexer or method that was looked up.
        member: String,
        /// The type of the target it was looked up on.
        type_name: String,
    },
    /// A value could not be parsed as the requested type.
    #[error("unable to convert '{value}' to {target}")]
    Conversion {
        /// The value that failed to convert.
        value: String,
        /// The requested type.
        target: &'static str,
    },
    /// A value's runtime type does not support the requested operation.
    #[error("invalid cast from '{type_name}' to {target}")]
    Cast {
        /// The runtime type of the value.
        type_name: String,
        /// The requested type.
        target: &'static str,
    },
    /// The binding source itself failed (for example a root factory).
    #[error("binding source failed: {0}")]
    Source(String),
}

/// How a [`BindingNotification`](crate::BindingNotification) is tagged.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BindingErrorType {
    /// The notification carries no error.
    #[default]
    None,
    /// The binding failed to produce a value.
    Error,
    /// The value was produced but failed validation.
    DataValidationError,
}
