//! Error Types
//!
//! Errors are split by concern. Soft data errors (a dangling edge, a
//! malformed loader record) never surface here; they are logged and the
//! offending entity is skipped. What remains are configuration errors from
//! the style pipeline, failures of the layout executor, and document-level
//! loader failures.

use std::time::Duration;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error wrapping every concern.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Style(#[from] StyleError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Stylesheet configuration errors.
///
/// These are programmer errors: they are raised while a stylesheet is
/// constructed or while an accessor is resolved, and are never retried.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("illegal stylesheet type: {0:?}")]
    UnknownType(String),

    #[error("stylesheet is missing its `type`")]
    MissingType,

    #[error("unknown visual accessor `{accessor}` for style type `{style_type}`")]
    UnknownAccessor {
        accessor: String,
        style_type: String,
    },

    #[error("unknown style property `{0}`")]
    UnknownProperty(String),

    #[error("invalid value for `{property}`: {reason}")]
    InvalidValue { property: String, reason: String },

    #[error("unparsable color {0}")]
    InvalidColor(String),

    #[error("invalid scale: {0}")]
    InvalidScale(String),

    #[error("`{0}` is reserved and cannot be used as a state name")]
    ReservedState(String),

    #[error("unknown interaction state `{0}`")]
    UnknownState(String),

    #[error("state map for `{0}` contains another state map")]
    NestedStateMap(String),

    #[error("selector `{0}` must map to an object of style rules")]
    InvalidSelector(String),
}

impl StyleError {
    pub(crate) fn invalid(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            property: property.into(),
            reason: reason.into(),
        }
    }
}

/// Layout strategy failures.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to start layout executor: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("failed to encode simulation request: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode simulation request: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("layout worker stalled: no message within {after:?}")]
    Stalled { after: Duration },

    #[error("layout worker failed: {0}")]
    Worker(String),
}

/// Loader document errors.
///
/// Individual malformed records are skipped, not reported here.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid graph document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("graph document is missing the `{0}` collection")]
    MissingCollection(&'static str),
}
