//! Activation and teardown errors.

use crate::loader::{LoadError, LoaderError};
use crate::view::ViewError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ActivationResult<T> = Result<T, ActivationError>;

/// Errors surfaced to the caller of `activate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    UnknownModule(String),
    LoadFailure(LoadError),
    Construction { logical_id: String, source: ViewError },
}

impl ActivationError {
    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownModule(_) => "unknown_module",
            Self::LoadFailure(err) => err.code(),
            Self::Construction { .. } => "construction_failed",
        }
    }
}

impl Display for ActivationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownModule(value) => write!(f, "unknown module: {value}"),
            Self::LoadFailure(err) => write!(f, "{err}"),
            Self::Construction { logical_id, source } => {
                write!(f, "failed to construct view {logical_id}: {source}")
            }
        }
    }
}

impl Error for ActivationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownModule(_) => None,
            Self::LoadFailure(err) => Some(err),
            Self::Construction { source, .. } => Some(source),
        }
    }
}

impl From<LoaderError> for ActivationError {
    fn from(value: LoaderError) -> Self {
        match value {
            LoaderError::UnknownModule(id) => Self::UnknownModule(id),
            LoaderError::LoadFailure(err) => Self::LoadFailure(err),
        }
    }
}

/// How a teardown misbehaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownFailure {
    Returned(ViewError),
    Panicked(String),
}

/// A contained teardown failure; logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownError {
    pub logical_id: String,
    pub failure: TeardownFailure,
}

impl Display for TeardownError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.failure {
            TeardownFailure::Returned(err) => {
                write!(f, "teardown of view {} failed: {err}", self.logical_id)
            }
            TeardownFailure::Panicked(message) => {
                write!(f, "teardown of view {} panicked: {message}", self.logical_id)
            }
        }
    }
}

impl Error for TeardownError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.failure {
            TeardownFailure::Returned(err) => Some(err),
            TeardownFailure::Panicked(_) => None,
        }
    }
}
