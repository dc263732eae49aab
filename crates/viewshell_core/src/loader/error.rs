//! Loader error taxonomy.

use super::fetch::FetchError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LoaderResult<T> = Result<T, LoaderError>;

/// Why one resource could not produce the requested export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailureKind {
    /// The fetch itself failed; retryable on the next request.
    Fetch(FetchError),
    /// The resource loaded but did not publish the expected symbol.
    SymbolNotFound { export_name: String },
}

/// Failure shared by every waiter of one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub resource_locator: String,
    pub kind: LoadFailureKind,
}

impl LoadError {
    pub fn fetch(resource_locator: impl Into<String>, source: FetchError) -> Self {
        Self {
            resource_locator: resource_locator.into(),
            kind: LoadFailureKind::Fetch(source),
        }
    }

    pub fn symbol_not_found(
        resource_locator: impl Into<String>,
        export_name: impl Into<String>,
    ) -> Self {
        Self {
            resource_locator: resource_locator.into(),
            kind: LoadFailureKind::SymbolNotFound {
                export_name: export_name.into(),
            },
        }
    }

    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self.kind {
            LoadFailureKind::Fetch(_) => "fetch_failed",
            LoadFailureKind::SymbolNotFound { .. } => "symbol_not_found",
        }
    }
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            LoadFailureKind::Fetch(err) => {
                write!(f, "failed to load {}: {err}", self.resource_locator)
            }
            LoadFailureKind::SymbolNotFound { export_name } => write!(
                f,
                "resource {} does not publish symbol `{export_name}`",
                self.resource_locator
            ),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            LoadFailureKind::Fetch(err) => Some(err),
            LoadFailureKind::SymbolNotFound { .. } => None,
        }
    }
}

/// Errors returned by `ModuleLoader::resolve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    UnknownModule(String),
    LoadFailure(LoadError),
}

impl Display for LoaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownModule(value) => write!(f, "unknown module: {value}"),
            Self::LoadFailure(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LoaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownModule(_) => None,
            Self::LoadFailure(err) => Some(err),
        }
    }
}

impl From<LoadError> for LoaderError {
    fn from(value: LoadError) -> Self {
        Self::LoadFailure(value)
    }
}
