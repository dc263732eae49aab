//! Per-locator load state.

use super::error::LoadError;
use super::fetch::ModuleExports;
use futures::future::{LocalBoxFuture, Shared};
use std::rc::Rc;

pub(crate) type LoadOutcome = Result<Rc<ModuleExports>, LoadError>;

/// In-flight load shared by every concurrent requester of one locator.
pub(crate) type SharedLoad = Shared<LocalBoxFuture<'static, LoadOutcome>>;

/// Public view of one locator's load state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

impl LoadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        }
    }
}

pub(crate) enum LoadState {
    Loading(SharedLoad),
    Loaded(Rc<ModuleExports>),
    Failed(LoadError),
}

impl LoadState {
    pub(crate) fn status(&self) -> LoadStatus {
        match self {
            Self::Loading(_) => LoadStatus::Loading,
            Self::Loaded(_) => LoadStatus::Loaded,
            Self::Failed(_) => LoadStatus::Failed,
        }
    }
}

/// Counters describing loader traffic since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Every `resolve` or `preload` for a registered module.
    pub requests: u64,
    /// Requests answered from a loaded resource.
    pub cache_hits: u64,
    /// Requests that joined a load already in flight.
    pub coalesced: u64,
    /// Network loads started.
    pub fetches: u64,
    /// Network loads that ended in failure.
    pub failures: u64,
}
