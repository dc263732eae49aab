//! View instance and constructor contracts.
//!
//! # Responsibility
//! - Define what the lifecycle manager needs from a view: an optional
//!   teardown.
//! - Define what a loaded module exports: a constructor building views from
//!   navigation context.
//!
//! # Invariants
//! - A view's `teardown` releases every resource it acquired, including its
//!   own subscription scope.
//! - Views without resources rely on the default no-op teardown.

use crate::subscription::EventBus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Navigation arguments handed to a view constructor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationContext {
    pub route: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl NavigationContext {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Everything a constructor receives when the shell activates a view.
#[derive(Clone)]
pub struct ViewContext {
    pub logical_id: String,
    pub navigation: NavigationContext,
    /// Shell-wide event target; views subscribe through their own scope.
    pub events: Rc<EventBus>,
}

/// Error raised by view code during construction or teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    message: String,
}

impl ViewError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ViewError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ViewError {}

/// One instantiated view-controller.
#[async_trait(?Send)]
pub trait View: Any {
    /// Releases subscriptions, timers, chart handles and outstanding requests.
    async fn teardown(&mut self) -> Result<(), ViewError> {
        Ok(())
    }
}

/// Constructor symbol published by a loaded module.
#[async_trait(?Send)]
pub trait ViewConstructor {
    async fn construct(&self, context: ViewContext) -> Result<Box<dyn View>, ViewError>;
}

/// Shared handle to a published constructor.
pub type ViewExport = Rc<dyn ViewConstructor>;

struct FnConstructor<F>(F);

#[async_trait(?Send)]
impl<F, V> ViewConstructor for FnConstructor<F>
where
    F: Fn(ViewContext) -> Result<V, ViewError> + 'static,
    V: View,
{
    async fn construct(&self, context: ViewContext) -> Result<Box<dyn View>, ViewError> {
        let view = (self.0)(context)?;
        Ok(Box::new(view))
    }
}

/// Wraps a synchronous closure as a constructor export.
pub fn view_constructor<F, V>(build: F) -> ViewExport
where
    F: Fn(ViewContext) -> Result<V, ViewError> + 'static,
    V: View,
{
    Rc::new(FnConstructor(build))
}
