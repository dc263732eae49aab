//! Resource fetch contract and export surface.

use crate::view::ViewExport;
use futures::future::{self, FutureExt, LocalBoxFuture};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Symbols published by one fetched resource.
#[derive(Clone, Default)]
pub struct ModuleExports {
    symbols: BTreeMap<String, ViewExport>,
}

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style publish of one symbol.
    pub fn with(mut self, export_name: impl Into<String>, constructor: ViewExport) -> Self {
        self.publish(export_name, constructor);
        self
    }

    /// Publishes one symbol, replacing any previous symbol with that name.
    pub fn publish(&mut self, export_name: impl Into<String>, constructor: ViewExport) {
        self.symbols.insert(export_name.into(), constructor);
    }

    pub fn get(&self, export_name: &str) -> Option<ViewExport> {
        self.symbols.get(export_name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.symbols.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Debug for ModuleExports {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleExports")
            .field("symbols", &self.names())
            .finish()
    }
}

/// Failure reported by a fetcher for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for FetchError {}

pub type FetchFuture = LocalBoxFuture<'static, Result<ModuleExports, FetchError>>;

/// Network side of the loader: turns a resource locator into its exports.
///
/// Each call to `fetch` counts as one network load.
pub trait ModuleFetcher {
    fn fetch(&self, resource_locator: &str) -> FetchFuture;
}

impl<F> ModuleFetcher for F
where
    F: Fn(&str) -> FetchFuture,
{
    fn fetch(&self, resource_locator: &str) -> FetchFuture {
        self(resource_locator)
    }
}

type BundleFactory = Rc<dyn Fn() -> ModuleExports>;

/// Fetcher serving compiled-in bundles by locator.
///
/// Fetches complete without suspending; unknown locators fail.
#[derive(Default)]
pub struct BundleCatalog {
    bundles: BTreeMap<String, BundleFactory>,
    fetches: Cell<usize>,
}

impl BundleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(
        mut self,
        resource_locator: impl Into<String>,
        factory: impl Fn() -> ModuleExports + 'static,
    ) -> Self {
        self.bundles.insert(resource_locator.into(), Rc::new(factory));
        self
    }

    /// Number of fetches served or rejected so far.
    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }
}

impl ModuleFetcher for BundleCatalog {
    fn fetch(&self, resource_locator: &str) -> FetchFuture {
        self.fetches.set(self.fetches.get() + 1);
        let outcome = match self.bundles.get(resource_locator) {
            Some(factory) => Ok(factory()),
            None => Err(FetchError::new(format!(
                "no bundle published at {resource_locator}"
            ))),
        };
        future::ready(outcome).boxed_local()
    }
}
