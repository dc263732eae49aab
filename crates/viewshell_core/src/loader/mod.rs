//! On-demand module loader.
//!
//! # Responsibility
//! - Resolve logical ids to exported constructors, fetching each resource at
//!   most once.
//! - Deduplicate concurrent requests for one resource onto a single load.
//!
//! # Invariants
//! - The cache/in-flight/start decision runs synchronously when `resolve` or
//!   `preload` is called, before any suspension.
//! - At most one fetch per resource locator is in flight.
//! - The terminal state (`Loaded` or `Failed`) is stored before any waiter
//!   observes the outcome.
//! - `Loaded` is cached forever; `Failed` is retried by the next request.

mod error;
mod fetch;
mod spawn;
mod state;

pub use error::{LoadError, LoadFailureKind, LoaderError, LoaderResult};
pub use fetch::{BundleCatalog, FetchError, FetchFuture, ModuleExports, ModuleFetcher};
pub use spawn::{InlineSpawner, LocalSetSpawner, TaskSpawner};
pub use state::{LoadStatus, LoaderStats};

use crate::registry::{ModuleDescriptor, ModuleRegistry};
use crate::view::ViewExport;
use futures::future::{self, FutureExt, LocalBoxFuture};
use log::{debug, error, info, warn};
use state::{LoadState, SharedLoad};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

#[derive(Default)]
struct LoadTable {
    entries: BTreeMap<String, LoadState>,
    stats: LoaderStats,
}

enum LoadHandle {
    Cached(Rc<ModuleExports>),
    Joined(SharedLoad),
    Started(SharedLoad),
}

/// Loader over an injected registry and fetcher.
pub struct ModuleLoader {
    registry: ModuleRegistry,
    fetcher: Rc<dyn ModuleFetcher>,
    spawner: Rc<dyn TaskSpawner>,
    table: Rc<RefCell<LoadTable>>,
}

impl ModuleLoader {
    /// Creates a loader whose preloads run inline; see `with_spawner` for
    /// background execution on a `LocalSet`.
    pub fn new(registry: ModuleRegistry, fetcher: Rc<dyn ModuleFetcher>) -> Self {
        Self {
            registry,
            fetcher,
            spawner: Rc::new(InlineSpawner),
            table: Rc::new(RefCell::new(LoadTable::default())),
        }
    }

    pub fn with_spawner(mut self, spawner: Rc<dyn TaskSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Resolves `logical_id` to its exported constructor.
    ///
    /// The returned future is already complete when the resource is cached
    /// or the id is unknown. Concurrent calls for one resource share a single
    /// fetch and observe the same outcome.
    ///
    /// # Errors
    /// - `UnknownModule` when the id is not registered.
    /// - `LoadFailure` when the fetch fails or the symbol is missing.
    pub fn resolve(&self, logical_id: &str) -> LocalBoxFuture<'static, LoaderResult<ViewExport>> {
        let Some(descriptor) = self.registry.get(logical_id).cloned() else {
            error!(
                "event=module_resolve module=loader status=error logical_id={} error_code=unknown_module",
                logical_id
            );
            return future::ready(Err(LoaderError::UnknownModule(logical_id.to_string())))
                .boxed_local();
        };

        match self.begin_load(&descriptor) {
            LoadHandle::Cached(exports) => {
                future::ready(lookup_export(&descriptor, &exports)).boxed_local()
            }
            LoadHandle::Joined(pending) | LoadHandle::Started(pending) => async move {
                let exports = pending.await?;
                lookup_export(&descriptor, &exports)
            }
            .boxed_local(),
        }
    }

    /// Starts loading `logical_id` in the background.
    ///
    /// Never fails: unknown ids and load failures are logged and dropped.
    pub fn preload(&self, logical_id: &str) {
        let Some(descriptor) = self.registry.get(logical_id) else {
            warn!(
                "event=module_preload module=loader status=skipped logical_id={} reason=unknown_module",
                logical_id
            );
            return;
        };

        match self.begin_load(descriptor) {
            LoadHandle::Started(pending) => {
                debug!(
                    "event=module_preload module=loader status=start logical_id={} locator={}",
                    logical_id, descriptor.resource_locator
                );
                self.spawner.spawn_detached(
                    async move {
                        // Failures were already recorded and logged by the load.
                        let _ = pending.await;
                    }
                    .boxed_local(),
                );
            }
            LoadHandle::Cached(_) | LoadHandle::Joined(_) => {
                debug!(
                    "event=module_preload module=loader status=skipped logical_id={} reason=already_requested",
                    logical_id
                );
            }
        }
    }

    /// Returns whether `resource_locator` finished loading successfully.
    pub fn is_loaded(&self, resource_locator: &str) -> bool {
        self.load_status(resource_locator) == LoadStatus::Loaded
    }

    pub fn load_status(&self, resource_locator: &str) -> LoadStatus {
        self.table
            .borrow()
            .entries
            .get(resource_locator)
            .map_or(LoadStatus::Unloaded, LoadState::status)
    }

    pub fn stats(&self) -> LoaderStats {
        self.table.borrow().stats
    }

    fn begin_load(&self, descriptor: &ModuleDescriptor) -> LoadHandle {
        let locator = descriptor.resource_locator.as_str();
        let mut guard = self.table.borrow_mut();
        let table = &mut *guard;
        table.stats.requests += 1;

        match table.entries.get(locator) {
            Some(LoadState::Loaded(exports)) => {
                let exports = Rc::clone(exports);
                table.stats.cache_hits += 1;
                return LoadHandle::Cached(exports);
            }
            Some(LoadState::Loading(pending)) => {
                let pending = pending.clone();
                table.stats.coalesced += 1;
                debug!(
                    "event=module_load module=loader status=joined logical_id={} locator={}",
                    descriptor.logical_id, locator
                );
                return LoadHandle::Joined(pending);
            }
            Some(LoadState::Failed(err)) => {
                info!(
                    "event=module_load module=loader status=retry logical_id={} locator={} previous_error={}",
                    descriptor.logical_id,
                    locator,
                    err.code()
                );
            }
            None => {}
        }

        info!(
            "event=module_load module=loader status=start logical_id={} locator={}",
            descriptor.logical_id, locator
        );
        let pending = self.start_fetch(locator);
        table.stats.fetches += 1;
        table
            .entries
            .insert(locator.to_string(), LoadState::Loading(pending.clone()));
        LoadHandle::Started(pending)
    }

    fn start_fetch(&self, locator: &str) -> SharedLoad {
        let fetch = self.fetcher.fetch(locator);
        let table = Rc::clone(&self.table);
        let locator = locator.to_string();
        let started_at = Instant::now();

        async move {
            let outcome = fetch.await;
            let mut guard = table.borrow_mut();
            let table = &mut *guard;
            match outcome {
                Ok(exports) => {
                    let exports = Rc::new(exports);
                    info!(
                        "event=module_load module=loader status=ok locator={} symbols={} duration_ms={}",
                        locator,
                        exports.len(),
                        started_at.elapsed().as_millis()
                    );
                    table
                        .entries
                        .insert(locator, LoadState::Loaded(Rc::clone(&exports)));
                    Ok(exports)
                }
                Err(err) => {
                    let err = LoadError::fetch(locator.as_str(), err);
                    warn!(
                        "event=module_load module=loader status=error locator={} duration_ms={} error_code={} error={}",
                        locator,
                        started_at.elapsed().as_millis(),
                        err.code(),
                        err
                    );
                    table.stats.failures += 1;
                    table.entries.insert(locator, LoadState::Failed(err.clone()));
                    Err(err)
                }
            }
        }
        .boxed_local()
        .shared()
    }
}

fn lookup_export(
    descriptor: &ModuleDescriptor,
    exports: &ModuleExports,
) -> LoaderResult<ViewExport> {
    match exports.get(&descriptor.export_name) {
        Some(export) => Ok(export),
        None => {
            let err = LoadError::symbol_not_found(
                descriptor.resource_locator.as_str(),
                descriptor.export_name.as_str(),
            );
            error!(
                "event=module_resolve module=loader status=error logical_id={} error_code={} available={:?}",
                descriptor.logical_id,
                err.code(),
                exports.names()
            );
            Err(err.into())
        }
    }
}
