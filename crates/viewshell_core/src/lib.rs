//! Lazy-loading view shell core.
//! Resolves logical module ids to view constructors on demand and keeps
//! exactly one view alive in the shell's slot.

pub mod config;
pub mod lifecycle;
pub mod loader;
pub mod logging;
pub mod registry;
pub mod subscription;
pub mod view;

pub use config::{ConfigError, LoggingConfig, ShellConfig};
pub use lifecycle::{
    ActivationError, ActivationOutcome, ActivationResult, SlotState, TeardownError,
    TeardownFailure, ViewLifecycleManager,
};
pub use loader::{
    BundleCatalog, FetchError, FetchFuture, InlineSpawner, LoadError, LoadFailureKind,
    LoadStatus, LoaderError, LoaderResult, LoaderStats, LocalSetSpawner, ModuleExports,
    ModuleFetcher, ModuleLoader, TaskSpawner,
};
pub use logging::{default_log_level, init_logging, logging_status, LogSink, LoggingError};
pub use registry::{DescriptorValidationError, ModuleDescriptor, ModuleRegistry, RegistryError};
pub use subscription::{Event, EventBus, EventHandler, EventTarget, ListenerId, SubscriptionScope};
pub use view::{
    view_constructor, NavigationContext, View, ViewConstructor, ViewContext, ViewError,
    ViewExport,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
