//! Single-slot view lifecycle manager.
//!
//! # Responsibility
//! - Own the one active view slot and move views through it on navigation.
//! - Own the shell subscription scope released on shutdown.
//!
//! # Invariants
//! - At most one view occupies the slot.
//! - The previous view's teardown completes before the next constructor runs.
//! - Only the most recently issued activation may install a view.
//! - Teardown failures never block navigation.

mod error;
mod slot;

pub use error::{ActivationError, ActivationResult, TeardownError, TeardownFailure};
pub use slot::SlotState;

use crate::loader::ModuleLoader;
use crate::logging::single_line;
use crate::subscription::{EventBus, SubscriptionScope};
use crate::view::{NavigationContext, View, ViewContext, ViewError};
use futures::future::{FutureExt, LocalBoxFuture};
use log::{debug, error, info, warn};
use slot::{ActiveView, ActiveViewSlot};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::time::Instant;
use tokio::sync::Mutex;

const MAX_PANIC_MESSAGE_CHARS: usize = 160;

/// How an activation that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The requested view is installed in the slot.
    Activated,
    /// A later activation (or shutdown) was issued first; nothing installed.
    Superseded,
}

struct ManagerInner {
    loader: Rc<ModuleLoader>,
    events: Rc<EventBus>,
    slot: ActiveViewSlot,
    // Serializes every slot transition; held across teardown and construction.
    transition: Mutex<()>,
    latest_ticket: Cell<u64>,
    last_teardown_error: RefCell<Option<TeardownError>>,
}

/// Shell-facing entry point for navigation.
///
/// Cheap to clone; clones share one slot.
#[derive(Clone)]
pub struct ViewLifecycleManager {
    inner: Rc<ManagerInner>,
}

impl ViewLifecycleManager {
    pub fn new(loader: ModuleLoader, events: Rc<EventBus>) -> Self {
        Self {
            inner: Rc::new(ManagerInner {
                loader: Rc::new(loader),
                events,
                slot: ActiveViewSlot::new(),
                transition: Mutex::new(()),
                latest_ticket: Cell::new(0),
                last_teardown_error: RefCell::new(None),
            }),
        }
    }

    /// Replaces the active view with a fresh instance of `logical_id`.
    ///
    /// The activation is ordered by the time of this call: a later call
    /// supersedes it even if this one has not been polled yet.
    ///
    /// # Errors
    /// - `UnknownModule` / `LoadFailure` when the module cannot be resolved;
    ///   the slot is left empty.
    /// - `Construction` when the constructor fails or panics; the slot is
    ///   left empty.
    pub fn activate(
        &self,
        logical_id: &str,
        navigation: NavigationContext,
    ) -> LocalBoxFuture<'static, ActivationResult<ActivationOutcome>> {
        let ticket = self.inner.issue_ticket();
        let inner = Rc::clone(&self.inner);
        let logical_id = logical_id.to_string();
        async move { inner.run_activation(ticket, logical_id, navigation).await }.boxed_local()
    }

    /// Tears down the active view and revokes the shell subscription scope.
    ///
    /// Supersedes activations still in flight. Safe to call repeatedly.
    pub async fn teardown_all(&self) {
        let ticket = self.inner.issue_ticket();
        let _transition = self.inner.transition.lock().await;
        let _restore = self.inner.slot.restore_on_drop();
        self.inner.teardown_active().await;
        let revoked = self.inner.slot.subscription_scope.revoke_all();
        info!(
            "event=shell_teardown module=lifecycle status=ok ticket={} revoked_subscriptions={}",
            ticket, revoked
        );
    }

    /// Anticipatory load hint; never fails.
    pub fn preload(&self, logical_id: &str) {
        self.inner.loader.preload(logical_id);
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.inner.loader
    }

    /// Scope for global listeners registered by the shell itself.
    pub fn subscriptions(&self) -> &SubscriptionScope {
        &self.inner.slot.subscription_scope
    }

    pub fn events(&self) -> &Rc<EventBus> {
        &self.inner.events
    }

    pub fn slot_state(&self) -> SlotState {
        self.inner.slot.state()
    }

    pub fn active_logical_id(&self) -> Option<String> {
        self.inner.slot.with_instance(|active| active.logical_id.clone())
    }

    /// Runs `f` against the active view, if any.
    pub fn with_active_view<R>(&self, f: impl FnOnce(&dyn View) -> R) -> Option<R> {
        self.inner.slot.with_instance(|active| f(&*active.view))
    }

    /// Runs `f` against the active view when it is a `T`.
    pub fn with_active_view_as<T: View, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner
            .slot
            .with_instance(|active| {
                let view: &dyn Any = &*active.view;
                view.downcast_ref::<T>().map(f)
            })
            .flatten()
    }

    /// Most recent contained teardown failure.
    pub fn last_teardown_error(&self) -> Option<TeardownError> {
        self.inner.last_teardown_error.borrow().clone()
    }
}

impl ManagerInner {
    fn issue_ticket(&self) -> u64 {
        let ticket = self.latest_ticket.get() + 1;
        self.latest_ticket.set(ticket);
        ticket
    }

    fn is_superseded(&self, ticket: u64) -> bool {
        self.latest_ticket.get() != ticket
    }

    async fn run_activation(
        self: Rc<Self>,
        ticket: u64,
        logical_id: String,
        navigation: NavigationContext,
    ) -> ActivationResult<ActivationOutcome> {
        let started_at = Instant::now();
        info!(
            "event=view_activate module=lifecycle status=start logical_id={} ticket={}",
            logical_id, ticket
        );

        {
            let _transition = self.transition.lock().await;
            let _restore = self.slot.restore_on_drop();
            if self.is_superseded(ticket) {
                return Ok(self.superseded(&logical_id, ticket, "before_teardown"));
            }
            self.teardown_active().await;
        }

        let export = match self.loader.resolve(&logical_id).await {
            Ok(export) => export,
            Err(err) => {
                let err = ActivationError::from(err);
                if self.is_superseded(ticket) {
                    warn!(
                        "event=view_activate module=lifecycle status=skipped logical_id={} ticket={} error_code={} error={}",
                        logical_id,
                        ticket,
                        err.code(),
                        err
                    );
                    return Ok(self.superseded(&logical_id, ticket, "resolve_failed"));
                }
                error!(
                    "event=view_activate module=lifecycle status=error logical_id={} ticket={} error_code={} error={}",
                    logical_id,
                    ticket,
                    err.code(),
                    err
                );
                return Err(err);
            }
        };

        let _transition = self.transition.lock().await;
        let _restore = self.slot.restore_on_drop();
        if self.is_superseded(ticket) {
            return Ok(self.superseded(&logical_id, ticket, "after_resolve"));
        }
        // Only reachable when another transition ran in between; keep the
        // teardown-before-construct order regardless.
        self.teardown_active().await;

        self.slot.set_state(SlotState::Constructing);
        let context = ViewContext {
            logical_id: logical_id.clone(),
            navigation,
            events: Rc::clone(&self.events),
        };
        let constructed = match AssertUnwindSafe(export.construct(context))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(ViewError::new(format!(
                "constructor panicked: {}",
                panic_message(&*payload)
            ))),
        };
        let view = match constructed {
            Ok(view) => view,
            Err(source) => {
                self.slot.set_state(SlotState::Empty);
                let err = ActivationError::Construction {
                    logical_id: logical_id.clone(),
                    source,
                };
                error!(
                    "event=view_activate module=lifecycle status=error logical_id={} ticket={} error_code={} error={}",
                    logical_id,
                    ticket,
                    err.code(),
                    err
                );
                return Err(err);
            }
        };

        if self.is_superseded(ticket) {
            // Superseded while constructing; never install.
            self.slot.set_state(SlotState::TearingDown);
            self.run_teardown(ActiveView {
                logical_id: logical_id.clone(),
                ticket,
                view,
            })
            .await;
            self.slot.set_state(SlotState::Empty);
            return Ok(self.superseded(&logical_id, ticket, "after_construct"));
        }

        self.slot.install(ActiveView {
            logical_id: logical_id.clone(),
            ticket,
            view,
        });
        info!(
            "event=view_activate module=lifecycle status=ok logical_id={} ticket={} duration_ms={}",
            logical_id,
            ticket,
            started_at.elapsed().as_millis()
        );
        Ok(ActivationOutcome::Activated)
    }

    fn superseded(&self, logical_id: &str, ticket: u64, phase: &str) -> ActivationOutcome {
        debug!(
            "event=view_activate module=lifecycle status=skipped logical_id={} ticket={} latest_ticket={} phase={}",
            logical_id,
            ticket,
            self.latest_ticket.get(),
            phase
        );
        ActivationOutcome::Superseded
    }

    /// Tears down the current occupant, if any. Caller holds `transition`.
    async fn teardown_active(&self) {
        if let Some(active) = self.slot.take_for_teardown() {
            self.run_teardown(active).await;
        }
        self.slot.set_state(SlotState::Empty);
    }

    async fn run_teardown(&self, mut active: ActiveView) {
        let started_at = Instant::now();
        let outcome = AssertUnwindSafe(active.view.teardown()).catch_unwind().await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(TeardownFailure::Returned(err)),
            Err(payload) => Some(TeardownFailure::Panicked(panic_message(&*payload))),
        };

        match failure {
            None => debug!(
                "event=view_teardown module=lifecycle status=ok logical_id={} ticket={} duration_ms={}",
                active.logical_id,
                active.ticket,
                started_at.elapsed().as_millis()
            ),
            Some(failure) => {
                let err = TeardownError {
                    logical_id: active.logical_id.clone(),
                    failure,
                };
                warn!(
                    "event=view_teardown module=lifecycle status=error logical_id={} ticket={} error={}",
                    active.logical_id, active.ticket, err
                );
                *self.last_teardown_error.borrow_mut() = Some(err);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };
    single_line(&message, MAX_PANIC_MESSAGE_CHARS)
}

#[cfg(test)]
mod tests {
    use super::{ActivationError, ActivationOutcome, SlotState, ViewLifecycleManager};
    use crate::loader::{BundleCatalog, ModuleExports, ModuleLoader};
    use crate::registry::{ModuleDescriptor, ModuleRegistry};
    use crate::subscription::EventBus;
    use crate::view::{view_constructor, NavigationContext, View, ViewContext};
    use futures::executor::block_on;
    use serde_json::json;
    use std::rc::Rc;

    struct RouteView {
        route: String,
    }

    impl View for RouteView {}

    fn manager() -> ViewLifecycleManager {
        let registry = ModuleRegistry::from_descriptors(vec![
            ModuleDescriptor::new("usage", "/mod/usage.bundle", "Usage"),
            ModuleDescriptor::new("broken", "/mod/broken.bundle", "Broken"),
        ])
        .expect("registry");
        let catalog = BundleCatalog::new().with_bundle("/mod/usage.bundle", || {
            ModuleExports::new().with(
                "Usage",
                view_constructor(|ctx: ViewContext| {
                    Ok(RouteView {
                        route: ctx.navigation.route,
                    })
                }),
            )
        });
        ViewLifecycleManager::new(
            ModuleLoader::new(registry, Rc::new(catalog)),
            Rc::new(EventBus::new()),
        )
    }

    #[test]
    fn activates_and_exposes_typed_view() {
        let manager = manager();
        assert_eq!(manager.slot_state(), SlotState::Empty);

        let outcome = block_on(manager.activate("usage", NavigationContext::new("/usage")))
            .expect("activation");
        assert_eq!(outcome, ActivationOutcome::Activated);
        assert_eq!(manager.slot_state(), SlotState::Active);
        assert_eq!(manager.active_logical_id().as_deref(), Some("usage"));
        assert_eq!(
            manager.with_active_view_as(|view: &RouteView| view.route.clone()),
            Some("/usage".to_string())
        );
        assert!(manager.with_active_view(|_| ()).is_some());
    }

    #[test]
    fn load_failure_leaves_slot_empty() {
        let manager = manager();
        block_on(manager.activate("usage", NavigationContext::new("/usage"))).expect("usage");

        let err = block_on(manager.activate("broken", NavigationContext::new("/broken")))
            .expect_err("broken bundle is not published");
        assert!(matches!(err, ActivationError::LoadFailure(_)));
        assert_eq!(manager.slot_state(), SlotState::Empty);
        assert!(manager.active_logical_id().is_none());
    }

    #[test]
    fn unknown_module_is_reported() {
        let manager = manager();
        let err = block_on(manager.activate("billing", NavigationContext::default()))
            .expect_err("billing is not registered");
        assert_eq!(err, ActivationError::UnknownModule("billing".to_string()));
        assert_eq!(err.code(), "unknown_module");
    }

    #[test]
    fn teardown_all_revokes_shell_subscriptions_and_is_idempotent() {
        let manager = manager();
        manager
            .subscriptions()
            .register(manager.events().clone(), "resize", |_| {});
        block_on(manager.activate("usage", NavigationContext::new("/usage"))).expect("usage");

        block_on(manager.teardown_all());
        assert_eq!(manager.slot_state(), SlotState::Empty);
        assert_eq!(manager.events().emit("resize", json!(null)), 0);

        block_on(manager.teardown_all());
        assert_eq!(manager.slot_state(), SlotState::Empty);
        assert!(manager.last_teardown_error().is_none());
    }
}
