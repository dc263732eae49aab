//! Revocable subscription scopes.
//!
//! # Responsibility
//! - Track a batch of listener registrations made against event targets.
//! - Release the whole batch at once.
//!
//! # Invariants
//! - `revoke_all` removes every registration made since creation or the
//!   previous revocation, then the scope is reusable.
//! - Callers never unregister individual subscriptions.

mod event_bus;

pub use event_bus::{Event, EventBus, EventHandler, EventTarget, ListenerId};

use log::{debug, warn};
use std::cell::RefCell;
use std::rc::Rc;

struct Subscription {
    target: Rc<dyn EventTarget>,
    event_name: String,
    listener: ListenerId,
}

/// A revocable batch of event registrations.
pub struct SubscriptionScope {
    label: String,
    entries: RefCell<Vec<Subscription>>,
}

impl SubscriptionScope {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: RefCell::new(Vec::new()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Adds one subscription to the current batch.
    pub fn register(
        &self,
        target: Rc<dyn EventTarget>,
        event_name: &str,
        handler: impl Fn(&Event) + 'static,
    ) {
        let listener = target.add_listener(event_name, Rc::new(handler));
        self.entries.borrow_mut().push(Subscription {
            target,
            event_name: event_name.to_string(),
            listener,
        });
    }

    /// Removes every subscription in the current batch.
    ///
    /// Returns the number of subscriptions released.
    pub fn revoke_all(&self) -> usize {
        let batch = std::mem::take(&mut *self.entries.borrow_mut());
        let count = batch.len();
        for subscription in batch {
            if !subscription
                .target
                .remove_listener(&subscription.event_name, subscription.listener)
            {
                warn!(
                    "event=scope_revoke module=subscription status=error scope={} event_name={} error=listener_missing",
                    self.label, subscription.event_name
                );
            }
        }
        if count > 0 {
            debug!(
                "event=scope_revoke module=subscription status=ok scope={} revoked={}",
                self.label, count
            );
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
