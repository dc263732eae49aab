//! In-process event target for shell-wide events.

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Identifier returned by an event target for one registered listener.
pub type ListenerId = u64;

/// Event delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub detail: Value,
}

pub type EventHandler = Rc<dyn Fn(&Event)>;

/// Something listeners can be attached to and detached from.
pub trait EventTarget {
    fn add_listener(&self, event_name: &str, handler: EventHandler) -> ListenerId;

    /// Returns `false` when the listener was not registered.
    fn remove_listener(&self, event_name: &str, listener: ListenerId) -> bool;
}

/// Single-threaded event bus used as the shell's global event target.
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<BTreeMap<String, Vec<(ListenerId, EventHandler)>>>,
    next_listener: Cell<ListenerId>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers one event and returns the number of handlers invoked.
    ///
    /// Handlers may add or remove listeners re-entrantly; the set invoked is
    /// the one registered when `emit` was called.
    pub fn emit(&self, event_name: &str, detail: Value) -> usize {
        let handlers: Vec<EventHandler> = match self.listeners.borrow().get(event_name) {
            Some(entries) => entries.iter().map(|(_, handler)| Rc::clone(handler)).collect(),
            None => return 0,
        };
        let event = Event {
            name: event_name.to_string(),
            detail,
        };
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    pub fn listener_count(&self, event_name: &str) -> usize {
        self.listeners
            .borrow()
            .get(event_name)
            .map_or(0, Vec::len)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.borrow().values().map(Vec::len).sum()
    }
}

impl EventTarget for EventBus {
    fn add_listener(&self, event_name: &str, handler: EventHandler) -> ListenerId {
        let id = self.next_listener.get() + 1;
        self.next_listener.set(id);
        self.listeners
            .borrow_mut()
            .entry(event_name.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    fn remove_listener(&self, event_name: &str, listener: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(entries) = listeners.get_mut(event_name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != listener);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(event_name);
        }
        removed
    }
}
