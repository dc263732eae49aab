//! The single active view slot.

use crate::subscription::SubscriptionScope;
use crate::view::View;
use std::cell::{Cell, RefCell};

/// Slot lifecycle: `Empty → Constructing → Active → TearingDown → Empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Constructing,
    Active,
    TearingDown,
}

impl SlotState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Constructing => "constructing",
            Self::Active => "active",
            Self::TearingDown => "tearing_down",
        }
    }
}

pub(crate) struct ActiveView {
    pub(crate) logical_id: String,
    pub(crate) ticket: u64,
    pub(crate) view: Box<dyn View>,
}

/// Holder of the one installed view plus the shell's subscription scope.
pub(crate) struct ActiveViewSlot {
    state: Cell<SlotState>,
    instance: RefCell<Option<ActiveView>>,
    pub(crate) subscription_scope: SubscriptionScope,
}

impl ActiveViewSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Cell::new(SlotState::Empty),
            instance: RefCell::new(None),
            subscription_scope: SubscriptionScope::new("shell"),
        }
    }

    pub(crate) fn state(&self) -> SlotState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: SlotState) {
        self.state.set(state);
    }

    /// Removes the occupant and marks the slot as tearing down.
    pub(crate) fn take_for_teardown(&self) -> Option<ActiveView> {
        let taken = self.instance.borrow_mut().take();
        if taken.is_some() {
            self.state.set(SlotState::TearingDown);
        }
        taken
    }

    /// Installs a freshly constructed view. The slot must be empty.
    pub(crate) fn install(&self, active: ActiveView) {
        let mut instance = self.instance.borrow_mut();
        debug_assert!(instance.is_none(), "slot already occupied");
        *instance = Some(active);
        self.state.set(SlotState::Active);
    }

    /// Returns a guard that puts an unoccupied slot back to `Empty` when
    /// dropped, including when the transition future is dropped mid-flight.
    pub(crate) fn restore_on_drop(&self) -> EmptySlotGuard<'_> {
        EmptySlotGuard { slot: self }
    }

    pub(crate) fn with_instance<R>(&self, f: impl FnOnce(&ActiveView) -> R) -> Option<R> {
        self.instance.borrow().as_ref().map(f)
    }
}

/// Held for the duration of one slot transition.
pub(crate) struct EmptySlotGuard<'a> {
    slot: &'a ActiveViewSlot,
}

impl Drop for EmptySlotGuard<'_> {
    fn drop(&mut self) {
        let unoccupied = self
            .slot
            .instance
            .try_borrow()
            .map(|instance| instance.is_none())
            .unwrap_or(false);
        if unoccupied {
            self.slot.state.set(SlotState::Empty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActiveView, ActiveViewSlot, SlotState};
    use crate::view::View;

    struct Blank;

    impl View for Blank {}

    #[test]
    fn guard_resets_an_unoccupied_slot() {
        let slot = ActiveViewSlot::new();
        {
            let _restore = slot.restore_on_drop();
            slot.set_state(SlotState::Constructing);
        }
        assert_eq!(slot.state(), SlotState::Empty);
    }

    #[test]
    fn guard_keeps_an_installed_view_active() {
        let slot = ActiveViewSlot::new();
        {
            let _restore = slot.restore_on_drop();
            slot.set_state(SlotState::Constructing);
            slot.install(ActiveView {
                logical_id: "usage".to_string(),
                ticket: 1,
                view: Box::new(Blank),
            });
        }
        assert_eq!(slot.state(), SlotState::Active);
        assert_eq!(
            slot.with_instance(|active| active.logical_id.clone()).as_deref(),
            Some("usage")
        );
    }
}
