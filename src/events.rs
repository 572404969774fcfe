//! Push-notification plumbing.
//!
//! Observers (dashboard, logging adapter, the composition root) register
//! a callback and receive an immutable reference to every published
//! item.  Publishing happens synchronously on the caller's thread, in
//! registration order, after the publishing component has committed its
//! state.
//!
//! ```text
//! ┌──────────────┐  publish(&T)  ┌───────────────┐
//! │ SafetyGuard  │──────────────▶│ Subscribers<T>│──▶ listener #1
//! │ RafeCtrl     │               │               │──▶ listener #2
//! └──────────────┘               └───────────────┘
//! ```

use core::fmt;

/// Handle returned by `subscribe`; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Box<dyn FnMut(&T)>;

/// Registry of listeners for one event stream.
pub struct Subscribers<T> {
    listeners: Vec<(SubscriptionId, Listener<T>)>,
    next_id: u64,
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 1,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener.  Returns `false` if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn publish(&mut self, item: &T) {
        for (_, listener) in &mut self.listeners {
            listener(item);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
