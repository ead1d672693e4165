//! Scoped publish/subscribe registry.
//!
//! A [`MessageRegistry`] maps routing keys to handlers. Subscribing returns a
//! [`Registration`] guard; dropping the guard removes the subscription.
//! Handlers for the same key run in registration order.
//!
//! Handlers are borrowed for the registry's handler lifetime `'h`, so the
//! borrow checker rules out a registry outliving the closures it calls.
//! The guard only controls whether the binding is live.
//!
//! The registry is single-threaded (`!Sync`): one per event loop.
//!
//! ```
//! use core::cell::Cell;
//! use messaging::{Message, MessageId, MessageRegistry, TxProgress};
//!
//! let seen = Cell::new(0);
//! let on_progress = |m: &Message| {
//!     if let Message::TxProgress(p) = m {
//!         seen.set(p.progress);
//!     }
//! };
//! let registry: MessageRegistry<'_, Message, 8> = MessageRegistry::new();
//! let reg = registry.register(MessageId::TxProgress, &on_progress);
//! registry.dispatch(&TxProgress { progress: 50, done: false }.into());
//! assert_eq!(seen.get(), 50);
//! drop(reg);
//! registry.dispatch(&TxProgress { progress: 99, done: true }.into());
//! assert_eq!(seen.get(), 50);
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;

use heapless::Vec;

use crate::message::Tagged;

/// A subscription could not be stored: the registry is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistryFull;

impl fmt::Display for RegistryFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("message registry full")
    }
}

struct Entry<'h, E: Tagged> {
    id: E::Id,
    token: u32,
    handler: &'h dyn Fn(&E),
}

// Manual impls: `E` itself need not be `Clone`.
impl<E: Tagged> Clone for Entry<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: Tagged> Copy for Entry<'_, E> {}

/// Subscriptions keyed by `E::Id`, at most `N` at a time.
pub struct MessageRegistry<'h, E: Tagged, const N: usize> {
    entries: RefCell<Vec<Entry<'h, E>, N>>,
    next_token: Cell<u32>,
}

impl<'h, E: Tagged, const N: usize> MessageRegistry<'h, E, N> {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self { entries: RefCell::new(Vec::new()), next_token: Cell::new(1) }
    }

    /// Subscribe `handler` to `id`.
    ///
    /// The capacity `N` is sized at build time for the largest set of
    /// simultaneously live subscriptions. If it is exceeded anyway the
    /// failure is logged and the returned guard is inert.
    pub fn register<'r>(
        &'r self,
        id: E::Id,
        handler: &'h dyn Fn(&E),
    ) -> Registration<'r, 'h, E, N> {
        match self.try_register(id, handler) {
            Ok(registration) => registration,
            Err(RegistryFull) => {
                error!("message registry full ({} entries), subscription dropped", N);
                Registration { registry: self, token: None }
            }
        }
    }

    /// Subscribe `handler` to `id`, reporting capacity exhaustion.
    pub fn try_register<'r>(
        &'r self,
        id: E::Id,
        handler: &'h dyn Fn(&E),
    ) -> Result<Registration<'r, 'h, E, N>, RegistryFull> {
        let token = self.next_token.get();
        self.entries
            .borrow_mut()
            .push(Entry { id, token, handler })
            .map_err(|_| RegistryFull)?;
        // 0 is never handed out.
        self.next_token.set(token.wrapping_add(1).max(1));
        Ok(Registration { registry: self, token: Some(token) })
    }

    /// Invoke every handler subscribed to `event.id()`, in registration
    /// order.
    ///
    /// The matching handlers are snapshotted first and no borrow is held
    /// while a handler runs, so handlers may register, drop registrations
    /// or dispatch further events. A handler whose registration is dropped
    /// before its turn is skipped; handlers registered during this call
    /// first run on the next dispatch.
    ///
    /// Dispatching an id nobody subscribed to does nothing.
    pub fn dispatch(&self, event: &E) {
        let id = event.id();
        let snapshot: Vec<Entry<'h, E>, N> =
            self.entries.borrow().iter().filter(|e| e.id == id).copied().collect();
        for entry in &snapshot {
            if self.is_live(entry.token) {
                (entry.handler)(event);
            }
        }
    }

    /// Number of live subscriptions for `id`.
    pub fn subscribers(&self, id: E::Id) -> usize {
        self.entries.borrow().iter().filter(|e| e.id == id).count()
    }

    /// Total number of live subscriptions.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// `true` when nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn is_live(&self, token: u32) -> bool {
        self.entries.borrow().iter().any(|e| e.token == token)
    }

    fn unregister(&self, token: u32) {
        let mut entries = self.entries.borrow_mut();
        if let Some(pos) = entries.iter().position(|e| e.token == token) {
            // Order-preserving removal keeps registration order for the rest.
            entries.remove(pos);
        }
    }
}

impl<E: Tagged, const N: usize> Default for MessageRegistry<'_, E, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription. Dropping it unsubscribes.
#[must_use = "dropping the registration unsubscribes immediately"]
pub struct Registration<'r, 'h, E: Tagged, const N: usize> {
    registry: &'r MessageRegistry<'h, E, N>,
    token: Option<u32>,
}

impl<E: Tagged, const N: usize> Registration<'_, '_, E, N> {
    /// `false` if the subscription was dropped for lack of capacity.
    pub fn is_active(&self) -> bool {
        self.token.is_some_and(|t| self.registry.is_live(t))
    }
}

impl<E: Tagged, const N: usize> Drop for Registration<'_, '_, E, N> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.registry.unregister(token);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::message::{FifoSignal, Message, MessageId, TxProgress};
    use core::cell::RefCell as StdRefCell;

    type Log = StdRefCell<std::vec::Vec<&'static str>>;

    fn progress(progress: u32, done: bool) -> Message {
        TxProgress { progress, done }.into()
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let log = Log::default();
        let first = |_: &Message| log.borrow_mut().push("first");
        let second = |_: &Message| log.borrow_mut().push("second");
        let registry: MessageRegistry<'_, Message, 4> = MessageRegistry::new();
        let _a = registry.register(MessageId::TxProgress, &first);
        let _b = registry.register(MessageId::TxProgress, &second);
        registry.dispatch(&progress(1, false));
        assert_eq!(*log.borrow(), ["first", "second"]);
    }

    #[test]
    fn dropped_registration_is_not_called_but_others_are() {
        let log = Log::default();
        let first = |_: &Message| log.borrow_mut().push("first");
        let second = |_: &Message| log.borrow_mut().push("second");
        let registry: MessageRegistry<'_, Message, 4> = MessageRegistry::new();
        let a = registry.register(MessageId::TxProgress, &first);
        let _b = registry.register(MessageId::TxProgress, &second);
        drop(a);
        registry.dispatch(&progress(1, false));
        assert_eq!(*log.borrow(), ["second"]);
        assert_eq!(registry.subscribers(MessageId::TxProgress), 1);
    }

    #[test]
    fn dispatch_without_subscribers_is_a_no_op() {
        let log = Log::default();
        let other = |_: &Message| log.borrow_mut().push("fifo");
        let registry: MessageRegistry<'_, Message, 4> = MessageRegistry::new();
        registry.dispatch(&progress(1, false));
        let _r = registry.register(MessageId::FifoSignal, &other);
        registry.dispatch(&progress(2, true));
        assert!(log.borrow().is_empty());
        registry.dispatch(&FifoSignal { signal_type: 1 }.into());
        assert_eq!(*log.borrow(), ["fifo"]);
    }

    // A handler that owns another subscription's guard forms a cycle the
    // borrow checker rejects for stack locals; leak everything to 'static,
    // as a firmware image would hold them in statics.
    type StaticRegistry = MessageRegistry<'static, Message, 4>;
    type StaticRegistration = Registration<'static, 'static, Message, 4>;

    fn leak<T>(value: T) -> &'static T {
        Box::leak(Box::new(value))
    }

    #[test]
    fn handler_may_drop_a_later_registration_mid_dispatch() {
        let log: &'static Log = leak(Log::default());
        let registry: &'static StaticRegistry = leak(MessageRegistry::new());
        let victim_slot: &'static StdRefCell<Option<StaticRegistration>> =
            leak(StdRefCell::new(None));
        let killer: &'static dyn Fn(&Message) = leak(move |_: &Message| {
            log.borrow_mut().push("killer");
            victim_slot.borrow_mut().take();
        });
        let victim: &'static dyn Fn(&Message) = leak(move |_: &Message| {
            log.borrow_mut().push("victim");
        });
        let _k = registry.register(MessageId::TxProgress, killer);
        *victim_slot.borrow_mut() = Some(registry.register(MessageId::TxProgress, victim));
        registry.dispatch(&progress(1, false));
        assert_eq!(*log.borrow(), ["killer"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn handler_registered_mid_dispatch_runs_next_time() {
        let log: &'static Log = leak(Log::default());
        let registry: &'static StaticRegistry = leak(MessageRegistry::new());
        let held: &'static StdRefCell<std::vec::Vec<StaticRegistration>> =
            leak(StdRefCell::default());
        let late: &'static dyn Fn(&Message) = leak(move |_: &Message| {
            log.borrow_mut().push("late");
        });
        let spawner: &'static dyn Fn(&Message) = leak(move |_: &Message| {
            log.borrow_mut().push("spawner");
            if held.borrow().is_empty() {
                held.borrow_mut().push(registry.register(MessageId::TxProgress, late));
            }
        });
        let _s = registry.register(MessageId::TxProgress, spawner);
        registry.dispatch(&progress(1, false));
        registry.dispatch(&progress(2, false));
        assert_eq!(*log.borrow(), ["spawner", "spawner", "late"]);
    }

    #[test]
    fn full_registry_hands_out_inert_guard() {
        let noop = |_: &Message| {};
        let registry: MessageRegistry<'_, Message, 1> = MessageRegistry::new();
        let a = registry.register(MessageId::TxProgress, &noop);
        assert!(a.is_active());
        assert_eq!(
            registry.try_register(MessageId::TxProgress, &noop).err(),
            Some(RegistryFull)
        );
        let b = registry.register(MessageId::TxProgress, &noop);
        assert!(!b.is_active());
        drop(b);
        assert_eq!(registry.len(), 1);
        drop(a);
        assert!(registry.is_empty());
    }

    #[test]
    fn same_closure_may_subscribe_to_several_ids() {
        let log = Log::default();
        let any = |m: &Message| log.borrow_mut().push(m.id().name());
        let registry: MessageRegistry<'_, Message, 4> = MessageRegistry::new();
        let _a = registry.register(MessageId::TxProgress, &any);
        let _b = registry.register(MessageId::FifoSignal, &any);
        registry.dispatch(&FifoSignal { signal_type: 0 }.into());
        registry.dispatch(&progress(0, false));
        assert_eq!(*log.borrow(), ["FifoSignal", "TxProgress"]);
    }
}
