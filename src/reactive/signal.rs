use std::cell::RefCell;
use std::rc::Rc;

use super::{current_subscriber, drain_notify, track, Subscriber, Subscription};

struct SignalInner<T> {
    value: T,
    /// When `true`, `set` skips notifying if the new value equals the old
    /// one (a "deep" signal). `false` means every `set` notifies (shallow).
    dedup: bool,
    subscribers: Vec<Subscription>,
}

/// A reactive cell. Reading it inside an [`crate::reactive::Effect`] or
/// [`crate::reactive::Derived`] subscribes that computation to future
/// changes.
pub struct Signal<T> {
    inner: Rc<RefCell<SignalInner<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    /// A "deep" signal: `set` is a no-op (no notification) when the new
    /// value equals the current one.
    pub fn new(initial: T) -> Self {
        Self::with_dedup(initial, true)
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// A "shallow" signal: every `set` call notifies subscribers, even if
    /// the value is unchanged — useful when `T` is cheap to compare but the
    /// caller wants writes to always be observed (e.g. a tick counter whose
    /// identity, not value, matters).
    pub fn new_shallow(initial: T) -> Self {
        Self::with_dedup(initial, false)
    }

    fn with_dedup(initial: T, dedup: bool) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                value: initial,
                dedup,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Read the value, subscribing the currently running effect or derived
    /// computation (if any) to future changes.
    pub fn get(&self) -> T {
        self.track();
        self.inner.borrow().value.clone()
    }

    /// Read the value without subscribing anything.
    pub fn get_untracked(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Alias for [`Self::get_untracked`].
    pub fn peek(&self) -> T {
        self.get_untracked()
    }

    fn track(&self) {
        let Some(sub) = current_subscriber() else {
            return;
        };
        let generation = sub.generation();
        let mut inner = self.inner.borrow_mut();
        track(&mut inner.subscribers, &sub, generation);
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    pub fn set(&self, value: T) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let changed = !inner.dedup || inner.value != value;
            if changed {
                inner.value = value;
            }
            changed
        };
        if changed {
            self.notify_subscribers();
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let before = inner.value.clone();
            f(&mut inner.value);
            !inner.dedup || inner.value != before
        };
        if changed {
            self.notify_subscribers();
        }
    }

    fn notify_subscribers(&self) {
        let to_notify = drain_notify(&mut self.inner.borrow_mut().subscribers);
        for sub in to_notify {
            sub.notify();
        }
    }
}
