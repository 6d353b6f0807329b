use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::{current_subscriber, drain_notify, track, with_tracking, Subscriber, Subscription};

struct DerivedState<T> {
    self_ref: Weak<DerivedState<T>>,
    compute: RefCell<Box<dyn FnMut() -> T>>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    generation: Cell<u64>,
    subscribers: RefCell<Vec<Subscription>>,
}

impl<T: Clone + PartialEq + 'static> Subscriber for DerivedState<T> {
    fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// A dependency changed. Always mark dirty; only recompute right away
    /// if something is actively watching this derived (a live subscriber)
    /// — otherwise the getter is deferred to the next `get()`, so a
    /// never-read derived never runs its compute function at all and a
    /// round-trip write (`set(2); set(1)`) with no intervening read never
    /// invokes it either. When there *is* a live subscriber, recomputing
    /// here is how propagation gets gated: a derived only fans out a
    /// "changed" notification to its own subscribers if the recomputed
    /// value actually differs from the cached one (Invariant R3).
    fn notify(&self) {
        self.dirty.set(true);
        if let Some(strong) = self.self_ref.upgrade() {
            if has_live_subscriber(&strong) {
                recompute(&strong);
            }
        }
    }
}

/// Whether any entry in `state`'s subscriber list is both alive and still
/// current (generation-matched) — mirrors the filter [`drain_notify`]
/// applies, without consuming the list.
fn has_live_subscriber<T>(state: &DerivedState<T>) -> bool {
    state
        .subscribers
        .borrow()
        .iter()
        .any(|s| s.sub.upgrade().is_some_and(|up| up.generation() == s.generation))
}

fn recompute<T: Clone + PartialEq + 'static>(state: &Rc<DerivedState<T>>) {
    if !state.dirty.get() {
        return;
    }
    state.dirty.set(false);
    state.generation.set(state.generation.get() + 1);
    let sub: Rc<dyn Subscriber> = state.clone();
    let next = with_tracking(sub, || (state.compute.borrow_mut())());

    let changed = {
        let mut value = state.value.borrow_mut();
        let changed = value.as_ref() != Some(&next);
        *value = Some(next);
        changed
    };

    if changed {
        let to_notify = drain_notify(&mut state.subscribers.borrow_mut());
        for sub in to_notify {
            sub.notify();
        }
    }
}

/// A cached, lazily-recomputed value derived from one or more signals.
///
/// The first [`Self::get`] always computes; after that, the cache is only
/// invalidated (and recomputed) when a dependency actually changes, and
/// only propagates further if the recomputed value differs from the one
/// cached before it.
pub struct Derived<T> {
    state: Rc<DerivedState<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self { state: self.state.clone() }
    }
}

impl<T: Clone + PartialEq + 'static> Derived<T> {
    pub fn new(compute: impl FnMut() -> T + 'static) -> Self {
        let state = Rc::new_cyclic(|weak| DerivedState {
            self_ref: weak.clone(),
            compute: RefCell::new(Box::new(compute)),
            value: RefCell::new(None),
            dirty: Cell::new(true),
            generation: Cell::new(0),
            subscribers: RefCell::new(Vec::new()),
        });
        Self { state }
    }

    /// Read the cached value, subscribing the active effect or derived (if
    /// any), recomputing first if dirty — which is always true on the very
    /// first read, and true again any time a dependency changed since the
    /// last read without a live subscriber having already recomputed it.
    pub fn get(&self) -> T {
        self.track_as_dependency();
        recompute(&self.state);
        self.state
            .value
            .borrow()
            .clone()
            .expect("recompute always populates the cache")
    }

    fn track_as_dependency(&self) {
        let Some(sub) = current_subscriber() else {
            return;
        };
        let generation = sub.generation();
        track(&mut self.state.subscribers.borrow_mut(), &sub, generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Signal};
    use std::cell::Cell as StdCell;

    #[test]
    fn derived_recomputes_at_most_once_per_change() {
        let s = Signal::new(1);
        let recomputes = Rc::new(StdCell::new(0));
        let recomputes2 = recomputes.clone();
        let sig = s.clone();
        let d = Derived::new(move || {
            recomputes2.set(recomputes2.get() + 1);
            sig.get() * 2
        });
        assert_eq!(d.get(), 2);
        assert_eq!(recomputes.get(), 1);
        assert_eq!(d.get(), 2); // cached, no recompute
        assert_eq!(recomputes.get(), 1);
        s.set(2);
        // No one is watching `d` (no live subscriber), so the dependency
        // change only marks it dirty; the getter does not run again until
        // the next `get()`.
        assert_eq!(recomputes.get(), 1);
        assert_eq!(d.get(), 4);
        assert_eq!(recomputes.get(), 2);
    }

    #[test]
    fn derived_invoked_at_most_once_across_a_round_trip_with_no_read() {
        let s = Signal::new(1);
        let recomputes = Rc::new(StdCell::new(0));
        let recomputes2 = recomputes.clone();
        let sig = s.clone();
        let d = Derived::new(move || {
            recomputes2.set(recomputes2.get() + 1);
            sig.get() * 2
        });
        assert_eq!(d.get(), 2);
        assert_eq!(recomputes.get(), 1);
        s.set(2);
        s.set(1); // round trip back to the value `d` last saw, no read in between
        assert_eq!(recomputes.get(), 1);
        assert_eq!(d.get(), 2);
        assert_eq!(recomputes.get(), 2);
    }

    #[test]
    fn derived_does_not_propagate_when_recomputed_value_is_unchanged() {
        let s = Signal::new(1);
        let sig = s.clone();
        let d = Derived::new(move || sig.get() % 2); // parity: changes less often than s
        let downstream_runs = Rc::new(StdCell::new(0));
        let downstream_runs2 = downstream_runs.clone();
        let d2 = d.clone();
        let _effect = Effect::new(move || {
            d2.get();
            downstream_runs2.set(downstream_runs2.get() + 1);
        });
        assert_eq!(downstream_runs.get(), 1);
        s.set(3); // parity unchanged (1 -> 1)
        assert_eq!(downstream_runs.get(), 1);
        s.set(4); // parity changes (1 -> 0)
        assert_eq!(downstream_runs.get(), 2);
    }
}
