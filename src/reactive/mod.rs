//! Fine-grained reactivity: signals, derived values, and effects.
//!
//! There is no global scheduler arena here. A [`Signal`] keeps a list of
//! weak references to whatever is reading it; an [`Effect`] or [`Derived`]
//! tags each subscription with its own run generation at the moment it
//! subscribes. When a signal changes it walks its subscriber list and drops
//! (rather than notifies) any entry whose generation is stale — that is the
//! "lazy dependency clearing" the design calls for: nothing walks the old
//! dependency list and unsubscribes eagerly before a rerun, stale links are
//! just pruned the next time they'd otherwise fire.
//!
//! Effects are push-based and rerun synchronously and immediately when a
//! dependency changes, consistent with the single-threaded cooperative
//! model: a `set()` call runs to completion, including every effect it
//! wakes, before returning. Derived values recompute lazily: a dependency
//! change only flips the dirty bit, and the getter doesn't run until the
//! next `get()` — unless something is already watching the derived (a live
//! subscriber), in which case it recomputes right away so it can gate
//! propagation on a change-detection check, notifying its own subscribers
//! only when the recomputed value differs from what was cached. That gate
//! is what keeps a signal flipping back and forth through a lossy derived
//! (e.g. parity of a counter) from cascading into every downstream effect
//! on every write, while an unwatched derived never runs its compute
//! function more than once per actual read.

mod derived;
mod effect;
mod signal;

pub use derived::Derived;
pub use effect::{watch, watch_effect, Effect};
pub use signal::Signal;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Common interface a [`Signal`] notifies when it changes: an effect
/// schedules a rerun, a derived value just flips its dirty bit.
pub(crate) trait Subscriber {
    fn generation(&self) -> u64;
    fn notify(&self);
}

pub(crate) type SubscriberRef = Weak<dyn Subscriber>;

/// One entry in a signal's or derived value's subscriber list: a weak
/// handle plus the generation it was captured under, so a stale entry
/// (left behind by a since-rerun effect or recomputed derived) is dropped
/// instead of notified the next time this list is walked.
pub(crate) struct Subscription {
    pub sub: SubscriberRef,
    pub generation: u64,
}

/// Record that `sub` (at `generation`) depends on whatever list this is,
/// deduplicating repeat reads within the same run.
pub(crate) fn track(subscribers: &mut Vec<Subscription>, sub: &Rc<dyn Subscriber>, generation: u64) {
    let already = subscribers
        .iter()
        .any(|s| s.generation == generation && s.sub.upgrade().is_some_and(|existing| Rc::ptr_eq(&existing, sub)));
    if !already {
        subscribers.push(Subscription {
            sub: Rc::downgrade(sub),
            generation,
        });
    }
}

/// Prune dead/stale entries and return the live, deduplicated set to
/// notify. Stale here means the entry's captured generation no longer
/// matches the subscriber's current one — it was left by a prior run.
pub(crate) fn drain_notify(subscribers: &mut Vec<Subscription>) -> Vec<Rc<dyn Subscriber>> {
    let mut to_notify: Vec<Rc<dyn Subscriber>> = Vec::new();
    subscribers.retain(|s| {
        let Some(up) = s.sub.upgrade() else {
            return false;
        };
        if up.generation() != s.generation {
            return false;
        }
        if !to_notify.iter().any(|n| Rc::ptr_eq(n, &up)) {
            to_notify.push(up);
        }
        true
    });
    to_notify
}

thread_local! {
    /// The stack of whatever reactive computation is currently running, so
    /// a `Signal::get()` call knows who to subscribe.
    static ACTIVE: RefCell<Vec<Rc<dyn Subscriber>>> = const { RefCell::new(Vec::new()) };
}

fn current_subscriber() -> Option<Rc<dyn Subscriber>> {
    ACTIVE.with(|stack| stack.borrow().last().cloned())
}

fn push_subscriber(sub: Rc<dyn Subscriber>) {
    ACTIVE.with(|stack| stack.borrow_mut().push(sub));
}

fn pop_subscriber() {
    ACTIVE.with(|stack| {
        stack.borrow_mut().pop();
    });
}

/// Run `f` with `sub` as the active subscriber, so any signal read inside
/// `f` subscribes to it. Restores the previous active subscriber on exit,
/// including when `f` panics.
pub(crate) fn with_tracking<R>(sub: Rc<dyn Subscriber>, f: impl FnOnce() -> R) -> R {
    push_subscriber(sub);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    pop_subscriber();
    match result {
        Ok(r) => r,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}
