use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::{with_tracking, Subscriber};

struct EffectState {
    self_ref: Weak<EffectState>,
    body: RefCell<Box<dyn FnMut() -> Option<Box<dyn FnOnce()>>>>,
    cleanup: RefCell<Option<Box<dyn FnOnce()>>>,
    generation: Cell<u64>,
}

impl EffectState {
    /// Rerun the effect body. A panicking body is caught here rather than
    /// left to unwind through whatever `Signal::set` call woke this effect
    /// up — one broken effect must not take down the writer that triggered
    /// it, or every other effect still queued behind it. The effect is left
    /// active; its next natural trigger runs it again from a clean cleanup
    /// slot.
    fn rerun(state: &Rc<EffectState>) {
        if let Some(cleanup) = state.cleanup.borrow_mut().take() {
            cleanup();
        }
        state.generation.set(state.generation.get() + 1);
        let sub: Rc<dyn Subscriber> = state.clone();
        let body = &state.body;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            with_tracking(sub, || (body.borrow_mut())())
        }));
        match result {
            Ok(next_cleanup) => *state.cleanup.borrow_mut() = next_cleanup,
            Err(payload) => {
                let message = panic_message(&*payload);
                tracing::error!(error = %message, "effect body panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Subscriber for EffectState {
    fn generation(&self) -> u64 {
        self.generation.get()
    }

    fn notify(&self) {
        if let Some(strong) = self.self_ref.upgrade() {
            EffectState::rerun(&strong);
        }
    }
}

impl Drop for EffectState {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            cleanup();
        }
    }
}

/// A push-based reactive computation: runs immediately, then reruns
/// synchronously whenever a signal it read during its last run changes.
pub struct Effect {
    state: Rc<EffectState>,
}

impl Effect {
    /// Run `f` immediately and on every future change to a signal it reads.
    pub fn new(mut f: impl FnMut() + 'static) -> Self {
        Self::with_cleanup(move || {
            f();
            None
        })
    }

    /// Like [`Self::new`], but `f` may return a cleanup closure, run right
    /// before the next rerun and when the effect itself is dropped.
    pub fn with_cleanup(mut f: impl FnMut() -> Option<Box<dyn FnOnce()>> + 'static) -> Self {
        let state = Rc::new_cyclic(|weak| EffectState {
            self_ref: weak.clone(),
            body: RefCell::new(Box::new(move || f())),
            cleanup: RefCell::new(None),
            generation: Cell::new(0),
        });
        EffectState::rerun(&state);
        Effect { state }
    }
}

/// Alias for [`Effect::with_cleanup`], named for call sites that want to
/// read as "watch this computation and let it clean up after itself".
pub fn watch_effect(f: impl FnMut() -> Option<Box<dyn FnOnce()>> + 'static) -> Effect {
    Effect::with_cleanup(f)
}

/// Track `source`'s dependencies and invoke `callback(new, old)` only when
/// the value it returns actually changes — unlike [`Effect`], which reruns
/// whenever any read signal fires regardless of whether the derived value
/// it's watching for changed.
pub fn watch<T: Clone + PartialEq + 'static>(
    source: impl Fn() -> T + 'static,
    mut callback: impl FnMut(&T, &T) + 'static,
) -> Effect {
    let previous: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    Effect::new(move || {
        let next = source();
        let mut prev = previous.borrow_mut();
        if let Some(old) = prev.as_ref() {
            if *old != next {
                callback(&next, old);
            }
        }
        *prev = Some(next);
    })
}
