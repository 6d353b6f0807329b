//! Focus state: which node currently has keyboard focus, plus the
//! navigation and history helpers built on top of it.
//!
//! There is no global component registry in this core (that ECS-style
//! bookkeeping is exactly the sort of ambient app-runtime concern the
//! design treats as a collaborator, not the focus model itself) — instead
//! navigation functions are handed the caller's current ordered list of
//! focusable [`crate::view::NodeId`]s, usually gathered by walking the view
//! tree right before the call. This mirrors `style.focusKey` in the data
//! model: focus is tracked by node identity, nodes opt in by appearing in
//! that list. `NodeId` is a plain `usize`, so this lines up with
//! `state::keyboard`'s own index-keyed focused-handler registry.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::reactive::Signal;

fn signal<T: Clone + PartialEq + 'static>(initial: T) -> Signal<T> {
    Signal::new(initial)
}

pub type NodeId = usize;

thread_local! {
    static FOCUSED: Signal<Option<NodeId>> = signal(None);
}

/// Currently focused node id, or `None` if nothing has focus.
pub fn get_focused() -> Option<NodeId> {
    FOCUSED.with(|s| s.get())
}

pub fn has_focus() -> bool {
    get_focused().is_some()
}

pub fn is_focused(id: NodeId) -> bool {
    get_focused() == Some(id)
}

#[derive(Default)]
pub struct FocusCallbacks {
    pub on_focus: Option<Box<dyn Fn()>>,
    pub on_blur: Option<Box<dyn Fn()>>,
}

thread_local! {
    static FOCUS_CALLBACK_REGISTRY: RefCell<HashMap<NodeId, Vec<FocusCallbacks>>> = RefCell::new(HashMap::new());
}

/// Register focus callbacks for `id`. Returns a cleanup closure that
/// unregisters them.
pub fn register_callbacks(id: NodeId, callbacks: FocusCallbacks) -> impl FnOnce() {
    let callback_id = FOCUS_CALLBACK_REGISTRY.with(|reg| {
        let mut reg = reg.borrow_mut();
        let list = reg.entry(id).or_default();
        list.push(callbacks);
        list.len() - 1
    });

    move || {
        FOCUS_CALLBACK_REGISTRY.with(|reg| {
            let mut reg = reg.borrow_mut();
            if let Some(list) = reg.get_mut(&id) {
                if callback_id < list.len() {
                    list[callback_id].on_focus = None;
                    list[callback_id].on_blur = None;
                }
                if list.iter().all(|cb| cb.on_focus.is_none() && cb.on_blur.is_none()) {
                    reg.remove(&id);
                }
            }
        });
    }
}

fn fire_callbacks(id: NodeId, on_focus: bool) {
    FOCUS_CALLBACK_REGISTRY.with(|reg| {
        let reg = reg.borrow();
        if let Some(callbacks) = reg.get(&id) {
            for cb in callbacks {
                let hook = if on_focus { &cb.on_focus } else { &cb.on_blur };
                if let Some(f) = hook {
                    f();
                }
            }
        }
    });
}

fn set_focus_with_callbacks(new_id: Option<NodeId>) {
    let old_id = get_focused();
    if old_id == new_id {
        return;
    }
    if let Some(id) = old_id {
        fire_callbacks(id, false);
    }
    FOCUSED.with(|s| s.set(new_id));
    if let Some(id) = new_id {
        fire_callbacks(id, true);
    }
}

// =============================================================================
// Focus trap (modals)
// =============================================================================

thread_local! {
    static FOCUS_TRAP_STACK: RefCell<Vec<NodeId>> = RefCell::new(Vec::new());
}

/// Push a focus trap: focus navigation should be filtered to descendants
/// of `container` by the caller building the focusable list.
pub fn push_focus_trap(container: NodeId) {
    FOCUS_TRAP_STACK.with(|s| s.borrow_mut().push(container));
}

pub fn pop_focus_trap() -> Option<NodeId> {
    FOCUS_TRAP_STACK.with(|s| s.borrow_mut().pop())
}

pub fn is_focus_trapped() -> bool {
    FOCUS_TRAP_STACK.with(|s| !s.borrow().is_empty())
}

pub fn get_focus_trap_container() -> Option<NodeId> {
    FOCUS_TRAP_STACK.with(|s| s.borrow().last().copied())
}

// =============================================================================
// Focus history (restoration)
// =============================================================================

thread_local! {
    static FOCUS_HISTORY: RefCell<Vec<NodeId>> = RefCell::new(Vec::new());
}

const MAX_HISTORY: usize = 10;

pub fn save_focus_to_history() {
    if let Some(id) = get_focused() {
        FOCUS_HISTORY.with(|h| {
            let mut h = h.borrow_mut();
            h.push(id);
            if h.len() > MAX_HISTORY {
                h.remove(0);
            }
        });
    }
}

/// Restore the most recent history entry that still appears in
/// `current_focusable`. Returns whether focus was restored.
pub fn restore_focus_from_history(current_focusable: &[NodeId]) -> bool {
    loop {
        let entry = FOCUS_HISTORY.with(|h| h.borrow_mut().pop());
        match entry {
            None => return false,
            Some(id) => {
                if current_focusable.contains(&id) {
                    set_focus_with_callbacks(Some(id));
                    return true;
                }
            }
        }
    }
}

// =============================================================================
// Navigation
// =============================================================================

/// Move focus to the next id in `focusable` (wrapping), relative to the
/// currently focused id. `focusable` must already be in the caller's
/// desired tab order (see the focus trap helpers above for filtering).
pub fn focus_next(focusable: &[NodeId]) -> bool {
    step(focusable, 1)
}

pub fn focus_previous(focusable: &[NodeId]) -> bool {
    step(focusable, -1)
}

fn step(focusable: &[NodeId], direction: i32) -> bool {
    if focusable.is_empty() {
        return false;
    }
    let current = get_focused();
    let pos = current.and_then(|id| focusable.iter().position(|&f| f == id));
    let next = match pos {
        None => {
            if direction > 0 { 0 } else { focusable.len() - 1 }
        }
        Some(pos) => {
            let len = focusable.len() as i32;
            (((pos as i32 + direction) % len + len) % len) as usize
        }
    };
    let next_id = focusable[next];
    if current == Some(next_id) {
        return false;
    }
    save_focus_to_history();
    set_focus_with_callbacks(Some(next_id));
    true
}

/// Focus `id` directly, regardless of any focusable list.
pub fn focus(id: NodeId) {
    if get_focused() != Some(id) {
        save_focus_to_history();
        set_focus_with_callbacks(Some(id));
    }
}

pub fn blur() {
    if has_focus() {
        save_focus_to_history();
        set_focus_with_callbacks(None);
    }
}

pub fn focus_first(focusable: &[NodeId]) -> bool {
    match focusable.first() {
        Some(&id) => {
            focus(id);
            true
        }
        None => false,
    }
}

pub fn focus_last(focusable: &[NodeId]) -> bool {
    match focusable.last() {
        Some(&id) => {
            focus(id);
            true
        }
        None => false,
    }
}

/// Reset all focus state. Exposed for tests.
pub fn reset_focus_state() {
    set_focus_with_callbacks(None);
    FOCUS_TRAP_STACK.with(|s| s.borrow_mut().clear());
    FOCUS_HISTORY.with(|h| h.borrow_mut().clear());
    FOCUS_CALLBACK_REGISTRY.with(|r| r.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn setup() {
        reset_focus_state();
    }

    #[test]
    fn initial_state_has_no_focus() {
        setup();
        assert!(!has_focus());
        assert_eq!(get_focused(), None);
    }

    #[test]
    fn focus_next_cycles_and_wraps() {
        setup();
        let ids = vec![1, 2, 3];
        assert!(focus_next(&ids));
        assert_eq!(get_focused(), Some(1));
        assert!(focus_next(&ids));
        assert_eq!(get_focused(), Some(2));
        assert!(focus_next(&ids));
        assert_eq!(get_focused(), Some(3));
        assert!(focus_next(&ids));
        assert_eq!(get_focused(), Some(1)); // wraps
    }

    #[test]
    fn focus_previous_wraps_backward() {
        setup();
        let ids = vec![1, 2];
        assert!(focus_previous(&ids));
        assert_eq!(get_focused(), Some(2));
    }

    #[test]
    fn focus_non_focusable_id_is_a_direct_focus_regardless_of_list() {
        setup();
        // `focus` takes a raw id: it is the caller's job to only offer
        // ids drawn from the current focusable list.
        focus(42);
        assert_eq!(get_focused(), Some(42));
    }

    #[test]
    fn callbacks_fire_on_focus_and_blur() {
        setup();
        let focused = Rc::new(Cell::new(false));
        let blurred = Rc::new(Cell::new(false));
        let f2 = focused.clone();
        let b2 = blurred.clone();
        let _cleanup = register_callbacks(
            1,
            FocusCallbacks {
                on_focus: Some(Box::new(move || f2.set(true))),
                on_blur: Some(Box::new(move || b2.set(true))),
            },
        );
        focus(1);
        assert!(focused.get());
        blur();
        assert!(blurred.get());
    }

    #[test]
    fn history_restores_to_last_still_focusable_entry() {
        setup();
        focus(1);
        focus(2);
        blur();
        assert!(restore_focus_from_history(&[1]));
        assert_eq!(get_focused(), Some(1));
    }

    #[test]
    fn focus_trap_stack_tracks_container() {
        setup();
        assert!(!is_focus_trapped());
        push_focus_trap(7);
        assert!(is_focus_trapped());
        assert_eq!(get_focus_trap_container(), Some(7));
        pop_focus_trap();
        assert!(!is_focus_trapped());
    }
}
