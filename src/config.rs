//! Environment variables consumed by the core.
//!
//! Three toggles, all read fresh on each call rather than cached, so tests
//! can flip them with `std::env::set_var` between cases.

fn truthy(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

/// `BTUIN_DECSTBM_AUTO` — enables scroll detection over the whole buffer
/// even without an explicit scroll-region hint.
pub fn decstbm_auto() -> bool {
    truthy("BTUIN_DECSTBM_AUTO") && !truthy("BTUIN_DISABLE_DECSTBM")
}

/// `BTUIN_DISABLE_DECSTBM` — disables DECSTBM scroll acceleration
/// entirely, regardless of hints or auto-detection.
pub fn decstbm_disabled() -> bool {
    truthy("BTUIN_DISABLE_DECSTBM")
}

/// `BTUIN_DISABLE_SCROLL_FASTPATH` — disables the renderer's scroll fast
/// path altogether.
pub fn scroll_fastpath_enabled() -> bool {
    !truthy("BTUIN_DISABLE_SCROLL_FASTPATH") && !decstbm_disabled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable mutation races across parallel tests in the
    // same process; serialize the ones that touch BTUIN_* vars.
    static LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn decstbm_auto_respects_disable() {
        let _g = LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("BTUIN_DECSTBM_AUTO", "1");
            std::env::set_var("BTUIN_DISABLE_DECSTBM", "1");
        }
        assert!(!decstbm_auto());
        unsafe {
            std::env::remove_var("BTUIN_DECSTBM_AUTO");
            std::env::remove_var("BTUIN_DISABLE_DECSTBM");
        }
    }

    #[test]
    fn scroll_fastpath_default_enabled() {
        let _g = LOCK.lock().unwrap();
        unsafe {
            std::env::remove_var("BTUIN_DISABLE_SCROLL_FASTPATH");
            std::env::remove_var("BTUIN_DISABLE_DECSTBM");
        }
        assert!(scroll_fastpath_enabled());
    }

    #[test]
    fn truthy_requires_exact_one_not_case_insensitive_true() {
        let _g = LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("BTUIN_DISABLE_DECSTBM", "true");
        }
        assert!(!decstbm_disabled());
        unsafe {
            std::env::remove_var("BTUIN_DISABLE_DECSTBM");
        }
    }
}
