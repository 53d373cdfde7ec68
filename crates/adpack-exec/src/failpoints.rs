//! Chaos hooks (feature: `failpoints`).
//!
//! The macro expands to nothing unless the feature is enabled. When enabled,
//! points whose name starts with `panic_` panic, and only when the same name
//! has been armed through [`arm`]; tests use this to prove quota slots are
//! returned on unwind.

#[cfg(feature = "failpoints")]
mod registry {
    use std::collections::HashSet;
    use std::sync::Mutex;

    static ARMED: Mutex<Option<HashSet<String>>> = Mutex::new(None);

    pub fn arm(name: &str) {
        if let Ok(mut set) = ARMED.lock() {
            set.get_or_insert_with(HashSet::new).insert(name.to_string());
        }
    }

    pub fn disarm_all() {
        if let Ok(mut set) = ARMED.lock() {
            *set = None;
        }
    }

    pub fn is_armed(name: &str) -> bool {
        ARMED
            .lock()
            .map(|set| set.as_ref().is_some_and(|s| s.contains(name)))
            .unwrap_or(false)
    }
}

#[cfg(feature = "failpoints")]
pub use registry::{arm, disarm_all, is_armed};

#[cfg(feature = "failpoints")]
#[macro_export]
macro_rules! fail_point {
    ($name:expr) => {{
        if $name.starts_with("panic_") && $crate::failpoints::is_armed($name) {
            panic!("failpoint triggered: {}", $name);
        }
    }};
}

#[cfg(not(feature = "failpoints"))]
#[macro_export]
macro_rules! fail_point {
    ($name:expr) => {
        // no-op
        let _ = $name;
    };
}
