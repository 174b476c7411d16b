//! Runtime invariants with contract-test bookkeeping.
//!
//! Production code asserts the session invariants through
//! [`assert_invariant!`](crate::assert_invariant). Every check is recorded in
//! a per-thread log so that contract tests can prove a code path actually
//! evaluated the invariants it is supposed to guard, not just that it
//! happened not to violate them.
//!
//! ```rust,ignore
//! use pitchcam::invariant_ppt::{contract_test, invariants};
//!
//! controller.reconfigure(request)?;
//! contract_test("reconfigure", &[invariants::STABILIZATION_OFF]);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::thread_local;

/// Invariant messages checked by the configuration path.
pub mod invariants {
    pub const STABILIZATION_OFF: &str =
        "Stabilization is staged off in every committed configuration";
    pub const MAXIMIZED_ZOOM_PINNED: &str = "Zoom factor is 1.0 while FOV is maximized";
    pub const MAXIMIZED_GDC_OFF: &str = "Distortion correction is off while FOV is maximized";
    pub const SINGLE_LENS_INPUT: &str = "One lens input at most per configuration transaction";
}

thread_local! {
    static CHECKED: RefCell<HashMap<&'static str, u64>> = RefCell::new(HashMap::new());
}

/// Assert an invariant and record that it was evaluated.
///
/// # Panics
/// Panics with the invariant message when the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__check($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__check($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __check(condition: bool, message: &'static str, context: Option<&str>) {
    CHECKED.with(|checked| {
        *checked.borrow_mut().entry(message).or_insert(0) += 1;
    });

    if !condition {
        panic!(
            "INVARIANT VIOLATION [{}]: {}",
            context.unwrap_or("unknown"),
            message
        );
    }
}

/// How many times an invariant has been evaluated on this thread.
pub fn check_count(message: &str) -> u64 {
    CHECKED.with(|checked| checked.borrow().get(message).copied().unwrap_or(0))
}

/// Fail unless every listed invariant was evaluated on this thread.
///
/// # Panics
/// Panics listing the invariants that were never checked.
pub fn contract_test(test_name: &str, required: &[&str]) {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|message| check_count(message) == 0)
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: invariants never checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

pub fn clear_invariant_log() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checks_are_counted() {
        clear_invariant_log();
        crate::assert_invariant!(true, invariants::STABILIZATION_OFF);
        crate::assert_invariant!(true, invariants::STABILIZATION_OFF, "test");
        assert_eq!(check_count(invariants::STABILIZATION_OFF), 2);
        contract_test("counted", &[invariants::STABILIZATION_OFF]);
    }

    #[test]
    #[should_panic(expected = "CONTRACT FAILURE")]
    fn test_unchecked_invariant_fails_contract() {
        clear_invariant_log();
        contract_test("unchecked", &[invariants::MAXIMIZED_ZOOM_PINNED]);
    }

    #[test]
    #[should_panic(expected = "INVARIANT VIOLATION [zoom]")]
    fn test_violation_panics() {
        crate::assert_invariant!(false, invariants::MAXIMIZED_ZOOM_PINNED, "zoom");
    }
}
