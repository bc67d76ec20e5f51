//! Per-listener failure containment.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use codetrack_core::SyncError;

/// Run a subscriber or listener callback, turning a panic into
/// [`SyncError::ListenerFailure`].
///
/// Callers keep delivering to the remaining listeners whatever this returns.
pub(crate) fn call_contained<F: FnOnce()>(callback: F) -> Result<(), SyncError> {
    catch_unwind(AssertUnwindSafe(callback))
        .map_err(|payload| SyncError::listener(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_panics() {
        let result = call_contained(|| panic!("listener exploded"));
        assert_eq!(result, Err(SyncError::listener("listener exploded")));
    }

    #[test]
    fn passes_through_success() {
        let mut ran = false;
        assert!(call_contained(|| ran = true).is_ok());
        assert!(ran);
    }
}
