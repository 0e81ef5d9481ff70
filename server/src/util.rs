//! Small shared helpers

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

/// Run `f` on its own task with panic isolation.
///
/// Falls back to running inline when called outside a Tokio runtime. A panic
/// is logged with `label` and never propagates to the caller.
pub(crate) fn spawn_isolated<F>(label: String, f: F)
where
    F: FnOnce() + Send + 'static,
{
    let run = move || {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
            error!("{} panicked: {}", label, panic_message(panic.as_ref()));
        }
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { run() });
        }
        Err(_) => run(),
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_runs_inline_without_runtime() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        spawn_isolated("inline".to_string(), move || flag.store(true, Ordering::SeqCst));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_inline_panic_is_contained() {
        spawn_isolated("panicky".to_string(), || panic!("expected"));
    }
}
