//! Panic capture for job tasks.
//!
//! A process-wide panic hook records the stack of the panicking thread in a
//! thread-local slot. [`catch_job_panic`] polls the job under `catch_unwind`,
//! so the slot is read on the same thread, right after the unwind stops.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use futures::FutureExt;

thread_local! {
    static LAST_PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

/// A recovered job panic.
#[derive(Debug, Clone)]
pub struct JobPanic {
    /// Panic payload rendered as text.
    pub message: String,
    /// Stack of the thread that panicked, taken at the panic site.
    pub backtrace: String,
}

/// Chain the trace-recording hook in front of the current panic hook.
///
/// Idempotent; the previous hook still runs afterwards.
pub fn install_panic_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture();
            LAST_PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Run `job` to completion, turning a panic into a [`JobPanic`].
pub async fn catch_job_panic<F>(job: F) -> Result<F::Output, JobPanic>
where
    F: Future,
{
    install_panic_hook();
    LAST_PANIC_TRACE.with(|slot| slot.borrow_mut().take());

    AssertUnwindSafe(job).catch_unwind().await.map_err(|payload| {
        let backtrace = LAST_PANIC_TRACE
            .with(|slot| slot.borrow_mut().take())
            .map(|trace| trace.to_string())
            .unwrap_or_default();
        JobPanic {
            message: panic_message(&*payload),
            backtrace,
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
