//! Safety envelope around parsing: per-call timeout and panic recovery,
//! so one pathological query cannot take down a corpus sweep.
//!
//! Each call runs its work on a fresh worker thread and waits on a
//! rendezvous channel with a deadline. On timeout the worker is left to
//! finish on its own; its eventual send lands in a channel nobody reads.
//! No mutable state is shared across the boundary.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Process-wide parse deadline in milliseconds. Set once at startup;
/// read atomically at call time.
static MAX_PARSE_MILLIS: AtomicU64 = AtomicU64::new(5_000);

/// Change the process-wide parse deadline. Intended to be called once
/// during initialization, before queries are flowing.
pub fn set_max_parse_time(limit: Duration) {
    MAX_PARSE_MILLIS.store(limit.as_millis() as u64, Ordering::Relaxed);
}

pub fn max_parse_time() -> Duration {
    Duration::from_millis(MAX_PARSE_MILLIS.load(Ordering::Relaxed))
}

/// Run `work` on a worker thread under the parse deadline. Panics and
/// timeouts become a well-formed fallback via `on_failure`; the caller
/// always gets a value.
pub(crate) fn run_guarded<T, F>(work: F, on_failure: fn(String) -> T) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let limit = max_parse_time();
    let (sender, receiver) = mpsc::sync_channel(1);

    let spawned = thread::Builder::new()
        .name("splq-parse".to_string())
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work));
            // The receiver may already be gone after a timeout.
            let _ = sender.send(outcome);
        });

    if spawned.is_err() {
        return on_failure("parser panic: could not spawn worker thread".to_string());
    }

    match receiver.recv_timeout(limit) {
        Ok(Ok(value)) => value,
        Ok(Err(payload)) => {
            let details = panic_message(payload.as_ref());
            log::warn!("parser panicked: {details}");
            on_failure(format!("parser panic: {details}"))
        }
        Err(_) => {
            log::warn!("parse exceeded {limit:?}; worker abandoned");
            on_failure(format!(
                "parser timeout: query took longer than {limit:?} to parse"
            ))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn passes_values_through() {
        let out = run_guarded(|| 41 + 1, |_| 0);
        assert_eq!(out, 42);
    }

    #[test]
    fn converts_panics() {
        let out = run_guarded(
            || -> String { panic!("kaboom") },
            |message| message,
        );
        assert_eq!(out, "parser panic: kaboom");
    }

    #[test]
    fn deadline_is_configurable() {
        assert_eq!(max_parse_time(), Duration::from_secs(5));
        set_max_parse_time(Duration::from_secs(2));
        assert_eq!(max_parse_time(), Duration::from_secs(2));
        set_max_parse_time(Duration::from_secs(5));
    }
}
