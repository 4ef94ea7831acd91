//! Save debouncing
//!
//! Collapses rapid repeated save requests into a single effective write.
//! The primitive holds a timer flag and a single pending marker: requests
//! while the timer is armed coalesce into the scheduled write; a request
//! arriving while a write is in flight queues exactly one follow-up write
//! and no more. The sink is injected, so coalescing behaviour is testable
//! with a counter closure and no filesystem.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;

type SinkFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type Sink = Arc<dyn Fn() -> SinkFuture + Send + Sync>;

#[derive(Debug, Default)]
struct Flags {
    /// A timer task is armed and will fire one write
    armed: bool,
    /// A write is currently executing
    in_flight: bool,
    /// One follow-up write is queued behind the in-flight one
    rerun: bool,
}

/// Debounced trigger around an injected save sink
#[derive(Clone)]
pub struct Debouncer {
    window: Duration,
    sink: Sink,
    flags: Arc<Mutex<Flags>>,
}

impl Debouncer {
    /// Create a debouncer that fires `sink` at most once per window burst
    pub fn new<F, Fut>(window: Duration, sink: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            window,
            sink: Arc::new(move || Box::pin(sink()) as SinkFuture),
            flags: Arc::new(Mutex::new(Flags::default())),
        }
    }

    /// Request a save.
    ///
    /// Fire-and-forget: the write happens after the debounce window on a
    /// spawned task, and a sink failure is logged rather than surfaced.
    pub fn request(&self) {
        let mut flags = self.lock_flags();
        if flags.in_flight {
            flags.rerun = true;
            return;
        }
        if flags.armed {
            return;
        }
        flags.armed = true;
        drop(flags);

        let window = self.window;
        let sink = Arc::clone(&self.sink);
        let flags = Arc::clone(&self.flags);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            {
                let mut f = flags.lock().unwrap_or_else(PoisonError::into_inner);
                f.armed = false;
                f.in_flight = true;
            }
            loop {
                if let Err(e) = (sink)().await {
                    eprintln!("warning: state save failed: {e:#}");
                }
                let mut f = flags.lock().unwrap_or_else(PoisonError::into_inner);
                if f.rerun {
                    f.rerun = false;
                } else {
                    f.in_flight = false;
                    break;
                }
            }
        });
    }

    /// Whether a write is armed, running, or queued
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let flags = self.lock_flags();
        !flags.armed && !flags.in_flight && !flags.rerun
    }

    fn lock_flags(&self) -> std::sync::MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
