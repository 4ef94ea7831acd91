//! External action boundary
//!
//! Actions are opaque units of work: the scheduler only ever observes
//! success/failure and elapsed time.

pub mod invoker;
pub mod registry;

pub use invoker::{backoff_delay, invoke, Invocation, RetryPolicy};
pub use registry::{Action, ActionRegistry, ActionRunner, CommandRunner};
