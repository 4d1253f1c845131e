//! statewait
//!
//! Asynchronous state-change waiter for long-running cloud resource
//! operations. A resource handler submits a create, update or delete call,
//! then hands the waiter a [`WaitSpec`] and a refresh probe; the waiter polls
//! until the resource reaches a target state, disappears, or the wait fails.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │             resource handler (caller)            │
//! │      create / update / delete remote object      │
//! └─────────────────┬───────────────────────────────┘
//!                   │ WaitSpec + refresh probe
//! ┌─────────────────▼───────────────────────────────┐
//! │                   statewait                      │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │                 Waiter                    │   │
//! │  │  classify → stabilize → back off → poll   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │    retry     │  │    finder    │  deadline  │
//! │  └──────────────┘  └──────────────┘            │
//! └─────────────────┬───────────────────────────────┘
//!                   │ refresh()
//! ┌─────────────────▼───────────────────────────────┐
//! │                cloud API client                  │
//! └─────────────────────────────────────────────────┘
//! ```

mod backoff;
pub mod deadline;
pub mod error;
pub mod finder;
pub mod refresh;
pub mod retry;
pub mod spec;
pub mod waiter;

// Re-exports
pub use deadline::Deadline;
pub use error::{FindError, Result, SpecError, WaitError};
pub use finder::{NotFound, assert_first_value, assert_single_value};
pub use refresh::Refreshed;
pub use retry::{
    RetryConfig, RetryError, retry, retry_until_not_found, retry_when,
    retry_when_new_resource_not_found, retry_when_not_found,
};
pub use spec::{WaitSpec, WaitSpecBuilder};
pub use waiter::{Waiter, wait_for_state};
pub use tokio_util::sync::CancellationToken;
