//! Background work.
//!
//! - `supervisor` - tracked fire-and-forget tasks with shutdown draining
//! - `token_cleanup` - periodic purge of expired tokens
//! - `limiter_prune` - periodic prune of idle rate limiter entries

pub mod limiter_prune;
pub mod supervisor;
pub mod token_cleanup;

pub use limiter_prune::{start_limiter_prune, LIMITER_PRUNE_INTERVAL};
pub use supervisor::{QuiesceOutcome, TaskSupervisor};
pub use token_cleanup::start_token_cleanup;
