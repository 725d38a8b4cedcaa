//! Batched, concurrency-bounded dispatch of large record sets.
//!
//! A bulk call flows through three stages: [`plan`] splits the records into fixed-size
//! [`Batch`]es, [`ConcurrencyLimiter::run`] drives them through a [`BatchDispatcher`] with a
//! bounded worker pool, and [`aggregate`] folds the outcomes back into one ordered
//! [`AggregatedResult`].

pub mod aggregate;
pub mod dispatch;
pub mod limiter;
pub mod options;
pub mod plan;

pub use aggregate::*;
pub use dispatch::*;
pub use limiter::*;
pub use options::*;
pub use plan::*;
