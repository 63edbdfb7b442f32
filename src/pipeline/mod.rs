//! The response pipeline.
//!
//! A message flows through the [`classify`] step, the [`Retriever`], the
//! [`Generator`] and the [`ResponseCache`], sequenced by [`Pipeline`]. The
//! [`ClearScheduler`] empties the cache once a day.

pub mod cache;
pub mod classifier;
pub mod fingerprint;
pub mod generator;
pub mod orchestrator;
pub mod retriever;
pub mod scheduler;

pub use cache::ResponseCache;
pub use classifier::classify;
pub use fingerprint::{cooldown_key, fingerprint, normalize};
pub use generator::{Generator, fit_context};
pub use orchestrator::Pipeline;
pub use retriever::Retriever;
pub use scheduler::{ClearScheduler, next_occurrence};
