//! Automatic replay of recorded states

pub mod engine;

pub use engine::{TraversalEngine, DEFAULT_FIND_RETRIES};
