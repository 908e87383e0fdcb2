//! Blocking settle delays with early wake-up handling

pub mod settle;

pub use settle::{Sleeper, ThreadSleeper, RESUME_THRESHOLD};
