//! Action execution
//!
//! - [`injector`]: native input and screen capture contract
//! - [`executor`]: click, type and two-step menu actions

pub mod executor;
pub mod injector;

pub use executor::{ActionExecutor, ActionTiming};
pub use injector::{InputInjector, KeyCode, MouseButton};
