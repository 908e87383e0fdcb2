//! Recording session
//!
//! - [`context`]: the [`Session`] object, edit modes and interaction outcomes
//! - [`commands`]: Control-key bindings
//! - [`modifiers`]: keyboard hook → session modifier channel

pub mod commands;
pub mod context;
pub mod modifiers;

pub use commands::{Command, Key, KeyMap};
pub use context::{ClickOutcome, CommandOutcome, EditMode, PointerOutcome, RecordOutcome, Session};
pub use modifiers::{
    KeyHook, Modifier, ModifierChannel, ModifierConsumer, ModifierEvent, ModifierProducer,
    ModifierState,
};
