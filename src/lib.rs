//! # Widget Scout
//!
//! Image-based widget location and state-graph replay engine for a UI test
//! recorder.
//!
//! ## Overview
//!
//! A recording session captures on-screen widgets as template images and links
//! each widget to the application state its action leads to. The resulting
//! tree of states can later be replayed: every widget is located again by
//! template matching, its action is performed, and the replay recurses into the
//! next state.
//!
//! ## Quick Start
//!
//! ```no_run
//! use widget_scout::graph::{StateGraph, Widget, WidgetAction};
//! use widget_scout::recognition::{Rect, TemplateId};
//!
//! let mut graph = StateGraph::new();
//! let home = graph.root();
//! let widget = Widget::new(
//!     WidgetAction::LeftClick,
//!     TemplateId::new("1700000000000-ab12cd34.png").unwrap(),
//!     Rect::new(10, 10, 40, 20),
//! );
//! let next = graph.insert_widget(home, widget, None).unwrap();
//! assert_ne!(home, next);
//! ```
//!
//! ## Architecture
//!
//! - [`recognition`]: matcher contract, mode fallback strategy, widget locator
//!   and template storage
//! - [`graph`]: the state graph, widgets, navigation history and subtree editor
//! - [`action`]: input injection contract and the action executor
//! - [`backends`]: the bundle of collaborators a session drives
//! - [`traversal`]: bounded, retrying replay of the state graph
//! - [`session`]: the session context, edit modes and modifier-key channel
//! - [`time`]: settle delays
//! - [`app`]: CLI and configuration management
//!
//! ## Replay Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │ StateGraph  │───▶│  Widget     │───▶│ Recognition │───▶│   Image     │
//! │  (widgets)  │    │  Locator    │    │  Strategy   │    │  Matcher    │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!        ▲                  │
//!        │                  ▼
//! ┌─────────────┐    ┌─────────────┐
//! │  recurse    │◀───│   Action    │
//! │ next state  │    │  Executor   │
//! └─────────────┘    └─────────────┘
//! ```

pub mod time;
pub mod recognition;
pub mod graph;
pub mod action;
pub mod backends;
pub mod traversal;
pub mod session;
pub mod app;

// Re-export commonly used types
pub use backends::Backends;
pub use graph::{StateGraph, StateId, SubtreeEditor, Widget, WidgetAction, WidgetId, WidgetStatus};
pub use recognition::{Match, MatchThreshold, RecognitionMode, RecognitionStrategy, WidgetLocator};
pub use session::{EditMode, Session};
pub use traversal::TraversalEngine;

/// Hard recursion limit shared by traversal and subtree deletion.
pub const MAX_DEPTH: usize = 100;

/// Result type alias for the widget scout
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the widget scout
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Recursion depth {depth} exceeded the limit of {limit}")]
    DepthExceeded { depth: usize, limit: usize },

    #[error("Unknown state: {0:?}")]
    UnknownState(StateId),

    #[error("Unknown widget: {0:?}")]
    UnknownWidget(WidgetId),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session is not running")]
    SessionStopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Collaborator failures end the enclosing automation session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Collaborator(_))
    }

    /// Depth violations abort the current operation only.
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::DepthExceeded { .. })
    }
}
