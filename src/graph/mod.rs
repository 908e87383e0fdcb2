//! State graph
//!
//! Recorded application states, the widgets leading between them, the
//! back-navigation history and the structural editor.

pub mod editor;
pub mod history;
pub mod state_graph;
pub mod widget;

pub use editor::{DeletionReport, SubtreeEditor};
pub use history::TraversalHistory;
pub use state_graph::{AppState, StateGraph, StateId, WidgetId};
pub use widget::{ClickCount, Visibility, Widget, WidgetAction, WidgetStatus, WidgetType};
