//! State graph
//!
//! Application states are nodes; widgets are the edges leading from the state
//! they were recorded in to the state their action produces. Backed by
//! `petgraph::StableGraph` so handles stay valid across deletions.
//!
//! The graph does not deduplicate widgets covering the same rectangle. Callers
//! confirm a recorded region with a fresh match before inserting it.

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::debug;

use super::history::TraversalHistory;
use super::widget::{Widget, WidgetStatus};
use crate::recognition::Point;
use crate::{Error, Result};

/// Stable state handle
pub type StateId = NodeIndex;

/// Stable widget handle
pub type WidgetId = EdgeIndex;

/// A discovered application state
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Outgoing widgets in discovery order
    widgets: Vec<WidgetId>,
}

impl AppState {
    pub fn widgets(&self) -> &[WidgetId] {
        &self.widgets
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}

/// Directed graph of states and the widgets between them
#[derive(Debug, Clone)]
pub struct StateGraph {
    inner: StableGraph<AppState, Widget>,
    root: StateId,
    current: StateId,
    history: TraversalHistory,
}

impl StateGraph {
    /// Create a graph holding only the home state
    pub fn new() -> Self {
        let mut inner = StableGraph::new();
        let root = inner.add_node(AppState::default());
        Self {
            inner,
            root,
            current: root,
            history: TraversalHistory::new(),
        }
    }

    pub fn root(&self) -> StateId {
        self.root
    }

    pub fn current_state(&self) -> StateId {
        self.current
    }

    /// Make `state` current without touching the history
    pub fn set_current_state(&mut self, state: StateId) -> Result<()> {
        self.ensure_state(state)?;
        self.current = state;
        Ok(())
    }

    pub fn history(&self) -> &TraversalHistory {
        &self.history
    }

    pub fn contains_state(&self, state: StateId) -> bool {
        self.inner.contains_node(state)
    }

    pub fn contains_widget(&self, widget: WidgetId) -> bool {
        self.inner.edge_weight(widget).is_some()
    }

    pub fn state_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn widget_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Add a widget to `parent`, returning its handle.
    ///
    /// The widget leads to `existing_next` when given, otherwise to a newly
    /// created state.
    pub fn add_widget(
        &mut self,
        parent: StateId,
        widget: Widget,
        existing_next: Option<StateId>,
    ) -> Result<WidgetId> {
        self.ensure_state(parent)?;
        let next = match existing_next {
            Some(next) => {
                self.ensure_state(next)?;
                next
            }
            None => self.inner.add_node(AppState::default()),
        };

        let id = self.inner.add_edge(parent, next, widget);
        if let Some(state) = self.inner.node_weight_mut(parent) {
            state.widgets.push(id);
        }
        debug!(?parent, ?next, ?id, "Inserted widget");
        Ok(id)
    }

    /// Add a widget to `parent` and return the state it leads to
    pub fn insert_widget(
        &mut self,
        parent: StateId,
        widget: Widget,
        existing_next: Option<StateId>,
    ) -> Result<StateId> {
        let id = self.add_widget(parent, widget, existing_next)?;
        self.next_state(id).ok_or(Error::UnknownWidget(id))
    }

    /// Detach a widget from its owning state.
    ///
    /// The target state is left in place.
    pub fn remove_widget(&mut self, state: StateId, widget: WidgetId) -> Result<Widget> {
        if self.owner(widget) != Some(state) {
            return Err(Error::UnknownWidget(widget));
        }
        if let Some(owner) = self.inner.node_weight_mut(state) {
            owner.widgets.retain(|w| *w != widget);
        }
        self.inner
            .remove_edge(widget)
            .ok_or(Error::UnknownWidget(widget))
    }

    /// Remove a state and every widget attached to it.
    ///
    /// The home state cannot be removed. If the current state is removed the
    /// home state becomes current.
    pub fn remove_state(&mut self, state: StateId) -> Option<AppState> {
        if state == self.root || !self.contains_state(state) {
            return None;
        }

        let incoming: Vec<(StateId, WidgetId)> = self
            .inner
            .edges_directed(state, Direction::Incoming)
            .map(|e| (e.source(), e.id()))
            .collect();
        for (source, widget) in incoming {
            if let Some(owner) = self.inner.node_weight_mut(source) {
                owner.widgets.retain(|w| *w != widget);
            }
        }

        if self.current == state {
            self.current = self.root;
        }
        self.inner.remove_node(state)
    }

    pub fn state(&self, state: StateId) -> Option<&AppState> {
        self.inner.node_weight(state)
    }

    pub fn widget(&self, widget: WidgetId) -> Option<&Widget> {
        self.inner.edge_weight(widget)
    }

    pub fn widget_mut(&mut self, widget: WidgetId) -> Option<&mut Widget> {
        self.inner.edge_weight_mut(widget)
    }

    /// Widgets of a state in discovery order; empty for unknown states
    pub fn widgets_of(&self, state: StateId) -> &[WidgetId] {
        self.inner
            .node_weight(state)
            .map(AppState::widgets)
            .unwrap_or(&[])
    }

    pub fn owner(&self, widget: WidgetId) -> Option<StateId> {
        self.inner.edge_endpoints(widget).map(|(source, _)| source)
    }

    pub fn next_state(&self, widget: WidgetId) -> Option<StateId> {
        self.inner.edge_endpoints(widget).map(|(_, target)| target)
    }

    /// Number of widgets leading into `state`
    pub fn incoming_count(&self, state: StateId) -> usize {
        self.inner
            .edges_directed(state, Direction::Incoming)
            .count()
    }

    /// Visible widgets of `state` whose last observed rectangle contains `point`
    pub fn widgets_at(&self, state: StateId, point: Point) -> Vec<WidgetId> {
        self.widgets_of(state)
            .iter()
            .copied()
            .filter(|id| {
                self.widget(*id)
                    .is_some_and(|w| w.is_visible() && w.location.contains(point))
            })
            .collect()
    }

    /// Mark every widget of `state` as not located
    pub fn reset_statuses(&mut self, state: StateId) {
        let widgets = self.widgets_of(state).to_vec();
        for id in widgets {
            if let Some(widget) = self.inner.edge_weight_mut(id) {
                widget.status = WidgetStatus::Unlocated;
            }
        }
    }

    /// Move to `state`, remembering the current state for "go back"
    pub fn advance_to(&mut self, state: StateId) -> Result<()> {
        self.ensure_state(state)?;
        if state != self.current {
            self.history.push(self.current);
        }
        self.current = state;
        Ok(())
    }

    /// Step back to the most recent live history entry
    pub fn go_back(&mut self) -> Option<StateId> {
        while let Some(state) = self.history.pop() {
            if self.contains_state(state) {
                self.current = state;
                return Some(state);
            }
            debug!(?state, "Skipping deleted state in history");
        }
        None
    }

    /// Follow the first widget of the current state
    pub fn go_forward(&mut self) -> Option<StateId> {
        let first = self.widgets_of(self.current).first().copied()?;
        let next = self.next_state(first)?;
        self.current = next;
        Some(next)
    }

    /// Return to the home state and forget the history
    pub fn go_home(&mut self) -> StateId {
        self.history.clear();
        self.current = self.root;
        self.root
    }

    fn ensure_state(&self, state: StateId) -> Result<()> {
        if self.contains_state(state) {
            Ok(())
        } else {
            Err(Error::UnknownState(state))
        }
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::WidgetAction;
    use crate::recognition::{Rect, TemplateId};

    fn widget(name: &str, rect: Rect) -> Widget {
        Widget::new(WidgetAction::LeftClick, TemplateId::new(name).unwrap(), rect)
    }

    #[test]
    fn test_new_graph_has_home() {
        let graph = StateGraph::new();
        assert_eq!(graph.state_count(), 1);
        assert_eq!(graph.current_state(), graph.root());
        assert!(graph.widgets_of(graph.root()).is_empty());
    }

    #[test]
    fn test_insert_creates_next_state() {
        let mut graph = StateGraph::new();
        let root = graph.root();
        let next = graph.insert_widget(root, widget("a.png", Rect::default()), None).unwrap();

        assert_ne!(next, root);
        assert_eq!(graph.state_count(), 2);
        assert_eq!(graph.widgets_of(root).len(), 1);
        let id = graph.widgets_of(root)[0];
        assert_eq!(graph.owner(id), Some(root));
        assert_eq!(graph.next_state(id), Some(next));
    }

    #[test]
    fn test_insert_with_existing_next() {
        let mut graph = StateGraph::new();
        let root = graph.root();
        let s1 = graph.insert_widget(root, widget("a.png", Rect::default()), None).unwrap();
        let again = graph
            .insert_widget(s1, widget("b.png", Rect::default()), Some(root))
            .unwrap();

        assert_eq!(again, root);
        assert_eq!(graph.state_count(), 2);
        assert_eq!(graph.incoming_count(root), 1);
    }

    #[test]
    fn test_insert_into_unknown_state() {
        let mut graph = StateGraph::new();
        let result = graph.insert_widget(StateId::new(42), widget("a.png", Rect::default()), None);
        assert!(matches!(result, Err(Error::UnknownState(_))));
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut graph = StateGraph::new();
        let root = graph.root();
        let a = graph.add_widget(root, widget("a.png", Rect::default()), None).unwrap();
        let b = graph.add_widget(root, widget("b.png", Rect::default()), None).unwrap();
        let c = graph.add_widget(root, widget("c.png", Rect::default()), None).unwrap();

        graph.remove_widget(root, b).unwrap();
        assert_eq!(graph.widgets_of(root), &[a, c]);
    }

    #[test]
    fn test_remove_widget_wrong_owner() {
        let mut graph = StateGraph::new();
        let root = graph.root();
        let a = graph.add_widget(root, widget("a.png", Rect::default()), None).unwrap();
        let s1 = graph.next_state(a).unwrap();

        assert!(matches!(graph.remove_widget(s1, a), Err(Error::UnknownWidget(_))));
        assert!(graph.contains_widget(a));
    }

    #[test]
    fn test_widgets_at_point() {
        let mut graph = StateGraph::new();
        let root = graph.root();
        let a = graph.add_widget(root, widget("a.png", Rect::new(0, 0, 50, 50)), None).unwrap();
        let b = graph.add_widget(root, widget("b.png", Rect::new(25, 25, 50, 50)), None).unwrap();
        let _c = graph.add_widget(root, widget("c.png", Rect::new(200, 200, 5, 5)), None).unwrap();

        assert_eq!(graph.widgets_at(root, Point::new(30, 30)), vec![a, b]);
        assert_eq!(graph.widgets_at(root, Point::new(60, 60)), vec![b]);

        graph.widget_mut(a).unwrap().visibility = crate::graph::Visibility::Hidden;
        assert_eq!(graph.widgets_at(root, Point::new(30, 30)), vec![b]);
    }

    #[test]
    fn test_reset_statuses() {
        let mut graph = StateGraph::new();
        let root = graph.root();
        let a = graph.add_widget(root, widget("a.png", Rect::default()), None).unwrap();
        graph.widget_mut(a).unwrap().status = WidgetStatus::Valid;

        graph.reset_statuses(root);
        assert_eq!(graph.widget(a).unwrap().status, WidgetStatus::Unlocated);
    }

    #[test]
    fn test_remove_state_detaches_incoming() {
        let mut graph = StateGraph::new();
        let root = graph.root();
        let a = graph.add_widget(root, widget("a.png", Rect::default()), None).unwrap();
        let s1 = graph.next_state(a).unwrap();
        graph.set_current_state(s1).unwrap();

        assert!(graph.remove_state(s1).is_some());
        assert!(graph.widgets_of(root).is_empty());
        assert!(!graph.contains_widget(a));
        assert_eq!(graph.current_state(), root);
        assert!(graph.remove_state(root).is_none());
    }

    #[test]
    fn test_navigation() {
        let mut graph = StateGraph::new();
        let root = graph.root();
        let s1 = graph.insert_widget(root, widget("a.png", Rect::default()), None).unwrap();
        let s2 = graph.insert_widget(s1, widget("b.png", Rect::default()), None).unwrap();

        graph.advance_to(s1).unwrap();
        graph.advance_to(s2).unwrap();
        assert_eq!(graph.history().len(), 2);

        assert_eq!(graph.go_back(), Some(s1));
        assert_eq!(graph.go_forward(), Some(s2));
        assert_eq!(graph.history().len(), 1);

        assert_eq!(graph.go_home(), root);
        assert!(graph.history().is_empty());
        assert!(graph.go_back().is_none());
    }

    #[test]
    fn test_go_back_skips_deleted_states() {
        let mut graph = StateGraph::new();
        let root = graph.root();
        let s1 = graph.insert_widget(root, widget("a.png", Rect::default()), None).unwrap();
        let s2 = graph.insert_widget(s1, widget("b.png", Rect::default()), None).unwrap();

        graph.advance_to(s1).unwrap();
        graph.advance_to(s2).unwrap();
        graph.remove_state(s1);

        assert_eq!(graph.go_back(), Some(root));
    }

    #[test]
    fn test_go_forward_from_leaf() {
        let mut graph = StateGraph::new();
        assert!(graph.go_forward().is_none());
        assert_eq!(graph.current_state(), graph.root());
    }
}
