//! Structural edits of the state graph
//!
//! Repair swaps a widget's template in place; delete removes a widget together
//! with everything recorded behind it.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::state_graph::{StateGraph, StateId, WidgetId};
use super::widget::{Visibility, WidgetStatus};
use crate::recognition::{Match, TemplateId, TemplateStore};
use crate::{Error, Result, MAX_DEPTH};

/// Summary of a subtree deletion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub widgets_removed: usize,
    pub states_removed: usize,
    pub templates_deleted: usize,
    pub template_failures: usize,
}

/// Repair and recursive deletion of widgets
#[derive(Debug, Clone, Copy)]
pub struct SubtreeEditor {
    max_depth: usize,
}

impl SubtreeEditor {
    pub fn new() -> Self {
        Self {
            max_depth: MAX_DEPTH,
        }
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Point `widget` at a new template and the rectangle it was found at.
    ///
    /// Owner, list position and next state are untouched. Returns the
    /// replaced template so the caller can dispose of it.
    pub fn repair(
        &self,
        graph: &mut StateGraph,
        widget: WidgetId,
        found: &Match,
        template: TemplateId,
    ) -> Result<TemplateId> {
        let target = graph
            .widget_mut(widget)
            .ok_or(Error::UnknownWidget(widget))?;

        let previous = std::mem::replace(&mut target.template, template);
        target.location = found.rect();
        target.visibility = Visibility::Visible;
        target.status = WidgetStatus::Located;

        info!(?widget, old = %previous, new = %target.template, "Repaired widget");
        Ok(previous)
    }

    /// Remove `widget` and every widget reachable through its next state.
    ///
    /// The whole subtree is checked against the depth limit before anything
    /// is removed. Emptied target states are pruned; template files that fail
    /// to delete are logged and skipped.
    pub fn delete(
        &self,
        graph: &mut StateGraph,
        templates: &mut dyn TemplateStore,
        widget: WidgetId,
    ) -> Result<DeletionReport> {
        let owner = graph.owner(widget).ok_or(Error::UnknownWidget(widget))?;

        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut path = vec![graph.root(), owner];
        if let Err(e) = self.plan(graph, owner, widget, 0, &mut path, &mut seen, &mut order) {
            warn!(?widget, error = %e, "Aborting subtree deletion");
            return Err(e);
        }

        let mut report = DeletionReport::default();
        for (state, id) in order {
            let next = graph.next_state(id);
            let removed = graph.remove_widget(state, id)?;
            report.widgets_removed += 1;

            for template in removed.templates() {
                dispose_template(templates, template, &mut report);
            }

            if let Some(next) = next {
                if next != graph.root()
                    && graph.incoming_count(next) == 0
                    && graph.widgets_of(next).is_empty()
                    && graph.remove_state(next).is_some()
                {
                    report.states_removed += 1;
                }
            }
        }

        info!(
            widgets = report.widgets_removed,
            states = report.states_removed,
            "Deleted subtree"
        );
        Ok(report)
    }

    /// Post-order list of `(owner, widget)` pairs to remove
    #[allow(clippy::too_many_arguments)]
    fn plan(
        &self,
        graph: &StateGraph,
        owner: StateId,
        widget: WidgetId,
        depth: usize,
        path: &mut Vec<StateId>,
        seen: &mut HashSet<WidgetId>,
        order: &mut Vec<(StateId, WidgetId)>,
    ) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::DepthExceeded {
                depth,
                limit: self.max_depth,
            });
        }
        if !seen.insert(widget) {
            return Ok(());
        }

        let next = graph.next_state(widget).ok_or(Error::UnknownWidget(widget))?;
        if path.contains(&next) {
            debug!(?widget, ?next, "Widget links back to an ancestor, not descending");
        } else {
            path.push(next);
            for child in graph.widgets_of(next).to_vec() {
                self.plan(graph, next, child, depth + 1, path, seen, order)?;
            }
            path.pop();
        }

        order.push((owner, widget));
        Ok(())
    }
}

impl Default for SubtreeEditor {
    fn default() -> Self {
        Self::new()
    }
}

fn dispose_template(
    templates: &mut dyn TemplateStore,
    template: &TemplateId,
    report: &mut DeletionReport,
) {
    match templates.delete(template) {
        Ok(true) => report.templates_deleted += 1,
        Ok(false) => debug!(%template, "Template was not stored"),
        Err(e) => {
            warn!(%template, error = %e, "Failed to delete template");
            report.template_failures += 1;
        }
    }
}
