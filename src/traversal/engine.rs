//! Replay of the state graph
//!
//! A visit to one state locates every widget with bounded retries, then, when
//! performing, executes each action widget in discovery order and recurses
//! into the state it leads to.
//!
//! Not finding a widget is an ordinary outcome (`Ok(false)`). Collaborator
//! failures and depth violations end the whole replay as `Err`.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::action::ActionExecutor;
use crate::backends::Backends;
use crate::graph::{StateGraph, StateId, WidgetId, WidgetStatus};
use crate::recognition::{Image, WidgetLocator};
use crate::{Error, Result, MAX_DEPTH};

/// Default number of location passes per state
pub const DEFAULT_FIND_RETRIES: u32 = 5;

/// Bounded, retrying graph walker
#[derive(Debug, Clone, Copy)]
pub struct TraversalEngine {
    locator: WidgetLocator,
    executor: ActionExecutor,
    find_retries: u32,
    retry_settle: Duration,
    action_settle: Duration,
    max_depth: usize,
}

impl TraversalEngine {
    pub fn new(locator: WidgetLocator, executor: ActionExecutor) -> Self {
        Self {
            locator,
            executor,
            find_retries: DEFAULT_FIND_RETRIES,
            retry_settle: Duration::from_millis(400),
            action_settle: Duration::from_millis(500),
            max_depth: MAX_DEPTH,
        }
    }

    /// Number of location passes; at least one pass always runs
    pub fn with_find_retries(mut self, retries: u32) -> Self {
        self.find_retries = retries.max(1);
        self
    }

    pub fn with_settle_delays(mut self, retry: Duration, action: Duration) -> Self {
        self.retry_settle = retry;
        self.action_settle = action;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn locator(&self) -> &WidgetLocator {
        &self.locator
    }

    pub fn locator_mut(&mut self) -> &mut WidgetLocator {
        &mut self.locator
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    pub fn find_retries(&self) -> u32 {
        self.find_retries
    }

    pub fn retry_settle(&self) -> Duration {
        self.retry_settle
    }

    /// Visit `state`: locate its widgets and, if `perform` is set, replay
    /// every action widget and the subtree behind it.
    ///
    /// Returns `Ok(true)` when everything was found (and performed).
    pub fn run(
        &self,
        backends: &mut Backends,
        graph: &mut StateGraph,
        state: StateId,
        depth: usize,
        perform: bool,
    ) -> Result<bool> {
        if depth > self.max_depth {
            warn!(depth, limit = self.max_depth, "Replay too deep, aborting");
            return Err(Error::DepthExceeded {
                depth,
                limit: self.max_depth,
            });
        }

        graph.set_current_state(state)?;
        let widgets = graph.widgets_of(state).to_vec();
        if widgets.is_empty() {
            debug!(?state, depth, "Leaf state");
            return Ok(true);
        }

        graph.reset_statuses(state);
        if !self.locate_all(backends, graph, &widgets)? {
            info!(?state, depth, "Widgets missing after {} passes", self.find_retries);
            return Ok(false);
        }

        if !perform {
            return Ok(true);
        }

        for id in widgets {
            let is_action = graph.widget(id).is_some_and(|w| w.is_action());
            if !is_action {
                continue;
            }

            // Earlier siblings may have changed the screen
            let screenshot = backends.capture()?;
            if !self.resolve(backends, graph, id, &screenshot) {
                info!(?id, depth, "Widget no longer on screen");
                return Ok(false);
            }

            let widget = graph.widget(id).ok_or(Error::UnknownWidget(id))?;
            self.executor.execute(backends, widget)?;
            if let Some(widget) = graph.widget_mut(id) {
                widget.mark_valid();
            }
            backends.sleeper.sleep(self.action_settle);

            let next = graph.next_state(id).ok_or(Error::UnknownWidget(id))?;
            if !self.run(backends, graph, next, depth + 1, true)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Pass over the widgets until all are located or the passes run out
    fn locate_all(
        &self,
        backends: &mut Backends,
        graph: &mut StateGraph,
        widgets: &[WidgetId],
    ) -> Result<bool> {
        for pass in 0..self.find_retries {
            let screenshot = backends.capture()?;
            let mut missing = 0usize;

            for &id in widgets {
                let unlocated = graph
                    .widget(id)
                    .is_some_and(|w| w.status == WidgetStatus::Unlocated);
                if unlocated && !self.resolve(backends, graph, id, &screenshot) {
                    missing += 1;
                }
            }

            if missing == 0 {
                debug!(pass, "All widgets located");
                return Ok(true);
            }

            if pass + 1 < self.find_retries {
                debug!(pass, missing, "Retrying after settle delay");
                backends.sleeper.sleep(self.retry_settle);
            }
        }

        Ok(false)
    }

    fn resolve(
        &self,
        backends: &mut Backends,
        graph: &mut StateGraph,
        id: WidgetId,
        screenshot: &Image,
    ) -> bool {
        let Some(widget) = graph.widget_mut(id) else {
            return false;
        };
        self.locator.resolve(
            backends.matcher.as_mut(),
            backends.templates.as_ref(),
            widget,
            screenshot,
        )
    }
}
