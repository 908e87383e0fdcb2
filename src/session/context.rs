//! Recording session
//!
//! The session owns everything a recording needs between user interactions:
//! the state graph, the configuration, the collaborators, the edit mode and
//! the modifier-key state. All graph mutation happens here, on the caller's
//! thread, between traversal steps.
//!
//! Collaborator failures stop the session before the error is returned.

use tracing::{debug, error, info, warn};

use super::commands::{Command, Key, KeyMap};
use super::modifiers::{KeyHook, ModifierChannel, ModifierConsumer, ModifierState};
use crate::action::ActionExecutor;
use crate::app::Config;
use crate::backends::Backends;
use crate::graph::{
    ClickCount, DeletionReport, StateGraph, StateId, SubtreeEditor, Widget, WidgetAction,
    WidgetId, WidgetStatus,
};
use crate::recognition::{subimage, Match, Point, Rect, TemplateId, WidgetLocator};
use crate::traversal::TraversalEngine;
use crate::{Error, Result};

/// Structural edit in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Idle,
    /// The next capture replaces this widget's template
    Repairing(WidgetId),
    /// The next capture becomes this menu widget's second template
    AwaitingSecondClick(WidgetId),
}

/// Result of recording a screen region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Region empty or not confirmed by a fresh match
    Rejected,
    /// A type widget is still waiting for its text
    TypeInProgress,
    Inserted { widget: WidgetId, next: StateId },
    Repaired(WidgetId),
    SecondTemplateAttached(WidgetId),
}

/// Result of a plain click on recorded widgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Performed { widget: WidgetId, next: StateId },
    /// Located before, but not found again within the retries
    NotFound(WidgetId),
    /// Widget was not located and should be repaired
    NeedsRepair(WidgetId),
    NoWidget,
}

/// Result of a pointer press routed by the modifier state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    Recorded(RecordOutcome),
    Clicked(ClickOutcome),
}

/// Result of a dispatched command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    ActionSelected,
    Replayed(bool),
    Navigated(Option<StateId>),
    RepairStarted(Option<WidgetId>),
    Deleted(Option<DeletionReport>),
    Cancelled,
    Ignored,
}

/// Recording and replay session
pub struct Session {
    config: Config,
    graph: StateGraph,
    backends: Backends,
    engine: TraversalEngine,
    editor: SubtreeEditor,
    keymap: KeyMap,
    edit_mode: EditMode,
    selected_action: WidgetAction,
    pending_type: Option<WidgetId>,
    modifiers: ModifierState,
    modifier_rx: Option<ModifierConsumer>,
    stacked_index: usize,
    running: bool,
}

impl Session {
    pub fn new(config: Config, backends: Backends) -> Result<Self> {
        config.validate()?;

        let locator = WidgetLocator::new(config.recognition.threshold());
        let executor = ActionExecutor::new(config.timing.action_timing());
        let engine = TraversalEngine::new(locator, executor)
            .with_find_retries(config.recognition.widget_find_retries)
            .with_settle_delays(config.timing.retry_settle(), config.timing.action_settle());
        let keymap = KeyMap::new(&config.keybindings);

        Ok(Self {
            config,
            graph: StateGraph::new(),
            backends,
            engine,
            editor: SubtreeEditor::new(),
            keymap,
            edit_mode: EditMode::Idle,
            selected_action: WidgetAction::LeftClick,
            pending_type: None,
            modifiers: ModifierState::default(),
            modifier_rx: None,
            stacked_index: 0,
            running: false,
        })
    }

    /// Continue recording on an existing graph
    pub fn with_graph(mut self, graph: StateGraph) -> Self {
        self.graph = graph;
        self
    }

    /// Install the keyboard hook and start accepting interactions
    pub fn start(&mut self, hook: &mut dyn KeyHook) -> Result<()> {
        let channel = ModifierChannel::with_capacity(self.config.capture.modifier_channel_capacity);
        let (producer, consumer) = channel.split();

        if let Err(e) = hook.start(producer) {
            error!(error = %e, "Keyboard hook registration failed");
            self.stop();
            return Err(Error::Collaborator(format!("keyboard hook: {e}")));
        }

        self.modifier_rx = Some(consumer);
        self.modifiers = ModifierState::default();
        self.running = true;
        info!("Session started");
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.running {
            info!("Session stopped");
        }
        self.running = false;
        self.modifier_rx = None;
        self.edit_mode = EditMode::Idle;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut StateGraph {
        &mut self.graph
    }

    pub fn backends_mut(&mut self) -> &mut Backends {
        &mut self.backends
    }

    pub fn engine(&self) -> &TraversalEngine {
        &self.engine
    }

    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    pub fn selected_action(&self) -> &WidgetAction {
        &self.selected_action
    }

    pub fn pending_type(&self) -> Option<WidgetId> {
        self.pending_type
    }

    pub fn modifiers(&self) -> ModifierState {
        self.modifiers
    }

    /// Fold pending modifier events from the keyboard hook
    pub fn poll_modifiers(&mut self) -> ModifierState {
        if let Some(rx) = self.modifier_rx.as_mut() {
            let applied = rx.drain_into(&mut self.modifiers);
            if applied > 0 {
                debug!(applied, control = self.modifiers.control, "Modifier events");
            }
        }
        self.modifiers
    }

    /// Choose the action the next recorded widget gets
    pub fn select_action(&mut self, action: WidgetAction) {
        info!(action = action.label(), "Recording action selected");
        self.selected_action = action;
    }

    /// Record the default-sized region centered on `point`
    pub fn record_at(&mut self, point: Point) -> Result<RecordOutcome> {
        let capture = &self.config.capture;
        let rect = Rect::centered_on(point, capture.default_widget_width, capture.default_widget_height);
        self.record(rect)
    }

    /// Record the region spanned by a drag from `start` to `end`
    pub fn record_region(&mut self, start: Point, end: Point) -> Result<RecordOutcome> {
        self.record(Rect::from_corners(start, end))
    }

    fn record(&mut self, rect: Rect) -> Result<RecordOutcome> {
        self.ensure_running()?;

        if self.edit_mode == EditMode::Idle
            && self.selected_action.is_type()
            && self.pending_type.is_some()
        {
            info!("A type action is still in progress, finish that first");
            return Ok(RecordOutcome::TypeInProgress);
        }

        let screenshot = self.collaborator(|b| b.capture())?;
        let Some(template) = subimage(&screenshot, rect) else {
            info!(?rect, "Region lies outside the captured screen");
            return Ok(RecordOutcome::Rejected);
        };
        let Some(found) = self.engine.locator().find_accepted(
            self.backends.matcher.as_mut(),
            &template,
            &screenshot,
        ) else {
            info!(?rect, "Recorded region could not be matched");
            return Ok(RecordOutcome::Rejected);
        };
        let id = self.backends.templates.save(&template)?;

        match self.edit_mode {
            EditMode::Repairing(widget) => self.finish_repair(widget, &found, id),
            EditMode::AwaitingSecondClick(widget) => self.attach_second_template(widget, id),
            EditMode::Idle => self.insert_recorded(&found, id),
        }
    }

    fn finish_repair(&mut self, widget: WidgetId, found: &Match, id: TemplateId) -> Result<RecordOutcome> {
        let old = self.editor.repair(&mut self.graph, widget, found, id)?;
        let mut stale = vec![old];

        let selected = self.selected_action.clone();
        if let Some(target) = self.graph.widget_mut(widget) {
            if std::mem::discriminant(&target.action) != std::mem::discriminant(&selected) {
                let replaced = std::mem::replace(&mut target.action, selected);
                if let WidgetAction::TwoStepMenu {
                    second_template: Some(second),
                } = replaced
                {
                    stale.push(second);
                }
            }
        }
        for template in &stale {
            self.dispose_template(template);
        }

        self.edit_mode = if self.selected_action.is_menu() {
            EditMode::AwaitingSecondClick(widget)
        } else {
            EditMode::Idle
        };
        Ok(RecordOutcome::Repaired(widget))
    }

    fn attach_second_template(&mut self, widget: WidgetId, id: TemplateId) -> Result<RecordOutcome> {
        self.edit_mode = EditMode::Idle;
        let target = self
            .graph
            .widget_mut(widget)
            .ok_or(Error::UnknownWidget(widget))?;

        match target.set_second_template(id) {
            Ok(Some(old)) => self.dispose_template(&old),
            Ok(None) => {}
            Err(id) => {
                warn!(?widget, "Widget is not a menu action");
                self.dispose_template(&id);
                return Ok(RecordOutcome::Rejected);
            }
        }

        self.perform(widget)?;
        Ok(RecordOutcome::SecondTemplateAttached(widget))
    }

    fn insert_recorded(&mut self, found: &Match, id: TemplateId) -> Result<RecordOutcome> {
        if let Some(pending) = self.pending_type.take() {
            info!(?pending, "Discarding uncommitted type action");
            self.discard(pending);
        }

        let action = self.selected_action.clone();
        let mut widget = Widget::new(action.clone(), id, found.rect());
        widget.mark_located(found.rect());

        let state = self.graph.current_state();
        let widget_id = self.graph.add_widget(state, widget, None)?;
        let next = self
            .graph
            .next_state(widget_id)
            .ok_or(Error::UnknownWidget(widget_id))?;
        info!(action = action.label(), ?widget_id, ?next, "Recorded widget");

        if action.is_type() {
            self.pending_type = Some(widget_id);
        } else if action != WidgetAction::Check {
            if action.is_menu() {
                self.edit_mode = EditMode::AwaitingSecondClick(widget_id);
            }
            self.graph.advance_to(next)?;
            self.perform(widget_id)?;
        }

        Ok(RecordOutcome::Inserted {
            widget: widget_id,
            next,
        })
    }

    /// Give the pending type widget its text and click count, then perform it.
    ///
    /// Returns the state it leads to, or `None` when nothing was pending.
    pub fn commit_type_text(&mut self, text: &str, clicks: ClickCount) -> Result<Option<StateId>> {
        self.ensure_running()?;
        let Some(widget) = self.pending_type.take() else {
            info!("No type action waiting for text");
            return Ok(None);
        };

        let target = self
            .graph
            .widget_mut(widget)
            .ok_or(Error::UnknownWidget(widget))?;
        target.action = WidgetAction::Type {
            text: Some(text.to_string()),
            clicks,
        };
        let next = self
            .graph
            .next_state(widget)
            .ok_or(Error::UnknownWidget(widget))?;

        self.graph.advance_to(next)?;
        if !self.perform_located(widget)? {
            info!(?widget, "Type widget not found on screen, text kept");
        }
        Ok(Some(next))
    }

    /// Perform the first located action widget under `point`.
    pub fn click_at(&mut self, point: Point) -> Result<ClickOutcome> {
        self.ensure_running()?;

        let state = self.graph.current_state();
        let mut needs_repair = None;

        for id in self.graph.widgets_at(state, point) {
            let Some(widget) = self.graph.widget(id) else {
                continue;
            };

            if widget.is_action() && widget.status == WidgetStatus::Located {
                let attempts = self.engine.find_retries();
                for attempt in 0..attempts {
                    if self.perform_located(id)? {
                        let next = self.graph.next_state(id).ok_or(Error::UnknownWidget(id))?;
                        self.graph.advance_to(next)?;
                        return Ok(ClickOutcome::Performed { widget: id, next });
                    }
                    if attempt + 1 < attempts {
                        debug!(attempt, "Widget not found, retrying after settle delay");
                        self.backends.sleeper.sleep(self.engine.retry_settle());
                    }
                }
                return Ok(ClickOutcome::NotFound(id));
            }

            if widget.status == WidgetStatus::Unlocated && needs_repair.is_none() {
                needs_repair = Some(id);
            }
        }

        Ok(needs_repair.map_or(ClickOutcome::NoWidget, ClickOutcome::NeedsRepair))
    }

    /// Route a pointer press: record with Control held, otherwise perform
    pub fn handle_click(&mut self, point: Point) -> Result<PointerOutcome> {
        if self.poll_modifiers().control {
            self.record_at(point).map(PointerOutcome::Recorded)
        } else {
            self.click_at(point).map(PointerOutcome::Clicked)
        }
    }

    /// Record a dragged region if Control is held
    pub fn handle_drag(&mut self, start: Point, end: Point) -> Result<Option<RecordOutcome>> {
        if self.poll_modifiers().control {
            self.record_region(start, end).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Refresh widget statuses of the current state without performing
    pub fn on_state_changed(&mut self) -> Result<bool> {
        self.ensure_running()?;
        let state = self.graph.current_state();
        self.graph.reset_statuses(state);
        let outcome = self.engine.run(&mut self.backends, &mut self.graph, state, 0, false);
        self.check(outcome)
    }

    /// Replay everything reachable from `state`
    pub fn replay_from(&mut self, state: StateId) -> Result<bool> {
        self.ensure_running()?;
        info!(?state, "Replaying recorded widgets");
        let outcome = self.engine.run(&mut self.backends, &mut self.graph, state, 0, true);
        self.check(outcome)
    }

    /// Enter repair mode for `widget`; the next capture replaces its template
    pub fn begin_repair(&mut self, widget: WidgetId) -> Result<()> {
        let target = self.graph.widget(widget).ok_or(Error::UnknownWidget(widget))?;
        self.selected_action = target.action.kind_only();
        self.edit_mode = EditMode::Repairing(widget);
        info!(?widget, "Repairing widget, capture its new image");
        Ok(())
    }

    /// Enter repair mode for the first located widget under `point`
    pub fn begin_repair_at(&mut self, point: Point) -> Result<Option<WidgetId>> {
        let state = self.graph.current_state();
        let target = self.graph.widgets_at(state, point).into_iter().find(|id| {
            self.graph
                .widget(*id)
                .is_some_and(|w| w.status == WidgetStatus::Located)
        });
        match target {
            Some(widget) => {
                self.begin_repair(widget)?;
                Ok(Some(widget))
            }
            None => Ok(None),
        }
    }

    /// Delete `widget` and its subtree
    pub fn delete_widget(&mut self, widget: WidgetId) -> Result<DeletionReport> {
        let report = self
            .editor
            .delete(&mut self.graph, self.backends.templates.as_mut(), widget)?;

        if self.pending_type.is_some_and(|w| !self.graph.contains_widget(w)) {
            self.pending_type = None;
        }
        match self.edit_mode {
            EditMode::Repairing(w) | EditMode::AwaitingSecondClick(w)
                if !self.graph.contains_widget(w) =>
            {
                self.edit_mode = EditMode::Idle;
            }
            _ => {}
        }
        Ok(report)
    }

    /// Delete the selected widget among those stacked under `point`
    pub fn delete_at(&mut self, point: Point) -> Result<Option<DeletionReport>> {
        let state = self.graph.current_state();
        let stacked = self.graph.widgets_at(state, point);
        if stacked.is_empty() {
            debug!(x = point.x, y = point.y, "No widget to delete");
            return Ok(None);
        }
        let widget = stacked[self.stacked_index % stacked.len()];
        self.delete_widget(widget).map(Some)
    }

    /// Move the selection among stacked widgets
    pub fn scroll(&mut self, delta: i32) {
        let index = self.stacked_index as i64 + i64::from(delta);
        self.stacked_index = index.max(0) as usize;
    }

    pub fn stacked_index(&self) -> usize {
        self.stacked_index
    }

    /// Abandon the current edit
    pub fn cancel(&mut self) {
        match std::mem::take(&mut self.edit_mode) {
            EditMode::Repairing(widget) => info!(?widget, "Repair cancelled"),
            EditMode::AwaitingSecondClick(widget) => {
                let incomplete = self
                    .graph
                    .widget(widget)
                    .is_some_and(|w| w.second_template().is_none());
                if incomplete {
                    info!(?widget, "Removing incomplete menu action");
                    self.discard(widget);
                }
            }
            EditMode::Idle => {
                if let Some(pending) = self.pending_type.take() {
                    info!(?pending, "Removing uncommitted type action");
                    self.discard(pending);
                }
            }
        }
    }

    pub fn go_home(&mut self) -> StateId {
        info!("Went to the home state");
        self.graph.go_home()
    }

    pub fn go_back(&mut self) -> Option<StateId> {
        let state = self.graph.go_back();
        if state.is_none() {
            info!("History is empty, cannot go back");
        }
        state
    }

    pub fn go_forward(&mut self) -> Option<StateId> {
        let state = self.graph.go_forward();
        if state.is_none() {
            info!("Current state has no widgets, cannot go forward");
        }
        state
    }

    /// Handle a key press. Escape always cancels; other keys need Control.
    pub fn handle_key(&mut self, key: Key, pointer: Point) -> Result<CommandOutcome> {
        let control = self.poll_modifiers().control;
        if key != Key::Escape && !control {
            return Ok(CommandOutcome::Ignored);
        }
        match self.keymap.command_for(key) {
            Some(command) => self.dispatch(command, pointer),
            None => Ok(CommandOutcome::Ignored),
        }
    }

    /// Execute a command; `pointer` is the current cursor position
    pub fn dispatch(&mut self, command: Command, pointer: Point) -> Result<CommandOutcome> {
        self.ensure_running()?;
        debug!(?command, "Dispatching");

        match command {
            Command::SelectAction(action) => {
                self.select_action(action);
                Ok(CommandOutcome::ActionSelected)
            }
            Command::PerformWidgets => {
                let state = self.graph.current_state();
                self.replay_from(state).map(CommandOutcome::Replayed)
            }
            Command::Home => Ok(CommandOutcome::Navigated(Some(self.go_home()))),
            Command::PreviousState => Ok(CommandOutcome::Navigated(self.go_back())),
            Command::NextState => Ok(CommandOutcome::Navigated(self.go_forward())),
            Command::ForceRepair => self.begin_repair_at(pointer).map(CommandOutcome::RepairStarted),
            Command::DeleteAtPointer => self.delete_at(pointer).map(CommandOutcome::Deleted),
            Command::Cancel => {
                self.cancel();
                Ok(CommandOutcome::Cancelled)
            }
        }
    }

    /// Perform a widget at its stored location and mark it valid
    fn perform(&mut self, widget: WidgetId) -> Result<()> {
        let target = self.graph.widget(widget).ok_or(Error::UnknownWidget(widget))?;
        let outcome = self.engine.executor().execute(&mut self.backends, target);
        self.check(outcome)?;
        if let Some(target) = self.graph.widget_mut(widget) {
            target.mark_valid();
        }
        Ok(())
    }

    /// Locate a widget on a fresh screenshot and perform it if found
    fn perform_located(&mut self, widget: WidgetId) -> Result<bool> {
        let screenshot = self.collaborator(|b| b.capture())?;
        let target = self
            .graph
            .widget_mut(widget)
            .ok_or(Error::UnknownWidget(widget))?;
        let found = self.engine.locator().resolve(
            self.backends.matcher.as_mut(),
            self.backends.templates.as_ref(),
            target,
            &screenshot,
        );
        if !found {
            return Ok(false);
        }
        self.perform(widget)?;
        Ok(true)
    }

    /// Remove an uncommitted widget together with its template
    fn discard(&mut self, widget: WidgetId) {
        if let Err(e) = self
            .editor
            .delete(&mut self.graph, self.backends.templates.as_mut(), widget)
        {
            warn!(?widget, error = %e, "Failed to discard widget");
        }
    }

    fn dispose_template(&mut self, template: &TemplateId) {
        if let Err(e) = self.backends.templates.delete(template) {
            warn!(%template, error = %e, "Failed to delete template");
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.running {
            Ok(())
        } else {
            Err(Error::SessionStopped)
        }
    }

    fn collaborator<T>(&mut self, op: impl FnOnce(&mut Backends) -> Result<T>) -> Result<T> {
        let outcome = op(&mut self.backends);
        self.check(outcome)
    }

    /// Stop the session on fatal errors before handing them back
    fn check<T>(&mut self, outcome: Result<T>) -> Result<T> {
        if let Err(e) = &outcome {
            if e.is_fatal() {
                error!(error = %e, "Collaborator failure");
                self.stop();
            }
        }
        outcome
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("running", &self.running)
            .field("current", &self.graph.current_state())
            .field("edit_mode", &self.edit_mode)
            .field("selected_action", &self.selected_action)
            .finish_non_exhaustive()
    }
}
