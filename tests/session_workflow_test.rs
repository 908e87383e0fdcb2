//! Recording workflows driven through the session

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{fixed_responder, screen_with, Harness, InputEvent, MockKeyHook, Probe, Responder};
use widget_scout::action::{KeyCode, MouseButton};
use widget_scout::app::Config;
use widget_scout::graph::{ClickCount, WidgetAction, WidgetStatus};
use widget_scout::recognition::{Match, Point, RecognitionMode, Rect};
use widget_scout::session::{
    ClickOutcome, Command, CommandOutcome, EditMode, Key, Modifier, ModifierEvent,
    PointerOutcome, RecordOutcome, Session,
};
use widget_scout::{Error, StateId, WidgetId};

const BUTTON: Rect = Rect::new(20, 20, 10, 10);
const MENU_ENTRY: Rect = Rect::new(60, 60, 10, 10);
const OTHER: Rect = Rect::new(100, 100, 20, 10);

fn hit(rect: Rect) -> Match {
    Match::new(rect.x, rect.y, rect.width, rect.height, 100)
}

fn default_responder() -> Responder {
    fixed_responder(vec![(1, hit(BUTTON)), (2, hit(MENU_ENTRY)), (3, hit(OTHER))])
}

fn start_session(responder: Responder, mode: RecognitionMode) -> (Session, Probe, MockKeyHook) {
    let screen = screen_with(200, 200, &[(BUTTON, 1), (MENU_ENTRY, 2), (OTHER, 3)]);
    let (backends, probe) = Harness::new(responder)
        .with_screen(screen)
        .with_mode(mode)
        .build();

    let mut config = Config::default();
    config.capture.default_widget_width = 10;
    config.capture.default_widget_height = 10;

    let mut session = Session::new(config, backends).unwrap();
    let mut hook = MockKeyHook::default();
    session.start(&mut hook).unwrap();
    (session, probe, hook)
}

fn started() -> (Session, Probe, MockKeyHook) {
    start_session(default_responder(), RecognitionMode::Exact)
}

fn record(session: &mut Session, rect: Rect) -> RecordOutcome {
    let end = Point::new(rect.x + rect.width as i32, rect.y + rect.height as i32);
    session.record_region(rect.origin(), end).unwrap()
}

fn inserted(outcome: RecordOutcome) -> (WidgetId, StateId) {
    match outcome {
        RecordOutcome::Inserted { widget, next } => (widget, next),
        other => panic!("expected an inserted widget, got {other:?}"),
    }
}

fn template_exists(session: &mut Session, widget: WidgetId) -> bool {
    let template = session.graph().widget(widget).unwrap().template.clone();
    session.backends_mut().templates.load(&template).unwrap().is_some()
}

#[test]
fn test_recorded_click_is_performed_and_followed() {
    let (mut session, probe, _hook) = started();
    let home = session.graph().root();

    let (widget, next) = inserted(record(&mut session, BUTTON));

    assert_eq!(session.graph().current_state(), next);
    assert_eq!(session.graph().history().peek(), Some(home));
    let recorded = session.graph().widget(widget).unwrap();
    assert_eq!(recorded.location, BUTTON);
    assert_eq!(recorded.status, WidgetStatus::Valid);
    assert_eq!(
        probe.events(),
        vec![
            InputEvent::Move(Point::new(25, 25)),
            InputEvent::Press(MouseButton::Left),
            InputEvent::Release(MouseButton::Left),
            InputEvent::Move(Point::new(500, 500)),
        ]
    );
    assert!(template_exists(&mut session, widget));
}

#[test]
fn test_region_off_screen_is_rejected() {
    let (mut session, probe, _hook) = started();

    let outcome = session
        .record_region(Point::new(300, 300), Point::new(320, 320))
        .unwrap();

    assert_eq!(outcome, RecordOutcome::Rejected);
    assert_eq!(session.graph().widget_count(), 0);
    assert!(probe.calls().is_empty());
}

#[test]
fn test_unconfirmed_region_is_rejected() {
    let (mut session, _probe, _hook) = start_session(
        fixed_responder(vec![(1, Match::new(20, 20, 10, 10, 80))]),
        RecognitionMode::Exact,
    );

    assert_eq!(record(&mut session, BUTTON), RecordOutcome::Rejected);
    assert_eq!(session.graph().widget_count(), 0);
}

#[test]
fn test_type_action_waits_for_text() {
    let (mut session, probe, _hook) = started();
    let home = session.graph().root();
    session.select_action(WidgetAction::pending_type());

    let (widget, next) = inserted(record(&mut session, BUTTON));
    assert_eq!(session.pending_type(), Some(widget));
    assert_eq!(session.graph().current_state(), home);
    assert!(probe.events().is_empty());

    assert_eq!(record(&mut session, MENU_ENTRY), RecordOutcome::TypeInProgress);
    assert_eq!(probe.captures(), 1);

    let reached = session.commit_type_text("ab", ClickCount::Two).unwrap();

    assert_eq!(reached, Some(next));
    assert_eq!(session.graph().current_state(), next);
    assert_eq!(session.pending_type(), None);
    assert_eq!(
        session.graph().widget(widget).unwrap().action,
        WidgetAction::Type {
            text: Some("ab".to_string()),
            clicks: ClickCount::Two,
        }
    );
    assert_eq!(
        probe.events(),
        vec![
            InputEvent::Move(Point::new(25, 25)),
            InputEvent::Press(MouseButton::Left),
            InputEvent::Release(MouseButton::Left),
            InputEvent::Press(MouseButton::Left),
            InputEvent::Release(MouseButton::Left),
            InputEvent::KeyDown(KeyCode('a' as u32)),
            InputEvent::KeyUp(KeyCode('a' as u32)),
            InputEvent::KeyDown(KeyCode('b' as u32)),
            InputEvent::KeyUp(KeyCode('b' as u32)),
            InputEvent::Move(Point::new(500, 500)),
        ]
    );
    assert_eq!(
        probe.sleeps(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(50),
            Duration::from_millis(50),
        ]
    );
}

#[test]
fn test_commit_without_pending_type() {
    let (mut session, _probe, _hook) = started();
    assert_eq!(session.commit_type_text("ignored", ClickCount::One).unwrap(), None);
}

#[test]
fn test_other_action_discards_pending_type() {
    let (mut session, _probe, _hook) = started();
    let home = session.graph().root();
    session.select_action(WidgetAction::pending_type());
    let (typed, _) = inserted(record(&mut session, BUTTON));

    session.select_action(WidgetAction::LeftClick);
    let (clicked, _) = inserted(record(&mut session, MENU_ENTRY));

    assert!(!session.graph().contains_widget(typed));
    assert_eq!(session.pending_type(), None);
    assert_eq!(session.graph().widgets_of(home), &[clicked]);
    assert_eq!(session.graph().state_count(), 2);
}

#[test]
fn test_menu_action_records_second_template() {
    let (mut session, probe, _hook) = start_session(default_responder(), RecognitionMode::Color);
    session.select_action(WidgetAction::pending_menu());

    let (menu, next) = inserted(record(&mut session, BUTTON));
    assert_eq!(session.edit_mode(), EditMode::AwaitingSecondClick(menu));
    assert_eq!(session.graph().current_state(), next);
    assert_eq!(probe.presses(), vec![MouseButton::Left]);

    let outcome = record(&mut session, MENU_ENTRY);

    assert_eq!(outcome, RecordOutcome::SecondTemplateAttached(menu));
    assert_eq!(session.edit_mode(), EditMode::Idle);
    assert!(session.graph().widget(menu).unwrap().second_template().is_some());
    assert_eq!(
        probe.presses(),
        vec![MouseButton::Left, MouseButton::Left, MouseButton::Left]
    );
    assert!(probe.events().contains(&InputEvent::Move(Point::new(65, 65))));
    assert_eq!(
        probe.calls(),
        vec![
            (RecognitionMode::Exact, 1),
            (RecognitionMode::Exact, 2),
            (RecognitionMode::Exact, 2),
        ]
    );
    assert_eq!(probe.sleeps(), vec![Duration::from_millis(1500); 2]);
    assert_eq!(*probe.mode.lock(), RecognitionMode::Color);
}

#[test]
fn test_menu_second_click_matches_exactly() {
    let responder: Responder = Box::new(|mode, tag| match tag {
        1 => Some(hit(BUTTON)),
        2 if mode == RecognitionMode::Color => Some(hit(MENU_ENTRY)),
        _ => None,
    });
    let (mut session, probe, _hook) = start_session(responder, RecognitionMode::Exact);
    session.select_action(WidgetAction::pending_menu());

    let (menu, _) = inserted(record(&mut session, BUTTON));
    let outcome = record(&mut session, MENU_ENTRY);

    assert_eq!(outcome, RecordOutcome::SecondTemplateAttached(menu));
    assert_eq!(probe.presses(), vec![MouseButton::Left, MouseButton::Left]);
    assert_eq!(probe.calls().last(), Some(&(RecognitionMode::Exact, 2)));
    assert!(!probe.events().contains(&InputEvent::Move(Point::new(65, 65))));
}

#[test]
fn test_repair_replaces_template_in_place() {
    let (mut session, probe, _hook) = started();
    let (widget, next) = inserted(record(&mut session, BUTTON));
    let old_template = session.graph().widget(widget).unwrap().template.clone();
    session.go_back();

    session.begin_repair(widget).unwrap();
    assert_eq!(session.edit_mode(), EditMode::Repairing(widget));
    assert_eq!(session.selected_action(), &WidgetAction::LeftClick);
    session.select_action(WidgetAction::RightClick);

    let outcome = record(&mut session, OTHER);

    assert_eq!(outcome, RecordOutcome::Repaired(widget));
    assert_eq!(session.edit_mode(), EditMode::Idle);
    let repaired = session.graph().widget(widget).unwrap().clone();
    assert_ne!(repaired.template, old_template);
    assert_eq!(repaired.action, WidgetAction::RightClick);
    assert_eq!(repaired.location, OTHER);
    assert_eq!(repaired.status, WidgetStatus::Located);
    assert_eq!(session.graph().next_state(widget), Some(next));
    assert!(session.backends_mut().templates.load(&old_template).unwrap().is_none());
    assert!(template_exists(&mut session, widget));
    assert_eq!(probe.presses().len(), 1);
}

#[test]
fn test_repair_into_menu_awaits_second_template() {
    let (mut session, _probe, _hook) = started();
    let (widget, _) = inserted(record(&mut session, BUTTON));
    session.go_back();

    session.begin_repair(widget).unwrap();
    session.select_action(WidgetAction::pending_menu());
    assert_eq!(record(&mut session, OTHER), RecordOutcome::Repaired(widget));
    assert_eq!(session.edit_mode(), EditMode::AwaitingSecondClick(widget));

    assert_eq!(
        record(&mut session, MENU_ENTRY),
        RecordOutcome::SecondTemplateAttached(widget)
    );
    assert!(session.graph().widget(widget).unwrap().action.is_menu());
}

#[test]
fn test_repair_does_not_share_menu_template_with_new_widgets() {
    let (mut session, _probe, _hook) = started();
    session.select_action(WidgetAction::pending_menu());
    let (menu, _) = inserted(record(&mut session, BUTTON));
    record(&mut session, MENU_ENTRY);
    let second = session
        .graph()
        .widget(menu)
        .unwrap()
        .second_template()
        .cloned()
        .unwrap();
    session.go_back();

    session.begin_repair(menu).unwrap();
    assert_eq!(session.selected_action(), &WidgetAction::pending_menu());
    session.cancel();

    let (fresh, _) = inserted(record(&mut session, OTHER));
    assert_eq!(session.graph().widget(fresh).unwrap().second_template(), None);
    assert_eq!(session.edit_mode(), EditMode::AwaitingSecondClick(fresh));

    session.cancel();
    assert!(!session.graph().contains_widget(fresh));
    assert_eq!(session.graph().widget(menu).unwrap().second_template(), Some(&second));
    assert!(session.backends_mut().templates.load(&second).unwrap().is_some());
}

#[test]
fn test_repair_keeps_committed_type_text() {
    let (mut session, _probe, _hook) = started();
    session.select_action(WidgetAction::pending_type());
    let (typed, _) = inserted(record(&mut session, BUTTON));
    session.commit_type_text("ab", ClickCount::Two).unwrap();
    session.go_back();

    session.begin_repair(typed).unwrap();
    assert_eq!(session.selected_action(), &WidgetAction::pending_type());
    assert_eq!(record(&mut session, OTHER), RecordOutcome::Repaired(typed));

    assert_eq!(
        session.graph().widget(typed).unwrap().action,
        WidgetAction::Type {
            text: Some("ab".to_string()),
            clicks: ClickCount::Two,
        }
    );
}

#[test]
fn test_force_repair_targets_located_widget_under_pointer() {
    let (mut session, _probe, _hook) = started();
    let (widget, _) = inserted(record(&mut session, BUTTON));
    session.go_back();
    assert_eq!(
        session.dispatch(Command::ForceRepair, Point::new(25, 25)).unwrap(),
        CommandOutcome::RepairStarted(None)
    );

    assert!(session.on_state_changed().unwrap());
    let outcome = session
        .dispatch(Command::ForceRepair, Point::new(25, 25))
        .unwrap();

    assert_eq!(outcome, CommandOutcome::RepairStarted(Some(widget)));
    assert_eq!(session.edit_mode(), EditMode::Repairing(widget));
    assert_eq!(
        session.dispatch(Command::ForceRepair, Point::new(190, 190)).unwrap(),
        CommandOutcome::RepairStarted(None)
    );
}

#[test]
fn test_cancel_abandons_pending_edits() {
    let (mut session, _probe, _hook) = started();
    let home = session.graph().root();

    session.select_action(WidgetAction::pending_type());
    let (typed, _) = inserted(record(&mut session, BUTTON));
    session.cancel();
    assert_eq!(session.pending_type(), None);
    assert!(!session.graph().contains_widget(typed));
    assert_eq!(session.graph().state_count(), 1);

    session.select_action(WidgetAction::pending_menu());
    let (menu, _) = inserted(record(&mut session, BUTTON));
    session.cancel();
    assert_eq!(session.edit_mode(), EditMode::Idle);
    assert!(!session.graph().contains_widget(menu));
    assert_eq!(session.graph().current_state(), home);
    assert_eq!(session.graph().widget_count(), 0);

    session.select_action(WidgetAction::LeftClick);
    let (widget, _) = inserted(record(&mut session, BUTTON));
    session.go_back();
    session.begin_repair(widget).unwrap();
    session.cancel();
    assert_eq!(session.edit_mode(), EditMode::Idle);
    assert!(session.graph().contains_widget(widget));
}

#[test]
fn test_click_retries_before_giving_up() {
    let visible = Arc::new(AtomicBool::new(true));
    let shown = visible.clone();
    let responder: Responder = Box::new(move |_, tag| {
        (tag == 1 && shown.load(Ordering::SeqCst)).then(|| hit(BUTTON))
    });
    let (mut session, probe, _hook) = start_session(responder, RecognitionMode::Exact);
    let (widget, next) = inserted(record(&mut session, BUTTON));
    let home = session.go_back().unwrap();
    let pointer = Point::new(25, 25);

    assert!(session.on_state_changed().unwrap());
    assert_eq!(
        session.click_at(pointer).unwrap(),
        ClickOutcome::Performed { widget, next }
    );
    assert_eq!(session.graph().current_state(), next);

    session.go_back();
    assert_eq!(session.graph().current_state(), home);
    assert!(session.on_state_changed().unwrap());
    visible.store(false, Ordering::SeqCst);

    assert_eq!(session.click_at(pointer).unwrap(), ClickOutcome::NotFound(widget));
    assert_eq!(probe.sleeps(), vec![Duration::from_millis(400); 4]);
    assert_eq!(session.click_at(pointer).unwrap(), ClickOutcome::NeedsRepair(widget));
    assert_eq!(
        session.click_at(Point::new(150, 150)).unwrap(),
        ClickOutcome::NoWidget
    );
}

#[test]
fn test_delete_selected_stacked_widget() {
    let (mut session, _probe, _hook) = started();
    let home = session.graph().root();
    session.select_action(WidgetAction::Check);
    let (first, _) = inserted(record(&mut session, BUTTON));
    let (second, _) = inserted(record(&mut session, BUTTON));

    session.scroll(1);
    let outcome = session
        .dispatch(Command::DeleteAtPointer, Point::new(25, 25))
        .unwrap();

    match outcome {
        CommandOutcome::Deleted(Some(report)) => {
            assert_eq!(report.widgets_removed, 1);
            assert_eq!(report.states_removed, 1);
        }
        other => panic!("expected a deletion, got {other:?}"),
    }
    assert!(!session.graph().contains_widget(second));
    assert_eq!(session.graph().widgets_of(home), &[first]);
    assert_eq!(
        session.dispatch(Command::DeleteAtPointer, Point::new(190, 190)).unwrap(),
        CommandOutcome::Deleted(None)
    );
}

#[test]
fn test_control_keys_dispatch_commands() {
    let (mut session, probe, hook) = started();
    let home = session.graph().root();
    let pointer = Point::new(25, 25);

    hook.send(ModifierEvent::pressed(Modifier::Control));
    assert_eq!(
        session.handle_key(Key::Char('v'), pointer).unwrap(),
        CommandOutcome::ActionSelected
    );
    assert_eq!(session.selected_action(), &WidgetAction::RightClick);
    assert_eq!(
        session.handle_key(Key::Char('z'), pointer).unwrap(),
        CommandOutcome::Ignored
    );

    let outcome = session.handle_click(pointer).unwrap();
    let next = match outcome {
        PointerOutcome::Recorded(RecordOutcome::Inserted { next, .. }) => next,
        other => panic!("expected a recorded widget, got {other:?}"),
    };
    assert_eq!(probe.presses(), vec![MouseButton::Right]);

    assert_eq!(
        session.handle_key(Key::Char('q'), pointer).unwrap(),
        CommandOutcome::Navigated(Some(home))
    );
    assert_eq!(
        session.handle_key(Key::Char('E'), pointer).unwrap(),
        CommandOutcome::Navigated(Some(next))
    );
    assert_eq!(
        session.handle_key(Key::Char('h'), pointer).unwrap(),
        CommandOutcome::Navigated(Some(home))
    );
    assert_eq!(
        session.handle_key(Key::Char('r'), pointer).unwrap(),
        CommandOutcome::Replayed(true)
    );
    assert_eq!(probe.presses(), vec![MouseButton::Right, MouseButton::Right]);

    hook.send(ModifierEvent::released(Modifier::Control));
    assert_eq!(
        session.handle_key(Key::Char('c'), pointer).unwrap(),
        CommandOutcome::Ignored
    );
    assert_eq!(session.selected_action(), &WidgetAction::RightClick);
    assert_eq!(
        session.handle_key(Key::Escape, pointer).unwrap(),
        CommandOutcome::Cancelled
    );
    assert!(session.handle_drag(pointer, Point::new(40, 40)).unwrap().is_none());
}

#[test]
fn test_hook_failure_keeps_session_stopped() {
    let (backends, _probe) = Harness::new(default_responder()).build();
    let mut session = Session::new(Config::default(), backends).unwrap();

    let err = session.start(&mut MockKeyHook::failing()).unwrap_err();

    assert!(matches!(err, Error::Collaborator(_)));
    assert!(!session.is_running());
    assert!(matches!(
        session.record_at(Point::new(25, 25)),
        Err(Error::SessionStopped)
    ));
}

#[test]
fn test_capture_failure_stops_session() {
    let (mut session, probe, _hook) = started();
    probe.fail_captures();

    let err = session
        .record_region(Point::new(20, 20), Point::new(30, 30))
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(!session.is_running());
    assert!(matches!(
        session.dispatch(Command::Home, Point::new(0, 0)),
        Err(Error::SessionStopped)
    ));
}

#[test]
fn test_stopped_session_does_not_relocate_widgets() {
    let (mut session, probe, _hook) = started();
    inserted(record(&mut session, BUTTON));
    session.go_home();
    session.stop();
    let captures = probe.captures();

    let result = session.on_state_changed();

    assert!(matches!(result, Err(Error::SessionStopped)));
    assert_eq!(probe.captures(), captures);
}

#[test]
fn test_invalid_config_is_refused() {
    let (backends, _probe) = Harness::new(default_responder()).build();
    let mut config = Config::default();
    config.recognition.widget_find_retries = 0;

    assert!(matches!(Session::new(config, backends), Err(Error::Config(_))));
}
