//! Shared fakes for the integration tests
//!
//! Templates are tagged by the red channel of their top-left pixel, so a
//! matcher script can answer per template without real pixel matching.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::Rgba;
use parking_lot::Mutex;
use widget_scout::action::{InputInjector, KeyCode, MouseButton};
use widget_scout::recognition::{
    Image, ImageMatcher, Match, MemoryTemplateStore, Point, RecognitionMode, Rect, TemplateId,
};
use widget_scout::session::{KeyHook, ModifierProducer};
use widget_scout::time::Sleeper;
use widget_scout::{Backends, Error, Result};

pub type Responder = Box<dyn FnMut(RecognitionMode, u8) -> Option<Match>>;

/// 1x1 template carrying `tag`
pub fn tagged(tag: u8) -> Image {
    Image::from_pixel(1, 1, Rgba([tag, 0, 0, 255]))
}

pub fn tag_of(image: &Image) -> u8 {
    image.get_pixel(0, 0)[0]
}

/// Blank screen with tagged rectangles painted on it
pub fn screen_with(width: u32, height: u32, regions: &[(Rect, u8)]) -> Image {
    let mut image = Image::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    for (rect, tag) in regions {
        for y in rect.y..rect.y + rect.height as i32 {
            for x in rect.x..rect.x + rect.width as i32 {
                image.put_pixel(x as u32, y as u32, Rgba([*tag, 0, 0, 255]));
            }
        }
    }
    image
}

pub fn template_id(name: &str) -> TemplateId {
    TemplateId::new(name).unwrap()
}

/// Responder that finds each listed tag at a fixed spot in every mode
pub fn fixed_responder(hits: Vec<(u8, Match)>) -> Responder {
    Box::new(move |_mode, tag| hits.iter().find(|(t, _)| *t == tag).map(|(_, m)| *m))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Move(Point),
    Press(MouseButton),
    Release(MouseButton),
    KeyDown(KeyCode),
    KeyUp(KeyCode),
}

pub struct MockMatcher {
    mode: Arc<Mutex<RecognitionMode>>,
    responder: Responder,
    calls: Arc<Mutex<Vec<(RecognitionMode, u8)>>>,
}

impl ImageMatcher for MockMatcher {
    fn mode(&self) -> RecognitionMode {
        *self.mode.lock()
    }

    fn set_mode(&mut self, mode: RecognitionMode) {
        *self.mode.lock() = mode;
    }

    fn find_image(&mut self, _screenshot: &Image, template: &Image) -> Option<Match> {
        let mode = *self.mode.lock();
        let tag = tag_of(template);
        self.calls.lock().push((mode, tag));
        (self.responder)(mode, tag)
    }
}

pub struct MockInjector {
    cursor: Point,
    screen: Arc<Mutex<Image>>,
    events: Arc<Mutex<Vec<InputEvent>>>,
    captures: Arc<Mutex<usize>>,
    capture_fails: Arc<AtomicBool>,
}

impl InputInjector for MockInjector {
    fn move_mouse_to(&mut self, point: Point) -> Result<()> {
        self.cursor = point;
        self.events.lock().push(InputEvent::Move(point));
        Ok(())
    }

    fn cursor_position(&mut self) -> Result<Point> {
        Ok(self.cursor)
    }

    fn press_button(&mut self, button: MouseButton) -> Result<()> {
        self.events.lock().push(InputEvent::Press(button));
        Ok(())
    }

    fn release_button(&mut self, button: MouseButton) -> Result<()> {
        self.events.lock().push(InputEvent::Release(button));
        Ok(())
    }

    fn press_key(&mut self, key: KeyCode) -> Result<()> {
        self.events.lock().push(InputEvent::KeyDown(key));
        Ok(())
    }

    fn release_key(&mut self, key: KeyCode) -> Result<()> {
        self.events.lock().push(InputEvent::KeyUp(key));
        Ok(())
    }

    fn key_code_for(&self, ch: char) -> Option<KeyCode> {
        ch.is_ascii_alphanumeric().then(|| KeyCode(ch as u32))
    }

    fn capture_screen(&mut self, _area: Rect) -> Result<Image> {
        if self.capture_fails.load(Ordering::SeqCst) {
            return Err(Error::Collaborator("screen capture unavailable".to_string()));
        }
        *self.captures.lock() += 1;
        Ok(self.screen.lock().clone())
    }
}

pub struct RecordingSleeper {
    log: Arc<Mutex<Vec<Duration>>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.log.lock().push(duration);
    }
}

/// Keyboard hook that hands its producer to the test
#[derive(Default)]
pub struct MockKeyHook {
    pub producer: Arc<Mutex<Option<ModifierProducer>>>,
    pub fail: bool,
}

impl MockKeyHook {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn send(&self, event: widget_scout::session::ModifierEvent) {
        let mut producer = self.producer.lock();
        assert!(producer.as_mut().expect("hook not started").push(event));
    }
}

impl KeyHook for MockKeyHook {
    fn start(&mut self, producer: ModifierProducer) -> Result<()> {
        if self.fail {
            return Err(Error::Collaborator("hook registration refused".to_string()));
        }
        *self.producer.lock() = Some(producer);
        Ok(())
    }
}

/// Handles for inspecting the fakes after they move into [`Backends`]
#[derive(Clone)]
pub struct Probe {
    pub mode: Arc<Mutex<RecognitionMode>>,
    pub calls: Arc<Mutex<Vec<(RecognitionMode, u8)>>>,
    pub events: Arc<Mutex<Vec<InputEvent>>>,
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
    pub captures: Arc<Mutex<usize>>,
    pub capture_fails: Arc<AtomicBool>,
    pub screen: Arc<Mutex<Image>>,
}

impl Probe {
    pub fn calls(&self) -> Vec<(RecognitionMode, u8)> {
        self.calls.lock().clone()
    }

    pub fn calls_in(&self, mode: RecognitionMode) -> usize {
        self.calls.lock().iter().filter(|(m, _)| *m == mode).count()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().clone()
    }

    pub fn presses(&self) -> Vec<MouseButton> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                InputEvent::Press(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    pub fn captures(&self) -> usize {
        *self.captures.lock()
    }

    pub fn fail_captures(&self) {
        self.capture_fails.store(true, Ordering::SeqCst);
    }

    pub fn set_screen(&self, image: Image) {
        *self.screen.lock() = image;
    }
}

/// Builder for a [`Backends`] bundle made of fakes
pub struct Harness {
    responder: Responder,
    screen_image: Image,
    origin: Point,
    cursor: Point,
    initial_mode: RecognitionMode,
    store: MemoryTemplateStore,
}

impl Harness {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder,
            screen_image: screen_with(200, 200, &[]),
            origin: Point::new(0, 0),
            cursor: Point::new(500, 500),
            initial_mode: RecognitionMode::Exact,
            store: MemoryTemplateStore::new(),
        }
    }

    pub fn with_screen(mut self, image: Image) -> Self {
        self.screen_image = image;
        self
    }

    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_mode(mut self, mode: RecognitionMode) -> Self {
        self.initial_mode = mode;
        self
    }

    pub fn with_template(mut self, name: &str, tag: u8) -> Self {
        self.store.insert(template_id(name), tagged(tag));
        self
    }

    pub fn build(self) -> (Backends, Probe) {
        let probe = Probe {
            mode: Arc::new(Mutex::new(self.initial_mode)),
            calls: Arc::default(),
            events: Arc::default(),
            sleeps: Arc::default(),
            captures: Arc::default(),
            capture_fails: Arc::default(),
            screen: Arc::new(Mutex::new(self.screen_image.clone())),
        };

        let screen = Rect::new(
            self.origin.x,
            self.origin.y,
            self.screen_image.width(),
            self.screen_image.height(),
        );
        let backends = Backends::new(
            Box::new(MockMatcher {
                mode: probe.mode.clone(),
                responder: self.responder,
                calls: probe.calls.clone(),
            }),
            Box::new(MockInjector {
                cursor: self.cursor,
                screen: probe.screen.clone(),
                events: probe.events.clone(),
                captures: probe.captures.clone(),
                capture_fails: probe.capture_fails.clone(),
            }),
            Box::new(self.store),
            Box::new(RecordingSleeper {
                log: probe.sleeps.clone(),
            }),
            screen,
        );

        (backends, probe)
    }
}
