// Drives a session through its public control surface with a recording
// audio backend and a recording draw sink.

use std::{
    cell::RefCell,
    path::Path,
    rc::Rc,
};

use glam::{Mat4, Vec3};
use morph_core::{
    AppConfig, AudioStatus, AudioTransport, DrawSink, MorphError, Result, Rgba, Session,
    TransportCommand, Viewport,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load,
    Play(Option<f64>),
    Pause,
    Resume,
    SetPosition(f64),
    SetSpeed(f64),
    Cleanup,
}

#[derive(Default)]
struct Log {
    calls: Vec<Call>,
    playing: bool,
    paused: bool,
    position: f64,
    speed: f64,
    loaded: bool,
}

struct RecordingAudio(Rc<RefCell<Log>>);

impl AudioTransport for RecordingAudio {
    fn load(&mut self, path: &Path) -> Result<()> {
        let mut log = self.0.borrow_mut();
        log.calls.push(Call::Load);
        log.loaded = path.extension().is_some_and(|ext| ext == "wav");
        if log.loaded {
            Ok(())
        } else {
            Err(MorphError::UnsupportedFormat("mp3".into()))
        }
    }

    fn play(&mut self, from: Option<f64>) {
        let mut log = self.0.borrow_mut();
        log.calls.push(Call::Play(from));
        if let Some(from) = from {
            log.position = from;
        }
        log.playing = true;
        log.paused = false;
    }

    fn pause(&mut self) {
        let mut log = self.0.borrow_mut();
        log.calls.push(Call::Pause);
        log.paused = true;
    }

    fn resume(&mut self) {
        self.0.borrow_mut().calls.push(Call::Resume);
    }

    fn set_position(&mut self, seconds: f64) {
        let mut log = self.0.borrow_mut();
        log.calls.push(Call::SetPosition(seconds));
        log.position = seconds;
    }

    fn set_speed(&mut self, multiplier: f64) {
        let mut log = self.0.borrow_mut();
        log.calls.push(Call::SetSpeed(multiplier));
        log.speed = multiplier;
    }

    fn cleanup(&mut self) {
        let mut log = self.0.borrow_mut();
        log.calls.push(Call::Cleanup);
        log.playing = false;
        log.paused = false;
    }

    fn position(&self) -> f64 {
        self.0.borrow().position
    }

    fn is_playing(&self) -> bool {
        self.0.borrow().playing
    }

    fn is_paused(&self) -> bool {
        self.0.borrow().paused
    }

    fn has_track(&self) -> bool {
        self.0.borrow().loaded
    }

    fn speed(&self) -> f64 {
        self.0.borrow().speed
    }
}

fn session() -> (Session, Rc<RefCell<Log>>) {
    let log = Rc::new(RefCell::new(Log::default()));
    let session = Session::new(
        AppConfig::default(),
        Box::new(RecordingAudio(Rc::clone(&log))),
    )
    .unwrap();
    (session, log)
}

fn take_calls(log: &Rc<RefCell<Log>>) -> Vec<Call> {
    std::mem::take(&mut log.borrow_mut().calls)
}

#[test]
fn ticks_alone_never_touch_audio() {
    let (mut session, log) = session();
    session.toggle_play_pause();
    assert_eq!(take_calls(&log), vec![Call::Play(Some(0.0))]);

    for _ in 0..20 {
        session.tick(0.5);
    }
    assert!(take_calls(&log).is_empty());
    assert_eq!(session.elapsed_seconds(), 10.0);
}

#[test]
fn reaching_the_end_pauses_audio_once() {
    let (mut session, log) = session();
    session.toggle_play_pause();
    take_calls(&log);

    for _ in 0..40 {
        session.tick(1.0);
    }
    assert_eq!(session.elapsed_seconds(), 30.0);
    assert!(session.is_paused());
    assert_eq!(take_calls(&log), vec![Call::Pause]);
}

#[test]
fn seeking_while_playing_restarts_audio_at_the_new_position() {
    let (mut session, log) = session();
    session.toggle_play_pause();
    take_calls(&log);

    session.seek(12.0);
    assert_eq!(take_calls(&log), vec![Call::Play(Some(12.0))]);

    session.toggle_play_pause();
    take_calls(&log);
    session.on_slider_drag(3.0);
    assert!(take_calls(&log).is_empty());
    session.on_slider_release(4.0);
    assert_eq!(take_calls(&log), vec![Call::SetPosition(4.0)]);

    session.toggle_play_pause();
    assert_eq!(take_calls(&log), vec![Call::Play(Some(4.0))]);
}

#[test]
fn rewind_is_silent_and_stops_at_zero() {
    let (mut session, log) = session();
    session.seek(10.0);
    session.toggle_play_pause();
    take_calls(&log);

    session.toggle_rewind();
    assert_eq!(take_calls(&log), vec![Call::Pause]);
    assert!(session.is_rewinding());

    for _ in 0..5 {
        session.tick(1.0);
    }
    assert_eq!(session.elapsed_seconds(), 0.0);
    assert!(session.is_paused());
    assert!(!session.is_rewinding());
    assert!(take_calls(&log).is_empty());
}

#[test]
fn speed_changes_reach_audio() {
    let (mut session, log) = session();
    session.apply(TransportCommand::SetSpeed(2.0));
    assert_eq!(take_calls(&log), vec![Call::SetSpeed(2.0)]);

    session.apply(TransportCommand::SetSpeed(-1.0));
    assert!(take_calls(&log).is_empty());
    assert_eq!(session.speed(), 2.0);
}

#[test]
fn loading_while_playing_joins_at_the_current_position() {
    let (mut session, log) = session();
    session.toggle_play_pause();
    session.tick(2.0);
    take_calls(&log);

    assert!(session.load_audio(Path::new("theme.wav")));
    assert_eq!(
        take_calls(&log),
        vec![Call::Cleanup, Call::Load, Call::Play(Some(2.0))]
    );
    assert_eq!(session.labels().audio, "Audio: theme.wav");

    assert!(!session.load_audio(Path::new("theme.mp3")));
    assert_eq!(session.audio_status(), &AudioStatus::NoAudio);
}

#[test]
fn closing_stops_audio_and_ignores_late_input() {
    let (mut session, log) = session();
    session.toggle_play_pause();
    session.close();
    take_calls(&log);

    session.on_pointer_up(4.0, 4.0);
    session.seek(10.0);
    session.tick(1.0);
    session.close();
    drop(session);
    assert!(take_calls(&log).is_empty());
}

#[derive(Default)]
struct CountingSink {
    passes: usize,
    lines: usize,
    max_extent: f32,
}

impl DrawSink for CountingSink {
    fn begin_pass(&mut self, _viewport: Viewport, _transform: Mat4) {
        self.passes += 1;
    }

    fn line(&mut self, from: Vec3, to: Vec3, _color: Rgba) {
        self.lines += 1;
        self.max_extent = self.max_extent.max(from.length()).max(to.length());
    }
}

#[test]
fn frames_render_the_morph_at_the_transport_progress() {
    let (mut session, _log) = session();
    let surface = Viewport::new(0.0, 0.0, 640.0, 480.0);

    let mut start = CountingSink::default();
    let stats = session.render(&mut start, surface);
    assert_eq!(start.passes, 2);
    assert_eq!(stats.lines, start.lines);
    // Cube corners sit at sqrt(3) from the centre.
    assert!((start.max_extent - 3_f32.sqrt()).abs() < 1e-4);

    session.seek(30.0);
    let mut end = CountingSink::default();
    session.render(&mut end, surface);
    assert!(end.lines > start.lines, "sphere overlay is drawn at the end");
    assert!((end.max_extent - 1.0).abs() < 1e-4);
}
