//! Interactive session: the single owner of all animation state.
//!
//! Inputs and ticks both arrive as `&mut self` calls on one thread, so an
//! input is always applied between ticks, never halfway through one. Audio is
//! only driven from transport transitions.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use crate::{
    audio::{AudioPlayer, AudioTransport},
    config::AppConfig,
    geometry::Geometry,
    render::{DrawSink, FrameStats, Renderer, Viewport},
    rotation::RotationController,
    timeline::{Transport, TransportCommand, TransportEvent},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Hold the view still, or hand it back to the automatic spin.
    Space,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioStatus {
    NoTrack,
    Ready(PathBuf),
    /// The last load failed; playback continues silently.
    NoAudio,
}

/// Text for the control strip, refreshed from the session after each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlLabels {
    pub progress_percent: u32,
    pub progress: String,
    pub time: String,
    pub play: &'static str,
    pub rewind: &'static str,
    pub speed: String,
    pub audio: String,
}

pub struct Session {
    config: AppConfig,
    geometry: Geometry,
    rotation: RotationController,
    transport: Transport,
    renderer: Renderer,
    audio: Box<dyn AudioTransport>,
    audio_status: AudioStatus,
    pointer: Option<(f32, f32)>,
    last_pointer_at: Instant,
    orbit_held: bool,
    closed: bool,
}

impl Session {
    /// Builds the geometry and all controllers. Invalid geometry or
    /// configuration is fatal; a track that fails to load is not.
    pub fn new(config: AppConfig, audio: Box<dyn AudioTransport>) -> Result<Self> {
        config.validate()?;
        let geometry = Geometry::from_config(&config.geometry)?;
        tracing::info!(
            vertices = geometry.vertex_count(),
            edges = geometry.edges.len(),
            subdivisions = config.geometry.subdivisions,
            "geometry ready"
        );

        let mut session = Self {
            rotation: RotationController::new(config.rotation.clone()),
            transport: Transport::new(&config.transport),
            renderer: Renderer::new(config.render.clone(), config.geometry.radius as f32),
            geometry,
            audio,
            audio_status: AudioStatus::NoTrack,
            pointer: None,
            last_pointer_at: Instant::now(),
            orbit_held: false,
            closed: false,
            config,
        };

        if let Some(track) = session.config.audio.track.clone() {
            session.load_audio(&track);
        }
        Ok(session)
    }

    /// Session backed by [`AudioPlayer::silent`].
    pub fn with_silent_audio(config: AppConfig) -> Result<Self> {
        Self::new(config, Box::new(AudioPlayer::silent()))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn rotation(&self) -> &RotationController {
        &self.rotation
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn audio(&self) -> &dyn AudioTransport {
        self.audio.as_ref()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.transport.tick_interval_ms)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // Transport controls.

    pub fn toggle_play_pause(&mut self) {
        if self.closed {
            return;
        }
        let event = self.transport.toggle_play_pause();
        self.follow(event);
    }

    pub fn toggle_rewind(&mut self) {
        if self.closed {
            return;
        }
        let event = self.transport.toggle_rewind();
        self.follow(event);
    }

    pub fn set_speed(&mut self, multiplier: f64) {
        if self.closed {
            return;
        }
        let event = self.transport.set_speed(multiplier);
        self.follow(event);
    }

    pub fn cycle_speed(&mut self) {
        if self.closed {
            return;
        }
        let event = self.transport.cycle_speed();
        self.follow(event);
    }

    pub fn seek(&mut self, position_seconds: f64) {
        if self.closed {
            return;
        }
        let event = self.transport.seek(position_seconds);
        self.follow(event);
    }

    pub fn apply(&mut self, command: TransportCommand) {
        if self.closed {
            return;
        }
        let event = self.transport.apply(command);
        self.follow(event);
    }

    /// Slider held and moved: the morph follows, audio waits for the release.
    pub fn on_slider_drag(&mut self, position_seconds: f64) {
        if self.closed {
            return;
        }
        self.transport.preview(position_seconds);
    }

    pub fn on_slider_release(&mut self, position_seconds: f64) {
        self.seek(position_seconds);
    }

    // Pointer and keyboard.

    pub fn on_pointer_down(&mut self, x: f32, y: f32) {
        if self.closed {
            return;
        }
        self.pointer = Some((x, y));
        self.last_pointer_at = Instant::now();
        self.rotation.begin_drag();
    }

    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_pointer_at).as_secs_f32();
        self.last_pointer_at = now;
        self.drag_pointer(x, y, dt);
    }

    /// Pointer moved to (`x`, `y`) `dt` seconds after the previous pointer
    /// event. Ignored unless a drag is in progress.
    pub fn drag_pointer(&mut self, x: f32, y: f32, dt: f32) {
        if self.closed {
            return;
        }
        let Some((last_x, last_y)) = self.pointer else {
            return;
        };
        self.rotation.drag_by(x - last_x, y - last_y, dt);
        self.pointer = Some((x, y));
    }

    pub fn on_pointer_up(&mut self, _x: f32, _y: f32) {
        if self.closed {
            return;
        }
        if self.pointer.take().is_some() {
            self.orbit_held = false;
            self.rotation.end_drag();
        }
    }

    pub fn on_key(&mut self, key: Key) -> KeyOutcome {
        if self.closed {
            return KeyOutcome::Quit;
        }
        match key {
            Key::Space => {
                self.rotation.toggle_auto();
                self.orbit_held = !self.rotation.is_auto_rotating();
                KeyOutcome::Continue
            }
            Key::Escape => {
                self.close();
                KeyOutcome::Quit
            }
        }
    }

    // Audio.

    /// Replaces the track. Returns whether it loaded; on failure the session
    /// keeps running silently and [`Session::audio_status`] reports it.
    pub fn load_audio(&mut self, path: &Path) -> bool {
        if self.closed {
            return false;
        }
        self.audio.cleanup();
        match self.audio.load(path) {
            Ok(()) => {
                self.audio_status = AudioStatus::Ready(path.to_path_buf());
                if self.transport.is_playing() {
                    self.audio.play(Some(self.transport.elapsed()));
                }
                true
            }
            Err(_) => {
                self.audio_status = AudioStatus::NoAudio;
                false
            }
        }
    }

    // Frame loop.

    /// Advances the camera and the transport by one tick of `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        if self.closed {
            return;
        }
        self.rotation.tick();
        if !self.rotation.is_auto_rotating()
            && !self.orbit_held
            && self.pointer.is_none()
            && self.rotation.should_resume_auto()
        {
            self.rotation.resume_auto();
        }

        let before = self.transport.elapsed();
        let event = self.transport.tick(dt);
        // The spin follows playback time: it holds while paused and unwinds
        // during rewind. Seeks do not move it.
        self.rotation.advance_spin(
            self.transport.normalized_progress() as f32,
            (self.transport.elapsed() - before) as f32,
            self.config.render.auto_spin_speed,
        );
        self.follow(event);
    }

    pub fn render(&mut self, sink: &mut dyn DrawSink, surface: Viewport) -> FrameStats {
        if self.closed {
            return FrameStats::default();
        }
        self.renderer.draw_frame(
            sink,
            &self.geometry,
            &self.rotation,
            self.transport.normalized_progress() as f32,
            surface,
        )
    }

    /// Stops audio and refuses all further input. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pointer = None;
        self.audio.cleanup();
        tracing::info!(elapsed = self.transport.elapsed(), "session closed");
    }

    // Read surface.

    pub fn normalized_progress(&self) -> f64 {
        self.transport.normalized_progress()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.transport.elapsed()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.transport.duration()
    }

    pub fn is_paused(&self) -> bool {
        self.transport.is_paused()
    }

    pub fn is_rewinding(&self) -> bool {
        self.transport.is_rewinding()
    }

    pub fn speed(&self) -> f64 {
        self.transport.speed()
    }

    pub fn audio_status(&self) -> &AudioStatus {
        &self.audio_status
    }

    pub fn labels(&self) -> ControlLabels {
        let progress_percent = (self.normalized_progress() * 100.0) as u32;
        let audio = match &self.audio_status {
            AudioStatus::Ready(path) => format!(
                "Audio: {}",
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            ),
            AudioStatus::NoTrack => "Audio: none".to_string(),
            AudioStatus::NoAudio => "No Audio".to_string(),
        };

        ControlLabels {
            progress_percent,
            progress: format!("Progress: {progress_percent}%"),
            time: format!(
                "{} / {}",
                clock_label(self.elapsed_seconds()),
                clock_label(self.duration_seconds())
            ),
            play: if self.transport.is_playing() {
                "Pause"
            } else {
                "Play"
            },
            rewind: if self.is_rewinding() { "Stop" } else { "Rewind" },
            speed: format!("{}x", self.speed()),
            audio,
        }
    }

    /// Mirrors a transport transition onto the audio player.
    fn follow(&mut self, event: Option<TransportEvent>) {
        let Some(event) = event else {
            return;
        };
        tracing::info!(?event, elapsed = self.transport.elapsed(), "transport transition");

        match event {
            TransportEvent::Started { from } => self.audio.play(Some(from)),
            // Rewind runs silently.
            TransportEvent::Paused { .. }
            | TransportEvent::RewindStarted { .. }
            | TransportEvent::ReachedEnd => self.audio.pause(),
            TransportEvent::RewindStopped { .. } | TransportEvent::ReachedStart => {}
            TransportEvent::Seeked { to, playing } => {
                if playing {
                    self.audio.play(Some(to));
                } else {
                    self.audio.set_position(to);
                }
            }
            TransportEvent::SpeedChanged { speed, .. } => self.audio.set_speed(speed),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport)
            .field("audio_status", &self.audio_status)
            .field("closed", &self.closed)
            .finish()
    }
}

/// `m:ss` with whole seconds truncated.
fn clock_label(seconds: f64) -> String {
    let whole = seconds.max(0.0) as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;

    fn session() -> Session {
        Session::with_silent_audio(AppConfig::default()).unwrap()
    }

    #[test]
    fn starts_paused_at_zero_with_no_track() {
        let session = session();
        assert!(session.is_paused());
        assert_eq!(session.elapsed_seconds(), 0.0);
        assert_eq!(session.audio_status(), &AudioStatus::NoTrack);
        let labels = session.labels();
        assert_eq!(labels.time, "0:00 / 0:30");
        assert_eq!(labels.play, "Play");
        assert_eq!(labels.speed, "1x");
    }

    #[test]
    fn invalid_geometry_is_fatal() {
        let mut config = AppConfig::default();
        config.geometry.subdivisions = 0;
        assert!(Session::with_silent_audio(config).is_err());
    }

    #[test]
    fn labels_follow_the_transport() {
        let mut session = session();
        session.toggle_play_pause();
        session.cycle_speed();
        for _ in 0..5 {
            session.tick(1.0);
        }
        let labels = session.labels();
        assert_eq!(labels.progress_percent, 33);
        assert_eq!(labels.progress, "Progress: 33%");
        assert_eq!(labels.time, "0:10 / 0:30");
        assert_eq!(labels.play, "Pause");
        assert_eq!(labels.speed, "2x");

        session.toggle_rewind();
        assert_eq!(session.labels().rewind, "Stop");
        assert_eq!(session.labels().play, "Play");
    }

    #[test]
    fn unreadable_track_reports_no_audio_and_keeps_playing() {
        let mut session = session();
        assert!(!session.load_audio(Path::new("/missing/track.wav")));
        assert_eq!(session.audio_status(), &AudioStatus::NoAudio);
        assert_eq!(session.labels().audio, "No Audio");

        session.toggle_play_pause();
        session.tick(1.0);
        assert_eq!(session.elapsed_seconds(), 1.0);
    }

    #[test]
    fn space_holds_the_view_until_pressed_again() {
        let mut session = session();
        assert_eq!(session.on_key(Key::Space), KeyOutcome::Continue);
        for _ in 0..200 {
            session.tick(0.016);
        }
        assert!(!session.rotation().is_auto_rotating());

        session.on_key(Key::Space);
        assert!(session.rotation().is_auto_rotating());
    }

    #[test]
    fn slider_drag_previews_and_release_seeks() {
        let mut session = session();
        session.on_slider_drag(12.0);
        assert_eq!(session.elapsed_seconds(), 12.0);
        session.on_slider_release(45.0);
        assert_eq!(session.elapsed_seconds(), 30.0);
    }

    #[test]
    fn escape_closes_and_later_input_is_ignored() {
        let mut session = session();
        assert_eq!(session.on_key(Key::Escape), KeyOutcome::Quit);
        assert!(session.is_closed());

        session.toggle_play_pause();
        session.on_pointer_down(1.0, 1.0);
        session.on_pointer_up(5.0, 5.0);
        session.tick(1.0);
        assert!(session.is_paused());
        assert_eq!(session.elapsed_seconds(), 0.0);
        session.close();
    }

    #[test]
    fn pointer_drag_orbits_and_releases_to_auto() {
        let mut session = session();
        session.on_pointer_down(10.0, 10.0);
        assert!(!session.rotation().is_auto_rotating());
        session.drag_pointer(30.0, 10.0, 0.02);
        for _ in 0..50 {
            session.tick(0.016);
        }
        let (_, y) = session.rotation().orientation();
        assert!(y > 9.0);

        session.on_pointer_up(30.0, 10.0);
        assert!(session.rotation().is_auto_rotating());
    }

    #[test]
    fn spin_follows_playback_and_ignores_seeks() {
        let mut session = session();
        session.tick(1.0);
        assert!(session.rotation().auto_spin().abs_diff_eq(Quat::IDENTITY, 1e-6));

        session.seek(12.0);
        session.tick(1.0);
        assert!(session.rotation().auto_spin().abs_diff_eq(Quat::IDENTITY, 1e-6));

        session.toggle_play_pause();
        session.tick(1.0);
        assert!(session.rotation().auto_spin().angle_between(Quat::IDENTITY) > 0.1);
    }

    #[test]
    fn clock_label_truncates_to_whole_seconds() {
        assert_eq!(clock_label(0.0), "0:00");
        assert_eq!(clock_label(59.9), "0:59");
        assert_eq!(clock_label(61.0), "1:01");
    }
}
