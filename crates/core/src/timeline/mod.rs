//! Playback clock for the morph: play, pause, rewind, seek and speed.
//!
//! The visual clock is authoritative. Every mutation reports the transition it
//! caused as a [`TransportEvent`] so followers such as the audio player are
//! only told about changes, never polled every tick.

use serde::{Deserialize, Serialize};

use crate::config::TransportConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Paused,
    PlayingForward,
    Rewinding,
}

/// Partial state update applied atomically to a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransportCommand {
    Seek(f64),
    SetSpeed(f64),
    SetPaused(bool),
    SetRewind(bool),
}

/// What changed as a result of a transport operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportEvent {
    /// Forward playback began at `from` seconds.
    Started { from: f64 },
    Paused { at: f64 },
    RewindStarted { from: f64 },
    /// Rewind was cancelled by the user and the transport is paused.
    RewindStopped { at: f64 },
    /// `elapsed` was set explicitly; `playing` tells whether forward playback
    /// continues from there.
    Seeked { to: f64, playing: bool },
    SpeedChanged { speed: f64, playing: bool },
    ReachedEnd,
    ReachedStart,
}

#[derive(Debug, Clone)]
pub struct Transport {
    state: PlaybackState,
    elapsed: f64,
    duration: f64,
    speed: f64,
    rewind_multiplier: f64,
    speed_presets: Vec<f64>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

impl Transport {
    /// Creates a paused transport at the start of the timeline.
    pub fn new(config: &TransportConfig) -> Self {
        let speed_presets = if config.speed_presets.is_empty() {
            vec![1.0]
        } else {
            config.speed_presets.clone()
        };
        Self {
            state: PlaybackState::Paused,
            elapsed: 0.0,
            duration: config.duration_seconds.max(f64::EPSILON),
            speed: speed_presets[0],
            rewind_multiplier: config.rewind_multiplier,
            speed_presets,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::PlayingForward
    }

    pub fn is_rewinding(&self) -> bool {
        self.state == PlaybackState::Rewinding
    }

    /// Progress through the timeline in `[0, 1]`; this is the morph parameter.
    pub fn normalized_progress(&self) -> f64 {
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    /// Play/pause button. A running rewind is cancelled and forward playback
    /// starts from the current position.
    pub fn toggle_play_pause(&mut self) -> Option<TransportEvent> {
        match self.state {
            PlaybackState::PlayingForward => {
                self.state = PlaybackState::Paused;
                Some(TransportEvent::Paused { at: self.elapsed })
            }
            PlaybackState::Paused | PlaybackState::Rewinding => {
                self.state = PlaybackState::PlayingForward;
                Some(TransportEvent::Started { from: self.elapsed })
            }
        }
    }

    pub fn toggle_rewind(&mut self) -> Option<TransportEvent> {
        match self.state {
            PlaybackState::Rewinding => {
                self.state = PlaybackState::Paused;
                Some(TransportEvent::RewindStopped { at: self.elapsed })
            }
            PlaybackState::Paused | PlaybackState::PlayingForward => {
                self.state = PlaybackState::Rewinding;
                Some(TransportEvent::RewindStarted { from: self.elapsed })
            }
        }
    }

    /// Jumps to `position`, clamped to the timeline, in any state.
    pub fn seek(&mut self, position: f64) -> Option<TransportEvent> {
        if !position.is_finite() {
            tracing::warn!(position, "ignoring non-finite seek");
            return None;
        }
        self.elapsed = position.clamp(0.0, self.duration);
        Some(TransportEvent::Seeked {
            to: self.elapsed,
            playing: self.is_playing(),
        })
    }

    /// Moves the clock while the slider is held. Followers are not notified;
    /// the release is reported through [`Transport::seek`].
    pub fn preview(&mut self, position: f64) {
        if position.is_finite() {
            self.elapsed = position.clamp(0.0, self.duration);
        }
    }

    pub fn set_speed(&mut self, multiplier: f64) -> Option<TransportEvent> {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            tracing::warn!(multiplier, "ignoring invalid playback speed");
            return None;
        }
        if multiplier == self.speed {
            return None;
        }
        self.speed = multiplier;
        Some(TransportEvent::SpeedChanged {
            speed: multiplier,
            playing: self.is_playing(),
        })
    }

    /// Steps to the next speed preset, wrapping around.
    pub fn cycle_speed(&mut self) -> Option<TransportEvent> {
        let next = self
            .speed_presets
            .iter()
            .position(|preset| *preset == self.speed)
            .map(|i| (i + 1) % self.speed_presets.len())
            .unwrap_or(0);
        self.set_speed(self.speed_presets[next])
    }

    pub fn apply(&mut self, command: TransportCommand) -> Option<TransportEvent> {
        match command {
            TransportCommand::Seek(position) => self.seek(position),
            TransportCommand::SetSpeed(multiplier) => self.set_speed(multiplier),
            TransportCommand::SetPaused(true) => match self.state {
                PlaybackState::PlayingForward => self.toggle_play_pause(),
                PlaybackState::Rewinding => self.toggle_rewind(),
                PlaybackState::Paused => None,
            },
            TransportCommand::SetPaused(false) => match self.state {
                PlaybackState::PlayingForward => None,
                _ => self.toggle_play_pause(),
            },
            TransportCommand::SetRewind(true) => match self.state {
                PlaybackState::Rewinding => None,
                _ => self.toggle_rewind(),
            },
            TransportCommand::SetRewind(false) => match self.state {
                PlaybackState::Rewinding => self.toggle_rewind(),
                _ => None,
            },
        }
    }

    /// Advances the clock by `dt` seconds of wall time. Hitting either end of
    /// the timeline clamps `elapsed` and pauses.
    pub fn tick(&mut self, dt: f64) -> Option<TransportEvent> {
        if !(dt.is_finite() && dt > 0.0) {
            return None;
        }
        match self.state {
            PlaybackState::Paused => None,
            PlaybackState::PlayingForward => {
                self.elapsed += dt * self.speed;
                if self.elapsed >= self.duration {
                    self.elapsed = self.duration;
                    self.state = PlaybackState::Paused;
                    Some(TransportEvent::ReachedEnd)
                } else {
                    None
                }
            }
            PlaybackState::Rewinding => {
                self.elapsed -= dt * self.rewind_multiplier;
                if self.elapsed <= 0.0 {
                    self.elapsed = 0.0;
                    self.state = PlaybackState::Paused;
                    Some(TransportEvent::ReachedStart)
                } else {
                    None
                }
            }
        }
    }
}
