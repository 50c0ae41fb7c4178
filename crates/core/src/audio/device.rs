use std::time::Instant;

use crate::{audio::DecodedTrack, Result};

/// Sound output backend driven by [`super::AudioPlayer`].
///
/// Starting and stopping may block on the device, so the player only calls
/// into it on transport transitions.
pub trait OutputDevice {
    /// Starts streaming `track` from `from_sample` at `speed` times its
    /// native rate, replacing any running stream.
    fn start(&mut self, track: &DecodedTrack, from_sample: usize, speed: f64) -> Result<()>;

    /// Stops the stream. Must be safe to call when nothing is running.
    fn stop(&mut self);

    /// Wall-clock seconds since the running stream started, if any.
    fn elapsed_seconds(&self) -> Option<f64>;

    /// Whether the running stream has died since it started (device
    /// unplugged, stream dropped). Cleared by the next `start`.
    fn failed(&self) -> bool {
        false
    }
}

/// Device that produces no sound but keeps time, used when no sound hardware
/// is available.
#[derive(Debug, Default)]
pub struct NullDevice {
    started_at: Option<Instant>,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputDevice for NullDevice {
    fn start(&mut self, _track: &DecodedTrack, _from_sample: usize, _speed: f64) -> Result<()> {
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        self.started_at = None;
    }

    fn elapsed_seconds(&self) -> Option<f64> {
        self.started_at.map(|start| start.elapsed().as_secs_f64())
    }
}
