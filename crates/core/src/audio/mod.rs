//! Audio follower for the transport.
//!
//! The transport is the authority on where playback should be and how fast.
//! The player only mirrors it: it is told about transitions and restarts the
//! device stream when position or speed change under a running stream.

mod decode;
mod device;

use std::path::Path;

pub use decode::{DecodedTrack, TrackDecoder, WavDecoder};
pub use device::{NullDevice, OutputDevice};

use crate::Result;

/// Operations the session needs from an audio backend.
pub trait AudioTransport {
    /// Replaces the current track. On failure the previous track is stopped
    /// and the player stays silent until the next successful load.
    fn load(&mut self, path: &Path) -> Result<()>;
    /// Starts playing, optionally from an explicit position in seconds.
    fn play(&mut self, from: Option<f64>);
    /// Stops output and remembers how far playback got, so resuming is gapless.
    fn pause(&mut self);
    fn resume(&mut self);
    /// Moves to `seconds`, clamped to the track. A running stream restarts there.
    fn set_position(&mut self, seconds: f64);
    /// Changes the rate. A running stream restarts at its current position.
    fn set_speed(&mut self, multiplier: f64);
    /// Stops any device stream. Idempotent.
    fn cleanup(&mut self);

    fn position(&self) -> f64;
    fn is_playing(&self) -> bool;
    fn is_paused(&self) -> bool;
    fn has_track(&self) -> bool;
    fn speed(&self) -> f64;
}

/// [`AudioTransport`] over a pluggable decoder and output device.
pub struct AudioPlayer {
    decoder: Box<dyn TrackDecoder>,
    device: Box<dyn OutputDevice>,
    track: Option<DecodedTrack>,
    position: f64,
    playing: bool,
    paused: bool,
    speed: f64,
}

impl AudioPlayer {
    pub fn new(decoder: Box<dyn TrackDecoder>, device: Box<dyn OutputDevice>) -> Self {
        Self {
            decoder,
            device,
            track: None,
            position: 0.0,
            playing: false,
            paused: false,
            speed: 1.0,
        }
    }

    /// WAV decoding with a silent, clock-only device.
    pub fn silent() -> Self {
        Self::new(Box::new(WavDecoder), Box::new(NullDevice::new()))
    }

    pub fn track(&self) -> Option<&DecodedTrack> {
        self.track.as_ref()
    }

    fn is_running(&self) -> bool {
        self.playing && !self.paused
    }

    fn clamp_to_track(&self, seconds: f64) -> f64 {
        let end = self
            .track
            .as_ref()
            .map(DecodedTrack::duration_seconds)
            .unwrap_or(0.0);
        seconds.clamp(0.0, end)
    }

    /// A stream that died under us reads as paused at the last known
    /// position; the time since it started was never heard.
    fn settle_device_failure(&mut self) {
        if self.is_running() && self.device.failed() {
            tracing::warn!(position = self.position, "audio stream failed, pausing");
            self.device.stop();
            self.paused = true;
        }
    }

    /// Folds the time the device has been running into `position`.
    fn capture_position(&mut self) {
        if let Some(elapsed) = self.device.elapsed_seconds() {
            self.position = self.clamp_to_track(self.position + elapsed * self.speed);
        }
    }
}

impl AudioTransport for AudioPlayer {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.cleanup();
        self.track = None;
        self.position = 0.0;

        match self.decoder.decode(path) {
            Ok(track) => {
                tracing::info!(
                    ?path,
                    seconds = track.duration_seconds(),
                    sample_rate = track.sample_rate(),
                    "audio track loaded"
                );
                self.track = Some(track);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(?path, error = %err, "audio track failed to load");
                Err(err)
            }
        }
    }

    fn play(&mut self, from: Option<f64>) {
        let Some(track) = self.track.clone() else {
            tracing::debug!("play requested without a track");
            return;
        };
        if let Some(from) = from {
            self.position = self.clamp_to_track(from);
        }

        self.device.stop();
        let start = track.sample_index(self.position);
        if start >= track.samples().len() {
            self.playing = false;
            self.paused = false;
            return;
        }

        match self.device.start(&track, start, self.speed) {
            Ok(()) => {
                self.playing = true;
                self.paused = false;
            }
            Err(err) => {
                // Treated as a pause: the visuals keep going and a later
                // resume retries the device.
                tracing::warn!(error = %err, position = self.position, "audio device failed to start");
                self.playing = true;
                self.paused = true;
            }
        }
    }

    fn pause(&mut self) {
        self.settle_device_failure();
        if !self.is_running() {
            return;
        }
        self.capture_position();
        self.device.stop();
        self.paused = true;
    }

    fn resume(&mut self) {
        if self.paused {
            self.play(None);
        }
    }

    fn set_position(&mut self, seconds: f64) {
        if self.track.is_none() || !seconds.is_finite() {
            return;
        }
        self.settle_device_failure();
        self.position = self.clamp_to_track(seconds);
        if self.is_running() {
            self.play(None);
        }
    }

    fn set_speed(&mut self, multiplier: f64) {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return;
        }
        self.settle_device_failure();
        if self.is_running() {
            self.capture_position();
            self.speed = multiplier;
            self.play(None);
        } else {
            self.speed = multiplier;
        }
    }

    fn cleanup(&mut self) {
        self.device.stop();
        self.playing = false;
        self.paused = false;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn is_paused(&self) -> bool {
        self.paused || (self.playing && self.device.failed())
    }

    fn has_track(&self) -> bool {
        self.track.is_some()
    }

    fn speed(&self) -> f64 {
        self.speed
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.device.stop();
    }
}

impl std::fmt::Debug for AudioPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioPlayer")
            .field("has_track", &self.track.is_some())
            .field("position", &self.position)
            .field("playing", &self.playing)
            .field("paused", &self.paused)
            .field("speed", &self.speed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::MorphError;

    #[derive(Debug, Clone, PartialEq)]
    enum DeviceCall {
        Start { from_sample: usize, speed: f64 },
        Stop,
    }

    #[derive(Default)]
    struct DeviceLog {
        calls: Vec<DeviceCall>,
        running_for: Option<f64>,
        fail_next_start: bool,
        stream_died: bool,
    }

    struct ScriptedDevice(Arc<Mutex<DeviceLog>>);

    impl OutputDevice for ScriptedDevice {
        fn start(&mut self, _track: &DecodedTrack, from_sample: usize, speed: f64) -> Result<()> {
            let mut log = self.0.lock().unwrap();
            log.calls.push(DeviceCall::Start { from_sample, speed });
            if std::mem::take(&mut log.fail_next_start) {
                return Err(MorphError::Device("busy".into()));
            }
            log.running_for = Some(0.0);
            log.stream_died = false;
            Ok(())
        }

        fn stop(&mut self) {
            let mut log = self.0.lock().unwrap();
            log.calls.push(DeviceCall::Stop);
            log.running_for = None;
        }

        fn elapsed_seconds(&self) -> Option<f64> {
            self.0.lock().unwrap().running_for
        }

        fn failed(&self) -> bool {
            self.0.lock().unwrap().stream_died
        }
    }

    /// Ten seconds at ten samples per second for any `.wav` path.
    struct ToneDecoder;

    impl TrackDecoder for ToneDecoder {
        fn decode(&self, path: &Path) -> Result<DecodedTrack> {
            if path.extension().is_some_and(|ext| ext == "wav") {
                Ok(DecodedTrack::new(vec![0.25; 100], 10))
            } else {
                Err(MorphError::UnsupportedFormat("mp3".into()))
            }
        }
    }

    fn player() -> (AudioPlayer, Arc<Mutex<DeviceLog>>) {
        let log = Arc::new(Mutex::new(DeviceLog::default()));
        let mut player = AudioPlayer::new(
            Box::new(ToneDecoder),
            Box::new(ScriptedDevice(Arc::clone(&log))),
        );
        player.load(Path::new("tone.wav")).unwrap();
        log.lock().unwrap().calls.clear();
        (player, log)
    }

    fn starts(log: &Arc<Mutex<DeviceLog>>) -> Vec<DeviceCall> {
        log.lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| matches!(call, DeviceCall::Start { .. }))
            .cloned()
            .collect()
    }

    #[test]
    fn set_position_while_playing_restarts_at_the_new_offset() {
        let (mut player, log) = player();
        player.play(Some(2.0));
        player.set_position(7.0);

        assert_eq!(
            starts(&log),
            vec![
                DeviceCall::Start {
                    from_sample: 20,
                    speed: 1.0
                },
                DeviceCall::Start {
                    from_sample: 70,
                    speed: 1.0
                },
            ]
        );
        assert_eq!(player.position(), 7.0);
    }

    #[test]
    fn set_position_while_paused_waits_for_resume() {
        let (mut player, log) = player();
        player.play(Some(1.0));
        player.pause();
        player.set_position(4.0);
        assert_eq!(starts(&log).len(), 1);

        player.resume();
        assert_eq!(
            starts(&log).last(),
            Some(&DeviceCall::Start {
                from_sample: 40,
                speed: 1.0
            })
        );
    }

    #[test]
    fn pause_captures_elapsed_playback() {
        let (mut player, log) = player();
        player.set_speed(2.0);
        player.play(Some(1.0));
        log.lock().unwrap().running_for = Some(1.5);

        player.pause();
        assert!(player.is_paused());
        assert_eq!(player.position(), 4.0);
    }

    #[test]
    fn speed_change_restarts_from_the_captured_position() {
        let (mut player, log) = player();
        player.play(Some(0.0));
        log.lock().unwrap().running_for = Some(3.0);

        player.set_speed(2.0);
        assert_eq!(
            starts(&log).last(),
            Some(&DeviceCall::Start {
                from_sample: 30,
                speed: 2.0
            })
        );
    }

    #[test]
    fn positions_clamp_to_the_track() {
        let (mut player, _log) = player();
        player.set_position(99.0);
        assert_eq!(player.position(), 10.0);
        player.set_position(-3.0);
        assert_eq!(player.position(), 0.0);
    }

    #[test]
    fn failed_load_leaves_a_stopped_player() {
        let (mut player, log) = player();
        player.play(Some(0.0));

        assert!(player.load(Path::new("song.mp3")).is_err());
        assert!(!player.has_track());
        assert!(!player.is_playing());
        assert_eq!(log.lock().unwrap().calls.last(), Some(&DeviceCall::Stop));

        player.play(Some(1.0));
        assert_eq!(starts(&log).len(), 1);
    }

    #[test]
    fn device_failure_reads_as_paused() {
        let (mut player, log) = player();
        log.lock().unwrap().fail_next_start = true;
        player.play(Some(2.0));
        assert!(player.is_paused());

        player.resume();
        assert!(!player.is_paused());
        assert_eq!(starts(&log).len(), 2);
    }

    #[test]
    fn dead_stream_reads_as_paused_without_counting_lost_time() {
        let (mut player, log) = player();
        player.play(Some(2.0));
        {
            let mut log = log.lock().unwrap();
            log.running_for = Some(3.0);
            log.stream_died = true;
        }
        assert!(player.is_paused());

        player.pause();
        assert_eq!(player.position(), 2.0);
        assert_eq!(log.lock().unwrap().calls.last(), Some(&DeviceCall::Stop));

        player.set_speed(2.0);
        assert_eq!(starts(&log).len(), 1);

        player.resume();
        assert!(!player.is_paused());
        assert_eq!(
            starts(&log).last(),
            Some(&DeviceCall::Start {
                from_sample: 20,
                speed: 2.0
            })
        );
    }

    #[test]
    fn seeking_after_a_dead_stream_waits_for_resume() {
        let (mut player, log) = player();
        player.play(Some(1.0));
        log.lock().unwrap().stream_died = true;

        player.set_position(6.0);
        assert!(player.is_paused());
        assert_eq!(player.position(), 6.0);
        assert_eq!(starts(&log).len(), 1);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let (mut player, _log) = player();
        player.play(None);
        player.cleanup();
        player.cleanup();
        assert!(!player.is_playing());
        assert!(!player.is_paused());
        assert!(player.has_track());
    }

    #[test]
    fn playing_past_the_end_stays_silent() {
        let (mut player, log) = player();
        player.play(Some(10.0));
        assert!(!player.is_playing());
        assert!(starts(&log).is_empty());
    }
}
