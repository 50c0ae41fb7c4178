//! Sound card output through `cpal`.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Instant,
};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SizedSample,
};
use morph_core::{DecodedTrack, MorphError, OutputDevice, Result};

/// Read head into the decoded track, advanced by the audio callback.
struct PlaybackCursor {
    samples: Arc<[f32]>,
    position: f64,
    step: f64,
}

impl PlaybackCursor {
    fn next_sample(&mut self) -> f32 {
        let value = self
            .samples
            .get(self.position as usize)
            .copied()
            .unwrap_or(0.0);
        self.position += self.step;
        value
    }
}

pub struct CpalDevice {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    cursor: Arc<Mutex<Option<PlaybackCursor>>>,
    /// Set by the stream's error callback.
    stream_failed: Arc<AtomicBool>,
    stream: Option<cpal::Stream>,
    started_at: Option<Instant>,
}

impl CpalDevice {
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| MorphError::Device("no default output device".into()))?;
        let supported = device
            .default_output_config()
            .map_err(|err| MorphError::Device(err.to_string()))?;
        tracing::info!(
            sample_rate = supported.sample_rate().0,
            channels = supported.channels(),
            format = ?supported.sample_format(),
            "audio output opened"
        );

        Ok(Self {
            device,
            sample_format: supported.sample_format(),
            config: supported.into(),
            cursor: Arc::new(Mutex::new(None)),
            stream_failed: Arc::new(AtomicBool::new(false)),
            stream: None,
            started_at: None,
        })
    }

    fn lock_cursor(&self) -> Result<MutexGuard<'_, Option<PlaybackCursor>>> {
        self.cursor
            .lock()
            .map_err(|_| MorphError::Device("playback cursor has been poisoned".into()))
    }

    fn build_stream<T>(&self) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = self.config.channels as usize;
        let cursor = Arc::clone(&self.cursor);
        let failed = Arc::clone(&self.stream_failed);
        let err_fn = move |err: cpal::StreamError| {
            tracing::warn!(error = %err, "audio stream error");
            failed.store(true, Ordering::SeqCst);
        };

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _| {
                    let Ok(mut guard) = cursor.lock() else {
                        data.fill(T::EQUILIBRIUM);
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        let value = guard.as_mut().map_or(0.0, PlaybackCursor::next_sample);
                        frame.fill(T::from_sample(value));
                    }
                },
                err_fn,
                None,
            )
            .map_err(|err| MorphError::Device(err.to_string()))
    }
}

impl OutputDevice for CpalDevice {
    fn start(&mut self, track: &DecodedTrack, from_sample: usize, speed: f64) -> Result<()> {
        self.stop();
        self.stream_failed.store(false, Ordering::SeqCst);

        let step = track.sample_rate() as f64 * speed / self.config.sample_rate.0 as f64;
        *self.lock_cursor()? = Some(PlaybackCursor {
            samples: Arc::clone(track.samples()),
            position: from_sample as f64,
            step,
        });

        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => self.build_stream::<f32>()?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>()?,
            cpal::SampleFormat::U16 => self.build_stream::<u16>()?,
            other => {
                return Err(MorphError::Device(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        };
        stream
            .play()
            .map_err(|err| MorphError::Device(err.to_string()))?;

        self.stream = Some(stream);
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the stream halts the callback.
        self.stream = None;
        self.started_at = None;
        if let Ok(mut cursor) = self.lock_cursor() {
            *cursor = None;
        }
    }

    fn elapsed_seconds(&self) -> Option<f64> {
        self.started_at.map(|start| start.elapsed().as_secs_f64())
    }

    fn failed(&self) -> bool {
        self.stream.is_some() && self.stream_failed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CpalDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalDevice")
            .field("config", &self.config)
            .field("sample_format", &self.sample_format)
            .field("running", &self.stream.is_some())
            .finish()
    }
}
