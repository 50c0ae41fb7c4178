use std::{path::Path, sync::Arc};

use crate::{MorphError, Result};

/// Mono sample buffer decoded from a track on disk.
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl DecodedTrack {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn samples(&self) -> &Arc<[f32]> {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Index of the sample that plays at `seconds` into the track.
    pub fn sample_index(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate as f64) as usize
    }
}

/// Turns a file path into a [`DecodedTrack`].
pub trait TrackDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedTrack>;
}

/// Decodes integer or float PCM WAV files and downmixes them to mono.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl TrackDecoder for WavDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedTrack> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if extension != "wav" {
            return Err(MorphError::UnsupportedFormat(if extension.is_empty() {
                path.display().to_string()
            } else {
                extension
            }));
        }

        let mut reader =
            hound::WavReader::open(path).map_err(|err| MorphError::audio_load(path, err))?;
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|err| MorphError::audio_load(path, err))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1_u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|err| MorphError::audio_load(path, err))?
            }
        };

        if interleaved.is_empty() {
            return Err(MorphError::audio_load(path, "track contains no samples"));
        }

        let channels = usize::from(spec.channels.max(1));
        let mono = downmix(&interleaved, channels);
        tracing::debug!(
            ?path,
            channels,
            sample_rate = spec.sample_rate,
            frames = mono.len(),
            "decoded wav track"
        );
        Ok(DecodedTrack::new(mono, spec.sample_rate))
    }
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
