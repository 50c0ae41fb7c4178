use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{MorphError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub geometry: GeometryConfig,
    pub rotation: RotationConfig,
    pub transport: TransportConfig,
    pub render: RenderConfig,
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections and fields fall back
    /// to their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let geometry = &self.geometry;
        if geometry.subdivisions < 1 {
            return Err(MorphError::InvalidSubdivisions(geometry.subdivisions));
        }
        positive("geometry.size", geometry.size)?;
        positive("geometry.radius", geometry.radius)?;

        let rotation = &self.rotation;
        for (name, value) in [
            ("rotation.orientation_smoothing", rotation.orientation_smoothing),
            ("rotation.velocity_smoothing", rotation.velocity_smoothing),
            ("rotation.transition_smoothing", rotation.transition_smoothing),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(MorphError::InvalidConfig(format!(
                    "{name} must be in [0, 1), got {value}"
                )));
            }
        }

        let transport = &self.transport;
        positive("transport.duration_seconds", transport.duration_seconds)?;
        positive("transport.rewind_multiplier", transport.rewind_multiplier)?;
        if transport.tick_interval_ms == 0 {
            return Err(MorphError::InvalidConfig(
                "transport.tick_interval_ms must be non-zero".to_string(),
            ));
        }
        if transport.speed_presets.is_empty() {
            return Err(MorphError::InvalidConfig(
                "transport.speed_presets must not be empty".to_string(),
            ));
        }
        for speed in &transport.speed_presets {
            positive("transport.speed_presets", *speed)?;
        }

        let render = &self.render;
        if !(0.0..1.0).contains(&render.overlay_threshold) {
            return Err(MorphError::InvalidConfig(format!(
                "render.overlay_threshold must be in [0, 1), got {}",
                render.overlay_threshold
            )));
        }
        positive("render.camera_distance", render.camera_distance as f64)?;
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MorphError::InvalidConfig(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

/// Shape of the tessellated cube and its sphere projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Half the edge length of the cube.
    pub size: f64,
    pub subdivisions: u32,
    pub radius: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            size: 1.0,
            subdivisions: 5,
            radius: 1.0,
        }
    }
}

/// Feel of the orbit camera. These values were tuned by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub orientation_smoothing: f32,
    pub velocity_smoothing: f32,
    pub transition_smoothing: f32,
    pub damping: f32,
    pub momentum_multiplier: f32,
    pub drag_sensitivity: f32,
    pub degrees_per_pixel: f32,
    /// Momentum below this many degrees per tick snaps to zero.
    pub momentum_threshold: f32,
    pub resume_momentum: f32,
    pub resume_transition: f32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            orientation_smoothing: 0.8,
            velocity_smoothing: 0.6,
            transition_smoothing: 0.95,
            damping: 0.95,
            momentum_multiplier: 0.2,
            drag_sensitivity: 1.3,
            degrees_per_pixel: 0.5,
            momentum_threshold: 0.01,
            resume_momentum: 0.3,
            resume_transition: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub duration_seconds: f64,
    /// Rewind always runs at this rate regardless of the playback speed.
    pub rewind_multiplier: f64,
    pub tick_interval_ms: u64,
    pub speed_presets: Vec<f64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 30.0,
            rewind_multiplier: 2.0,
            tick_interval_ms: 16,
            speed_presets: vec![1.0, 2.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub camera_distance: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Degrees per second of automatic spin at the start of the morph.
    pub auto_spin_speed: f32,
    pub overlay_threshold: f32,
    pub overlay_segments: u32,
    /// Side of the axis indicator viewport relative to the shorter surface side.
    pub indicator_fraction: f32,
    pub indicator_distance: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            camera_distance: 5.0,
            fov_degrees: 45.0,
            near: 0.1,
            far: 50.0,
            auto_spin_speed: 50.0,
            overlay_threshold: 0.7,
            overlay_segments: 20,
            indicator_fraction: 0.2,
            indicator_distance: 3.0,
        }
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Track loaded when the session starts.
    pub track: Option<PathBuf>,
}
