//! Core library for the cube to sphere morph.
//!
//! Each module owns one piece of the animation: building the matched cube and
//! sphere meshes, blending between them, the inertial orbit camera, the
//! playback transport, the audio follower and per-frame draw orchestration.
//! [`Session`] ties them together behind the control surface a UI shell drives.

pub mod audio;
pub mod config;
pub mod error;
pub mod geometry;
pub mod morph;
pub mod render;
pub mod rotation;
pub mod session;
pub mod timeline;

pub use audio::{
    AudioPlayer, AudioTransport, DecodedTrack, NullDevice, OutputDevice, TrackDecoder, WavDecoder,
};
pub use config::{
    AppConfig, AudioConfig, GeometryConfig, RenderConfig, RotationConfig, TransportConfig,
};
pub use error::{MorphError, Result};
pub use geometry::{Edge, Geometry};
pub use render::{DrawSink, FrameStats, Renderer, Rgba, Viewport};
pub use rotation::{RotationController, SmoothValue};
pub use session::{AudioStatus, ControlLabels, Key, KeyOutcome, Session};
pub use timeline::{PlaybackState, Transport, TransportCommand, TransportEvent};
