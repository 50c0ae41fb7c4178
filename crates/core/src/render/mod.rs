//! Per-frame draw orchestration.
//!
//! The renderer decides what is drawn and under which transform; the actual
//! rasterisation is delegated to a [`DrawSink`].

use glam::{Mat4, Quat, Vec3};

use crate::{config::RenderConfig, geometry::Geometry, morph, rotation::RotationController};

/// RGBA colour with components in `[0, 1]`.
pub type Rgba = [f32; 4];

pub const EDGE_COLOR: Rgba = [1.0, 1.0, 1.0, 1.0];
pub const OVERLAY_COLOR: Rgba = [0.5, 0.5, 1.0, 1.0];
pub const X_AXIS_COLOR: Rgba = [1.0, 0.0, 0.0, 1.0];
pub const Y_AXIS_COLOR: Rgba = [0.0, 1.0, 0.0, 1.0];
pub const Z_AXIS_COLOR: Rgba = [0.0, 0.0, 1.0, 1.0];

/// Rectangle on the render surface, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

/// Line rasteriser. `transform` maps model space to clip space for every
/// line until the next pass begins.
pub trait DrawSink {
    fn begin_pass(&mut self, viewport: Viewport, transform: Mat4);
    fn line(&mut self, from: Vec3, to: Vec3, color: Rgba);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub lines: usize,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
    radius: f32,
    morphed: Vec<Vec3>,
    overlay: Vec<(Vec3, Vec3)>,
}

impl Renderer {
    pub fn new(config: RenderConfig, radius: f32) -> Self {
        let overlay = wire_sphere(radius, config.overlay_segments.max(3));
        Self {
            config,
            radius,
            morphed: Vec::new(),
            overlay,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Vertices of the most recently drawn frame.
    pub fn morphed_vertices(&self) -> &[Vec3] {
        &self.morphed
    }

    /// Model rotation for the current frame: manual orbit followed by the
    /// automatic spin.
    pub fn model_rotation(&self, rotation: &RotationController) -> Quat {
        rotation.manual_rotation() * rotation.auto_spin()
    }

    pub fn draw_frame(
        &mut self,
        sink: &mut dyn DrawSink,
        geometry: &Geometry,
        rotation: &RotationController,
        progress: f32,
        surface: Viewport,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        let model = Mat4::from_quat(self.model_rotation(rotation));

        let view = self.projection(surface.aspect(), self.config.camera_distance);
        sink.begin_pass(surface, view * model);

        morph::interpolate_into(
            &geometry.cube,
            &geometry.sphere,
            progress,
            &mut self.morphed,
        );
        for edge in &geometry.edges {
            let [a, b] = edge.indices();
            let (Some(&from), Some(&to)) = (self.morphed.get(a), self.morphed.get(b)) else {
                continue;
            };
            sink.line(from, to, EDGE_COLOR);
            stats.lines += 1;
        }

        let threshold = self.config.overlay_threshold;
        if progress > threshold {
            let opacity = ((progress - threshold) / (1.0 - threshold)).min(1.0) * 0.5;
            let color = [OVERLAY_COLOR[0], OVERLAY_COLOR[1], OVERLAY_COLOR[2], opacity];
            for (from, to) in &self.overlay {
                sink.line(*from, *to, color);
                stats.lines += 1;
            }
        }

        stats.lines += self.draw_axis_indicator(sink, model, surface);
        stats
    }

    fn projection(&self, aspect: f32, distance: f32) -> Mat4 {
        let projection = Mat4::perspective_rh_gl(
            self.config.fov_degrees.to_radians(),
            aspect,
            self.config.near,
            self.config.far,
        );
        projection * Mat4::from_translation(Vec3::new(0.0, 0.0, -distance))
    }

    fn draw_axis_indicator(
        &self,
        sink: &mut dyn DrawSink,
        model: Mat4,
        surface: Viewport,
    ) -> usize {
        let side = surface.width.min(surface.height) * self.config.indicator_fraction;
        if side <= 0.0 {
            return 0;
        }
        let margin = side / 8.0;
        let viewport = Viewport::new(surface.x + margin, surface.y + margin, side, side);
        sink.begin_pass(viewport, self.projection(1.0, self.config.indicator_distance) * model);

        let mut lines = 0;
        for (axis, color) in [
            (Vec3::X, X_AXIS_COLOR),
            (Vec3::Y, Y_AXIS_COLOR),
            (Vec3::Z, Z_AXIS_COLOR),
        ] {
            sink.line(Vec3::ZERO, axis, color);
            lines += 1;
            // Arrow head: four barbs from the tip back towards the shaft.
            let (u, v) = axis.any_orthonormal_pair();
            let base = axis * 0.8;
            for barb in [u, -u, v, -v] {
                sink.line(axis, base + barb * 0.1, color);
                lines += 1;
            }
        }
        lines
    }
}

/// Latitude and longitude lines of a sphere, `segments` of each.
fn wire_sphere(radius: f32, segments: u32) -> Vec<(Vec3, Vec3)> {
    use std::f32::consts::{PI, TAU};

    let point = |stack: u32, slice: u32| {
        let polar = PI * stack as f32 / segments as f32;
        let azimuth = TAU * slice as f32 / segments as f32;
        Vec3::new(
            polar.sin() * azimuth.cos(),
            polar.cos(),
            polar.sin() * azimuth.sin(),
        ) * radius
    };

    let mut lines = Vec::new();
    for stack in 0..segments {
        for slice in 0..segments {
            let here = point(stack, slice);
            lines.push((here, point(stack + 1, slice)));
            if stack > 0 {
                lines.push((here, point(stack, slice + 1)));
            }
        }
    }
    lines
}
