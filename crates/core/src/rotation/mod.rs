//! Orbit camera with inertia and a smooth hand-back to automatic spin.
//!
//! Manual orbit, the fade towards auto rotation and auto rotation itself are
//! not discrete states. They are read off the continuous `transition` value
//! (0 = manual, 1 = automatic) so the view never snaps.

use glam::{Quat, Vec3};

use crate::config::RotationConfig;

/// One-pole low-pass filter: every update closes `1 - smoothing` of the gap
/// between `current` and `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothValue {
    current: f32,
    target: f32,
    smoothing: f32,
}

impl SmoothValue {
    pub fn new(initial: f32, smoothing: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            smoothing: smoothing.clamp(0.0, 0.999_999),
        }
    }

    pub fn update(&mut self) {
        self.current += (self.target - self.current) * (1.0 - self.smoothing);
    }

    pub fn set_target(&mut self, value: f32) {
        self.target = value;
    }

    pub fn get(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

#[derive(Debug, Clone)]
pub struct RotationController {
    settings: RotationConfig,
    rotation_x: SmoothValue,
    rotation_y: SmoothValue,
    velocity_x: SmoothValue,
    velocity_y: SmoothValue,
    momentum_x: f32,
    momentum_y: f32,
    transition: SmoothValue,
    auto_rotation: bool,
    /// Accumulated automatic spin about the diagonal, in degrees.
    spin_degrees: f32,
}

impl Default for RotationController {
    fn default() -> Self {
        Self::new(RotationConfig::default())
    }
}

impl RotationController {
    pub fn new(settings: RotationConfig) -> Self {
        Self {
            rotation_x: SmoothValue::new(0.0, settings.orientation_smoothing),
            rotation_y: SmoothValue::new(0.0, settings.orientation_smoothing),
            velocity_x: SmoothValue::new(0.0, settings.velocity_smoothing),
            velocity_y: SmoothValue::new(0.0, settings.velocity_smoothing),
            momentum_x: 0.0,
            momentum_y: 0.0,
            transition: SmoothValue::new(1.0, settings.transition_smoothing),
            auto_rotation: true,
            spin_degrees: 0.0,
            settings,
        }
    }

    /// Advances every filter by one step and lets residual momentum coast.
    pub fn tick(&mut self) {
        self.rotation_x.update();
        self.rotation_y.update();
        self.velocity_x.update();
        self.velocity_y.update();
        self.transition.update();

        let threshold = self.settings.momentum_threshold;
        if self.momentum_x.abs() > threshold || self.momentum_y.abs() > threshold {
            self.rotation_x
                .set_target(self.rotation_x.get() + self.momentum_x);
            self.rotation_y
                .set_target(self.rotation_y.get() + self.momentum_y);

            // Damping approaches 1 as the spin slows, so the tail is gentle.
            let speed = (self.momentum_x.abs() + self.momentum_y.abs()) * 0.5;
            let dynamic_damping =
                self.settings.damping * (0.97 + 0.03 * (1.0 - (speed / 3.0).min(1.0)));
            self.momentum_x *= dynamic_damping;
            self.momentum_y *= dynamic_damping;
        }

        if self.momentum_x.abs() < threshold {
            self.momentum_x = 0.0;
        }
        if self.momentum_y.abs() < threshold {
            self.momentum_y = 0.0;
        }
    }

    pub fn begin_drag(&mut self) {
        self.auto_rotation = false;
        self.transition.set_target(0.0);
    }

    /// Turns the last drag velocity into momentum and starts fading auto spin
    /// back in. The flag flips immediately; `transition` carries the fade.
    pub fn end_drag(&mut self) {
        let multiplier = self.settings.momentum_multiplier;
        self.momentum_x = self.velocity_y.get() * multiplier;
        self.momentum_y = self.velocity_x.get() * multiplier;
        self.transition.set_target(1.0);
        self.auto_rotation = true;
    }

    pub fn update_drag_velocity(&mut self, dx: f32, dy: f32, dt: f32) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        let sensitivity = self.settings.drag_sensitivity;
        self.velocity_x.set_target(dx / dt * sensitivity);
        self.velocity_y.set_target(dy / dt * sensitivity);
    }

    /// Applies a pointer movement of `dx`, `dy` pixels. Horizontal motion turns
    /// the model around its y axis, vertical motion around its x axis.
    pub fn drag_by(&mut self, dx: f32, dy: f32, dt: f32) {
        self.update_drag_velocity(dx, dy, dt);
        let step = self.settings.degrees_per_pixel;
        self.rotation_y
            .set_target(self.rotation_y.get() + dx * step);
        self.rotation_x
            .set_target(self.rotation_x.get() + dy * step);
    }

    pub fn should_resume_auto(&self) -> bool {
        let limit = self.settings.resume_momentum;
        self.momentum_x.abs() < limit
            && self.momentum_y.abs() < limit
            && self.transition.get() > self.settings.resume_transition
    }

    pub fn resume_auto(&mut self) {
        self.auto_rotation = true;
        self.transition.set_target(1.0);
    }

    /// Space bar behaviour: hold the view if spinning, otherwise hand back.
    pub fn toggle_auto(&mut self) {
        if self.auto_rotation {
            self.begin_drag();
        } else {
            self.resume_auto();
        }
    }

    pub fn is_auto_rotating(&self) -> bool {
        self.auto_rotation
    }

    /// Current (x, y) orientation in degrees.
    pub fn orientation(&self) -> (f32, f32) {
        (self.rotation_x.get(), self.rotation_y.get())
    }

    pub fn momentum(&self) -> (f32, f32) {
        (self.momentum_x, self.momentum_y)
    }

    pub fn transition(&self) -> f32 {
        self.transition.get()
    }

    /// Orientation without the automatic spin component.
    pub fn manual_rotation(&self) -> Quat {
        let (x, y) = self.orientation();
        Quat::from_rotation_x(x.to_radians()) * Quat::from_rotation_y(y.to_radians())
    }

    /// Advances the automatic spin by `dt` seconds of playback (negative
    /// while rewinding). The spin slows as the morph progresses and its rate
    /// is weighted by `transition`.
    pub fn advance_spin(&mut self, progress: f32, dt: f32, base_speed: f32) {
        if !dt.is_finite() {
            return;
        }
        let weight = self.transition.get().clamp(0.0, 1.0);
        let speed = base_speed * (1.0 - 0.5 * progress.clamp(0.0, 1.0));
        self.spin_degrees = (self.spin_degrees + speed * weight * dt).rem_euclid(360.0);
    }

    /// Automatic spin about the (1, 1, 1) diagonal.
    pub fn auto_spin(&self) -> Quat {
        Quat::from_axis_angle(Vec3::ONE.normalize(), self.spin_degrees.to_radians())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_value_converges_without_overshoot() {
        for start in [-50.0_f32, 0.0, 3.0] {
            let mut value = SmoothValue::new(start, 0.8);
            value.set_target(10.0);
            for _ in 0..200 {
                value.update();
                assert!(value.get() <= 10.0);
            }
            assert!((value.get() - 10.0).abs() < 1e-3);
        }

        let mut value = SmoothValue::new(25.0, 0.6);
        value.set_target(-4.0);
        for _ in 0..200 {
            value.update();
            assert!(value.get() >= -4.0);
        }
        assert!((value.get() + 4.0).abs() < 1e-3);
    }

    #[test]
    fn zero_smoothing_jumps_to_target() {
        let mut value = SmoothValue::new(0.0, 0.0);
        value.set_target(5.0);
        value.update();
        assert_eq!(value.get(), 5.0);
    }

    #[test]
    fn release_without_motion_hands_back_to_auto() {
        let mut controller = RotationController::default();
        controller.begin_drag();
        assert!(!controller.is_auto_rotating());

        for _ in 0..30 {
            controller.tick();
        }
        assert!(controller.transition() < 0.95);

        controller.end_drag();
        assert_eq!(controller.momentum(), (0.0, 0.0));
        assert!(controller.is_auto_rotating());

        let mut ticks = 0;
        while controller.transition() <= 0.95 {
            assert!(!controller.should_resume_auto());
            controller.tick();
            ticks += 1;
            assert!(ticks < 500, "transition never relaxed");
        }
        assert!(controller.should_resume_auto());
    }

    #[test]
    fn momentum_coasts_then_comes_to_rest() {
        let mut controller = RotationController::default();
        controller.begin_drag();
        for _ in 0..10 {
            controller.drag_by(4.0, -2.0, 0.016);
            controller.tick();
        }
        controller.end_drag();

        let (mx, my) = controller.momentum();
        assert!(mx < 0.0, "vertical drag feeds x momentum");
        assert!(my > 0.0, "horizontal drag feeds y momentum");

        let before = controller.orientation();
        let mut ticks = 0;
        while controller.momentum() != (0.0, 0.0) {
            controller.tick();
            ticks += 1;
            assert!(ticks < 10_000, "momentum never settled");
        }
        let after = controller.orientation();
        assert!(after.1 > before.1);
        assert!(after.0 < before.0);
    }

    #[test]
    fn drag_velocity_ignores_zero_dt() {
        let mut controller = RotationController::default();
        controller.update_drag_velocity(10.0, 10.0, 0.0);
        controller.tick();
        controller.end_drag();
        assert_eq!(controller.momentum(), (0.0, 0.0));
    }

    #[test]
    fn drag_moves_orientation_targets() {
        let mut controller = RotationController::default();
        controller.begin_drag();
        controller.drag_by(10.0, 4.0, 0.02);
        for _ in 0..100 {
            controller.tick();
        }
        let (x, y) = controller.orientation();
        assert!((y - 5.0).abs() < 1e-2);
        assert!((x - 2.0).abs() < 1e-2);
    }

    #[test]
    fn toggle_auto_alternates() {
        let mut controller = RotationController::default();
        controller.toggle_auto();
        assert!(!controller.is_auto_rotating());
        controller.toggle_auto();
        assert!(controller.is_auto_rotating());
    }

    #[test]
    fn auto_spin_fades_with_transition() {
        let mut controller = RotationController::default();
        controller.advance_spin(0.0, 1.0, 50.0);
        let expected = Quat::from_axis_angle(Vec3::ONE.normalize(), 50_f32.to_radians());
        assert!(controller.auto_spin().abs_diff_eq(expected, 1e-4));

        controller.begin_drag();
        for _ in 0..400 {
            controller.tick();
        }
        let held = controller.auto_spin();
        controller.advance_spin(0.0, 1.0, 50.0);
        assert!(controller.auto_spin().angle_between(held) < 1e-3);
    }

    #[test]
    fn auto_spin_slows_as_the_morph_completes() {
        let mut start = RotationController::default();
        let mut end = RotationController::default();
        start.advance_spin(0.0, 1.0, 50.0);
        end.advance_spin(1.0, 1.0, 50.0);
        let start_angle = start.auto_spin().angle_between(Quat::IDENTITY);
        let end_angle = end.auto_spin().angle_between(Quat::IDENTITY);
        assert!(start_angle > end_angle);
    }

    #[test]
    fn partial_spin_stays_continuous_past_half_a_turn() {
        let mut controller = RotationController::default();
        controller.begin_drag();
        while controller.transition() > 0.5 {
            controller.tick();
        }

        let mut previous = controller.auto_spin();
        let mut travelled = 0.0;
        for _ in 0..3_000 {
            controller.advance_spin(0.0, 0.01, 50.0);
            let current = controller.auto_spin();
            let step = current.angle_between(previous).to_degrees();
            assert!(step < 1.0, "spin jumped {step} degrees in one step");
            travelled += step;
            previous = current;
        }
        assert!(travelled > 360.0, "spin should pass a full turn");
    }

    #[test]
    fn rewinding_unwinds_the_spin() {
        let mut controller = RotationController::default();
        controller.advance_spin(0.0, 2.0, 50.0);
        controller.advance_spin(0.0, -2.0, 50.0);
        assert!(controller.auto_spin().angle_between(Quat::IDENTITY) < 1e-3);
    }
}
