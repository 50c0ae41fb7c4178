use glam::Vec3;

/// Linearly blends co-indexed cube and sphere vertices by `t`, clamped to
/// `[0, 1]`. The endpoints are returned exactly.
pub fn interpolate(cube: &[Vec3], sphere: &[Vec3], t: f32) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(cube.len());
    interpolate_into(cube, sphere, t, &mut out);
    out
}

/// Same as [`interpolate`] but reuses `out`, which the renderer keeps alive
/// between frames.
pub fn interpolate_into(cube: &[Vec3], sphere: &[Vec3], t: f32, out: &mut Vec<Vec3>) {
    debug_assert_eq!(cube.len(), sphere.len(), "vertex sets must be co-indexed");
    out.clear();

    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    if t <= 0.0 {
        out.extend_from_slice(cube);
    } else if t >= 1.0 {
        out.extend_from_slice(sphere);
    } else {
        out.extend(cube.iter().zip(sphere).map(|(c, s)| *c + (*s - *c) * t));
    }
}
