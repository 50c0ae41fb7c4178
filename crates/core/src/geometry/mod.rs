//! Tessellated cube and its co-indexed sphere projection.
//!
//! Vertex `i` of [`Geometry::cube`] and vertex `i` of [`Geometry::sphere`] are
//! the two ends of the same morphing point, and [`Geometry::edges`] index both
//! sets. Topology is fixed once built; only positions move during the morph.

use std::collections::{HashMap, HashSet};

use glam::{DVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::{config::GeometryConfig, MorphError, Result};

/// Coordinates are compared after rounding to this many steps per unit
/// (six decimal digits).
const KEY_SCALE: f64 = 1e6;

/// Points closer than this to the origin project onto the origin.
const SPHERE_EPSILON: f64 = 1e-4;

/// Unit cube corners, scaled by the requested size at build time.
const CUBE_CORNERS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

/// Faces as corner indices, wound so that corners 0-1 and 3-2 are opposite
/// edges of the quad.
const CUBE_FACES: [[usize; 4]; 6] = [
    [0, 3, 2, 1],
    [4, 5, 6, 7],
    [0, 1, 5, 4],
    [3, 7, 6, 2],
    [0, 4, 7, 3],
    [1, 2, 6, 5],
];

/// Unordered pair of vertex indices, stored with the smaller index first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge(pub u32, pub u32);

impl Edge {
    pub fn new(a: u32, b: u32) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn indices(self) -> [usize; 2] {
        [self.0 as usize, self.1 as usize]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    pub cube: Vec<Vec3>,
    pub sphere: Vec<Vec3>,
    pub edges: Vec<Edge>,
}

impl Geometry {
    /// Checked constructor for vertex sets and edges built elsewhere.
    pub fn new(cube: Vec<Vec3>, sphere: Vec<Vec3>, edges: Vec<Edge>) -> Result<Self> {
        let geometry = Self {
            cube,
            sphere,
            edges,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Reads a mesh written by [`Geometry::to_json`].
    pub fn from_json(text: &str) -> Result<Self> {
        let geometry: Self = serde_json::from_str(text)?;
        geometry.validate()?;
        Ok(geometry)
    }

    /// Both vertex sets must have the same length and every edge must index
    /// into them.
    pub fn validate(&self) -> Result<()> {
        if self.cube.len() != self.sphere.len() {
            return Err(MorphError::InvalidGeometry(format!(
                "{} cube vertices but {} sphere vertices",
                self.cube.len(),
                self.sphere.len()
            )));
        }
        let count = self.cube.len();
        if let Some(edge) = self
            .edges
            .iter()
            .find(|edge| edge.indices().iter().any(|&index| index >= count))
        {
            return Err(MorphError::InvalidGeometry(format!(
                "edge ({}, {}) is out of range for {count} vertices",
                edge.0, edge.1
            )));
        }
        Ok(())
    }

    pub fn from_config(config: &GeometryConfig) -> Result<Self> {
        build(config.size, config.subdivisions, config.radius)
    }

    pub fn vertex_count(&self) -> usize {
        self.cube.len()
    }

    /// Pretty-printed JSON with both vertex sets and the edge list.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builds the tessellated cube of half-size `size` with `subdivisions` grid
/// cells along every face edge, plus its projection onto a sphere of `radius`.
pub fn build(size: f64, subdivisions: u32, radius: f64) -> Result<Geometry> {
    if subdivisions < 1 {
        return Err(MorphError::InvalidSubdivisions(subdivisions));
    }
    if !(size.is_finite() && size > 0.0) {
        return Err(MorphError::InvalidConfig(format!(
            "cube size must be positive, got {size}"
        )));
    }

    let corners = CUBE_CORNERS.map(|c| DVec3::from_array(c) * size);
    let steps = subdivisions as usize;
    let mut cache = VertexCache::default();
    let mut edges = Vec::new();
    let mut seen = HashSet::new();

    for face in CUBE_FACES {
        let [a, b, c, d] = face.map(|i| corners[i]);
        let mut grid = Vec::with_capacity((steps + 1) * (steps + 1));

        for row in 0..=steps {
            let t1 = row as f64 / steps as f64;
            for col in 0..=steps {
                let t2 = col as f64 / steps as f64;
                let near = a.lerp(b, t2);
                let far = d.lerp(c, t2);
                grid.push(cache.insert(near.lerp(far, t1)));
            }
        }

        let at = |row: usize, col: usize| grid[row * (steps + 1) + col];
        for row in 0..=steps {
            for col in 0..steps {
                let horizontal = Edge::new(at(row, col), at(row, col + 1));
                if seen.insert(horizontal) {
                    edges.push(horizontal);
                }
                if row < steps {
                    let vertical = Edge::new(at(row, col), at(row + 1, col));
                    if seen.insert(vertical) {
                        edges.push(vertical);
                    }
                }
            }
            // The last column's vertical edges are not covered above.
            if row < steps {
                let vertical = Edge::new(at(row, steps), at(row + 1, steps));
                if seen.insert(vertical) {
                    edges.push(vertical);
                }
            }
        }
    }

    let cube: Vec<Vec3> = cache.points.iter().map(|p| p.as_vec3()).collect();
    let sphere = project_points(&cache.points, radius);

    tracing::debug!(
        vertices = cube.len(),
        edges = edges.len(),
        subdivisions,
        "geometry built"
    );

    Geometry::new(cube, sphere, edges)
}

/// Normalises every point to `radius`. Points at the origin stay there.
pub fn project_to_sphere(points: &[Vec3], radius: f32) -> Vec<Vec3> {
    let points: Vec<DVec3> = points.iter().map(|p| p.as_dvec3()).collect();
    project_points(&points, radius as f64)
}

fn project_points(points: &[DVec3], radius: f64) -> Vec<Vec3> {
    points
        .iter()
        .map(|p| {
            let distance = p.length();
            if distance < SPHERE_EPSILON {
                Vec3::ZERO
            } else {
                (*p / distance * radius).as_vec3()
            }
        })
        .collect()
}

/// Deduplicating vertex store keyed by rounded coordinates.
#[derive(Debug, Default)]
struct VertexCache {
    lookup: HashMap<[i64; 3], u32>,
    points: Vec<DVec3>,
}

impl VertexCache {
    fn insert(&mut self, point: DVec3) -> u32 {
        let key = point.to_array().map(|c| (c * KEY_SCALE).round() as i64);
        let points = &mut self.points;
        *self.lookup.entry(key).or_insert_with(|| {
            points.push(point);
            (points.len() - 1) as u32
        })
    }
}
