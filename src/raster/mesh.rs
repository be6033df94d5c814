//! Triangle strips tessellated from curve samples
//!
//! Each curve yields three strips: the pinned line (left edge to right edge)
//! and one shoulder per side (line edge out to the end of the gradient).
//! Strips hold two vertices per sample, inner then outer, and are tessellated
//! once per solve in world coordinates; every grid level re-projects them.

use glam::Vec2;

use crate::spline::{BezierSpline, CurveSample, SplineConstraints};

/// Shoulder weight `b` at the line edge; it falls to zero at the shoulder end.
pub const SHOULDER_START_WEIGHT: f32 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshVertex {
    /// World x/z
    pub ground: Vec2,
    /// Curve parameter the vertex was swept from
    pub t: f32,
    /// Target elevation, normalized by max height
    pub elevation: f32,
    /// Shoulder relaxation weight
    pub weight: f32,
    /// Outward ground-plane direction of a shoulder, zero on the line
    pub normal: Vec2,
    /// Normalized elevation change per world unit along `normal`
    pub slope: f32,
}

/// Two vertices per curve sample; quad `i` spans samples `i` and `i + 1`.
#[derive(Clone, Debug, Default)]
pub struct StripMesh {
    pub vertices: Vec<MeshVertex>,
}

impl StripMesh {
    fn with_capacity(samples: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(samples * 2),
        }
    }

    fn push_pair(&mut self, inner: MeshVertex, outer: MeshVertex) {
        self.vertices.push(inner);
        self.vertices.push(outer);
    }

    /// Vertex triples of every triangle in the strip.
    pub fn triangles(&self) -> impl Iterator<Item = [&MeshVertex; 3]> + '_ {
        let quads = (self.vertices.len() / 2).saturating_sub(1);
        (0..quads).flat_map(move |i| {
            let v = &self.vertices[i * 2..i * 2 + 4];
            [[&v[0], &v[1], &v[2]], [&v[1], &v[3], &v[2]]]
        })
    }

    pub fn triangle_count(&self) -> usize {
        (self.vertices.len() / 2).saturating_sub(1) * 2
    }
}

/// One curve prepared for rasterization on every level.
#[derive(Clone, Debug)]
pub struct TessellatedSpline {
    pub constraints: SplineConstraints,
    pub samples: Vec<CurveSample>,
    pub line: StripMesh,
    pub left: StripMesh,
    pub right: StripMesh,
    max_height: f32,
}

impl TessellatedSpline {
    pub fn new(spline: &BezierSpline, samplings: usize, max_height: f32) -> Self {
        let samples = spline.samples(samplings);
        let constraints = spline.constraints;

        let mut line = StripMesh::with_capacity(samples.len());
        let mut left = StripMesh::with_capacity(samples.len());
        let mut right = StripMesh::with_capacity(samples.len());

        let (edge_weight, end_weight) = if constraints.elevation {
            (SHOULDER_START_WEIGHT, 0.0)
        } else {
            (SHOULDER_START_WEIGHT, SHOULDER_START_WEIGHT)
        };

        for sample in &samples {
            let attrs = &sample.attributes;
            let centre = sample.ground();
            let elevation = sample.elevation() / max_height;
            let radius = attrs.line_radius.max(0.0);

            let left_edge = centre + sample.left * radius;
            let right_edge = centre - sample.left * radius;

            let vertex = |ground: Vec2, elevation: f32, weight: f32, normal: Vec2, slope: f32| MeshVertex {
                ground,
                t: sample.t,
                elevation,
                weight,
                normal,
                slope,
            };

            line.push_pair(
                vertex(left_edge, elevation, 1.0, Vec2::ZERO, 0.0),
                vertex(right_edge, elevation, 1.0, Vec2::ZERO, 0.0),
            );

            let slope_left = attrs.slope_left() / max_height;
            let left_end = left_edge + sample.left * attrs.gradient_length_left.max(0.0);
            left.push_pair(
                vertex(left_edge, elevation, edge_weight, sample.left, slope_left),
                vertex(
                    left_end,
                    elevation + attrs.gradient_angle_left / max_height,
                    end_weight,
                    sample.left,
                    slope_left,
                ),
            );

            let slope_right = attrs.slope_right() / max_height;
            let right_end = right_edge - sample.left * attrs.gradient_length_right.max(0.0);
            right.push_pair(
                vertex(right_edge, elevation, edge_weight, -sample.left, slope_right),
                vertex(
                    right_end,
                    elevation + attrs.gradient_angle_right / max_height,
                    end_weight,
                    -sample.left,
                    slope_right,
                ),
            );
        }

        Self {
            constraints,
            samples,
            line,
            left,
            right,
            max_height,
        }
    }

    /// Normalized centerline elevation of sample `i`.
    pub fn sample_elevation(&self, i: usize) -> f32 {
        self.samples[i].elevation() / self.max_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spline::MetaPoint;
    use glam::Vec3;

    #[test]
    fn test_strip_layout() {
        let spline = BezierSpline::line(Vec3::new(-10.0, 20.0, 0.0), Vec3::new(10.0, 20.0, 0.0))
            .with_meta_point(MetaPoint::at(0.0).with_line_radius(2.0).with_gradient(4.0, 8.0));
        let mesh = TessellatedSpline::new(&spline, 4, 200.0);

        assert_eq!(mesh.samples.len(), 5);
        assert_eq!(mesh.line.vertices.len(), 10);
        assert_eq!(mesh.line.triangle_count(), 8);
        assert_eq!(mesh.left.triangles().count(), 8);

        // tangent +x, left is +z
        let inner = mesh.left.vertices[0];
        let outer = mesh.left.vertices[1];
        assert!(inner.ground.abs_diff_eq(Vec2::new(-10.0, 2.0), 1e-4));
        assert!(outer.ground.abs_diff_eq(Vec2::new(-10.0, 6.0), 1e-4));
        assert!((inner.elevation - 0.1).abs() < 1e-6);
        assert!((outer.elevation - 0.14).abs() < 1e-6);
        assert_eq!(inner.weight, SHOULDER_START_WEIGHT);
        assert_eq!(outer.weight, 0.0);
        assert!((inner.slope - 2.0 / 200.0).abs() < 1e-6);

        let right_outer = mesh.right.vertices[1];
        assert!(right_outer.ground.abs_diff_eq(Vec2::new(-10.0, -6.0), 1e-4));
        assert!(right_outer.normal.abs_diff_eq(Vec2::new(0.0, -1.0), 1e-6));
    }

    #[test]
    fn test_unconstrained_shoulders_keep_start_weight() {
        let spline = BezierSpline::line(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)).with_constraints(SplineConstraints {
            elevation: false,
            ..Default::default()
        });
        let mesh = TessellatedSpline::new(&spline, 2, 200.0);
        assert!(mesh.left.vertices.iter().all(|v| v.weight == SHOULDER_START_WEIGHT));
    }
}
