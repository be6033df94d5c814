//! Piecewise cubic Bézier curves and their constraint attributes
//!
//! A curve lives in the x/z ground plane with y as elevation. Control points
//! come in `3n + 1` form: every segment shares its end point with the next
//! segment's start. The curve parameter `t` runs over `[0, curve_count]`, one
//! unit per segment, and attribute point positions use the same units.

pub mod meta;

pub use meta::MetaPoint;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};
use crate::params::MAX_RESOLUTION_EXP;

/// Which grids a curve writes and at which levels it is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplineConstraints {
    /// Line cells pin the height. When false the line only feeds the shoulders.
    pub elevation: bool,
    pub noise: bool,
    pub warp: bool,
    pub erosion: bool,
    /// Drawn only on levels whose exponent lies in `[min_grid_level, max_grid_level]`
    pub min_grid_level: u32,
    pub max_grid_level: u32,
}

impl Default for SplineConstraints {
    fn default() -> Self {
        Self {
            elevation: true,
            noise: true,
            warp: true,
            erosion: true,
            min_grid_level: 0,
            max_grid_level: MAX_RESOLUTION_EXP,
        }
    }
}

impl SplineConstraints {
    pub fn draws_level(&self, level_exp: u32) -> bool {
        (self.min_grid_level..=self.max_grid_level).contains(&level_exp)
    }
}

/// Everything the rasterizer needs at one curve parameter.
#[derive(Clone, Copy, Debug)]
pub struct CurveSample {
    pub t: f32,
    pub position: Vec3,
    /// Unit ground-plane normal pointing to the curve's left
    pub left: Vec2,
    pub attributes: MetaPoint,
}

impl CurveSample {
    /// Constrained elevation at the centerline, in world units.
    pub fn elevation(&self) -> f32 {
        self.position.y + self.attributes.height
    }

    pub fn ground(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }
}

/// Serialized form of a curve, validated into a [`BezierSpline`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SplineSource {
    points: Vec<Vec3>,
    meta_points: Vec<MetaPoint>,
    constraints: SplineConstraints,
}

/// A piecewise cubic Bézier curve with sorted attribute points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SplineSource", into = "SplineSource")]
pub struct BezierSpline {
    points: Vec<Vec3>,
    meta_points: Vec<MetaPoint>,
    pub constraints: SplineConstraints,
}

impl TryFrom<SplineSource> for BezierSpline {
    type Error = TerrainError;

    fn try_from(source: SplineSource) -> Result<Self> {
        let mut spline = Self::new(source.points, source.meta_points)?;
        spline.constraints = source.constraints;
        Ok(spline)
    }
}

impl From<BezierSpline> for SplineSource {
    fn from(spline: BezierSpline) -> Self {
        Self {
            points: spline.points,
            meta_points: spline.meta_points,
            constraints: spline.constraints,
        }
    }
}

impl BezierSpline {
    /// Build a curve from control points and attribute points.
    ///
    /// Two points become a single straight segment with handles at thirds.
    /// Attribute points are sorted here once.
    pub fn new(points: Vec<Vec3>, mut meta_points: Vec<MetaPoint>) -> Result<Self> {
        if points.iter().any(|p| !p.is_finite()) {
            return Err(TerrainError::InvalidSpline("control point is not finite".into()));
        }
        if meta_points.iter().any(|m| !m.is_finite()) {
            return Err(TerrainError::InvalidSpline("attribute point is not finite".into()));
        }

        let points = match points.len() {
            0 | 1 => {
                return Err(TerrainError::InvalidSpline(format!(
                    "need at least 2 control points, got {}",
                    points.len()
                )))
            }
            2 => {
                let (a, b) = (points[0], points[1]);
                vec![a, a.lerp(b, 1.0 / 3.0), a.lerp(b, 2.0 / 3.0), b]
            }
            n if (n - 1) % 3 != 0 => {
                return Err(TerrainError::InvalidSpline(format!(
                    "{} control points do not form 3n+1 cubic segments",
                    n
                )))
            }
            _ => points,
        };

        meta_points.sort_by(|a, b| a.position.total_cmp(&b.position));

        Ok(Self {
            points,
            meta_points,
            constraints: SplineConstraints::default(),
        })
    }

    /// Straight curve between two points.
    pub fn line(from: Vec3, to: Vec3) -> Self {
        let points = vec![from, from.lerp(to, 1.0 / 3.0), from.lerp(to, 2.0 / 3.0), to];
        Self {
            points,
            meta_points: Vec::new(),
            constraints: SplineConstraints::default(),
        }
    }

    pub fn with_meta_point(mut self, point: MetaPoint) -> Self {
        let idx = self
            .meta_points
            .partition_point(|p| p.position <= point.position);
        self.meta_points.insert(idx, point);
        self
    }

    pub fn with_constraints(mut self, constraints: SplineConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Attribute points in ascending position order.
    pub fn meta_points(&self) -> &[MetaPoint] {
        &self.meta_points
    }

    pub fn curve_count(&self) -> usize {
        (self.points.len() - 1) / 3
    }

    /// Segment index and local parameter for a clamped curve parameter.
    fn segment(&self, t: f32) -> (usize, f32) {
        let count = self.curve_count();
        let t = if t.is_finite() { t.clamp(0.0, count as f32) } else { 0.0 };
        let i = (t.floor() as usize).min(count - 1);
        (i, t - i as f32)
    }

    fn control(&self, i: usize) -> (Vec3, Vec3, Vec3, Vec3) {
        let base = i * 3;
        (
            self.points[base],
            self.points[base + 1],
            self.points[base + 2],
            self.points[base + 3],
        )
    }

    /// Position and unit tangent at `t`.
    pub fn evaluate(&self, t: f32) -> (Vec3, Vec3) {
        (self.point(t), self.tangent(t))
    }

    pub fn point(&self, t: f32) -> Vec3 {
        let (i, u) = self.segment(t);
        let (p0, p1, p2, p3) = self.control(i);
        let mu = 1.0 - u;

        // B(u) = (1-u)^3 P0 + 3(1-u)^2 u P1 + 3(1-u) u^2 P2 + u^3 P3
        p0 * (mu * mu * mu) + p1 * (3.0 * mu * mu * u) + p2 * (3.0 * mu * u * u) + p3 * (u * u * u)
    }

    /// First derivative with respect to the local segment parameter.
    pub fn derivative(&self, t: f32) -> Vec3 {
        let (i, u) = self.segment(t);
        let (p0, p1, p2, p3) = self.control(i);
        let mu = 1.0 - u;

        (p1 - p0) * (3.0 * mu * mu) + (p2 - p1) * (6.0 * mu * u) + (p3 - p2) * (3.0 * u * u)
    }

    /// Unit tangent. Falls back to a finite difference, then `+x`, when the
    /// derivative vanishes (coincident handles).
    pub fn tangent(&self, t: f32) -> Vec3 {
        if let Some(dir) = self.derivative(t).try_normalize() {
            return dir;
        }
        let step = 0.01;
        (self.point(t + step) - self.point(t - step))
            .try_normalize()
            .unwrap_or(Vec3::X)
    }

    /// Ground-plane direction 90 degrees to the left of the tangent.
    pub fn perpendicular(&self, t: f32) -> Vec2 {
        let tangent = self.tangent(t);
        Vec2::new(-tangent.z, tangent.x)
            .try_normalize()
            .unwrap_or(Vec2::Y)
    }

    /// Interpolated attributes at `t`; see [`MetaPoint`] for extrapolation rules.
    pub fn attribute_at(&self, t: f32) -> MetaPoint {
        meta::interpolate_sorted(&self.meta_points, t)
    }

    pub fn sample(&self, t: f32) -> CurveSample {
        CurveSample {
            t,
            position: self.point(t),
            left: self.perpendicular(t),
            attributes: self.attribute_at(t),
        }
    }

    /// Samples at `t = n / samplings` for `n = 0..=samplings * curve_count`.
    pub fn samples(&self, samplings: usize) -> Vec<CurveSample> {
        let samplings = samplings.max(1);
        let total = samplings * self.curve_count();
        (0..=total)
            .map(|n| self.sample(n as f32 / samplings as f32))
            .collect()
    }
}
