//! Attribute points attached along a curve

use serde::{Deserialize, Serialize};

/// Constraint attributes at one curve parameter.
///
/// Every field except `position` is linearly interpolated between the two
/// bracketing points. The same type is returned by sampling, with `position`
/// set to the sampled parameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaPoint {
    /// Curve parameter in `[0, curve_count]`
    pub position: f32,

    /// Elevation offset added to the curve's own y
    pub height: f32,

    /// Lateral half-width of the pinned line, applied on both sides
    pub line_radius: f32,

    pub gradient_length_left: f32,
    /// Elevation change across the left shoulder
    pub gradient_angle_left: f32,
    pub gradient_length_right: f32,
    pub gradient_angle_right: f32,

    pub noise_amplitude: f32,
    pub noise_roughness: f32,

    pub warp_a: f32,
    pub warp_b: f32,

    /// Extra rain, added to 1 as a multiplier on injected water
    pub erosion_rain: f32,
    /// Divides the suspension rate
    pub erosion_hardness: f32,
    /// Multiplies the sediment transport capacity
    pub erosion_sediment_capacity: f32,
}

impl Default for MetaPoint {
    fn default() -> Self {
        Self {
            position: 0.0,
            height: 0.0,
            line_radius: 0.0,
            gradient_length_left: 1.0,
            gradient_angle_left: 0.0,
            gradient_length_right: 1.0,
            gradient_angle_right: 0.0,
            noise_amplitude: 0.0,
            noise_roughness: 0.0,
            warp_a: 0.0,
            warp_b: 0.0,
            erosion_rain: 0.0,
            erosion_hardness: 1.0,
            erosion_sediment_capacity: 1.0,
        }
    }
}

impl MetaPoint {
    pub fn at(position: f32) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }

    pub fn with_line_radius(mut self, radius: f32) -> Self {
        self.line_radius = radius;
        self
    }

    /// Same shoulder on both sides.
    pub fn with_gradient(mut self, length: f32, angle: f32) -> Self {
        self.gradient_length_left = length;
        self.gradient_length_right = length;
        self.gradient_angle_left = angle;
        self.gradient_angle_right = angle;
        self
    }

    pub fn with_noise(mut self, amplitude: f32, roughness: f32) -> Self {
        self.noise_amplitude = amplitude;
        self.noise_roughness = roughness;
        self
    }

    pub fn with_erosion(mut self, rain: f32, hardness: f32, sediment_capacity: f32) -> Self {
        self.erosion_rain = rain;
        self.erosion_hardness = hardness;
        self.erosion_sediment_capacity = sediment_capacity;
        self
    }

    /// Interpolate every attribute. `t = 0` returns `a`'s fields bit-exactly.
    pub fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        let mix = |x: f32, y: f32| x + (y - x) * t;
        Self {
            position: mix(a.position, b.position),
            height: mix(a.height, b.height),
            line_radius: mix(a.line_radius, b.line_radius),
            gradient_length_left: mix(a.gradient_length_left, b.gradient_length_left),
            gradient_angle_left: mix(a.gradient_angle_left, b.gradient_angle_left),
            gradient_length_right: mix(a.gradient_length_right, b.gradient_length_right),
            gradient_angle_right: mix(a.gradient_angle_right, b.gradient_angle_right),
            noise_amplitude: mix(a.noise_amplitude, b.noise_amplitude),
            noise_roughness: mix(a.noise_roughness, b.noise_roughness),
            warp_a: mix(a.warp_a, b.warp_a),
            warp_b: mix(a.warp_b, b.warp_b),
            erosion_rain: mix(a.erosion_rain, b.erosion_rain),
            erosion_hardness: mix(a.erosion_hardness, b.erosion_hardness),
            erosion_sediment_capacity: mix(a.erosion_sediment_capacity, b.erosion_sediment_capacity),
        }
    }

    /// Slope of the left shoulder in elevation per world unit.
    pub fn slope_left(&self) -> f32 {
        slope(self.gradient_angle_left, self.gradient_length_left)
    }

    pub fn slope_right(&self) -> f32 {
        slope(self.gradient_angle_right, self.gradient_length_right)
    }

    pub fn is_finite(&self) -> bool {
        [
            self.position,
            self.height,
            self.line_radius,
            self.gradient_length_left,
            self.gradient_angle_left,
            self.gradient_length_right,
            self.gradient_angle_right,
            self.noise_amplitude,
            self.noise_roughness,
            self.warp_a,
            self.warp_b,
            self.erosion_rain,
            self.erosion_hardness,
            self.erosion_sediment_capacity,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

fn slope(angle: f32, length: f32) -> f32 {
    if length.abs() <= f32::EPSILON {
        0.0
    } else {
        angle / length
    }
}

/// Interpolate attributes at `t` from points sorted by position.
///
/// Holds the first point's values before it and the last point's values after
/// it; with no points at all the curve defaults apply.
pub(crate) fn interpolate_sorted(points: &[MetaPoint], t: f32) -> MetaPoint {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return MetaPoint::at(t),
    };

    if t <= first.position {
        return MetaPoint { position: t, ..*first };
    }

    for pair in points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if t < b.position {
            let span = b.position - a.position;
            if span <= f32::EPSILON {
                return MetaPoint { position: t, ..*b };
            }
            let mut sample = MetaPoint::lerp(a, b, (t - a.position) / span);
            sample.position = t;
            return sample;
        }
    }

    MetaPoint { position: t, ..*last }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<MetaPoint> {
        vec![
            MetaPoint::at(0.25).with_height(10.0).with_line_radius(2.0),
            MetaPoint::at(0.5).with_height(20.0).with_noise(1.0, 0.5),
            MetaPoint::at(0.75).with_height(-4.0).with_erosion(1.0, 2.0, 0.5),
        ]
    }

    #[test]
    fn test_knots_are_exact() {
        let pts = points();
        for p in &pts {
            let sample = interpolate_sorted(&pts, p.position);
            assert_eq!(sample, *p);
        }
    }

    #[test]
    fn test_midpoint_interpolates() {
        let pts = points();
        let sample = interpolate_sorted(&pts, 0.375);
        assert!((sample.height - 15.0).abs() < 1e-5);
        assert!((sample.line_radius - 1.0).abs() < 1e-5);
        assert!((sample.noise_amplitude - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_constant_extrapolation() {
        let pts = points();
        let before = interpolate_sorted(&pts, 0.0);
        assert_eq!(before.height, 10.0);
        assert_eq!(before.position, 0.0);

        let after = interpolate_sorted(&pts, 1.0);
        assert_eq!(after.height, -4.0);
        assert_eq!(after.erosion_hardness, 2.0);
    }

    #[test]
    fn test_no_points_gives_defaults() {
        let sample = interpolate_sorted(&[], 0.3);
        assert_eq!(sample.height, 0.0);
        assert_eq!(sample.erosion_hardness, 1.0);
        assert_eq!(sample.erosion_sediment_capacity, 1.0);
        assert_eq!(sample.gradient_length_left, 1.0);
    }

    #[test]
    fn test_slope_guards_zero_length() {
        let p = MetaPoint::at(0.0).with_gradient(0.0, 5.0);
        assert_eq!(p.slope_left(), 0.0);
        let p = MetaPoint::at(0.0).with_gradient(4.0, 2.0);
        assert!((p.slope_right() - 0.5).abs() < 1e-6);
    }
}
