//! Bounding volume of the uploaded cloud.

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub const EMPTY: Self = Self { center: Vec3::ZERO, radius: -1.0 };

    /// Centre of the axis-aligned box around all points, radius to the
    /// farthest point. Empty input → [`BoundingSphere::EMPTY`].
    pub fn from_positions(positions: &[f32]) -> Self {
        let points = || positions.chunks_exact(3).map(|p| Vec3::new(p[0], p[1], p[2]));

        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;
        for p in points() {
            min = min.min(p);
            max = max.max(p);
            any = true;
        }
        if !any {
            return Self::EMPTY;
        }

        let center = (min + max) * 0.5;
        let radius_sq = points().map(|p| center.distance_squared(p)).fold(0.0f32, f32::max);
        Self { center, radius: radius_sq.sqrt() }
    }

    pub fn is_empty(&self) -> bool {
        self.radius < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_encloses_every_point() {
        let positions = [0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 1.0, 1.0, -1.0];
        let sphere = BoundingSphere::from_positions(&positions);
        assert_eq!(sphere.center, Vec3::new(1.0, 0.5, -0.5));
        for p in positions.chunks_exact(3) {
            assert!(sphere.center.distance(Vec3::from_slice(p)) <= sphere.radius + 1e-6);
        }
    }

    #[test]
    fn empty_and_single_point() {
        assert!(BoundingSphere::from_positions(&[]).is_empty());
        let one = BoundingSphere::from_positions(&[3.0, 4.0, 5.0]);
        assert_eq!(one.center, Vec3::new(3.0, 4.0, 5.0));
        assert_eq!(one.radius, 0.0);
    }
}
