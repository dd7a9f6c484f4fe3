//! Camera rigs looking at the origin.
//!
//! [`OrbitCamera`] is the damped spherical orbit used by the audio sketch;
//! [`TurntableCamera`] is the lightweight drag/wheel rig of the basic sketch.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{Mat4, Vec3};

/// Perspective lens parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lens {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Lens {
    fn default() -> Self {
        Self { fov_y_deg: 60.0, near: 0.01, far: 50.0 }
    }
}

pub trait CameraRig: Send {
    /// Apply pending input. Called once per render tick.
    fn update(&mut self);

    /// Pointer drag in pixels.
    fn rotate(&mut self, dx: f32, dy: f32, viewport_height: u32);

    /// Wheel input; positive moves away from the target.
    fn zoom(&mut self, wheel_delta: f32);

    fn eye(&self) -> Vec3;

    fn lens(&self) -> Lens;

    fn target(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target(), Vec3::Y)
    }

    fn view_projection(&self, aspect: f32) -> Mat4 {
        let lens = self.lens();
        Mat4::perspective_rh_gl(lens.fov_y_deg.to_radians(), aspect, lens.near, lens.far) * self.view()
    }
}

// MARK: - OrbitCamera

/// Spherical orbit with inertia. Input accumulates into a delta that is
/// applied a fraction per tick and decays.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    lens: Lens,
    radius: f32,
    /// Polar angle from +Y.
    phi: f32,
    /// Azimuth about +Y, measured from +Z.
    theta: f32,
    delta_phi: f32,
    delta_theta: f32,
    pending_scale: f32,
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 1.5))
    }
}

impl OrbitCamera {
    const POLAR_EPS: f32 = 1e-6;
    const ZOOM_STEP: f32 = 0.95;

    pub fn new(eye: Vec3) -> Self {
        let radius = eye.length().max(f32::EPSILON);
        Self {
            lens: Lens::default(),
            radius,
            phi: (eye.y / radius).clamp(-1.0, 1.0).acos(),
            theta: eye.x.atan2(eye.z),
            delta_phi: 0.0,
            delta_theta: 0.0,
            pending_scale: 1.0,
            damping: 0.05,
            min_distance: 0.5,
            max_distance: 10.0,
        }
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }
}

impl CameraRig for OrbitCamera {
    fn update(&mut self) {
        self.theta += self.delta_theta * self.damping;
        self.phi = (self.phi + self.delta_phi * self.damping).clamp(Self::POLAR_EPS, PI - Self::POLAR_EPS);
        self.radius = (self.radius * self.pending_scale).clamp(self.min_distance, self.max_distance);

        self.delta_theta *= 1.0 - self.damping;
        self.delta_phi *= 1.0 - self.damping;
        self.pending_scale = 1.0;
    }

    fn rotate(&mut self, dx: f32, dy: f32, viewport_height: u32) {
        let h = viewport_height.max(1) as f32;
        self.delta_theta -= TAU * dx / h;
        self.delta_phi -= TAU * dy / h;
    }

    fn zoom(&mut self, wheel_delta: f32) {
        if wheel_delta < 0.0 {
            self.pending_scale *= Self::ZOOM_STEP;
        } else if wheel_delta > 0.0 {
            self.pending_scale /= Self::ZOOM_STEP;
        }
    }

    fn eye(&self) -> Vec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        Vec3::new(sin_phi * sin_theta, cos_phi, sin_phi * cos_theta) * self.radius
    }

    fn lens(&self) -> Lens {
        self.lens
    }
}

// MARK: - TurntableCamera

/// Drag rotates, wheel scales the distance by ±10 %. No inertia.
#[derive(Debug, Clone)]
pub struct TurntableCamera {
    lens: Lens,
    pub theta: f32,
    pub phi: f32,
    pub distance: f32,
}

impl Default for TurntableCamera {
    fn default() -> Self {
        Self { lens: Lens::default(), theta: 0.0, phi: 0.0, distance: 1.5 }
    }
}

impl TurntableCamera {
    pub const DRAG_RAD_PER_PX: f32 = 0.005;
    pub const PHI_LIMIT: f32 = FRAC_PI_2 - 0.001;

    fn elevation(&self) -> f32 {
        self.phi.clamp(-Self::PHI_LIMIT, Self::PHI_LIMIT)
    }
}

impl CameraRig for TurntableCamera {
    fn update(&mut self) {}

    fn rotate(&mut self, dx: f32, dy: f32, _viewport_height: u32) {
        self.theta += dx * Self::DRAG_RAD_PER_PX;
        self.phi += dy * Self::DRAG_RAD_PER_PX;
    }

    fn zoom(&mut self, wheel_delta: f32) {
        if wheel_delta != 0.0 {
            self.distance *= 1.0 + wheel_delta.signum() * 0.1;
        }
    }

    fn eye(&self) -> Vec3 {
        let y = self.elevation();
        Vec3::new(self.theta.cos() * y.cos(), y.sin(), self.theta.sin() * y.cos()) * self.distance
    }

    fn lens(&self) -> Lens {
        self.lens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-4
    }

    #[test]
    fn orbit_starts_in_front_of_origin() {
        let cam = OrbitCamera::default();
        assert!(close(cam.eye(), Vec3::new(0.0, 0.0, 1.5)));
        assert!((cam.distance() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn orbit_zoom_respects_distance_limits() {
        let mut cam = OrbitCamera::default();
        for _ in 0..200 {
            cam.zoom(-1.0);
            cam.update();
        }
        assert_eq!(cam.distance(), 0.5);
        for _ in 0..200 {
            cam.zoom(1.0);
            cam.update();
        }
        assert_eq!(cam.distance(), 10.0);
    }

    #[test]
    fn orbit_damping_spreads_rotation_over_ticks() {
        let mut cam = OrbitCamera::default();
        cam.rotate(-100.0, 0.0, 720);
        let target = TAU * 100.0 / 720.0;

        cam.update();
        let first = cam.theta;
        assert!((first - target * 0.05).abs() < 1e-6);

        for _ in 0..500 {
            cam.update();
        }
        assert!((cam.theta - target).abs() < 1e-3);
    }

    #[test]
    fn orbit_polar_angle_never_flips() {
        let mut cam = OrbitCamera::default();
        cam.rotate(0.0, 100_000.0, 720);
        for _ in 0..100 {
            cam.update();
        }
        assert!(cam.eye().y > 0.0);
        assert!(cam.view_projection(16.0 / 9.0).is_finite());
    }

    #[test]
    fn turntable_clamps_elevation_and_scales_zoom() {
        let mut cam = TurntableCamera::default();
        assert!(close(cam.eye(), Vec3::new(1.5, 0.0, 0.0)));

        cam.rotate(0.0, 10_000.0, 720);
        let eye = cam.eye();
        assert!(eye.y < 1.5 && eye.y > 1.49);
        assert!(cam.view_projection(1.0).is_finite());

        cam.distance = 1.0;
        cam.zoom(120.0);
        assert!((cam.distance - 1.1).abs() < 1e-6);
        cam.zoom(-3.0);
        assert!((cam.distance - 0.99).abs() < 1e-6);
        cam.zoom(0.0);
        assert!((cam.distance - 0.99).abs() < 1e-6);
    }
}
