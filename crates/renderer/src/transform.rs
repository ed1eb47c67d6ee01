use std::f64::consts::TAU;

use glam::{Mat4, Vec3};

/// Default time for one full turn of the primary rotation.
pub const DEFAULT_ROTATION_PERIOD: f64 = 6.0;

/// World, view, and projection matrices for one program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// Names of the `mat4` uniforms the frame driver writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformNames {
    pub world: String,
    pub view: String,
    pub projection: String,
}

impl Default for UniformNames {
    fn default() -> Self {
        Self {
            world: "mWorld".to_string(),
            view: "mView".to_string(),
            projection: "mProj".to_string(),
        }
    }
}

/// Right-handed look-at camera with a perspective projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, -8.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            aspect_ratio,
            self.near,
            self.far,
        )
    }

    pub fn matrices(&self, aspect_ratio: f32) -> CameraMatrices {
        CameraMatrices {
            view: self.view(),
            projection: self.projection(aspect_ratio),
        }
    }
}

/// View and projection fixed at frame-driver start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

/// Per-tick world transform callback.
pub trait WorldTransform {
    fn world(&mut self, elapsed_seconds: f64) -> Mat4;
}

impl WorldTransform for Box<dyn WorldTransform> {
    fn world(&mut self, elapsed_seconds: f64) -> Mat4 {
        (**self).world(elapsed_seconds)
    }
}

impl<F> WorldTransform for F
where
    F: FnMut(f64) -> Mat4,
{
    fn world(&mut self, elapsed_seconds: f64) -> Mat4 {
        self(elapsed_seconds)
    }
}

/// Built-in rotation policies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotationPolicy {
    /// World stays at identity.
    Static,
    /// One turn around `axis` every `period` seconds.
    SingleAxis { axis: Vec3, period: f64 },
    /// `R(primary, θ) · R(secondary, θ / secondary_divisor)`, where θ completes
    /// one turn every `period` seconds.
    TwoAxis {
        primary: Vec3,
        secondary: Vec3,
        period: f64,
        secondary_divisor: u32,
    },
}

impl Default for RotationPolicy {
    fn default() -> Self {
        RotationPolicy::TwoAxis {
            primary: Vec3::Y,
            secondary: Vec3::X,
            period: DEFAULT_ROTATION_PERIOD,
            secondary_divisor: 4,
        }
    }
}

impl RotationPolicy {
    pub fn single_axis(period: f64) -> Self {
        RotationPolicy::SingleAxis {
            axis: Vec3::Y,
            period,
        }
    }

    /// Time after which the world matrix repeats exactly.
    ///
    /// For two-axis rotation the secondary angle only returns to its start after
    /// `secondary_divisor` primary turns.
    pub fn full_period(&self) -> Option<f64> {
        match *self {
            RotationPolicy::Static => None,
            RotationPolicy::SingleAxis { period, .. } => Some(period),
            RotationPolicy::TwoAxis {
                period,
                secondary_divisor,
                ..
            } => Some(period * f64::from(secondary_divisor.max(1))),
        }
    }

    /// Primary rotation angle in radians at `elapsed_seconds`.
    pub fn angle(&self, elapsed_seconds: f64) -> f64 {
        let (Some(full), Some(period)) = (self.full_period(), self.period()) else {
            return 0.0;
        };
        if full <= 0.0 || period <= 0.0 {
            return 0.0;
        }
        TAU * elapsed_seconds.rem_euclid(full) / period
    }

    fn period(&self) -> Option<f64> {
        match *self {
            RotationPolicy::Static => None,
            RotationPolicy::SingleAxis { period, .. } | RotationPolicy::TwoAxis { period, .. } => {
                Some(period)
            }
        }
    }

    pub fn world_at(&self, elapsed_seconds: f64) -> Mat4 {
        let angle = self.angle(elapsed_seconds);
        match *self {
            RotationPolicy::Static => Mat4::IDENTITY,
            RotationPolicy::SingleAxis { axis, .. } => rotation(axis, angle),
            RotationPolicy::TwoAxis {
                primary,
                secondary,
                secondary_divisor,
                ..
            } => {
                rotation(primary, angle)
                    * rotation(secondary, angle / f64::from(secondary_divisor.max(1)))
            }
        }
    }
}

impl WorldTransform for RotationPolicy {
    fn world(&mut self, elapsed_seconds: f64) -> Mat4 {
        self.world_at(elapsed_seconds)
    }
}

fn rotation(axis: Vec3, angle: f64) -> Mat4 {
    Mat4::from_axis_angle(axis.normalize_or_zero(), angle as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_repeats_after_full_period() {
        let policies = [
            RotationPolicy::single_axis(DEFAULT_ROTATION_PERIOD),
            RotationPolicy::default(),
            RotationPolicy::TwoAxis {
                primary: Vec3::new(1.0, 1.0, 0.0),
                secondary: Vec3::Z,
                period: 2.5,
                secondary_divisor: 3,
            },
        ];
        for policy in policies {
            let period = policy.full_period().unwrap();
            for t in [0.0, 0.4, 1.7, 5.99, 123.25] {
                let a = policy.world_at(t);
                let b = policy.world_at(t + period);
                assert!(a.abs_diff_eq(b, 1e-5), "{policy:?} at {t}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn boxed_transform_forwards_to_inner() {
        let mut calls = 0;
        let mut boxed: Box<dyn WorldTransform> = Box::new(move |t: f64| {
            calls += 1;
            Mat4::from_translation(Vec3::new(t as f32, calls as f32, 0.0))
        });
        assert_eq!(boxed.world(2.0), Mat4::from_translation(Vec3::new(2.0, 1.0, 0.0)));
        assert_eq!(boxed.world(3.0), Mat4::from_translation(Vec3::new(3.0, 2.0, 0.0)));
    }

    #[test]
    fn two_axis_is_not_periodic_in_primary_turn_alone() {
        let policy = RotationPolicy::default();
        let a = policy.world_at(1.0);
        let b = policy.world_at(1.0 + DEFAULT_ROTATION_PERIOD);
        assert!(!a.abs_diff_eq(b, 1e-3));
    }

    #[test]
    fn static_policy_is_identity() {
        assert_eq!(RotationPolicy::Static.world_at(42.0), Mat4::IDENTITY);
    }

    #[test]
    fn closures_act_as_world_transforms() {
        let mut spin = |t: f64| Mat4::from_rotation_z(t as f32);
        assert_eq!(spin.world(0.0), Mat4::IDENTITY);
    }

    #[test]
    fn default_camera_looks_at_origin_from_behind() {
        let camera = Camera::default();
        let origin = camera.view().transform_point3(Vec3::ZERO);
        assert!((origin.z + 8.0).abs() < 1e-5);
    }
}
