//! Core shared math for `dynamics` (engine-agnostic).
// dynamics/types.rs
use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};

pub type Vec3 = Vector3<f32>;
pub type Pos3 = Point3<f32>;
pub type Quat = UnitQuaternion<f32>;

pub const EPSILON: f32 = 1e-6;

// ----- axes (+Z forward, +Y up, +X right) -----
#[inline] pub fn world_up() -> Vec3 { Vec3::new(0.0, 1.0, 0.0) }
#[inline] pub fn world_forward() -> Vec3 { Vec3::new(0.0, 0.0, 1.0) }
#[inline] pub fn world_right() -> Vec3 { Vec3::new(1.0, 0.0, 0.0) }

// ----- scalar helpers -----
#[inline]
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < (1e-6 * a.abs().max(b.abs())).max(1e-5)
}

#[inline]
pub fn sign(v: f32) -> f32 {
    if v >= 0.0 { 1.0 } else { -1.0 }
}

/// Linear interpolation with `t` clamped to `[0, 1]`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// Moves `current` toward `target` by at most `max_delta`.
#[inline]
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + sign(target - current) * max_delta
    }
}

/// Shortest signed difference between two angles in degrees, in `(-180, 180]`.
#[inline]
pub fn delta_angle(current: f32, target: f32) -> f32 {
    let mut d = (target - current).rem_euclid(360.0);
    if d > 180.0 {
        d -= 360.0;
    }
    d
}

/// Angle lerp (degrees) that wraps around 360.
#[inline]
pub fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
    a + delta_angle(a, b) * t.clamp(0.0, 1.0)
}

// ----- vector helpers -----

/// Unit vector, or zero when `v` is degenerate.
#[inline]
pub fn normalize_or_zero(v: Vec3) -> Vec3 {
    let m = v.norm();
    if m > 1e-5 { v / m } else { Vec3::zeros() }
}

#[inline]
pub fn project_on_plane(v: Vec3, plane_normal: Vec3) -> Vec3 {
    let sqr = plane_normal.norm_squared();
    if sqr < EPSILON {
        return v;
    }
    v - plane_normal * (v.dot(&plane_normal) / sqr)
}

#[inline]
pub fn project(v: Vec3, onto: Vec3) -> Vec3 {
    let sqr = onto.norm_squared();
    if sqr < EPSILON {
        return Vec3::zeros();
    }
    onto * (v.dot(&onto) / sqr)
}

/// Unsigned angle between two vectors in degrees.
#[inline]
pub fn angle_deg(a: Vec3, b: Vec3) -> f32 {
    let denom = (a.norm_squared() * b.norm_squared()).sqrt();
    if denom < 1e-15 {
        return 0.0;
    }
    (a.dot(&b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

// ----- rotation helpers -----

/// Rotation of `angle_deg` degrees about `axis`; identity for a degenerate axis.
#[inline]
pub fn angle_axis(angle_deg: f32, axis: Vec3) -> Quat {
    match Unit::try_new(axis, EPSILON) {
        Some(axis) => Quat::from_axis_angle(&axis, angle_deg.to_radians()),
        None => Quat::identity(),
    }
}

#[inline]
pub fn rotate_vector(v: Vec3, axis: Vec3, angle_deg: f32) -> Vec3 {
    angle_axis(angle_deg, axis) * v
}

/// Rotation mapping +Z to `forward` and +Y toward `up`. `None` when the pair
/// does not define a frame.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Option<Quat> {
    if forward.norm_squared() < EPSILON || up.cross(&forward).norm_squared() < EPSILON {
        return None;
    }
    Some(Quat::face_towards(&forward, &up))
}

/// Shortest-path spherical interpolation, `t` clamped to `[0, 1]`.
#[inline]
pub fn slerp(from: &Quat, to: &Quat, t: f32) -> Quat {
    from.try_slerp(to, t.clamp(0.0, 1.0), EPSILON).unwrap_or(*to)
}

/// Rotation taking direction `from` onto direction `to`.
#[inline]
pub fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
    Quat::rotation_between(&from, &to).unwrap_or_else(Quat::identity)
}
