//! Planes and rigid-motion helpers.
//!
//! A [`Plane`] is stored as a unit normal `n` and signed distance `d` such
//! that every point `X` on the plane satisfies `n . X = d` in the frame the
//! plane is expressed in.
//!
//! Twists are ordered `(vx, vy, vz, wx, wy, wz)`: translational velocity
//! first, rotational velocity (axis-angle) last.

use crate::{skew, Iso3, Mat3, Pt3, Real, Vec3, Vec6};
use nalgebra::{Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by low-level geometric constructions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    /// The points used to build a plane are collinear or coincident.
    #[error("cannot build a plane from collinear points")]
    CollinearPoints,
    /// A projective or depth division hit a zero denominator.
    #[error("division by zero in {0}")]
    DivideByZero(&'static str),
}

/// Planes closer than this to the frame origin are treated as passing through it.
pub const MIN_PLANE_DISTANCE: Real = 1e-9;

/// Oriented plane `n . X = d` with unit normal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: Real,
}

impl Plane {
    /// Build from an arbitrary (non-zero) normal and a point on the plane.
    pub fn from_normal_point(normal: &Vec3, point: &Pt3) -> Result<Self, GeometryError> {
        let len = normal.norm();
        if len <= Real::EPSILON {
            return Err(GeometryError::CollinearPoints);
        }
        let n = normal / len;
        Ok(Self {
            normal: n,
            distance: n.dot(&point.coords),
        })
    }

    /// Plane through three points; the normal follows `(p1 - p0) x (p2 - p0)`.
    pub fn from_points(p0: &Pt3, p1: &Pt3, p2: &Pt3) -> Result<Self, GeometryError> {
        let e1 = p1 - p0;
        let e2 = p2 - p0;
        let n = e1.cross(&e2);
        let scale = e1.norm() * e2.norm();
        if scale <= Real::EPSILON || n.norm() <= 1e-12 * scale {
            return Err(GeometryError::CollinearPoints);
        }
        Self::from_normal_point(&n, p0)
    }

    /// Express the plane in a new frame, given `new_from_old`.
    pub fn change_frame(&mut self, new_from_old: &Iso3) {
        let n = new_from_old.rotation * self.normal;
        self.distance += n.dot(&new_from_old.translation.vector);
        self.normal = n;
    }

    /// Copy of the plane expressed in a new frame.
    pub fn transformed(&self, new_from_old: &Iso3) -> Self {
        let mut p = *self;
        p.change_frame(new_from_old);
        p
    }

    /// Signed distance of `p` to the plane (positive on the normal side).
    pub fn signed_distance(&self, p: &Pt3) -> Real {
        self.normal.dot(&p.coords) - self.distance
    }

    /// Inverse depth `1/Z` of the plane point seen along the normalized ray `(x, y, 1)`.
    ///
    /// Fails when the plane passes through the origin, up to [`MIN_PLANE_DISTANCE`].
    pub fn inverse_depth(&self, x: Real, y: Real) -> Result<Real, GeometryError> {
        if self.distance.abs() <= MIN_PLANE_DISTANCE {
            return Err(GeometryError::DivideByZero("plane inverse depth"));
        }
        Ok(self.normal.dot(&Vec3::new(x, y, 1.0)) / self.distance)
    }
}

/// `V(w)` matrix of the SE(3) exponential: maps twist translation to motion translation.
fn left_jacobian(w: &Vec3) -> Mat3 {
    let theta2 = w.norm_squared();
    let wx = skew(w);
    if theta2 < 1e-16 {
        return Mat3::identity() + 0.5 * wx;
    }
    let theta = theta2.sqrt();
    let a = (1.0 - theta.cos()) / theta2;
    let b = (theta - theta.sin()) / (theta2 * theta);
    Mat3::identity() + a * wx + b * wx * wx
}

/// Exponential map of a twist `(v, w)` to a rigid transform.
pub fn exp_twist(xi: &Vec6) -> Iso3 {
    let v = Vec3::new(xi[0], xi[1], xi[2]);
    let w = Vec3::new(xi[3], xi[4], xi[5]);
    let rotation = UnitQuaternion::from_scaled_axis(w);
    let translation = left_jacobian(&w) * v;
    Iso3::from_parts(Translation3::from(translation), rotation)
}

/// Logarithm of a rigid transform, inverse of [`exp_twist`].
pub fn log_twist(t: &Iso3) -> Vec6 {
    let w = t.rotation.scaled_axis();
    let v = left_jacobian(&w)
        .try_inverse()
        .map(|j| j * t.translation.vector)
        .unwrap_or(t.translation.vector);
    Vec6::new(v.x, v.y, v.z, w.x, w.y, w.z)
}

/// Translation and rotation-angle distance between two rigid transforms.
pub fn pose_distance(a: &Iso3, b: &Iso3) -> (Real, Real) {
    let dt = (a.translation.vector - b.translation.vector).norm();
    let dr = a.rotation.angle_to(&b.rotation);
    (dt, dr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_from_points_has_unit_normal_and_contains_points() {
        let p0 = Pt3::new(0.0, 0.0, 1.0);
        let p1 = Pt3::new(1.0, 0.0, 1.0);
        let p2 = Pt3::new(0.0, 1.0, 2.0);
        let plane = Plane::from_points(&p0, &p1, &p2).unwrap();
        assert!((plane.normal.norm() - 1.0).abs() < 1e-12);
        for p in [p0, p1, p2] {
            assert!(plane.signed_distance(&p).abs() < 1e-12);
        }
    }

    #[test]
    fn collinear_points_are_rejected() {
        let res = Plane::from_points(
            &Pt3::new(0.0, 0.0, 1.0),
            &Pt3::new(1.0, 1.0, 1.0),
            &Pt3::new(2.0, 2.0, 1.0),
        );
        assert_eq!(res, Err(GeometryError::CollinearPoints));
    }

    #[test]
    fn change_frame_keeps_points_on_plane() {
        let plane = Plane::from_points(
            &Pt3::new(-0.1, -0.1, 0.5),
            &Pt3::new(0.1, -0.1, 0.6),
            &Pt3::new(0.0, 0.2, 0.55),
        )
        .unwrap();
        let t = exp_twist(&Vec6::new(0.05, -0.02, 0.1, 0.1, -0.2, 0.05));
        let moved = plane.transformed(&t);
        let p = Pt3::new(0.1, -0.1, 0.6);
        assert!(moved.signed_distance(&(t * p)).abs() < 1e-12);
    }

    #[test]
    fn exp_log_round_trip() {
        let xi = Vec6::new(0.3, -0.1, 0.2, 0.4, 0.1, -0.25);
        let back = log_twist(&exp_twist(&xi));
        assert!((back - xi).norm() < 1e-10, "twist mismatch: {}", (back - xi).norm());
    }

    #[test]
    fn exp_inverse_is_exp_of_negated_twist() {
        let xi = Vec6::new(0.01, 0.02, -0.03, 0.002, -0.004, 0.001);
        let a = exp_twist(&xi).inverse();
        let b = exp_twist(&(-xi));
        let (dt, dr) = pose_distance(&a, &b);
        assert!(dt < 1e-14 && dr < 1e-14, "dt={dt} dr={dr}");
    }

    #[test]
    fn inverse_depth_matches_plane_point() {
        let plane = Plane {
            normal: Vec3::new(0.0, 0.0, 1.0),
            distance: 2.0,
        };
        let inv_z = plane.inverse_depth(0.3, -0.2).unwrap();
        assert!((inv_z - 0.5).abs() < 1e-12);

        let through_origin = Plane {
            normal: Vec3::new(0.0, 0.0, 1.0),
            distance: 0.0,
        };
        assert!(through_origin.inverse_depth(0.0, 0.0).is_err());

        let almost_through = Plane {
            normal: Vec3::new(1.0, 0.0, 0.0),
            distance: 3e-16,
        };
        assert_eq!(
            almost_through.inverse_depth(0.1, 0.2),
            Err(GeometryError::DivideByZero("plane inverse depth"))
        );
    }
}
