//! Pinhole camera intrinsics and the optional field-of-view frustum.
//!
//! Pixel coordinates follow `pixel = K * x_n` where `x_n = (X/Z, Y/Z, 1)` is
//! the normalized image point of a camera-frame point `(X, Y, Z)`.

use crate::{Mat3, Pt2, Pt3, Real, Vec3};
use serde::{Deserialize, Serialize};

/// Standard pinhole intrinsics with optional skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinholeIntrinsics {
    /// Focal length in pixels along X.
    pub fx: Real,
    /// Focal length in pixels along Y.
    pub fy: Real,
    /// Principal point X coordinate in pixels.
    pub cx: Real,
    /// Principal point Y coordinate in pixels.
    pub cy: Real,
    /// Skew term (typically 0).
    #[serde(default)]
    pub skew: Real,
}

impl PinholeIntrinsics {
    pub fn new(fx: Real, fy: Real, cx: Real, cy: Real) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            skew: 0.0,
        }
    }

    /// Return the 3x3 camera intrinsics matrix K.
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(
            self.fx, self.skew, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0,
        )
    }

    /// Closed-form inverse of K (upper triangular, never singular for `fx, fy != 0`).
    pub fn k_inverse(&self) -> Mat3 {
        let ifx = 1.0 / self.fx;
        let ify = 1.0 / self.fy;
        Mat3::new(
            ifx,
            -self.skew * ifx * ify,
            (self.skew * self.cy - self.cx * self.fy) * ifx * ify,
            0.0,
            ify,
            -self.cy * ify,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Map a normalized image point to pixels.
    pub fn normalized_to_pixel(&self, xn: &Pt2) -> Pt2 {
        Pt2::new(
            self.fx * xn.x + self.skew * xn.y + self.cx,
            self.fy * xn.y + self.cy,
        )
    }

    /// Map a pixel to its normalized image point.
    pub fn pixel_to_normalized(&self, px: &Pt2) -> Pt2 {
        let y = (px.y - self.cy) / self.fy;
        let x = (px.x - self.cx - self.skew * y) / self.fx;
        Pt2::new(x, y)
    }

    /// Project a camera-frame point, or `None` if it lies on or behind the image plane.
    pub fn project(&self, p_c: &Pt3) -> Option<Pt2> {
        if p_c.z <= Real::EPSILON {
            return None;
        }
        Some(self.normalized_to_pixel(&Pt2::new(p_c.x / p_c.z, p_c.y / p_c.z)))
    }
}

/// Frustum side planes of a camera for a given image size.
///
/// Each normal passes through the optical centre and points out of the
/// frustum: a camera-frame point `p` is outside a side when `p . n > 0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldOfView {
    pub width: u32,
    pub height: u32,
    /// Outward unit normals in the order left, right, up, down.
    pub normals: [Vec3; 4],
    /// Horizontal opening angle (radians).
    pub horizontal_angle: Real,
    /// Vertical opening angle (radians).
    pub vertical_angle: Real,
}

impl FieldOfView {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const UP: usize = 2;
    pub const DOWN: usize = 3;

    pub fn normal(&self, side: usize) -> &Vec3 {
        &self.normals[side]
    }
}

/// Intrinsics plus the lazily computed field of view used by clipping.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    pub intrinsics: PinholeIntrinsics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fov: Option<FieldOfView>,
}

impl PinholeCamera {
    pub fn new(intrinsics: PinholeIntrinsics) -> Self {
        Self {
            intrinsics,
            fov: None,
        }
    }

    pub fn k_matrix(&self) -> Mat3 {
        self.intrinsics.k_matrix()
    }

    pub fn k_inverse(&self) -> Mat3 {
        self.intrinsics.k_inverse()
    }

    /// Compute the frustum side normals for an image of `width x height` pixels.
    ///
    /// Recomputation is skipped when the image size did not change.
    pub fn compute_fov(&mut self, width: u32, height: u32) {
        if let Some(fov) = &self.fov {
            if fov.width == width && fov.height == height {
                return;
            }
        }
        let k = &self.intrinsics;
        let w = width as Real;
        let h = height as Real;

        let left = Vec3::new(-1.0, 0.0, -k.cx / k.fx).normalize();
        let right = Vec3::new(1.0, 0.0, -(w - k.cx) / k.fx).normalize();
        let up = Vec3::new(0.0, -1.0, -k.cy / k.fy).normalize();
        let down = Vec3::new(0.0, 1.0, -(h - k.cy) / k.fy).normalize();

        let horizontal_angle = ((w - k.cx) / k.fx).atan() + (k.cx / k.fx).atan();
        let vertical_angle = ((h - k.cy) / k.fy).atan() + (k.cy / k.fy).atan();

        log::debug!(
            "field of view {}x{}: h={:.2} deg, v={:.2} deg",
            width,
            height,
            horizontal_angle.to_degrees(),
            vertical_angle.to_degrees()
        );

        self.fov = Some(FieldOfView {
            width,
            height,
            normals: [left, right, up, down],
            horizontal_angle,
            vertical_angle,
        });
    }

    pub fn is_fov_computed(&self) -> bool {
        self.fov.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intrinsics() -> PinholeIntrinsics {
        PinholeIntrinsics {
            fx: 800.0,
            fy: 780.0,
            cx: 320.0,
            cy: 240.0,
            skew: 0.5,
        }
    }

    #[test]
    fn k_inverse_matches_numeric_inverse() {
        let k = intrinsics();
        let prod = k.k_matrix() * k.k_inverse();
        let err = (prod - Mat3::identity()).norm();
        assert!(err < 1e-12, "K * K^-1 differs from identity by {err}");
    }

    #[test]
    fn pixel_normalized_round_trip() {
        let k = intrinsics();
        let px = Pt2::new(412.5, 97.25);
        let back = k.normalized_to_pixel(&k.pixel_to_normalized(&px));
        assert!((back - px).norm() < 1e-10);
    }

    #[test]
    fn fov_normals_bound_the_image() {
        let mut cam = PinholeCamera::new(PinholeIntrinsics::new(800.0, 800.0, 320.0, 240.0));
        cam.compute_fov(640, 480);
        let fov = cam.fov.expect("fov computed");

        // Optical axis is inside every side.
        let axis = Vec3::new(0.0, 0.0, 1.0);
        for n in &fov.normals {
            assert!(axis.dot(n) < 0.0);
        }

        // A ray through the left image border lies on the left plane.
        let border = Vec3::new(-320.0 / 800.0, 0.0, 1.0);
        assert!(border.dot(fov.normal(FieldOfView::LEFT)).abs() < 1e-12);

        // A ray beyond the right border is outside the right plane only.
        let beyond = Vec3::new(400.0 / 800.0, 0.0, 1.0);
        assert!(beyond.dot(fov.normal(FieldOfView::RIGHT)) > 0.0);
        assert!(beyond.dot(fov.normal(FieldOfView::LEFT)) < 0.0);

        assert!((fov.horizontal_angle - 2.0 * (0.4_f64).atan()).abs() < 1e-12);
    }

    #[test]
    fn camera_json_omits_missing_fov_and_defaults_skew() {
        let cam = PinholeCamera::new(intrinsics());
        let json = serde_json::to_string(&cam).unwrap();
        assert!(!json.contains("fov"), "unexpected fov in {json}");
        let back: PinholeCamera = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cam);

        let parsed: PinholeIntrinsics =
            serde_json::from_str(r#"{"fx": 500.0, "fy": 500.0, "cx": 320.0, "cy": 240.0}"#)
                .unwrap();
        assert_eq!(parsed, PinholeIntrinsics::new(500.0, 500.0, 320.0, 240.0));
    }

    #[test]
    fn computed_fov_survives_json() {
        let mut cam = PinholeCamera::new(PinholeIntrinsics::new(400.0, 400.0, 320.0, 240.0));
        cam.compute_fov(640, 480);
        let json = serde_json::to_string(&cam).unwrap();
        let back: PinholeCamera = serde_json::from_str(&json).unwrap();
        let (fov, back_fov) = (cam.fov.unwrap(), back.fov.unwrap());
        assert_eq!((back_fov.width, back_fov.height), (640, 480));
        assert!((back_fov.horizontal_angle - fov.horizontal_angle).abs() < 1e-12);
        for side in 0..4 {
            assert!((back_fov.normal(side) - fov.normal(side)).norm() < 1e-12);
        }
    }
}
