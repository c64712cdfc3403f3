//! Planar homography: the transform itself and its estimators.
//!
//! A [`Homography`] maps homogeneous points of frame B to frame A,
//! `x_a ~ H x_b`. Estimators take the two point sets in that order
//! (`points_b`, `points_a`).
//!
//! - [`HomographySolver::dlt`]: normalized or raw Direct Linear Transform,
//! - [`HomographySolver::hlm`]: projective-basis (planar) or plane-from-epipolar
//!   (non-planar) closed form,
//! - [`HomographySolver::ransac`]: minimal 4-point samples with consensus scoring,
//! - [`HomographySolver::robust`]: iteratively re-weighted DLT with Tukey weights.

mod dlt;
mod hlm;
mod ransac;
mod robust;

pub use ransac::RansacHomographyOptions;
pub use robust::RobustHomographyOptions;

use serde::{Deserialize, Serialize};
use std::ops::Mul;
use thiserror::Error;
use vision_tracking_core::{
    from_homogeneous, to_homogeneous, GeometryError, Iso3, Mat3, PinholeIntrinsics, Plane, Pt2,
    Real,
};

/// Errors that can occur during homography estimation or application.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HomographyError {
    /// Not enough point correspondences were provided.
    #[error("need at least {required} point correspondences, got {got}")]
    NotEnoughPoints { required: usize, got: usize },
    /// The two point sets differ in length.
    #[error("point count mismatch: {b} points in B, {a} in A")]
    LengthMismatch { b: usize, a: usize },
    /// Collinear points or a design matrix without an isolated null vector.
    #[error("degenerate configuration: {0}")]
    DegenerateConfiguration(&'static str),
    /// Linear solve (SVD) failed.
    #[error("svd failed in homography estimation")]
    SvdFailed,
    /// RANSAC found no hypothesis with enough inliers.
    #[error("ransac failed to find a consensus homography")]
    NoConsensus,
    /// Zero denominator in a projective division.
    #[error("division by zero in {0}")]
    NumericalDegeneracy(&'static str),
}

impl From<GeometryError> for HomographyError {
    fn from(e: GeometryError) -> Self {
        match e {
            GeometryError::CollinearPoints => {
                HomographyError::DegenerateConfiguration("collinear plane points")
            }
            GeometryError::DivideByZero(what) => HomographyError::NumericalDegeneracy(what),
        }
    }
}

/// 3x3 projective transform from frame B to frame A, defined up to scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    matrix: Mat3,
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Mat3::identity(),
        }
    }

    pub fn from_matrix(matrix: Mat3) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Mat3 {
        &self.matrix
    }

    /// Plane-induced homography `H = R + t n^T / d` for `a_from_b` and a plane in frame B.
    ///
    /// Maps normalized image points of B to normalized image points of A.
    pub fn from_pose_plane(a_from_b: &Iso3, plane_b: &Plane) -> Result<Self, HomographyError> {
        if plane_b.distance.abs() <= Real::EPSILON {
            return Err(HomographyError::NumericalDegeneracy(
                "plane through the optical centre",
            ));
        }
        let r = a_from_b.rotation.to_rotation_matrix().into_inner();
        let t = a_from_b.translation.vector;
        Ok(Self {
            matrix: r + t * plane_b.normal.transpose() / plane_b.distance,
        })
    }

    /// Same transform scaled so that `H[2][2] == 1`.
    pub fn canonical(&self) -> Result<Self, HomographyError> {
        let s = self.matrix[(2, 2)];
        if s.abs() <= Real::EPSILON * self.matrix.norm() {
            return Err(HomographyError::NumericalDegeneracy("homography H[2][2]"));
        }
        Ok(Self {
            matrix: self.matrix / s,
        })
    }

    /// Scale to `H[2][2] == 1` when possible, otherwise to unit Frobenius norm.
    pub(crate) fn canonical_or_unit(m: Mat3) -> Self {
        let s = m[(2, 2)];
        if s.abs() > 1e-12 * m.norm() {
            Self { matrix: m / s }
        } else {
            Self {
                matrix: m / m.norm(),
            }
        }
    }

    pub fn inverse(&self) -> Result<Self, HomographyError> {
        self.matrix
            .try_inverse()
            .map(Self::canonical_or_unit)
            .ok_or(HomographyError::NumericalDegeneracy("singular homography"))
    }

    /// Map a point of frame B into frame A.
    pub fn project(&self, p_b: &Pt2) -> Result<Pt2, HomographyError> {
        from_homogeneous(&(self.matrix * to_homogeneous(p_b)))
            .ok_or(HomographyError::NumericalDegeneracy("homography projection"))
    }

    /// Euclidean transfer error `|H b - a|`; infinite when `b` maps to infinity.
    pub fn transfer_error(&self, p_b: &Pt2, p_a: &Pt2) -> Real {
        self.project(p_b)
            .map(|p| (p - p_a).norm())
            .unwrap_or(Real::INFINITY)
    }

    /// Pixel-space version `K H K^-1` of a homography between normalized points.
    pub fn to_pixel(&self, k: &PinholeIntrinsics) -> Result<Self, HomographyError> {
        Self::from_matrix(k.k_matrix() * self.matrix * k.k_inverse()).canonical()
    }

    /// Normalized-space version `K^-1 H K` of a pixel homography.
    pub fn to_normalized(&self, k: &PinholeIntrinsics) -> Result<Self, HomographyError> {
        Self::from_matrix(k.k_inverse() * self.matrix * k.k_matrix()).canonical()
    }

    /// Scale- and sign-invariant distance: Frobenius norm between unit-norm representatives.
    pub fn distance(&self, other: &Homography) -> Real {
        let a = self.matrix / self.matrix.norm();
        let mut b = other.matrix / other.matrix.norm();
        if a.dot(&b) < 0.0 {
            b = -b;
        }
        (a - b).norm()
    }
}

impl Mul for Homography {
    type Output = Homography;

    /// Composition: `(a * b)` maps through `b` first, then `a`.
    fn mul(self, rhs: Homography) -> Homography {
        Homography::canonical_or_unit(self.matrix * rhs.matrix)
    }
}

/// Output of the robust estimators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomographyEstimate {
    pub homography: Homography,
    /// `true` for correspondences accepted as inliers.
    pub inliers: Vec<bool>,
    /// RMS transfer error over the inliers, in the units of the A points.
    pub residual: Real,
}

impl HomographyEstimate {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&x| x).count()
    }

    pub fn outlier_indices(&self) -> Vec<usize> {
        self.inliers
            .iter()
            .enumerate()
            .filter_map(|(i, &inl)| (!inl).then_some(i))
            .collect()
    }
}

/// High-level entry point for homography estimation.
#[derive(Debug, Clone, Copy)]
pub struct HomographySolver;

impl HomographySolver {
    /// Direct Linear Transform from at least 4 correspondences.
    ///
    /// With `normalize` both sets are Hartley-normalized before solving and the
    /// result is de-normalized. Collinear sets and design matrices whose two
    /// smallest singular values are not separated yield
    /// [`HomographyError::DegenerateConfiguration`].
    pub fn dlt(
        points_b: &[Pt2],
        points_a: &[Pt2],
        normalize: bool,
    ) -> Result<Homography, HomographyError> {
        dlt::dlt(points_b, points_a, None, normalize, dlt::DEFAULT_SINGULAR_THRESHOLD)
    }

    /// DLT with per-correspondence weights in `[0, 1]`.
    pub fn dlt_weighted(
        points_b: &[Pt2],
        points_a: &[Pt2],
        weights: &[Real],
        normalize: bool,
    ) -> Result<Homography, HomographyError> {
        dlt::dlt(
            points_b,
            points_a,
            Some(weights),
            normalize,
            dlt::DEFAULT_SINGULAR_THRESHOLD,
        )
    }

    /// Closed-form estimate with an explicit planar / non-planar scene assumption.
    ///
    /// Planar scenes need 4 correspondences. Non-planar scenes need 8 and
    /// return the homography induced by the plane through the first three
    /// non-collinear points.
    pub fn hlm(
        points_b: &[Pt2],
        points_a: &[Pt2],
        is_planar: bool,
    ) -> Result<Homography, HomographyError> {
        if is_planar {
            hlm::hlm_planar(points_b, points_a)
        } else {
            hlm::hlm_non_planar(points_b, points_a)
        }
    }

    /// RANSAC over minimal 4-point DLT fits.
    pub fn ransac(
        points_b: &[Pt2],
        points_a: &[Pt2],
        opts: &RansacHomographyOptions,
    ) -> Result<HomographyEstimate, HomographyError> {
        ransac::ransac_homography(points_b, points_a, opts)
    }

    /// Iteratively re-weighted DLT with M-estimator weights.
    pub fn robust(
        points_b: &[Pt2],
        points_a: &[Pt2],
        opts: &RobustHomographyOptions,
    ) -> Result<HomographyEstimate, HomographyError> {
        robust::robust_homography(points_b, points_a, opts)
    }
}

pub(crate) fn check_pairs(
    points_b: &[Pt2],
    points_a: &[Pt2],
    required: usize,
) -> Result<(), HomographyError> {
    if points_b.len() != points_a.len() {
        return Err(HomographyError::LengthMismatch {
            b: points_b.len(),
            a: points_a.len(),
        });
    }
    if points_b.len() < required {
        return Err(HomographyError::NotEnoughPoints {
            required,
            got: points_b.len(),
        });
    }
    Ok(())
}
