//! Numerical helpers shared by the linear solvers.
//!
//! # Hartley normalization
//!
//! Normalizing points before DLT-style algorithms improves numerical
//! conditioning: each set is translated to its centroid and scaled so that
//! the mean distance to the centroid is `√2`.
//!
//! # Null spaces
//!
//! [`null_space`] returns the right singular vector of the smallest singular
//! value together with the full ascending spectrum, so callers can check
//! that the null space is well separated.

use nalgebra::DMatrix;
use vision_tracking_core::{Mat3, Pt2, Real, Vec2};

/// Result of Hartley normalization of one point set.
#[derive(Debug, Clone)]
pub struct Normalization {
    pub points: Vec<Pt2>,
    pub centroid: Pt2,
    pub scale: Real,
}

impl Normalization {
    /// Matrix `T` such that `p_norm = T * p` in homogeneous coordinates.
    pub fn matrix(&self) -> Mat3 {
        let s = self.scale;
        Mat3::new(
            s,
            0.0,
            -s * self.centroid.x,
            0.0,
            s,
            -s * self.centroid.y,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Closed-form `T^-1`.
    pub fn inverse_matrix(&self) -> Mat3 {
        let is = 1.0 / self.scale;
        Mat3::new(
            is,
            0.0,
            self.centroid.x,
            0.0,
            is,
            self.centroid.y,
            0.0,
            0.0,
            1.0,
        )
    }
}

/// Hartley normalization for 2D points.
///
/// Returns `None` if the input is empty or all points coincide.
///
/// # References
///
/// Hartley & Zisserman, "Multiple View Geometry in Computer Vision", 2nd ed.,
/// Algorithm 4.2 (Normalized DLT)
pub fn normalize_points_2d(points: &[Pt2]) -> Option<Normalization> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as Real;
    let sum = points.iter().fold(Vec2::zeros(), |acc, p| acc + p.coords);
    let centroid = Pt2::from(sum / n);

    let mean_dist = points.iter().map(|p| (p - centroid).norm()).sum::<Real>() / n;
    if mean_dist <= Real::EPSILON {
        return None;
    }

    let scale = Real::sqrt(2.0) / mean_dist;
    let normalized = points
        .iter()
        .map(|p| Pt2::from((p - centroid) * scale))
        .collect();

    Some(Normalization {
        points: normalized,
        centroid,
        scale,
    })
}

/// True when all points lie (numerically) on one line.
///
/// Uses the eigenvalues of the 2x2 scatter matrix: the set is collinear when
/// the smaller one vanishes relative to the larger.
pub fn are_collinear(points: &[Pt2]) -> bool {
    if points.len() < 3 {
        return true;
    }
    let n = points.len() as Real;
    let c = points.iter().fold(Vec2::zeros(), |acc, p| acc + p.coords) / n;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let d = p.coords - c;
        sxx += d.x * d.x;
        sxy += d.x * d.y;
        syy += d.y * d.y;
    }
    let tr = sxx + syy;
    let det = sxx * syy - sxy * sxy;
    if tr <= Real::EPSILON {
        return true;
    }
    let disc = (0.25 * tr * tr - det).max(0.0).sqrt();
    let l_max = 0.5 * tr + disc;
    let l_min = (0.5 * tr - disc).max(0.0);
    l_min <= 1e-12 * l_max
}

/// Twice the signed area of triangle `(a, b, c)` divided by the longest side squared.
///
/// Scale invariant; zero for collinear points.
pub fn triangle_shape_ratio(a: &Pt2, b: &Pt2, c: &Pt2) -> Real {
    let ab = b - a;
    let ac = c - a;
    let bc = c - b;
    let area2 = ab.x * ac.y - ab.y * ac.x;
    let longest = ab.norm_squared().max(ac.norm_squared()).max(bc.norm_squared());
    if longest <= Real::EPSILON {
        return 0.0;
    }
    area2 / longest
}

/// Null vector of `a` and its singular values sorted ascending.
///
/// Matrices with fewer rows than columns are zero-padded so the SVD exposes
/// the full right singular basis.
pub fn null_space(a: DMatrix<Real>) -> Option<(nalgebra::DVector<Real>, Vec<Real>)> {
    let cols = a.ncols();
    let a = if a.nrows() < cols {
        let mut pad = DMatrix::<Real>::zeros(cols, cols);
        pad.view_mut((0, 0), (a.nrows(), cols)).copy_from(&a);
        pad
    } else {
        a
    };

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let sv = svd.singular_values;
    let mut order: Vec<usize> = (0..sv.len()).collect();
    order.sort_by(|&i, &j| sv[i].total_cmp(&sv[j]));

    let null = v_t.row(order[0]).transpose();
    let sorted = order.iter().map(|&i| sv[i]).collect();
    Some((null, sorted))
}

/// Reshape a row-major 9-vector into a 3x3 matrix.
pub fn mat3_from_slice(h: &[Real]) -> Mat3 {
    Mat3::from_row_slice(&h[..9])
}
