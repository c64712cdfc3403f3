//! Normalized 8-point fundamental matrix.
//!
//! Used by the non-planar HLM estimator to recover the epipolar geometry
//! before extracting a plane-induced homography.

use crate::homography::HomographyError;
use crate::math::{mat3_from_slice, normalize_points_2d, null_space};
use nalgebra::DMatrix;
use vision_tracking_core::{Mat3, Pt2, Real};

/// Fundamental matrix `F` with `x_a^T F x_b = 0`, forced to rank 2.
///
/// Inputs are pixel points; Hartley normalization is applied internally.
pub fn fundamental_8point(points_b: &[Pt2], points_a: &[Pt2]) -> Result<Mat3, HomographyError> {
    crate::homography::check_pairs(points_b, points_a, 8)?;

    let nb = normalize_points_2d(points_b)
        .ok_or(HomographyError::DegenerateConfiguration("coincident points"))?;
    let na = normalize_points_2d(points_a)
        .ok_or(HomographyError::DegenerateConfiguration("coincident points"))?;

    let mut a = DMatrix::<Real>::zeros(points_b.len(), 9);
    for (i, (pb, pa)) in nb.points.iter().zip(na.points.iter()).enumerate() {
        let row = [
            pa.x * pb.x,
            pa.x * pb.y,
            pa.x,
            pa.y * pb.x,
            pa.y * pb.y,
            pa.y,
            pb.x,
            pb.y,
            1.0,
        ];
        for (c, v) in row.iter().enumerate() {
            a[(i, c)] = *v;
        }
    }

    let (f_vec, _) = null_space(a).ok_or(HomographyError::SvdFailed)?;
    let f = mat3_from_slice(f_vec.as_slice());

    // Rank-2 enforcement: zero the smallest singular value.
    let svd = f.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(HomographyError::SvdFailed),
    };
    let mut s = svd.singular_values;
    let (min_idx, _) = s
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.total_cmp(y.1))
        .ok_or(HomographyError::SvdFailed)?;
    s[min_idx] = 0.0;
    let f_rank2 = u * Mat3::from_diagonal(&s) * v_t;

    let f = na.matrix().transpose() * f_rank2 * nb.matrix();
    let norm = f.norm();
    if norm <= Real::EPSILON {
        return Err(HomographyError::NumericalDegeneracy("fundamental matrix"));
    }
    Ok(f / norm)
}
