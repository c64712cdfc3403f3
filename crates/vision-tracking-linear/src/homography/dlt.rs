//! Direct Linear Transform.
//!
//! Each correspondence contributes the two independent rows of
//! `x_a x (H x_b) = 0`; the solution is the right singular vector of the
//! smallest singular value. The rows are written for homogeneous inputs so
//! the same solver serves canonical projective coordinates in the HLM path.

use super::{check_pairs, Homography, HomographyError};
use crate::math::{are_collinear, mat3_from_slice, normalize_points_2d, null_space};
use nalgebra::DMatrix;
use vision_tracking_core::{to_homogeneous, Mat3, Pt2, Real, Vec3};

/// Relative gap required between the two smallest singular values.
pub(crate) const DEFAULT_SINGULAR_THRESHOLD: Real = 1e-4;

/// Solve `x_a ~ H x_b` for homogeneous points with optional row weights.
pub(crate) fn solve_homogeneous(
    b: &[Vec3],
    a: &[Vec3],
    weights: Option<&[Real]>,
    singular_threshold: Real,
) -> Result<Mat3, HomographyError> {
    let n = b.len();
    let mut design = DMatrix::<Real>::zeros(2 * n, 9);

    for (i, (xb, xa)) in b.iter().zip(a.iter()).enumerate() {
        let w = weights.map_or(1.0, |w| w[i]);
        let (u, v, s) = (xa.x, xa.y, xa.z);
        let r0 = 2 * i;
        let r1 = r0 + 1;
        for k in 0..3 {
            design[(r0, 3 + k)] = -w * s * xb[k];
            design[(r0, 6 + k)] = w * v * xb[k];
            design[(r1, k)] = w * s * xb[k];
            design[(r1, 6 + k)] = -w * u * xb[k];
        }
    }

    let (h, sv) = null_space(design).ok_or(HomographyError::SvdFailed)?;
    let largest = sv.last().copied().unwrap_or(0.0);
    if largest <= Real::EPSILON || sv[1] < singular_threshold * largest {
        log::debug!(
            "dlt: null space not isolated (s1={:.3e}, smax={:.3e})",
            sv[1],
            largest
        );
        return Err(HomographyError::DegenerateConfiguration(
            "design matrix has no isolated null vector",
        ));
    }

    let m = mat3_from_slice(h.as_slice());
    if !m.iter().all(|x| x.is_finite()) {
        return Err(HomographyError::NumericalDegeneracy("dlt solution"));
    }
    Ok(m)
}

pub(crate) fn dlt(
    points_b: &[Pt2],
    points_a: &[Pt2],
    weights: Option<&[Real]>,
    normalize: bool,
    singular_threshold: Real,
) -> Result<Homography, HomographyError> {
    check_pairs(points_b, points_a, 4)?;
    if let Some(w) = weights {
        if w.len() != points_b.len() {
            return Err(HomographyError::LengthMismatch {
                b: points_b.len(),
                a: w.len(),
            });
        }
    }
    if are_collinear(points_b) || are_collinear(points_a) {
        return Err(HomographyError::DegenerateConfiguration("collinear points"));
    }

    let m = if normalize {
        let nb = normalize_points_2d(points_b)
            .ok_or(HomographyError::DegenerateConfiguration("coincident points"))?;
        let na = normalize_points_2d(points_a)
            .ok_or(HomographyError::DegenerateConfiguration("coincident points"))?;
        let hb: Vec<Vec3> = nb.points.iter().map(to_homogeneous).collect();
        let ha: Vec<Vec3> = na.points.iter().map(to_homogeneous).collect();
        let hn = solve_homogeneous(&hb, &ha, weights, singular_threshold)?;
        na.inverse_matrix() * hn * nb.matrix()
    } else {
        let hb: Vec<Vec3> = points_b.iter().map(to_homogeneous).collect();
        let ha: Vec<Vec3> = points_a.iter().map(to_homogeneous).collect();
        solve_homogeneous(&hb, &ha, weights, singular_threshold)?
    };

    Ok(Homography::canonical_or_unit(m))
}
