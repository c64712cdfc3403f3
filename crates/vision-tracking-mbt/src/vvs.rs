//! Virtual visual servoing: robust iterative pose refinement over KLT faces.
//!
//! Each iteration stacks, for every active face, the residual between the
//! homography-predicted feature positions and the tracked ones together with
//! the point interaction matrix. Rows are re-weighted by an M-estimator and
//! the incremental transform is updated with the control law
//! `v = -lambda * pinv(J^T J) * J^T r`, `ct_T_c0 <- exp(-v) * ct_T_c0`.

use crate::config::VvsOptions;
use crate::error::TrackerError;
use crate::face::KltFace;
use nalgebra::{DMatrix, DVector};
use vision_tracking_core::{exp_twist, Iso3, MEstimator, Mat6, PinholeIntrinsics, Real, Vec6};

/// Singular value cut-off of the normal-equation pseudo-inverse.
const PINV_EPS: Real = 1e-16;

/// Result of one refinement run.
#[derive(Debug, Clone, PartialEq)]
pub struct VvsOutcome {
    /// Refined transform from the reference camera frame to the current one.
    pub ct_t_c0: Iso3,
    pub iterations: usize,
    /// Weighted squared residual at the start of every iteration.
    pub residual_history: Vec<Real>,
    /// Final robust weights, two per feature, stacked in face then id order.
    pub weights: Vec<Real>,
    /// The residual change dropped below the tolerance before the iteration cap.
    pub converged: bool,
    /// Pose covariance in twist coordinates, when requested.
    pub covariance: Option<Mat6>,
}

/// Refine `ct_t_c0` using the faces listed in `active`.
///
/// `min_points` is the minimal number of features over all active faces;
/// below it (or below four, whichever is larger) the call fails with
/// [`TrackerError::InsufficientData`] before iterating.
pub fn refine(
    faces: &mut [KltFace],
    active: &[usize],
    ct_t_c0: &Iso3,
    intrinsics: &PinholeIntrinsics,
    options: &VvsOptions,
    min_points: usize,
) -> Result<VvsOutcome, TrackerError> {
    let mut points = 0;
    for &i in active {
        let len = faces.len();
        points += faces
            .get(i)
            .ok_or(TrackerError::OutOfRange { index: i, len })?
            .current_count();
    }
    if points < min_points.max(4) {
        return Err(TrackerError::InsufficientData {
            points,
            faces: active.len(),
        });
    }

    let rows = 2 * points;
    let estimator = MEstimator::new(options.kernel, options.robust_threshold_px / intrinsics.fx);
    let mut ct = *ct_t_c0;
    let mut residuals: Vec<Real> = Vec::with_capacity(rows);
    let mut jac_rows: Vec<[Real; 6]> = Vec::with_capacity(rows);
    let mut weights: Vec<Real> = Vec::with_capacity(rows);
    let mut history = Vec::new();
    let mut jw = DMatrix::<Real>::zeros(rows, 6);
    let mut rw = DVector::<Real>::zeros(rows);
    let mut previous: Option<Real> = None;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < options.max_iter {
        residuals.clear();
        jac_rows.clear();
        for &i in active {
            let face = &mut faces[i];
            face.compute_homography(&ct, intrinsics)?;
            face.interaction_and_residual(&ct, intrinsics, &mut residuals, &mut jac_rows)?;
        }

        estimator.weights(&residuals, &mut weights);
        for (r, ((res, row), w)) in residuals.iter().zip(&jac_rows).zip(&weights).enumerate() {
            rw[r] = w * res;
            for c in 0..6 {
                jw[(r, c)] = w * row[c];
            }
        }

        let s = rw.norm_squared();
        history.push(s);
        if let Some(prev) = previous {
            if (s - prev).abs() < options.tolerance {
                converged = true;
                break;
            }
        }
        previous = Some(s);

        let jtj = jw.transpose() * &jw;
        let jtr = jw.transpose() * &rw;
        let pinv = jtj
            .pseudo_inverse(PINV_EPS)
            .map_err(|_| TrackerError::NumericalDegeneracy("pose normal equations"))?;
        let step = pinv * jtr * (-options.lambda);
        let v = Vec6::from_iterator(step.iter().copied());
        ct = exp_twist(&(-v)) * ct;
        iterations += 1;
    }

    let covariance = if options.compute_covariance {
        Some(covariance(&jw, &rw)?)
    } else {
        None
    };

    log::debug!(
        "vvs: {} points on {} faces, {} iterations, residual {:.3e}, converged={}",
        points,
        active.len(),
        iterations,
        history.last().copied().unwrap_or(0.0),
        converged
    );

    Ok(VvsOutcome {
        ct_t_c0: ct,
        iterations,
        residual_history: history,
        weights,
        converged,
        covariance,
    })
}

/// `sigma^2 * pinv(J^T J)` with `sigma^2` the weighted residual variance.
fn covariance(jw: &DMatrix<Real>, rw: &DVector<Real>) -> Result<Mat6, TrackerError> {
    let dof = jw.nrows().saturating_sub(6).max(1) as Real;
    let sigma2 = rw.norm_squared() / dof;
    let jtj = jw.transpose() * jw;
    let pinv = jtj
        .pseudo_inverse(PINV_EPS)
        .map_err(|_| TrackerError::NumericalDegeneracy("covariance"))?;
    Ok(Mat6::from_iterator(pinv.iter().map(|v| v * sigma2)))
}
