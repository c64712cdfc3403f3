use super::dlt::{dlt, DEFAULT_SINGULAR_THRESHOLD};
use super::{check_pairs, Homography, HomographyError, HomographyEstimate};
use serde::{Deserialize, Serialize};
use vision_tracking_core::{MEstimator, Pt2, Real, RobustKernel};

/// Options for [`HomographySolver::robust`](super::HomographySolver::robust).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustHomographyOptions {
    /// Correspondences whose final weight falls below this are outliers.
    pub weight_threshold: Real,
    /// Number of re-weighting iterations.
    pub iterations: usize,
    /// Hartley-normalize before every weighted DLT.
    pub normalize: bool,
    pub kernel: RobustKernel,
    /// Lower bound of the residual scale, in pixels of the A set.
    pub noise_floor: Real,
    /// Relative gap required between the two smallest DLT singular values.
    pub singular_threshold: Real,
}

impl Default for RobustHomographyOptions {
    fn default() -> Self {
        Self {
            weight_threshold: 0.4,
            iterations: 4,
            normalize: true,
            kernel: RobustKernel::Tukey,
            noise_floor: 1e-6,
            singular_threshold: DEFAULT_SINGULAR_THRESHOLD,
        }
    }
}

/// Iteratively re-weighted DLT.
///
/// Starts from uniform weights, then alternates a weighted fit with a
/// re-estimation of the per-correspondence weights from transfer errors.
/// Rows of the design matrix are scaled by `sqrt(w)`.
pub(crate) fn robust_homography(
    points_b: &[Pt2],
    points_a: &[Pt2],
    opts: &RobustHomographyOptions,
) -> Result<HomographyEstimate, HomographyError> {
    check_pairs(points_b, points_a, 4)?;

    let estimator = MEstimator::new(opts.kernel, opts.noise_floor);
    let n = points_b.len();
    let mut weights = vec![1.0; n];
    let mut row_scale = vec![1.0; n];
    let mut residuals = vec![0.0; n];

    let fit = |row_scale: &[Real]| {
        dlt(
            points_b,
            points_a,
            Some(row_scale),
            opts.normalize,
            opts.singular_threshold,
        )
    };

    let mut homography = fit(&row_scale)?;
    for iter in 0..opts.iterations.max(1) {
        transfer_errors(&homography, points_b, points_a, &mut residuals);
        let sigma = estimator.weights(&residuals, &mut weights);
        for (s, w) in row_scale.iter_mut().zip(&weights) {
            *s = w.sqrt();
        }
        homography = fit(&row_scale)?;
        log::debug!(
            "robust homography iteration {}: scale {:.3e}, {} inliers",
            iter,
            sigma,
            weights.iter().filter(|&&w| w >= opts.weight_threshold).count()
        );
    }

    // Flags describe the returned model, not the one before the last fit.
    transfer_errors(&homography, points_b, points_a, &mut residuals);
    estimator.weights(&residuals, &mut weights);
    let inliers: Vec<bool> = weights.iter().map(|&w| w >= opts.weight_threshold).collect();
    let (ss, count) = points_b
        .iter()
        .zip(points_a)
        .zip(&inliers)
        .filter(|(_, inl)| **inl)
        .map(|((b, a), _)| homography.transfer_error(b, a))
        .fold((0.0, 0usize), |(ss, c), e| (ss + e * e, c + 1));
    let residual = if count > 0 {
        (ss / count as Real).sqrt()
    } else {
        Real::INFINITY
    };

    Ok(HomographyEstimate {
        homography,
        inliers,
        residual,
    })
}

fn transfer_errors(h: &Homography, points_b: &[Pt2], points_a: &[Pt2], out: &mut [Real]) {
    for (r, (b, a)) in out.iter_mut().zip(points_b.iter().zip(points_a)) {
        *r = h.transfer_error(b, a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_tracking_core::synthetic::{grid_points, homography_correspondences, PixelNoise};
    use vision_tracking_core::Mat3;

    #[test]
    fn inlier_flags_match_the_returned_homography() {
        let h = Mat3::new(1.05, -0.04, 15.0, 0.03, 0.97, -9.0, 1e-4, 2e-4, 1.0);
        let b = grid_points(Pt2::new(30.0, 30.0), 5, 4, 70.0);
        let a = homography_correspondences(&h, &b, &PixelNoise::new(5, 0.3), &[2, 13], 25.0)
            .unwrap();
        let opts = RobustHomographyOptions {
            iterations: 1,
            ..RobustHomographyOptions::default()
        };
        let est = robust_homography(&b, &a, &opts).unwrap();

        let residuals: Vec<Real> = b
            .iter()
            .zip(&a)
            .map(|(pb, pa)| est.homography.transfer_error(pb, pa))
            .collect();
        let mut weights = Vec::new();
        MEstimator::new(opts.kernel, opts.noise_floor).weights(&residuals, &mut weights);
        let expected: Vec<bool> = weights.iter().map(|&w| w >= opts.weight_threshold).collect();
        assert_eq!(est.inliers, expected);
    }
}
