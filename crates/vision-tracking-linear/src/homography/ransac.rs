use super::dlt::{dlt, DEFAULT_SINGULAR_THRESHOLD};
use super::{check_pairs, Homography, HomographyError, HomographyEstimate};
use crate::math::{are_collinear, triangle_shape_ratio};
use serde::{Deserialize, Serialize};
use vision_tracking_core::{ransac, Estimator, Pt2, RansacOptions, Real};

/// Options for [`HomographySolver::ransac`](super::HomographySolver::ransac).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacHomographyOptions {
    /// Stop as soon as a hypothesis has this many inliers.
    pub consensus: usize,
    /// Inlier threshold on the transfer error, in pixels of the A set.
    pub pixel_threshold: Real,
    /// Hartley-normalize before every DLT.
    pub normalize: bool,
    pub max_iters: usize,
    pub confidence: Real,
    pub seed: u64,
    /// Samples with a triangle shape ratio below this are rejected as degenerate.
    pub min_shape_ratio: Real,
    /// Relative gap required between the two smallest DLT singular values.
    pub singular_threshold: Real,
}

impl Default for RansacHomographyOptions {
    fn default() -> Self {
        Self {
            consensus: usize::MAX,
            pixel_threshold: 2.0,
            normalize: true,
            max_iters: 2000,
            confidence: 0.99,
            seed: 1_234_567,
            min_shape_ratio: 1e-3,
            singular_threshold: DEFAULT_SINGULAR_THRESHOLD,
        }
    }
}

struct Correspondence {
    b: Pt2,
    a: Pt2,
}

struct HomographyEstimator<'o> {
    opts: &'o RansacHomographyOptions,
}

impl HomographyEstimator<'_> {
    fn fit_subset(&self, data: &[Correspondence], idx: &[usize]) -> Option<Homography> {
        let b: Vec<Pt2> = idx.iter().map(|&i| data[i].b).collect();
        let a: Vec<Pt2> = idx.iter().map(|&i| data[i].a).collect();
        dlt(&b, &a, None, self.opts.normalize, self.opts.singular_threshold).ok()
    }
}

impl Estimator for HomographyEstimator<'_> {
    type Datum = Correspondence;
    type Model = Homography;

    const MIN_SAMPLES: usize = 4;

    fn fit(&self, data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model> {
        self.fit_subset(data, sample_indices)
    }

    fn residual(&self, model: &Self::Model, datum: &Self::Datum) -> Real {
        model.transfer_error(&datum.b, &datum.a)
    }

    /// Any triplet of the sample close to collinear, in either image, is degenerate.
    fn is_degenerate(&self, data: &[Self::Datum], idx: &[usize]) -> bool {
        const TRIPLETS: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
        TRIPLETS.iter().any(|t| {
            let [i, j, k] = t.map(|s| idx[s]);
            let rb = triangle_shape_ratio(&data[i].b, &data[j].b, &data[k].b);
            let ra = triangle_shape_ratio(&data[i].a, &data[j].a, &data[k].a);
            rb.abs() < self.opts.min_shape_ratio || ra.abs() < self.opts.min_shape_ratio
        })
    }

    fn refit(&self, data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        self.fit_subset(data, inliers)
    }
}

pub(crate) fn ransac_homography(
    points_b: &[Pt2],
    points_a: &[Pt2],
    opts: &RansacHomographyOptions,
) -> Result<HomographyEstimate, HomographyError> {
    check_pairs(points_b, points_a, 4)?;
    if are_collinear(points_b) || are_collinear(points_a) {
        return Err(HomographyError::DegenerateConfiguration("collinear points"));
    }

    let data: Vec<Correspondence> = points_b
        .iter()
        .zip(points_a.iter())
        .map(|(&b, &a)| Correspondence { b, a })
        .collect();

    let engine = RansacOptions {
        max_iters: opts.max_iters,
        thresh: opts.pixel_threshold,
        min_inliers: 4,
        stop_inliers: Some(opts.consensus.max(4)),
        confidence: opts.confidence,
        seed: opts.seed,
        refit_on_inliers: true,
    };
    let estimator = HomographyEstimator { opts };
    let res = ransac(&estimator, &data, &engine);

    let Some(homography) = res.model else {
        if res.iters > 0 && res.degenerate_samples == res.iters {
            return Err(HomographyError::DegenerateConfiguration(
                "every sample was degenerate",
            ));
        }
        return Err(HomographyError::NoConsensus);
    };

    let mut inliers = vec![false; data.len()];
    for &i in &res.inliers {
        inliers[i] = true;
    }
    log::debug!(
        "ransac homography: {}/{} inliers after {} iterations",
        res.inliers.len(),
        data.len(),
        res.iters
    );

    Ok(HomographyEstimate {
        homography,
        inliers,
        residual: res.inlier_rms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collinear_input_is_degenerate() {
        let b: Vec<Pt2> = (0..4).map(|i| Pt2::new(i as Real, i as Real)).collect();
        let a = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        let res = ransac_homography(&b, &a, &RansacHomographyOptions::default());
        assert!(matches!(res, Err(HomographyError::DegenerateConfiguration(_))));
    }

    #[test]
    fn sample_with_collinear_triplet_is_degenerate() {
        let opts = RansacHomographyOptions::default();
        let est = HomographyEstimator { opts: &opts };
        let pts = [
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(2.0, 0.0),
            Pt2::new(0.0, 1.0),
        ];
        let data: Vec<Correspondence> = pts.iter().map(|&p| Correspondence { b: p, a: p }).collect();
        assert!(est.is_degenerate(&data, &[0, 1, 2, 3]));

        let square = [
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        let data: Vec<Correspondence> =
            square.iter().map(|&p| Correspondence { b: p, a: p }).collect();
        assert!(!est.is_degenerate(&data, &[0, 1, 2, 3]));
    }
}
