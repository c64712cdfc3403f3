//! Generic, model-agnostic RANSAC implementation.
//!
//! Implement [`Estimator`] for a model and call [`ransac`] with a slice of
//! data and some [`RansacOptions`]. Estimators take `&self`, so thresholds
//! used by the degeneracy test or by fitting can be carried as configuration.
//!
//! The loop never panics: when no hypothesis reaches the inlier floor,
//! [`ransac`] returns a [`RansacResult`] with `model == None`. The number of
//! samples rejected as degenerate is reported so callers can tell "all
//! samples degenerate" apart from "no consensus".

use crate::Real;
use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration parameters for the generic RANSAC engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacOptions {
    /// Maximum number of RANSAC iterations.
    pub max_iters: usize,
    /// Inlier residual threshold.
    pub thresh: Real,
    /// Minimum number of inliers required to accept a model.
    pub min_inliers: usize,
    /// Stop as soon as a hypothesis gathers this many inliers.
    pub stop_inliers: Option<usize>,
    /// Desired confidence level in `[0, 1]` for finding a good model.
    pub confidence: Real,
    /// Random-number generator seed (for reproducibility).
    pub seed: u64,
    /// If `true`, refit the model on all inliers before scoring.
    pub refit_on_inliers: bool,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            thresh: 2.0,
            min_inliers: 4,
            stop_inliers: None,
            confidence: 0.99,
            seed: 1_234_567,
            refit_on_inliers: true,
        }
    }
}

/// Output of a RANSAC run.
#[derive(Debug, Clone)]
pub struct RansacResult<M> {
    /// Best model found (if any).
    pub model: Option<M>,
    /// Indices of inlier data points, ascending.
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over inliers.
    pub inlier_rms: Real,
    /// Number of iterations actually performed.
    pub iters: usize,
    /// Number of samples rejected by [`Estimator::is_degenerate`].
    pub degenerate_samples: usize,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            model: None,
            inliers: Vec::new(),
            inlier_rms: Real::INFINITY,
            iters: 0,
            degenerate_samples: 0,
        }
    }
}

impl<M> RansacResult<M> {
    pub fn success(&self) -> bool {
        self.model.is_some()
    }
}

/// Generic estimator for RANSAC-like methods.
pub trait Estimator {
    type Datum;
    type Model;

    /// Minimal number of samples needed to estimate a model.
    const MIN_SAMPLES: usize;

    /// Fit a model from a subset of data indices; `None` when fitting fails.
    fn fit(&self, data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual for one datum, in the units of `opts.thresh`.
    fn residual(&self, model: &Self::Model, datum: &Self::Datum) -> Real;

    /// Degeneracy check on the sample subset. Default: never degenerate.
    fn is_degenerate(&self, _data: &[Self::Datum], _sample_indices: &[usize]) -> bool {
        false
    }

    /// Refit on the full inlier set. Default: keep the minimal-sample model.
    fn refit(&self, _data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

fn rms(vals: &[Real]) -> Real {
    if vals.is_empty() {
        return Real::INFINITY;
    }
    let ss: Real = vals.iter().map(|&v| v * v).sum();
    (ss / (vals.len() as Real)).sqrt()
}

/// Dynamic iteration bound from the current inlier ratio.
fn calculate_iterations(
    confidence: Real,
    inlier_ratio: Real,
    min_samples: usize,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }

    let denom = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }

    let n_iter = ((1.0 - confidence).ln() / denom).ceil() as usize;
    n_iter.clamp(iters_so_far, max_iters)
}

fn score<E: Estimator>(
    estimator: &E,
    model: &E::Model,
    data: &[E::Datum],
    thresh: Real,
    inliers: &mut Vec<usize>,
    residuals: &mut Vec<Real>,
) {
    inliers.clear();
    residuals.clear();
    for (i, datum) in data.iter().enumerate() {
        let r = estimator.residual(model, datum);
        if r <= thresh {
            inliers.push(i);
            residuals.push(r);
        }
    }
}

/// Run a RANSAC loop for a given [`Estimator`].
///
/// Hypotheses are ranked by inlier count, ties broken by inlier RMS.
pub fn ransac<E: Estimator>(
    estimator: &E,
    data: &[E::Datum],
    opts: &RansacOptions,
) -> RansacResult<E::Model> {
    let mut best: RansacResult<E::Model> = RansacResult::default();

    if data.len() < E::MIN_SAMPLES {
        return best;
    }

    let all_indices: Vec<usize> = (0..data.len()).collect();
    let mut sample = vec![0usize; E::MIN_SAMPLES];
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut dynamic_max_iters = opts.max_iters;

    let mut inliers = Vec::<usize>::with_capacity(data.len());
    let mut residuals = Vec::<Real>::with_capacity(data.len());
    let min_inliers = opts.min_inliers.max(E::MIN_SAMPLES);

    let mut num_iters = 0;
    while num_iters < dynamic_max_iters {
        num_iters += 1;
        all_indices
            .as_slice()
            .choose_multiple(&mut rng, E::MIN_SAMPLES)
            .enumerate()
            .for_each(|(k, &idx)| sample[k] = idx);
        sample.sort_unstable();

        if estimator.is_degenerate(data, &sample) {
            best.degenerate_samples += 1;
            continue;
        }

        let Some(mut model) = estimator.fit(data, &sample) else {
            continue;
        };

        score(estimator, &model, data, opts.thresh, &mut inliers, &mut residuals);
        if inliers.len() < min_inliers {
            continue;
        }

        if opts.refit_on_inliers {
            if let Some(refit) = estimator.refit(data, &inliers) {
                model = refit;
                score(estimator, &model, data, opts.thresh, &mut inliers, &mut residuals);
            }
        }

        let inlier_rms = rms(&residuals);
        let better = best.model.is_none()
            || inliers.len() > best.inliers.len()
            || (inliers.len() == best.inliers.len() && inlier_rms < best.inlier_rms);

        if better && inliers.len() >= min_inliers {
            best.model = Some(model);
            best.inliers = inliers.clone();
            best.inlier_rms = inlier_rms;
        }

        if let Some(stop) = opts.stop_inliers {
            if best.inliers.len() >= stop {
                break;
            }
        }

        let inlier_ratio = best.inliers.len() as Real / data.len() as Real;
        dynamic_max_iters = calculate_iterations(
            opts.confidence,
            inlier_ratio,
            E::MIN_SAMPLES,
            num_iters,
            opts.max_iters,
        );
    }

    best.iters = num_iters;
    log::debug!(
        "ransac: {} iterations, {} degenerate samples, {} inliers",
        num_iters,
        best.degenerate_samples,
        best.inliers.len()
    );
    best
}
