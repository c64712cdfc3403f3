//! Tracker configuration.
//!
//! Every struct derives `serde` with `#[serde(default)]`, so a partial JSON
//! document only needs to name the values it changes.

use crate::clipping::ClippingFlags;
use crate::feature_tracker::KltSettings;
use serde::{Deserialize, Serialize};
use vision_tracking_core::{Real, RobustKernel};

/// Near/far distances and the clip planes applied to every face.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClippingConfig {
    /// Near clipping distance; setting it also enables near clipping.
    pub near: Option<Real>,
    /// Far clipping distance; setting it also enables far clipping.
    pub far: Option<Real>,
    pub flags: ClippingFlags,
}

/// Options of the virtual visual servoing pose refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VvsOptions {
    /// Control-law gain.
    pub lambda: Real,
    pub max_iter: usize,
    /// Stop once the weighted squared residual changes by less than this.
    pub tolerance: Real,
    /// Noise floor of the robust scale, in pixels.
    pub robust_threshold_px: Real,
    pub kernel: RobustKernel,
    /// Keep the covariance of the final estimate.
    pub compute_covariance: bool,
}

impl Default for VvsOptions {
    fn default() -> Self {
        Self {
            lambda: 0.8,
            max_iter: 200,
            tolerance: 1e-12,
            robust_threshold_px: 2.0,
            kernel: RobustKernel::Tukey,
            compute_covariance: false,
        }
    }
}

/// Configuration of [`crate::MbtKltTracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KltTrackerConfig {
    /// A hidden face becomes visible below this angle (degrees).
    pub angle_appear_deg: Real,
    /// A visible face becomes hidden above this angle (degrees).
    pub angle_disappear_deg: Real,
    /// Border (pixels) kept free of new features along face edges.
    pub mask_border: u32,
    /// Features with a robust weight at or below this are dropped.
    pub threshold_outlier: Real,
    /// Reinitialise when fewer than this fraction of the seeded points survive.
    pub percent_good: Real,
    /// Minimum points for a face to take part in the pose update.
    pub min_points_per_face: usize,
    /// Minimum total points to run the pose update.
    pub min_total_points: usize,
    /// Minimum total points for [`crate::MbtKltTracker::test_tracking`].
    pub min_tracked_points: usize,
    pub clipping: ClippingConfig,
    pub klt: KltSettings,
    pub vvs: VvsOptions,
}

impl Default for KltTrackerConfig {
    fn default() -> Self {
        Self {
            angle_appear_deg: 65.0,
            angle_disappear_deg: 75.0,
            mask_border: 5,
            threshold_outlier: 0.5,
            percent_good: 0.6,
            min_points_per_face: 4,
            min_total_points: 4,
            min_tracked_points: 10,
            clipping: ClippingConfig::default(),
            klt: KltSettings::default(),
            vvs: VvsOptions::default(),
        }
    }
}

impl KltTrackerConfig {
    pub fn angle_appear(&self) -> Real {
        self.angle_appear_deg.to_radians()
    }

    pub fn angle_disappear(&self) -> Real {
        self.angle_disappear_deg.to_radians()
    }

    /// Effective clip planes: explicit flags plus near/far when a distance is set.
    pub fn clipping_flags(&self) -> ClippingFlags {
        let mut flags = self.clipping.flags;
        if self.clipping.near.is_some() {
            flags |= ClippingFlags::NEAR;
        }
        if self.clipping.far.is_some() {
            flags |= ClippingFlags::FAR;
        }
        flags
    }
}
