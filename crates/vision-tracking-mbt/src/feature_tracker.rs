//! Interface to the external 2D point tracker.

use crate::mask::FeatureMask;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vision_tracking_core::Pt2;

/// Identity of a tracked feature, stable across frames.
pub type FeatureId = u64;

/// Pixel location of each tracked feature, ordered by id.
pub type FeatureMap = BTreeMap<FeatureId, Pt2>;

/// Parameters forwarded to the point tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KltSettings {
    /// Maximum number of features selected on (re)initialisation.
    pub max_features: usize,
    /// Side of the tracking window, in pixels.
    pub window_size: usize,
    /// Minimal accepted corner quality, relative to the best corner.
    pub quality: f64,
    /// Minimal distance between two selected features, in pixels.
    pub min_distance: f64,
    /// Harris detector free parameter.
    pub harris_k: f64,
    /// Neighbourhood size for the corner detector.
    pub block_size: usize,
    /// Number of pyramid levels; 0 disables the pyramid.
    pub pyramid_levels: usize,
}

impl Default for KltSettings {
    fn default() -> Self {
        Self {
            max_features: 10_000,
            window_size: 5,
            quality: 0.01,
            min_distance: 5.0,
            harris_k: 0.01,
            block_size: 3,
            pyramid_levels: 3,
        }
    }
}

/// A frame-to-frame point tracker.
///
/// The model-based tracker owns one instance and drives it synchronously:
/// [`FeatureTracker::init_tracking`] selects fresh features inside the mask,
/// [`FeatureTracker::track`] follows them into the next image. Lost features
/// are simply absent from the returned map.
pub trait FeatureTracker {
    type Image;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Size `(width, height)` of `image` in pixels.
    fn image_size(&self, image: &Self::Image) -> (u32, u32);

    /// Select new features on `image`, only where `mask` allows.
    fn init_tracking(
        &mut self,
        image: &Self::Image,
        mask: &FeatureMask,
    ) -> Result<FeatureMap, Self::Error>;

    /// Track the current features into `image`.
    fn track(&mut self, image: &Self::Image) -> Result<FeatureMap, Self::Error>;

    /// Predicted positions to start the next [`FeatureTracker::track`] from.
    fn set_initial_guess(&mut self, _guess: &FeatureMap) {}

    fn apply_settings(&mut self, settings: &KltSettings);
}
