//! Deterministic point tracker over a synthetic convex model.
//!
//! Public so integration tests and examples can drive
//! [`crate::MbtKltTracker`] without images; not meant for production use.

use crate::feature_tracker::{FeatureId, FeatureMap, FeatureTracker, KltSettings};
use crate::mask::FeatureMask;
use std::collections::BTreeMap;
use thiserror::Error;
use vision_tracking_core::{Iso3, PinholeIntrinsics, Pt2, Pt3, Real, Vec2, Vec3};

/// A rendered frame: the true object pose plus simulated tracking defects.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticFrame {
    /// True object-to-camera pose.
    pub pose: Iso3,
    /// Permanently lose every feature whose id is a multiple of this.
    pub drop_every: Option<u64>,
    /// Permanently lose these features.
    pub drop_ids: Vec<FeatureId>,
    /// Displace every feature whose id is a multiple of this by `outlier_offset`.
    pub outlier_every: Option<u64>,
    pub outlier_offset: Vec2,
    /// Lose all features.
    pub drop_all: bool,
}

impl SyntheticFrame {
    pub fn at(pose: Iso3) -> Self {
        Self {
            pose,
            drop_every: None,
            drop_ids: Vec::new(),
            outlier_every: None,
            outlier_offset: Vec2::new(25.0, -18.0),
            drop_all: false,
        }
    }

    pub fn dropping_every(mut self, k: u64) -> Self {
        self.drop_every = Some(k);
        self
    }

    pub fn dropping<I: IntoIterator<Item = FeatureId>>(mut self, ids: I) -> Self {
        self.drop_ids.extend(ids);
        self
    }

    pub fn with_outliers_every(mut self, k: u64) -> Self {
        self.outlier_every = Some(k);
        self
    }

    pub fn dropping_all(mut self) -> Self {
        self.drop_all = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum SyntheticTrackerError {
    #[error("zero-sized image")]
    EmptyImage,
}

/// Object point with the outward normal of its face.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ModelPoint {
    point: Pt3,
    normal: Vec3,
}

/// Feature tracker that "sees" model points directly.
///
/// A point is observable when it projects inside the image and its face is
/// front-facing, which is exact occlusion handling for convex models.
#[derive(Debug, Clone)]
pub struct SyntheticFeatureTracker {
    intrinsics: PinholeIntrinsics,
    width: u32,
    height: u32,
    points: Vec<ModelPoint>,
    tracked: BTreeMap<FeatureId, usize>,
    next_id: FeatureId,
    settings: KltSettings,
}

impl SyntheticFeatureTracker {
    pub fn new(intrinsics: PinholeIntrinsics, width: u32, height: u32) -> Self {
        Self {
            intrinsics,
            width,
            height,
            points: Vec::new(),
            tracked: BTreeMap::new(),
            next_id: 0,
            settings: KltSettings::default(),
        }
    }

    /// Add `points` lying on the face with `corners` (outward counter-clockwise winding).
    pub fn add_face_points(&mut self, corners: &[Pt3], points: &[Pt3]) {
        let normal = if corners.len() >= 3 {
            (corners[1] - corners[0])
                .cross(&(corners[2] - corners[1]))
                .try_normalize(Real::EPSILON)
                .unwrap_or_else(Vec3::zeros)
        } else {
            Vec3::zeros()
        };
        self.points
            .extend(points.iter().map(|p| ModelPoint { point: *p, normal }));
    }

    pub fn settings(&self) -> &KltSettings {
        &self.settings
    }

    /// Ids currently followed.
    pub fn tracked_ids(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.tracked.keys().copied()
    }

    fn observe(&self, pose: &Iso3, m: &ModelPoint) -> Option<Pt2> {
        let p_c = pose * m.point;
        let n_c = pose.rotation * m.normal;
        if n_c.dot(&(-p_c.coords)) <= 0.0 {
            return None;
        }
        let px = self.intrinsics.project(&p_c)?;
        let inside = px.x >= 0.0
            && px.y >= 0.0
            && px.x < self.width as Real
            && px.y < self.height as Real;
        inside.then_some(px)
    }
}

impl FeatureTracker for SyntheticFeatureTracker {
    type Image = SyntheticFrame;
    type Error = SyntheticTrackerError;

    fn image_size(&self, _image: &SyntheticFrame) -> (u32, u32) {
        (self.width, self.height)
    }

    fn init_tracking(
        &mut self,
        image: &SyntheticFrame,
        mask: &FeatureMask,
    ) -> Result<FeatureMap, Self::Error> {
        if self.width == 0 || self.height == 0 {
            return Err(SyntheticTrackerError::EmptyImage);
        }
        self.tracked.clear();
        let mut out = FeatureMap::new();
        for (k, m) in self.points.iter().enumerate() {
            if self.tracked.len() >= self.settings.max_features {
                break;
            }
            let Some(px) = self.observe(&image.pose, m) else {
                continue;
            };
            if !mask.contains(&px) {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            self.tracked.insert(id, k);
            out.insert(id, px);
        }
        Ok(out)
    }

    fn track(&mut self, image: &SyntheticFrame) -> Result<FeatureMap, Self::Error> {
        if image.drop_all {
            self.tracked.clear();
        }
        if let Some(k) = image.drop_every.filter(|k| *k > 0) {
            self.tracked.retain(|id, _| id % k != 0);
        }
        self.tracked.retain(|id, _| !image.drop_ids.contains(id));

        let mut out = FeatureMap::new();
        let mut lost = Vec::new();
        for (&id, &k) in &self.tracked {
            match self.observe(&image.pose, &self.points[k]) {
                Some(mut px) => {
                    if image.outlier_every.is_some_and(|e| e > 0 && id % e == 0) {
                        px += image.outlier_offset;
                    }
                    out.insert(id, px);
                }
                None => lost.push(id),
            }
        }
        for id in lost {
            self.tracked.remove(&id);
        }
        Ok(out)
    }

    fn apply_settings(&mut self, settings: &KltSettings) {
        self.settings = settings.clone();
    }
}
