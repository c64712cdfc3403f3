//! Model-based KLT tracker: the per-frame state machine.
//!
//! ```text
//! Uninitialized --init_from_pose--> Initializing --> Tracking
//! Tracking --too few survivors / visibility change--> Reinitializing --> Tracking
//! Tracking --divide by zero--> Reinitializing (next frame)
//! Tracking --not enough points--> Failed
//! ```
//!
//! Every frame either commits a complete new state (faces, features, poses)
//! or leaves the previous one untouched.

use crate::clipping::{ClipKind, ClippingFlags};
use crate::config::KltTrackerConfig;
use crate::error::TrackerError;
use crate::face::KltFace;
use crate::faces::{FaceSet, VisibilityUpdate};
use crate::feature_tracker::{FeatureMap, FeatureTracker};
use crate::mask::FeatureMask;
use crate::polygon::{Polygon, DEFAULT_FAR_DISTANCE, DEFAULT_NEAR_DISTANCE};
use crate::vvs;
use serde::{Deserialize, Serialize};
use vision_tracking_core::{Iso3, Mat6, PinholeCamera, Pt3, Real};

/// Lifecycle state of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Uninitialized,
    Initializing,
    Tracking,
    Reinitializing,
    Failed,
}

/// Summary of one [`MbtKltTracker::track`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// VVS iterations run (0 when the frame only reinitialised).
    pub iterations: usize,
    pub converged: bool,
    pub residual_history: Vec<Real>,
    /// Features used by the pose update.
    pub points_used: usize,
    /// Faces used by the pose update.
    pub faces_used: usize,
    pub outliers_removed: usize,
    /// Surviving fraction of the features seeded at the last reinitialisation.
    pub survivor_ratio: Real,
    pub visibility_changed: bool,
    /// Features were re-seeded during this call.
    pub reinitialized: bool,
}

impl FrameReport {
    fn reinit_only() -> Self {
        Self {
            iterations: 0,
            converged: false,
            residual_history: Vec::new(),
            points_used: 0,
            faces_used: 0,
            outliers_removed: 0,
            survivor_ratio: 1.0,
            visibility_changed: false,
            reinitialized: true,
        }
    }
}

/// Tracker of a rigid polyhedral object from KLT features on its faces.
///
/// `T` is the frame-to-frame point tracker; the model-based part only sees
/// its [`FeatureMap`] outputs.
pub struct MbtKltTracker<T: FeatureTracker> {
    config: KltTrackerConfig,
    camera: PinholeCamera,
    feature_tracker: T,
    faces: FaceSet,
    state: TrackerState,
    c_m_o: Iso3,
    c0_m_o: Iso3,
    ct_t_c0: Iso3,
    clipping: ClippingFlags,
    near_distance: Real,
    far_distance: Real,
    covariance: Option<Mat6>,
    features: FeatureMap,
}

impl<T: FeatureTracker> MbtKltTracker<T> {
    pub fn new(camera: PinholeCamera, mut feature_tracker: T, config: KltTrackerConfig) -> Self {
        feature_tracker.apply_settings(&config.klt);
        let clipping = config.clipping_flags();
        let near_distance = config.clipping.near.unwrap_or(DEFAULT_NEAR_DISTANCE);
        let far_distance = config.clipping.far.unwrap_or(DEFAULT_FAR_DISTANCE);
        Self {
            config,
            camera,
            feature_tracker,
            faces: FaceSet::new(),
            state: TrackerState::Uninitialized,
            c_m_o: Iso3::identity(),
            c0_m_o: Iso3::identity(),
            ct_t_c0: Iso3::identity(),
            clipping,
            near_distance,
            far_distance,
            covariance: None,
            features: FeatureMap::new(),
        }
    }

    pub fn config(&self) -> &KltTrackerConfig {
        &self.config
    }

    pub fn camera(&self) -> &PinholeCamera {
        &self.camera
    }

    pub fn feature_tracker(&self) -> &T {
        &self.feature_tracker
    }

    pub fn feature_tracker_mut(&mut self) -> &mut T {
        &mut self.feature_tracker
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Last accepted object-to-camera pose.
    pub fn pose(&self) -> &Iso3 {
        &self.c_m_o
    }

    /// Pose captured at the last (re)initialisation.
    pub fn reference_pose(&self) -> &Iso3 {
        &self.c0_m_o
    }

    /// Motion of the camera since the last (re)initialisation.
    pub fn incremental_transform(&self) -> &Iso3 {
        &self.ct_t_c0
    }

    pub fn faces(&self) -> &FaceSet {
        &self.faces
    }

    /// Covariance of the last pose, when enabled in the VVS options.
    pub fn covariance(&self) -> Option<&Mat6> {
        self.covariance.as_ref()
    }

    /// Features currently associated with a visible face, by id.
    pub fn features(&self) -> FeatureMap {
        self.faces
            .iter()
            .filter(|f| f.is_visible())
            .flat_map(|f| f.current_points().iter().map(|(id, px)| (*id, *px)))
            .collect()
    }

    /// Raw output of the last feature-tracker call.
    pub fn raw_features(&self) -> &FeatureMap {
        &self.features
    }

    pub fn nb_features(&self) -> usize {
        self.faces
            .iter()
            .filter(|f| f.is_visible())
            .map(KltFace::current_count)
            .sum()
    }

    /// Add a face from its object-frame corners and return its index.
    ///
    /// Lines (two corners or fewer) cannot carry features and are rejected.
    pub fn add_face(&mut self, corners: Vec<Pt3>) -> Result<usize, TrackerError> {
        if corners.len() <= 2 {
            return Err(TrackerError::InvalidInput(format!(
                "a face needs at least 3 corners, got {}",
                corners.len()
            )));
        }
        let mut polygon = Polygon::new(corners).with_index(self.faces.len());
        polygon.set_clipping(self.clipping);
        polygon.set_near_distance(self.near_distance);
        polygon.set_far_distance(self.far_distance);
        Ok(self.faces.push(KltFace::new(polygon)))
    }

    /// Replace the model. Lines are skipped; returns the number of faces kept.
    pub fn load_model<I>(&mut self, faces: I) -> Result<usize, TrackerError>
    where
        I: IntoIterator<Item = Vec<Pt3>>,
    {
        self.reset();
        for (i, corners) in faces.into_iter().enumerate() {
            if corners.len() <= 2 {
                log::warn!("model entry {i} has {} corners, skipped", corners.len());
                continue;
            }
            self.add_face(corners)?;
        }
        if self.faces.is_empty() {
            return Err(TrackerError::InvalidInput("model has no usable face".into()));
        }
        log::info!("loaded model with {} faces", self.faces.len());
        Ok(self.faces.len())
    }

    pub fn clipping(&self) -> ClippingFlags {
        self.clipping
    }

    pub fn set_clipping(&mut self, flags: ClippingFlags) {
        self.clipping = flags;
        self.faces.set_clipping(flags);
    }

    /// Enable near clipping at `d`. Rejected (with a warning) when negative or
    /// not below an active far distance.
    pub fn set_near_clipping_distance(&mut self, d: Real) {
        if self.clipping.contains(ClipKind::Far) && d >= self.far_distance {
            log::warn!(
                "near clipping distance {d} is not below far distance {}, ignored",
                self.far_distance
            );
        } else if d < 0.0 {
            log::warn!("near clipping distance {d} is negative, ignored");
        } else {
            self.clipping |= ClippingFlags::NEAR;
            self.near_distance = d;
            self.faces.set_clipping(self.clipping);
            self.faces.set_near_distance(d);
        }
    }

    /// Enable far clipping at `d`. Rejected (with a warning) when negative or
    /// not above an active near distance.
    pub fn set_far_clipping_distance(&mut self, d: Real) {
        if self.clipping.contains(ClipKind::Near) && d <= self.near_distance {
            log::warn!(
                "far clipping distance {d} is not above near distance {}, ignored",
                self.near_distance
            );
        } else if d < 0.0 {
            log::warn!("far clipping distance {d} is negative, ignored");
        } else {
            self.clipping |= ClippingFlags::FAR;
            self.far_distance = d;
            self.faces.set_clipping(self.clipping);
            self.faces.set_far_distance(d);
        }
    }

    pub fn near_clipping_distance(&self) -> Real {
        self.near_distance
    }

    pub fn far_clipping_distance(&self) -> Real {
        self.far_distance
    }

    /// Start tracking on `image` from the known pose `c_m_o`.
    pub fn init_from_pose(&mut self, image: &T::Image, c_m_o: &Iso3) -> Result<(), TrackerError> {
        if self.faces.is_empty() {
            return Err(TrackerError::NotInitialized("no model loaded"));
        }
        self.state = TrackerState::Initializing;
        let mut faces = self.faces.clone();
        for f in faces.iter_mut() {
            f.polygon_mut().set_visible(false);
        }
        match self.seed(image, faces, c_m_o) {
            Ok(_) => {
                self.state = TrackerState::Tracking;
                log::info!("tracking initialised with {} features", self.nb_features());
                Ok(())
            }
            Err(e) => {
                self.state = TrackerState::Failed;
                Err(e)
            }
        }
    }

    /// Track one frame and refine the pose.
    pub fn track(&mut self, image: &T::Image) -> Result<FrameReport, TrackerError> {
        match self.state {
            TrackerState::Uninitialized | TrackerState::Initializing => {
                return Err(TrackerError::NotInitialized("call init_from_pose first"));
            }
            TrackerState::Failed => {
                return Err(TrackerError::NotInitialized(
                    "tracking failed, reinitialise with a new pose",
                ));
            }
            TrackerState::Reinitializing => {
                let pose = self.c_m_o;
                return match self.seed(image, self.faces.clone(), &pose) {
                    Ok(_) => {
                        self.state = TrackerState::Tracking;
                        Ok(FrameReport::reinit_only())
                    }
                    Err(e) => {
                        self.state = TrackerState::Failed;
                        Err(e)
                    }
                };
            }
            TrackerState::Tracking => {}
        }

        let tracked = self
            .feature_tracker
            .track(image)
            .map_err(|e| TrackerError::FeatureTracker(Box::new(e)))?;

        let mut faces = self.faces.clone();
        for f in faces.iter_mut().filter(|f| f.is_visible()) {
            f.update_current(&tracked);
        }
        let active = faces.usable(self.config.min_points_per_face);
        let intrinsics = self.camera.intrinsics;

        let outcome = match vvs::refine(
            faces.as_mut_slice(),
            &active,
            &self.ct_t_c0,
            &intrinsics,
            &self.config.vvs,
            self.config.min_total_points,
        ) {
            Ok(o) => o,
            Err(e @ TrackerError::NumericalDegeneracy(_)) => {
                log::warn!("pose update failed ({e}), reinitialising on next frame");
                self.state = TrackerState::Reinitializing;
                return Err(e);
            }
            Err(e) => {
                log::warn!("pose update failed: {e}");
                self.state = TrackerState::Failed;
                return Err(e);
            }
        };

        let mut offset = 0;
        let mut removed = 0;
        let mut current = 0usize;
        for &i in &active {
            let face = faces.get_mut(i)?;
            let n = 2 * face.current_count();
            let w = outcome.weights.get(offset..offset + n).ok_or_else(|| {
                TrackerError::InvalidInput("robust weights do not match features".into())
            })?;
            removed += face
                .remove_outliers(w, self.config.threshold_outlier)?
                .len();
            offset += n;
            current += face.current_count();
        }
        // Visible faces starved below the per-face minimum still count as seeded.
        let initial: usize = faces
            .iter()
            .filter(|f| f.is_visible())
            .map(KltFace::initial_count)
            .sum();

        let c_m_o = outcome.ct_t_c0 * self.c0_m_o;
        let (width, height) = self.feature_tracker.image_size(image);
        self.camera_fov(width, height);
        let VisibilityUpdate { changed, .. } = faces.set_visible(
            &self.camera,
            width,
            height,
            &c_m_o,
            self.config.angle_appear(),
            self.config.angle_disappear(),
        );

        let ratio = if initial == 0 {
            0.0
        } else {
            current as Real / initial as Real
        };

        self.faces = faces;
        self.features = tracked;
        self.c_m_o = c_m_o;
        self.ct_t_c0 = outcome.ct_t_c0;
        self.covariance = outcome.covariance;

        let mut report = FrameReport {
            iterations: outcome.iterations,
            converged: outcome.converged,
            residual_history: outcome.residual_history,
            points_used: outcome.weights.len() / 2,
            faces_used: active.len(),
            outliers_removed: removed,
            survivor_ratio: ratio,
            visibility_changed: changed,
            reinitialized: false,
        };

        if changed || ratio < self.config.percent_good {
            log::info!(
                "reinitialising: survivors {:.2} (min {:.2}), visibility changed: {}",
                ratio,
                self.config.percent_good,
                changed
            );
            self.state = TrackerState::Reinitializing;
            if let Err(e) = self.seed(image, self.faces.clone(), &c_m_o) {
                self.state = TrackerState::Failed;
                return Err(e);
            }
            self.state = TrackerState::Tracking;
            report.reinitialized = true;
        }
        Ok(report)
    }

    /// Move the tracker to a known pose `c_m_o` on `image`.
    ///
    /// When visibility is unchanged, the feature tracker is given the
    /// homography-predicted position of every feature as its next initial
    /// guess; otherwise the features are re-seeded at the new pose.
    pub fn set_pose(&mut self, image: &T::Image, c_m_o: &Iso3) -> Result<(), TrackerError> {
        match self.state {
            TrackerState::Uninitialized | TrackerState::Failed => {
                return self.init_from_pose(image, c_m_o);
            }
            TrackerState::Initializing => {
                return Err(TrackerError::NotInitialized("initialisation in progress"));
            }
            TrackerState::Tracking | TrackerState::Reinitializing => {}
        }

        let (width, height) = self.feature_tracker.image_size(image);
        self.camera_fov(width, height);
        let mut faces = self.faces.clone();
        let update = faces.set_visible(
            &self.camera,
            width,
            height,
            c_m_o,
            self.config.angle_appear(),
            self.config.angle_disappear(),
        );
        if update.changed || self.state == TrackerState::Reinitializing {
            log::info!("visibility changed at the new pose, reinitialising");
            self.state = TrackerState::Reinitializing;
            return match self.seed(image, faces, c_m_o) {
                Ok(_) => {
                    self.state = TrackerState::Tracking;
                    Ok(())
                }
                Err(e) => {
                    self.state = TrackerState::Failed;
                    Err(e)
                }
            };
        }

        let ct_t_c0 = c_m_o * self.c0_m_o.inverse();
        let intrinsics = self.camera.intrinsics;
        let mut guess = FeatureMap::new();
        for face in faces.iter_mut().filter(|f| f.is_visible()) {
            if face.current_count() == 0 {
                continue;
            }
            let h = face.compute_homography(&ct_t_c0, &intrinsics)?;
            for id in face.current_points().keys() {
                if let Some(p0) = face.init_points().get(id) {
                    guess.insert(*id, h.project(p0)?);
                }
            }
        }
        self.feature_tracker.set_initial_guess(&guess);
        self.faces = faces;
        self.c_m_o = *c_m_o;
        self.ct_t_c0 = ct_t_c0;
        Ok(())
    }

    /// Forget the model and all tracking state.
    pub fn reset(&mut self) {
        self.faces.clear();
        self.features.clear();
        self.state = TrackerState::Uninitialized;
        self.c_m_o = Iso3::identity();
        self.c0_m_o = Iso3::identity();
        self.ct_t_c0 = Iso3::identity();
        self.covariance = None;
    }

    /// Fails when fewer than the configured minimum of features are tracked.
    pub fn test_tracking(&self) -> Result<(), TrackerError> {
        let points = self.nb_features();
        if points < self.config.min_tracked_points {
            return Err(TrackerError::InsufficientData {
                points,
                faces: self.faces.visible_count(),
            });
        }
        Ok(())
    }

    fn camera_fov(&mut self, width: u32, height: u32) {
        if self.clipping.has_fov() {
            self.camera.compute_fov(width, height);
        }
    }

    /// Re-seed features on every visible face at `c_m_o` and make it the
    /// reference pose. Commits `faces` only on success.
    fn seed(
        &mut self,
        image: &T::Image,
        mut faces: FaceSet,
        c_m_o: &Iso3,
    ) -> Result<usize, TrackerError> {
        let (width, height) = self.feature_tracker.image_size(image);
        self.camera_fov(width, height);
        faces.set_visible(
            &self.camera,
            width,
            height,
            c_m_o,
            self.config.angle_appear(),
            self.config.angle_disappear(),
        );

        let intrinsics = self.camera.intrinsics;
        let mut mask = FeatureMask::new(width, height);
        for f in faces.iter().filter(|f| f.is_visible()) {
            f.update_mask(&mut mask, self.config.mask_border, &intrinsics);
        }
        let features = self
            .feature_tracker
            .init_tracking(image, &mask)
            .map_err(|e| TrackerError::FeatureTracker(Box::new(e)))?;

        let mut total = 0;
        for f in faces.iter_mut() {
            if f.is_visible() {
                total += f.init(&features, &self.camera, c_m_o)?;
            } else {
                f.clear();
            }
        }

        log::debug!(
            "seeded {total} features on {} visible faces",
            faces.visible_count()
        );
        self.faces = faces;
        self.features = features;
        self.c_m_o = *c_m_o;
        self.c0_m_o = *c_m_o;
        self.ct_t_c0 = Iso3::identity();
        self.covariance = None;
        Ok(total)
    }
}
