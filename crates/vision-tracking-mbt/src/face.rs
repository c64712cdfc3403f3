//! A model face together with the features tracked on it.

use crate::error::TrackerError;
use crate::feature_tracker::{FeatureId, FeatureMap};
use crate::mask::{point_in_polygon, FeatureMask};
use crate::polygon::Polygon;
use vision_tracking_core::{Iso3, PinholeCamera, PinholeIntrinsics, Plane, Pt2, Real};
use vision_tracking_linear::Homography;

/// Face of the model with its feature sets.
///
/// Features are captured in the reference camera frame `c0` when the face is
/// (re)initialised; `init_points` keeps their pixel positions at that time and
/// `current_points` their latest tracked positions. Both maps share ids.
#[derive(Debug, Clone, PartialEq)]
pub struct KltFace {
    polygon: Polygon,
    plane_c0: Option<Plane>,
    init_points: FeatureMap,
    current_points: FeatureMap,
    initial_count: usize,
    homography: Homography,
}

impl KltFace {
    pub fn new(polygon: Polygon) -> Self {
        Self {
            polygon,
            plane_c0: None,
            init_points: FeatureMap::new(),
            current_points: FeatureMap::new(),
            initial_count: 0,
            homography: Homography::identity(),
        }
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn polygon_mut(&mut self) -> &mut Polygon {
        &mut self.polygon
    }

    pub fn is_visible(&self) -> bool {
        self.polygon.visible()
    }

    /// Face plane in the reference camera frame, once initialised.
    pub fn plane_c0(&self) -> Option<&Plane> {
        self.plane_c0.as_ref()
    }

    /// Number of points captured at the last (re)initialisation.
    pub fn initial_count(&self) -> usize {
        self.initial_count
    }

    pub fn current_count(&self) -> usize {
        self.current_points.len()
    }

    pub fn has_enough_points(&self, min_points: usize) -> bool {
        self.current_points.len() >= min_points
    }

    pub fn init_points(&self) -> &FeatureMap {
        &self.init_points
    }

    pub fn current_points(&self) -> &FeatureMap {
        &self.current_points
    }

    /// Pixel homography of the last [`KltFace::compute_homography`].
    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    /// Capture the features lying inside the face at the reference pose `c0_m_o`.
    ///
    /// Returns the number of captured features.
    pub fn init(
        &mut self,
        features: &FeatureMap,
        camera: &PinholeCamera,
        c0_m_o: &Iso3,
    ) -> Result<usize, TrackerError> {
        self.polygon.change_frame(c0_m_o);
        self.polygon.compute_clipped_roi(camera);
        let roi: Vec<Pt2> = self
            .polygon
            .roi_clipped(&camera.intrinsics)
            .into_iter()
            .map(|(px, _)| px)
            .collect();

        let corners = self.polygon.camera_corners();
        if corners.len() < 3 {
            return Err(TrackerError::DegenerateConfiguration(
                "face with fewer than 3 corners",
            ));
        }
        let plane = Plane::from_points(&corners[0], &corners[1], &corners[2])?;

        let inside: FeatureMap = features
            .iter()
            .filter(|(_, px)| point_in_polygon(px, &roi))
            .map(|(id, px)| (*id, *px))
            .collect();

        self.plane_c0 = Some(plane);
        self.initial_count = inside.len();
        self.current_points = inside.clone();
        self.init_points = inside;
        self.homography = Homography::identity();
        Ok(self.initial_count)
    }

    /// Forget every feature, e.g. when the face becomes hidden.
    pub fn clear(&mut self) {
        self.init_points.clear();
        self.current_points.clear();
        self.initial_count = 0;
        self.homography = Homography::identity();
    }

    /// Refresh current positions from the tracker output.
    ///
    /// Only features captured at initialisation are kept; features the tracker
    /// lost disappear from the current set.
    pub fn update_current(&mut self, tracked: &FeatureMap) {
        self.current_points = tracked
            .iter()
            .filter(|(id, _)| self.init_points.contains_key(*id))
            .map(|(id, px)| (*id, *px))
            .collect();
    }

    /// Drop the features whose robust weight is at or below `threshold`.
    ///
    /// `weights` holds two entries per current feature, in id order, as
    /// stacked by the pose refinement. Returns the removed ids.
    pub fn remove_outliers(
        &mut self,
        weights: &[Real],
        threshold: Real,
    ) -> Result<Vec<FeatureId>, TrackerError> {
        if weights.len() != 2 * self.current_points.len() {
            return Err(TrackerError::InvalidInput(format!(
                "expected {} weights, got {}",
                2 * self.current_points.len(),
                weights.len()
            )));
        }
        let removed: Vec<FeatureId> = self
            .current_points
            .keys()
            .zip(weights.chunks_exact(2))
            .filter(|(_, w)| w[0] <= threshold || w[1] <= threshold)
            .map(|(id, _)| *id)
            .collect();
        for id in &removed {
            self.current_points.remove(id);
            self.init_points.remove(id);
        }
        Ok(removed)
    }

    /// Pixel homography `K (R + t n^T / d) K^-1` induced by the face plane
    /// between the reference frame and the frame reached through `ct_t_c0`.
    pub fn compute_homography(
        &mut self,
        ct_t_c0: &Iso3,
        intrinsics: &PinholeIntrinsics,
    ) -> Result<Homography, TrackerError> {
        let plane = self
            .plane_c0
            .as_ref()
            .ok_or(TrackerError::NotInitialized("face plane"))?;
        let h = Homography::from_pose_plane(ct_t_c0, plane)?.to_pixel(intrinsics)?;
        self.homography = h;
        Ok(h)
    }

    /// Append two residual rows and their interaction rows per current feature.
    ///
    /// The residual is the homography prediction minus the tracked position,
    /// both in normalized coordinates. Interaction rows are the derivative of
    /// the predicted point with respect to the camera twist
    /// `(vx, vy, vz, wx, wy, wz)`, using the depth of the face plane in the
    /// current frame.
    pub fn interaction_and_residual(
        &self,
        ct_t_c0: &Iso3,
        intrinsics: &PinholeIntrinsics,
        residuals: &mut Vec<Real>,
        jacobian: &mut Vec<[Real; 6]>,
    ) -> Result<(), TrackerError> {
        let plane_ct = self
            .plane_c0
            .as_ref()
            .ok_or(TrackerError::NotInitialized("face plane"))?
            .transformed(ct_t_c0);

        for (id, p_cur) in &self.current_points {
            let p0 = self.init_points.get(id).ok_or_else(|| {
                TrackerError::InvalidInput(format!("feature {id} has no reference position"))
            })?;
            let predicted = intrinsics.pixel_to_normalized(&self.homography.project(p0)?);
            let observed = intrinsics.pixel_to_normalized(p_cur);
            let inv_z = plane_ct.inverse_depth(predicted.x, predicted.y)?;

            let (x, y) = (predicted.x, predicted.y);
            residuals.push(x - observed.x);
            residuals.push(y - observed.y);
            jacobian.push([-inv_z, 0.0, x * inv_z, x * y, -(1.0 + x * x), y]);
            jacobian.push([0.0, -inv_z, y * inv_z, 1.0 + y * y, -x * y, -x]);
        }
        Ok(())
    }

    /// Mark the face interior in `mask`, `border` pixels away from its edges.
    ///
    /// Uses the clipped boundary of the last clipping pass.
    pub fn update_mask(
        &self,
        mask: &mut FeatureMask,
        border: u32,
        intrinsics: &PinholeIntrinsics,
    ) {
        let roi: Vec<Pt2> = self
            .polygon
            .roi_clipped(intrinsics)
            .into_iter()
            .map(|(px, _)| px)
            .collect();
        mask.fill_polygon(&roi, border);
    }
}
