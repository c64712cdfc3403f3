//! The set of model faces and their visibility bookkeeping.

use crate::clipping::ClippingFlags;
use crate::error::TrackerError;
use crate::face::KltFace;
use vision_tracking_core::{Iso3, PinholeCamera, Real};

/// Outcome of a visibility pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilityUpdate {
    /// Faces visible after the pass.
    pub visible: usize,
    /// At least one face appeared or disappeared.
    pub changed: bool,
}

/// Ordered collection of faces; the order is the model order and fixes the
/// stacking order of the pose refinement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceSet {
    faces: Vec<KltFace>,
}

impl FaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn push(&mut self, face: KltFace) -> usize {
        self.faces.push(face);
        self.faces.len() - 1
    }

    pub fn clear(&mut self) {
        self.faces.clear();
    }

    pub fn get(&self, i: usize) -> Result<&KltFace, TrackerError> {
        let len = self.faces.len();
        self.faces
            .get(i)
            .ok_or(TrackerError::OutOfRange { index: i, len })
    }

    pub fn get_mut(&mut self, i: usize) -> Result<&mut KltFace, TrackerError> {
        let len = self.faces.len();
        self.faces
            .get_mut(i)
            .ok_or(TrackerError::OutOfRange { index: i, len })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KltFace> {
        self.faces.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, KltFace> {
        self.faces.iter_mut()
    }

    pub fn as_mut_slice(&mut self) -> &mut [KltFace] {
        &mut self.faces
    }

    pub fn visible_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_visible()).count()
    }

    /// Indices of visible faces holding at least `min_points` current features.
    pub fn usable(&self, min_points: usize) -> Vec<usize> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_visible() && f.has_enough_points(min_points))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn set_clipping(&mut self, flags: ClippingFlags) {
        for f in &mut self.faces {
            f.polygon_mut().set_clipping(flags);
        }
    }

    pub fn set_near_distance(&mut self, d: Real) {
        for f in &mut self.faces {
            f.polygon_mut().set_near_distance(d);
        }
    }

    pub fn set_far_distance(&mut self, d: Real) {
        for f in &mut self.faces {
            f.polygon_mut().set_far_distance(d);
        }
    }

    /// Update visibility at pose `c_m_o` with hysteresis.
    ///
    /// A visible face stays visible until its view angle exceeds `disappear`
    /// or none of its corners projects inside the `width x height` image; a
    /// hidden face appears once its angle drops below `appear` with at least
    /// one corner inside the image. The clipped boundary of every face is
    /// refreshed at the same pose.
    pub fn set_visible(
        &mut self,
        camera: &PinholeCamera,
        width: u32,
        height: u32,
        c_m_o: &Iso3,
        appear: Real,
        disappear: Real,
    ) -> VisibilityUpdate {
        let mut update = VisibilityUpdate::default();
        for face in &mut self.faces {
            let was_visible = face.is_visible();
            let poly = face.polygon_mut();
            let threshold = if was_visible { disappear } else { appear };
            let by_angle = poly.is_visible(c_m_o, threshold, false);
            let in_image = poly.nb_corners_inside_image(&camera.intrinsics, width, height) > 0;
            let now_visible = by_angle && in_image;
            poly.set_visible(now_visible);
            poly.compute_clipped_roi(camera);

            if now_visible != was_visible {
                log::debug!(
                    "face {:?} {}",
                    poly.index(),
                    if now_visible { "appeared" } else { "disappeared" }
                );
                update.changed = true;
            }
            if now_visible {
                update.visible += 1;
            }
        }
        update
    }
}

impl<'a> IntoIterator for &'a FaceSet {
    type Item = &'a KltFace;
    type IntoIter = std::slice::Iter<'a, KltFace>;

    fn into_iter(self) -> Self::IntoIter {
        self.faces.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::Polygon;
    use nalgebra::{Translation3, UnitQuaternion};
    use vision_tracking_core::{PinholeIntrinsics, Pt3};

    fn single_face() -> FaceSet {
        let mut set = FaceSet::new();
        set.push(KltFace::new(
            Polygon::new(vec![
                Pt3::new(-0.1, -0.1, 0.0),
                Pt3::new(-0.1, 0.1, 0.0),
                Pt3::new(0.1, 0.1, 0.0),
                Pt3::new(0.1, -0.1, 0.0),
            ])
            .with_index(0),
        ));
        set
    }

    fn pose_deg(angle: Real) -> Iso3 {
        Iso3::from_parts(
            Translation3::new(0.0, 0.0, 1.0),
            UnitQuaternion::from_euler_angles(0.0, angle.to_radians(), 0.0),
        )
    }

    #[test]
    fn visibility_uses_hysteresis() {
        let cam = PinholeCamera::new(PinholeIntrinsics::new(800.0, 800.0, 320.0, 240.0));
        let (appear, disappear) = (65_f64.to_radians(), 75_f64.to_radians());
        let mut set = single_face();

        // Hidden at 70 deg: above the appear threshold.
        let u = set.set_visible(&cam, 640, 480, &pose_deg(70.0), appear, disappear);
        assert_eq!(u, VisibilityUpdate { visible: 0, changed: false });

        let u = set.set_visible(&cam, 640, 480, &pose_deg(30.0), appear, disappear);
        assert_eq!(u, VisibilityUpdate { visible: 1, changed: true });

        // Still visible at 70 deg: below the disappear threshold.
        let u = set.set_visible(&cam, 640, 480, &pose_deg(70.0), appear, disappear);
        assert_eq!(u, VisibilityUpdate { visible: 1, changed: false });

        let u = set.set_visible(&cam, 640, 480, &pose_deg(80.0), appear, disappear);
        assert_eq!(u, VisibilityUpdate { visible: 0, changed: true });
    }

    #[test]
    fn face_outside_image_disappears() {
        let cam = PinholeCamera::new(PinholeIntrinsics::new(800.0, 800.0, 320.0, 240.0));
        let mut set = single_face();
        set.set_visible(&cam, 640, 480, &pose_deg(0.0), 1.0, 1.2);
        assert_eq!(set.visible_count(), 1);

        let far_left = Iso3::from_parts(Translation3::new(-5.0, 0.0, 1.0), UnitQuaternion::identity());
        let u = set.set_visible(&cam, 640, 480, &far_left, 1.0, 1.2);
        assert!(u.changed);
        assert_eq!(set.visible_count(), 0);
    }

    #[test]
    fn out_of_range_face_is_an_error() {
        let set = single_face();
        assert!(set.get(0).is_ok());
        assert!(matches!(set.get(3), Err(TrackerError::OutOfRange { index: 3, len: 1 })));
    }
}
