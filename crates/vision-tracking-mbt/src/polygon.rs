//! Planar model faces: visibility test and frustum clipping.
//!
//! A [`Polygon`] stores its corners in the object frame. Every frame the
//! corners are moved into the camera frame with [`Polygon::change_frame`];
//! visibility and the clipped boundary are derived from those camera-frame
//! corners and nothing else, so no history leaks between frames.

use crate::clipping::{ClipKind, ClippingFlags};
use crate::error::TrackerError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use vision_tracking_core::{FieldOfView, Iso3, PinholeCamera, PinholeIntrinsics, Pt2, Pt3, Real, Vec3};

/// Default near clipping distance (metres).
pub const DEFAULT_NEAR_DISTANCE: Real = 0.001;
/// Default far clipping distance (metres).
pub const DEFAULT_FAR_DISTANCE: Real = 100.0;

/// Margin above the visibility angle within which a hidden face is flagged as appearing.
const APPEARING_MARGIN: Real = PI / 180.0;

/// Camera-frame boundary point produced by clipping, tagged with the planes
/// that moved it (empty when it is an original corner).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClippedPoint {
    pub point: Pt3,
    pub flags: ClippingFlags,
}

impl ClippedPoint {
    fn corner(point: Pt3) -> Self {
        Self {
            point,
            flags: ClippingFlags::NONE,
        }
    }
}

/// Pixel bounding box of a region of interest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiBounds {
    pub u_min: Real,
    pub u_max: Real,
    pub v_min: Real,
    pub v_max: Real,
}

/// A planar face (or a line when it has two corners) of the tracked model.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    index: Option<usize>,
    corners: Vec<Pt3>,
    camera_corners: Vec<Pt3>,
    visible: bool,
    appearing: bool,
    clipping: ClippingFlags,
    near_distance: Real,
    far_distance: Real,
    clipped: Vec<ClippedPoint>,
    corners_inside_prev: usize,
}

impl Polygon {
    /// Polygon over object-frame `corners`.
    ///
    /// The camera-frame corners start equal to the object-frame ones until
    /// [`Polygon::change_frame`] is called.
    pub fn new(corners: Vec<Pt3>) -> Self {
        Self {
            index: None,
            camera_corners: corners.clone(),
            corners,
            visible: false,
            appearing: false,
            clipping: ClippingFlags::NONE,
            near_distance: DEFAULT_NEAR_DISTANCE,
            far_distance: DEFAULT_FAR_DISTANCE,
            clipped: Vec::new(),
            corners_inside_prev: 0,
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }

    pub fn len(&self) -> usize {
        self.corners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }

    /// Object-frame corners.
    pub fn corners(&self) -> &[Pt3] {
        &self.corners
    }

    /// Corners expressed in the camera frame of the last [`Polygon::change_frame`].
    pub fn camera_corners(&self) -> &[Pt3] {
        &self.camera_corners
    }

    /// Bounds-checked object-frame corner access.
    pub fn corner(&self, i: usize) -> Result<&Pt3, TrackerError> {
        self.corners.get(i).ok_or(TrackerError::OutOfRange {
            index: i,
            len: self.corners.len(),
        })
    }

    /// Bounds-checked mutable object-frame corner access.
    pub fn corner_mut(&mut self, i: usize) -> Result<&mut Pt3, TrackerError> {
        let len = self.corners.len();
        self.corners
            .get_mut(i)
            .ok_or(TrackerError::OutOfRange { index: i, len })
    }

    pub fn push_corner(&mut self, p: Pt3) {
        self.corners.push(p);
        self.camera_corners.push(p);
    }

    /// Move the corners into the camera frame given `c_m_o` (object to camera).
    pub fn change_frame(&mut self, c_m_o: &Iso3) {
        self.camera_corners.clear();
        self.camera_corners
            .extend(self.corners.iter().map(|p| c_m_o * p));
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn appearing(&self) -> bool {
        self.appearing
    }

    /// Angle between the face normal and the direction from the face centroid
    /// to the camera centre, using the current camera-frame corners.
    ///
    /// Returns `None` for lines and for faces whose normal or centroid
    /// direction is undefined.
    pub fn view_angle(&self) -> Option<Real> {
        if self.camera_corners.len() <= 2 {
            return None;
        }
        let p = &self.camera_corners;
        let e1 = p[1] - p[0];
        let e2 = p[2] - p[1];
        let normal = e1.cross(&e2);
        let centroid = p.iter().fold(Vec3::zeros(), |acc, q| acc + q.coords) / p.len() as Real;
        let (nn, cn) = (normal.norm(), centroid.norm());
        if !(nn > Real::EPSILON && cn > Real::EPSILON) {
            return None;
        }
        let to_camera = -centroid / cn;
        Some(to_camera.dot(&(normal / nn)).clamp(-1.0, 1.0).acos())
    }

    /// Visibility test at pose `c_m_o` with threshold `max_angle` (radians).
    ///
    /// With `wrap`, faces seen from the back (`pi - angle < max_angle`) also
    /// count as visible. A face within one degree above the threshold is
    /// flagged as appearing. Lines are always visible.
    pub fn is_visible(&mut self, c_m_o: &Iso3, max_angle: Real, wrap: bool) -> bool {
        if self.corners.len() <= 2 {
            self.visible = true;
            self.appearing = false;
            return true;
        }
        self.change_frame(c_m_o);
        let Some(angle) = self.view_angle() else {
            log::debug!("face {:?}: undefined view angle, treated as hidden", self.index);
            self.visible = false;
            self.appearing = false;
            return false;
        };

        let within = |limit: Real| angle < limit || (wrap && PI - angle < limit);
        if within(max_angle) {
            self.visible = true;
            self.appearing = false;
        } else {
            self.visible = false;
            self.appearing = within(max_angle + APPEARING_MARGIN);
        }
        self.visible
    }

    pub fn clipping(&self) -> ClippingFlags {
        self.clipping
    }

    pub fn set_clipping(&mut self, flags: ClippingFlags) {
        self.clipping = flags;
    }

    pub fn near_distance(&self) -> Real {
        self.near_distance
    }

    pub fn set_near_distance(&mut self, d: Real) {
        self.near_distance = d;
    }

    pub fn far_distance(&self) -> Real {
        self.far_distance
    }

    pub fn set_far_distance(&mut self, d: Real) {
        self.far_distance = d;
    }

    /// Boundary points of the last [`Polygon::compute_clipped_roi`].
    pub fn clipped_points(&self) -> &[ClippedPoint] {
        &self.clipped
    }

    /// Clip the camera-frame boundary against the configured planes.
    ///
    /// Edges are processed in order; each surviving edge contributes its
    /// (possibly moved) first endpoint, plus its second endpoint when that one
    /// was moved by a plane. Side planes need `camera` to carry a field of
    /// view; otherwise they are skipped.
    pub fn compute_clipped_roi(&mut self, camera: &PinholeCamera) {
        self.clipped.clear();
        let fov = if self.clipping.has_fov() {
            camera.fov.as_ref()
        } else {
            None
        };

        let n = self.camera_corners.len();
        for i in 0..n {
            let p1 = self.camera_corners[i];
            let p2 = self.camera_corners[(i + 1) % n];
            if let Some((c1, c2)) = self.clip_edge(&p1, &p2, fov) {
                self.clipped.push(c1);
                if !c2.flags.is_empty() {
                    self.clipped.push(c2);
                }
                if n == 2 {
                    if c2.flags.is_empty() {
                        self.clipped.push(c2);
                    }
                    break;
                }
            }
        }
    }

    /// Clip one edge in the order near, left, right, up, down, far.
    ///
    /// Returns `None` when the edge lies entirely outside one of the planes.
    fn clip_edge(
        &self,
        p1: &Pt3,
        p2: &Pt3,
        fov: Option<&FieldOfView>,
    ) -> Option<(ClippedPoint, ClippedPoint)> {
        let mut c1 = ClippedPoint::corner(*p1);
        let mut c2 = ClippedPoint::corner(*p2);
        if self.clipping.is_empty() {
            return Some((c1, c2));
        }

        for kind in ClipKind::CLIP_ORDER {
            match kind {
                ClipKind::Near => {
                    if self.clipping.near_active() {
                        clip_depth(&mut c1, &mut c2, self.near_distance, kind)?;
                    }
                }
                ClipKind::Far => {
                    if self.clipping.contains(kind) {
                        clip_depth(&mut c1, &mut c2, self.far_distance, kind)?;
                    }
                }
                side => {
                    if !self.clipping.contains(side) {
                        continue;
                    }
                    let (Some(fov), Some(s)) = (fov, side.fov_side()) else {
                        log::debug!("field of view not computed, {side:?} clipping skipped");
                        continue;
                    };
                    clip_side(&mut c1, &mut c2, fov.normal(s), side)?;
                }
            }
        }
        Some((c1, c2))
    }

    /// Project the camera-frame corners to pixels, skipping corners behind the camera.
    pub fn roi(&self, intrinsics: &PinholeIntrinsics) -> Vec<Pt2> {
        self.camera_corners
            .iter()
            .filter_map(|p| intrinsics.project(p))
            .collect()
    }

    /// Move to `c_m_o` and project the corners.
    pub fn roi_at(&mut self, intrinsics: &PinholeIntrinsics, c_m_o: &Iso3) -> Vec<Pt2> {
        self.change_frame(c_m_o);
        self.roi(intrinsics)
    }

    /// Pixel positions of the clipped boundary with their clip tags.
    pub fn roi_clipped(&self, intrinsics: &PinholeIntrinsics) -> Vec<(Pt2, ClippingFlags)> {
        self.clipped
            .iter()
            .filter_map(|c| intrinsics.project(&c.point).map(|px| (px, c.flags)))
            .collect()
    }

    /// Move to `c_m_o`, clip, and project the clipped boundary.
    pub fn roi_clipped_at(
        &mut self,
        camera: &PinholeCamera,
        c_m_o: &Iso3,
    ) -> Vec<(Pt2, ClippingFlags)> {
        self.change_frame(c_m_o);
        self.compute_clipped_roi(camera);
        self.roi_clipped(&camera.intrinsics)
    }

    /// Boundary segments worth drawing.
    ///
    /// Consecutive clipped points that share a clip plane lie on that plane,
    /// so the segment between them is not part of the visible outline.
    pub fn drawable_segments(&self, intrinsics: &PinholeIntrinsics) -> Vec<(Pt2, Pt2)> {
        let roi = self.roi_clipped(intrinsics);
        let n = roi.len();
        if n < 2 {
            return Vec::new();
        }
        let count = if n == 2 { 1 } else { n };
        (0..count)
            .filter_map(|j| {
                let (a, fa) = roi[j];
                let (b, fb) = roi[(j + 1) % n];
                (!fa.intersects(fb)).then_some((a, b))
            })
            .collect()
    }

    /// Number of corners in front of the camera that project inside a
    /// `width x height` image.
    pub fn nb_corners_inside_image(
        &mut self,
        intrinsics: &PinholeIntrinsics,
        width: u32,
        height: u32,
    ) -> usize {
        let count = self
            .camera_corners
            .iter()
            .filter(|p| p.z > 0.0)
            .filter_map(|p| intrinsics.project(p))
            .filter(|px| inside_image(px, width, height))
            .count();
        self.corners_inside_prev = count;
        count
    }

    /// Result of the last [`Polygon::nb_corners_inside_image`] call.
    pub fn corners_inside_prev(&self) -> usize {
        self.corners_inside_prev
    }

    /// Pixel bounding box of `roi`, with negative minima clamped to zero.
    pub fn min_max_roi(roi: &[Pt2]) -> Option<RoiBounds> {
        let first = roi.first()?;
        let mut b = RoiBounds {
            u_min: first.x,
            u_max: first.x,
            v_min: first.y,
            v_max: first.y,
        };
        for p in &roi[1..] {
            b.u_min = b.u_min.min(p.x);
            b.u_max = b.u_max.max(p.x);
            b.v_min = b.v_min.min(p.y);
            b.v_max = b.v_max.max(p.y);
        }
        b.u_min = b.u_min.max(0.0);
        b.v_min = b.v_min.max(0.0);
        b.u_max = b.u_max.max(0.0);
        b.v_max = b.v_max.max(0.0);
        Some(b)
    }

    /// True unless fewer than three corners (and fewer than 70 % of them)
    /// land inside the image.
    pub fn roi_inside_image(width: u32, height: u32, corners: &[Pt2]) -> bool {
        let inside = corners
            .iter()
            .filter(|p| inside_image(p, width, height))
            .count();
        !(inside < 3 && (inside as Real) < 0.7 * corners.len() as Real)
    }
}

fn inside_image(px: &Pt2, width: u32, height: u32) -> bool {
    px.x >= 0.0 && px.y >= 0.0 && px.x < width as Real && px.y < height as Real
}

/// Clip against a constant-depth plane. Near keeps `z >= depth`, far keeps `z <= depth`.
fn clip_depth(c1: &mut ClippedPoint, c2: &mut ClippedPoint, depth: Real, kind: ClipKind) -> Option<()> {
    let outside = |z: Real| match kind {
        ClipKind::Far => z > depth,
        _ => z < depth,
    };
    let (o1, o2) = (outside(c1.point.z), outside(c2.point.z));
    match (o1, o2) {
        (true, true) => None,
        (false, false) => Some(()),
        _ => {
            let (z1, z2) = (c1.point.z, c2.point.z);
            let t = (depth - z1) / (z2 - z1);
            let mut p = c1.point + (c2.point - c1.point) * t;
            p.z = depth;
            let target = if o1 { c1 } else { c2 };
            target.point = p;
            target.flags.insert(kind);
            Some(())
        }
    }
}

/// Clip against a frustum side plane through the optical centre with outward normal `n`.
fn clip_side(c1: &mut ClippedPoint, c2: &mut ClippedPoint, n: &Vec3, kind: ClipKind) -> Option<()> {
    let beta = |p: &Pt3| {
        let len = p.coords.norm();
        if len <= Real::EPSILON {
            PI / 2.0
        } else {
            (p.coords.dot(n) / len).clamp(-1.0, 1.0).acos()
        }
    };
    let (o1, o2) = (beta(&c1.point) < PI / 2.0, beta(&c2.point) < PI / 2.0);
    match (o1, o2) {
        (true, true) => None,
        (false, false) => Some(()),
        _ => {
            let dir = c2.point - c1.point;
            let denom = n.dot(&dir);
            if denom.abs() <= Real::EPSILON {
                return Some(());
            }
            let t = -n.dot(&c1.point.coords) / denom;
            let p = c1.point + dir * t;
            let target = if o1 { c1 } else { c2 };
            target.point = p;
            target.flags.insert(kind);
            Some(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion};

    fn square_facing_camera() -> Polygon {
        // Outward normal along -Z, i.e. towards a camera sitting at the origin
        // once the square is pushed to positive depth.
        Polygon::new(vec![
            Pt3::new(-0.1, -0.1, 0.0),
            Pt3::new(-0.1, 0.1, 0.0),
            Pt3::new(0.1, 0.1, 0.0),
            Pt3::new(0.1, -0.1, 0.0),
        ])
    }

    fn pose(angle_y: Real) -> Iso3 {
        Iso3::from_parts(
            Translation3::new(0.0, 0.0, 1.0),
            UnitQuaternion::from_euler_angles(0.0, angle_y, 0.0),
        )
    }

    #[test]
    fn visible_when_facing_and_hidden_when_edge_on() {
        let mut poly = square_facing_camera();
        let max = PI / 4.0;
        assert!(poly.is_visible(&pose(0.0), max, false));
        assert!(!poly.appearing());
        assert!(!poly.is_visible(&pose(PI / 2.0), max, false));
        assert!(!poly.appearing());
    }

    #[test]
    fn appearing_only_within_one_degree_of_threshold() {
        let mut poly = square_facing_camera();
        let max = PI / 4.0;

        assert!(!poly.is_visible(&pose(max + 0.5_f64.to_radians()), max, false));
        assert!(poly.appearing(), "half a degree past the limit should be appearing");

        assert!(!poly.is_visible(&pose(max + 2.0_f64.to_radians()), max, false));
        assert!(!poly.appearing(), "two degrees past the limit is not appearing");

        assert!(poly.is_visible(&pose(max - 0.5_f64.to_radians()), max, false));
        assert!(!poly.appearing());
    }

    #[test]
    fn wrap_accepts_back_facing_faces() {
        let mut poly = square_facing_camera();
        let back = pose(PI);
        assert!(!poly.is_visible(&back, PI / 4.0, false));
        assert!(poly.is_visible(&back, PI / 4.0, true));
    }

    #[test]
    fn lines_are_always_visible() {
        let mut line = Polygon::new(vec![Pt3::new(0.0, 0.0, 0.0), Pt3::new(1.0, 0.0, 0.0)]);
        assert!(line.is_visible(&pose(PI / 2.0), 0.1, false));
        assert!(!line.appearing());
    }

    #[test]
    fn corner_access_is_bounds_checked() {
        let poly = square_facing_camera();
        assert!(poly.corner(3).is_ok());
        assert!(matches!(
            poly.corner(4),
            Err(TrackerError::OutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn corners_pushed_and_edited_follow_change_frame() {
        let mut poly = Polygon::new(vec![Pt3::new(-0.1, -0.1, 0.0), Pt3::new(-0.1, 0.1, 0.0)]);
        poly.push_corner(Pt3::new(0.1, 0.1, 0.0));
        poly.push_corner(Pt3::new(0.3, -0.1, 0.0));
        assert_eq!(poly.len(), 4);
        assert_eq!(poly.camera_corners().len(), 4);

        *poly.corner_mut(3).unwrap() = Pt3::new(0.1, -0.1, 0.0);
        assert_eq!(poly.corner(3).unwrap(), &Pt3::new(0.1, -0.1, 0.0));
        assert!(matches!(
            poly.corner_mut(4),
            Err(TrackerError::OutOfRange { index: 4, len: 4 })
        ));

        poly.change_frame(&pose(0.0));
        let moved = poly.camera_corners()[3];
        assert!((moved - Pt3::new(0.1, -0.1, 1.0)).norm() < 1e-12);
        assert!(poly.is_visible(&pose(0.0), PI / 4.0, false));
    }

    #[test]
    fn near_clipping_moves_exactly_one_endpoint() {
        let near = 0.5;
        let mut line = Polygon::new(vec![Pt3::new(0.0, 0.0, 0.2), Pt3::new(0.0, 0.2, 1.0)]);
        line.set_clipping(ClippingFlags::NEAR);
        line.set_near_distance(near);
        line.change_frame(&Iso3::identity());
        line.compute_clipped_roi(&PinholeCamera::new(PinholeIntrinsics::new(
            800.0, 800.0, 320.0, 240.0,
        )));

        let clipped = line.clipped_points();
        assert_eq!(clipped.len(), 2, "clipped line {clipped:?}");
        let tagged: Vec<_> = clipped.iter().filter(|c| !c.flags.is_empty()).collect();
        assert_eq!(tagged.len(), 1);
        assert!(tagged[0].flags.contains(ClipKind::Near));
        assert!((tagged[0].point.z - near).abs() < 1e-12, "z = {}", tagged[0].point.z);
        let untouched = clipped.iter().find(|c| c.flags.is_empty());
        assert!(untouched.is_some_and(|c| (c.point.z - 1.0).abs() < 1e-12));
    }

    #[test]
    fn segment_beyond_far_plane_is_dropped() {
        let mut line = Polygon::new(vec![Pt3::new(0.0, 0.0, 5.0), Pt3::new(0.1, 0.0, 6.0)]);
        line.set_clipping(ClippingFlags::FAR);
        line.set_far_distance(2.0);
        line.change_frame(&Iso3::identity());
        line.compute_clipped_roi(&PinholeCamera::new(PinholeIntrinsics::new(
            800.0, 800.0, 320.0, 240.0,
        )));
        assert!(line.clipped_points().is_empty());
    }

    #[test]
    fn side_clipping_without_fov_is_skipped() {
        let mut poly = square_facing_camera();
        poly.set_clipping(ClippingFlags::LEFT);
        poly.change_frame(&pose(0.0));
        poly.compute_clipped_roi(&PinholeCamera::new(PinholeIntrinsics::new(
            800.0, 800.0, 320.0, 240.0,
        )));
        assert_eq!(poly.clipped_points().len(), 4);
        assert!(poly.clipped_points().iter().all(|c| c.flags.is_empty()));
    }

    #[test]
    fn left_clipping_lands_on_image_border() {
        let mut cam = PinholeCamera::new(PinholeIntrinsics::new(800.0, 800.0, 320.0, 240.0));
        cam.compute_fov(640, 480);
        // Wide square: its left half leaves the image at depth 1.
        let mut poly = Polygon::new(vec![
            Pt3::new(-1.0, -0.1, 0.0),
            Pt3::new(-1.0, 0.1, 0.0),
            Pt3::new(0.1, 0.1, 0.0),
            Pt3::new(0.1, -0.1, 0.0),
        ]);
        poly.set_clipping(ClippingFlags::LEFT);
        poly.change_frame(&pose(0.0));
        poly.compute_clipped_roi(&cam);

        let roi = poly.roi_clipped(&cam.intrinsics);
        let left: Vec<_> = roi.iter().filter(|(_, f)| f.contains(ClipKind::Left)).collect();
        assert_eq!(left.len(), 2, "roi {roi:?}");
        for (px, _) in left {
            assert!(px.x.abs() < 1e-6, "clipped point not on left border: {px:?}");
        }
        // The clipped points share the left plane, so that segment is not drawn.
        assert_eq!(poly.drawable_segments(&cam.intrinsics).len(), roi.len() - 1);
    }

    #[test]
    fn roi_helpers_count_corners_in_image() {
        let intr = PinholeIntrinsics::new(800.0, 800.0, 320.0, 240.0);
        let mut poly = square_facing_camera();
        let roi = poly.roi_at(&intr, &pose(0.0));
        assert_eq!(roi.len(), 4);
        assert_eq!(poly.nb_corners_inside_image(&intr, 640, 480), 4);
        assert!(Polygon::roi_inside_image(640, 480, &roi));

        let bounds = Polygon::min_max_roi(&roi);
        assert!(
            bounds.is_some_and(|b| (b.u_min - 240.0).abs() < 1e-9 && (b.u_max - 400.0).abs() < 1e-9),
            "bounds {bounds:?}"
        );

        let outside = [Pt2::new(-5.0, 1.0), Pt2::new(700.0, 1.0), Pt2::new(1.0, 1.0)];
        assert!(!Polygon::roi_inside_image(640, 480, &outside));
    }
}
