//! Model-based KLT tracking of rigid polyhedral objects.
//!
//! The tracker follows the 6-DoF pose of an object made of planar faces. An
//! external point tracker follows 2D features between frames; this crate
//! associates them with the faces, predicts their motion through the
//! plane-induced homography of each face, and refines the pose by virtual
//! visual servoing with robust weights.
//!
//! # Modules
//!
//! - \[`clipping`\]: clip planes and the [`ClippingFlags`] set.
//! - \[`polygon`\]: face visibility and frustum clipping.
//! - \[`face`\] / \[`faces`\]: features per face, visibility hysteresis.
//! - \[`mask`\]: pixel mask for feature seeding.
//! - \[`feature_tracker`\]: the [`FeatureTracker`] interface.
//! - \[`vvs`\]: pose refinement.
//! - \[`tracker`\]: the [`MbtKltTracker`] state machine.
//! - \[`synthetic`\]: a deterministic feature tracker for tests.
//!
//! # Example
//!
//! ```
//! use nalgebra::{Translation3, UnitQuaternion};
//! use vision_tracking_core::synthetic::{box_faces, face_points};
//! use vision_tracking_core::{Iso3, PinholeCamera, PinholeIntrinsics};
//! use vision_tracking_mbt::synthetic::{SyntheticFeatureTracker, SyntheticFrame};
//! use vision_tracking_mbt::{KltTrackerConfig, MbtKltTracker, TrackerState};
//!
//! # fn main() -> anyhow::Result<()> {
//! let intrinsics = PinholeIntrinsics::new(800.0, 800.0, 320.0, 240.0);
//! let mut points = SyntheticFeatureTracker::new(intrinsics, 640, 480);
//! for face in box_faces(0.1) {
//!     points.add_face_points(&face, &face_points(&face, 5, 3, 0.2)?);
//! }
//!
//! let mut tracker = MbtKltTracker::new(
//!     PinholeCamera::new(intrinsics),
//!     points,
//!     KltTrackerConfig::default(),
//! );
//! tracker.load_model(box_faces(0.1))?;
//!
//! let pose = Iso3::from_parts(
//!     Translation3::new(0.0, 0.0, 0.6),
//!     UnitQuaternion::from_euler_angles(0.0, 45f64.to_radians(), 0.0),
//! );
//! tracker.init_from_pose(&SyntheticFrame::at(pose), &pose)?;
//! let report = tracker.track(&SyntheticFrame::at(pose))?;
//! assert_eq!(tracker.state(), TrackerState::Tracking);
//! assert!(report.points_used >= 20);
//! # Ok(())
//! # }
//! ```

pub mod clipping;
mod config;
mod error;
pub mod face;
pub mod faces;
pub mod feature_tracker;
pub mod mask;
pub mod polygon;
/// Deterministic feature tracker over synthetic models.
///
/// Public to allow usage in tests and examples across the workspace; not
/// intended for production use.
pub mod synthetic;
mod tracker;
pub mod vvs;

pub use clipping::{ClipKind, ClippingFlags};
pub use config::{ClippingConfig, KltTrackerConfig, VvsOptions};
pub use error::TrackerError;
pub use face::KltFace;
pub use faces::{FaceSet, VisibilityUpdate};
pub use feature_tracker::{FeatureId, FeatureMap, FeatureTracker, KltSettings};
pub use mask::FeatureMask;
pub use polygon::{ClippedPoint, Polygon, RoiBounds};
pub use tracker::{FrameReport, MbtKltTracker, TrackerState};
pub use vvs::VvsOutcome;
