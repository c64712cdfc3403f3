//! Core math and geometry primitives for `vision-tracking`.
//!
//! This crate provides the foundational building blocks used by the other
//! crates in the workspace:
//!
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, and friends),
//! - pinhole intrinsics and the field-of-view frustum used for clipping,
//! - planes and the SE(3) exponential map for twists,
//! - a deterministic, model-agnostic RANSAC engine,
//! - robust M-estimators with MAD scale estimation.
//!
//! # Modules
//!
//! - \[`math`\]: basic type aliases and homogeneous helpers.
//! - \[`camera`\]: intrinsics, `K`/`K^-1`, frustum normals.
//! - \[`geometry`\]: planes, twists, pose distances.
//! - \[`ransac`\]: generic robust estimation loop.
//! - \[`robust`\]: Tukey/Huber/Cauchy weights.
//! - \[`synthetic`\]: deterministic synthetic data helpers (tests/examples).
//!
//! # Example
//!
//! ```
//! use vision_tracking_core::{PinholeCamera, PinholeIntrinsics, Pt3};
//!
//! let mut cam = PinholeCamera::new(PinholeIntrinsics::new(800.0, 800.0, 320.0, 240.0));
//! cam.compute_fov(640, 480);
//! let px = cam.intrinsics.project(&Pt3::new(0.1, 0.2, 1.0));
//! assert!(px.is_some());
//! ```

/// Linear algebra type aliases and helpers.
mod math;
/// Pinhole camera intrinsics and frustum.
mod camera;
/// Planes and rigid motions.
mod geometry;
/// Generic RANSAC engine and traits.
mod ransac;
/// Robust M-estimators.
mod robust;
/// Deterministic synthetic data generation helpers.
///
/// Public to allow usage in tests and examples across the workspace; not
/// intended for production use.
pub mod synthetic;

pub use camera::*;
pub use geometry::*;
pub use math::*;
pub use ransac::*;
pub use robust::*;
