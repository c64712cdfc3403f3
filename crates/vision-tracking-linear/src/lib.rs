//! Linear and robust homography estimation.
//!
//! The solvers here are deterministic and SVD based; the robust variants
//! either sample minimal sets (RANSAC) or re-weight all correspondences with
//! an M-estimator. All entry points return `Result<_, HomographyError>`.
//!
//! # Example
//!
//! ```
//! use vision_tracking_core::Pt2;
//! use vision_tracking_linear::HomographySolver;
//!
//! let b = [Pt2::new(0.0, 0.0), Pt2::new(1.0, 0.0), Pt2::new(1.0, 1.0), Pt2::new(0.0, 1.0)];
//! let a = [Pt2::new(0.0, 0.0), Pt2::new(2.0, 0.0), Pt2::new(2.0, 2.0), Pt2::new(0.0, 2.0)];
//! let h = HomographySolver::dlt(&b, &a, true).unwrap();
//! assert!((h.matrix()[(0, 0)] - 2.0).abs() < 1e-9);
//! ```

pub mod epipolar;
mod homography;
pub mod math;

pub use homography::*;
