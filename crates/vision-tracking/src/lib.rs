//! High-level entry crate for the `vision-tracking` library.
//!
//! This crate provides a unified API for planar tracking:
//! - Homography estimation from point correspondences (DLT, HLM, RANSAC,
//!   robust re-weighting)
//! - Face visibility and frustum clipping for polyhedral models
//! - Model-based KLT pose tracking with virtual visual servoing
//!
//! # Quick Start
//!
//! ```
//! # fn main() -> anyhow::Result<()> {
//! use vision_tracking::prelude::*;
//!
//! let b = [Pt2::new(0.0, 0.0), Pt2::new(1.0, 0.0), Pt2::new(1.0, 1.0), Pt2::new(0.0, 1.0)];
//! let a = [Pt2::new(2.0, 1.0), Pt2::new(4.0, 1.0), Pt2::new(4.0, 3.0), Pt2::new(2.0, 3.0)];
//! let h = HomographySolver::dlt(&b, &a, true)?;
//! assert!(h.transfer_error(&b[2], &a[2]) < 1e-9);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`core`] - Math types, pinhole camera, planes, RANSAC, M-estimators
//! - [`linear`] - Homography estimators
//! - [`mbt`] - Model-based tracker
//! - [`synthetic`] - Synthetic data and a synthetic feature tracker

// ═══════════════════════════════════════════════════════════════════════════════
// Foundation Crates
// ═══════════════════════════════════════════════════════════════════════════════

/// Core math types, camera model, and robust estimation primitives.
///
/// Re-exports everything from `vision_tracking_core`.
pub mod core {
    pub use vision_tracking_core::*;
}

/// Closed-form and robust homography estimation.
///
/// Re-exports everything from `vision_tracking_linear`.
pub mod linear {
    pub use vision_tracking_linear::*;
}

/// Model-based KLT tracking.
///
/// Re-exports everything from `vision_tracking_mbt`.
pub mod mbt {
    pub use vision_tracking_mbt::*;
}

/// Deterministic synthetic data for tests and examples.
pub mod synthetic {
    pub use vision_tracking_core::synthetic::*;
    pub use vision_tracking_mbt::synthetic::{
        SyntheticFeatureTracker, SyntheticFrame, SyntheticTrackerError,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Re-exports (Top-Level)
// ═══════════════════════════════════════════════════════════════════════════════

// Core types
pub use vision_tracking_core::{
    exp_twist, Iso3, PinholeCamera, PinholeIntrinsics, Plane, Pt2, Pt3, Real, RobustKernel, Vec3,
    Vec6,
};

// Homography estimation
pub use vision_tracking_linear::{
    Homography, HomographyError, HomographyEstimate, HomographySolver, RansacHomographyOptions,
    RobustHomographyOptions,
};

// Tracking
pub use vision_tracking_mbt::{
    ClipKind, ClippingFlags, FeatureMap, FeatureTracker, FrameReport, KltTrackerConfig,
    MbtKltTracker, Polygon, TrackerError, TrackerState,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude (Quick Start)
// ═══════════════════════════════════════════════════════════════════════════════

/// Convenient re-exports for common use cases.
///
/// ```no_run
/// use vision_tracking::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::{Iso3, PinholeCamera, PinholeIntrinsics, Pt2, Pt3};

    // Homography estimation
    pub use crate::{
        Homography, HomographyError, HomographySolver, RansacHomographyOptions,
        RobustHomographyOptions,
    };

    // Tracking
    pub use crate::{
        ClippingFlags, FeatureTracker, KltTrackerConfig, MbtKltTracker, TrackerError,
        TrackerState,
    };
}
