use thiserror::Error;
use vision_tracking_core::GeometryError;
use vision_tracking_linear::HomographyError;

/// Errors surfaced by the model-based tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Operation invoked before a model or pose was set.
    #[error("tracker not initialized: {0}")]
    NotInitialized(&'static str),
    /// Not enough tracked points to estimate a pose.
    #[error("not enough data: {points} points on {faces} usable faces")]
    InsufficientData { points: usize, faces: usize },
    /// Collinear or otherwise degenerate geometry.
    #[error("degenerate configuration: {0}")]
    DegenerateConfiguration(&'static str),
    /// Zero denominator in a projective division or depth computation.
    #[error("division by zero in {0}")]
    NumericalDegeneracy(&'static str),
    /// Bounds-checked access outside a face or model.
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
    /// Invalid configuration or model input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Failure reported by the external feature tracker.
    #[error("feature tracker failed: {0}")]
    FeatureTracker(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<GeometryError> for TrackerError {
    fn from(e: GeometryError) -> Self {
        match e {
            GeometryError::CollinearPoints => {
                TrackerError::DegenerateConfiguration("collinear face corners")
            }
            GeometryError::DivideByZero(what) => TrackerError::NumericalDegeneracy(what),
        }
    }
}

impl From<HomographyError> for TrackerError {
    fn from(e: HomographyError) -> Self {
        match e {
            HomographyError::DegenerateConfiguration(what) => {
                TrackerError::DegenerateConfiguration(what)
            }
            HomographyError::NumericalDegeneracy(what) => TrackerError::NumericalDegeneracy(what),
            HomographyError::NotEnoughPoints { got, .. } => TrackerError::InsufficientData {
                points: got,
                faces: 1,
            },
            other => TrackerError::InvalidInput(other.to_string()),
        }
    }
}
