//! Error types.
//!
//! `PidError` is the typed error of the calibration/classification core.
//! `AppError` is what the binary surface reports: a message plus the process
//! exit code.

use thiserror::Error;

use crate::domain::CalibrationState;

/// Errors raised by the calibration and classification core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PidError {
    #[error("malformed momentum range: p_min={p_min} must be below p_max={p_max}")]
    MalformedRange { p_min: f64, p_max: f64 },

    #[error("insufficient data for a Gaussian fit: {nonzero_bins} non-empty bins, need at least {required}")]
    InsufficientData { nonzero_bins: usize, required: usize },

    #[error("Gaussian fit failed: {0}")]
    FitFailed(String),

    #[error("slice density evaluated before a successful fit")]
    NotFitted,

    #[error("invalid calibration state transition: {from} -> {to}")]
    InvalidTransition {
        from: CalibrationState,
        to: CalibrationState,
    },

    #[error("species model '{0}' not found in calibration file")]
    ModelNotFound(String),

    #[error("purity cut {0} is outside (0, 1]")]
    PurityOutOfRange(f64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PidError {
    /// Fit failures that downgrade a single slice instead of aborting its model.
    pub fn is_local_fit_failure(&self) -> bool {
        matches!(self, PidError::InsufficientData { .. } | PidError::FitFailed(_))
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<PidError> for AppError {
    fn from(err: PidError) -> Self {
        let exit_code = match &err {
            PidError::MalformedRange { .. }
            | PidError::PurityOutOfRange(_)
            | PidError::InvalidConfig(_) => 2,
            PidError::ModelNotFound(_) | PidError::InsufficientData { .. } => 3,
            PidError::FitFailed(_) | PidError::NotFitted | PidError::InvalidTransition { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
