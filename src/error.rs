//! Phone Sentinel - Error Types

use thiserror::Error;

/// Result type for sentinel operations
pub type SentinelResult<T> = Result<T, SentinelError>;

/// Sentinel error types
#[derive(Error, Debug)]
pub enum SentinelError {
    // ═══════════════════════════════════════════════════════════════
    // SETUP / CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Setup incomplete - PIN, emergency contact and alarm choice must all be configured")]
    SetupIncomplete,

    #[error("Invalid emergency contact: {0}")]
    InvalidContact(String),

    #[error("Invalid PIN format: expected 4 digits")]
    InvalidPinFormat,

    // ═══════════════════════════════════════════════════════════════
    // CAPABILITY ERRORS (always degraded, never fatal)
    // ═══════════════════════════════════════════════════════════════

    #[error("Camera capture failed: {0}")]
    CaptureFailure(String),

    #[error("Location fix failed: {0}")]
    LocationFailure(String),

    #[error("Permission denied for capability: {0}")]
    PermissionDenied(String),

    #[error("Sensor subscription unavailable: {0}")]
    SensorUnavailable(String),

    // ═══════════════════════════════════════════════════════════════
    // DELIVERY ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Alert delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("No emergency contact configured")]
    NoContactConfigured,

    // ═══════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SentinelError {
    /// Errors on the detection-to-alert path degrade to a placeholder
    /// value instead of propagating to the caller.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            SentinelError::CaptureFailure(_)
                | SentinelError::LocationFailure(_)
                | SentinelError::PermissionDenied(_)
                | SentinelError::SensorUnavailable(_)
                | SentinelError::DeliveryFailure(_)
        )
    }

    /// Errors that must be reported back to the caller (setup flow)
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            SentinelError::SetupIncomplete
                | SentinelError::InvalidContact(_)
                | SentinelError::InvalidPinFormat
        )
    }
}

impl From<serde_json::Error> for SentinelError {
    fn from(e: serde_json::Error) -> Self {
        SentinelError::SerializationError(e.to_string())
    }
}

impl From<reqwest::Error> for SentinelError {
    fn from(e: reqwest::Error) -> Self {
        SentinelError::DeliveryFailure(e.to_string())
    }
}
