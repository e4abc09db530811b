//! Capture error types and handling
//!
//! Errors raised while acquiring, converting or configuring camera frames.
//! The generic capture surface reports these as booleans; the typed variants
//! stay available to callers that drive the pipeline directly.

use thiserror::Error;

/// Main error type for capture operations
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// The foreign runtime or its camera classes are not available
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// Frame buffer does not hold the expected payload
    #[error("Invalid frame data: expected {expected} bytes, got {actual}")]
    InvalidFrameData {
        /// Expected data size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Frame dimensions cannot be processed
    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width
        width: i32,
        /// Requested height
        height: i32,
    },

    /// The pixel layout of the captured frame is not recognized
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        /// Format description
        format: String,
    },

    /// No frame has been grabbed yet
    #[error("No frame available")]
    NoFrame,

    /// Error from the foreign runtime binding
    #[error("FFI error: {library} - {message}")]
    FfiError {
        /// Library name
        library: String,
        /// Error message
        message: String,
    },

    /// Invalid state for operation
    #[error("Invalid state: {message}")]
    InvalidState {
        /// State error message
        message: String,
    },
}

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

impl CaptureError {
    /// Check if error is recoverable by calling again later
    pub fn is_recoverable(&self) -> bool {
        match self {
            CaptureError::NoFrame => true,
            CaptureError::UnsupportedFormat { .. } => true,
            CaptureError::Initialization { .. } => false,
            CaptureError::InvalidConfiguration { .. } => false,
            CaptureError::InvalidDimensions { .. } => false,
            CaptureError::InvalidFrameData { .. } => false,
            CaptureError::FfiError { .. } => false,
            CaptureError::InvalidState { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            CaptureError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            CaptureError::Initialization { .. } => ErrorCategory::Platform,
            CaptureError::InvalidFrameData { .. } => ErrorCategory::Data,
            CaptureError::InvalidDimensions { .. } => ErrorCategory::Configuration,
            CaptureError::UnsupportedFormat { .. } => ErrorCategory::Format,
            CaptureError::NoFrame => ErrorCategory::State,
            CaptureError::FfiError { .. } => ErrorCategory::Platform,
            CaptureError::InvalidState { .. } => ErrorCategory::State,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration and parameter errors
    Configuration,
    /// Foreign runtime and platform binding errors
    Platform,
    /// Pixel format errors
    Format,
    /// Data validation errors
    Data,
    /// State management errors
    State,
}
