//! Configuration types and defaults

use droidcap_core::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};

/// Global droidcap configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Enable debug logging for the droidcap crates
    pub debug_logging: bool,
}

/// Capture-specific configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera index; 0 is the back camera
    pub index: i32,
    /// Requested frame width
    pub width: i32,
    /// Requested frame height
    pub height: i32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
        }
    }
}

impl CaptureConfig {
    /// Default size for camera `index`
    pub fn new(index: i32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Override the requested frame size
    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> CaptureResult<Self> {
        serde_json::from_str(json).map_err(|e| CaptureError::InvalidConfiguration {
            message: format!("invalid capture config: {}", e),
        })
    }

    /// Serialize to JSON
    pub fn to_json_string(&self) -> CaptureResult<String> {
        serde_json::to_string(self).map_err(|e| CaptureError::InvalidConfiguration {
            message: format!("cannot serialize capture config: {}", e),
        })
    }

    /// False when a negative size makes every grab report the camera as unavailable
    pub fn is_available(&self) -> bool {
        self.width >= 0 && self.height >= 0
    }
}
