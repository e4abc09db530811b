//! # droidcap
//!
//! The Android device camera as a sequential video capture source.
//!
//! A host activity (`org.opencv.CameraActivity`) opens the camera and publishes
//! an `ImageReader`. A capture source asks it to open a camera on its first
//! grab, then copies the most recent YUV 4:2:0 image on every later grab and
//! converts it to an oriented BGR frame on retrieve. Vendor-specific plane
//! layouts are recognised from buffer geometry, not the declared format.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use droidcap::{open_capture, CaptureConfig, ColorFrame, MockCameraBridge, MockImage, VideoCapture};
//!
//! let bridge = Arc::new(MockCameraBridge::new());
//! let mut capture = open_capture(Arc::clone(&bridge), &CaptureConfig::new(0));
//!
//! // The first grab asks the activity to open the camera
//! assert!(!capture.grab_frame());
//!
//! bridge.start_camera();
//! bridge.push_image(MockImage::semi_planar(640, 480));
//! let mut frame = ColorFrame::default();
//! assert!(capture.read(&mut frame));
//! assert_eq!((frame.width(), frame.height()), (480, 640));
//! ```
//!
//! On Android, register the Java VM once (`register_java_vm`) and build sources
//! with `create_android_capture`.

#![deny(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;

// Re-export core types for easy access
pub use droidcap_core::{
    CaptureDomain, CaptureError, CaptureProperty, CaptureResult, ColorFrame, ErrorCategory,
    FlipAxis, VideoCapture,
};

pub use droidcap_media::{
    AcquireOutcome, AndroidCameraCapture, BridgeError, CameraBridge, CaptureStats, ColorLayout,
    MockCameraBridge, MockImage, NoFrame, SessionState,
};

#[cfg(target_os = "android")]
pub use droidcap_media::{is_registered, register_java_vm, JniCameraBridge};

// Public API modules
pub mod config;
pub mod logging;

pub use config::{CaptureConfig, GlobalConfig};
pub use logging::{init_logging, init_logging_with};

/// Build a capture source over `bridge`.
///
/// Nothing is sent to the runtime until the first grab.
pub fn open_capture<B: CameraBridge>(
    bridge: Arc<B>,
    config: &CaptureConfig,
) -> AndroidCameraCapture<B> {
    if !config.is_available() {
        tracing::warn!(
            width = config.width,
            height = config.height,
            "negative frame size, grabs will report the camera as unavailable"
        );
    }
    AndroidCameraCapture::with_size(bridge, config.index, config.width, config.height)
}

/// Capture source for camera `index` over the registered Java VM.
///
/// Returns `None` until [`register_java_vm`] has succeeded.
#[cfg(target_os = "android")]
pub fn create_android_capture(index: i32) -> Option<AndroidCameraCapture<JniCameraBridge>> {
    let bridge = match JniCameraBridge::new() {
        Ok(bridge) => bridge,
        Err(e) => {
            tracing::warn!("Android camera capture unavailable: {}", e);
            return None;
        }
    };
    Some(open_capture(Arc::new(bridge), &CaptureConfig::new(index)))
}

/// Register the Java VM published through `ndk-context` by the hosting activity
#[cfg(target_os = "android")]
pub fn register_from_android_context() -> CaptureResult<()> {
    // SAFETY: ndk-context holds the VM pointer of the running application,
    // which stays valid for the life of the process.
    let vm = unsafe { jni::JavaVM::from_raw(ndk_context::android_context().vm().cast()) }
        .map_err(|e| CaptureError::Initialization {
            reason: format!("no Java VM in Android context: {}", e),
        })?;
    register_java_vm(vm)
}
