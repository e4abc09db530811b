//! # droidcap media
//!
//! Android camera acquisition for droidcap: the bridge to the host camera
//! runtime, YUV 4:2:0 layout detection from plane geometry, the per-frame
//! acquisition protocol and conversion of grabbed frames to oriented BGR images.

#![warn(clippy::all)]

pub mod acquire;
pub mod bridge;
pub mod capture;
pub mod convert;
pub mod layout;
pub mod mock;

// Re-export main types
pub use acquire::{AcquireOutcome, CaptureSession, FrameBuffer, NoFrame, SessionState};
pub use bridge::{
    AcquiredImage, AttachScope, AttachToken, BridgeError, CameraBridge, DirectBuffer, Local,
    IMAGE_FORMAT_YUV_420_888,
};
pub use capture::{AndroidCameraCapture, CaptureStats};
pub use convert::{materialize, orient, yuv420_to_bgr};
pub use layout::{classify, ColorLayout, PlaneGeometry, PlaneSpan};
pub use mock::{MockCameraBridge, MockImage, MockStats};

#[cfg(target_os = "android")]
pub use capture::android::{is_registered, register_java_vm, JniCameraBridge};
