//! # droidcap core
//!
//! Frame types, the generic video capture abstraction, the init-once handle
//! cache and the error taxonomy shared by the droidcap crates.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod frame;
pub mod handle_cache;
pub mod videoio;

// Re-export main types
pub use error::{CaptureError, CaptureResult, ErrorCategory};
pub use frame::{ColorFrame, FlipAxis, COLOR_CHANNELS};
pub use handle_cache::HandleCache;
pub use videoio::{CaptureDomain, CaptureProperty, VideoCapture};
