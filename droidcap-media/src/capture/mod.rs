//! Android camera capture source
//!
//! [`AndroidCameraCapture`] adapts a [`CaptureSession`] driven through any
//! [`CameraBridge`] to the generic [`VideoCapture`] abstraction. Grabbing runs the
//! acquisition protocol against the bridge; retrieving only converts the bytes
//! copied by the last grab and never touches the foreign runtime.

#[cfg(target_os = "android")]
pub mod android;

use std::collections::BTreeMap;
use std::sync::Arc;

use droidcap_core::{CaptureDomain, CaptureProperty, CaptureResult, ColorFrame, VideoCapture};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::acquire::{AcquireOutcome, CaptureSession, SessionState};
use crate::bridge::CameraBridge;
use crate::convert;
use crate::layout::ColorLayout;

/// Capture statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    /// Grab calls
    pub grabs: u64,
    /// Grabs that copied a frame
    pub frames_ready: u64,
    /// Grabs without a frame, keyed by reason
    pub empty_by_reason: BTreeMap<&'static str, u64>,
    /// Retrieves that produced an image
    pub retrieves_ok: u64,
    /// Retrieves that failed
    pub retrieves_failed: u64,
}

impl CaptureStats {
    /// Grabs that produced no frame
    pub fn frames_empty(&self) -> u64 {
        self.empty_by_reason.values().sum()
    }
}

/// Device camera exposed as a sequential frame source
#[derive(Debug)]
pub struct AndroidCameraCapture<B: CameraBridge> {
    bridge: Arc<B>,
    session: CaptureSession,
    stats: CaptureStats,
}

impl<B: CameraBridge> AndroidCameraCapture<B> {
    /// Capture source for camera `index`, requesting 640x480 until told otherwise.
    ///
    /// Nothing is sent to the runtime until the first grab.
    pub fn new(bridge: Arc<B>, index: i32) -> Self {
        info!(index, "created Android camera capture");
        Self {
            bridge,
            session: CaptureSession::new(index),
            stats: CaptureStats::default(),
        }
    }

    /// Capture source requesting `width` x `height` frames
    pub fn with_size(bridge: Arc<B>, index: i32, width: i32, height: i32) -> Self {
        let mut capture = Self::new(bridge, index);
        capture.session.set_width(width);
        capture.session.set_height(height);
        capture
    }

    /// Camera index
    pub fn index(&self) -> i32 {
        self.session.index()
    }

    /// Pixel layout detected by the last classification
    pub fn layout(&self) -> ColorLayout {
        self.session.layout()
    }

    /// Session lifecycle state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Counters since creation
    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// The bridge this source talks through
    pub fn bridge(&self) -> &Arc<B> {
        &self.bridge
    }

    /// Run one acquisition attempt and report its outcome
    pub fn grab(&mut self) -> AcquireOutcome {
        self.stats.grabs += 1;
        let outcome = self.session.grab(self.bridge.as_ref());
        match outcome {
            AcquireOutcome::Ready(layout) => {
                self.stats.frames_ready += 1;
                trace!(%layout, "frame grabbed");
            }
            AcquireOutcome::Empty(reason) => {
                *self.stats.empty_by_reason.entry(reason.as_str()).or_default() += 1;
                debug!(index = self.session.index(), %reason, "no frame");
            }
        }
        outcome
    }

    /// Convert the last grabbed frame into an oriented BGR image
    pub fn retrieve(&self) -> CaptureResult<ColorFrame> {
        let frame = self.session.frame();
        convert::materialize(
            frame.data(),
            frame.width(),
            frame.height(),
            self.session.layout(),
            self.session.index(),
        )
    }

    /// Stop acquiring; the next grab asks the activity to open the camera again
    pub fn release(&mut self) {
        self.session.close();
    }
}

impl<B: CameraBridge> VideoCapture for AndroidCameraCapture<B> {
    fn grab_frame(&mut self) -> bool {
        self.grab().is_ready()
    }

    fn retrieve_frame(&mut self, _stream_index: i32, out: &mut ColorFrame) -> bool {
        match self.retrieve() {
            Ok(frame) => {
                self.stats.retrieves_ok += 1;
                *out = frame;
                true
            }
            Err(e) => {
                self.stats.retrieves_failed += 1;
                debug!("retrieve failed: {}", e);
                false
            }
        }
    }

    // The activity owns the device; availability only shows up as empty grabs
    fn is_opened(&self) -> bool {
        true
    }

    fn capture_domain(&self) -> CaptureDomain {
        CaptureDomain::AndroidCamera
    }

    fn get_property(&self, property_id: i32) -> f64 {
        match CaptureProperty::from_id(property_id) {
            Some(CaptureProperty::FrameWidth) => f64::from(self.session.width()),
            Some(CaptureProperty::FrameHeight) => f64::from(self.session.height()),
            None => 0.0,
        }
    }

    // Unknown ids are ignored and still reported as accepted
    fn set_property(&mut self, property_id: i32, value: f64) -> bool {
        match CaptureProperty::from_id(property_id) {
            Some(CaptureProperty::FrameWidth) => self.session.set_width(value as i32),
            Some(CaptureProperty::FrameHeight) => self.session.set_height(value as i32),
            None => trace!(property_id, "ignoring unknown capture property"),
        }
        true
    }
}

impl<B: CameraBridge> Drop for AndroidCameraCapture<B> {
    fn drop(&mut self) {
        self.release();
    }
}
