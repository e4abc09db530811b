//! Generic sequential video capture abstraction
//!
//! Capture sources split frame delivery in two steps: [`VideoCapture::grab_frame`]
//! pulls the next frame from the device into source-owned storage, and
//! [`VideoCapture::retrieve_frame`] decodes the grabbed data into a [`ColorFrame`].
//! Both report failure as `false`; "no frame this cycle" is an ordinary outcome
//! and callers are expected to poll again on their own schedule.

use crate::frame::ColorFrame;

/// Capture property identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureProperty {
    /// Requested frame width in pixels
    FrameWidth,
    /// Requested frame height in pixels
    FrameHeight,
}

impl CaptureProperty {
    /// Numeric id of the frame width property
    pub const FRAME_WIDTH_ID: i32 = 3;
    /// Numeric id of the frame height property
    pub const FRAME_HEIGHT_ID: i32 = 4;

    /// Map a numeric property id, `None` for ids this crate does not know
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            Self::FRAME_WIDTH_ID => Some(CaptureProperty::FrameWidth),
            Self::FRAME_HEIGHT_ID => Some(CaptureProperty::FrameHeight),
            _ => None,
        }
    }

    /// Numeric id of this property
    pub fn id(&self) -> i32 {
        match self {
            CaptureProperty::FrameWidth => Self::FRAME_WIDTH_ID,
            CaptureProperty::FrameHeight => Self::FRAME_HEIGHT_ID,
        }
    }
}

/// Backend family a capture source belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureDomain {
    /// Android device camera driven through the platform activity
    AndroidCamera,
}

impl CaptureDomain {
    /// Numeric domain id
    pub fn id(&self) -> i32 {
        match self {
            CaptureDomain::AndroidCamera => 1000,
        }
    }
}

/// Sequential frame source
pub trait VideoCapture {
    /// Acquire the next frame into source-owned storage
    fn grab_frame(&mut self) -> bool;

    /// Decode the last grabbed frame into `out`; `out` is left untouched on failure
    fn retrieve_frame(&mut self, stream_index: i32, out: &mut ColorFrame) -> bool;

    /// Whether the source is usable
    fn is_opened(&self) -> bool;

    /// Backend family of this source
    fn capture_domain(&self) -> CaptureDomain;

    /// Read a property by numeric id, 0.0 for unknown ids
    fn get_property(&self, property_id: i32) -> f64;

    /// Write a property by numeric id
    fn set_property(&mut self, property_id: i32, value: f64) -> bool;

    /// Grab and retrieve in one call
    fn read(&mut self, out: &mut ColorFrame) -> bool {
        self.grab_frame() && self.retrieve_frame(0, out)
    }
}
