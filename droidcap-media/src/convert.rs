//! YUV 4:2:0 to BGR conversion and sensor orientation correction
//!
//! Conversion uses the BT.601 video-range fixed point coefficients common to
//! image processing libraries, so output matches what a desktop pipeline
//! produces for the same YV12/NV21 bytes.

use droidcap_core::{CaptureError, CaptureResult, ColorFrame, FlipAxis, COLOR_CHANNELS};
use tracing::trace;

use crate::layout::{self, ColorLayout};

const SHIFT: u32 = 20;
const ROUND: i32 = 1 << (SHIFT - 1);
const CY: i32 = 1_220_542;
const CUB: i32 = 2_116_026;
const CUG: i32 = -409_993;
const CVG: i32 = -852_492;
const CVR: i32 = 1_673_527;

/// Per-pixel chroma terms shared by a 2x2 luma block
#[derive(Clone, Copy)]
struct ChromaTerms {
    r: i32,
    g: i32,
    b: i32,
}

impl ChromaTerms {
    fn new(u: u8, v: u8) -> Self {
        let u = i32::from(u) - 128;
        let v = i32::from(v) - 128;
        Self {
            r: ROUND + CVR * v,
            g: ROUND + CVG * v + CUG * u,
            b: ROUND + CUB * u,
        }
    }

    fn bgr(&self, y: u8) -> [u8; 3] {
        let y = (i32::from(y) - 16).max(0) * CY;
        [
            clamp((y + self.b) >> SHIFT),
            clamp((y + self.g) >> SHIFT),
            clamp((y + self.r) >> SHIFT),
        ]
    }
}

fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Convert a grabbed frame to an oriented BGR image.
///
/// `data` holds `width * height` luma bytes followed by half as many chroma
/// bytes in the given layout. The result is transposed to `height` x `width`
/// and mirrored horizontally for camera 0, on both axes for any other camera.
pub fn materialize(
    data: &[u8],
    width: i32,
    height: i32,
    layout: ColorLayout,
    camera_index: i32,
) -> CaptureResult<ColorFrame> {
    let frame = yuv420_to_bgr(data, width, height, layout)?;
    Ok(orient(frame, camera_index))
}

/// Convert YV12 or NV21 bytes to an unrotated BGR frame
pub fn yuv420_to_bgr(
    data: &[u8],
    width: i32,
    height: i32,
    layout: ColorLayout,
) -> CaptureResult<ColorFrame> {
    if data.is_empty() {
        return Err(CaptureError::NoFrame);
    }
    if !layout.is_known() {
        return Err(CaptureError::UnsupportedFormat {
            format: layout.to_string(),
        });
    }

    let (w, h) = match (usize::try_from(width), usize::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 && w % 2 == 0 && h % 2 == 0 => (w, h),
        _ => return Err(CaptureError::InvalidDimensions { width, height }),
    };
    let luma_len = layout::luma_len(width, height)
        .ok_or(CaptureError::InvalidDimensions { width, height })?;
    let expected = layout::frame_len(luma_len);
    if data.len() != expected {
        return Err(CaptureError::InvalidFrameData {
            expected,
            actual: data.len(),
        });
    }

    let (luma, chroma) = data.split_at(luma_len);
    let mut bgr = Vec::with_capacity(luma_len * COLOR_CHANNELS);
    let quarter = luma_len / 4;

    for row in 0..h {
        let luma_row = &luma[row * w..(row + 1) * w];
        for (col, &y) in luma_row.iter().enumerate() {
            let (u, v) = match layout {
                ColorLayout::SemiPlanar => {
                    let at = (row / 2) * w + (col / 2) * 2;
                    (chroma[at + 1], chroma[at])
                }
                _ => {
                    let at = (row / 2) * (w / 2) + col / 2;
                    (chroma[quarter + at], chroma[at])
                }
            };
            bgr.extend_from_slice(&ChromaTerms::new(u, v).bgr(y));
        }
    }

    trace!(width, height, %layout, "converted frame to BGR");
    ColorFrame::from_bgr(w as u32, h as u32, bgr)
}

/// Correct for the sensor mounting of camera `camera_index`
pub fn orient(frame: ColorFrame, camera_index: i32) -> ColorFrame {
    let mut rotated = frame.transpose();
    let axis = if camera_index == 0 {
        FlipAxis::Horizontal
    } else {
        FlipAxis::Both
    };
    rotated.flip(axis);
    rotated
}
