//! Interleaved color frame representation and geometric operations

use crate::error::{CaptureError, CaptureResult};

/// Number of interleaved channels in a [`ColorFrame`]
pub const COLOR_CHANNELS: usize = 3;

/// Mirror axis for [`ColorFrame::flip`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    /// Mirror left/right (reverse every row)
    Horizontal,
    /// Mirror top/bottom (reverse row order)
    Vertical,
    /// Mirror both axes, equivalent to a 180 degree rotation
    Both,
}

/// 8-bit, 3-channel interleaved frame in B, G, R byte order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ColorFrame {
    /// Create a black frame of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * COLOR_CHANNELS],
        }
    }

    /// Wrap existing BGR bytes, checking the length against the dimensions
    pub fn from_bgr(width: u32, height: u32, data: Vec<u8>) -> CaptureResult<Self> {
        let expected = width as usize * height as usize * COLOR_CHANNELS;
        if data.len() != expected {
            return Err(CaptureError::InvalidFrameData {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel count, always 3
    pub fn channels(&self) -> usize {
        COLOR_CHANNELS
    }

    /// Whether the frame holds no pixels
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw interleaved BGR bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the frame and return its bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// BGR triple at `(x, y)`, or `None` outside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = self.offset(x, y);
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    /// Overwrite the BGR triple at `(x, y)`; ignored outside the frame
    pub fn set_pixel(&mut self, x: u32, y: u32, bgr: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = self.offset(x, y);
        self.data[offset..offset + COLOR_CHANNELS].copy_from_slice(&bgr);
    }

    /// Swap rows and columns: output pixel `(x, y)` is input pixel `(y, x)`
    pub fn transpose(&self) -> Self {
        let mut out = Self::new(self.height, self.width);
        if self.is_empty() {
            return out;
        }
        for (y, row) in self
            .data
            .chunks_exact(self.width as usize * COLOR_CHANNELS)
            .enumerate()
        {
            for (x, px) in row.chunks_exact(COLOR_CHANNELS).enumerate() {
                let dst = out.offset(y as u32, x as u32);
                out.data[dst..dst + COLOR_CHANNELS].copy_from_slice(px);
            }
        }
        out
    }

    /// Mirror the frame in place
    pub fn flip(&mut self, axis: FlipAxis) {
        let row_len = self.width as usize * COLOR_CHANNELS;
        if row_len == 0 {
            return;
        }

        match axis {
            FlipAxis::Horizontal => {
                for row in self.data.chunks_exact_mut(row_len) {
                    reverse_pixels(row);
                }
            }
            FlipAxis::Vertical => {
                let rows = self.height as usize;
                for top in 0..rows / 2 {
                    let bottom = rows - 1 - top;
                    let (head, tail) = self.data.split_at_mut(bottom * row_len);
                    head[top * row_len..(top + 1) * row_len].swap_with_slice(&mut tail[..row_len]);
                }
            }
            FlipAxis::Both => reverse_pixels(&mut self.data),
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * COLOR_CHANNELS
    }
}

/// Reverse pixel order while keeping each pixel's channel order
fn reverse_pixels(bytes: &mut [u8]) {
    bytes.reverse();
    for px in bytes.chunks_exact_mut(COLOR_CHANNELS) {
        px.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3x2 frame where every pixel encodes its own coordinates
    fn coordinate_frame() -> ColorFrame {
        let mut frame = ColorFrame::new(3, 2);
        for y in 0..2 {
            for x in 0..3 {
                frame.set_pixel(x, y, [x as u8, y as u8, 7]);
            }
        }
        frame
    }

    #[test]
    fn test_from_bgr_checks_length() {
        assert!(ColorFrame::from_bgr(2, 2, vec![0; 12]).is_ok());

        let err = ColorFrame::from_bgr(2, 2, vec![0; 11]).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidFrameData {
                expected: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn test_transpose_swaps_dimensions() {
        let frame = coordinate_frame();
        let t = frame.transpose();

        assert_eq!((t.width(), t.height()), (2, 3));
        for y in 0..3 {
            for x in 0..2 {
                assert_eq!(t.pixel(x, y), frame.pixel(y, x));
            }
        }
    }

    #[test]
    fn test_flip_horizontal() {
        let mut frame = coordinate_frame();
        frame.flip(FlipAxis::Horizontal);

        assert_eq!(frame.pixel(0, 0), Some([2, 0, 7]));
        assert_eq!(frame.pixel(2, 1), Some([0, 1, 7]));
    }

    #[test]
    fn test_flip_vertical() {
        let mut frame = coordinate_frame();
        frame.flip(FlipAxis::Vertical);

        assert_eq!(frame.pixel(0, 0), Some([0, 1, 7]));
        assert_eq!(frame.pixel(2, 1), Some([2, 0, 7]));
    }

    #[test]
    fn test_flip_both_is_rotation() {
        let mut frame = coordinate_frame();
        frame.flip(FlipAxis::Both);

        for y in 0..2u32 {
            for x in 0..3u32 {
                assert_eq!(frame.pixel(x, y), Some([(2 - x) as u8, (1 - y) as u8, 7]));
            }
        }
    }

    #[test]
    fn test_pixel_out_of_bounds() {
        let frame = coordinate_frame();
        assert_eq!(frame.pixel(3, 0), None);
        assert_eq!(frame.pixel(0, 2), None);
    }
}
