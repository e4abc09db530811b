//! YUV 4:2:0 layout detection from plane geometry
//!
//! Android reports camera output as the generic `YUV_420_888` family. The actual
//! byte layout behind the three planes differs between vendors, so the layout is
//! inferred from plane addresses, lengths and the chroma pixel stride instead of
//! the declared format.
//!
//! Only two layouts are accepted, both with the chroma run starting at plane 2
//! (the V plane) and continuing into plane 1 (the U plane):
//!
//! ```text
//! semi-planar (NV21)   Y...Y | V U V U ... V U        pixel stride 2, plane1 = plane2 + 1
//! planar (YV12)        Y...Y | V V ... V | U U ... U  pixel stride 1, plane1 = plane2 + len
//! ```

use std::fmt;

/// Pixel layout of a grabbed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub enum ColorLayout {
    /// Not detected yet, or not one of the supported layouts
    #[default]
    Unknown,
    /// Three separate planes, V before U (YV12)
    Planar,
    /// Luma plane followed by interleaved V/U pairs (NV21)
    SemiPlanar,
}

impl ColorLayout {
    /// Whether frames with this layout can be converted
    pub fn is_known(&self) -> bool {
        !matches!(self, ColorLayout::Unknown)
    }
}

impl fmt::Display for ColorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorLayout::Unknown => write!(f, "unknown"),
            ColorLayout::Planar => write!(f, "planar (YV12)"),
            ColorLayout::SemiPlanar => write!(f, "semi-planar (NV21)"),
        }
    }
}

/// Address and length of one directly addressable plane buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneSpan {
    /// Start address of the plane bytes
    pub address: usize,
    /// Capacity of the plane buffer in bytes
    pub len: usize,
}

impl PlaneSpan {
    /// Span of `len` bytes starting at `address`
    pub fn new(address: usize, len: usize) -> Self {
        Self { address, len }
    }
}

/// Geometry of the three planes of one image, as read from the foreign buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneGeometry {
    /// Luma plane (Android plane 0)
    pub y: PlaneSpan,
    /// Chroma plane starting the chroma run in memory (Android plane 2)
    pub u: PlaneSpan,
    /// Chroma plane following it (Android plane 1)
    pub v: PlaneSpan,
    /// Pixel stride of the chroma planes (read from Android plane 1)
    pub uv_pixel_stride: i32,
}

/// Infer the pixel layout of an image requested at `width` x `height`.
///
/// The luma plane must hold exactly `width * height` bytes; anything else is
/// reported as [`ColorLayout::Unknown`].
pub fn classify(geometry: &PlaneGeometry, width: i32, height: i32) -> ColorLayout {
    let PlaneGeometry {
        y,
        u,
        v,
        uv_pixel_stride,
    } = *geometry;

    let expected_luma = match luma_len(width, height) {
        Some(len) if len > 0 => len,
        _ => return ColorLayout::Unknown,
    };
    if y.len != expected_luma {
        return ColorLayout::Unknown;
    }

    if uv_pixel_stride == 2
        && u.address.checked_add(1) == Some(v.address)
        && (y.len / 2).checked_sub(1) == Some(u.len)
        && v.len == u.len
    {
        return ColorLayout::SemiPlanar;
    }

    if uv_pixel_stride == 1
        && u.address.checked_add(u.len) == Some(v.address)
        && u.len == y.len / 4
        && v.len == u.len
    {
        return ColorLayout::Planar;
    }

    ColorLayout::Unknown
}

/// Luma byte count for a frame, `None` for negative or overflowing dimensions
pub fn luma_len(width: i32, height: i32) -> Option<usize> {
    let width = usize::try_from(width).ok()?;
    let height = usize::try_from(height).ok()?;
    width.checked_mul(height)
}

/// Bytes held by a grabbed YUV 4:2:0 frame: luma plus half-size chroma
pub fn frame_len(luma_len: usize) -> usize {
    luma_len + luma_len / 2
}
