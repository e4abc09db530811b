//! Per-frame acquisition protocol
//!
//! A [`CaptureSession`] walks `Closed -> Opening -> Acquiring`. The first grab
//! asks the camera activity to open the device and yields no frame; every
//! later grab asks the activity's image reader for its most recent image,
//! checks format and plane count, classifies the plane layout and copies the
//! pixels into the session-owned [`FrameBuffer`].
//!
//! Each step may end the attempt early with a [`NoFrame`] reason. Foreign
//! references are held in scoped guards, so every reference taken during an
//! attempt is released (and the image closed) on whichever path returns.

use std::fmt;

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::bridge::{
    AcquiredImage, AttachScope, CameraBridge, DirectBuffer, Local, IMAGE_FORMAT_YUV_420_888,
    YUV_PLANE_COUNT,
};
use crate::layout::{self, ColorLayout, PlaneGeometry, PlaneSpan};

/// Default requested frame width
pub const DEFAULT_FRAME_WIDTH: i32 = 640;
/// Default requested frame height
pub const DEFAULT_FRAME_HEIGHT: i32 = 480;

/// Lifecycle of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum SessionState {
    /// No open request issued yet
    Closed,
    /// Open request issued, no acquisition attempted yet
    Opening,
    /// Acquiring frames
    Acquiring,
}

/// Why a grab produced no frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoFrame {
    /// Negative frame dimensions requested
    CameraUnavailable,
    /// The calling thread could not be attached to the runtime
    RuntimeUnavailable,
    /// The camera activity singleton is null
    ActivityUnavailable,
    /// The open request was issued on this call
    OpenRequested,
    /// The open request was rejected by the runtime
    OpenFailed,
    /// The activity has not published its image reader yet
    ReaderNotReady,
    /// No image arrived since the last acquisition
    NoNewImage,
    /// The image declared a format other than YUV_420_888
    UnexpectedFormat(i32),
    /// The image returned no plane array
    PlanesUnavailable,
    /// The image has a plane count other than three
    PlaneCount(usize),
    /// A plane or its direct buffer is missing
    BufferUnavailable,
    /// The plane geometry matches neither supported layout
    UnrecognizedLayout,
}

impl NoFrame {
    /// Stable label used for logging and statistics
    pub fn as_str(&self) -> &'static str {
        match self {
            NoFrame::CameraUnavailable => "camera_unavailable",
            NoFrame::RuntimeUnavailable => "runtime_unavailable",
            NoFrame::ActivityUnavailable => "activity_unavailable",
            NoFrame::OpenRequested => "open_requested",
            NoFrame::OpenFailed => "open_failed",
            NoFrame::ReaderNotReady => "reader_not_ready",
            NoFrame::NoNewImage => "no_new_image",
            NoFrame::UnexpectedFormat(_) => "unexpected_format",
            NoFrame::PlanesUnavailable => "planes_unavailable",
            NoFrame::PlaneCount(_) => "plane_count",
            NoFrame::BufferUnavailable => "buffer_unavailable",
            NoFrame::UnrecognizedLayout => "unrecognized_layout",
        }
    }
}

impl fmt::Display for NoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoFrame::UnexpectedFormat(format) => write!(f, "unexpected image format {format:#x}"),
            NoFrame::PlaneCount(count) => write!(f, "image has {count} planes"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of one grab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A frame with the given layout was copied into the session buffer
    Ready(ColorLayout),
    /// No frame this cycle
    Empty(NoFrame),
}

impl AcquireOutcome {
    /// Whether a frame was copied
    pub fn is_ready(&self) -> bool {
        matches!(self, AcquireOutcome::Ready(_))
    }
}

/// Owned copy of one grabbed YUV 4:2:0 frame
#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    data: BytesMut,
    width: i32,
    height: i32,
}

impl FrameBuffer {
    /// Grabbed bytes: luma followed by half-size chroma
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Width the frame was grabbed at
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height the frame was grabbed at
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of grabbed bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the last grab left no frame
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn fill(&mut self, width: i32, height: i32, luma: &[u8], chroma: &[u8]) {
        self.data.clear();
        self.data.reserve(luma.len() + chroma.len());
        self.data.extend_from_slice(luma);
        self.data.extend_from_slice(chroma);
        self.width = width;
        self.height = height;
    }
}

/// One opened camera stream
#[derive(Debug)]
pub struct CaptureSession {
    index: i32,
    width: i32,
    height: i32,
    layout: ColorLayout,
    state: SessionState,
    frame: FrameBuffer,
}

impl CaptureSession {
    /// Closed session for camera `index` at the default 640x480
    pub fn new(index: i32) -> Self {
        Self {
            index,
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            layout: ColorLayout::Unknown,
            state: SessionState::Closed,
            frame: FrameBuffer::default(),
        }
    }

    /// Camera index
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Requested frame width
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Requested frame height
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Set the requested width; takes effect on the next open request
    pub fn set_width(&mut self, width: i32) {
        self.width = width;
    }

    /// Set the requested height; takes effect on the next open request
    pub fn set_height(&mut self, height: i32) {
        self.height = height;
    }

    /// Layout detected by the last classification
    pub fn layout(&self) -> ColorLayout {
        self.layout
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether an open request has been issued
    pub fn is_open(&self) -> bool {
        self.state != SessionState::Closed
    }

    /// Last grabbed frame; empty unless the last grab succeeded
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Stop acquiring. The next grab issues a new open request.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            debug!(index = self.index, "closing capture session");
        }
        self.state = SessionState::Closed;
        self.frame.clear();
    }

    /// Run one acquisition attempt against `bridge`
    pub fn grab<B: CameraBridge + ?Sized>(&mut self, bridge: &B) -> AcquireOutcome {
        self.frame.clear();

        if self.width < 0 || self.height < 0 {
            return AcquireOutcome::Empty(NoFrame::CameraUnavailable);
        }

        match self.state {
            SessionState::Closed => {
                return match request_open(bridge, self.index, self.width, self.height) {
                    Ok(()) => {
                        debug!(
                            index = self.index,
                            width = self.width,
                            height = self.height,
                            "camera open requested"
                        );
                        self.state = SessionState::Opening;
                        AcquireOutcome::Empty(NoFrame::OpenRequested)
                    }
                    Err(reason) => AcquireOutcome::Empty(reason),
                };
            }
            SessionState::Opening => self.state = SessionState::Acquiring,
            SessionState::Acquiring => {}
        }

        match acquire_latest(bridge, self.width, self.height, &mut self.frame) {
            Ok(layout) => {
                if layout != self.layout {
                    debug!(%layout, "detected camera pixel layout");
                }
                self.layout = layout;
                AcquireOutcome::Ready(layout)
            }
            Err(reason) => {
                if reason == NoFrame::UnrecognizedLayout {
                    self.layout = ColorLayout::Unknown;
                }
                AcquireOutcome::Empty(reason)
            }
        }
    }
}

/// Ask the camera activity to open camera `index`
pub fn request_open<B: CameraBridge + ?Sized>(
    bridge: &B,
    index: i32,
    width: i32,
    height: i32,
) -> Result<(), NoFrame> {
    let _scope = AttachScope::enter(bridge).map_err(|e| {
        warn!("cannot attach to camera runtime: {}", e);
        NoFrame::RuntimeUnavailable
    })?;
    let activity =
        Local::wrap(bridge, bridge.activity_instance()).ok_or(NoFrame::ActivityUnavailable)?;

    bridge
        .open_camera(activity.handle(), index, width, height)
        .map_err(|e| {
            warn!("camera open request failed: {}", e);
            NoFrame::OpenFailed
        })
}

/// Plane reference, its buffer reference and the values read from them
struct BorrowedPlane<'b, B: CameraBridge + ?Sized> {
    _plane: Local<'b, B>,
    _buffer: Local<'b, B>,
    direct: DirectBuffer,
    pixel_stride: i32,
    row_stride: i32,
}

impl<B: CameraBridge + ?Sized> BorrowedPlane<'_, B> {
    fn span(&self) -> PlaneSpan {
        PlaneSpan::new(self.direct.address as usize, self.direct.capacity)
    }
}

fn borrow_plane<'b, B: CameraBridge + ?Sized>(
    bridge: &'b B,
    planes: &Local<'b, B>,
    index: usize,
) -> Result<BorrowedPlane<'b, B>, NoFrame> {
    let plane = Local::wrap(bridge, bridge.plane(planes.handle(), index))
        .ok_or(NoFrame::BufferUnavailable)?;
    let pixel_stride = bridge.pixel_stride(plane.handle());
    let row_stride = bridge.row_stride(plane.handle());
    let buffer = Local::wrap(bridge, bridge.plane_buffer(plane.handle()))
        .ok_or(NoFrame::BufferUnavailable)?;
    let direct = bridge
        .direct_buffer(buffer.handle())
        .filter(|direct| !direct.address.is_null())
        .ok_or(NoFrame::BufferUnavailable)?;

    Ok(BorrowedPlane {
        _plane: plane,
        _buffer: buffer,
        direct,
        pixel_stride,
        row_stride,
    })
}

/// Copy the reader's most recent image into `out`.
///
/// `out` is only written when the image is accepted; the caller clears it
/// beforehand so a rejected attempt leaves it empty.
pub fn acquire_latest<B: CameraBridge + ?Sized>(
    bridge: &B,
    width: i32,
    height: i32,
    out: &mut FrameBuffer,
) -> Result<ColorLayout, NoFrame> {
    let _scope = AttachScope::enter(bridge).map_err(|e| {
        warn!("cannot attach to camera runtime: {}", e);
        NoFrame::RuntimeUnavailable
    })?;

    let activity =
        Local::wrap(bridge, bridge.activity_instance()).ok_or(NoFrame::ActivityUnavailable)?;
    let reader = Local::wrap(bridge, bridge.image_reader(activity.handle()))
        .ok_or(NoFrame::ReaderNotReady)?;
    let image = bridge
        .acquire_latest_image(reader.handle())
        .map(|image| AcquiredImage::new(bridge, image))
        .ok_or(NoFrame::NoNewImage)?;

    let format = bridge.image_format(image.handle());
    if format != IMAGE_FORMAT_YUV_420_888 {
        debug!("dropping image with format {:#x}", format);
        return Err(NoFrame::UnexpectedFormat(format));
    }

    let planes =
        Local::wrap(bridge, bridge.image_planes(image.handle())).ok_or(NoFrame::PlanesUnavailable)?;
    let count = bridge.plane_count(planes.handle());
    if count != YUV_PLANE_COUNT {
        debug!("dropping image with {} planes", count);
        return Err(NoFrame::PlaneCount(count));
    }

    // Android orders planes Y, U, V; the accepted layouts start their chroma run at V
    let luma = borrow_plane(bridge, &planes, 0)?;
    let chroma_u = borrow_plane(bridge, &planes, 1)?;
    let chroma_v = borrow_plane(bridge, &planes, 2)?;

    let geometry = PlaneGeometry {
        y: luma.span(),
        u: chroma_v.span(),
        v: chroma_u.span(),
        uv_pixel_stride: chroma_u.pixel_stride,
    };
    trace!(
        y_row_stride = luma.row_stride,
        uv_row_stride = chroma_u.row_stride,
        ?geometry,
        "classifying image planes"
    );

    let layout = layout::classify(&geometry, width, height);
    if !layout.is_known() {
        debug!(?geometry, "unrecognized YUV plane layout");
        return Err(NoFrame::UnrecognizedLayout);
    }

    let luma_len = geometry.y.len;
    let chroma_len = luma_len / 2;
    // The chroma run spans both chroma buffers, from the start of `u` to the end of `v`
    let chroma_run = geometry.v.address + geometry.v.len - geometry.u.address;
    if chroma_run < chroma_len {
        debug!(chroma_run, chroma_len, "chroma planes shorter than payload");
        return Err(NoFrame::UnrecognizedLayout);
    }

    // SAFETY: the luma buffer is `luma_len` bytes of directly addressable memory
    // owned by the image, which stays open until `image` drops at the end of this
    // function. The classifier established that `v` starts right behind `u` (one
    // byte for semi-planar, `u.len` bytes for planar), so the first `chroma_len`
    // bytes from `u` lie inside the two adjacent chroma buffers, as checked above.
    let (luma_bytes, chroma_bytes) = unsafe {
        (
            std::slice::from_raw_parts(luma.direct.address, luma_len),
            std::slice::from_raw_parts(chroma_v.direct.address, chroma_len),
        )
    };
    out.fill(width, height, luma_bytes, chroma_bytes);
    trace!(bytes = out.len(), %layout, "frame copied");

    Ok(layout)
}
