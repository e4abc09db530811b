//! Capability interface over the foreign camera runtime
//!
//! The camera itself lives on the host side: an activity that opens the device
//! and publishes an image reader, readers that hand out images, and images that
//! expose three plane buffers. [`CameraBridge`] is the narrow set of calls the
//! acquisition protocol needs from that object system. A JNI binding implements
//! it on Android and [`crate::mock::MockCameraBridge`] implements it in tests.
//!
//! Every handle a bridge returns is a borrowed local reference that must be
//! released exactly once. The scoped guards in this module ([`Local`],
//! [`AcquiredImage`], [`AttachScope`]) do that on drop, so every exit path of a
//! caller releases what it acquired.

use std::fmt;

use droidcap_core::CaptureError;
use thiserror::Error;
use tracing::trace;

/// `ImageFormat.YUV_420_888`, the only image format accepted from the reader
pub const IMAGE_FORMAT_YUV_420_888: i32 = 0x23;

/// Planes in a YUV 4:2:0 image
pub const YUV_PLANE_COUNT: usize = 3;

/// Errors raised by a bridge implementation
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The runtime or the camera classes were never registered
    #[error("Foreign runtime not initialized")]
    NotInitialized,

    /// The calling thread could not be attached to the runtime
    #[error("Failed to attach thread: {reason}")]
    AttachFailed {
        /// Failure reason
        reason: String,
    },

    /// A call into the runtime failed
    #[error("Call to {method} failed: {reason}")]
    CallFailed {
        /// Foreign method name
        method: &'static str,
        /// Failure reason
        reason: String,
    },
}

impl From<BridgeError> for CaptureError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NotInitialized => CaptureError::Initialization {
                reason: err.to_string(),
            },
            _ => CaptureError::FfiError {
                library: "camera bridge".to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// Address and capacity of a direct byte buffer owned by the foreign runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectBuffer {
    /// First byte of the buffer
    pub address: *const u8,
    /// Capacity in bytes
    pub capacity: usize,
}

/// Proof that the calling thread is attached to the foreign runtime.
///
/// Returned by [`CameraBridge::attach`] and consumed by [`CameraBridge::detach`].
/// A token records whether this attach call performed the attachment; a thread
/// that was already attached by someone else is never detached.
#[must_use = "an attach token must be handed back to the bridge"]
#[derive(Debug, PartialEq, Eq)]
pub struct AttachToken {
    attached_here: bool,
}

impl AttachToken {
    /// The attach call attached the thread
    pub fn attached() -> Self {
        Self {
            attached_here: true,
        }
    }

    /// The thread was attached before the call
    pub fn already_attached() -> Self {
        Self {
            attached_here: false,
        }
    }

    /// Whether the owner of this token must detach the thread
    pub fn attached_here(&self) -> bool {
        self.attached_here
    }
}

/// Calls the acquisition protocol makes into the host camera runtime.
///
/// Methods returning `Option` yield `None` for a null or failed foreign result;
/// none of them is an error for the caller beyond "no frame this cycle".
pub trait CameraBridge {
    /// Borrowed foreign reference
    type Handle: Copy + fmt::Debug;

    /// Attach the calling thread if it is not attached yet
    fn attach(&self) -> Result<AttachToken, BridgeError>;

    /// Detach the calling thread; only called with tokens whose
    /// [`AttachToken::attached_here`] is true
    fn detach(&self, token: AttachToken);

    /// Release a borrowed reference
    fn release(&self, handle: Self::Handle);

    /// The camera activity singleton
    fn activity_instance(&self) -> Option<Self::Handle>;

    /// Ask the activity to open camera `index` producing `width` x `height` images
    fn open_camera(
        &self,
        activity: Self::Handle,
        index: i32,
        width: i32,
        height: i32,
    ) -> Result<(), BridgeError>;

    /// The activity's image reader, absent until the camera is running
    fn image_reader(&self, activity: Self::Handle) -> Option<Self::Handle>;

    /// Most recent image, dropping older queued ones; `None` if nothing new
    fn acquire_latest_image(&self, reader: Self::Handle) -> Option<Self::Handle>;

    /// Declared image format
    fn image_format(&self, image: Self::Handle) -> i32;

    /// The image's plane array
    fn image_planes(&self, image: Self::Handle) -> Option<Self::Handle>;

    /// Length of a plane array
    fn plane_count(&self, planes: Self::Handle) -> usize;

    /// Plane `index` of a plane array
    fn plane(&self, planes: Self::Handle, index: usize) -> Option<Self::Handle>;

    /// Row stride of a plane in bytes
    fn row_stride(&self, plane: Self::Handle) -> i32;

    /// Distance in bytes between adjacent samples of a plane
    fn pixel_stride(&self, plane: Self::Handle) -> i32;

    /// Byte buffer backing a plane
    fn plane_buffer(&self, plane: Self::Handle) -> Option<Self::Handle>;

    /// Address and capacity of a direct byte buffer
    fn direct_buffer(&self, buffer: Self::Handle) -> Option<DirectBuffer>;

    /// Return an image to its reader
    fn close_image(&self, image: Self::Handle);
}

/// Borrowed reference released when dropped
pub struct Local<'b, B: CameraBridge + ?Sized> {
    bridge: &'b B,
    handle: B::Handle,
}

impl<'b, B: CameraBridge + ?Sized> Local<'b, B> {
    /// Take ownership of a reference returned by `bridge`
    pub fn new(bridge: &'b B, handle: B::Handle) -> Self {
        Self { bridge, handle }
    }

    /// Wrap a possibly-null reference
    pub fn wrap(bridge: &'b B, handle: Option<B::Handle>) -> Option<Self> {
        handle.map(|handle| Self::new(bridge, handle))
    }

    /// The borrowed reference, valid while `self` lives
    pub fn handle(&self) -> B::Handle {
        self.handle
    }
}

impl<B: CameraBridge + ?Sized> Drop for Local<'_, B> {
    fn drop(&mut self) {
        trace!(handle = ?self.handle, "releasing local reference");
        self.bridge.release(self.handle);
    }
}

impl<B: CameraBridge + ?Sized> fmt::Debug for Local<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Local").field(&self.handle).finish()
    }
}

/// Image acquired from a reader; closed, then released, when dropped
pub struct AcquiredImage<'b, B: CameraBridge + ?Sized> {
    local: Local<'b, B>,
}

impl<'b, B: CameraBridge + ?Sized> AcquiredImage<'b, B> {
    /// Take ownership of an image returned by [`CameraBridge::acquire_latest_image`]
    pub fn new(bridge: &'b B, image: B::Handle) -> Self {
        Self {
            local: Local::new(bridge, image),
        }
    }

    /// The image reference
    pub fn handle(&self) -> B::Handle {
        self.local.handle()
    }
}

impl<B: CameraBridge + ?Sized> Drop for AcquiredImage<'_, B> {
    fn drop(&mut self) {
        // `local` is dropped after this body, so the image is closed before release
        self.local.bridge.close_image(self.local.handle);
    }
}

/// Runtime attachment held for the duration of one operation
pub struct AttachScope<'b, B: CameraBridge + ?Sized> {
    bridge: &'b B,
    token: Option<AttachToken>,
}

impl<'b, B: CameraBridge + ?Sized> AttachScope<'b, B> {
    /// Attach the calling thread for as long as the scope lives
    pub fn enter(bridge: &'b B) -> Result<Self, BridgeError> {
        let token = bridge.attach()?;
        trace!(attached_here = token.attached_here(), "entered attach scope");
        Ok(Self {
            bridge,
            token: Some(token),
        })
    }

    /// The bridge this scope is attached to
    pub fn bridge(&self) -> &'b B {
        self.bridge
    }
}

impl<B: CameraBridge + ?Sized> Drop for AttachScope<'_, B> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if token.attached_here() {
                self.bridge.detach(token);
            }
        }
    }
}
