//! JNI binding of [`CameraBridge`] to `org.opencv.CameraActivity`
//!
//! The activity opens the device camera and publishes an `ImageReader` in its
//! `mImageReader` field. Class references and member ids are resolved once by
//! [`register_java_vm`] and live in a process-wide [`HandleCache`]; bridges
//! created afterwards only borrow them.
//!
//! Handles are raw JNI local references. They are valid on the thread that
//! obtained them until released, which the scoped guards in
//! [`crate::bridge`] take care of.

use jni::objects::{
    GlobalRef, JByteBuffer, JClass, JFieldID, JMethodID, JObject, JObjectArray, JStaticFieldID,
    JValue, JValueOwned,
};
use jni::signature::{JavaType, Primitive, ReturnType};
use jni::sys::jobject;
use jni::{JNIEnv, JavaVM};
use tracing::{debug, info, warn};

use droidcap_core::{CaptureError, CaptureResult, HandleCache};

use crate::bridge::{AttachToken, BridgeError, CameraBridge, DirectBuffer};

const ACTIVITY_CLASS: &str = "org/opencv/CameraActivity";
const IMAGE_READER_CLASS: &str = "android/media/ImageReader";
const IMAGE_CLASS: &str = "android/media/Image";
const PLANE_CLASS: &str = "android/media/Image$Plane";

const ACTIVITY_SIG: &str = "Lorg/opencv/CameraActivity;";
const IMAGE_READER_SIG: &str = "Landroid/media/ImageReader;";

static RUNTIME: HandleCache<JniRuntime> = HandleCache::new("camera JNI handles");

struct JniRuntime {
    vm: JavaVM,
    handles: JniHandles,
}

/// Class references and member ids of the camera host classes
struct JniHandles {
    activity_class: GlobalRef,
    // Held so the ids below stay valid
    _reader_class: GlobalRef,
    _image_class: GlobalRef,
    _plane_class: GlobalRef,
    instance_field: JStaticFieldID,
    open_camera: JMethodID,
    image_reader_field: JFieldID,
    acquire_latest_image: JMethodID,
    get_format: JMethodID,
    get_planes: JMethodID,
    close: JMethodID,
    get_row_stride: JMethodID,
    get_pixel_stride: JMethodID,
    get_buffer: JMethodID,
}

impl JniHandles {
    fn resolve(env: &mut JNIEnv) -> jni::errors::Result<Self> {
        let activity = env.find_class(ACTIVITY_CLASS)?;
        let reader = env.find_class(IMAGE_READER_CLASS)?;
        let image = env.find_class(IMAGE_CLASS)?;
        let plane = env.find_class(PLANE_CLASS)?;

        Ok(Self {
            instance_field: env.get_static_field_id(&activity, "sInstance", ACTIVITY_SIG)?,
            open_camera: env.get_method_id(&activity, "openCamera", "(III)V")?,
            image_reader_field: env.get_field_id(&activity, "mImageReader", IMAGE_READER_SIG)?,
            acquire_latest_image: env.get_method_id(
                &reader,
                "acquireLatestImage",
                "()Landroid/media/Image;",
            )?,
            get_format: env.get_method_id(&image, "getFormat", "()I")?,
            get_planes: env.get_method_id(
                &image,
                "getPlanes",
                "()[Landroid/media/Image$Plane;",
            )?,
            close: env.get_method_id(&image, "close", "()V")?,
            get_row_stride: env.get_method_id(&plane, "getRowStride", "()I")?,
            get_pixel_stride: env.get_method_id(&plane, "getPixelStride", "()I")?,
            get_buffer: env.get_method_id(&plane, "getBuffer", "()Ljava/nio/ByteBuffer;")?,
            activity_class: env.new_global_ref(&activity)?,
            _reader_class: env.new_global_ref(&reader)?,
            _image_class: env.new_global_ref(&image)?,
            _plane_class: env.new_global_ref(&plane)?,
        })
    }
}

fn jni_error(err: jni::errors::Error) -> CaptureError {
    CaptureError::FfiError {
        library: "jni".to_string(),
        message: err.to_string(),
    }
}

/// Resolve the camera host classes through `vm` and keep them for the process.
///
/// Must run on a thread whose class loader sees the application classes, such
/// as the thread running `JNI_OnLoad` or the activity's main thread. A second
/// registration fails with [`CaptureError::InvalidState`].
pub fn register_java_vm(vm: JavaVM) -> CaptureResult<()> {
    if RUNTIME.is_initialized() {
        return Err(CaptureError::InvalidState {
            message: "camera JNI handles already registered".to_string(),
        });
    }

    let handles = {
        let mut env = vm.attach_current_thread().map_err(jni_error)?;
        let resolved = JniHandles::resolve(&mut env);
        if resolved.is_err() && env.exception_check().unwrap_or(false) {
            let _ = env.exception_clear();
        }
        resolved.map_err(jni_error)?
    };

    RUNTIME.init(JniRuntime { vm, handles })?;
    info!("registered camera JNI handles");
    Ok(())
}

/// Whether [`register_java_vm`] has succeeded
pub fn is_registered() -> bool {
    RUNTIME.is_initialized()
}

/// [`CameraBridge`] over the registered Java VM
#[derive(Clone, Copy)]
pub struct JniCameraBridge {
    runtime: &'static JniRuntime,
}

impl std::fmt::Debug for JniCameraBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JniCameraBridge").finish_non_exhaustive()
    }
}

impl JniCameraBridge {
    /// Bridge over the handles resolved by [`register_java_vm`]
    pub fn new() -> CaptureResult<Self> {
        Ok(Self {
            runtime: RUNTIME.require()?,
        })
    }

    fn env(&self) -> Option<JNIEnv<'_>> {
        self.runtime.vm.get_env().ok()
    }

    fn activity_class(&self) -> &JClass<'static> {
        <&JClass>::from(self.runtime.handles.activity_class.as_obj())
    }
}

/// Take the object out of a call result, clearing any pending exception
fn object_result(
    env: &mut JNIEnv,
    result: jni::errors::Result<JValueOwned>,
) -> Option<jobject> {
    match result.and_then(|value| value.l()) {
        Ok(object) if !object.is_null() => Some(object.into_raw()),
        Ok(_) => None,
        Err(e) => {
            clear_exception(env);
            debug!("JNI object call failed: {}", e);
            None
        }
    }
}

fn int_result(env: &mut JNIEnv, result: jni::errors::Result<JValueOwned>) -> i32 {
    match result.and_then(|value| value.i()) {
        Ok(value) => value,
        Err(e) => {
            clear_exception(env);
            debug!("JNI int call failed: {}", e);
            0
        }
    }
}

fn clear_exception(env: &mut JNIEnv) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_clear();
    }
}

// SAFETY for every `from_raw` below: handles are live local references handed
// out by this bridge on the current thread and not yet released.
impl CameraBridge for JniCameraBridge {
    type Handle = jobject;

    fn attach(&self) -> Result<AttachToken, BridgeError> {
        if self.runtime.vm.get_env().is_ok() {
            return Ok(AttachToken::already_attached());
        }
        self.runtime
            .vm
            .attach_current_thread_permanently()
            .map(|_| AttachToken::attached())
            .map_err(|e| BridgeError::AttachFailed {
                reason: e.to_string(),
            })
    }

    fn detach(&self, token: AttachToken) {
        if token.attached_here() {
            // SAFETY: the thread was attached by `attach` and every local
            // reference taken under that attachment has been released.
            unsafe { self.runtime.vm.detach_current_thread() };
        }
    }

    fn release(&self, handle: jobject) {
        if let Some(mut env) = self.env() {
            let object = unsafe { JObject::from_raw(handle) };
            if let Err(e) = env.delete_local_ref(object) {
                warn!("failed to delete local reference: {}", e);
            }
        }
    }

    fn activity_instance(&self) -> Option<jobject> {
        let mut env = self.env()?;
        // SAFETY: `instance_field` is a static object field of the activity class
        let result = unsafe {
            env.get_static_field_unchecked(
                self.activity_class(),
                self.runtime.handles.instance_field,
                JavaType::Object(ACTIVITY_SIG.to_string()),
            )
        };
        object_result(&mut env, result)
    }

    fn open_camera(
        &self,
        activity: jobject,
        index: i32,
        width: i32,
        height: i32,
    ) -> Result<(), BridgeError> {
        let mut env = self.env().ok_or(BridgeError::NotInitialized)?;
        let activity = unsafe { JObject::from_raw(activity) };
        let args = [
            JValue::Int(index).as_jni(),
            JValue::Int(width).as_jni(),
            JValue::Int(height).as_jni(),
        ];
        // SAFETY: `open_camera` was resolved as `(III)V` on the activity class
        let result = unsafe {
            env.call_method_unchecked(
                &activity,
                self.runtime.handles.open_camera,
                ReturnType::Primitive(Primitive::Void),
                &args,
            )
        };
        result.map(|_| ()).map_err(|e| {
            clear_exception(&mut env);
            BridgeError::CallFailed {
                method: "openCamera",
                reason: e.to_string(),
            }
        })
    }

    fn image_reader(&self, activity: jobject) -> Option<jobject> {
        let mut env = self.env()?;
        let activity = unsafe { JObject::from_raw(activity) };
        // SAFETY: `image_reader_field` is an object field of the activity class
        let result = unsafe {
            env.get_field_unchecked(
                &activity,
                self.runtime.handles.image_reader_field,
                ReturnType::Object,
            )
        };
        object_result(&mut env, result)
    }

    fn acquire_latest_image(&self, reader: jobject) -> Option<jobject> {
        let mut env = self.env()?;
        let reader = unsafe { JObject::from_raw(reader) };
        // SAFETY: `acquire_latest_image` returns an `Image` and takes no arguments
        let result = unsafe {
            env.call_method_unchecked(
                &reader,
                self.runtime.handles.acquire_latest_image,
                ReturnType::Object,
                &[],
            )
        };
        object_result(&mut env, result)
    }

    fn image_format(&self, image: jobject) -> i32 {
        let Some(mut env) = self.env() else {
            return 0;
        };
        let image = unsafe { JObject::from_raw(image) };
        // SAFETY: `get_format` is `()I` on the image class
        let result = unsafe {
            env.call_method_unchecked(
                &image,
                self.runtime.handles.get_format,
                ReturnType::Primitive(Primitive::Int),
                &[],
            )
        };
        int_result(&mut env, result)
    }

    fn image_planes(&self, image: jobject) -> Option<jobject> {
        let mut env = self.env()?;
        let image = unsafe { JObject::from_raw(image) };
        // SAFETY: `get_planes` returns a plane array and takes no arguments
        let result = unsafe {
            env.call_method_unchecked(
                &image,
                self.runtime.handles.get_planes,
                ReturnType::Array,
                &[],
            )
        };
        object_result(&mut env, result)
    }

    fn plane_count(&self, planes: jobject) -> usize {
        let Some(env) = self.env() else {
            return 0;
        };
        let planes = unsafe { JObjectArray::from_raw(planes) };
        env.get_array_length(&planes)
            .map_or(0, |len| usize::try_from(len).unwrap_or(0))
    }

    fn plane(&self, planes: jobject, index: usize) -> Option<jobject> {
        let mut env = self.env()?;
        let planes = unsafe { JObjectArray::from_raw(planes) };
        let index = i32::try_from(index).ok()?;
        match env.get_object_array_element(&planes, index) {
            Ok(plane) if !plane.is_null() => Some(plane.into_raw()),
            Ok(_) => None,
            Err(e) => {
                clear_exception(&mut env);
                debug!("failed to read plane {}: {}", index, e);
                None
            }
        }
    }

    fn row_stride(&self, plane: jobject) -> i32 {
        let Some(mut env) = self.env() else {
            return 0;
        };
        let plane = unsafe { JObject::from_raw(plane) };
        // SAFETY: `get_row_stride` is `()I` on the plane class
        let result = unsafe {
            env.call_method_unchecked(
                &plane,
                self.runtime.handles.get_row_stride,
                ReturnType::Primitive(Primitive::Int),
                &[],
            )
        };
        int_result(&mut env, result)
    }

    fn pixel_stride(&self, plane: jobject) -> i32 {
        let Some(mut env) = self.env() else {
            return 0;
        };
        let plane = unsafe { JObject::from_raw(plane) };
        // SAFETY: `get_pixel_stride` is `()I` on the plane class
        let result = unsafe {
            env.call_method_unchecked(
                &plane,
                self.runtime.handles.get_pixel_stride,
                ReturnType::Primitive(Primitive::Int),
                &[],
            )
        };
        int_result(&mut env, result)
    }

    fn plane_buffer(&self, plane: jobject) -> Option<jobject> {
        let mut env = self.env()?;
        let plane = unsafe { JObject::from_raw(plane) };
        // SAFETY: `get_buffer` returns a `ByteBuffer` and takes no arguments
        let result = unsafe {
            env.call_method_unchecked(
                &plane,
                self.runtime.handles.get_buffer,
                ReturnType::Object,
                &[],
            )
        };
        object_result(&mut env, result)
    }

    fn direct_buffer(&self, buffer: jobject) -> Option<DirectBuffer> {
        let env = self.env()?;
        let buffer = unsafe { JByteBuffer::from_raw(buffer) };
        let address = env.get_direct_buffer_address(&buffer).ok()?;
        let capacity = env.get_direct_buffer_capacity(&buffer).ok()?;
        Some(DirectBuffer {
            address: address.cast_const(),
            capacity,
        })
    }

    fn close_image(&self, image: jobject) {
        let Some(mut env) = self.env() else {
            return;
        };
        let image = unsafe { JObject::from_raw(image) };
        // SAFETY: `close` is `()V` on the image class
        let result = unsafe {
            env.call_method_unchecked(
                &image,
                self.runtime.handles.close,
                ReturnType::Primitive(Primitive::Void),
                &[],
            )
        };
        if let Err(e) = result {
            clear_exception(&mut env);
            warn!("failed to close image: {}", e);
        }
    }
}
