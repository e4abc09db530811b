//! In-process camera runtime for tests and hosts without a camera
//!
//! [`MockCameraBridge`] models the host camera activity, its image reader and
//! the images it hands out, backed by plain byte vectors laid out the way
//! Android vendors lay out YUV 4:2:0 buffers. It counts every reference it
//! hands out and every release, image close, attach and detach, so callers can
//! check that each acquisition path returns what it borrowed.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bridge::{
    AttachToken, BridgeError, CameraBridge, DirectBuffer, IMAGE_FORMAT_YUV_420_888,
};

/// Reference handed out by [`MockCameraBridge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockHandle(u64);

/// One plane of a [`MockImage`], as an offset into the image storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPlane {
    /// Byte offset of the plane in the image storage
    pub offset: usize,
    /// Buffer capacity reported for the plane
    pub len: usize,
    /// Distance between samples
    pub pixel_stride: i32,
    /// Distance between rows
    pub row_stride: i32,
}

/// Image queued on the mock reader
#[derive(Debug, Clone)]
pub struct MockImage {
    format: i32,
    storage: Vec<u8>,
    planes: Vec<MockPlane>,
    planes_missing: bool,
    buffer_missing: Option<usize>,
    direct_missing: Option<usize>,
}

impl MockImage {
    /// Image with arbitrary storage and planes
    pub fn from_parts(format: i32, storage: Vec<u8>, planes: Vec<MockPlane>) -> Self {
        let planes = planes
            .into_iter()
            .filter(|p| p.offset + p.len <= storage.len())
            .collect();
        Self {
            format,
            storage,
            planes,
            planes_missing: false,
            buffer_missing: None,
            direct_missing: None,
        }
    }

    /// NV21 bytes (luma, then V/U pairs) exposed the way vendors expose
    /// semi-planar output: plane 2 starts the interleaved run, plane 1 is one
    /// byte behind it
    pub fn from_nv21(width: usize, height: usize, mut data: Vec<u8>) -> Self {
        let luma = width * height;
        data.resize(luma + luma / 2, 0);
        let chroma_len = (luma / 2).saturating_sub(1);
        let planes = vec![
            MockPlane {
                offset: 0,
                len: luma,
                pixel_stride: 1,
                row_stride: width as i32,
            },
            MockPlane {
                offset: luma + 1,
                len: chroma_len,
                pixel_stride: 2,
                row_stride: width as i32,
            },
            MockPlane {
                offset: luma,
                len: chroma_len,
                pixel_stride: 2,
                row_stride: width as i32,
            },
        ];
        Self::from_parts(IMAGE_FORMAT_YUV_420_888, data, planes)
    }

    /// YV12 bytes (luma, V plane, U plane) exposed as three adjacent planes
    pub fn from_yv12(width: usize, height: usize, mut data: Vec<u8>) -> Self {
        let luma = width * height;
        let chroma_len = luma / 4;
        data.resize(luma + 2 * chroma_len, 0);
        let planes = vec![
            MockPlane {
                offset: 0,
                len: luma,
                pixel_stride: 1,
                row_stride: width as i32,
            },
            MockPlane {
                offset: luma + chroma_len,
                len: chroma_len,
                pixel_stride: 1,
                row_stride: (width / 2) as i32,
            },
            MockPlane {
                offset: luma,
                len: chroma_len,
                pixel_stride: 1,
                row_stride: (width / 2) as i32,
            },
        ];
        Self::from_parts(IMAGE_FORMAT_YUV_420_888, data, planes)
    }

    /// Semi-planar image with constant Y, U and V samples
    pub fn semi_planar_filled(width: usize, height: usize, y: u8, u: u8, v: u8) -> Self {
        let luma = width * height;
        let mut data = vec![y; luma];
        for _ in 0..luma / 4 {
            data.push(v);
            data.push(u);
        }
        Self::from_nv21(width, height, data)
    }

    /// Planar image with constant Y, U and V samples
    pub fn planar_filled(width: usize, height: usize, y: u8, u: u8, v: u8) -> Self {
        let luma = width * height;
        let mut data = vec![y; luma];
        data.extend(std::iter::repeat(v).take(luma / 4));
        data.extend(std::iter::repeat(u).take(luma / 4));
        Self::from_yv12(width, height, data)
    }

    /// Mid-gray semi-planar image
    pub fn semi_planar(width: usize, height: usize) -> Self {
        Self::semi_planar_filled(width, height, 128, 128, 128)
    }

    /// Mid-gray planar image
    pub fn planar(width: usize, height: usize) -> Self {
        Self::planar_filled(width, height, 128, 128, 128)
    }

    /// Interleaved chroma with U ahead of V (NV12 order), which is not accepted
    pub fn nv12(width: usize, height: usize) -> Self {
        let mut image = Self::semi_planar(width, height);
        let luma = width * height;
        if let [_, u, v] = image.planes.as_mut_slice() {
            u.offset = luma;
            v.offset = luma + 1;
        }
        image
    }

    /// Override the declared format
    pub fn with_format(mut self, format: i32) -> Self {
        self.format = format;
        self
    }

    /// Truncate the plane list, or repeat the last plane, to `count` planes
    pub fn with_plane_count(mut self, count: usize) -> Self {
        match self.planes.last().copied() {
            Some(last) => self.planes.resize(count, last),
            None => self.planes.clear(),
        }
        self
    }

    /// Report a null plane array
    pub fn without_planes(mut self) -> Self {
        self.planes_missing = true;
        self
    }

    /// Report a null `ByteBuffer` for one plane
    pub fn without_buffer(mut self, plane: usize) -> Self {
        self.buffer_missing = Some(plane);
        self
    }

    /// Report a buffer without a direct address for one plane
    pub fn without_direct_buffer(mut self, plane: usize) -> Self {
        self.direct_missing = Some(plane);
        self
    }

    /// Override the pixel stride of one plane
    pub fn with_pixel_stride(mut self, plane: usize, stride: i32) -> Self {
        if let Some(p) = self.planes.get_mut(plane) {
            p.pixel_stride = stride;
        }
        self
    }
}

/// Counters recorded by [`MockCameraBridge`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    /// References handed out
    pub references_acquired: u64,
    /// References released
    pub references_released: u64,
    /// Releases of references that were not live
    pub invalid_releases: u64,
    /// Calls made with references that were not live
    pub stale_uses: u64,
    /// Images handed out by the reader
    pub images_acquired: u64,
    /// Images closed
    pub images_closed: u64,
    /// Close calls on already closed images
    pub double_closes: u64,
    /// Queued images skipped by latest-image acquisition
    pub images_dropped: u64,
    /// Threads attached by the bridge
    pub attaches: u64,
    /// Threads detached by the bridge
    pub detaches: u64,
    /// Detach calls for tokens that did not attach
    pub invalid_detaches: u64,
    /// `openCamera` calls as (index, width, height)
    pub open_requests: Vec<(i32, i32, i32)>,
}

impl MockStats {
    /// References handed out and not yet released
    pub fn live_references(&self) -> u64 {
        self.references_acquired - self.references_released
    }

    /// Images handed out and not yet closed
    pub fn open_images(&self) -> u64 {
        self.images_acquired - self.images_closed
    }

    /// Every reference released exactly once and every image closed exactly once
    pub fn is_balanced(&self) -> bool {
        self.live_references() == 0
            && self.open_images() == 0
            && self.invalid_releases == 0
            && self.stale_uses == 0
            && self.double_closes == 0
    }
}

#[derive(Debug, Clone, Copy)]
enum MockObject {
    Activity,
    Reader,
    Image(u64),
    Planes(u64),
    Plane(u64, usize),
    Buffer(u64, usize),
}

#[derive(Debug)]
struct MockState {
    next_id: u64,
    next_image: u64,
    live: HashMap<u64, MockObject>,
    images: HashMap<u64, MockImage>,
    closed_ids: HashSet<u64>,
    queue: VecDeque<MockImage>,
    runtime_available: bool,
    activity_available: bool,
    camera_started: bool,
    thread_attached: bool,
    open_fails: bool,
    stats: MockStats,
}

impl MockState {
    fn new_ref(&mut self, object: MockObject) -> MockHandle {
        self.next_id += 1;
        self.live.insert(self.next_id, object);
        self.stats.references_acquired += 1;
        MockHandle(self.next_id)
    }

    fn lookup(&mut self, handle: MockHandle) -> Option<MockObject> {
        let object = self.live.get(&handle.0).copied();
        if object.is_none() {
            warn!(?handle, "mock bridge used with a reference that is not live");
            self.stats.stale_uses += 1;
        }
        object
    }

    fn image(&mut self, handle: MockHandle) -> Option<&MockImage> {
        match self.lookup(handle)? {
            MockObject::Image(id) | MockObject::Planes(id) => self.images.get(&id),
            _ => None,
        }
    }

    fn plane(&mut self, handle: MockHandle) -> Option<MockPlane> {
        match self.lookup(handle)? {
            MockObject::Plane(id, index) | MockObject::Buffer(id, index) => {
                self.images.get(&id)?.planes.get(index).copied()
            }
            _ => None,
        }
    }

    /// Drop the storage of a closed image once no live reference points into it
    fn collect(&mut self, id: u64) {
        if !self.closed_ids.contains(&id) {
            return;
        }
        let referenced = self.live.values().any(|object| image_id(*object) == Some(id));
        if !referenced {
            self.images.remove(&id);
            self.closed_ids.remove(&id);
        }
    }
}

fn image_id(object: MockObject) -> Option<u64> {
    match object {
        MockObject::Image(id)
        | MockObject::Planes(id)
        | MockObject::Plane(id, _)
        | MockObject::Buffer(id, _) => Some(id),
        MockObject::Activity | MockObject::Reader => None,
    }
}

/// Camera runtime simulated in memory
#[derive(Debug)]
pub struct MockCameraBridge {
    state: Mutex<MockState>,
}

impl MockCameraBridge {
    /// Runtime available, activity present, camera not started, thread detached
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 0,
                next_image: 0,
                live: HashMap::new(),
                images: HashMap::new(),
                closed_ids: HashSet::new(),
                queue: VecDeque::new(),
                runtime_available: true,
                activity_available: true,
                camera_started: false,
                thread_attached: false,
                open_fails: false,
                stats: MockStats::default(),
            }),
        }
    }

    /// Publish the image reader, as the activity does once the camera runs
    pub fn start_camera(&self) {
        self.state.lock().camera_started = true;
    }

    /// Queue an image on the reader
    pub fn push_image(&self, image: MockImage) {
        self.state.lock().queue.push_back(image);
    }

    /// Make attach calls fail
    pub fn set_runtime_available(&self, available: bool) {
        self.state.lock().runtime_available = available;
    }

    /// Make the activity singleton null
    pub fn set_activity_available(&self, available: bool) {
        self.state.lock().activity_available = available;
    }

    /// Pretend the calling thread was attached by someone else
    pub fn set_thread_attached(&self, attached: bool) {
        self.state.lock().thread_attached = attached;
    }

    /// Make `openCamera` calls fail
    pub fn set_open_fails(&self, fails: bool) {
        self.state.lock().open_fails = fails;
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> MockStats {
        self.state.lock().stats.clone()
    }

    /// Images still queued on the reader
    pub fn queued_images(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Acquired images whose storage is still held
    pub fn held_images(&self) -> usize {
        self.state.lock().images.len()
    }
}

impl Default for MockCameraBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBridge for MockCameraBridge {
    type Handle = MockHandle;

    fn attach(&self) -> Result<AttachToken, BridgeError> {
        let mut state = self.state.lock();
        if !state.runtime_available {
            return Err(BridgeError::NotInitialized);
        }
        if state.thread_attached {
            return Ok(AttachToken::already_attached());
        }
        state.thread_attached = true;
        state.stats.attaches += 1;
        Ok(AttachToken::attached())
    }

    fn detach(&self, token: AttachToken) {
        let mut state = self.state.lock();
        if !token.attached_here() {
            state.stats.invalid_detaches += 1;
            return;
        }
        state.thread_attached = false;
        state.stats.detaches += 1;
    }

    fn release(&self, handle: MockHandle) {
        let mut state = self.state.lock();
        if let Some(object) = state.live.remove(&handle.0) {
            state.stats.references_released += 1;
            if let Some(id) = image_id(object) {
                state.collect(id);
            }
        } else {
            warn!(?handle, "mock bridge released a reference twice");
            state.stats.invalid_releases += 1;
        }
    }

    fn activity_instance(&self) -> Option<MockHandle> {
        let mut state = self.state.lock();
        if !state.activity_available {
            return None;
        }
        Some(state.new_ref(MockObject::Activity))
    }

    fn open_camera(
        &self,
        activity: MockHandle,
        index: i32,
        width: i32,
        height: i32,
    ) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        match state.lookup(activity) {
            Some(MockObject::Activity) if state.open_fails => Err(BridgeError::CallFailed {
                method: "openCamera",
                reason: "camera service refused the request".to_string(),
            }),
            Some(MockObject::Activity) => {
                debug!(index, width, height, "mock camera open requested");
                state.stats.open_requests.push((index, width, height));
                Ok(())
            }
            _ => Err(BridgeError::CallFailed {
                method: "openCamera",
                reason: "receiver is not the camera activity".to_string(),
            }),
        }
    }

    fn image_reader(&self, activity: MockHandle) -> Option<MockHandle> {
        let mut state = self.state.lock();
        match state.lookup(activity)? {
            MockObject::Activity if state.camera_started => {
                Some(state.new_ref(MockObject::Reader))
            }
            _ => None,
        }
    }

    fn acquire_latest_image(&self, reader: MockHandle) -> Option<MockHandle> {
        let mut state = self.state.lock();
        if !matches!(state.lookup(reader)?, MockObject::Reader) {
            return None;
        }
        let image = state.queue.pop_back()?;
        let dropped = state.queue.len() as u64;
        state.queue.clear();
        state.stats.images_dropped += dropped;
        state.stats.images_acquired += 1;

        state.next_image += 1;
        let id = state.next_image;
        state.images.insert(id, image);
        Some(state.new_ref(MockObject::Image(id)))
    }

    fn image_format(&self, image: MockHandle) -> i32 {
        let mut state = self.state.lock();
        state.image(image).map_or(0, |held| held.format)
    }

    fn image_planes(&self, image: MockHandle) -> Option<MockHandle> {
        let mut state = self.state.lock();
        let id = match state.lookup(image)? {
            MockObject::Image(id) => id,
            _ => return None,
        };
        if state.images.get(&id)?.planes_missing {
            return None;
        }
        Some(state.new_ref(MockObject::Planes(id)))
    }

    fn plane_count(&self, planes: MockHandle) -> usize {
        let mut state = self.state.lock();
        state.image(planes).map_or(0, |held| held.planes.len())
    }

    fn plane(&self, planes: MockHandle, index: usize) -> Option<MockHandle> {
        let mut state = self.state.lock();
        let id = match state.lookup(planes)? {
            MockObject::Planes(id) => id,
            _ => return None,
        };
        if index >= state.images.get(&id)?.planes.len() {
            return None;
        }
        Some(state.new_ref(MockObject::Plane(id, index)))
    }

    fn row_stride(&self, plane: MockHandle) -> i32 {
        let mut state = self.state.lock();
        state.plane(plane).map_or(0, |p| p.row_stride)
    }

    fn pixel_stride(&self, plane: MockHandle) -> i32 {
        let mut state = self.state.lock();
        state.plane(plane).map_or(0, |p| p.pixel_stride)
    }

    fn plane_buffer(&self, plane: MockHandle) -> Option<MockHandle> {
        let mut state = self.state.lock();
        let (id, index) = match state.lookup(plane)? {
            MockObject::Plane(id, index) => (id, index),
            _ => return None,
        };
        if state.images.get(&id)?.buffer_missing == Some(index) {
            return None;
        }
        Some(state.new_ref(MockObject::Buffer(id, index)))
    }

    fn direct_buffer(&self, buffer: MockHandle) -> Option<DirectBuffer> {
        let mut state = self.state.lock();
        let (id, index) = match state.lookup(buffer)? {
            MockObject::Buffer(id, index) => (id, index),
            _ => return None,
        };
        let held = state.images.get(&id)?;
        if held.direct_missing == Some(index) {
            return None;
        }
        let plane = held.planes.get(index)?;
        Some(DirectBuffer {
            address: held.storage.as_ptr().wrapping_add(plane.offset),
            capacity: plane.len,
        })
    }

    fn close_image(&self, image: MockHandle) {
        let mut state = self.state.lock();
        let id = match state.lookup(image) {
            Some(MockObject::Image(id)) => id,
            _ => return,
        };
        if !state.closed_ids.insert(id) {
            state.stats.double_closes += 1;
            return;
        }
        state.stats.images_closed += 1;
        state.collect(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_image_drops_backlog() {
        let bridge = MockCameraBridge::new();
        bridge.start_camera();
        bridge.push_image(MockImage::semi_planar(4, 2).with_format(1));
        bridge.push_image(MockImage::semi_planar(4, 2));

        let activity = bridge.activity_instance().unwrap();
        let reader = bridge.image_reader(activity).unwrap();
        let image = bridge.acquire_latest_image(reader).unwrap();

        assert_eq!(bridge.image_format(image), IMAGE_FORMAT_YUV_420_888);
        assert_eq!(bridge.queued_images(), 0);
        assert_eq!(bridge.stats().images_dropped, 1);
        assert!(bridge.acquire_latest_image(reader).is_none());

        bridge.close_image(image);
        for handle in [image, reader, activity] {
            bridge.release(handle);
        }
        assert!(bridge.stats().is_balanced());
    }

    #[test]
    fn test_reader_absent_until_started() {
        let bridge = MockCameraBridge::new();
        let activity = bridge.activity_instance().unwrap();
        assert!(bridge.image_reader(activity).is_none());

        bridge.start_camera();
        let reader = bridge.image_reader(activity).unwrap();
        bridge.release(reader);
        bridge.release(activity);
        assert!(bridge.stats().is_balanced());
    }

    #[test]
    fn test_nv21_plane_geometry() {
        let bridge = MockCameraBridge::new();
        bridge.start_camera();
        bridge.push_image(MockImage::semi_planar(4, 2));

        let activity = bridge.activity_instance().unwrap();
        let reader = bridge.image_reader(activity).unwrap();
        let image = bridge.acquire_latest_image(reader).unwrap();
        let planes = bridge.image_planes(image).unwrap();
        assert_eq!(bridge.plane_count(planes), 3);

        let mut spans = Vec::new();
        let mut handles = vec![activity, reader, image, planes];
        for index in 0..3 {
            let plane = bridge.plane(planes, index).unwrap();
            let buffer = bridge.plane_buffer(plane).unwrap();
            spans.push(bridge.direct_buffer(buffer).unwrap());
            handles.extend([plane, buffer]);
        }

        assert_eq!(spans[0].capacity, 8);
        assert_eq!(spans[1].capacity, 3);
        assert_eq!(spans[1].address as usize, spans[2].address as usize + 1);

        bridge.close_image(image);
        bridge.close_image(image);
        for handle in handles {
            bridge.release(handle);
        }
        let stats = bridge.stats();
        assert_eq!(stats.double_closes, 1);
        assert_eq!(stats.live_references(), 0);
    }

    #[test]
    fn test_closed_image_storage_freed_after_last_release() {
        let bridge = MockCameraBridge::new();
        bridge.start_camera();
        bridge.push_image(MockImage::planar(4, 2));

        let activity = bridge.activity_instance().unwrap();
        let reader = bridge.image_reader(activity).unwrap();
        let image = bridge.acquire_latest_image(reader).unwrap();
        let planes = bridge.image_planes(image).unwrap();

        bridge.close_image(image);
        bridge.release(image);
        // The plane array still points into the image
        assert_eq!(bridge.held_images(), 1);

        bridge.release(planes);
        assert_eq!(bridge.held_images(), 0);

        bridge.release(reader);
        bridge.release(activity);
        assert!(bridge.stats().is_balanced());
    }

    #[test]
    fn test_unclosed_image_storage_kept() {
        let bridge = MockCameraBridge::new();
        bridge.start_camera();
        bridge.push_image(MockImage::planar(4, 2));

        let activity = bridge.activity_instance().unwrap();
        let reader = bridge.image_reader(activity).unwrap();
        let image = bridge.acquire_latest_image(reader).unwrap();
        bridge.release(image);

        assert_eq!(bridge.held_images(), 1);
        assert_eq!(bridge.stats().open_images(), 1);
    }

    #[test]
    fn test_buffer_knobs_hit_only_their_plane() {
        let bridge = MockCameraBridge::new();
        bridge.start_camera();
        bridge.push_image(MockImage::planar(4, 2).without_buffer(1).without_direct_buffer(2));

        let activity = bridge.activity_instance().unwrap();
        let reader = bridge.image_reader(activity).unwrap();
        let image = bridge.acquire_latest_image(reader).unwrap();
        let planes = bridge.image_planes(image).unwrap();
        let mut handles = vec![activity, reader, image, planes];

        let luma = bridge.plane(planes, 0).unwrap();
        let luma_buffer = bridge.plane_buffer(luma).unwrap();
        assert!(bridge.direct_buffer(luma_buffer).is_some());

        let v = bridge.plane(planes, 1).unwrap();
        assert!(bridge.plane_buffer(v).is_none());

        let u = bridge.plane(planes, 2).unwrap();
        let u_buffer = bridge.plane_buffer(u).unwrap();
        assert!(bridge.direct_buffer(u_buffer).is_none());

        handles.extend([luma, luma_buffer, v, u, u_buffer]);
        bridge.close_image(image);
        for handle in handles {
            bridge.release(handle);
        }
        assert!(bridge.stats().is_balanced());
        assert_eq!(bridge.held_images(), 0);
    }

    #[test]
    fn test_open_failure_switch() {
        let bridge = MockCameraBridge::new();
        bridge.set_open_fails(true);
        let activity = bridge.activity_instance().unwrap();
        assert!(bridge.open_camera(activity, 0, 640, 480).is_err());
        assert!(bridge.stats().open_requests.is_empty());

        bridge.set_open_fails(false);
        assert!(bridge.open_camera(activity, 0, 640, 480).is_ok());
        bridge.release(activity);
        assert!(bridge.stats().is_balanced());
    }

    #[test]
    fn test_double_release_is_recorded() {
        let bridge = MockCameraBridge::new();
        let activity = bridge.activity_instance().unwrap();
        bridge.release(activity);
        bridge.release(activity);
        assert_eq!(bridge.stats().invalid_releases, 1);
        assert!(!bridge.stats().is_balanced());
    }
}
