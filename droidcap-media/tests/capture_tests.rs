//! Integration tests for the Android camera capture source
//!
//! Drives [`AndroidCameraCapture`] and [`CaptureSession`] against the counting
//! mock runtime to check the acquisition protocol end to end.

use std::sync::Arc;

use droidcap_core::{ColorFrame, VideoCapture};
use droidcap_media::*;

type MockCapture = AndroidCameraCapture<MockCameraBridge>;

fn started_capture(width: i32, height: i32, index: i32) -> (Arc<MockCameraBridge>, MockCapture) {
    let bridge = Arc::new(MockCameraBridge::new());
    let mut capture = AndroidCameraCapture::with_size(Arc::clone(&bridge), index, width, height);
    assert_eq!(capture.grab(), AcquireOutcome::Empty(NoFrame::OpenRequested));
    bridge.start_camera();
    (bridge, capture)
}

// ============================================================================
// LIFECYCLE TESTS
// ============================================================================

#[test]
fn test_open_then_acquire_scenario() {
    let bridge = Arc::new(MockCameraBridge::new());
    let mut capture = AndroidCameraCapture::new(Arc::clone(&bridge), 0);
    let mut frame = ColorFrame::default();

    // First grab only asks the activity to open the camera
    assert!(!capture.grab_frame());
    assert_eq!(bridge.stats().open_requests, vec![(0, 640, 480)]);
    assert_eq!(capture.state(), SessionState::Opening);

    // Reader not published yet
    assert!(!capture.grab_frame());
    assert_eq!(capture.state(), SessionState::Acquiring);
    assert_eq!(capture.stats().empty_by_reason.get("reader_not_ready"), Some(&1));

    bridge.start_camera();
    bridge.push_image(MockImage::semi_planar(640, 480));
    assert!(capture.grab_frame());
    assert_eq!(capture.layout(), ColorLayout::SemiPlanar);

    assert!(capture.retrieve_frame(0, &mut frame));
    assert_eq!((frame.width(), frame.height()), (480, 640));
    assert_eq!(frame.channels(), 3);
    assert_eq!(frame.pixel(0, 0), Some([130, 130, 130]));

    assert_eq!(bridge.stats().open_requests.len(), 1);
    assert!(bridge.stats().is_balanced());
}

#[test]
fn test_retrieve_before_grab_fails() {
    let bridge = Arc::new(MockCameraBridge::new());
    let mut capture = AndroidCameraCapture::new(bridge, 0);
    let mut frame = ColorFrame::new(2, 2);

    assert!(!capture.retrieve_frame(0, &mut frame));
    assert_eq!((frame.width(), frame.height()), (2, 2));
}

#[test]
fn test_retrieve_does_not_touch_runtime() {
    let (bridge, mut capture) = started_capture(4, 2, 0);
    bridge.push_image(MockImage::planar(4, 2));
    assert!(capture.grab_frame());

    let before = bridge.stats();
    let mut frame = ColorFrame::default();
    assert!(capture.retrieve_frame(0, &mut frame));
    assert!(capture.retrieve_frame(0, &mut frame));
    assert_eq!(bridge.stats(), before);
}

#[test]
fn test_failed_grab_invalidates_previous_frame() {
    let (bridge, mut capture) = started_capture(4, 2, 0);
    bridge.push_image(MockImage::semi_planar(4, 2));
    assert!(capture.grab_frame());

    assert!(!capture.grab_frame());
    let mut frame = ColorFrame::default();
    assert!(!capture.retrieve_frame(0, &mut frame));
    assert!(frame.is_empty());
}

#[test]
fn test_negative_size_reports_unavailable() {
    let bridge = Arc::new(MockCameraBridge::new());
    let mut capture = AndroidCameraCapture::new(Arc::clone(&bridge), 0);
    capture.set_property(4, -1.0);

    assert_eq!(capture.grab(), AcquireOutcome::Empty(NoFrame::CameraUnavailable));
    assert_eq!(capture.state(), SessionState::Closed);
    assert!(bridge.stats().open_requests.is_empty());
    assert_eq!(bridge.stats().attaches, 0);
}

#[test]
fn test_runtime_unavailable() {
    let bridge = Arc::new(MockCameraBridge::new());
    bridge.set_runtime_available(false);
    let mut capture = AndroidCameraCapture::new(Arc::clone(&bridge), 0);

    assert_eq!(capture.grab(), AcquireOutcome::Empty(NoFrame::RuntimeUnavailable));
    assert_eq!(capture.state(), SessionState::Closed);
    assert_eq!(bridge.stats().references_acquired, 0);
}

#[test]
fn test_resize_applies_to_classification() {
    let (bridge, mut capture) = started_capture(640, 480, 0);
    assert!(capture.set_property(3, 320.0));
    assert!(capture.set_property(4, 240.0));

    bridge.push_image(MockImage::semi_planar(640, 480));
    assert_eq!(capture.grab(), AcquireOutcome::Empty(NoFrame::UnrecognizedLayout));

    bridge.push_image(MockImage::semi_planar(320, 240));
    assert_eq!(capture.grab(), AcquireOutcome::Ready(ColorLayout::SemiPlanar));

    let mut frame = ColorFrame::default();
    assert!(capture.retrieve_frame(0, &mut frame));
    assert_eq!((frame.width(), frame.height()), (240, 320));
}

// ============================================================================
// RESOURCE RELEASE TESTS
// ============================================================================

#[test]
fn test_every_rejection_releases_references() {
    let rejected = [
        (
            MockImage::semi_planar(640, 480).with_format(0x11),
            NoFrame::UnexpectedFormat(0x11),
        ),
        (
            MockImage::semi_planar(640, 480).without_planes(),
            NoFrame::PlanesUnavailable,
        ),
        (
            MockImage::semi_planar(640, 480).with_plane_count(1),
            NoFrame::PlaneCount(1),
        ),
        (
            MockImage::planar(640, 480).with_plane_count(4),
            NoFrame::PlaneCount(4),
        ),
        (MockImage::nv12(640, 480), NoFrame::UnrecognizedLayout),
        (
            MockImage::semi_planar(640, 480).with_pixel_stride(1, 1),
            NoFrame::UnrecognizedLayout,
        ),
        (MockImage::planar(320, 240), NoFrame::UnrecognizedLayout),
    ];
    let missing_buffers = (0..3).flat_map(|plane| {
        [
            (
                MockImage::semi_planar(640, 480).without_buffer(plane),
                NoFrame::BufferUnavailable,
            ),
            (
                MockImage::planar(640, 480).without_direct_buffer(plane),
                NoFrame::BufferUnavailable,
            ),
        ]
    });
    let rejected = rejected.into_iter().chain(missing_buffers);

    for (image, reason) in rejected {
        let (bridge, mut capture) = started_capture(640, 480, 0);
        bridge.push_image(image);
        assert_eq!(capture.grab(), AcquireOutcome::Empty(reason));

        let stats = bridge.stats();
        assert!(stats.is_balanced(), "unbalanced after {reason}: {stats:?}");
        assert_eq!(stats.images_acquired, 1);
        assert_eq!(stats.images_closed, 1);
        assert_eq!(stats.attaches, stats.detaches);
        assert_eq!(bridge.held_images(), 0);
    }
}

#[test]
fn test_failed_open_request_releases_references() {
    let bridge = Arc::new(MockCameraBridge::new());
    bridge.set_open_fails(true);
    let mut capture = AndroidCameraCapture::new(Arc::clone(&bridge), 0);

    assert_eq!(capture.grab(), AcquireOutcome::Empty(NoFrame::OpenFailed));
    assert_eq!(capture.state(), SessionState::Closed);
    let stats = bridge.stats();
    assert!(stats.is_balanced());
    assert_eq!(stats.references_acquired, 1);
    assert_eq!(stats.attaches, stats.detaches);

    // Still closed, so the next grab asks again
    bridge.set_open_fails(false);
    assert_eq!(capture.grab(), AcquireOutcome::Empty(NoFrame::OpenRequested));
    assert_eq!(capture.state(), SessionState::Opening);
}

#[test]
fn test_closed_frames_do_not_accumulate() {
    let bridge = MockCameraBridge::new();
    let mut session = CaptureSession::new(0);
    session.grab(&bridge);
    bridge.start_camera();

    for _ in 0..50 {
        bridge.push_image(MockImage::semi_planar(640, 480));
        assert!(session.grab(&bridge).is_ready());
    }

    assert_eq!(bridge.held_images(), 0);
    assert_eq!(bridge.stats().images_closed, 50);
    assert!(bridge.stats().is_balanced());
}

#[test]
fn test_missing_collaborators_release_references() {
    let (bridge, mut capture) = started_capture(640, 480, 0);
    assert_eq!(capture.grab(), AcquireOutcome::Empty(NoFrame::NoNewImage));
    assert!(bridge.stats().is_balanced());

    bridge.set_activity_available(false);
    assert_eq!(capture.grab(), AcquireOutcome::Empty(NoFrame::ActivityUnavailable));
    assert!(bridge.stats().is_balanced());
    assert_eq!(bridge.stats().attaches, bridge.stats().detaches);
}

#[test]
fn test_success_releases_references() {
    let (bridge, mut capture) = started_capture(640, 480, 0);
    for _ in 0..3 {
        bridge.push_image(MockImage::planar(640, 480));
        assert!(capture.grab_frame());
    }

    let stats = bridge.stats();
    assert!(stats.is_balanced());
    assert_eq!(stats.images_closed, 3);
    assert_eq!(stats.attaches, 4);
    assert_eq!(stats.detaches, 4);
}

#[test]
fn test_already_attached_thread_stays_attached() {
    let bridge = Arc::new(MockCameraBridge::new());
    bridge.set_thread_attached(true);
    let mut capture = AndroidCameraCapture::with_size(Arc::clone(&bridge), 0, 4, 2);

    capture.grab();
    bridge.start_camera();
    bridge.push_image(MockImage::semi_planar(4, 2));
    assert!(capture.grab_frame());

    let stats = bridge.stats();
    assert_eq!(stats.attaches, 0);
    assert_eq!(stats.detaches, 0);
    assert_eq!(stats.invalid_detaches, 0);
    assert!(stats.is_balanced());
}

// ============================================================================
// FRAME CONTENT TESTS
// ============================================================================

#[test]
fn test_latest_image_wins() {
    let (bridge, mut capture) = started_capture(4, 2, 0);
    bridge.push_image(MockImage::semi_planar_filled(4, 2, 16, 128, 128));
    bridge.push_image(MockImage::semi_planar_filled(4, 2, 16, 128, 128));
    bridge.push_image(MockImage::semi_planar_filled(4, 2, 235, 128, 128));

    assert!(capture.grab_frame());
    let mut frame = ColorFrame::default();
    assert!(capture.retrieve_frame(0, &mut frame));
    assert!(frame.data().iter().all(|&b| b == 255));
    assert_eq!(bridge.stats().images_dropped, 2);
    assert_eq!(bridge.queued_images(), 0);
}

#[test]
fn test_buffer_holds_luma_and_half_chroma() {
    let bridge = MockCameraBridge::new();
    let mut session = CaptureSession::new(0);
    session.grab(&bridge);
    bridge.start_camera();

    bridge.push_image(MockImage::semi_planar(640, 480));
    assert!(session.grab(&bridge).is_ready());
    assert_eq!(session.frame().len(), 460_800);

    bridge.push_image(MockImage::planar(640, 480));
    assert!(session.grab(&bridge).is_ready());
    assert_eq!(session.frame().len(), 460_800);
}

#[test]
fn test_short_planar_chroma_rejected() {
    // 3x2 luma leaves chroma planes too short for a full half-size copy
    let (bridge, mut capture) = started_capture(3, 2, 0);
    bridge.push_image(MockImage::planar(3, 2));
    assert_eq!(capture.grab(), AcquireOutcome::Empty(NoFrame::UnrecognizedLayout));
    assert!(bridge.stats().is_balanced());
}

fn marked_image() -> MockImage {
    // 4x2 black image with one white pixel in the top-left corner
    let mut data = vec![16u8; 8];
    data[0] = 235;
    data.extend([128u8; 4]);
    MockImage::from_nv21(4, 2, data)
}

#[test]
fn test_orientation_by_camera_index() {
    let white = Some([255, 255, 255]);

    let (bridge, mut back) = started_capture(4, 2, 0);
    bridge.push_image(marked_image());
    let mut frame = ColorFrame::default();
    assert!(back.read(&mut frame));
    assert_eq!((frame.width(), frame.height()), (2, 4));
    assert_eq!(frame.pixel(1, 0), white);
    assert_eq!(frame.pixel(0, 0), Some([0, 0, 0]));

    let (bridge, mut front) = started_capture(4, 2, 1);
    bridge.push_image(marked_image());
    let mut frame = ColorFrame::default();
    assert!(front.read(&mut frame));
    assert_eq!((frame.width(), frame.height()), (2, 4));
    assert_eq!(frame.pixel(1, 3), white);
    assert_eq!(frame.pixel(1, 0), Some([0, 0, 0]));
}

#[test]
fn test_stats_count_outcomes() {
    let (bridge, mut capture) = started_capture(4, 2, 0);
    bridge.push_image(MockImage::semi_planar(4, 2));
    capture.grab();

    let stats = capture.stats();
    assert_eq!(stats.grabs, 2);
    assert_eq!(stats.frames_ready, 1);
    assert_eq!(stats.frames_empty(), 1);
}
