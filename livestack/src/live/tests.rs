//! End-to-end tests of the live stacking pipeline on synthetic star fields.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::CancellationToken;
use glam::DVec2;
use parking_lot::Mutex;
use tempfile::TempDir;

use super::*;
use crate::calibration_masters::{CalibrationFrameMeta, CalibrationLibrary, CalibrationSession};
use crate::image_io::ImageCodec;
use crate::registration::RegistrationError;
use crate::testing::{RawCodec, detected_stars, render_star_field, star_positions, write_raw};

const W: usize = 160;
const H: usize = 120;

fn config(dir: &Path) -> LiveStackConfig {
    LiveStackConfig {
        working_dir: dir.to_path_buf(),
        hot_pixel_removal: false,
        ..Default::default()
    }
}

fn session(dir: &Path, library: CalibrationLibrary) -> LiveStackSession {
    LiveStackSession::new(config(dir), library, Arc::new(RawCodec))
}

fn item(path: PathBuf, filter: &str, positions: &[DVec2]) -> LiveStackItem {
    LiveStackItem {
        path,
        target: "M31".to_string(),
        filter: filter.to_string(),
        exposure_time: 60.0,
        gain: 100,
        offset: 10,
        width: W,
        height: H,
        bit_depth: 16,
        bayered: false,
        hfr: 2.0,
        rms: None,
        stars: detected_stars(positions),
    }
}

/// Writes `count` copies of one star field and returns their items.
fn identical_frames(dir: &Path, count: usize, positions: &[DVec2], pixels: &[f32]) -> Vec<LiveStackItem> {
    (0..count)
        .map(|i| item(write_raw(dir, &format!("light_{i}.raw"), W, H, pixels), "L", positions))
        .collect()
}

fn read_stack(path: &Path) -> (Vec<f32>, Option<f64>) {
    let mut source = RawCodec.open(path).unwrap();
    let count = source.read_header_f64("IMGCOUNT");
    (source.read_all().unwrap(), count)
}

#[test]
fn test_identical_frames_stack_to_the_frame() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(30, W, H, 11);
    let field = render_star_field(W, H, &positions, 0.05);
    let items = identical_frames(dir.path(), 3, &positions, &field);
    let mut session = session(dir.path(), CalibrationLibrary::new());

    let key = BagKey::new("M31", "L");
    assert_eq!(session.process_item(&items[0]).unwrap(), FrameOutcome::Seeded(key.clone()));
    assert_eq!(
        session.process_item(&items[1]).unwrap(),
        FrameOutcome::Stacked {
            key: key.clone(),
            count: 2
        }
    );
    session.process_item(&items[2]).unwrap();

    let bag = session.bag(&key).unwrap();
    assert_eq!(bag.count(), 3);
    for (i, (s, f)) in bag.stack().unwrap().iter().zip(&field).enumerate() {
        assert!((s - f).abs() < 1e-4, "pixel {i}: {s} vs {f}");
    }

    let (saved, count) = read_stack(&bag.stack_path(dir.path(), &RawCodec));
    assert_eq!(count, Some(3.0));
    assert_eq!(saved.as_slice(), bag.stack().unwrap());
}

#[test]
fn test_shifted_frame_is_aligned_before_stacking() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(30, W, H, 12);
    let reference = render_star_field(W, H, &positions, 0.05);
    let shifted_positions: Vec<DVec2> = positions.iter().map(|&p| p + DVec2::new(3.0, 2.0)).collect();
    let shifted = render_star_field(W, H, &shifted_positions, 0.05);

    let mut session = session(dir.path(), CalibrationLibrary::new());
    let first = item(write_raw(dir.path(), "a.raw", W, H, &reference), "L", &positions);
    let second = item(write_raw(dir.path(), "b.raw", W, H, &shifted), "L", &shifted_positions);
    session.process_item(&first).unwrap();
    session.process_item(&second).unwrap();

    let stack = session.bag(&BagKey::new("M31", "L")).unwrap().stack().unwrap();
    for y in 0..H - 3 {
        for x in 0..W - 4 {
            let i = y * W + x;
            assert!((stack[i] - reference[i]).abs() < 1e-4, "pixel ({x}, {y})");
        }
    }
}

#[test]
fn test_calibration_is_applied_before_stacking() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(20, W, H, 13);
    let field = render_star_field(W, H, &positions, 0.1);
    let dark = write_raw(dir.path(), "dark.raw", W, H, &vec![0.02; W * H]);
    let mut library = CalibrationLibrary::new();
    library.register(CalibrationFrameMeta::dark(dark, 100, 10, 60.0, W, H));

    let mut session = session(dir.path(), library);
    let items = identical_frames(dir.path(), 1, &positions, &field);
    session.process_item(&items[0]).unwrap();

    let stack = session.bag(&BagKey::new("M31", "L")).unwrap().stack().unwrap();
    assert!((stack[0] - 0.08).abs() < 1e-6);
}

#[test]
fn test_frames_are_screened() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(5, W, H, 14);
    let field = render_star_field(W, H, &positions, 0.05);
    let mut session = session(dir.path(), CalibrationLibrary::new());

    let sparse = item(write_raw(dir.path(), "sparse.raw", W, H, &field), "L", &positions);
    assert_eq!(
        session.process_item(&sparse).unwrap(),
        FrameOutcome::Rejected(RejectReason::TooFewStars { found: 5, required: 8 })
    );

    let mut config = config(dir.path());
    config.quality_gates = vec![QualityGate::HfrBelow(1.5)];
    let mut gated = LiveStackSession::new(config, CalibrationLibrary::new(), Arc::new(RawCodec));
    let positions = star_positions(12, W, H, 15);
    let blurry = item(write_raw(dir.path(), "blurry.raw", W, H, &field), "L", &positions);
    assert_eq!(
        gated.process_item(&blurry).unwrap(),
        FrameOutcome::Rejected(RejectReason::QualityGates(vec![QualityGate::HfrBelow(1.5)]))
    );
    assert_eq!(gated.bags().count(), 0);
}

#[test]
fn test_blank_target_and_filter_share_a_stack() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(20, W, H, 16);
    let field = render_star_field(W, H, &positions, 0.05);
    let mut session = session(dir.path(), CalibrationLibrary::new());

    let mut a = item(write_raw(dir.path(), "a.raw", W, H, &field), "", &positions);
    a.target = String::new();
    let mut b = item(write_raw(dir.path(), "b.raw", W, H, &field), "  ", &positions);
    b.target = " ".to_string();
    session.process_item(&a).unwrap();
    session.process_item(&b).unwrap();

    let bag = session.bag(&BagKey::new(NO_TARGET, "No_filter")).unwrap();
    assert_eq!(bag.count(), 2);
    assert!(dir.path().join("stacks").join("No_target-No_filter.fits").exists());
}

#[test]
fn test_frame_size_change_is_fatal() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(20, W, H, 17);
    let field = render_star_field(W, H, &positions, 0.05);
    let mut session = session(dir.path(), CalibrationLibrary::new());
    session.process_item(&identical_frames(dir.path(), 1, &positions, &field)[0]).unwrap();

    let small = vec![0.05; (W / 2) * H];
    let mut other = item(write_raw(dir.path(), "small.raw", W / 2, H, &small), "L", &positions);
    other.width = W / 2;

    let err = session.process_item(&other).unwrap_err();
    assert!(matches!(err, LiveStackError::BagDimensions { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_one_shot_color_frames_fill_three_stacks() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(30, W, H, 18);
    let mosaic = render_star_field(W, H, &positions, 0.05);
    let mut session = session(dir.path(), CalibrationLibrary::new());

    for i in 0..2 {
        let mut frame = item(write_raw(dir.path(), &format!("osc_{i}.raw"), W, H, &mosaic), "", &positions);
        frame.bayered = true;
        let outcome = session.process_item(&frame).unwrap();
        if i == 0 {
            assert_eq!(outcome, FrameOutcome::Seeded(BagKey::new("M31", RED_OSC)));
        }
    }

    for filter in [RED_OSC, GREEN_OSC, BLUE_OSC] {
        let key = BagKey::new("M31", filter);
        let bag = session.bag(&key).unwrap();
        assert_eq!(bag.count(), 2, "{filter}");
        assert!(bag.has_reference());
        assert!(bag.bayered());
        assert_eq!(bag.bit_depth(), 16);
        assert!(bag.stack_path(dir.path(), &RawCodec).exists());
    }

    let planes = demosaic_bilinear(&mosaic, W, H, CfaPattern::Rggb);
    let green = session.bag(&BagKey::new("M31", GREEN_OSC)).unwrap().stack().unwrap();
    assert!((green[W * 60 + 80] - planes.green[W * 60 + 80]).abs() < 1e-4);

    let rgb = session.color_composite("M31").unwrap().unwrap();
    assert_eq!(rgb.len(), W * H * 3);
    assert!(session.color_composite("M42").unwrap().is_none());
}

#[test]
fn test_saturated_color_frames_never_reseed_stacks() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(30, W, H, 23);
    let mosaic = render_star_field(W, H, &positions, 0.05);
    let mut session = session(dir.path(), CalibrationLibrary::new());
    let red_key = BagKey::new("M31", RED_OSC);

    let color_frame = |name: &str, saturated: bool| {
        let mut frame = item(write_raw(dir.path(), name, W, H, &mosaic), "", &positions);
        frame.bayered = true;
        if saturated {
            for star in &mut frame.stars {
                star.max_brightness = 65_535.0;
            }
        }
        frame
    };

    for i in 0..3 {
        let err = session.process_item(&color_frame(&format!("sat_{i}.raw"), true)).unwrap_err();
        assert!(matches!(
            err,
            LiveStackError::Registration(RegistrationError::InsufficientStars { found: 0, required: 3 })
        ));
        assert!(!err.is_fatal());
    }
    assert!(session.bag(&red_key).is_none());

    let outcome = session.process_item(&color_frame("first.raw", false)).unwrap();
    assert_eq!(outcome, FrameOutcome::Seeded(red_key.clone()));

    assert!(session.process_item(&color_frame("sat_late.raw", true)).is_err());
    for filter in [RED_OSC, GREEN_OSC, BLUE_OSC] {
        let bag = session.bag(&BagKey::new("M31", filter)).unwrap();
        assert_eq!(bag.count(), 1, "{filter}");
        assert!(bag.has_reference());
    }

    let outcome = session.process_item(&color_frame("second.raw", false)).unwrap();
    assert_eq!(
        outcome,
        FrameOutcome::Stacked {
            key: red_key.clone(),
            count: 2
        }
    );
    assert_eq!(session.bag(&BagKey::new("M31", BLUE_OSC)).unwrap().count(), 2);
}

#[tokio::test]
async fn test_run_drains_queue_and_deletes_frames() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(25, W, H, 19);
    let field = render_star_field(W, H, &positions, 0.05);
    let items = identical_frames(dir.path(), 3, &positions, &field);
    let mut session = session(dir.path(), CalibrationLibrary::new());

    let (queue, mut receiver) = frame_queue(8);
    for item in &items {
        queue.enqueue(item.clone()).await.unwrap();
    }
    assert_eq!(queue.pending(), 3);
    drop(queue);

    let status = Mutex::new(WorkerStatus::default());
    let summary = run(&mut session, &mut receiver, &CancellationToken::new(), &status)
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            seeded: 1,
            stacked: 2,
            ..Default::default()
        }
    );
    assert!(items.iter().all(|item| !item.path.exists()));
    assert_eq!(status.lock().pending, 0);
    let (_, count) = read_stack(&dir.path().join("stacks").join("M31-L.fits"));
    assert_eq!(count, Some(3.0));
}

#[tokio::test]
async fn test_cancel_flushes_queued_frames() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(25, W, H, 20);
    let field = render_star_field(W, H, &positions, 0.05);
    let items = identical_frames(dir.path(), 3, &positions, &field);
    let mut session = session(dir.path(), CalibrationLibrary::new());

    let (queue, mut receiver) = frame_queue(8);
    for item in &items {
        queue.enqueue(item.clone()).await.unwrap();
    }
    let cancel = CancellationToken::new();
    cancel.cancel();

    let status = Mutex::new(WorkerStatus::default());
    let err = run(&mut session, &mut receiver, &cancel, &status).await.unwrap_err();

    assert!(matches!(err, LiveStackError::Cancelled));
    assert!(items.iter().all(|item| !item.path.exists()));
    assert_eq!(session.bags().count(), 0);
    assert!(matches!(queue.enqueue(items[0].clone()).await, Err(LiveStackError::QueueClosed)));
}

#[tokio::test]
async fn test_missing_master_ends_run() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(25, W, H, 21);
    let field = render_star_field(W, H, &positions, 0.05);
    let items = identical_frames(dir.path(), 3, &positions, &field);

    let mut library = CalibrationLibrary::new();
    library.register(CalibrationFrameMeta::bias(dir.path().join("missing_bias.raw"), 100, 10, W, H));
    let mut session = session(dir.path(), library);

    let (queue, mut receiver) = frame_queue(8);
    for item in &items {
        queue.enqueue(item.clone()).await.unwrap();
    }
    drop(queue);

    let status = Mutex::new(WorkerStatus::default());
    let err = run(&mut session, &mut receiver, &CancellationToken::new(), &status)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, LiveStackError::Calibration(_)));
    assert!(items.iter().all(|item| !item.path.exists()));
}

#[tokio::test]
async fn test_failed_alignment_skips_only_that_frame() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(25, W, H, 22);
    let field = render_star_field(W, H, &positions, 0.05);
    let mut items = identical_frames(dir.path(), 3, &positions, &field);
    // Collinear stars form no usable triangles, so nothing can be matched.
    let line: Vec<DVec2> = (0..12).map(|i| DVec2::new(10.0 + i as f64 * 10.0, 50.0)).collect();
    items[1].stars = detected_stars(&line);

    let mut session = session(dir.path(), CalibrationLibrary::new());
    let (queue, mut receiver) = frame_queue(8);
    for item in &items {
        queue.enqueue(item.clone()).await.unwrap();
    }
    drop(queue);

    let status = Mutex::new(WorkerStatus::default());
    let summary = run(&mut session, &mut receiver, &CancellationToken::new(), &status)
        .await
        .unwrap();

    assert_eq!(summary.seeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.stacked, 1);
    assert_eq!(session.bag(&BagKey::new("M31", "L")).unwrap().count(), 2);
}

#[test]
fn test_worker_thread_end_to_end() {
    let dir = TempDir::new().unwrap();
    let positions = star_positions(25, W, H, 23);
    let field = render_star_field(W, H, &positions, 0.05);
    let items = identical_frames(dir.path(), 3, &positions, &field);

    let worker = LiveStackWorker::spawn(config(dir.path()), CalibrationLibrary::new(), Arc::new(RawCodec)).unwrap();
    let queue = worker.queue();
    for item in items.iter().cloned() {
        queue.blocking_enqueue(item).unwrap();
    }
    drop(queue);

    let summary = worker.finish().unwrap();
    assert_eq!(summary.seeded + summary.stacked, 3);
    let (_, count) = read_stack(&dir.path().join("stacks").join("M31-L.fits"));
    assert_eq!(count, Some(3.0));
}

#[test]
fn test_worker_stop_reports_cancellation() {
    let dir = TempDir::new().unwrap();
    let worker = LiveStackWorker::spawn(config(dir.path()), CalibrationLibrary::new(), Arc::new(RawCodec)).unwrap();
    assert!(matches!(worker.stop(), Err(LiveStackError::Cancelled)));
}

fn flat_item(dir: &Path, name: &str, value: f32) -> LiveStackItem {
    let mut flat = item(write_raw(dir, name, W, H, &vec![value; W * H]), "L", &[]);
    flat.exposure_time = 2.0;
    flat
}

#[test]
fn test_flat_master_is_built_and_registered() {
    let dir = TempDir::new().unwrap();
    let bias = write_raw(dir.path(), "bias.raw", W, H, &vec![0.05; W * H]);
    let mut library = CalibrationLibrary::new();
    library.register(CalibrationFrameMeta::bias(bias, 100, 10, W, H));

    let codec: Arc<dyn ImageCodec> = Arc::new(RawCodec);
    let mut calibration = CalibrationSession::new(library.clone(), Arc::clone(&codec), true);
    let mut builder = FlatMasterBuilder::new(dir.path(), codec);

    let raws: Vec<LiveStackItem> = [0.45f32, 0.55, 0.50]
        .iter()
        .enumerate()
        .map(|(i, &v)| flat_item(dir.path(), &format!("flat_{i}.raw"), v))
        .collect();
    let calibrated: Vec<PathBuf> = raws
        .iter()
        .map(|raw| builder.add_frame(&mut calibration, raw).unwrap())
        .collect();

    assert_eq!(builder.frame_count("L"), 3);
    assert!(raws.iter().all(|raw| !raw.path.exists()));
    let mut first = RawCodec.open(&calibrated[0]).unwrap();
    assert!((first.read_header_f64("MEDIAN").unwrap() - 0.40).abs() < 1e-3);

    let results = builder.finish("M31", &mut library);
    assert_eq!(results.len(), 1);
    let (filter, result) = &results[0];
    assert_eq!(filter, "L");
    let meta = result.as_ref().unwrap();

    assert_eq!(meta.path, dir.path().join("stacks").join("MASTER_FLAT_M31_L.fits"));
    assert!((meta.mean - 0.40).abs() < 1e-3);
    assert_eq!(library.flat, vec![meta.clone()]);
    assert!(calibrated.iter().all(|path| !path.exists()));

    let (master, _) = read_stack(&meta.path);
    assert!(master.iter().all(|&v| (v - 0.40).abs() < 1e-3));
}

#[test]
fn test_flat_without_median_header_is_measured() {
    let dir = TempDir::new().unwrap();
    let codec: Arc<dyn ImageCodec> = Arc::new(RawCodec);
    let mut calibration = CalibrationSession::new(CalibrationLibrary::new(), Arc::clone(&codec), true);
    let mut builder = FlatMasterBuilder::new(dir.path(), codec);

    let calibrated: Vec<PathBuf> = [0.45f32, 0.55, 0.50]
        .iter()
        .enumerate()
        .map(|(i, &v)| builder.add_frame(&mut calibration, &flat_item(dir.path(), &format!("flat_{i}.raw"), v)).unwrap())
        .collect();

    // Rewrite the reference flat without its header cards.
    let pixels = RawCodec.open(&calibrated[0]).unwrap().read_all().unwrap();
    RawCodec.write(&calibrated[0], W, H, &pixels, &[]).unwrap();
    assert_eq!(RawCodec.open(&calibrated[0]).unwrap().read_header_f64("MEDIAN"), None);

    let mut library = CalibrationLibrary::new();
    let results = builder.finish("M31", &mut library);
    let meta = results[0].1.as_ref().unwrap();

    // Every flat is scaled to the first one's measured median.
    assert!((meta.mean - 0.45).abs() < 1e-3);
    let (master, _) = read_stack(&meta.path);
    assert!(master.iter().all(|&v| (v - 0.45).abs() < 1e-3));
}

#[test]
fn test_flat_master_needs_three_frames() {
    let dir = TempDir::new().unwrap();
    let codec: Arc<dyn ImageCodec> = Arc::new(RawCodec);
    let mut calibration = CalibrationSession::new(CalibrationLibrary::new(), Arc::clone(&codec), true);
    let mut builder = FlatMasterBuilder::new(dir.path(), codec).with_delete_raw_frames(false);

    let raws = [flat_item(dir.path(), "a.raw", 0.5), flat_item(dir.path(), "b.raw", 0.5)];
    let calibrated: Vec<PathBuf> = raws
        .iter()
        .map(|raw| builder.add_frame(&mut calibration, raw).unwrap())
        .collect();
    assert!(raws.iter().all(|raw| raw.path.exists()));

    let mut library = CalibrationLibrary::new();
    let results = builder.finish("M31", &mut library);
    assert!(matches!(
        results[0].1,
        Err(LiveStackError::InsufficientFrames {
            found: 2,
            required: 3,
            ..
        })
    ));
    assert!(library.flat.is_empty());
    assert!(calibrated.iter().all(|path| !path.exists()));
}

#[test]
fn test_flat_masters_get_unique_names() {
    let dir = TempDir::new().unwrap();
    let codec: Arc<dyn ImageCodec> = Arc::new(RawCodec);
    let mut library = CalibrationLibrary::new();

    for round in 0..2 {
        let mut calibration = CalibrationSession::new(CalibrationLibrary::new(), Arc::clone(&codec), true);
        let mut builder = FlatMasterBuilder::new(dir.path(), Arc::clone(&codec));
        for i in 0..3 {
            let raw = flat_item(dir.path(), &format!("flat_{round}_{i}.raw"), 0.5);
            builder.add_frame(&mut calibration, &raw).unwrap();
        }
        builder.finish("M31", &mut library);
    }

    let names: Vec<_> = library
        .flat
        .iter()
        .map(|m| m.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["MASTER_FLAT_M31_L.fits", "MASTER_FLAT_M31_L_1.fits"]);
}
