use image::{DynamicImage, RgbImage};
use inference::{
    DetectionError, DetectionService, Detector, FsImageStore, ImageLoader, ImagePredictions,
    InferenceDispatcher, LabelFormat, Normalizer,
};
use schema::{DetectionResult, Label};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

/// Returns the same detections for every image.
struct StubDetector {
    detections: Vec<([f32; 4], u32)>,
    calls: AtomicUsize,
}

impl StubDetector {
    fn new(detections: Vec<([f32; 4], u32)>) -> Self {
        Self {
            detections,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Detector for StubDetector {
    fn predict(&self, images: &[DynamicImage]) -> anyhow::Result<Vec<ImagePredictions>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(images
            .iter()
            .map(|_| {
                let mut group = ImagePredictions::default();
                for (bbox, class_id) in &self.detections {
                    group.push(*bbox, *class_id, 0.9);
                }
                group
            })
            .collect())
    }

    fn class_names(&self) -> Option<&[String]> {
        None
    }
}

struct RaisingDetector;

impl Detector for RaisingDetector {
    fn predict(&self, _: &[DynamicImage]) -> anyhow::Result<Vec<ImagePredictions>> {
        anyhow::bail!("model exploded")
    }
}

struct SlowDetector {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Detector for SlowDetector {
    fn predict(&self, images: &[DynamicImage]) -> anyhow::Result<Vec<ImagePredictions>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![ImagePredictions::default(); images.len()])
    }
}

fn write_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbImage::new(32, 24).save(&path).unwrap();
    path
}

/// Service over `detector` plus a counter of released image handles.
fn build_service<D: Detector>(
    detector: Arc<D>,
    workers: usize,
    label_format: LabelFormat,
) -> (DetectionService<D>, Arc<AtomicUsize>) {
    let released = Arc::new(AtomicUsize::new(0));
    let hook_count = Arc::clone(&released);
    let loader = ImageLoader::new(FsImageStore::default()).with_release_hook(Arc::new(move |_| {
        hook_count.fetch_add(1, Ordering::SeqCst);
    }));
    let dispatcher = InferenceDispatcher::new(detector, workers);
    let normalizer = Normalizer::new(label_format, vec!["fire".to_string(), "smoke".to_string()]);

    (DetectionService::new(loader, dispatcher, normalizer), released)
}

fn setup() -> TempDir {
    tempdir().unwrap()
}

#[tokio::test]
async fn test_end_to_end_truncated_detection() {
    let dir = setup();
    let path = write_image(dir.path(), "fire.png");

    let detector = Arc::new(StubDetector::new(vec![([10.2, 20.7, 100.9, 200.1], 3)]));
    let (service, released) = build_service(detector, 2, LabelFormat::Index);

    let results = service.detect(path.to_str().unwrap()).await.unwrap();

    assert_eq!(
        results,
        vec![DetectionResult {
            label: Label::Index(3),
            left: 10,
            top: 20,
            right: 100,
            bottom: 200,
        }]
    );
    assert_eq!(released.load(Ordering::SeqCst), 1, "Handle released once");
}

#[tokio::test]
async fn test_result_count_matches_model_and_order_is_kept() {
    let dir = setup();
    let path = write_image(dir.path(), "many.png");

    let detections = vec![
        ([5.0, 5.0, 6.0, 6.0], 1),
        ([1.0, 1.0, 2.0, 2.0], 0),
        ([3.9, 3.1, 4.5, 4.99], 1),
    ];
    let detector = Arc::new(StubDetector::new(detections.clone()));
    let (service, _) = build_service(detector, 1, LabelFormat::Name);

    let results = service.detect(path.to_str().unwrap()).await.unwrap();

    assert_eq!(results.len(), detections.len());
    let labels: Vec<_> = results.iter().map(|r| r.label.clone()).collect();
    assert_eq!(
        labels,
        vec![
            Label::Name("smoke".to_string()),
            Label::Name("fire".to_string()),
            Label::Name("smoke".to_string()),
        ]
    );
    assert_eq!((results[2].left, results[2].bottom), (3, 4));
}

#[tokio::test]
async fn test_zero_detections_is_empty_success() {
    let dir = setup();
    let path = write_image(dir.path(), "empty.png");

    let (service, released) = build_service(Arc::new(StubDetector::new(vec![])), 1, LabelFormat::Index);

    let results = service.detect(path.to_str().unwrap()).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_path_is_not_found_without_inference() {
    let dir = setup();
    let missing = dir.path().join("missing.jpg");

    let detector = Arc::new(StubDetector::new(vec![([0.0; 4], 0)]));
    let (service, released) = build_service(Arc::clone(&detector), 1, LabelFormat::Index);

    let err = service.detect(missing.to_str().unwrap()).await.unwrap_err();

    assert!(matches!(err, DetectionError::NotFound));
    assert_eq!(err.to_string(), "File not found.");
    assert_eq!(detector.calls.load(Ordering::SeqCst), 0, "Model never called");
    assert_eq!(released.load(Ordering::SeqCst), 0, "No handle was created");
}

#[tokio::test]
async fn test_raising_model_fails_and_still_releases_handle() {
    let dir = setup();
    let path = write_image(dir.path(), "boom.png");

    let (service, released) = build_service(Arc::new(RaisingDetector), 2, LabelFormat::Index);

    let err = service.detect(path.to_str().unwrap()).await.unwrap_err();

    match err {
        DetectionError::Inference(message) => assert_eq!(message, "model exploded"),
        other => panic!("Expected Inference error, got {other:?}"),
    }
    assert_eq!(released.load(Ordering::SeqCst), 1, "Handle released exactly once");
    assert_eq!(service.dispatcher().available_slots(), 2, "Slot returned");
}

#[tokio::test]
async fn test_undecodable_file_is_decode_error() {
    let dir = setup();
    let path = dir.path().join("corrupt.jpg");
    std::fs::write(&path, b"\xFF\xD8 truncated").unwrap();

    let (service, _) = build_service(Arc::new(StubDetector::new(vec![])), 1, LabelFormat::Index);

    let err = service.detect(path.to_str().unwrap()).await.unwrap_err();
    assert!(matches!(err, DetectionError::Decode(_)), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_requests_beyond_pool_size_complete() {
    const WORKERS: usize = 2;
    const REQUESTS: usize = 10;

    let dir = setup();
    let path = write_image(dir.path(), "load.png");

    let detector = Arc::new(SlowDetector {
        delay: Duration::from_millis(40),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let (service, released) = build_service(Arc::clone(&detector), WORKERS, LabelFormat::Index);
    let service = Arc::new(service);

    let tasks: Vec<_> = (0..REQUESTS)
        .map(|_| {
            let service = Arc::clone(&service);
            let path = path.to_str().unwrap().to_string();
            tokio::spawn(async move { service.detect(&path).await })
        })
        .collect();

    let outcome = tokio::time::timeout(Duration::from_secs(10), async {
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
    })
    .await;

    assert!(outcome.is_ok(), "Requests deadlocked");
    assert!(detector.peak.load(Ordering::SeqCst) <= WORKERS);
    assert_eq!(released.load(Ordering::SeqCst), REQUESTS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_is_reported_and_handle_released_once() {
    let dir = setup();
    let path = write_image(dir.path(), "slow.png");

    let released = Arc::new(AtomicUsize::new(0));
    let hook_count = Arc::clone(&released);
    let loader = ImageLoader::new(FsImageStore::default()).with_release_hook(Arc::new(move |_| {
        hook_count.fetch_add(1, Ordering::SeqCst);
    }));
    let detector = Arc::new(SlowDetector {
        delay: Duration::from_millis(300),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let dispatcher = InferenceDispatcher::new(detector, 1)
        .with_timeout(Some(Duration::from_millis(50)));
    let service = DetectionService::new(loader, dispatcher, Normalizer::default());

    let err = service.detect(path.to_str().unwrap()).await.unwrap_err();

    assert!(matches!(err, DetectionError::Timeout(_)), "got {err:?}");
    assert_eq!(err.to_string(), "Inference timed out after 50ms");
    assert_eq!(released.load(Ordering::SeqCst), 1, "Handle released on timeout");

    // The abandoned model call still holds its slot until it returns
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(released.load(Ordering::SeqCst), 1, "Worker finishing releases nothing twice");
    assert_eq!(service.dispatcher().available_slots(), 1);
}
