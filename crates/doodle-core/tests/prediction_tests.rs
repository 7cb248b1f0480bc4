//! Prediction scheduler pacing under a paused Tokio clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use doodle_core::broadcast::{BroadcastBus, Frame};
use doodle_core::canvas::CanvasStore;
use doodle_core::collaborators::{Classifier, ClassifierError};
use doodle_core::pool::WorkerPool;
use doodle_core::prediction::{PredictionBoard, PredictionScheduler};
use doodle_core::signal::Signal;
use doodle_types::PredictionResult;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

const INTERVAL: Duration = Duration::from_secs(1);

/// Labels each image after its first byte and counts calls.
#[derive(Default)]
struct CountingClassifier {
    calls: AtomicUsize,
}

impl Classifier for CountingClassifier {
    fn infer(&self, image: &[u8]) -> Result<Vec<PredictionResult>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = image.first().copied().unwrap_or(0);
        Ok(vec![PredictionResult::new(format!("img{first}"), 0.9)])
    }
}

fn data_url(first: u8) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode([first, 0xAA, 0xBB]))
}

struct Harness {
    canvas: Arc<CanvasStore>,
    classifier: Arc<CountingClassifier>,
    board: Arc<PredictionBoard>,
    rx: mpsc::Receiver<Frame>,
    shutdown: Arc<Signal>,
    task: tokio::task::JoinHandle<()>,
}

fn harness() -> Harness {
    let canvas = Arc::new(CanvasStore::new());
    let classifier = Arc::new(CountingClassifier::default());
    let board = Arc::new(PredictionBoard::new());
    let bus = Arc::new(BroadcastBus::new());
    let (tx, rx) = mpsc::channel(256);
    bus.register(tx);

    let scheduler = PredictionScheduler::new(
        Arc::clone(&canvas),
        Arc::clone(&classifier) as Arc<dyn Classifier>,
        WorkerPool::new(2),
        Arc::clone(&board),
        bus,
        INTERVAL,
    );
    let shutdown = Arc::new(Signal::new());
    let task = tokio::spawn(scheduler.run(Arc::clone(&shutdown)));
    Harness {
        canvas,
        classifier,
        board,
        rx,
        shutdown,
        task,
    }
}

async fn next_top1(rx: &mut mpsc::Receiver<Frame>) -> String {
    let frame = timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for top5")
        .unwrap();
    let event: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(event["type"], "top5");
    event["results"][0]["label"].as_str().unwrap().to_owned()
}

#[tokio::test(start_paused = true)]
async fn burst_of_updates_is_rate_limited_and_latest_wins() {
    let h = harness();
    let started = Instant::now();

    // Twenty distinct drawings, ten per interval.
    for i in 1..=20u8 {
        h.canvas.update(&data_url(i)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    tokio::time::sleep(Duration::from_secs(3)).await;

    let elapsed = started.elapsed();
    let calls = h.classifier.calls.load(Ordering::SeqCst);
    let bound = elapsed.as_millis().div_ceil(INTERVAL.as_millis()) + 1;
    assert!(calls >= 2, "calls = {calls}");
    assert!(
        (calls as u128) <= bound,
        "{calls} calls in {elapsed:?} exceeds bound {bound}"
    );

    let staged = h.board.current().await.unwrap();
    assert_eq!(staged.top1().unwrap().label, "img20");
}

#[tokio::test(start_paused = true)]
async fn cycle_starts_are_at_least_one_interval_apart() {
    let mut h = harness();

    h.canvas.update(&data_url(1)).await.unwrap();
    assert_eq!(next_top1(&mut h.rx).await, "img1");
    let first = Instant::now();

    h.canvas.update(&data_url(2)).await.unwrap();
    assert_eq!(next_top1(&mut h.rx).await, "img2");
    assert!(first.elapsed() >= INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn repeated_identical_drawing_is_classified_once() {
    let mut h = harness();

    h.canvas.update(&data_url(7)).await.unwrap();
    assert_eq!(next_top1(&mut h.rx).await, "img7");

    // Same bytes again, and a detour that returns to the same bytes
    // within one cycle.
    h.canvas.update(&data_url(7)).await.unwrap();
    h.canvas.update(&data_url(8)).await.unwrap();
    h.canvas.update(&data_url(7)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 1);
    assert!(h.rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn cleared_canvas_is_not_classified() {
    let h = harness();
    h.canvas.update("").await.unwrap();
    h.canvas.clear().await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 0);
    assert!(h.board.current().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn scheduler_stops_on_shutdown() {
    let h = harness();
    h.shutdown.set();
    let joined = timeout(Duration::from_secs(5), h.task).await;
    assert!(matches!(joined, Ok(Ok(()))));
}
