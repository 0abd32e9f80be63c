// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session manager — per-photo state machine and result cache.
//
// State machine per photo:
//
//   Idle → Queued → Running → { Rectified | FailedFallback | Failed | Cancelled }
//
// At most one run per photo is active. Results are written to the cache only
// by the task that currently owns the photo's entry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use docflat_bridge::InferenceGateway;
use docflat_core::config::DocflatConfig;
use docflat_core::error::{DocflatError, ErrorKind, Result};
use docflat_core::{PhotoAsset, PhotoId, PhotoState, RectificationResult, TaskId, TaskState};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::pipeline::{Pipeline, RunOutput};
use crate::task::{TaskFailure, TaskHandle, TaskSnapshot};

/// What a caller gets when asking for a photo's result.
#[derive(Debug, Clone)]
pub enum PhotoResult {
    /// Rectified, or the original photo after a recoverable failure.
    Ready(Arc<RectificationResult>),
    /// Queued or running.
    Pending,
    /// The run failed or was cancelled.
    Failed(TaskFailure),
    /// Never submitted, or evicted.
    NotSubmitted,
}

/// One entry of the task table: the current run for a photo and its outcome.
struct TaskRecord {
    photo: PhotoAsset,
    task_id: TaskId,
    cancel: Arc<AtomicBool>,
    state: watch::Sender<TaskState>,
    join: Option<JoinHandle<()>>,
    result: Option<Arc<RectificationResult>>,
    failure: Option<TaskFailure>,
    /// Rectified file this manager wrote, deleted on eviction.
    output_path: Option<PathBuf>,
}

impl TaskRecord {
    fn current(&self) -> TaskState {
        *self.state.borrow()
    }

    fn handle(&self) -> TaskHandle {
        TaskHandle::new(self.task_id, self.photo.id.clone(), self.state.subscribe())
    }

    fn set_state(&mut self, state: TaskState) {
        self.photo.state = state.photo_state();
        self.state.send_replace(state);
    }
}

struct Inner {
    gateway: Arc<dyn InferenceGateway>,
    pipeline: Pipeline,
    permits: Semaphore,
    tasks: Mutex<HashMap<PhotoId, TaskRecord>>,
}

impl Inner {
    fn tasks(&self) -> MutexGuard<'_, HashMap<PhotoId, TaskRecord>> {
        // A panic while holding the lock leaves the table consistent (every
        // mutation is a single assignment), so keep using it.
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the photo's entry to `Running` if `task_id` still owns it and
    /// has not been cancelled.
    fn start(&self, photo_id: &PhotoId, task_id: TaskId) -> bool {
        let mut tasks = self.tasks();
        match tasks.get_mut(photo_id) {
            Some(rec) if rec.task_id == task_id && rec.current() == TaskState::Queued => {
                rec.set_state(TaskState::Running);
                true
            }
            _ => false,
        }
    }

    /// Record the outcome of a run. Returns the path of an output file that
    /// nobody will reference (the run was cancelled or superseded).
    fn finish(
        &self,
        photo_id: &PhotoId,
        task_id: TaskId,
        outcome: Result<RunOutput>,
    ) -> Option<PathBuf> {
        let orphan = match &outcome {
            Ok(RunOutput::Rectified { output_path, .. }) => Some(output_path.clone()),
            _ => None,
        };

        let mut tasks = self.tasks();
        let rec = match tasks.get_mut(photo_id) {
            Some(rec)
                if rec.task_id == task_id
                    && rec.current() == TaskState::Running
                    && !rec.cancel.load(Ordering::SeqCst) =>
            {
                rec
            }
            _ => {
                debug!(%photo_id, %task_id, "Discarding result of cancelled or superseded run");
                return orphan;
            }
        };

        match outcome {
            Ok(RunOutput::Rectified {
                result,
                output_path,
            }) => {
                rec.result = Some(Arc::new(result));
                rec.output_path = Some(output_path);
                rec.set_state(TaskState::Rectified);
            }
            Ok(RunOutput::Fallback(result)) => {
                rec.result = Some(Arc::new(result));
                rec.set_state(TaskState::FailedFallback);
            }
            Err(DocflatError::Cancelled) => {
                rec.set_state(TaskState::Cancelled);
            }
            Err(err) => {
                warn!(%photo_id, %task_id, error = %err, "Photo processing failed");
                rec.failure = Some(TaskFailure {
                    kind: err.kind(),
                    message: err.to_string(),
                });
                rec.set_state(TaskState::Failed);
            }
        }
        info!(%photo_id, %task_id, state = ?rec.current(), "Task finished");
        None
    }
}

/// Orchestrates rectification runs for one composition session.
///
/// Cloning is cheap and every clone shares the same table and cache.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Build a manager around `gateway`. Fails with `Config` for invalid settings.
    pub fn new(config: DocflatConfig, gateway: Arc<dyn InferenceGateway>) -> Result<Self> {
        config.validate()?;
        info!(
            gateway = gateway.name(),
            max_concurrent_runs = config.max_concurrent_runs,
            output_dir = %config.output_dir.display(),
            "Session manager created"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                pipeline: Pipeline::from_config(&config),
                permits: Semaphore::new(config.max_concurrent_runs),
                gateway,
                tasks: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Queue `uri` for rectification and return a handle to its run.
    ///
    /// While a run for the same photo is queued or running, or after it
    /// completed (rectified or fallback), the existing handle is returned.
    /// After `Failed` or `Cancelled` a fresh run starts.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip_all, fields(uri = %uri.as_ref()))]
    pub fn submit_photo(&self, uri: impl AsRef<str>) -> TaskHandle {
        let mut photo = PhotoAsset::new(uri.as_ref());
        let mut tasks = self.inner.tasks();

        if let Some(rec) = tasks.get(&photo.id) {
            let state = rec.current();
            if state.is_active() || matches!(state, TaskState::Rectified | TaskState::FailedFallback) {
                debug!(photo_id = %photo.id, ?state, "Returning existing task");
                return rec.handle();
            }
        }

        let task_id = TaskId::new();
        let cancel = Arc::new(AtomicBool::new(false));
        let (state, _) = watch::channel(TaskState::Queued);
        photo.state = PhotoState::Queued;

        let photo_id = photo.id.clone();
        let join = tokio::spawn(run_task(
            Arc::clone(&self.inner),
            photo.clone(),
            task_id,
            Arc::clone(&cancel),
        ));

        let rec = TaskRecord {
            photo,
            task_id,
            cancel,
            state,
            join: Some(join),
            result: None,
            failure: None,
            output_path: None,
        };
        let handle = rec.handle();
        tasks.insert(photo_id.clone(), rec);
        info!(%photo_id, %task_id, "Photo queued");
        handle
    }

    /// Cached result or current status for `photo_id`.
    pub fn get_result(&self, photo_id: &PhotoId) -> PhotoResult {
        let tasks = self.inner.tasks();
        let Some(rec) = tasks.get(photo_id) else {
            return PhotoResult::NotSubmitted;
        };
        match rec.current() {
            TaskState::Idle => PhotoResult::NotSubmitted,
            TaskState::Queued | TaskState::Running => PhotoResult::Pending,
            TaskState::Rectified | TaskState::FailedFallback => match &rec.result {
                Some(result) => PhotoResult::Ready(Arc::clone(result)),
                None => PhotoResult::Pending,
            },
            TaskState::Failed => PhotoResult::Failed(rec.failure.clone().unwrap_or(TaskFailure {
                kind: ErrorKind::Io,
                message: "processing failed".into(),
            })),
            TaskState::Cancelled => PhotoResult::Failed(TaskFailure {
                kind: ErrorKind::Cancelled,
                message: DocflatError::Cancelled.to_string(),
            }),
        }
    }

    /// Cancel a queued or running task. Returns whether anything was cancelled.
    ///
    /// An inference call already in flight runs to completion; its result
    /// is discarded.
    pub fn cancel(&self, photo_id: &PhotoId) -> bool {
        let mut tasks = self.inner.tasks();
        match tasks.get_mut(photo_id) {
            Some(rec) if rec.current().is_active() => {
                rec.cancel.store(true, Ordering::SeqCst);
                rec.set_state(TaskState::Cancelled);
                info!(%photo_id, task_id = %rec.task_id, "Task cancelled");
                true
            }
            _ => false,
        }
    }

    /// Whether the gateway has its model loaded.
    pub fn is_model_ready(&self) -> bool {
        self.inner.gateway.is_ready()
    }

    /// Forget `photo_id`, cancelling any active run. The rectified file this
    /// manager wrote is deleted too. Returns whether the photo was known.
    pub async fn evict(&self, photo_id: &PhotoId) -> bool {
        let removed = self.inner.tasks().remove(photo_id);
        let Some(mut rec) = removed else {
            return false;
        };

        if rec.current().is_active() {
            rec.cancel.store(true, Ordering::SeqCst);
            rec.set_state(TaskState::Cancelled);
        }
        // The task finishes on its own; nothing waits on it any more.
        drop(rec.join.take());

        if let Some(path) = rec.output_path.take() {
            remove_output(path).await;
        }
        info!(%photo_id, "Photo evicted");
        true
    }

    /// Current state for `photo_id` (`Idle` if unknown).
    pub fn state(&self, photo_id: &PhotoId) -> TaskState {
        self.inner
            .tasks()
            .get(photo_id)
            .map(TaskRecord::current)
            .unwrap_or(TaskState::Idle)
    }

    /// The photo as last recorded.
    pub fn photo(&self, photo_id: &PhotoId) -> Option<PhotoAsset> {
        self.inner.tasks().get(photo_id).map(|rec| rec.photo.clone())
    }

    /// Every task in the table.
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        let tasks = self.inner.tasks();
        let mut rows: Vec<TaskSnapshot> = tasks
            .values()
            .map(|rec| TaskSnapshot {
                photo_id: rec.photo.id.clone(),
                task_id: rec.task_id,
                source_uri: rec.photo.source_uri.clone(),
                state: rec.current(),
            })
            .collect();
        rows.sort_by(|a, b| a.source_uri.cmp(&b.source_uri));
        rows
    }
}

/// Body of one spawned run.
async fn run_task(inner: Arc<Inner>, photo: PhotoAsset, task_id: TaskId, cancel: Arc<AtomicBool>) {
    let Ok(_permit) = inner.permits.acquire().await else {
        return;
    };
    if cancel.load(Ordering::SeqCst) || !inner.start(&photo.id, task_id) {
        debug!(photo_id = %photo.id, %task_id, "Task no longer wanted; not starting");
        return;
    }

    let outcome = inner
        .pipeline
        .run(inner.gateway.as_ref(), &photo, task_id, &cancel)
        .await;

    if let Some(orphan) = inner.finish(&photo.id, task_id, outcome) {
        remove_output(orphan).await;
    }
}

async fn remove_output(path: PathBuf) {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!(path = %path.display(), "Rectified file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove rectified file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use docflat_bridge::{RecordedGateway, UnavailableGateway};
    use docflat_core::{Point, Polygon, Size, Tensor};
    use docflat_vision::{ImageProcessor, Letterbox, Rectifier};
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use image::{DynamicImage, Rgb, RgbImage};
    use tokio::sync::Notify;

    // -- Fixtures -------------------------------------------------------------

    /// Gateway that counts calls, tracks concurrency, and can be held open.
    struct TestGateway {
        output: Tensor,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        entered: Notify,
        release: Option<Notify>,
        delay: Duration,
    }

    impl TestGateway {
        fn new(output: Tensor) -> Self {
            Self {
                output,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                entered: Notify::new(),
                release: None,
                delay: Duration::ZERO,
            }
        }

        fn held(output: Tensor) -> Self {
            Self {
                release: Some(Notify::new()),
                ..Self::new(output)
            }
        }
    }

    impl InferenceGateway for TestGateway {
        fn name(&self) -> &str {
            "test"
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn infer(&self, _input: Tensor) -> BoxFuture<'_, Result<Tensor>> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                self.entered.notify_one();
                if let Some(release) = &self.release {
                    release.notified().await;
                }
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(self.output.clone())
            }
            .boxed()
        }
    }

    const PAGE: [(f64, f64); 4] = [(30.0, 20.0), (170.0, 25.0), (165.0, 130.0), (35.0, 125.0)];

    fn write_photo(dir: &Path, name: &str) -> String {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(200, 150, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 90])
        }));
        let path = dir.join(name);
        std::fs::write(&path, ImageProcessor::from_dynamic(img).to_png_bytes().unwrap()).unwrap();
        path.display().to_string()
    }

    /// A 256x256 single-channel heatmap with a blob on each page corner.
    fn page_heatmap() -> Tensor {
        let lb = Letterbox::fit(Size::new(200, 150), Size::new(256, 256));
        let mut data = vec![0.0f32; 256 * 256];
        for (x, y) in PAGE {
            let m = lb.to_model(Point::new(x, y));
            let (cx, cy) = (m.x.round() as usize, m.y.round() as usize);
            for yy in cy - 1..=cy + 1 {
                for xx in cx - 1..=cx + 1 {
                    data[yy * 256 + xx] = if (xx, yy) == (cx, cy) { 0.9 } else { 0.7 };
                }
            }
        }
        Tensor::new(256, 256, 1, data).unwrap()
    }

    fn config(dir: &Path) -> DocflatConfig {
        DocflatConfig {
            output_dir: dir.join("out"),
            ..DocflatConfig::default()
        }
    }

    fn output_files(dir: &Path) -> usize {
        std::fs::read_dir(dir.join("out"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    // -- Tests ----------------------------------------------------------------

    #[tokio::test]
    async fn skewed_page_is_rectified_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write_photo(dir.path(), "page.png");
        let manager = SessionManager::new(
            config(dir.path()),
            Arc::new(RecordedGateway::new(page_heatmap())),
        )
        .unwrap();

        let handle = manager.submit_photo(&uri);
        assert_eq!(handle.wait().await, TaskState::Rectified);

        let PhotoResult::Ready(result) = manager.get_result(handle.photo_id()) else {
            panic!("expected a cached result");
        };
        assert!(!result.is_fallback());
        assert_ne!(result.image_uri, uri);
        for (found, (x, y)) in result.polygon.points().iter().zip(PAGE) {
            assert!(found.distance(&Point::new(x, y)) < 1.0, "{found:?}");
        }
        assert!((result.confidence - 0.9).abs() < 1e-6);

        let expected = Rectifier::output_size(&result.polygon).unwrap();
        assert_eq!(result.output_size, expected);
        let written = ImageProcessor::from_bytes(&std::fs::read(&result.image_uri).unwrap()).unwrap();
        assert_eq!(written.size(), expected);
        let page = Polygon::canonical(PAGE.map(|(x, y)| Point::new(x, y))).unwrap();
        let page_size = Rectifier::output_size(&page).unwrap();
        let aspect = |s: Size| s.width as f64 / s.height as f64;
        assert!((aspect(result.output_size) - aspect(page_size)).abs() < 0.05);

        assert_eq!(
            manager.photo(handle.photo_id()).unwrap().state,
            PhotoState::Rectified
        );
    }

    #[tokio::test]
    async fn uniform_heatmap_falls_back_to_original() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write_photo(dir.path(), "blank.png");
        let flat = Tensor::filled(64, 64, 1, 0.5);
        let manager =
            SessionManager::new(config(dir.path()), Arc::new(RecordedGateway::new(flat))).unwrap();

        let handle = manager.submit_photo(&uri);
        assert_eq!(handle.wait().await, TaskState::FailedFallback);

        let PhotoResult::Ready(result) = manager.get_result(handle.photo_id()) else {
            panic!("fallback should still be a usable result");
        };
        assert_eq!(result.image_uri, uri);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.fallback_reason, Some(ErrorKind::LowConfidenceDetection));
        assert_eq!(output_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn collapsed_corners_fall_back_to_original() {
        // Every corner plane peaks at the same centroid, so the quad has no area.
        let dir = tempfile::tempdir().unwrap();
        let uri = write_photo(dir.path(), "blank.png");
        let flat = Tensor::filled(64, 64, 4, 0.5);
        let manager =
            SessionManager::new(config(dir.path()), Arc::new(RecordedGateway::new(flat))).unwrap();

        let handle = manager.submit_photo(&uri);
        assert_eq!(handle.wait().await, TaskState::FailedFallback);

        let PhotoResult::Ready(result) = manager.get_result(handle.photo_id()) else {
            panic!("fallback should still be a usable result");
        };
        assert_eq!(result.image_uri, uri);
        assert_eq!(result.fallback_reason, Some(ErrorKind::DegeneratePolygon));
        assert_eq!(result.homography, RectificationResult::IDENTITY);
        assert_eq!(output_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn model_not_ready_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write_photo(dir.path(), "page.png");
        let manager =
            SessionManager::new(config(dir.path()), Arc::new(UnavailableGateway)).unwrap();
        assert!(!manager.is_model_ready());

        let handle = manager.submit_photo(&uri);
        assert_eq!(handle.wait().await, TaskState::FailedFallback);
        let PhotoResult::Ready(result) = manager.get_result(handle.photo_id()) else {
            panic!("expected fallback result");
        };
        assert_eq!(result.image_uri, uri);
        assert_eq!(result.output_size, Size::new(200, 150));
    }

    #[tokio::test]
    async fn resubmitting_while_running_reuses_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write_photo(dir.path(), "page.png");
        let gateway = Arc::new(TestGateway::held(page_heatmap()));
        let manager = SessionManager::new(config(dir.path()), gateway.clone()).unwrap();

        let first = manager.submit_photo(&uri);
        gateway.entered.notified().await;
        assert_eq!(manager.state(first.photo_id()), TaskState::Running);

        let second = manager.submit_photo(&uri);
        assert_eq!(first.task_id(), second.task_id());
        assert!(matches!(manager.get_result(first.photo_id()), PhotoResult::Pending));

        if let Some(release) = &gateway.release {
            release.notify_one();
        }
        assert_eq!(second.wait().await, TaskState::Rectified);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        // A completed photo is not processed again either.
        let third = manager.submit_photo(&uri);
        assert_eq!(third.task_id(), first.task_id());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_while_running_discards_result() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write_photo(dir.path(), "page.png");
        let gateway = Arc::new(TestGateway::held(page_heatmap()));
        let manager = SessionManager::new(config(dir.path()), gateway.clone()).unwrap();

        let handle = manager.submit_photo(&uri);
        gateway.entered.notified().await;
        assert!(manager.cancel(handle.photo_id()));
        assert!(!manager.cancel(handle.photo_id()));

        // Let the in-flight inference finish; its output must be dropped.
        if let Some(release) = &gateway.release {
            release.notify_one();
        }
        assert_eq!(handle.wait().await, TaskState::Cancelled);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(manager.state(handle.photo_id()), TaskState::Cancelled);
        match manager.get_result(handle.photo_id()) {
            PhotoResult::Failed(failure) => assert_eq!(failure.kind, ErrorKind::Cancelled),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(output_files(dir.path()), 0);

        // Retrying after cancellation starts a new run.
        let retry = manager.submit_photo(&uri);
        assert_ne!(retry.task_id(), handle.task_id());
        if let Some(release) = &gateway.release {
            release.notify_one();
        }
        assert_eq!(retry.wait().await, TaskState::Rectified);
    }

    #[tokio::test]
    async fn undecodable_photo_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"\xFF\xD8 definitely not a jpeg").unwrap();
        let gateway = Arc::new(TestGateway::new(page_heatmap()));
        let manager = SessionManager::new(config(dir.path()), gateway.clone()).unwrap();

        let handle = manager.submit_photo(path.display().to_string());
        assert_eq!(handle.wait().await, TaskState::Failed);
        match manager.get_result(handle.photo_id()) {
            PhotoResult::Failed(failure) => assert_eq!(failure.kind, ErrorKind::Decode),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);

        // Failed photos can be resubmitted.
        let again = manager.submit_photo(path.display().to_string());
        assert_ne!(again.task_id(), handle.task_id());
        assert_eq!(again.wait().await, TaskState::Failed);
    }

    #[tokio::test]
    async fn missing_photo_is_an_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            SessionManager::new(config(dir.path()), Arc::new(UnavailableGateway)).unwrap();
        let handle = manager.submit_photo("file:///no/such/photo.jpg");
        assert_eq!(handle.wait().await, TaskState::Failed);
        match manager.get_result(handle.photo_id()) {
            PhotoResult::Failed(failure) => assert_eq!(failure.kind, ErrorKind::Io),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn evict_removes_entry_and_rectified_file() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write_photo(dir.path(), "page.png");
        let manager = SessionManager::new(
            config(dir.path()),
            Arc::new(RecordedGateway::new(page_heatmap())),
        )
        .unwrap();

        let handle = manager.submit_photo(&uri);
        assert_eq!(handle.wait().await, TaskState::Rectified);
        assert_eq!(output_files(dir.path()), 1);

        assert!(manager.evict(handle.photo_id()).await);
        assert_eq!(output_files(dir.path()), 0);
        assert_eq!(manager.state(handle.photo_id()), TaskState::Idle);
        assert!(matches!(
            manager.get_result(handle.photo_id()),
            PhotoResult::NotSubmitted
        ));
        assert!(!manager.evict(handle.photo_id()).await);
        // The source photo is untouched.
        assert!(Path::new(&uri).exists());
    }

    #[tokio::test]
    async fn concurrent_runs_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(TestGateway {
            delay: Duration::from_millis(20),
            ..TestGateway::new(page_heatmap())
        });
        let manager = SessionManager::new(
            DocflatConfig {
                max_concurrent_runs: 2,
                ..config(dir.path())
            },
            gateway.clone(),
        )
        .unwrap();

        let handles: Vec<TaskHandle> = (0..5)
            .map(|i| manager.submit_photo(write_photo(dir.path(), &format!("p{i}.png"))))
            .collect();
        for handle in &handles {
            assert_eq!(handle.wait().await, TaskState::Rectified);
        }
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 5);
        assert!(gateway.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(manager.snapshot().len(), 5);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = SessionManager::new(
            DocflatConfig {
                max_concurrent_runs: 0,
                ..DocflatConfig::default()
            },
            Arc::new(UnavailableGateway),
        );
        assert!(matches!(result, Err(DocflatError::Config(_))));
    }

    #[test]
    fn unknown_photo_is_not_submitted() {
        let manager =
            SessionManager::new(DocflatConfig::default(), Arc::new(UnavailableGateway)).unwrap();
        let id = PhotoId::from_uri("nowhere.jpg");
        assert!(matches!(manager.get_result(&id), PhotoResult::NotSubmitted));
        assert_eq!(manager.state(&id), TaskState::Idle);
        assert!(!manager.cancel(&id));
        assert!(manager.photo(&id).is_none());
    }
}
