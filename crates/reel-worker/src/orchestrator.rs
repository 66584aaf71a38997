//! Batch export orchestration.
//!
//! An export run turns every video background of an [`ExportRequest`] into
//! one delivered video: background, then demo, with the shared overlay and
//! music. Jobs run strictly one after another against a single engine,
//! since they share its working storage and progress stream.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

use reel_media::{
    substitute_video_codec, EncodeEngine, FfmpegProgress, FilterGraph, MediaError,
    OverlayRasterizer, ProgressCallback, BACKGROUND_FILE, DEMO_FILE, OUTPUT_FILE, OVERLAY_FILE,
};
use reel_models::{
    export_file_name, BackgroundClip, EncodingConfig, ExportRequest, RunId, StatusEvent,
    TextOverlayConfig, TextPosition,
};

use crate::delivery::{Deliverable, DeliverySink};
use crate::error::{ExportError, ExportResult};
use crate::logging::RunLogger;
use crate::progress::ProgressTracker;
use crate::resolver::{MediaResolver, ResolvedAudio};

/// Default status channel capacity for spawned runs.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub run_id: RunId,
    /// Delivered file names in job order
    pub delivered: Vec<String>,
    /// Backgrounds excluded because they are not videos
    pub skipped_inputs: usize,
    /// Jobs that succeeded only with the fallback codec
    pub fallback_jobs: usize,
    /// Working files that could not be removed between jobs
    pub cleanup_warnings: usize,
}

/// A run executing in the background.
#[derive(Debug)]
pub struct ExportRun {
    pub run_id: RunId,
    /// Status events; ends after the terminal event
    pub events: mpsc::Receiver<StatusEvent>,
    cancel: watch::Sender<bool>,
    handle: JoinHandle<ExportResult<ExportReport>>,
}

impl ExportRun {
    /// Ask the run to stop before its next job.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Next status event, or `None` once the run has finished reporting.
    pub async fn next_event(&mut self) -> Option<StatusEvent> {
        self.events.recv().await
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> ExportResult<ExportReport> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(ExportError::Io(std::io::Error::other(format!(
                "export task failed: {}",
                e
            )))),
        }
    }
}

/// Status events for one run.
///
/// Encoder ticks are best-effort and dropped when the channel is full;
/// every other event waits for capacity.
#[derive(Debug, Clone)]
struct StatusChannel {
    run_id: RunId,
    tx: mpsc::Sender<StatusEvent>,
}

impl StatusChannel {
    async fn progress(&self, job_index: Option<u32>, percent: u8, message: impl Into<String>) {
        self.send(StatusEvent::progress(&self.run_id, job_index, percent, message))
            .await;
    }

    fn tick(&self, job_index: u32, percent: u8, message: &str) {
        let event = StatusEvent::progress(&self.run_id, Some(job_index), percent, message);
        if self.tx.try_send(event).is_err() {
            debug!(job_index, percent, "Dropped progress tick");
        }
    }

    async fn done(&self, delivered: usize) {
        self.send(StatusEvent::done(&self.run_id, delivered)).await;
    }

    async fn failed(&self, job_index: Option<u32>, percent: u8, reason: &ExportError) {
        self.send(StatusEvent::failed(&self.run_id, job_index, percent, reason))
            .await;
    }

    async fn send(&self, event: StatusEvent) {
        if self.tx.send(event).await.is_err() {
            debug!(run_id = %self.run_id, "Status receiver dropped");
        }
    }
}

/// Encoder progress callback for one job.
fn tick_callback(
    tracker: &Arc<ProgressTracker>,
    channel: &StatusChannel,
    job_index: u32,
    total_ms: i64,
    message: &str,
) -> ProgressCallback {
    let tracker = Arc::clone(tracker);
    let channel = channel.clone();
    let message = message.to_string();
    Box::new(move |p: FfmpegProgress| {
        if let Some(percent) = tracker.tick(job_index, p.fraction_of(total_ms)) {
            channel.tick(job_index, percent, &message);
        }
    })
}

/// Inputs shared by every job of a run, resolved once.
struct RunInputs {
    demo: Vec<u8>,
    overlay: Option<Vec<u8>>,
    position: TextPosition,
    audio: Option<ResolvedAudio>,
}

impl RunInputs {
    /// Working files a job may leave behind.
    fn working_files(&self) -> Vec<String> {
        let mut files = vec![BACKGROUND_FILE.to_string(), DEMO_FILE.to_string()];
        if let Some(audio) = &self.audio {
            files.push(audio.file_name());
        }
        if self.overlay.is_some() {
            files.push(OVERLAY_FILE.to_string());
        }
        files.push(OUTPUT_FILE.to_string());
        files
    }
}

/// Runs export batches against one long-lived encoding engine.
pub struct Exporter<E: EncodeEngine> {
    engine: Arc<E>,
    resolver: MediaResolver,
    overlay: Arc<dyn OverlayRasterizer>,
    sink: Arc<dyn DeliverySink>,
    encoding: EncodingConfig,
    event_capacity: usize,
    running: Arc<Mutex<()>>,
}

impl<E: EncodeEngine> std::fmt::Debug for Exporter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("encoding", &self.encoding)
            .field("event_capacity", &self.event_capacity)
            .finish_non_exhaustive()
    }
}

impl<E: EncodeEngine + 'static> Exporter<E> {
    pub fn new(
        engine: Arc<E>,
        resolver: MediaResolver,
        overlay: Arc<dyn OverlayRasterizer>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        Self {
            engine,
            resolver,
            overlay,
            sink,
            encoding: EncodingConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Run an export to completion, sending status events to `events`.
    ///
    /// Rejections (missing inputs, another run active) return an error
    /// without sending any event. Every other failure is reported once as a
    /// `failed` event before the error is returned.
    pub async fn export(
        &self,
        request: ExportRequest,
        events: mpsc::Sender<StatusEvent>,
        cancel: watch::Receiver<bool>,
    ) -> ExportResult<ExportReport> {
        let guard = self.begin(&request)?;
        self.run(guard, RunId::new(), request, events, cancel).await
    }

    /// Start an export in the background.
    ///
    /// Fails immediately, without spawning, if the request is rejected.
    pub fn spawn(self: &Arc<Self>, request: ExportRequest) -> ExportResult<ExportRun> {
        let guard = self.begin(&request)?;

        let run_id = RunId::new();
        let (tx, rx) = mpsc::channel(self.event_capacity);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let this = Arc::clone(self);
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            this.run(guard, task_run_id, request, tx, cancel_rx).await
        });

        Ok(ExportRun {
            run_id,
            events: rx,
            cancel: cancel_tx,
            handle,
        })
    }

    /// Check preconditions and claim the engine.
    fn begin(&self, request: &ExportRequest) -> ExportResult<OwnedMutexGuard<()>> {
        if request.backgrounds.is_empty() {
            return Err(ExportError::precondition("no background clips"));
        }
        if request.demo.is_none() {
            return Err(ExportError::precondition("no demo clip"));
        }

        Arc::clone(&self.running)
            .try_lock_owned()
            .map_err(|_| ExportError::AlreadyRunning)
    }

    async fn run(
        &self,
        _guard: OwnedMutexGuard<()>,
        run_id: RunId,
        request: ExportRequest,
        events: mpsc::Sender<StatusEvent>,
        cancel: watch::Receiver<bool>,
    ) -> ExportResult<ExportReport> {
        let jobs: Vec<&BackgroundClip> = request.video_backgrounds().collect();
        let total = jobs.len() as u32;
        let logger = RunLogger::new(&run_id, jobs.len());
        let span = logger.create_span();

        async {
            let channel = StatusChannel {
                run_id: run_id.clone(),
                tx: events,
            };
            let tracker = Arc::new(ProgressTracker::new(total));
            let mut report = ExportReport {
                run_id: run_id.clone(),
                skipped_inputs: request.skipped_count(),
                ..Default::default()
            };

            logger.log_start(&format!(
                "{} job(s), {} skipped input(s)",
                total, report.skipped_inputs
            ));
            if report.skipped_inputs > 0 {
                logger.log_warning(&format!(
                    "skipping {} non-video background(s)",
                    report.skipped_inputs
                ));
            }

            channel
                .progress(None, tracker.start(), "Preparing encoder...")
                .await;

            let inputs = match self.prepare(&request).await {
                Ok(inputs) => inputs,
                Err(e) => return self.fail(&channel, &logger, &tracker, e).await,
            };

            for (position, background) in jobs.iter().enumerate() {
                let job_index = position as u32 + 1;

                if *cancel.borrow() {
                    return self
                        .fail(&channel, &logger, &tracker, ExportError::Cancelled)
                        .await;
                }

                let message = format!("Processing {}/{}...", job_index, total);
                logger.log_job(job_index, &message);
                channel
                    .progress(Some(job_index), tracker.job_started(job_index), &message)
                    .await;

                report.cleanup_warnings += self.cleanup(&inputs, &logger).await;
                let result = self
                    .run_job(job_index, &message, background, &inputs, &channel, &tracker, &mut report)
                    .await;

                report.cleanup_warnings += self.cleanup(&inputs, &logger).await;

                if let Err(e) = result {
                    return self.fail(&channel, &logger, &tracker, e).await;
                }

                channel
                    .progress(
                        Some(job_index),
                        tracker.job_finished(job_index),
                        format!("Finished {}/{}", job_index, total),
                    )
                    .await;
            }

            tracker.complete();
            channel.done(report.delivered.len()).await;
            logger.log_completion(&format!(
                "{} delivered, {} fallback, {} cleanup warning(s)",
                report.delivered.len(),
                report.fallback_jobs,
                report.cleanup_warnings
            ));

            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Initialize the engine and resolve the inputs every job shares.
    async fn prepare(&self, request: &ExportRequest) -> ExportResult<RunInputs> {
        self.engine.ensure_ready().await?;

        let overlay = match request.effective_overlay() {
            Some(config) => self.render_overlay(config.clone()).await?,
            None => None,
        };

        let audio = self.resolver.resolve(&request.music).await?;

        let demo = match &request.demo {
            Some(demo) => demo.source.read().await.map_err(|e| {
                ExportError::resolution(format!("failed to read demo {}: {}", demo.name, e))
            })?,
            None => return Err(ExportError::precondition("no demo clip")),
        };

        Ok(RunInputs {
            demo,
            overlay,
            position: request.overlay.as_ref().map(|o| o.position).unwrap_or_default(),
            audio,
        })
    }

    async fn render_overlay(&self, config: TextOverlayConfig) -> ExportResult<Option<Vec<u8>>> {
        let renderer = Arc::clone(&self.overlay);
        tokio::task::spawn_blocking(move || renderer.render(&config))
            .await
            .map_err(|e| ExportError::resolution(format!("overlay task failed: {}", e)))?
            .map_err(|e| ExportError::resolution(e.to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_job(
        &self,
        job_index: u32,
        message: &str,
        background: &BackgroundClip,
        inputs: &RunInputs,
        channel: &StatusChannel,
        tracker: &Arc<ProgressTracker>,
        report: &mut ExportReport,
    ) -> ExportResult<()> {
        let fatal = |e: MediaError| ExportError::job_fatal(job_index, e);

        let background_bytes = background.source.read().await.map_err(|e| {
            ExportError::job_fatal(job_index, MediaError::Io(e))
        })?;

        // The engine consumes staged buffers, so each job gets its own copies
        self.engine
            .write_file(BACKGROUND_FILE, background_bytes)
            .await
            .map_err(fatal)?;
        self.engine
            .write_file(DEMO_FILE, inputs.demo.clone())
            .await
            .map_err(fatal)?;
        if let Some(audio) = &inputs.audio {
            self.engine
                .write_file(&audio.file_name(), audio.bytes.clone())
                .await
                .map_err(fatal)?;
        }
        if let Some(overlay) = &inputs.overlay {
            self.engine
                .write_file(OVERLAY_FILE, overlay.clone())
                .await
                .map_err(fatal)?;
        }

        let total_ms = self.expected_duration_ms(job_index).await;
        let audio_file = inputs.audio.as_ref().map(|a| a.file_name());
        let graph = FilterGraph::build(
            inputs.overlay.as_ref().map(|_| OVERLAY_FILE),
            audio_file.as_deref(),
            inputs.position,
        );
        let args = graph.to_args(&self.encoding);

        let progress = || tick_callback(tracker, channel, job_index, total_ms, message);

        if let Err(primary) = self.engine.exec(&args, progress()).await {
            if !primary.is_encode_failure() {
                return Err(fatal(primary));
            }

            let fallback = &self.encoding.fallback_codec;
            let Some(fallback_args) = substitute_video_codec(&args, fallback) else {
                return Err(fatal(primary));
            };

            warn!(
                job_index,
                codec = %self.encoding.codec,
                fallback = %fallback,
                error = %primary,
                "Primary codec failed, retrying with fallback"
            );

            self.engine
                .exec(&fallback_args, progress())
                .await
                .map_err(fatal)?;
            report.fallback_jobs += 1;
        }

        let output = self.engine.read_file(OUTPUT_FILE).await.map_err(fatal)?;
        let file_name = export_file_name(&background.name, job_index as usize);

        self.sink
            .deliver(Deliverable {
                job_index,
                file_name: file_name.clone(),
                bytes: output,
            })
            .await?;

        report.delivered.push(file_name);
        Ok(())
    }

    /// Expected output duration (background + demo) for progress fractions.
    ///
    /// Zero when probing fails; the job still encodes but only reports
    /// progress at its boundaries.
    async fn expected_duration_ms(&self, job_index: u32) -> i64 {
        let mut total = 0.0;
        for file in [BACKGROUND_FILE, DEMO_FILE] {
            match self.engine.probe_duration(file).await {
                Ok(secs) => total += secs,
                Err(e) => {
                    warn!(job_index, file, error = %e, "Could not probe duration");
                    return 0;
                }
            }
        }
        (total * 1000.0) as i64
    }

    /// Best-effort removal of working files. Returns the number of failures.
    async fn cleanup(&self, inputs: &RunInputs, logger: &RunLogger) -> usize {
        let mut failures = 0;
        for file in inputs.working_files() {
            match self.engine.delete_file(&file).await {
                Ok(()) | Err(MediaError::WorkingFileMissing(_)) => {}
                Err(e) => {
                    failures += 1;
                    logger.log_warning(&format!("failed to remove {}: {}", file, e));
                }
            }
        }
        failures
    }

    async fn fail(
        &self,
        channel: &StatusChannel,
        logger: &RunLogger,
        tracker: &ProgressTracker,
        error: ExportError,
    ) -> ExportResult<ExportReport> {
        logger.log_error(&error.to_string());
        channel
            .failed(error.job_index(), tracker.current(), &error)
            .await;
        Err(error)
    }
}
