//! Bounded-concurrency upload scheduler.
//!
//! Owns the FIFO queue of pending files and a fixed number of worker slots.
//! Each slot pulls a file, runs it through the [`TransferExecutor`] while a
//! [`ProgressSource`] animates it, writes the terminal status back to the
//! store and immediately pulls the next file. A slot is released only when
//! the queue is empty or uploads are paused, so at most
//! `max_parallel_uploads` records are ever `Uploading`.
//!
//! All state (store, queue, batch, pause flag) sits behind one mutex and
//! every transition and its event happen inside the same critical section.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use docdrop_ingest_client::Client;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::{GlobalProgress, ProgressAggregator, Summary};
use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::executor::{IngestEndpoint, TransferExecutor};
use crate::progress::{
    ProgressSink, ProgressSource, ProgressTarget, ProgressUpdate, SimulatedProgress,
};
use crate::store::FileRecordStore;
use crate::types::{
    FileKey, FileRecord, FileSource, FileStatus, MAX_PROVISIONAL_PROGRESS, PROGRESS_DONE,
    RecordPatch, TransferOutcome, UploadEvent,
};

/// Events buffered for a slow or absent listener before new ones are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Consistent view of the scheduler for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Records in submission order.
    pub records: Vec<FileRecord>,
    pub summary: Summary,
    pub paused: bool,
}

impl Snapshot {
    pub fn global_progress(&self) -> GlobalProgress {
        self.summary.global
    }

    pub fn record(&self, key: &FileKey) -> Option<&FileRecord> {
        self.records.iter().find(|r| &r.key == key)
    }
}

/// Schedules uploads against a fixed worker budget.
///
/// Cloning yields another handle to the same scheduler. Methods that admit
/// work spawn tokio tasks and must be called within a tokio runtime.
#[derive(Clone)]
pub struct UploadScheduler {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    executor: TransferExecutor,
    progress: Arc<dyn ProgressSource>,
    max_parallel: usize,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<UploadEvent>>>,
    idle: Notify,
}

#[derive(Default)]
struct State {
    store: FileRecordStore,
    pending: VecDeque<FileSource>,
    /// Keys queued since the scheduler was last idle.
    batch: Vec<FileKey>,
    /// Worker slots currently held.
    active: usize,
    aggregator: ProgressAggregator,
}

impl State {
    fn is_idle(&self) -> bool {
        self.store.count(FileStatus::Queued) == 0 && self.store.count(FileStatus::Uploading) == 0
    }
}

impl UploadScheduler {
    /// Creates a scheduler posting to the configured HTTP endpoint.
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        config.validate()?;
        let client = Client::new(&config.endpoint, config.request_timeout())?;
        Self::with_endpoint(Arc::new(client), config)
    }

    /// Creates a scheduler using `endpoint` and simulated progress.
    pub fn with_endpoint(
        endpoint: Arc<dyn IngestEndpoint>,
        config: &UploadConfig,
    ) -> Result<Self, UploadError> {
        config.validate()?;
        let progress = SimulatedProgress::new(config.tick_interval(), config.tick_step);
        Ok(Self::with_parts(
            TransferExecutor::new(endpoint, config.max_retries),
            Arc::new(progress),
            config.max_parallel_uploads,
        ))
    }

    /// Creates a scheduler from explicit parts.
    pub fn with_parts(
        executor: TransferExecutor,
        progress: Arc<dyn ProgressSource>,
        max_parallel: usize,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                executor,
                progress,
                max_parallel: max_parallel.max(1),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                idle: Notify::new(),
            }),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Holds up to [`EVENT_CHANNEL_CAPACITY`] events; further events are
    /// dropped until the listener catches up. [`Self::snapshot`] always has
    /// the full state.
    pub fn take_events(&self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.shared
            .events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn max_parallel(&self) -> usize {
        self.shared.max_parallel
    }

    /// Queues `files` and starts as many as the free slots allow.
    ///
    /// Keys are merged into the store: a new key is queued, a key that is
    /// still `Queued` gets the newer file in place, and a key that is
    /// `Uploading` or terminal is skipped. Returns the number of newly
    /// queued records. An empty list is a no-op.
    pub fn submit(&self, files: Vec<FileSource>) -> usize {
        if files.is_empty() {
            return 0;
        }

        let (added, admitted) = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            let mut added = 0;

            for file in files {
                let key = file.key();
                match state.store.get(&key).map(|r| r.status) {
                    None => {
                        state.store.upsert(&key, RecordPatch::queued(&file));
                        state.batch.push(key);
                        state.pending.push_back(file);
                        added += 1;
                    }
                    Some(FileStatus::Queued) => {
                        let size_bytes = file.size_bytes;
                        if let Some(slot) = state.pending.iter_mut().find(|f| f.key() == key) {
                            *slot = file;
                            state.store.upsert(
                                &key,
                                RecordPatch {
                                    size_bytes: Some(size_bytes),
                                    ..RecordPatch::default()
                                },
                            );
                            debug!(file = %key, "replaced queued file");
                        }
                    }
                    Some(status) => {
                        debug!(file = %key, status = ?status, "skipping duplicate submission");
                    }
                }
            }

            if added > 0 {
                info!(count = added, queued = state.pending.len(), "files added");
                self.shared.emit(UploadEvent::FilesAdded { count: added });
            }

            (added, self.shared.admit_ready(state))
        };

        self.shared.spawn_slots(admitted);
        added
    }

    /// Freezes progress and stops new admissions.
    ///
    /// In-flight transfers are not cancelled; their outcome is still applied
    /// when they resolve. Returns `false` if already paused.
    pub fn pause(&self) -> bool {
        self.set_paused(true)
    }

    /// Unfreezes progress and refills free slots. Returns `false` if not
    /// paused.
    pub fn resume(&self) -> bool {
        self.set_paused(false)
    }

    /// Flips between paused and running. Returns the new paused state.
    pub fn toggle_pause(&self) -> bool {
        let (paused, admitted) = {
            let mut state = self.shared.lock();
            let paused = state.aggregator.toggle();
            (paused, self.shared.on_pause_changed(&mut state, paused))
        };
        self.shared.spawn_slots(admitted);
        paused
    }

    fn set_paused(&self, paused: bool) -> bool {
        let admitted = {
            let mut state = self.shared.lock();
            let changed = if paused {
                state.aggregator.pause()
            } else {
                state.aggregator.resume()
            };
            if !changed {
                return false;
            }
            self.shared.on_pause_changed(&mut state, paused)
        };
        self.shared.spawn_slots(admitted);
        true
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().aggregator.is_paused()
    }

    /// Current records, summary and pause flag.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.shared.lock();
        let records = state.store.all().to_vec();
        let summary = ProgressAggregator::summarize(&records);
        Snapshot {
            records,
            summary,
            paused: state.aggregator.is_paused(),
        }
    }

    /// Global progress recomputed from the store.
    pub fn global_progress(&self) -> GlobalProgress {
        ProgressAggregator::recompute(self.shared.lock().store.all())
    }

    /// Record for `key`, if it was ever submitted.
    pub fn record(&self, key: &FileKey) -> Option<FileRecord> {
        self.shared.lock().store.get(key).cloned()
    }

    /// Keys of the current batch, in submission order.
    pub fn batch(&self) -> Vec<FileKey> {
        self.shared.lock().batch.clone()
    }

    /// Waits until nothing is `Queued` or `Uploading`.
    ///
    /// While paused with queued files this waits until [`Self::resume`].
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: UploadEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!(?event, "event buffer full, dropping event");
            }
            // A dropped receiver only means nobody is listening.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Announces a pause flag change. Resuming refills free slots.
    fn on_pause_changed(&self, state: &mut State, paused: bool) -> Vec<FileSource> {
        if paused {
            info!(uploading = state.store.count(FileStatus::Uploading), "uploads paused");
            self.emit(UploadEvent::Paused);
            Vec::new()
        } else {
            info!(queued = state.pending.len(), "uploads resumed");
            self.emit(UploadEvent::Resumed);
            self.admit_ready(state)
        }
    }

    /// Admits queued files into free slots. Returns the admitted files; the
    /// caller spawns one slot per file after releasing the lock.
    fn admit_ready(&self, state: &mut State) -> Vec<FileSource> {
        let mut admitted = Vec::new();
        while state.active < self.max_parallel {
            let Some(file) = self.next_queued(state) else {
                break;
            };
            state.active += 1;
            admitted.push(file);
        }
        admitted
    }

    /// Pops the next queued file and marks it `Uploading`, unless paused.
    fn next_queued(&self, state: &mut State) -> Option<FileSource> {
        if state.aggregator.is_paused() {
            return None;
        }
        let file = state.pending.pop_front()?;
        let key = file.key();
        state.store.upsert(
            &key,
            RecordPatch {
                status: Some(FileStatus::Uploading),
                progress: Some(0),
                ..RecordPatch::default()
            },
        );
        debug_assert!(state.store.count(FileStatus::Uploading) <= self.max_parallel);
        debug!(file = %key, active = state.active, "upload started");
        self.emit(UploadEvent::Started { key });
        Some(file)
    }

    fn spawn_slots(self: &Arc<Self>, files: Vec<FileSource>) {
        for file in files {
            tokio::spawn(run_slot(Arc::clone(self), file));
        }
    }

    /// Runs one transfer with its progress source alongside.
    async fn process(self: &Arc<Self>, file: &FileSource) -> TransferOutcome {
        let stop = CancellationToken::new();
        let target: Arc<dyn ProgressTarget> = Arc::clone(self) as Arc<dyn ProgressTarget>;
        let driver = self.progress.drive(ProgressSink::new(file.key(), target));
        let ticker = tokio::spawn({
            let stop = stop.clone();
            async move {
                tokio::select! {
                    _ = stop.cancelled() => {}
                    _ = driver => {}
                }
            }
        });

        let outcome = self.executor.transfer(file).await;

        stop.cancel();
        if let Err(e) = ticker.await {
            warn!(file = %file.key(), error = %e, "progress task ended abnormally");
        }
        outcome
    }

    /// Writes the terminal status for `key`.
    fn finish(&self, state: &mut State, key: &FileKey, outcome: TransferOutcome) {
        if state
            .store
            .get(key)
            .is_none_or(|r| r.status != FileStatus::Uploading)
        {
            warn!(file = %key, "outcome for a file that is not uploading, ignoring");
            return;
        }

        match outcome {
            TransferOutcome::Done {
                remote_id,
                size_bytes,
                uploaded_at,
                attempts,
            } => {
                state.store.upsert(
                    key,
                    RecordPatch {
                        status: Some(FileStatus::Done),
                        progress: Some(PROGRESS_DONE),
                        size_bytes: Some(size_bytes),
                        remote_id: Some(remote_id.clone()),
                        uploaded_at,
                        attempts: Some(attempts),
                        completed_at: Some(Utc::now()),
                        ..RecordPatch::default()
                    },
                );
                info!(file = %key, remote_id = %remote_id, attempts, "upload completed");
                self.emit(UploadEvent::Completed {
                    key: key.clone(),
                    remote_id,
                });
            }
            TransferOutcome::Failed { error, attempts } => {
                // Progress stays frozen at its last value.
                state.store.upsert(
                    key,
                    RecordPatch {
                        status: Some(FileStatus::Error),
                        error: Some(error.clone()),
                        attempts: Some(attempts),
                        completed_at: Some(Utc::now()),
                        ..RecordPatch::default()
                    },
                );
                warn!(file = %key, attempts, error = %error, "upload failed");
                self.emit(UploadEvent::Failed {
                    key: key.clone(),
                    error,
                });
            }
        }
    }

    /// Releases a slot and closes the batch if no work remains.
    fn release_slot(&self, state: &mut State) {
        state.active = state.active.saturating_sub(1);
        if !state.is_idle() {
            return;
        }

        let batch = std::mem::take(&mut state.batch);
        if !batch.is_empty() {
            let (mut done, mut failed) = (0, 0);
            for key in &batch {
                match state.store.get(key).map(|r| r.status) {
                    Some(FileStatus::Done) => done += 1,
                    Some(FileStatus::Error) => failed += 1,
                    _ => {}
                }
            }
            info!(files = batch.len(), done, failed, "batch finished");
            self.emit(UploadEvent::BatchFinished { done, failed });
        }
        self.idle.notify_waiters();
    }
}

impl ProgressTarget for Shared {
    fn apply(&self, key: &FileKey, update: ProgressUpdate) -> bool {
        let mut state = self.lock();
        let Some(record) = state.store.get(key) else {
            return false;
        };
        if record.status != FileStatus::Uploading {
            return false;
        }
        if state.aggregator.is_paused() {
            return true;
        }

        let current = record.progress;
        let next = match update {
            ProgressUpdate::Advance(step) => current.saturating_add(step),
            ProgressUpdate::Report(percent) => percent,
        }
        .min(MAX_PROVISIONAL_PROGRESS);

        if next > current {
            state.store.upsert(key, RecordPatch::progress(next));
            self.emit(UploadEvent::Progress {
                key: key.clone(),
                progress: next,
            });
        }
        true
    }
}

/// One worker slot: processes files until the queue is empty or paused.
async fn run_slot(shared: Arc<Shared>, first: FileSource) {
    let mut next = Some(first);
    while let Some(file) = next.take() {
        let outcome = shared.process(&file).await;

        let mut state = shared.lock();
        shared.finish(&mut state, &file.key(), outcome);
        next = shared.next_queued(&mut state);
        if next.is_none() {
            shared.release_slot(&mut state);
        }
    }
}
