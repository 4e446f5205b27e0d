//! Per-stream worker sets and the capacity pool.
//!
//! Monitoring one stream means three loops running concurrently: video,
//! audio, and chat. A [`WorkerSet`] owns those tasks plus the cancellation
//! token they all watch; [`WorkerPool`] bounds how many sets exist at once
//! so a long stream list cannot oversubscribe the host.

mod tasks;

use std::sync::Arc;
use std::time::{Duration, Instant};

use segmenter::{ContainerOpener, ProbeConfig, StreamProbe};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::adapters::DetectionAdapters;
use crate::config::MonitorSettings;
use crate::dedup::AlertDeduplicator;
use crate::domain::StreamHandle;
use crate::error::Error;
use crate::notification::NotificationGate;
use crate::platform::ChatSource;
use crate::store::StreamStore;

/// Everything a worker task needs, shared across all streams.
pub struct WorkerContext {
    pub settings: Arc<MonitorSettings>,
    pub adapters: Arc<DetectionAdapters>,
    pub dedup: Arc<AlertDeduplicator>,
    pub notifier: Arc<NotificationGate>,
    pub store: Arc<dyn StreamStore>,
    /// Video and audio workers open separate single-track containers.
    pub video_opener: Arc<dyn ContainerOpener>,
    pub audio_opener: Arc<dyn ContainerOpener>,
    pub probe: Arc<dyn StreamProbe>,
    pub chat: Arc<dyn ChatSource>,
    pub probe_config: ProbeConfig,
}

/// Bounds concurrent worker sets.
pub struct WorkerPool {
    capacity: usize,
    slots: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Claim a slot; fails immediately when the pool is full.
    pub fn try_acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.slots
            .clone()
            .try_acquire_owned()
            .map_err(|_| Error::PoolExhausted {
                capacity: self.capacity,
            })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

/// The live tasks monitoring one stream.
///
/// Media tasks spawn only when the stream has a media URL, the chat task
/// only when it has a chat URL. The set holds its pool permit for its
/// lifetime; dropping the set (after [`stop`]) releases the slot.
///
/// [`stop`]: WorkerSet::stop
pub struct WorkerSet {
    stream_id: String,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    started_at: Instant,
    _permit: OwnedSemaphorePermit,
}

impl WorkerSet {
    /// Spawn the worker tasks for a stream.
    pub fn spawn(
        handle: StreamHandle,
        ctx: Arc<WorkerContext>,
        permit: OwnedSemaphorePermit,
    ) -> Result<Self> {
        let has_media = handle.media_url().is_some();
        let has_chat = handle.chat_url().is_some();
        if !has_media && !has_chat {
            return Err(Error::MissingUrls {
                stream_id: handle.id.clone(),
                has_media,
                has_chat,
            });
        }

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        if has_media {
            tasks.push((
                "video",
                tokio::spawn(tasks::video_task(
                    handle.clone(),
                    ctx.clone(),
                    cancel.child_token(),
                )),
            ));
            tasks.push((
                "audio",
                tokio::spawn(tasks::audio_task(
                    handle.clone(),
                    ctx.clone(),
                    cancel.child_token(),
                )),
            ));
        }
        if has_chat {
            tasks.push((
                "chat",
                tokio::spawn(tasks::chat_task(
                    handle.clone(),
                    ctx.clone(),
                    cancel.child_token(),
                )),
            ));
        }

        info!(
            stream_id = %handle.id,
            streamer = %handle.streamer_name,
            tasks = tasks.len(),
            "worker set started"
        );

        Ok(Self {
            stream_id: handle.id,
            cancel,
            tasks,
            started_at: Instant::now(),
            _permit: permit,
        })
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.tasks.iter().filter(|(_, t)| !t.is_finished()).count()
    }

    /// Signal cancellation and wait for every task to exit.
    ///
    /// Tasks that do not join within the grace period are aborted; a loop
    /// stuck in an uncancellable call must not hold up shutdown forever.
    pub async fn stop(mut self, grace: Duration) {
        self.cancel.cancel();

        for (name, task) in self.tasks.drain(..) {
            let abort = task.abort_handle();
            match tokio::time::timeout(grace, task).await {
                Ok(Ok(())) => debug!(stream_id = %self.stream_id, task = name, "task joined"),
                Ok(Err(e)) if e.is_cancelled() => {
                    debug!(stream_id = %self.stream_id, task = name, "task cancelled")
                }
                Ok(Err(e)) => {
                    warn!(stream_id = %self.stream_id, task = name, error = %e, "task panicked")
                }
                Err(_) => {
                    warn!(
                        stream_id = %self.stream_id,
                        task = name,
                        grace_secs = grace.as_secs(),
                        "task did not stop in time, aborting"
                    );
                    abort.abort();
                }
            }
        }

        info!(stream_id = %self.stream_id, "worker set stopped");
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        // Safety net for sets dropped without an explicit stop.
        self.cancel.cancel();
        for (_, task) in &self.tasks {
            task.abort();
        }
    }
}
