//! Monitoring orchestrator: the registry and control plane.
//!
//! Owns the map from stream id to live [`WorkerSet`], enforces at most one
//! set per stream, and runs the periodic sweeps that pick up newly-online
//! streams, revive dead worker sets, and dispatch digests of recent
//! detections.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::config::MonitorSettings;
use crate::dedup::AlertDeduplicator;
use crate::domain::{DetectionKind, StreamHandle, StreamStatus};
use crate::error::Error;
use crate::notification::{AlertPriority, DigestSummary, NotificationGate};
use crate::platform::StreamResolver;
use crate::store::StreamStore;
use crate::worker::{WorkerContext, WorkerPool, WorkerSet};

/// Point-in-time view of one monitored stream, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub stream_id: String,
    pub active_tasks: usize,
    pub uptime_secs: u64,
}

/// Registry-wide counts plus the per-stream snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorOverview {
    pub total: usize,
    pub monitored: usize,
    pub online: usize,
    pub streams: Vec<MonitorStatus>,
}

/// Top-level monitoring service.
pub struct MonitorService {
    settings: Arc<MonitorSettings>,
    store: Arc<dyn StreamStore>,
    resolver: Arc<dyn StreamResolver>,
    ctx: Arc<WorkerContext>,
    pool: WorkerPool,
    dedup: Arc<AlertDeduplicator>,
    notifier: Arc<NotificationGate>,
    workers: DashMap<String, WorkerSet>,
    shutdown: CancellationToken,
}

impl MonitorService {
    pub fn new(
        settings: Arc<MonitorSettings>,
        store: Arc<dyn StreamStore>,
        resolver: Arc<dyn StreamResolver>,
        ctx: Arc<WorkerContext>,
    ) -> Self {
        let pool = WorkerPool::new(settings.pool_size);
        Self {
            settings,
            store,
            resolver,
            dedup: ctx.dedup.clone(),
            notifier: ctx.notifier.clone(),
            ctx,
            pool,
            workers: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Start monitoring a stream. Returns `false` when a worker set for it
    /// already exists; starting twice is a no-op, not an error.
    pub async fn start_monitoring(&self, stream_id: &str) -> Result<bool> {
        if self.workers.contains_key(stream_id) {
            debug!(stream_id, "already monitoring, start ignored");
            return Ok(false);
        }

        let record = self
            .store
            .get(stream_id)
            .await?
            .ok_or_else(|| Error::not_found("stream", stream_id))?;

        let handle = match self.ensure_media_url(record.handle).await {
            Ok(handle) => handle,
            Err(e) => {
                self.raise_start_alert(stream_id, &e).await;
                return Err(e);
            }
        };

        // Claim capacity before spawning anything.
        let permit = self.pool.try_acquire()?;
        let worker_set = match WorkerSet::spawn(handle.clone(), self.ctx.clone(), permit) {
            Ok(set) => set,
            Err(e) => {
                self.raise_start_alert(stream_id, &e).await;
                return Err(e);
            }
        };

        // A concurrent start may have won the race; keep the first set.
        use dashmap::mapref::entry::Entry;
        match self.workers.entry(stream_id.to_string()) {
            Entry::Occupied(_) => {
                worker_set.stop(self.settings.shutdown_grace).await;
                debug!(stream_id, "lost start race, discarded duplicate worker set");
                return Ok(false);
            }
            Entry::Vacant(slot) => {
                slot.insert(worker_set);
            }
        }

        self.store.set_monitored(stream_id, true).await?;
        self.store
            .set_status(stream_id, StreamStatus::Monitoring)
            .await?;
        info!(stream_id, streamer = %handle.streamer_name, "monitoring started");
        Ok(true)
    }

    /// Stop monitoring a stream. Returns `false` when it was not being
    /// monitored; stopping twice is a no-op.
    pub async fn stop_monitoring(&self, stream_id: &str) -> Result<bool> {
        let Some((_, worker_set)) = self.workers.remove(stream_id) else {
            debug!(stream_id, "not monitoring, stop ignored");
            return Ok(false);
        };

        worker_set.stop(self.settings.shutdown_grace).await;

        // Per-stream caches go with the workers; models stay loaded.
        self.dedup.release_stream(stream_id);
        self.notifier.forget_stream(stream_id);

        self.store.set_monitored(stream_id, false).await?;
        self.store
            .set_status(stream_id, StreamStatus::Stopped)
            .await?;
        info!(stream_id, "monitoring stopped");
        Ok(true)
    }

    /// Stop and restart every monitored stream, e.g. after a keyword list
    /// change. Returns how many streams were restarted.
    pub async fn restart_all(&self) -> Result<usize> {
        let ids: Vec<String> = self.workers.iter().map(|e| e.key().clone()).collect();
        let mut restarted = 0;

        for id in ids {
            self.stop_monitoring(&id).await?;
            match self.start_monitoring(&id).await {
                Ok(true) => restarted += 1,
                Ok(false) => {}
                Err(e) => warn!(stream_id = %id, error = %e, "restart failed"),
            }
        }

        info!(restarted, "restart sweep complete");
        Ok(restarted)
    }

    pub fn is_monitoring(&self, stream_id: &str) -> bool {
        self.workers.contains_key(stream_id)
    }

    /// Current registry snapshot.
    pub fn status(&self) -> Vec<MonitorStatus> {
        self.workers
            .iter()
            .map(|entry| MonitorStatus {
                stream_id: entry.key().clone(),
                active_tasks: entry.value().active_tasks(),
                uptime_secs: entry.value().started_at().elapsed().as_secs(),
            })
            .collect()
    }

    pub fn monitored_count(&self) -> usize {
        self.workers.len()
    }

    /// Status counts across the whole store, plus per-stream task liveness.
    pub async fn overview(&self) -> Result<MonitorOverview> {
        let records = self.store.list().await?;
        let online = records
            .iter()
            .filter(|r| matches!(r.status, StreamStatus::Online | StreamStatus::Monitoring))
            .count();
        Ok(MonitorOverview {
            total: records.len(),
            monitored: self.workers.len(),
            online,
            streams: self.status(),
        })
    }

    /// Spawn the background sweeps; they run until [`shutdown`].
    ///
    /// [`shutdown`]: MonitorService::shutdown
    pub fn start_sweeps(self: &Arc<Self>) {
        let service = self.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            let interval = service.settings.discovery_sweep_interval;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        service.discovery_sweep().await;
                    }
                }
            }
            debug!("discovery sweep exiting");
        });

        let service = self.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            let interval = service.settings.retry_sweep_interval;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        service.retry_sweep().await;
                    }
                }
            }
            debug!("retry sweep exiting");
        });

        let service = self.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            let interval = service.settings.digest_sweep_interval;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        service.digest_sweep().await;
                    }
                }
            }
            debug!("digest sweep exiting");
        });
    }

    /// One pass over the store: refresh liveness and start what should run.
    pub async fn discovery_sweep(&self) {
        let records = match self.store.list().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "discovery sweep cannot list streams");
                return;
            }
        };

        for record in records {
            let id = record.handle.id.clone();
            if self.workers.contains_key(&id) {
                continue;
            }

            let online = match self.resolver.resolve(&record.handle).await {
                Ok(resolved) => {
                    let status = if resolved.online {
                        StreamStatus::Online
                    } else {
                        StreamStatus::Offline
                    };
                    if let Err(e) = self.store.set_status(&id, status).await {
                        warn!(stream_id = %id, error = %e, "failed to update status");
                    }
                    resolved.online
                }
                Err(e) => {
                    debug!(stream_id = %id, error = %e, "resolve failed during sweep");
                    continue;
                }
            };

            // Streams flagged as monitored lost their workers and should
            // come back; otherwise auto-start picks up anything online.
            let should_start =
                online && (record.is_monitored || self.settings.auto_start_on_online);
            if !should_start {
                continue;
            }

            match self.start_monitoring(&id).await {
                Ok(true) => info!(stream_id = %id, "sweep started monitoring"),
                Ok(false) => {}
                Err(e) if e.is_retryable() => {
                    debug!(stream_id = %id, error = %e, "sweep start failed, will retry")
                }
                Err(e) => warn!(stream_id = %id, error = %e, "sweep start failed"),
            }
        }
    }

    /// One pass for streams that should be monitored but are not: dead
    /// worker sets are torn down and restarted, and streams last seen
    /// online get another start attempt without re-resolving.
    pub async fn retry_sweep(&self) {
        let records = match self.store.list().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "retry sweep cannot list streams");
                return;
            }
        };

        for record in records {
            let id = record.handle.id.clone();

            if let Some(entry) = self.workers.get(&id) {
                if entry.value().active_tasks() > 0 {
                    continue;
                }
                drop(entry);
                info!(stream_id = %id, "all worker tasks died, restarting");
                if let Err(e) = self.stop_monitoring(&id).await {
                    warn!(stream_id = %id, error = %e, "failed to tear down dead worker set");
                    continue;
                }
            } else {
                let eligible = record.status == StreamStatus::Online
                    && (record.is_monitored || self.settings.auto_start_on_online);
                if !eligible {
                    continue;
                }
            }

            match self.start_monitoring(&id).await {
                Ok(true) => info!(stream_id = %id, "retry sweep started monitoring"),
                Ok(false) => {}
                Err(e) if e.is_retryable() => {
                    debug!(stream_id = %id, error = %e, "retry start failed, will retry")
                }
                Err(e) => warn!(stream_id = %id, error = %e, "retry start failed"),
            }
        }
    }

    /// Aggregate detections recorded since the last tick into per-stream
    /// digests, then log a one-line summary of monitoring health.
    pub async fn digest_sweep(&self) {
        let window = self.settings.digest_sweep_interval;
        let since = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::seconds(60));

        match self.store.recent_detections(since).await {
            Ok(detections) => {
                let mut per_stream: HashMap<String, DigestSummary> = HashMap::new();
                for detection in detections {
                    let digest = per_stream
                        .entry(detection.stream_id.clone())
                        .or_insert_with(|| DigestSummary {
                            streamer_name: detection.streamer_name.clone(),
                            video: 0,
                            audio: 0,
                            chat: 0,
                            window_secs: window.as_secs(),
                        });
                    match detection.kind {
                        DetectionKind::Video => digest.video += 1,
                        DetectionKind::Audio => digest.audio += 1,
                        DetectionKind::Chat => digest.chat += 1,
                    }
                }
                for (stream_id, digest) in per_stream {
                    if let Err(e) = self.notifier.notify_digest(&stream_id, digest).await {
                        warn!(stream_id = %stream_id, error = %e, "failed to dispatch digest");
                    }
                }
            }
            Err(e) => warn!(error = %e, "digest sweep cannot read detections"),
        }

        let statuses = self.status();
        let dead_tasks: usize = statuses
            .iter()
            .map(|s| 3usize.saturating_sub(s.active_tasks))
            .sum();
        info!(
            monitored = statuses.len(),
            capacity = self.pool.capacity(),
            free_slots = self.pool.available(),
            dead_tasks,
            "monitoring digest"
        );
    }

    /// Stop all worker sets and the sweeps.
    pub async fn shutdown(&self) {
        info!("shutting down monitoring service");
        self.shutdown.cancel();

        let ids: Vec<String> = self.workers.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Err(e) = self.stop_monitoring(&id).await {
                warn!(stream_id = %id, error = %e, "error stopping during shutdown");
            }
        }
    }

    /// Surface a start failure to admins; the caller still propagates it.
    async fn raise_start_alert(&self, stream_id: &str, error: &Error) {
        if let Err(e) = self
            .notifier
            .notify_system(
                stream_id,
                AlertPriority::High,
                format!("cannot start monitoring: {error}"),
            )
            .await
        {
            warn!(stream_id, error = %e, "failed to dispatch system alert");
        }
    }

    /// Resolve a fresh media URL when the stored handle lacks one.
    async fn ensure_media_url(&self, mut handle: StreamHandle) -> Result<StreamHandle> {
        if handle.media_url.is_some() || handle.chat_url.is_some() {
            return Ok(handle);
        }

        let resolved = self.resolver.resolve(&handle).await?;
        handle.media_url = resolved.media_url;
        if handle.media_url.is_none() {
            return Err(Error::resolution(
                &handle.streamer_name,
                "platform returned no media URL",
            ));
        }

        // Persist so the next start skips resolution.
        if let Some(mut record) = self.store.get(&handle.id).await? {
            record.handle = handle.clone();
            self.store.upsert(record).await?;
        }
        Ok(handle)
    }
}
