//! The three per-stream monitoring loops.
//!
//! Each loop owns its own media connection and buffers; the only thing the
//! three share for one stream is the cancellation token. A failed unit of
//! work is logged and skipped, a dead container is re-probed and
//! re-opened, and a stream that stays unreachable is marked offline so
//! the task can exit and the sweeps can revive it later. Every path
//! checks for cancellation at least once per iteration.

use std::sync::Arc;
use std::time::Duration;

use segmenter::{AudioAccumulator, ContainerOpener, FrameThrottle, MediaContainer, TrackKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{Detection, DetectionPayload, StreamHandle, StreamStatus};

use super::WorkerContext;

/// Consecutive open failures tolerated before a task gives up on the
/// stream and lets the sweeps bring it back.
const MAX_OPEN_FAILURES: u32 = 3;

/// Sleep that wakes early on cancellation; returns true when cancelled.
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// Backoff between reconnect attempts, jittered so many streams dropped by
/// one CDN incident do not re-probe in lockstep.
fn reconnect_backoff(base: Duration) -> Duration {
    base + Duration::from_millis(rand::random_range(0..500))
}

/// Mark a stream offline and drop its monitored flag so the liveness
/// sweeps decide when to pick it up again.
async fn mark_stream_offline(ctx: &WorkerContext, stream_id: &str) {
    if let Err(e) = ctx.store.set_status(stream_id, StreamStatus::Offline).await {
        warn!(stream_id, error = %e, "failed to mark stream offline");
    }
    if let Err(e) = ctx.store.set_monitored(stream_id, false).await {
        warn!(stream_id, error = %e, "failed to clear monitored flag");
    }
}

/// Probe the URL once (with the probe's own bounded retries) and open a
/// container.
///
/// Returns `None` when cancelled, or when the stream stays unreachable;
/// in the latter case the stream is marked offline in the store and the
/// caller is expected to exit its loop.
async fn open_container(
    stream_id: &str,
    url: &str,
    opener: &dyn ContainerOpener,
    ctx: &WorkerContext,
    cancel: &CancellationToken,
) -> Option<Box<dyn MediaContainer>> {
    let probed = tokio::select! {
        _ = cancel.cancelled() => return None,
        res = ctx.probe.check_with_retries(url, &ctx.probe_config) => res,
    };
    if let Err(e) = probed {
        warn!(stream_id, url, error = %e, "stream probe exhausted, marking offline");
        mark_stream_offline(ctx, stream_id).await;
        return None;
    }

    let mut failures = 0u32;
    loop {
        let opened = tokio::select! {
            _ = cancel.cancelled() => return None,
            res = opener.open(url, ctx.probe_config.request_timeout) => res,
        };
        match opened {
            Ok(container) => return Some(container),
            Err(e) => {
                failures += 1;
                if failures >= MAX_OPEN_FAILURES {
                    warn!(stream_id, url, error = %e, "container will not open, marking offline");
                    mark_stream_offline(ctx, stream_id).await;
                    return None;
                }
                warn!(stream_id, url, error = %e, "failed to open container, backing off");
                if sleep_or_cancel(cancel, reconnect_backoff(ctx.probe_config.retry_delay)).await {
                    return None;
                }
            }
        }
    }
}

/// Pass one detection through dedup, persist it, and notify.
async fn emit(ctx: &WorkerContext, detection: Detection) {
    let admitted = match &detection.payload {
        DetectionPayload::Video { class, .. } => {
            ctx.dedup.admit_video(&detection.stream_id, class)
        }
        // Transcripts are gated before emission: the audio loop runs the
        // transcript filter, which applies both similarity dedup and the
        // per-window budget.
        DetectionPayload::Audio { .. } => true,
        DetectionPayload::Chat(alert) => {
            ctx.dedup.admit_chat(&detection.stream_id, alert).is_fresh()
        }
    };
    if !admitted {
        return;
    }

    if let Err(e) = ctx.store.record_detection(&detection).await {
        warn!(stream_id = %detection.stream_id, error = %e, "failed to record detection");
    }
    if let Err(e) = ctx.notifier.notify(detection).await {
        warn!(error = %e, "failed to dispatch alert");
    }
}

/// Video loop: decode, throttle, detect.
pub(super) async fn video_task(
    handle: StreamHandle,
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
) {
    let Some(url) = handle.media_url().map(str::to_string) else {
        return;
    };
    debug!(stream_id = %handle.id, "video task started");

    'session: loop {
        let Some(mut container) =
            open_container(&handle.id, &url, ctx.video_opener.as_ref(), &ctx, &cancel).await
        else {
            break;
        };
        if container.track(TrackKind::Video).is_none() {
            warn!(stream_id = %handle.id, "container has no video track, giving up");
            container.close().await;
            break;
        }

        let mut throttle = FrameThrottle::new(ctx.settings.frame_interval);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    container.close().await;
                    break 'session;
                }
                res = container.next_frame() => res,
            };

            match next {
                Ok(Some(frame)) if frame.track == TrackKind::Video => {
                    if let Some(video_frame) = throttle.offer(&frame) {
                        match ctx.adapters.detect_objects(&handle, &video_frame).await {
                            Ok(detections) => {
                                for detection in detections {
                                    emit(&ctx, detection).await;
                                }
                            }
                            Err(e) => {
                                warn!(stream_id = %handle.id, error = %e, "object detection failed")
                            }
                        }
                    }
                    tokio::task::yield_now().await;
                }
                Ok(Some(_)) => tokio::task::yield_now().await,
                Ok(None) => {
                    container.close().await;
                    break;
                }
                Err(e) if e.is_skippable() => {
                    debug!(stream_id = %handle.id, error = %e, "skipping bad packet");
                }
                Err(e) => {
                    info!(stream_id = %handle.id, error = %e, "video container ended, will re-open");
                    container.close().await;
                    break;
                }
            }
        }
    }

    debug!(stream_id = %handle.id, "video task exiting");
}

/// Audio loop: decode, accumulate fixed windows, transcribe, match.
pub(super) async fn audio_task(
    handle: StreamHandle,
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
) {
    let Some(url) = handle.media_url().map(str::to_string) else {
        return;
    };
    debug!(stream_id = %handle.id, "audio task started");

    let segment_duration = Duration::from_secs(ctx.settings.audio_segment_secs);

    'session: loop {
        let Some(mut container) =
            open_container(&handle.id, &url, ctx.audio_opener.as_ref(), &ctx, &cancel).await
        else {
            break;
        };
        let Some(track) = container.track(TrackKind::Audio) else {
            warn!(stream_id = %handle.id, "container has no audio track, giving up");
            container.close().await;
            break;
        };

        let mut accumulator =
            AudioAccumulator::new(track.sample_rate, track.channels, segment_duration);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    container.close().await;
                    break 'session;
                }
                res = container.next_frame() => res,
            };

            match next {
                Ok(Some(frame)) if frame.track == TrackKind::Audio => {
                    if let Some(segment) = accumulator.push(&frame) {
                        if segment.is_silent(ctx.settings.silence_threshold) {
                            debug!(stream_id = %handle.id, "silent segment skipped");
                        } else {
                            match ctx.adapters.transcribe_and_match(&handle, &segment).await {
                                Ok((transcript, detections)) => {
                                    if !detections.is_empty()
                                        && ctx.dedup.admit_transcript(&handle.id, &transcript)
                                    {
                                        for detection in detections {
                                            emit(&ctx, detection).await;
                                        }
                                    }
                                }
                                Err(e) => {
                                    warn!(stream_id = %handle.id, error = %e, "transcription failed")
                                }
                            }
                        }
                    }
                    tokio::task::yield_now().await;
                }
                Ok(Some(_)) => tokio::task::yield_now().await,
                Ok(None) => {
                    container.close().await;
                    break;
                }
                Err(e) if e.is_skippable() => {
                    debug!(stream_id = %handle.id, error = %e, "skipping bad packet");
                }
                Err(e) => {
                    info!(stream_id = %handle.id, error = %e, "audio container ended, will re-open");
                    container.close().await;
                    break;
                }
            }
        }
    }

    debug!(stream_id = %handle.id, "audio task exiting");
}

/// Chat loop: poll the room, scan each batch.
///
/// The platform history endpoints return overlapping batches; the dedup
/// layer, not this loop, is responsible for suppressing repeats.
pub(super) async fn chat_task(
    handle: StreamHandle,
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
) {
    debug!(stream_id = %handle.id, "chat task started");

    loop {
        if sleep_or_cancel(&cancel, ctx.settings.chat_poll_interval).await {
            break;
        }

        let fetched = tokio::select! {
            _ = cancel.cancelled() => break,
            res = ctx.chat.fetch_messages(&handle) => res,
        };
        let messages = match fetched {
            Ok(messages) => messages,
            Err(e) => {
                warn!(stream_id = %handle.id, error = %e, "chat fetch failed");
                continue;
            }
        };
        if messages.is_empty() {
            continue;
        }

        match ctx.adapters.scan_chat(&handle, &messages).await {
            Ok(detections) => {
                for detection in detections {
                    emit(&ctx, detection).await;
                }
            }
            Err(e) => warn!(stream_id = %handle.id, error = %e, "chat scan failed"),
        }
    }

    debug!(stream_id = %handle.id, "chat task exiting");
}
