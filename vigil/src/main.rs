use std::sync::Arc;

use segmenter::{FfmpegOpener, HttpStreamProbe, ProbeConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use vigil::adapters::DetectionAdapters;
use vigil::config::MonitorSettings;
use vigil::dedup::{AlertDeduplicator, DedupConfig};
use vigil::error::Error;
use vigil::logging;
use vigil::models::{
    LexiconSentiment, ModelRegistry, ObjectDetector, RemoteObjectDetector, RemoteSpeechToText,
    SentimentScorer, SpeechToText,
};
use vigil::notification::{BroadcastDispatcher, NotificationGate};
use vigil::orchestrator::MonitorService;
use vigil::platform::{ChatSource, HttpPlatformClient, StreamResolver};
use vigil::store::{MemoryStore, StreamStore};
use vigil::worker::WorkerContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = MonitorSettings::from_env()?;

    let _log_guard = logging::init_logging(&settings.log_dir)?;
    let shutdown = CancellationToken::new();
    logging::start_retention_cleanup(
        settings.log_dir.clone().into(),
        settings.log_retention_days,
        shutdown.child_token(),
    );

    info!(pool_size = settings.pool_size, "vigil starting");

    let store: Arc<dyn StreamStore> = Arc::new(MemoryStore::new());

    // Store-managed lists win over environment defaults when present.
    let stored_keywords = store.flagged_keywords().await?;
    if !stored_keywords.is_empty() {
        settings.flagged_keywords = stored_keywords;
    }
    let flagged_objects = store.flagged_objects().await?;

    let settings = Arc::new(settings);

    let inference_http = reqwest::Client::builder()
        .timeout(settings.transcription_timeout)
        .build()?;
    let detector_url = settings.detector_url.clone();
    let transcriber_url = settings.transcriber_url.clone();
    let detector_http = inference_http.clone();
    let transcriber_http = inference_http.clone();

    let models = Arc::new(ModelRegistry::new(
        Box::new(move || {
            let url = detector_url
                .clone()
                .ok_or_else(|| Error::config("VIGIL_DETECTOR_URL is not set"))?;
            Ok(Arc::new(RemoteObjectDetector::new(detector_http.clone(), url))
                as Arc<dyn ObjectDetector>)
        }),
        Box::new(move || {
            let url = transcriber_url
                .clone()
                .ok_or_else(|| Error::config("VIGIL_TRANSCRIBER_URL is not set"))?;
            Ok(Arc::new(RemoteSpeechToText::new(transcriber_http.clone(), url))
                as Arc<dyn SpeechToText>)
        }),
        Box::new(|| Ok(Arc::new(LexiconSentiment::new()) as Arc<dyn SentimentScorer>)),
    ));

    let adapters = Arc::new(DetectionAdapters::new(
        models,
        &settings,
        flagged_objects,
    ));
    let dedup = Arc::new(AlertDeduplicator::new(
        DedupConfig::default(),
        settings.video_class_cooldown,
    ));
    let dispatcher = Arc::new(BroadcastDispatcher::new());
    let notifier = Arc::new(NotificationGate::new(
        dispatcher,
        settings.notification_cooldown,
    ));

    let platform = Arc::new(HttpPlatformClient::new()?);
    let probe_config = ProbeConfig::default();

    let ctx = Arc::new(WorkerContext {
        settings: settings.clone(),
        adapters,
        dedup,
        notifier,
        store: store.clone(),
        video_opener: Arc::new(FfmpegOpener::video()),
        audio_opener: Arc::new(FfmpegOpener::audio()),
        probe: Arc::new(HttpStreamProbe::new(probe_config.request_timeout)),
        chat: platform.clone() as Arc<dyn ChatSource>,
        probe_config,
    });

    let service = Arc::new(MonitorService::new(
        settings,
        store,
        platform as Arc<dyn StreamResolver>,
        ctx,
    ));

    // First sweep immediately, then on the configured cadence.
    service.discovery_sweep().await;
    service.start_sweeps();

    info!("vigil running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    shutdown.cancel();
    service.shutdown().await;
    info!("vigil stopped");
    Ok(())
}
