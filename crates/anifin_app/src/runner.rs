//! Wires configuration into the engine and renders queue events.

use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anifin_core::{LogLevel, QueueEvent};
use anifin_engine::aniworld::{AniworldDownloader, DOWNLOADER_NAME};
use anifin_engine::providers::VoeProvider;
use anifin_engine::{Downloader, FetchTool, Fetcher, Orchestrator, ReqwestFetcher, ScpUploadRelay};
use anyhow::Context;
use engine_logging::{engine_info, engine_warn};

use crate::cli::{DownloadArgs, InfoArgs};
use crate::config::AppConfig;

pub fn build_downloader(config: &AppConfig) -> anyhow::Result<AniworldDownloader> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(config.fetch_settings()));
    let tool = FetchTool::new(config.fetch_program.clone())
        .with_concurrent_fragments(config.concurrent_fragments);

    let mut downloader = AniworldDownloader::new(config.aniworld_settings(), fetcher.clone(), tool)
        .with_provider(Arc::new(VoeProvider::new(fetcher)))
        .with_default_provider(&config.default_provider)
        .with_context(|| format!("default provider {:?}", config.default_provider))?;

    if config.ssh.enabled {
        let relay = ScpUploadRelay::new(config.ssh_settings())
            .context("SSH_ENABLED is set but the ssh settings are incomplete")?;
        downloader = downloader.with_upload_relay(Arc::new(relay));
    } else if config.auto_upload {
        engine_warn!("auto upload is on but ssh is disabled; files stay local");
    }
    Ok(downloader)
}

pub async fn run_download(config: &AppConfig, args: DownloadArgs) -> anyhow::Result<ExitCode> {
    let orchestrator = Orchestrator::new();
    orchestrator.register_downloader(Arc::new(build_downloader(config)?));

    let failures = Arc::new(AtomicUsize::new(0));
    let failed = failures.clone();
    orchestrator.subscribe_all(move |event| {
        if matches!(event, QueueEvent::DownloadError { .. }) {
            failed.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(line) = render(event) {
            println!("{line}");
        }
    });

    let options = args.options();
    for url in &args.urls {
        orchestrator.enqueue(url.clone(), options.clone());
    }

    let interrupt = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let dropped = orchestrator.clear();
                let cancelled = orchestrator.cancel_in_flight();
                engine_info!("interrupted: dropped {dropped} queued jobs, cancelled running job: {cancelled}");
            }
        })
    };

    let outcome = orchestrator.drain(DOWNLOADER_NAME).await;
    interrupt.abort();
    outcome?;

    let failed = failures.load(Ordering::SeqCst);
    if failed == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{failed} of {} jobs failed", args.urls.len());
        Ok(ExitCode::FAILURE)
    }
}

pub async fn run_info(config: &AppConfig, args: InfoArgs) -> anyhow::Result<ExitCode> {
    let downloader = build_downloader(config)?;
    let info = downloader
        .video_info(&args.url, &args.options())
        .await
        .with_context(|| format!("resolving {}", args.url))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(ExitCode::SUCCESS)
}

/// One console line per event.
pub fn render(event: &QueueEvent) -> Option<String> {
    let line = match event {
        QueueEvent::Queued { url, queue_length } => format!("queued   #{queue_length} {url}"),
        QueueEvent::QueueStart {
            downloader,
            queue_length,
        } => format!("start    {downloader} with {queue_length} jobs"),
        QueueEvent::DownloadStart { url, remaining } => {
            format!("download {url} ({remaining} waiting)")
        }
        QueueEvent::DownloadComplete { path, .. } => format!("done     {}", path.display()),
        QueueEvent::DownloadError { url, error, .. } => format!("failed   {url}: {error}"),
        QueueEvent::QueueComplete { .. } => "queue finished".to_string(),
        QueueEvent::QueueCleared { dropped } => format!("cleared  {dropped} queued jobs"),
        QueueEvent::Log { entry, .. } => {
            // Progress lines are noisy; they still reach the log file.
            if entry.level == LogLevel::Info && entry.message.starts_with("[download]") {
                return None;
            }
            format!("  {:<7}  {}", entry.level.to_string(), entry.message)
        }
    };
    Some(line)
}
