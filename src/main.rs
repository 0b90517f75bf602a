use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tinyimg::api::HttpCompressionApi;
use tinyimg::cli::{Args, Commands};
use tinyimg::config::{load_config, ClientConfig};
use tinyimg::constants::{INFO_PREFIX, SUCCESS_PREFIX};
use tinyimg::download::BatchDownloader;
use tinyimg::feedback::{FeedbackClient, FeedbackMessage};
use tinyimg::files::load_selection;
use tinyimg::formats::{FormatSelector, FormatSet, FormatToggle};
use tinyimg::orchestrator::{BatchEvent, BatchProgress, FileState, Orchestrator};
use tinyimg::stats::{HttpStatsStore, MemoryStatsStore, StatsStore};
use tinyimg::utils::{
    create_progress_bar, create_progress_spinner, describe_result, display_name,
    format_file_size, format_stat_bytes, format_stat_count,
};
use tinyimg::{error, info, logger, warn};
use tokio::sync::mpsc;

struct CompressRequest {
    inputs: Vec<String>,
    formats: FormatSet,
    all_formats: bool,
    output: PathBuf,
    recursive: bool,
    download_all: bool,
    save_each: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(args.global.quiet, args.global.verbose);

    let config = load_config(args.global.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(args.global.api_url.clone(), args.global.site_url.clone(), None)
        .validate()?;

    match args.command {
        Commands::Compress {
            inputs,
            formats,
            all_formats,
            output,
            recursive,
            download_all,
            save_each,
            no_stats,
        } => {
            let formats = match formats {
                Some(list) => FormatSet::parse_list(&list)?,
                None => FormatSet::new(),
            };
            let config = config.with_overrides(None, None, output);
            let request = CompressRequest {
                inputs,
                formats,
                all_formats,
                output: config.output_dir.clone(),
                recursive,
                download_all,
                save_each,
            };
            if no_stats {
                run_compress(&config, request, Arc::new(MemoryStatsStore::new())).await?;
            } else {
                let stats = Arc::new(HttpStatsStore::new(&config.site_url));
                run_compress(&config, request, stats).await?;
            }
        }
        Commands::Stats => show_stats(&config).await?,
        Commands::Feedback { subject, message } => {
            let client = FeedbackClient::new(&config.site_url);
            client
                .send(&FeedbackMessage::new(subject, message))
                .await?;
            info!("{} Feedback sent, thank you!", SUCCESS_PREFIX);
        }
    }

    Ok(())
}

async fn run_compress<S: StatsStore>(
    config: &ClientConfig,
    request: CompressRequest,
    stats: Arc<S>,
) -> anyhow::Result<()> {
    let selection = load_selection(&request.inputs, request.recursive)?;
    if selection.is_empty() {
        warn!("No image files found in the input path");
        return Ok(());
    }

    let mut selector = FormatSelector::new();
    if request.all_formats {
        selector.set_enabled(true);
        selector.toggle(FormatToggle::SelectAll);
    } else if !request.formats.is_empty() {
        selector.set_enabled(true);
        for tag in request.formats.iter() {
            selector.toggle(FormatToggle::Format(tag));
        }
    }

    info!("🚀 Compressing {} image(s) as {}", selection.len(), selector.selected());

    let api = Arc::new(HttpCompressionApi::new(&config.api_url));
    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::with_events(Arc::clone(&api), stats, config.limits(), tx);

    let progress = create_progress_bar(selection.len() as u64);
    if tinyimg::logger::is_quiet() {
        progress.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    let progress_task = tokio::spawn(track_progress(rx, progress.clone()));

    orchestrator.set_formats(selector.selected().clone());
    orchestrator.select_files(selection)?;
    orchestrator.settle().await;
    progress.finish_and_clear();
    progress_task.abort();

    let batch = orchestrator.snapshot();
    let mut failed = 0;
    for item in batch.items() {
        let size = item.file.size_bytes;
        match &item.state {
            FileState::Completed(results) => {
                info!(
                    "{} {} ({}, {})",
                    SUCCESS_PREFIX,
                    display_name(&item.file.name),
                    item.file.type_label(),
                    format_file_size(size)
                );
                for result in results {
                    info!("    {}", describe_result(result, size));
                }
            }
            FileState::Failed(failure) => {
                failed += 1;
                warn!("{}: {}", display_name(&item.file.name), failure);
            }
            FileState::Idle | FileState::Compressing => {}
        }
    }

    info!(
        "\n{} {}/{} results ready",
        INFO_PREFIX,
        batch.recorded_results(),
        batch.expected_results()
    );
    if failed > 0 {
        warn!("Failed files: {}", failed);
    }

    let downloader = BatchDownloader::new(api);
    if request.download_all {
        download_bundle(&orchestrator, &downloader, &request.output).await;
    }
    if request.save_each {
        for url in orchestrator.artifacts() {
            if let Ok(path) = downloader.download_artifact(&url, &request.output).await {
                info!("💾 Saved {}", path.display());
            }
        }
    }

    orchestrator.flush_stats().await;
    Ok(())
}

async fn download_bundle<S: StatsStore>(
    orchestrator: &Orchestrator<HttpCompressionApi, S>,
    downloader: &BatchDownloader<HttpCompressionApi>,
    output: &Path,
) {
    if !orchestrator.can_download_all() {
        warn!("Download all is only available once every file has all of its results");
        return;
    }
    let spinner = create_progress_spinner("Downloading images.zip...");
    if tinyimg::logger::is_quiet() {
        spinner.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    let outcome = downloader
        .download_all(&orchestrator.artifacts(), output)
        .await;
    spinner.finish_and_clear();
    // Failures were already logged by the downloader
    if let Ok(path) = outcome {
        info!("📦 Saved {}", path.display());
    }
}

async fn track_progress(
    mut rx: mpsc::UnboundedReceiver<BatchEvent>,
    progress: indicatif::ProgressBar,
) {
    let mut batch = BatchProgress::new();
    while let Some(event) = rx.recv().await {
        if !batch.apply(&event) {
            continue;
        }
        progress.set_length(batch.files() as u64);
        progress.set_position(batch.finished() as u64);
        if let BatchEvent::BatchReady { artifacts, .. } = event {
            progress.set_message(format!("{} artifacts ready", artifacts));
        }
    }
}

async fn show_stats(config: &ClientConfig) -> anyhow::Result<()> {
    let store = HttpStatsStore::new(&config.site_url);
    let stats = match store.get().await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Could not read stats: {}", e);
            return Err(e.into());
        }
    };
    info!(
        "{} {} files converted, {} saved",
        INFO_PREFIX,
        format_stat_count(stats.total_files),
        format_stat_bytes(stats.total_size)
    );
    Ok(())
}
