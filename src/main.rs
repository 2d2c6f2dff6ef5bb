//! leafcast: multilingual speech narration service for plant diagnosis results.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use leafcast::engine::PacedEngine;
use leafcast::preparer::ContentPreparer;
use leafcast::translator::HttpTranslator;
use leafcast::voices::{StaticCatalog, VoiceInfo, VoiceResolver};
use leafcast::{api, broadcast, config};

/// Pacing of the default engine when no platform synthesizer is wired in.
const PACED_MILLIS_PER_CHAR: u64 = 60;

#[derive(Parser, Debug)]
#[command(name = "leafcast", about = "Diagnosis narration service")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the control API port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("leafcast starting");

    let config = config::Config::load(args.config.as_deref());
    let port = args.port.unwrap_or(config.api.port);

    // Collaborators: translation backend, voice catalog, narration engine.
    let translator = Arc::new(HttpTranslator::new(config.translator.clone())?);
    let catalog_voices: Vec<VoiceInfo> = config
        .voice
        .catalog
        .iter()
        .map(|entry| VoiceInfo {
            id: entry.id.clone(),
            name: entry.name.clone(),
            language: entry.language.clone(),
            is_default: entry.default,
        })
        .collect();
    info!("Voice catalog: {} voice(s) configured", catalog_voices.len());
    let catalog = Arc::new(StaticCatalog::new(catalog_voices));

    let (engine_tx, engine_rx) = mpsc::channel(64);
    let engine = Arc::new(PacedEngine::new(engine_tx, PACED_MILLIS_PER_CHAR));

    let preparer = ContentPreparer::new(translator, &config.broadcast.source_language);
    let resolver = VoiceResolver::new(catalog, &config.voice);

    let (manager, mut updates) = broadcast::spawn(
        config.broadcast.clone(),
        config.speech.clone(),
        preparer,
        resolver,
        engine,
        engine_rx,
    );

    // Surface status/progress updates in the service log.
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            if update.total > 0 {
                info!(
                    "[{}] {} ({}/{})",
                    update.state, update.status, update.current, update.total
                );
            } else {
                info!("[{}] {}", update.state, update.status);
            }
        }
    });

    api::start_api(api::ApiState { manager }, port).await;

    info!("Service ready — POST a diagnosis result to /broadcast");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
