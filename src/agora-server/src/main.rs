//! Agora - group discussion simulator server.
//!
//! Serves the session lifecycle API: start a simulation, advance rounds as
//! SSE streams, submit human input (text or audio), query status.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agora_core::{
    KokoroSpeech, MemoryStore, OpenAiGenerator, OpenAiTranscriber, RoundOrchestrator,
    SessionRegistry, SessionStore, SimulatorConfig, SpeechSynthesizer, TextGenerator, Transcriber,
};
use agora_server::routes;
use agora_server::state::AppState;

#[derive(Parser)]
#[command(name = "agora", version, about = "Multi-agent group discussion simulator")]
struct ServerOpts {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000", env = "AGORA_LISTEN")]
    listen: String,

    /// OpenAI-compatible API base URL for text generation and transcription
    #[arg(
        long,
        default_value = "https://api.openai.com/v1",
        env = "OPENAI_API_BASE"
    )]
    api_base: String,

    /// API key for the upstream model service
    #[arg(long, default_value = "", env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Chat model used for agent utterances
    #[arg(long, default_value = "gpt-4o-mini", env = "AGORA_MODEL")]
    model: String,

    /// Optional simulator config file (TOML)
    #[arg(long, env = "AGORA_CONFIG")]
    config: Option<PathBuf>,

    /// Enable speech synthesis for agent utterances
    #[arg(long)]
    tts: bool,

    /// Evict simulations idle for this many seconds
    #[arg(long, default_value = "3600", env = "AGORA_SESSION_TTL")]
    session_ttl_secs: u64,

    /// Allowed CORS origins for the frontend (repeatable)
    #[arg(
        long = "cors-origin",
        default_values_t = [
            "http://localhost:5173".to_string(),
            "http://127.0.0.1:5173".to_string(),
            "http://localhost:3000".to_string(),
        ]
    )]
    cors_origin: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let opts = ServerOpts::parse();

    let filter = EnvFilter::from_default_env()
        .add_directive("agora_server=info".parse()?)
        .add_directive("agora_core=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &opts.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading simulator config");
            SimulatorConfig::load(path)?
        }
        None => SimulatorConfig::default(),
    };
    let config = Arc::new(config);

    if opts.api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY not set; generation calls may fail");
    }

    let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(
        &opts.api_base,
        &opts.api_key,
        opts.model.clone(),
        config.timing.generation_timeout(),
        config.timing.max_completion_tokens,
    )?);

    let speech: Option<Arc<dyn SpeechSynthesizer>> = if opts.tts {
        tracing::info!("initializing speech synthesis");
        Some(Arc::new(KokoroSpeech::new().await?))
    } else {
        None
    };

    let transcriber: Arc<dyn Transcriber> =
        Arc::new(OpenAiTranscriber::new(&opts.api_base, &opts.api_key));

    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    let registry = SessionRegistry::new(Arc::clone(&store), Arc::clone(&config));
    let orchestrator =
        RoundOrchestrator::new(Arc::clone(&store), generator, speech, Arc::clone(&config));

    let state = Arc::new(AppState {
        registry,
        orchestrator,
        transcriber,
    });

    // Idle-session sweeper
    let ttl = Duration::from_secs(opts.session_ttl_secs);
    let sweeper_store = Arc::clone(&store);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let evicted = sweeper_store.evict_idle(ttl);
            if evicted > 0 {
                tracing::info!(evicted, "evicted idle simulations");
            }
        }
    });

    let app = routes::router(state, &opts.cors_origin);
    let listener = tokio::net::TcpListener::bind(&opts.listen).await?;
    tracing::info!("Listening on {}", opts.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
