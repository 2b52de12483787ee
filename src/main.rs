mod config;
mod handlers;
mod models;
mod services;
#[cfg(feature = "http-server")]
mod server;

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::AppConfig;
use handlers::StudioHandler;
use services::{DiffusionGateway, GeminiGateway, MediaPersister, OpenAiGateway, ProviderGateway};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before the logger reads RUST_LOG
    dotenv().ok();
    env_logger::init();

    log::info!("🚀 Starting GenAI Studio...");

    let config = AppConfig::from_env();

    let chat: Arc<dyn ProviderGateway> = Arc::new(OpenAiGateway::new(config.openai.clone())?);
    log::info!("✅ OpenAI gateway initialized with model: {}", config.openai.model);

    let multimodal: Arc<dyn ProviderGateway> = Arc::new(GeminiGateway::new(config.gemini.clone())?);
    log::info!("✅ Gemini gateway initialized with model: {}", config.gemini.model);

    let diffusion: Arc<dyn ProviderGateway> =
        Arc::new(DiffusionGateway::new(config.diffusion.clone())?);
    log::info!("✅ Stable Diffusion gateway initialized at {}", config.diffusion.base_url);

    let persister = MediaPersister::new(config.content_root.clone());
    log::info!("📁 Images will be saved under {}", config.content_root.display());

    let handler = Arc::new(StudioHandler::new(chat, multimodal, diffusion, persister));

    #[cfg(feature = "http-server")]
    {
        let app = server::create_router(handler, config.max_upload_bytes);
        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
        log::info!("🌐 HTTP server listening on {}", config.bind_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                log::info!("🛑 Shutting down...");
            })
            .await?;
    }

    #[cfg(not(feature = "http-server"))]
    {
        let _ = handler;
        log::warn!("⚠️ Built without the http-server feature, nothing to serve");
    }

    Ok(())
}
