use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use iptv_bot::account::AccountConfig;
use iptv_bot::config::Config;
use iptv_bot::session::SessionEngine;
use iptv_bot::upstream::HttpFetcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("iptv_bot=debug".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .init();

    info!("📺 Iniciando IPTV Bot v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("⚙️ {}", config.summary());

    let fetcher = Arc::new(HttpFetcher::new(config.request_timeout())?);
    let engine = Arc::new(SessionEngine::new(&config, fetcher)?);

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&engine).await;
    }

    // Limpieza periódica de archivos antiguos
    let sweeper = engine.clone();
    let interval = config.cleanup_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            sweeper.sweep().await;
            info!("{}", sweeper.stats());
        }
    });

    info!("🚀 Motor listo, esperando peticiones");

    // Manejar shutdown graceful
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Error al registrar Ctrl+C: {:?}", e);
    }
    info!("⚠️ Señal de shutdown recibida, cerrando...");

    let report = engine.sweep().await;
    info!("🧹 Limpieza final: {}", report);

    Ok(())
}

async fn health_check(engine: &SessionEngine) -> Result<()> {
    let Some(playlist_url) = std::env::var("PLAYLIST_URL").ok() else {
        println!("OK");
        return Ok(());
    };

    let Some(account) = AccountConfig::from_playlist_url(&playlist_url) else {
        anyhow::bail!("PLAYLIST_URL inválida");
    };

    if engine.test_connection(&account).await {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Servidor IPTV no responde");
    }
}
