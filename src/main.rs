// src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use osmanager::{config::AppState, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar
    let app_state = AppState::new().await?;

    if app_state.gate.seed_default_admin().await? {
        tracing::info!("✅ Pré-cadastro do administrador inicial criado");
    }
    app_state.session.start();

    let addr = app_state.config.bind_addr.clone();
    let app = routes::router(app_state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    tracing::info!("📚 Documentação em http://{}/swagger-ui", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
