//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use kyc_crm::{
    build_app,
    config::{AppState, Settings},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let settings = Settings::from_env().expect("Configuração inválida.");

    let app_state = AppState::new(&settings)
        .await
        .expect("Falha ao inicializar o estado da aplicação.");
    let gateway_mode = if app_state.analysis_service.is_simulated() { "simulada" } else { "Coze workflow" };
    tracing::info!("🤖 Análise de IA: {}", gateway_mode);

    let app = build_app(app_state);

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!(
        "🚀 Servidor escutando em {}",
        listener.local_addr().map(|a| a.to_string()).unwrap_or_else(|_| settings.bind_addr.clone())
    );
    tracing::info!("📚 Documentação em /swagger-ui");

    axum::serve(listener, app).await.expect("Erro no servidor Axum");
}
