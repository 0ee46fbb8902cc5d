use sos_audit::api;
use sos_audit::config::Config;
use sos_audit::state::AppState;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sos_audit=info,tower_http=info".into()),
        )
        .without_time() // CloudWatch adds timestamps
        .init();

    dotenvy::dotenv().ok();

    let (state, local_port) = match Config::from_env() {
        Ok(config) => {
            info!(backend = ?config.backend, batch_size = config.batch_size, "Configuration loaded");
            (AppState::from_config(&config).await, config.local_port)
        }
        Err(e) => {
            // 配置缺失时仍然启动，每次调用返回 500
            error!(error = %e, "Invalid configuration");
            let local_port = Config::local_port_from_env().unwrap_or_else(|port_err| {
                error!(error = %port_err, "Ignoring AUDIT_LOCAL_PORT");
                None
            });
            (AppState::misconfigured(e), local_port)
        }
    };

    let app = api::router(state);

    if let Some(port) = local_port {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
        info!(port, "sos-audit listening locally");
        axum::serve(listener, app).await?;
        return Ok(());
    }

    info!("sos-audit Lambda handler ready");
    lambda_http::run(app).await
}
