use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use leadfit_audit_memory::InMemoryAuditStore;
use leadfit_audit_postgres::{PostgresAuditConfig, PostgresAuditStore};
use leadfit_core::{AuditStore, CircuitBreaker, CircuitBreakerConfig, Orchestrator, RetryPolicy, SourcePipeline};
use leadfit_provider::{CompanyAdapter, CrmRestWriter, PlacesAdapter, WebTechAdapter};
use leadfit_server::api::{self, AppState};
use leadfit_server::config::{AppConfig, AuditBackendConfig};
use leadfit_server::metrics::Metrics;

/// Default request deadline for one `/enrich` call (§4.4, §5).
const REQUEST_DEADLINE: Duration = Duration::from_secs(20);
/// Time allowed for in-flight work to drain during graceful shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            // Tracing is not initialized yet: this is the one line of
            // output a misconfigured deploy gets before the process exits.
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "leadfit-server exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let http_client = reqwest::Client::builder().timeout(Duration::from_secs(15)).build()?;

    let places = Arc::new(PlacesAdapter::new(
        http_client.clone(),
        config.sources.places_base_url.clone(),
        config.sources.places_api_key.clone(),
    ));
    let company = Arc::new(CompanyAdapter::new(
        http_client.clone(),
        config.sources.company_base_url.clone(),
        config.sources.company_api_key.clone(),
    ));
    let webtech = Arc::new(WebTechAdapter::new());

    let places_pipeline = SourcePipeline::new(
        places,
        Arc::new(CircuitBreaker::new("places", CircuitBreakerConfig::default())),
        RetryPolicy::default(),
    );
    let company_pipeline = SourcePipeline::new(
        company,
        Arc::new(CircuitBreaker::new("company", CircuitBreakerConfig::default())),
        RetryPolicy::default(),
    );
    let webtech_pipeline = SourcePipeline::new(
        webtech.clone(),
        Arc::new(CircuitBreaker::new("webtech", CircuitBreakerConfig::default())),
        RetryPolicy::default(),
    );

    let crm_writer = Arc::new(CrmRestWriter::new(
        http_client.clone(),
        config.crm.login_url.clone(),
        config.crm.api_base.clone(),
        config.crm.client_id.clone(),
        config.crm.client_secret.clone(),
        config.crm.username.clone(),
        config.crm.password.clone(),
        config.crm.security_token.clone(),
    ));

    let audit_store: Arc<dyn AuditStore + Send + Sync> = match &config.audit_backend {
        AuditBackendConfig::Memory => {
            info!("using in-memory audit store");
            Arc::new(InMemoryAuditStore::new())
        }
        AuditBackendConfig::Postgres { url } => {
            info!("connecting to postgres audit store");
            Arc::new(PostgresAuditStore::new(&PostgresAuditConfig::new(url.clone())).await?)
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        places_pipeline,
        company_pipeline,
        webtech_pipeline,
        crm_writer,
        audit_store,
        REQUEST_DEADLINE,
    ));

    let state = AppState {
        orchestrator: orchestrator.clone(),
        metrics: Arc::new(Metrics::new()),
        ingress_api_key: Arc::from(config.ingress_api_key.as_str()),
    };
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "leadfit-server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!(timeout_secs = SHUTDOWN_GRACE.as_secs(), "shutting down web-tech browser");
    if tokio::time::timeout(SHUTDOWN_GRACE, webtech.shutdown()).await.is_err() {
        tracing::warn!("browser shutdown timed out");
    }

    info!("leadfit-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
