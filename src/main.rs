use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use lms::config::StoreBackend;
use lms::openapi::ApiDoc;
use lms::rate_limit::RateLimiterFacade;
use lms::repo::Repo;
use lms::{config, AppConfig, AppState, SecurityHeaders};

async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    match cfg.store {
        #[cfg(feature = "inmem-store")]
        StoreBackend::Memory => {
            use lms::repo::inmem::InMemRepo;
            let repo = match &cfg.data_dir {
                Some(dir) => {
                    info!("Using in-memory repository with snapshots in {}", dir.display());
                    InMemRepo::with_snapshot_dir(dir)
                }
                None => {
                    info!("Using in-memory repository backend");
                    InMemRepo::new()
                }
            };
            Ok(Arc::new(repo))
        }
        #[cfg(feature = "postgres-store")]
        StoreBackend::Postgres => {
            let url = cfg.database_url.as_deref().context("DATABASE_URL must be set")?;
            let repo = lms::repo::pg::PgRepo::connect(url, cfg.db_max_connections)
                .await
                .context("failed to connect to Postgres")?;
            info!("Using Postgres repository backend");
            Ok(Arc::new(repo))
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("store backend {other:?} is not compiled into this build"),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping LMS server");
    let cfg = AppConfig::from_env()?;
    info!("Frontend URL: {}", cfg.frontend_url.as_deref().unwrap_or("http://localhost:5173"));

    let repo = build_repo(&cfg).await?;
    let mut state = AppState::new(repo).with_upload_limit(cfg.upload_limit);
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => warn!("metrics recorder not installed: {e}"),
    }
    if cfg.rate_limit.enabled {
        info!("Rate limiting enabled");
        state = state.with_rate_limiter(RateLimiterFacade::new(cfg.rate_limit.clone()));
    }

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let enable_hsts = cfg.enable_hsts;
    let frontend_url = cfg.frontend_url.clone();
    let state = web::Data::new(state);
    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // during local dev allow React/Vite default ports
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            if let Some(front) = &frontend_url {
                c = c.allowed_origin(front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::new(enable_hsts))
            .wrap(cors)
            .app_data(state.clone())
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(cfg.bind_addr.as_str())
    .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;

    info!("Listening on http://{}", cfg.bind_addr);
    server.run().await?;
    Ok(())
}
