use actix_web::dev::Service;
use actix_web::{middleware::Logger, web, App, HttpServer};
use conversation_service::{
    config::{self, StoreBackend},
    db, error,
    jobs::{self, IdleEvictionJob, InterestExpiryJob, MaintenanceJob, MatchReconcilerJob},
    logging, metrics,
    middleware::RequestIdMiddleware,
    repository::{memory::MemoryStore, postgres::PgStore, Stores},
    routes,
    state::AppState,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let stores = match cfg.store_backend {
        StoreBackend::Postgres => {
            let url = cfg
                .database_url
                .as_deref()
                .ok_or_else(|| error::AppError::Config("DATABASE_URL missing".into()))?;
            let pool = db::init_pool(url).await?;
            Stores::from_postgres(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("running with the in-memory store; data is lost on restart");
            Stores::from_memory(Arc::new(MemoryStore::new()))
        }
    };

    let state = AppState::build(cfg.clone(), stores);

    let (shutdown_tx, _) = broadcast::channel(1);
    let maintenance: Vec<Arc<dyn MaintenanceJob>> = vec![
        Arc::new(MatchReconcilerJob::new(
            state.interests.clone(),
            cfg.jobs.match_reconcile_interval,
            cfg.jobs.match_reconcile_batch,
        )),
        Arc::new(InterestExpiryJob::new(
            state.interests.clone(),
            cfg.jobs.interest_expiry_interval,
            cfg.jobs.interest_expiry_days,
        )),
        Arc::new(IdleEvictionJob::new(
            state.typing.clone(),
            state.chat.events.notifier().clone(),
            cfg.jobs.idle_evict_interval,
        )),
    ];
    let job_handles = jobs::spawn_jobs(maintenance, &shutdown_tx);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting conversation-service (REST on port {})", cfg.port);

    let rest_state = state.clone();
    let server = HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(RequestIdMiddleware)
            .wrap(Logger::default())
            .wrap_fn(|req, srv| {
                let start = Instant::now();
                let method = req.method().to_string();
                let path = req
                    .match_pattern()
                    .unwrap_or_else(|| "unmatched".to_string());
                let fut = srv.call(req);
                async move {
                    let res = fut.await?;
                    metrics::observe_http(&method, &path, res.status().as_u16(), start.elapsed());
                    Ok(res)
                }
            })
            .app_data(web::Data::new(rest_state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind REST: {e}")))?
    .run();

    let result = server
        .await
        .map_err(|e| error::AppError::StartServer(format!("REST server: {e}")));

    tracing::info!("HTTP server stopped, shutting down maintenance jobs");
    let _ = shutdown_tx.send(());
    for handle in job_handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "maintenance job panicked");
        }
    }
    result
}
