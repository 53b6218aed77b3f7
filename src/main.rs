mod config;
mod crypto;
mod db;
mod domain;
mod import_utils;
mod middleware;
mod risk;
mod services;
mod state;
mod web;

use crate::config::{AppConfig, RiskConfig};
use crate::db::seed;
use crate::state::SharedState;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = AppConfig::from_env()?;
    let risk_cfg = RiskConfig::from_env();

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
    tracing::info!("Database migrations completed");

    let cipher = Arc::new(crypto::TranscriptCipher::new(&cfg.encryption_key)?);

    seed::seed_all(&pool).await?;

    let ai = Arc::new(services::ai::WellnessAi::new(
        &cfg.openai_api_key,
        risk_cfg.clone(),
    ));
    let mailer = Arc::new(services::email::Mailer::new(
        cfg.smtp.as_ref(),
        &cfg.emails_from,
        &cfg.hr_inbox,
    )?);

    let shared: SharedState = Arc::new(state::AppState {
        pool,
        cipher,
        ai,
        mailer,
        risk: risk_cfg,
        session_key: cfg.session_key.clone(),
        report_tz: cfg.report_tz,
    });

    let scheduler = JobScheduler::new().await?;

    // Daily report backfill. Sweeps hourly so yesterday's report lands
    // shortly after midnight in the report timezone; reruns are no-ops.
    let shared_for_reports = shared.clone();
    scheduler
        .add(Job::new_async("0 10 * * * *", move |_uuid, _l| {
            let state = shared_for_reports.clone();
            Box::pin(async move {
                if let Err(e) = services::report::backfill_yesterday(
                    &state.pool,
                    &state.ai,
                    &state.mailer,
                    state.report_tz,
                )
                .await
                {
                    tracing::error!("Daily report backfill failed: {}", e);
                }
            })
        })?)
        .await?;

    // Login rate-limiter cleanup every hour.
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            Box::pin(async move {
                web::auth::sweep_login_limiter().await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started:");
    tracing::info!("  - Daily report backfill: hourly sweep");
    tracing::info!("  - Rate limiter cleanup: hourly");

    let app = Router::new()
        .merge(web::routes(shared.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
