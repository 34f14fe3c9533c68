use crate::cmd::{connect_database, Engine};
use crate::modules::{
    handlers::{
        liveness, readiness,
        schedule::{get_schedule, update_schedule},
        student::{contest_history, get_student, list_students, problem_solving_data, update_handle},
    },
    migration::MIGRATOR,
    scheduler::{ProgressCycle, Scheduler},
    store::Store,
    sync::SyncOrchestrator,
};
use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing, Router, Server,
};
use clap::Args;
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::cors::{AllowOrigin, CorsLayer};

#[derive(Debug, Args)]
pub struct ServerArgs {
    #[arg(long)]
    port: Option<u16>,
}

pub async fn run(args: ServerArgs) -> Result<()> {
    let pool = connect_database().await?;
    MIGRATOR.run(&pool).await.with_context(|| {
        let message = "Failed to apply database migrations.";
        tracing::error!(message);
        message
    })?;

    let engine = Engine::from_env(pool)?;
    engine.store.ping().await.with_context(|| {
        let message = "database is not available";
        tracing::error!(message);
        message
    })?;

    let scheduler = Arc::new(Scheduler::new(Arc::new(ProgressCycle::new(
        engine.orchestrator.clone(),
        engine.monitor.clone(),
    ))));
    let expression = env::var("CRON_SCHEDULE_TIME").unwrap_or_else(|_| {
        tracing::warn!("CRON_SCHEDULE_TIME environment variable is not set. Default value `0 2 * * *` will be used.");
        String::from("0 2 * * *")
    });
    scheduler.install(&expression).await.with_context(|| {
        let message = format!("CRON_SCHEDULE_TIME `{}` is not a valid schedule", expression);
        tracing::error!(message);
        message
    })?;
    let first_cycle = scheduler.clone();
    tokio::spawn(async move { first_cycle.run_now().await });

    let origin = env::var("FRONTEND_ORIGIN_URL").unwrap_or(String::from("http://localhost:3000"));
    let origin = HeaderValue::from_str(&origin).with_context(|| {
        let message = format!("FRONTEND_ORIGIN_URL `{}` is not a valid origin", origin);
        tracing::error!(message);
        message
    })?;
    let app = create_router(engine.store.clone(), engine.orchestrator.clone(), scheduler.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::exact(origin))
                .allow_methods([Method::GET, Method::PUT])
                .allow_headers([CONTENT_TYPE]),
        );
    let port = match args.port {
        Some(port) => port,
        None => {
            tracing::warn!("API server will be launched at default port number 8000");
            8000u16
        }
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server start at port {}", port);
    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    scheduler.stop().await;
    tracing::info!("Scheduler stopped.");

    Ok(())
}

fn create_router(
    store: Arc<dyn Store>,
    orchestrator: Arc<SyncOrchestrator>,
    scheduler: Arc<Scheduler>,
) -> Router {
    Router::new()
        .route("/api/students", routing::get(list_students))
        .route("/api/students/:id", routing::get(get_student))
        .route("/api/students/:id/handle", routing::put(update_handle))
        .route("/api/students/:id/contest-history", routing::get(contest_history))
        .route(
            "/api/students/:id/problem-solving-data",
            routing::get(problem_solving_data),
        )
        .route(
            "/api/cron/schedule",
            routing::get(get_schedule).put(update_schedule),
        )
        .route("/api/liveness", routing::get(liveness))
        .route("/api/readiness", routing::get(readiness))
        .layer(Extension(store))
        .layer(Extension(orchestrator))
        .layer(Extension(scheduler))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler.");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown.");
}
