pub mod migrate;
pub mod remind;
pub mod server;
pub mod sync;

use crate::modules::{
    inactivity::{parse_window_days, InactivityMonitor, DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS},
    notifier::{LogNotifier, Notifier, WebhookNotifier},
    store::{PgStore, Store},
    sync::{Fetcher, SyncOrchestrator},
};
use anyhow::{Context, Result};
use cf_progress_libs::codeforces::CodeforcesClient;
use sqlx::{postgres::Postgres, Pool};
use std::{env, sync::Arc};
use url::Url;

pub async fn connect_database() -> Result<Pool<Postgres>> {
    let database_url: String = env::var("DATABASE_URL").with_context(|| {
        let message = "DATABASE_URL must be configured.";
        tracing::error!(message);
        message
    })?;

    let pool: Pool<Postgres> = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .with_context(|| {
            let message = "Failed to create database connection pool.";
            tracing::error!(message);
            message
        })?;

    Ok(pool)
}

/// Everything a cycle needs, wired from the environment.
pub struct Engine {
    pub store: Arc<dyn Store>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub monitor: Arc<InactivityMonitor>,
}

impl Engine {
    pub fn from_env(pool: Pool<Postgres>) -> Result<Self> {
        let base_url = env::var("CODEFORCES_API_BASE_URL").unwrap_or_else(|_| {
            tracing::warn!("CODEFORCES_API_BASE_URL environment variable is not set. Default value `https://codeforces.com/api/` will be used.");
            String::from("https://codeforces.com/api/")
        });
        let client = CodeforcesClient::new(&base_url).with_context(|| {
            let message = format!("couldn't create codeforces client for {}", base_url);
            tracing::error!(message);
            message
        })?;

        let window_days: i64 = match env::var("INACTIVITY_DAYS") {
            Ok(days) => parse_window_days(&days).with_context(|| {
                let message = format!(
                    "INACTIVITY_DAYS must be a number of days between 1 and {}, got `{}`",
                    MAX_WINDOW_DAYS, days
                );
                tracing::error!(message);
                message
            })?,
            Err(_) => DEFAULT_WINDOW_DAYS,
        };

        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            Fetcher::new(Arc::new(client)),
        ));
        let monitor = Arc::new(InactivityMonitor::new(
            store.clone(),
            notifier_from_env()?,
            window_days,
        ));

        Ok(Self {
            store,
            orchestrator,
            monitor,
        })
    }
}

fn notifier_from_env() -> Result<Arc<dyn Notifier>> {
    let url = match env::var("NOTIFIER_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!("NOTIFIER_URL environment variable is not set. Reminders will only be logged.");
            return Ok(Arc::new(LogNotifier));
        }
    };

    let url = Url::parse(&url).with_context(|| {
        let message = format!("NOTIFIER_URL `{}` is not a valid url", url);
        tracing::error!(message);
        message
    })?;
    let notifier = WebhookNotifier::new(url, env::var("NOTIFIER_FROM").ok())
        .context("couldn't create notifier http client")?;

    Ok(Arc::new(notifier))
}
