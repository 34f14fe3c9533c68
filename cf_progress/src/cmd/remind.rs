use crate::cmd::{connect_database, Engine};
use anyhow::{Context, Result};
use clap::Args;

#[derive(Debug, Args)]
pub struct RemindArgs {}

pub async fn run(_args: RemindArgs) -> Result<()> {
    let pool = connect_database().await?;
    let engine = Engine::from_env(pool)?;

    let report = engine.monitor.check_and_notify().await.with_context(|| {
        let message = "Failed to run inactivity check.";
        tracing::error!(message);
        message
    })?;
    tracing::info!(
        "{} students checked, {} reminded, {} undelivered, {} failed.",
        report.checked,
        report.notified.len(),
        report.undelivered.len(),
        report.failed.len()
    );

    Ok(())
}
