use crate::cmd::{connect_database, Engine};
use crate::modules::sync::StudentOutcome;
use anyhow::{Context, Result};
use clap::Args;

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Sync only this student instead of running a whole cycle.
    #[arg(long)]
    student: Option<i64>,
}

pub async fn run(args: SyncArgs) -> Result<()> {
    let pool = connect_database().await?;
    let engine = Engine::from_env(pool)?;

    match args.student {
        Some(student_id) => {
            let outcome = engine
                .orchestrator
                .sync_student(student_id)
                .await
                .with_context(|| {
                    let message = format!("failed to sync student {}", student_id);
                    tracing::error!(message);
                    message
                })?;
            if let StudentOutcome::Failed(e) = outcome {
                anyhow::bail!("sync of student {} failed: {}", student_id, e);
            }
        }
        None => {
            engine.orchestrator.run_sync_cycle().await.with_context(|| {
                let message = "Failed to run sync cycle.";
                tracing::error!(message);
                message
            })?;
            if let Err(e) = engine.monitor.check_and_notify().await {
                tracing::error!("inactivity phase aborted: {}", e);
            }
        }
    }

    Ok(())
}
