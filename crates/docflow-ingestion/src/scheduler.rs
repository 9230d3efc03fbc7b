//! Scheduler for the periodic stale-job sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use docflow_core::error::AppError;

use crate::reconciler::StaleJobReconciler;

/// Runs the reconciler on a fixed interval.
pub struct IngestionScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Reconciler invoked by the sweep
    reconciler: Arc<StaleJobReconciler>,
    /// Time between sweeps
    sweep_interval: Duration,
}

impl std::fmt::Debug for IngestionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionScheduler")
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl IngestionScheduler {
    /// Create a new scheduler
    pub async fn new(
        reconciler: StaleJobReconciler,
        sweep_interval: Duration,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self {
            scheduler,
            reconciler: Arc::new(reconciler),
            sweep_interval,
        })
    }

    /// Register all scheduled tasks
    pub async fn register_default_tasks(&self) -> Result<(), AppError> {
        self.register_stale_sweep().await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!("Ingestion scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        // The handle shares its state; shutting down a copy stops the scheduler.
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        tracing::info!("Ingestion scheduler shut down");
        Ok(())
    }

    /// Stale-job sweep, every `sweep_interval`
    async fn register_stale_sweep(&self) -> Result<(), AppError> {
        let reconciler = Arc::clone(&self.reconciler);
        let job = CronJob::new_repeated_async(self.sweep_interval, move |_uuid, _lock| {
            let reconciler = Arc::clone(&reconciler);
            Box::pin(async move {
                tracing::trace!("Running stale job sweep");
                if let Err(e) = reconciler.reconcile().await {
                    tracing::error!("Stale job sweep failed: {}", e);
                }
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create stale_job_sweep schedule: {e}"))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add stale_job_sweep schedule: {e}"))
        })?;

        tracing::info!(
            "Registered: stale_job_sweep (every {}s)",
            self.sweep_interval.as_secs()
        );
        Ok(())
    }
}
