//! Stale-job reconciliation.
//!
//! Finds jobs stuck in processing whose attempt was lost (crash, dropped
//! timer, hung poll) and pushes them through retry-or-fail. Pending jobs
//! that no attempt ever claimed are re-driven.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use docflow_core::error::AppError;
use docflow_core::result::AppResult;
use docflow_entity::job::status::JobStatus;

use crate::orchestrator::{IngestionOrchestrator, now};

/// Error recorded on a job the sweep times out.
pub const PROCESSING_TIMEOUT_MESSAGE: &str = "Processing timeout";

/// What startup recovery did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Pending jobs handed back to the orchestrator.
    pub resumed: usize,
    /// Processing jobs timed out by the initial sweep.
    pub timed_out: usize,
}

/// Periodic sweep over processing jobs.
#[derive(Clone)]
pub struct StaleJobReconciler {
    /// Orchestrator whose retry-or-fail is applied.
    orchestrator: IngestionOrchestrator,
    /// Age after which a processing job is presumed lost.
    threshold: Duration,
}

impl std::fmt::Debug for StaleJobReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaleJobReconciler")
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl StaleJobReconciler {
    /// Creates a reconciler.
    pub fn new(orchestrator: IngestionOrchestrator, threshold: Duration) -> Self {
        Self {
            orchestrator,
            threshold,
        }
    }

    /// Runs one sweep against the current time.
    pub async fn reconcile(&self) -> AppResult<usize> {
        self.reconcile_at(now()).await
    }

    /// Runs one sweep as if the current time were `at`.
    ///
    /// Returns how many processing jobs this sweep timed out. A job that
    /// left processing before its turn is skipped, so back-to-back sweeps
    /// never touch the same job twice. Pending jobs whose backoff ran out
    /// more than the threshold ago, with no attempt claiming them, are
    /// re-driven as well.
    pub async fn reconcile_at(&self, at: DateTime<Utc>) -> AppResult<usize> {
        let cutoff = self.cutoff(at)?;
        let moved = self.time_out_stale(cutoff).await?;

        match self.orchestrator.redrive_overdue(cutoff).await {
            Ok(0) => {}
            Ok(redriven) => info!(redriven, %cutoff, "Orphaned pending jobs re-driven"),
            Err(e) => error!(error = %e, "Failed to re-drive orphaned pending jobs"),
        }

        Ok(moved)
    }

    fn cutoff(&self, at: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        let threshold = chrono::Duration::from_std(self.threshold).map_err(|e| {
            AppError::configuration(format!("Invalid staleness threshold: {e}"))
        })?;
        Ok(at - threshold)
    }

    async fn time_out_stale(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let stale = self
            .orchestrator
            .jobs()
            .find_stale(JobStatus::Processing, cutoff)
            .await?;

        if stale.is_empty() {
            debug!(%cutoff, "No stale ingestion jobs");
            return Ok(0);
        }

        info!(count = stale.len(), %cutoff, "Stale ingestion jobs found");

        let mut moved = 0;
        for job in stale {
            match self
                .orchestrator
                .time_out(job.id, cutoff, PROCESSING_TIMEOUT_MESSAGE)
                .await
            {
                Ok(Some(updated)) => {
                    moved += 1;
                    warn!(
                        job_id = %updated.id,
                        status = %updated.status,
                        retry_count = updated.retry_count,
                        "Stale ingestion job timed out"
                    );
                }
                Ok(None) => debug!(job_id = %job.id, "Stale job moved on before the sweep"),
                Err(e) => error!(job_id = %job.id, error = %e, "Failed to time out stale job"),
            }
        }

        info!(moved, "Stale job sweep completed");
        Ok(moved)
    }

    /// Recovery after a restart: optionally re-drive pending jobs, then
    /// sweep once.
    pub async fn startup_recovery(&self, resume_pending: bool) -> AppResult<RecoveryReport> {
        info!("Running startup ingestion recovery");

        let resumed = if resume_pending {
            self.orchestrator.resume_pending().await?
        } else {
            0
        };
        // Pending jobs are left to resume_pending here; the periodic sweep
        // re-drives any that stay orphaned.
        let timed_out = self.time_out_stale(self.cutoff(now())?).await?;

        let report = RecoveryReport { resumed, timed_out };
        if report == RecoveryReport::default() {
            info!("Startup recovery: nothing to recover");
        } else {
            info!(resumed, timed_out, "Startup recovery completed");
        }
        Ok(report)
    }
}
