//! Ingestion job lifecycle: creation, attempts, retries, and completion.
//!
//! Every attempt runs in its own spawned task behind a supervisor task, so
//! an error or panic inside the attempt still lands in retry-or-fail. All
//! job writes happen under the per-job lock and go through the store's
//! compare-and-save on `(status, updated_at)`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::OwnedMutexGuard;
use tracing::Instrument;

use docflow_core::config::IngestionConfig;
use docflow_core::error::AppError;
use docflow_core::result::AppResult;
use docflow_core::types::id::{DocumentId, JobId};
use docflow_entity::document::model::Document;
use docflow_entity::job::model::Job;
use docflow_entity::job::status::JobStatus;

use crate::analysis::{AnalysisClient, AnalysisError, AnalysisStatus};
use crate::locks::JobLocks;
use crate::policy::RetryPolicy;
use crate::projector::DocumentStatusProjector;
use crate::store::{DocumentGateway, JobStore};

/// Recorded when the analysis service reports a failure without detail.
const UNSPECIFIED_FAILURE_MESSAGE: &str = "Analysis service reported failure";

/// Why an attempt ended without completing the job.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// Submit or poll failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// The analysis service reported the job as failed.
    #[error("{0}")]
    Reported(String),

    /// Store or gateway failure.
    #[error(transparent)]
    Internal(#[from] AppError),
}

/// Which writer is trying to record a failure.
#[derive(Debug, Clone, Copy)]
enum Guard {
    /// The attempt that claimed the job at this retry count.
    Attempt(i32),
    /// A sweep that saw the job processing before this cutoff.
    Stale(DateTime<Utc>),
}

impl Guard {
    fn admits(self, job: &Job) -> bool {
        match self {
            Self::Attempt(retry_count) => {
                !job.status.is_terminal() && job.retry_count == retry_count
            }
            Self::Stale(cutoff) => job.is_stale(cutoff),
        }
    }
}

/// Current time at PostgreSQL's microsecond precision.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Owns the ingestion job lifecycle.
#[derive(Clone)]
pub struct IngestionOrchestrator {
    jobs: Arc<dyn JobStore>,
    documents: Arc<dyn DocumentGateway>,
    analysis: Arc<dyn AnalysisClient>,
    projector: DocumentStatusProjector,
    locks: Arc<JobLocks>,
    policy: RetryPolicy,
    processing_delay: Duration,
}

impl fmt::Debug for IngestionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOrchestrator")
            .field("policy", &self.policy)
            .field("processing_delay", &self.processing_delay)
            .finish()
    }
}

impl IngestionOrchestrator {
    /// Create an orchestrator from its collaborators and the ingestion config.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        documents: Arc<dyn DocumentGateway>,
        analysis: Arc<dyn AnalysisClient>,
        config: &IngestionConfig,
    ) -> Self {
        Self {
            projector: DocumentStatusProjector::new(Arc::clone(&documents)),
            jobs,
            documents,
            analysis,
            locks: Arc::new(JobLocks::new()),
            policy: RetryPolicy::from_config(config),
            processing_delay: config.processing_delay(),
        }
    }

    /// The retry policy in force.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Number of jobs with a live lock entry.
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    pub(crate) fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    // ── Inbound operations ───────────────────────────────────────

    /// Create a pending job for `document` and start driving it.
    ///
    /// Returns as soon as the job is persisted; the outcome is visible
    /// only through later status queries.
    pub async fn trigger_ingestion(&self, document: &Document) -> AppResult<Job> {
        let job = self.jobs.create(&Job::new(document.id, now())).await?;

        tracing::info!(
            job_id = %job.id,
            document_id = %document.id,
            "Ingestion job created"
        );

        self.projector.project_job(&job).await;
        self.spawn_attempt(job.id, job.retry_count, Duration::ZERO);
        Ok(job)
    }

    /// Resolve a document by id, then trigger ingestion for it.
    pub async fn trigger_ingestion_for(&self, document_id: DocumentId) -> AppResult<Job> {
        let document = self
            .documents
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Document with ID {document_id} not found")))?;
        self.trigger_ingestion(&document).await
    }

    /// Current state of a job.
    pub async fn get_job_status(&self, job_id: JobId) -> AppResult<Job> {
        self.jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Ingestion job with ID {job_id} not found")))
    }

    /// Every job for a document, most recent first.
    pub async fn get_jobs_for_document(&self, document_id: DocumentId) -> AppResult<Vec<Job>> {
        self.jobs.find_by_document(document_id).await
    }

    /// Re-drive pending jobs whose timers died with a previous process.
    /// Each one waits out whatever is left of its backoff.
    pub async fn resume_pending(&self) -> AppResult<usize> {
        let pending = self.jobs.find_by_status(JobStatus::Pending).await?;
        let current = now();

        for job in &pending {
            let delay = self.remaining_backoff(job, current);
            tracing::info!(
                job_id = %job.id,
                retry_count = job.retry_count,
                delay_ms = delay.as_millis() as u64,
                "Resuming pending ingestion job"
            );
            self.spawn_attempt(job.id, job.retry_count, delay);
        }

        Ok(pending.len())
    }

    /// Re-drive pending jobs whose backoff ran out before `cutoff` without
    /// any attempt claiming them. Returns how many were re-driven.
    pub(crate) async fn redrive_overdue(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let overdue: Vec<Job> = self
            .jobs
            .find_stale(JobStatus::Pending, cutoff)
            .await?
            .into_iter()
            .filter(|job| self.remaining_backoff(job, cutoff).is_zero())
            .collect();

        for job in &overdue {
            tracing::warn!(
                job_id = %job.id,
                retry_count = job.retry_count,
                "Re-driving orphaned pending ingestion job"
            );
            self.spawn_attempt(job.id, job.retry_count, Duration::ZERO);
        }

        Ok(overdue.len())
    }

    /// Apply retry-or-fail to a job the sweep found stuck in processing.
    /// Returns the updated job, or `None` if it had already moved on.
    pub(crate) async fn time_out(
        &self,
        job_id: JobId,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> AppResult<Option<Job>> {
        self.retry_or_fail(job_id, message, Guard::Stale(cutoff))
            .await
    }

    // ── Attempt driver ───────────────────────────────────────────

    fn spawn_attempt(&self, job_id: JobId, retry_count: i32, delay: Duration) {
        let this = self.clone();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let span = tracing::info_span!(
                "ingestion_attempt",
                job_id = %job_id,
                document_id = tracing::field::Empty,
                retry_count
            );

            let attempt = {
                let this = this.clone();
                tokio::spawn(
                    async move { this.run_attempt(job_id, retry_count).await }
                        .instrument(span.clone()),
                )
            };

            let error = match attempt.await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("Ingestion attempt aborted: {e}"),
            };

            async {
                tracing::warn!(error = %error, "Ingestion attempt failed");
                if let Err(e) = this
                    .retry_or_fail(job_id, &error, Guard::Attempt(retry_count))
                    .await
                {
                    tracing::error!(
                        error = %e,
                        "Failed to record ingestion failure, leaving job to the stale sweep"
                    );
                }
            }
            .instrument(span)
            .await;
        });
    }

    async fn run_attempt(&self, job_id: JobId, retry_count: i32) -> Result<(), AttemptError> {
        let Some((job, document)) = self.claim(job_id, retry_count).await? else {
            return Ok(());
        };
        tracing::Span::current().record("document_id", tracing::field::display(job.document_id));

        let ack = self.analysis.submit(job.id, &document).await?;
        tracing::info!(reference = ?ack.reference, "Document submitted for analysis");

        loop {
            tokio::time::sleep(self.processing_delay).await;

            let report = self.analysis.poll(job_id).await?;
            match report.status {
                AnalysisStatus::Completed => {
                    self.complete(job_id, retry_count).await?;
                    return Ok(());
                }
                AnalysisStatus::Failed => {
                    return Err(AttemptError::Reported(
                        report
                            .error_message
                            .unwrap_or_else(|| UNSPECIFIED_FAILURE_MESSAGE.to_string()),
                    ));
                }
                AnalysisStatus::Processing => {
                    if !self.still_owns(job_id, retry_count).await? {
                        tracing::debug!("Attempt superseded while polling, stopping");
                        return Ok(());
                    }
                    tracing::debug!("Analysis still in progress");
                }
            }
        }
    }

    /// `Pending -> Processing` for the attempt at `retry_count`.
    async fn claim(&self, job_id: JobId, retry_count: i32) -> AppResult<Option<(Job, Document)>> {
        let lock = self.locks.acquire(job_id).await;

        let Some(mut job) = self.jobs.find_by_id(job_id).await? else {
            tracing::warn!("Ingestion job disappeared before its attempt");
            return Ok(None);
        };
        if job.status != JobStatus::Pending || job.retry_count != retry_count {
            tracing::debug!(
                status = %job.status,
                current_retry_count = job.retry_count,
                "Attempt superseded before start"
            );
            self.release_if_terminal(lock, &job);
            return Ok(None);
        }

        let document = self
            .documents
            .find_by_id(job.document_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Document with ID {} not found", job.document_id))
            })?;

        let expected_updated_at = job.updated_at;
        job.begin_processing(now())?;
        if !self
            .jobs
            .compare_and_save(&job, JobStatus::Pending, expected_updated_at)
            .await?
        {
            tracing::debug!("Concurrent write won the claim");
            return Ok(None);
        }

        self.projector.project_job(&job).await;
        tracing::info!("Ingestion job processing");
        Ok(Some((job, document)))
    }

    /// `Processing -> Completed` for the attempt at `retry_count`.
    async fn complete(&self, job_id: JobId, retry_count: i32) -> AppResult<()> {
        let lock = self.locks.acquire(job_id).await;

        let Some(mut job) = self.jobs.find_by_id(job_id).await? else {
            return Ok(());
        };
        if job.status != JobStatus::Processing || job.retry_count != retry_count {
            tracing::debug!(status = %job.status, "Completion superseded");
            self.release_if_terminal(lock, &job);
            return Ok(());
        }

        let expected_updated_at = job.updated_at;
        job.complete(now())?;
        if !self
            .jobs
            .compare_and_save(&job, JobStatus::Processing, expected_updated_at)
            .await?
        {
            tracing::debug!("Concurrent write won over completion");
            return Ok(());
        }

        self.projector.project_job(&job).await;
        tracing::info!("Ingestion job completed");

        drop(lock);
        self.locks.release(job_id);
        Ok(())
    }

    /// Record `error` and either schedule the next attempt or fail the job.
    async fn retry_or_fail(
        &self,
        job_id: JobId,
        error: &str,
        guard: Guard,
    ) -> AppResult<Option<Job>> {
        let lock = self.locks.acquire(job_id).await;

        let Some(mut job) = self.jobs.find_by_id(job_id).await? else {
            return Ok(None);
        };
        if !guard.admits(&job) {
            tracing::debug!(
                job_id = %job_id,
                ?guard,
                status = %job.status,
                retry_count = job.retry_count,
                "Failure no longer applies"
            );
            self.release_if_terminal(lock, &job);
            return Ok(None);
        }

        let expected_status = job.status;
        let expected_updated_at = job.updated_at;
        let retry = self.policy.should_retry(job.retry_count);
        if retry {
            job.schedule_retry(error, now())?;
        } else {
            job.fail(error, now())?;
        }

        if !self
            .jobs
            .compare_and_save(&job, expected_status, expected_updated_at)
            .await?
        {
            tracing::debug!(job_id = %job_id, "Concurrent write won over failure");
            return Ok(None);
        }

        self.projector.project_job(&job).await;
        drop(lock);

        if retry {
            let delay = self.policy.backoff_delay(job.retry_count);
            tracing::info!(
                job_id = %job.id,
                retry_count = job.retry_count,
                max_retries = self.policy.max_retries(),
                delay_ms = delay.as_millis() as u64,
                error,
                "Ingestion retry scheduled"
            );
            self.spawn_attempt(job.id, job.retry_count, delay);
        } else {
            tracing::warn!(
                job_id = %job.id,
                retry_count = job.retry_count,
                error,
                "Ingestion job failed after exhausting retries"
            );
            self.locks.release(job_id);
        }

        Ok(Some(job))
    }

    /// Drop `lock` and forget the job's entry once nothing can write it again.
    fn release_if_terminal(&self, lock: OwnedMutexGuard<()>, job: &Job) {
        drop(lock);
        if job.status.is_terminal() {
            self.locks.release(job.id);
        }
    }

    async fn still_owns(&self, job_id: JobId, retry_count: i32) -> AppResult<bool> {
        Ok(matches!(
            self.jobs.find_by_id(job_id).await?,
            Some(job) if job.status == JobStatus::Processing && job.retry_count == retry_count
        ))
    }

    fn remaining_backoff(&self, job: &Job, current: DateTime<Utc>) -> Duration {
        if job.retry_count == 0 {
            return Duration::ZERO;
        }
        let elapsed = (current - job.updated_at).to_std().unwrap_or_default();
        self.policy
            .backoff_delay(job.retry_count)
            .saturating_sub(elapsed)
    }
}
