//! Integration tests for stale-job reconciliation and startup recovery.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use docflow_core::config::IngestionConfig;
use docflow_core::error::AppError;
use docflow_core::result::AppResult;
use docflow_core::types::id::{DocumentId, JobId};
use docflow_entity::document::model::Document;
use docflow_entity::document::status::DocumentProcessingStatus;
use docflow_entity::job::model::Job;
use docflow_entity::job::status::JobStatus;
use docflow_ingestion::analysis::SimulatedAnalysisClient;
use docflow_ingestion::store::{InMemoryDocumentGateway, InMemoryJobStore, JobStore};
use docflow_ingestion::{IngestionOrchestrator, RecoveryReport, StaleJobReconciler};
use docflow_ingestion::analysis::AnalysisReport;
use docflow_ingestion::reconciler::PROCESSING_TIMEOUT_MESSAGE;

use helpers::{PollStep, TestHarness};

/// A job that entered processing `age` ago and was never polled.
fn stuck_job(document: &Document, age: TimeDelta) -> Job {
    let started = Utc::now() - age;
    let mut job = Job::new(document.id, started);
    job.begin_processing(started).unwrap();
    job
}

#[tokio::test(start_paused = true)]
async fn test_sweep_times_out_stuck_job_and_retries() {
    let h = TestHarness::new();
    let document = h.add_document();
    let job = h.seed_job(stuck_job(&document, TimeDelta::minutes(20))).await;

    let moved = h.reconciler.reconcile().await.unwrap();
    assert_eq!(moved, 1);

    let retried = h.job(job.id).await;
    assert_eq!(retried.status, JobStatus::Pending);
    assert_eq!(retried.retry_count, 1);
    assert_eq!(
        retried.error_message.as_deref(),
        Some(PROCESSING_TIMEOUT_MESSAGE)
    );
    assert_eq!(
        h.document_status(document.id).await,
        DocumentProcessingStatus::Processing
    );

    // The job left processing, so an immediate second sweep is a no-op.
    assert_eq!(h.reconciler.reconcile().await.unwrap(), 0);
    assert_eq!(h.job(job.id).await.retry_count, 1);

    let done = h
        .wait_for_job(job.id, |j| j.status == JobStatus::Completed)
        .await;
    assert_eq!(done.retry_count, 1);
    assert_eq!(
        h.document_status(document.id).await,
        DocumentProcessingStatus::Processed
    );
}

#[tokio::test(start_paused = true)]
async fn test_sweep_fails_job_at_retry_cap() {
    let h = TestHarness::new();
    let document = h.add_document();
    let mut stuck = stuck_job(&document, TimeDelta::minutes(15));
    stuck.retry_count = 3;
    let job = h.seed_job(stuck).await;

    assert_eq!(h.reconciler.reconcile().await.unwrap(), 1);
    let failed = h.job(job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.retry_count, 3);
    assert_eq!(
        failed.error_message.as_deref(),
        Some(PROCESSING_TIMEOUT_MESSAGE)
    );
    assert_eq!(
        h.document_status(document.id).await,
        DocumentProcessingStatus::Failed
    );

    assert_eq!(h.reconciler.reconcile().await.unwrap(), 0);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.analysis.submit_calls(), 0);
    assert_eq!(h.job(job.id).await, failed);
}

#[tokio::test]
async fn test_sweep_ignores_fresh_and_terminal_jobs() {
    let h = TestHarness::new();
    let document = h.add_document();

    let fresh = h.seed_job(stuck_job(&document, TimeDelta::minutes(2))).await;

    let old = Utc::now() - TimeDelta::hours(1);
    let mut completed = Job::new(document.id, old);
    completed.begin_processing(old).unwrap();
    completed.complete(old).unwrap();
    let completed = h.seed_job(completed).await;

    assert_eq!(h.reconciler.reconcile().await.unwrap(), 0);
    assert_eq!(h.job(fresh.id).await.status, JobStatus::Processing);
    assert_eq!(h.job(completed.id).await.status, JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_preempts_hung_attempt() {
    let h = TestHarness::new();
    let document = h.add_document();
    h.analysis
        .push_poll(PollStep::Report(AnalysisReport::processing()));

    let job = h.orchestrator.trigger_ingestion(&document).await.unwrap();
    h.wait_until(|| h.analysis.poll_calls() >= 1).await;
    assert_eq!(h.job(job.id).await.status, JobStatus::Processing);

    let moved = h
        .reconciler
        .reconcile_at(Utc::now() + TimeDelta::minutes(11))
        .await
        .unwrap();
    assert_eq!(moved, 1);

    let done = h
        .wait_for_job(job.id, |j| j.status == JobStatus::Completed)
        .await;
    assert_eq!(done.retry_count, 1);
    assert_eq!(
        done.error_message.as_deref(),
        Some(PROCESSING_TIMEOUT_MESSAGE)
    );
    assert_eq!(h.analysis.submit_calls(), 2);

    // The superseded attempt's late poll must not disturb the result.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.job(job.id).await, done);
}

#[tokio::test(start_paused = true)]
async fn test_startup_recovery_resumes_pending_and_sweeps() {
    let h = TestHarness::new();
    let document = h.add_document();

    let pending = h.seed_job(Job::new(document.id, Utc::now())).await;
    let stuck = h.seed_job(stuck_job(&document, TimeDelta::minutes(30))).await;

    let report = h.reconciler.startup_recovery(true).await.unwrap();
    assert_eq!(
        report,
        RecoveryReport {
            resumed: 1,
            timed_out: 1,
        }
    );

    let pending = h
        .wait_for_job(pending.id, |j| j.status == JobStatus::Completed)
        .await;
    assert_eq!(pending.retry_count, 0);
    let stuck = h
        .wait_for_job(stuck.id, |j| j.status == JobStatus::Completed)
        .await;
    assert_eq!(stuck.retry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_startup_recovery_can_skip_pending() {
    let h = TestHarness::new();
    let document = h.add_document();
    let pending = h.seed_job(Job::new(document.id, Utc::now())).await;

    let report = h.reconciler.startup_recovery(false).await.unwrap();
    assert_eq!(report, RecoveryReport::default());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.job(pending.id).await.status, JobStatus::Pending);
    assert_eq!(h.analysis.submit_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_resumed_job_waits_out_remaining_backoff() {
    let h = TestHarness::new();
    let document = h.add_document();

    let mut waiting = Job::new(document.id, Utc::now());
    waiting.begin_processing(Utc::now()).unwrap();
    waiting.schedule_retry("poll failed", Utc::now()).unwrap();
    waiting.begin_processing(Utc::now()).unwrap();
    waiting.schedule_retry("poll failed", Utc::now()).unwrap();
    let waiting = h.seed_job(waiting).await;
    assert_eq!(waiting.retry_count, 2);

    h.orchestrator.resume_pending().await.unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.job(waiting.id).await.status, JobStatus::Pending);
    assert_eq!(h.analysis.submit_calls(), 0);

    let done = h
        .wait_for_job(waiting.id, |j| j.status == JobStatus::Completed)
        .await;
    assert_eq!(done.retry_count, 2);
}

/// Job store whose first `failures` lookups error out.
#[derive(Debug)]
struct FlakyJobStore {
    inner: InMemoryJobStore,
    failures: AtomicUsize,
}

impl FlakyJobStore {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryJobStore::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn create(&self, job: &Job) -> AppResult<Job> {
        self.inner.create(job).await
    }

    async fn save(&self, job: &Job) -> AppResult<Job> {
        self.inner.save(job).await
    }

    async fn compare_and_save(
        &self,
        job: &Job,
        expected_status: JobStatus,
        expected_updated_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.inner
            .compare_and_save(job, expected_status, expected_updated_at)
            .await
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::internal("connection reset"));
        }
        self.inner.find_by_id(id).await
    }

    async fn find_by_document(&self, document_id: DocumentId) -> AppResult<Vec<Job>> {
        self.inner.find_by_document(document_id).await
    }

    async fn find_stale(&self, status: JobStatus, older_than: DateTime<Utc>) -> AppResult<Vec<Job>> {
        self.inner.find_stale(status, older_than).await
    }

    async fn find_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>> {
        self.inner.find_by_status(status).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_sweep_redrives_job_orphaned_in_pending() {
    let config = IngestionConfig::default();
    let jobs = Arc::new(FlakyJobStore::new(2));
    let documents = Arc::new(InMemoryDocumentGateway::new());
    let document = helpers::sample_document();
    documents.insert(document.clone());

    let orchestrator = IngestionOrchestrator::new(
        jobs.clone(),
        documents,
        Arc::new(SimulatedAnalysisClient::new(0)),
        &config,
    );
    let reconciler = StaleJobReconciler::new(orchestrator.clone(), config.staleness_threshold());

    // Both the claim and the failure record hit a store error.
    let job = orchestrator.trigger_ingestion(&document).await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    let stranded = jobs.inner.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stranded.status, JobStatus::Pending);
    assert_eq!(jobs.failures.load(Ordering::SeqCst), 0);

    // Not yet orphaned long enough.
    assert_eq!(reconciler.reconcile().await.unwrap(), 0);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        jobs.inner.find_by_id(job.id).await.unwrap().unwrap().status,
        JobStatus::Pending
    );

    reconciler
        .reconcile_at(Utc::now() + TimeDelta::hours(1))
        .await
        .unwrap();

    let mut done = None;
    for _ in 0..300 {
        let current = jobs.inner.find_by_id(job.id).await.unwrap().unwrap();
        if current.status == JobStatus::Completed {
            done = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let done = done.expect("re-driven job completes");
    assert_eq!(done.retry_count, 0);
    assert_eq!(orchestrator.tracked_locks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_leaves_pending_job_inside_backoff() {
    let h = TestHarness::new();
    let document = h.add_document();

    let mut waiting = Job::new(document.id, Utc::now());
    waiting.begin_processing(Utc::now()).unwrap();
    waiting.schedule_retry("poll failed", Utc::now()).unwrap();
    let waiting = h.seed_job(waiting).await;

    // Past the threshold, but one second of the 2s backoff is still left.
    let threshold = TimeDelta::from_std(h.config.staleness_threshold()).unwrap();
    let at = waiting.updated_at + threshold + TimeDelta::seconds(1);
    assert_eq!(h.reconciler.reconcile_at(at).await.unwrap(), 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.job(waiting.id).await.status, JobStatus::Pending);
    assert_eq!(h.analysis.submit_calls(), 0);
}
