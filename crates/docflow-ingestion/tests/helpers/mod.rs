//! Shared fixtures for ingestion integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use docflow_core::config::IngestionConfig;
use docflow_core::types::id::{DocumentId, JobId};
use docflow_entity::document::model::Document;
use docflow_entity::document::status::DocumentProcessingStatus;
use docflow_entity::job::model::Job;
use docflow_ingestion::analysis::{AnalysisClient, AnalysisError, AnalysisReport, SubmissionAck};
use docflow_ingestion::store::{DocumentGateway, InMemoryDocumentGateway, InMemoryJobStore, JobStore};
use docflow_ingestion::{IngestionOrchestrator, StaleJobReconciler};

/// One scripted answer to a poll.
#[derive(Debug)]
pub enum PollStep {
    /// Return this report.
    Report(AnalysisReport),
    /// Fail the call.
    Error(String),
    /// Panic inside the attempt.
    Panic,
}

/// Analysis client that replays scripted answers, then completes.
#[derive(Debug, Default)]
pub struct ScriptedAnalysisClient {
    submit_failures: Mutex<VecDeque<String>>,
    polls: Mutex<VecDeque<PollStep>>,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl ScriptedAnalysisClient {
    pub fn fail_next_submit(&self, message: &str) {
        self.submit_failures
            .lock()
            .unwrap()
            .push_back(message.to_string());
    }

    pub fn push_poll(&self, step: PollStep) {
        self.polls.lock().unwrap().push_back(step);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisClient for ScriptedAnalysisClient {
    async fn submit(
        &self,
        job_id: JobId,
        _document: &Document,
    ) -> Result<SubmissionAck, AnalysisError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.submit_failures.lock().unwrap().pop_front();
        match failure {
            Some(message) => Err(AnalysisError::Transport(message)),
            None => Ok(SubmissionAck {
                job_id,
                reference: Some(format!("remote-{job_id}")),
            }),
        }
    }

    async fn poll(&self, _job_id: JobId) -> Result<AnalysisReport, AnalysisError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.polls.lock().unwrap().pop_front();
        match step {
            None => Ok(AnalysisReport::completed()),
            Some(PollStep::Report(report)) => Ok(report),
            Some(PollStep::Error(message)) => Err(AnalysisError::Transport(message)),
            Some(PollStep::Panic) => panic!("scripted analysis client panic"),
        }
    }
}

/// Orchestrator wired to in-memory stores and a scripted client.
pub struct TestHarness {
    pub orchestrator: IngestionOrchestrator,
    pub reconciler: StaleJobReconciler,
    pub jobs: Arc<InMemoryJobStore>,
    pub documents: Arc<InMemoryDocumentGateway>,
    pub analysis: Arc<ScriptedAnalysisClient>,
    pub config: IngestionConfig,
}

impl TestHarness {
    /// Harness with the default ingestion config.
    pub fn new() -> Self {
        let config = IngestionConfig::default();
        let jobs = Arc::new(InMemoryJobStore::new());
        let documents = Arc::new(InMemoryDocumentGateway::new());
        let analysis = Arc::new(ScriptedAnalysisClient::default());

        let orchestrator = IngestionOrchestrator::new(
            jobs.clone(),
            documents.clone(),
            analysis.clone(),
            &config,
        );
        let reconciler =
            StaleJobReconciler::new(orchestrator.clone(), config.staleness_threshold());

        Self {
            orchestrator,
            reconciler,
            jobs,
            documents,
            analysis,
            config,
        }
    }

    /// Register a fresh document and return it.
    pub fn add_document(&self) -> Document {
        let document = sample_document();
        self.documents.insert(document.clone());
        document
    }

    pub async fn job(&self, id: JobId) -> Job {
        self.jobs.find_by_id(id).await.unwrap().expect("job exists")
    }

    pub async fn document_status(&self, id: DocumentId) -> DocumentProcessingStatus {
        self.documents
            .get_processing_status(id)
            .await
            .unwrap()
            .expect("document exists")
    }

    /// Insert a job straight into the store without driving it.
    pub async fn seed_job(&self, job: Job) -> Job {
        self.jobs.create(&job).await.unwrap()
    }

    /// Step virtual time until `predicate` holds for the job.
    pub async fn wait_for_job(&self, id: JobId, predicate: impl Fn(&Job) -> bool) -> Job {
        for _ in 0..3_000 {
            let job = self.job(id).await;
            if predicate(&job) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("job {id} never reached the expected state: {:?}", self.job(id).await);
    }

    /// Step virtual time until `condition` holds.
    pub async fn wait_until(&self, condition: impl Fn() -> bool) {
        for _ in 0..3_000 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("condition never became true");
    }
}

pub fn sample_document() -> Document {
    let now = Utc::now();
    Document {
        id: DocumentId::new(),
        title: "Annual report".to_string(),
        description: Some("FY financial statements".to_string()),
        file_name: "annual-report.pdf".to_string(),
        file_path: "uploads/annual-report.pdf".to_string(),
        file_size: 48_213,
        mime_type: "application/pdf".to_string(),
        processing_status: DocumentProcessingStatus::NotProcessed,
        owner_id: Some(uuid::Uuid::new_v4()),
        created_at: now,
        updated_at: now,
    }
}
