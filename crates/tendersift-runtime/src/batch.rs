//! Batch runner: many documents, bounded concurrency, cooperative cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use tendersift_ingest::Document;

use crate::pipeline::TenderPipeline;
use crate::types::TenderAnalysis;

/// One finished document. Completions arrive in any order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchProgress {
    pub job_id: String,
    pub doc_key: String,
    pub filename: String,
    pub failed: bool,
    pub done: usize,
    pub total: usize,
}

pub type ProgressFn = Arc<dyn Fn(&BatchProgress) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub job_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Documents never started because the job was cancelled.
    pub cancelled: usize,
    /// In completion order.
    pub analyses: Vec<TenderAnalysis>,
}

pub struct BatchRunner {
    pipeline: Arc<TenderPipeline>,
    max_concurrency: usize,
    progress: Option<ProgressFn>,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<TenderPipeline>) -> Self {
        let max_concurrency = pipeline.config().max_concurrency.max(1);
        Self {
            pipeline,
            max_concurrency,
            progress: None,
        }
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn on_progress(mut self, f: impl Fn(&BatchProgress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(f));
        self
    }

    /// Process `documents` until done or cancelled.
    ///
    /// Cancellation is checked before each document starts. Documents already
    /// running finish and their results are kept.
    pub async fn run(&self, documents: Vec<Document>, cancel: CancellationToken) -> BatchReport {
        let job_id = Uuid::new_v4().to_string();
        let total = documents.len();
        info!(
            "Batch {} started: {} documents, concurrency {}",
            job_id, total, self.max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let done = Arc::new(AtomicUsize::new(0));
        let mut tasks: JoinSet<TenderAnalysis> = JoinSet::new();
        let mut started = 0usize;

        for document in documents {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                break;
            };
            started += 1;

            let pipeline = Arc::clone(&self.pipeline);
            let progress = self.progress.clone();
            let done = Arc::clone(&done);
            let job_id = job_id.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let analysis = pipeline.process(&document).await;
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(progress) = progress {
                    progress(&BatchProgress {
                        job_id,
                        doc_key: analysis.doc_key.clone(),
                        filename: analysis.filename.clone(),
                        failed: analysis.is_failed(),
                        done: finished,
                        total,
                    });
                }
                analysis
            });
        }

        let mut analyses = Vec::with_capacity(started);
        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(analysis) => {
                    if analysis.is_failed() {
                        failed += 1;
                    }
                    analyses.push(analysis);
                }
                Err(e) => {
                    error!("Batch {} task aborted: {}", job_id, e);
                    failed += 1;
                }
            }
        }

        let report = BatchReport {
            completed: analyses.len() - analyses.iter().filter(|a| a.is_failed()).count(),
            failed,
            cancelled: total - started,
            total,
            job_id,
            analyses,
        };
        info!(
            "Batch {} finished: {} completed, {} failed, {} cancelled",
            report.job_id, report.completed, report.failed, report.cancelled
        );
        report
    }
}
