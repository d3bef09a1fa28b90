//! Background training and testing of alignment models.
//!
//! The corpus tree only produces batches and consumes results. A worker owns
//! one trainer, accepts one request at a time over a bounded queue and
//! answers each request on its own oneshot channel. Dropping the receiver
//! discards the result.

use crate::models::{AlignmentBatch, AlignmentSample, ScoredVerse, SourceTargetAlignment, TestResults, TestScore};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

const QUEUE_CAPACITY: usize = 1;

/// A word alignment model the worker can train and query.
/// Models travel as serialized values.
pub trait AlignmentTrainer: Send + Sync + 'static {
    fn train(&self, batch: &AlignmentBatch, prior_model: Option<&Value>) -> anyhow::Result<Value>;

    fn predict(&self, model: &Value, sample: &AlignmentSample) -> anyhow::Result<Vec<SourceTargetAlignment>>;
}

#[derive(Debug, Clone)]
pub enum WorkerRequest {
    Train {
        batch: AlignmentBatch,
        prior_model: Option<Value>,
    },
    Test {
        batch: AlignmentBatch,
        model: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    Trained { model: Value },
    Tested(TestResults),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("alignment worker is no longer running")]
    Closed,
    #[error("training failed: {0}")]
    Training(String),
    #[error("testing failed: {0}")]
    Testing(String),
    #[error("worker task panicked: {0}")]
    Panicked(String),
}

pub type WorkerReply = oneshot::Receiver<Result<WorkerResponse, WorkerError>>;

struct Job {
    request: WorkerRequest,
    reply: oneshot::Sender<Result<WorkerResponse, WorkerError>>,
}

/// Handle to a running worker task
#[derive(Clone)]
pub struct AlignmentWorker {
    sender: mpsc::Sender<Job>,
}

impl AlignmentWorker {
    /// Starts the worker loop on the current tokio runtime
    pub fn spawn<T: AlignmentTrainer>(trainer: T) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Job>(QUEUE_CAPACITY);
        let trainer = Arc::new(trainer);

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let trainer = Arc::clone(&trainer);
                let request = job.request;
                let result = tokio::task::spawn_blocking(move || run_request(trainer.as_ref(), request))
                    .await
                    .unwrap_or_else(|e| Err(WorkerError::Panicked(e.to_string())));
                // the caller may have given up on this result
                let _ = job.reply.send(result);
            }
        });

        AlignmentWorker { sender }
    }

    /// Queues a request, waiting while another one is queued
    pub async fn submit(&self, request: WorkerRequest) -> Result<WorkerReply, WorkerError> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(Job { request, reply })
            .await
            .map_err(|_| WorkerError::Closed)?;
        Ok(receiver)
    }

    /// Submits a request and waits for its answer
    pub async fn run(&self, request: WorkerRequest) -> Result<WorkerResponse, WorkerError> {
        self.submit(request)
            .await?
            .await
            .map_err(|_| WorkerError::Closed)?
    }
}

fn run_request(trainer: &dyn AlignmentTrainer, request: WorkerRequest) -> Result<WorkerResponse, WorkerError> {
    match request {
        WorkerRequest::Train { batch, prior_model } => trainer
            .train(&batch, prior_model.as_ref())
            .map(|model| WorkerResponse::Trained { model })
            .map_err(|e| WorkerError::Training(e.to_string())),
        WorkerRequest::Test { batch, model } => {
            let mut scored = Vec::with_capacity(batch.len());
            for sample in &batch.samples {
                let suggested = trainer
                    .predict(&model, sample)
                    .map_err(|e| WorkerError::Testing(format!("{}: {}", sample.selector, e)))?;
                scored.push(ScoredVerse {
                    selector: sample.selector.clone(),
                    score: score_alignments(&sample.alignments, &suggested),
                });
            }
            Ok(WorkerResponse::Tested(TestResults::from_scores(scored)))
        }
    }
}

/// Grades suggested alignments against the manual ones. A verse with no
/// manual alignments scores zero.
pub fn score_alignments(manual: &[SourceTargetAlignment], suggested: &[SourceTargetAlignment]) -> TestScore {
    let num_correct_mappings = suggested.iter().filter(|s| manual.contains(s)).count();
    let ratio_correct = if manual.is_empty() {
        0.0
    } else {
        num_correct_mappings as f64 / manual.len() as f64
    };

    TestScore {
        num_manual_mappings: manual.len(),
        num_suggested_mappings: suggested.len(),
        num_correct_mappings,
        ratio_correct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Selector;
    use serde_json::json;

    fn pair(source: &str, target: &str) -> SourceTargetAlignment {
        SourceTargetAlignment {
            source_ngram: vec![source.to_string()],
            target_ngram: vec![target.to_string()],
        }
    }

    fn sample(verse: u32, alignments: Vec<SourceTargetAlignment>) -> AlignmentSample {
        AlignmentSample {
            selector: Selector::verse("Draft", "Genesis", 1, verse),
            source_verse: "λόγος θεός".to_string(),
            target_verse: "word god".to_string(),
            alignments,
        }
    }

    /// Remembers every pair it was trained on and suggests those it knows
    struct LookupTrainer;

    impl AlignmentTrainer for LookupTrainer {
        fn train(&self, batch: &AlignmentBatch, prior_model: Option<&Value>) -> anyhow::Result<Value> {
            let mut pairs: Vec<Value> = prior_model
                .and_then(|m| m["pairs"].as_array().cloned())
                .unwrap_or_default();
            for sample in &batch.samples {
                for alignment in &sample.alignments {
                    pairs.push(serde_json::to_value(alignment)?);
                }
            }
            Ok(json!({ "pairs": pairs }))
        }

        fn predict(&self, model: &Value, _sample: &AlignmentSample) -> anyhow::Result<Vec<SourceTargetAlignment>> {
            let pairs = model["pairs"]
                .as_array()
                .ok_or_else(|| anyhow::anyhow!("model has no pairs"))?;
            pairs
                .iter()
                .map(|p| serde_json::from_value(p.clone()).map_err(anyhow::Error::from))
                .collect()
        }
    }

    #[test]
    fn test_score_alignments() {
        let manual = vec![pair("λόγος", "word"), pair("θεός", "god")];
        let score = score_alignments(&manual, &[pair("λόγος", "word"), pair("θεός", "word")]);

        assert_eq!(score.num_manual_mappings, 2);
        assert_eq!(score.num_suggested_mappings, 2);
        assert_eq!(score.num_correct_mappings, 1);
        assert!((score.ratio_correct - 0.5).abs() < f64::EPSILON);
        assert_eq!(score_alignments(&[], &manual).ratio_correct, 0.0);
    }

    #[tokio::test]
    async fn test_train_then_test() {
        let worker = AlignmentWorker::spawn(LookupTrainer);
        let batch = AlignmentBatch {
            samples: vec![sample(1, vec![pair("λόγος", "word")])],
        };

        let model = match worker
            .run(WorkerRequest::Train {
                batch: batch.clone(),
                prior_model: None,
            })
            .await
            .unwrap()
        {
            WorkerResponse::Trained { model } => model,
            other => panic!("unexpected response: {:?}", other),
        };

        let test_batch = AlignmentBatch {
            samples: vec![
                sample(1, vec![pair("λόγος", "word")]),
                sample(2, vec![pair("θεός", "god")]),
            ],
        };
        let results = match worker.run(WorkerRequest::Test { batch: test_batch, model }).await.unwrap() {
            WorkerResponse::Tested(results) => results,
            other => panic!("unexpected response: {:?}", other),
        };

        assert_eq!(results.test_results.len(), 2);
        assert_eq!(results.test_results[0].score.num_correct_mappings, 1);
        assert_eq!(results.test_results[1].score.num_correct_mappings, 0);
        assert!((results.average_ratio_correct - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_prediction_errors_are_reported() {
        let worker = AlignmentWorker::spawn(LookupTrainer);
        let result = worker
            .run(WorkerRequest::Test {
                batch: AlignmentBatch {
                    samples: vec![sample(1, vec![])],
                },
                model: json!({}),
            })
            .await;

        match result {
            Err(WorkerError::Testing(message)) => assert!(message.contains("model has no pairs")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropped_reply_does_not_stop_worker() {
        let worker = AlignmentWorker::spawn(LookupTrainer);
        let discarded = worker
            .submit(WorkerRequest::Train {
                batch: AlignmentBatch::default(),
                prior_model: None,
            })
            .await
            .unwrap();
        drop(discarded);

        let response = worker
            .run(WorkerRequest::Train {
                batch: AlignmentBatch::default(),
                prior_model: None,
            })
            .await
            .unwrap();
        assert_eq!(response, WorkerResponse::Trained { model: json!({"pairs": []}) });
    }
}
