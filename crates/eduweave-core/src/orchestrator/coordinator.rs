//! Parallel fetch coordination
//!
//! One question needs data from three subsystems with very different
//! latency profiles: the prerequisite graph, the content index, and the
//! resource store. The coordinator fans out to all three under a single
//! shared deadline and joins results as they arrive, so total fetch time is
//! the slowest source, never the sum. Sources that fail degrade to empty
//! results with the error recorded; sources still running at the deadline
//! are abandoned and their late output discarded.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::sources::{ContextRetriever, PathResolver, ResourceDiscovery};
use crate::domain::concept::LearningPath;
use crate::domain::resource::EducationalResource;
use crate::error::Error;

/// The three subsystems the coordinator fans out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    Path,
    Context,
    Resources,
}

impl FetchSource {
    pub const ALL: [FetchSource; 3] = [Self::Path, Self::Context, Self::Resources];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Context => "context",
            Self::Resources => "resources",
        }
    }
}

impl std::fmt::Display for FetchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal state of one fan-out task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Finished and contributed data
    Completed,
    /// Finished with an error; contributed an empty result
    Degraded,
    /// Still running when the shared deadline elapsed
    Abandoned,
}

/// Timing and outcome record for one fan-out task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub source: FetchSource,
    pub state: TaskState,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything the fan-out produced for one question.
///
/// Partial data and recorded errors travel together: a degraded source
/// leaves its slot empty and its error in `errors`, and never flips an
/// otherwise-usable bundle into a failure.
#[derive(Debug, Default)]
pub struct FetchBundle {
    pub path: LearningPath,
    pub context: Vec<String>,
    pub resources: Vec<EducationalResource>,
    pub errors: Vec<Error>,
    pub reports: Vec<TaskReport>,
}

impl FetchBundle {
    /// Report for one source, if it was part of this fan-out
    pub fn report_for(&self, source: FetchSource) -> Option<&TaskReport> {
        self.reports.iter().find(|r| r.source == source)
    }

    /// Whether every source ended degraded or abandoned
    pub fn is_fully_degraded(&self) -> bool {
        !self.reports.is_empty()
            && self.reports.iter().all(|r| r.state != TaskState::Completed)
    }
}

/// Payload carried back from one fan-out task
enum TaskPayload {
    Path(LearningPath),
    Context(Vec<String>),
    Resources(Vec<EducationalResource>),
}

type TaskMessage = (FetchSource, Duration, Result<TaskPayload, Error>);

/// Fans out to the three sources under one shared deadline.
///
/// The deadline is the sole cancellation signal: when it elapses the
/// coordinator aborts whatever is still running and returns with what it
/// has.
pub struct FetchCoordinator {
    path_resolver: Arc<dyn PathResolver>,
    context_retriever: Arc<dyn ContextRetriever>,
    resource_discovery: Arc<dyn ResourceDiscovery>,
    deadline: Duration,
    context_limit: usize,
    resource_limit: usize,
}

impl FetchCoordinator {
    pub fn new(
        path_resolver: Arc<dyn PathResolver>,
        context_retriever: Arc<dyn ContextRetriever>,
        resource_discovery: Arc<dyn ResourceDiscovery>,
        deadline: Duration,
    ) -> Self {
        Self {
            path_resolver,
            context_retriever,
            resource_discovery,
            deadline,
            context_limit: 5,
            resource_limit: 10,
        }
    }

    /// Override the per-source result limits
    pub fn with_limits(mut self, context_limit: usize, resource_limit: usize) -> Self {
        self.context_limit = context_limit;
        self.resource_limit = resource_limit;
        self
    }

    /// Run the fan-out for one question.
    ///
    /// Always returns a bundle; failures surface inside it, not as an Err.
    pub async fn fetch(&self, question: &str, concept_names: &[String]) -> FetchBundle {
        let started = Instant::now();
        let deadline = started + self.deadline;
        let (tx, mut rx) = mpsc::channel::<TaskMessage>(FetchSource::ALL.len());

        let handles = vec![
            self.spawn_path_task(concept_names.to_vec(), tx.clone()),
            self.spawn_context_task(question.to_string(), tx.clone()),
            self.spawn_resource_task(concept_names.to_vec(), tx.clone()),
        ];
        drop(tx);

        let mut bundle = FetchBundle::default();
        let mut pending: Vec<FetchSource> = FetchSource::ALL.to_vec();

        while !pending.is_empty() {
            tokio::select! {
                message = rx.recv() => {
                    // Channel can only close once every sender is done, so
                    // None cannot happen while tasks are still pending
                    let Some((source, duration, result)) = message else {
                        break;
                    };
                    pending.retain(|s| *s != source);
                    self.apply(&mut bundle, source, duration, result);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    for handle in &handles {
                        handle.abort();
                    }
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    for source in pending.drain(..) {
                        warn!(source = %source, elapsed_ms, "Fetch task abandoned at deadline");
                        bundle.reports.push(TaskReport {
                            source,
                            state: TaskState::Abandoned,
                            duration_ms: elapsed_ms,
                            error: Some(format!("abandoned after {elapsed_ms}ms")),
                        });
                        bundle.errors.push(Error::UpstreamTimeout {
                            source: source.as_str(),
                            elapsed_ms,
                        });
                    }
                }
            }
        }

        info!(
            path_nodes = bundle.path.len(),
            context_chunks = bundle.context.len(),
            resources = bundle.resources.len(),
            errors = bundle.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Parallel fetch completed"
        );

        bundle
    }

    /// Fold one task result into the bundle
    fn apply(
        &self,
        bundle: &mut FetchBundle,
        source: FetchSource,
        duration: Duration,
        result: Result<TaskPayload, Error>,
    ) {
        let duration_ms = duration.as_millis() as u64;
        match result {
            Ok(payload) => {
                match payload {
                    TaskPayload::Path(path) => bundle.path = path,
                    TaskPayload::Context(chunks) => bundle.context = chunks,
                    TaskPayload::Resources(resources) => bundle.resources = resources,
                }
                debug!(source = %source, duration_ms, "Fetch task completed");
                bundle.reports.push(TaskReport {
                    source,
                    state: TaskState::Completed,
                    duration_ms,
                    error: None,
                });
            }
            Err(e) => {
                warn!(source = %source, duration_ms, error = %e, "Fetch task degraded");
                bundle.reports.push(TaskReport {
                    source,
                    state: TaskState::Degraded,
                    duration_ms,
                    error: Some(e.to_string()),
                });
                bundle.errors.push(e);
            }
        }
    }

    fn spawn_path_task(
        &self,
        concept_names: Vec<String>,
        tx: mpsc::Sender<TaskMessage>,
    ) -> JoinHandle<()> {
        let resolver = Arc::clone(&self.path_resolver);
        tokio::spawn(async move {
            let started = Instant::now();
            let result = resolver
                .resolve_path(&concept_names)
                .await
                .map(TaskPayload::Path);
            // Send fails only when the coordinator already gave up on us
            let _ = tx.send((FetchSource::Path, started.elapsed(), result)).await;
        })
    }

    fn spawn_context_task(
        &self,
        question: String,
        tx: mpsc::Sender<TaskMessage>,
    ) -> JoinHandle<()> {
        let retriever = Arc::clone(&self.context_retriever);
        let limit = self.context_limit;
        tokio::spawn(async move {
            let started = Instant::now();
            let result = retriever
                .retrieve(&question, limit)
                .await
                .map(TaskPayload::Context);
            let _ = tx
                .send((FetchSource::Context, started.elapsed(), result))
                .await;
        })
    }

    fn spawn_resource_task(
        &self,
        concept_names: Vec<String>,
        tx: mpsc::Sender<TaskMessage>,
    ) -> JoinHandle<()> {
        let discovery = Arc::clone(&self.resource_discovery);
        let limit = self.resource_limit;
        tokio::spawn(async move {
            let started = Instant::now();
            let result = discovery
                .find(&concept_names, limit)
                .await
                .map(TaskPayload::Resources);
            let _ = tx
                .send((FetchSource::Resources, started.elapsed(), result))
                .await;
        })
    }
}
