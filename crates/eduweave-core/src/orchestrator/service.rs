//! Query orchestration
//!
//! The orchestrator owns the answer pipeline: fingerprint the question,
//! serve a fresh cached answer if one exists, otherwise extract concepts,
//! fan out for prerequisites, context, and resources under a shared
//! deadline, synthesize the explanation, persist the result, and kick off
//! the detached concept-growth check. Extraction and synthesis failures
//! are fatal; everything between them degrades.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::coordinator::{FetchCoordinator, TaskState};
use super::extract::ConceptExtractor;
use super::notifier::ConceptGrowthNotifier;
use super::sources::ResourceDiscovery;
use super::stream::{AnswerSource, QueryStreamEvent};
use super::synthesize::{SynthesisEvent, Synthesizer};
use crate::domain::answer::{question_fingerprint, AnswerCacheRepository, AnswerRecord};
use crate::domain::concept::{
    lookup_concept_detail, ConceptDetail, ConceptGraphRepository, LearningPath,
};
use crate::domain::resource::EducationalResource;
use crate::error::{Error, Result};

/// Most concepts a background resource refresh will search for
const REFRESH_CONCEPT_CAP: usize = 3;

/// Explanation served when no learnable concepts are identified
const NO_CONCEPTS_EXPLANATION: &str = "No learnable concepts were identified in this question. \
     Try asking about a specific topic, for example \"What is a derivative?\".";

/// Complete answer to one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The question as asked
    pub question: String,
    /// Fingerprint the answer is cached under
    pub fingerprint: String,
    /// Concept names the question touches
    pub concepts: Vec<String>,
    /// Ordered learning path, prerequisites first
    pub learning_path: LearningPath,
    /// Context snippets that grounded the explanation
    pub context_snippets: Vec<String>,
    /// The synthesized explanation
    pub explanation: String,
    /// Recommended resources
    pub resources: Vec<EducationalResource>,
    /// Whether this came from the cache or a fresh pipeline run
    pub source: AnswerSource,
    /// Age of the cached answer, when served from cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_age_secs: Option<i64>,
    /// Wall time spent serving this response
    pub processing_ms: u64,
    /// Fan-out sources that did not complete, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_sources: Vec<String>,
}

impl QueryResponse {
    fn from_record(
        record: AnswerRecord,
        source: AnswerSource,
        cache_age_secs: Option<i64>,
        processing_ms: u64,
        degraded_sources: Vec<String>,
    ) -> Self {
        Self {
            question: record.question,
            fingerprint: record.fingerprint,
            concepts: record.identified_concepts,
            learning_path: record.learning_path,
            context_snippets: record.context_snippets,
            explanation: record.explanation,
            resources: record.resources,
            source,
            cache_age_secs,
            processing_ms,
            degraded_sources,
        }
    }
}

/// Cache-first answer pipeline over pluggable collaborators.
///
/// Collaborators are trait objects so the pipeline can run against the
/// production LLM-backed implementations or in-process stubs
/// interchangeably.
pub struct QueryOrchestrator {
    cache: Arc<dyn AnswerCacheRepository>,
    extractor: Arc<dyn ConceptExtractor>,
    coordinator: FetchCoordinator,
    synthesizer: Arc<dyn Synthesizer>,
    graph: Arc<dyn ConceptGraphRepository>,
    notifier: Option<Arc<ConceptGrowthNotifier>>,
    refresh_discovery: Option<Arc<dyn ResourceDiscovery>>,
    cache_ttl: chrono::Duration,
    resource_limit: usize,
    refresh_deadline: Duration,
}

impl QueryOrchestrator {
    pub fn new(
        cache: Arc<dyn AnswerCacheRepository>,
        extractor: Arc<dyn ConceptExtractor>,
        coordinator: FetchCoordinator,
        synthesizer: Arc<dyn Synthesizer>,
        graph: Arc<dyn ConceptGraphRepository>,
    ) -> Self {
        Self {
            cache,
            extractor,
            coordinator,
            synthesizer,
            graph,
            notifier: None,
            refresh_discovery: None,
            cache_ttl: chrono::Duration::days(30),
            resource_limit: 10,
            refresh_deadline: Duration::from_secs(10),
        }
    }

    /// Age past which a cached answer reads as a miss
    pub fn with_cache_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Enable the detached concept-growth check after processed answers
    pub fn with_notifier(mut self, notifier: Arc<ConceptGrowthNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Enable background resource refresh on cached concept answers
    pub fn with_resource_refresh(
        mut self,
        discovery: Arc<dyn ResourceDiscovery>,
        limit: usize,
    ) -> Self {
        self.refresh_discovery = Some(discovery);
        self.resource_limit = limit;
        self
    }

    /// Deadline for one background resource refresh
    pub fn with_refresh_deadline(mut self, deadline: Duration) -> Self {
        self.refresh_deadline = deadline;
        self
    }

    /// Answer a free-form question, cache first.
    ///
    /// Extraction or synthesis failure fails the query; fan-out failures
    /// degrade into an answer with empty slots and `degraded_sources` set.
    pub async fn process_query(&self, question: &str) -> Result<QueryResponse> {
        let started = Instant::now();
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }
        let fingerprint = question_fingerprint(question);

        if let Some(response) = self.cached_answer(&fingerprint, started).await {
            return Ok(response);
        }
        self.run_pipeline(question, &fingerprint, started).await
    }

    /// Answer a direct concept lookup, cache first.
    ///
    /// Keyed by the concept name's own fingerprint, so however the query
    /// was phrased later lookups of the same name hit the same slot. A
    /// fresh hit additionally kicks off a detached resource refresh.
    pub async fn concept_query(&self, name: &str) -> Result<QueryResponse> {
        let started = Instant::now();
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "concept name must not be empty".to_string(),
            ));
        }

        // Fingerprint normalization already collapses case and spacing,
        // so one probe covers every spelling variant of the name
        let fingerprint = question_fingerprint(name);

        if let Some(response) = self.cached_answer(&fingerprint, started).await {
            let mut targets = response.concepts.clone();
            if targets.is_empty() {
                targets.push(name.to_lowercase());
            }
            self.spawn_resource_refresh(fingerprint, targets);
            return Ok(response);
        }

        let question = format!("What is {name}? Explain the concept and what it builds on.");
        self.run_pipeline(&question, &fingerprint, started).await
    }

    /// Look up one concept with its immediate neighborhood.
    ///
    /// Accepts an id, a name in any casing, or a distinctive fragment of
    /// the name.
    pub async fn concept_detail(&self, key: &str) -> Result<ConceptDetail> {
        lookup_concept_detail(self.graph.as_ref(), key).await
    }

    /// Answer a question as an ordered event stream.
    ///
    /// Emits start, progress, concepts, prerequisites, context, resources,
    /// explanation chunks, then complete; an error event terminates the
    /// stream at whatever point processing failed. Cached answers replay
    /// the same sequence from the stored record.
    pub fn process_query_stream(
        self: &Arc<Self>,
        question: &str,
    ) -> BoxStream<'static, QueryStreamEvent> {
        let this = Arc::clone(self);
        let question = question.trim().to_string();

        Box::pin(async_stream::stream! {
            let started = Instant::now();
            if question.is_empty() {
                yield QueryStreamEvent::failure(&Error::InvalidInput(
                    "question must not be empty".to_string(),
                ));
                return;
            }
            let fingerprint = question_fingerprint(&question);
            yield QueryStreamEvent::Start {
                question: question.clone(),
                fingerprint: fingerprint.clone(),
            };

            if let Some((record, age_secs)) = this.fresh_record(&fingerprint).await {
                yield QueryStreamEvent::progress(
                    "cache",
                    format!("Serving cached answer ({age_secs}s old)"),
                );
                yield QueryStreamEvent::concepts(record.identified_concepts);
                yield QueryStreamEvent::prerequisites(record.learning_path);
                yield QueryStreamEvent::context(record.context_snippets);
                yield QueryStreamEvent::resources(record.resources);
                let total = record.explanation.len();
                yield QueryStreamEvent::ExplanationChunk {
                    chunk: record.explanation,
                    total_chars: total,
                };
                yield QueryStreamEvent::ExplanationComplete { total_length: total };
                yield QueryStreamEvent::Complete {
                    fingerprint,
                    source: AnswerSource::Cache,
                    processing_ms: elapsed_ms(started),
                };
                return;
            }

            yield QueryStreamEvent::progress("extraction", "Identifying concepts");
            let concepts = match this.extractor.extract(&question).await {
                Ok(concepts) => concepts,
                Err(e) => {
                    yield QueryStreamEvent::failure(&e);
                    return;
                }
            };
            yield QueryStreamEvent::concepts(concepts.clone());

            if concepts.is_empty() {
                let record = this.fallback_record(&question, &fingerprint);
                yield QueryStreamEvent::prerequisites(LearningPath::new());
                yield QueryStreamEvent::context(Vec::new());
                yield QueryStreamEvent::resources(Vec::new());
                let total = record.explanation.len();
                yield QueryStreamEvent::ExplanationChunk {
                    chunk: record.explanation.clone(),
                    total_chars: total,
                };
                yield QueryStreamEvent::ExplanationComplete { total_length: total };
                this.persist(&record).await;
                yield QueryStreamEvent::Complete {
                    fingerprint,
                    source: AnswerSource::Processed,
                    processing_ms: elapsed_ms(started),
                };
                return;
            }

            yield QueryStreamEvent::progress(
                "fetch",
                "Gathering prerequisites, context, and resources",
            );
            let bundle = this.coordinator.fetch(&question, &concepts).await;
            yield QueryStreamEvent::prerequisites(bundle.path.clone());
            yield QueryStreamEvent::context(bundle.context.clone());
            yield QueryStreamEvent::resources(bundle.resources.clone());

            yield QueryStreamEvent::progress("synthesis", "Writing the explanation");
            let mut chunks = match this
                .synthesizer
                .synthesize_stream(&question, &bundle.path, &bundle.context)
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    yield QueryStreamEvent::failure(&e);
                    return;
                }
            };

            let mut explanation = String::new();
            let mut failure: Option<String> = None;
            while let Some(event) = chunks.next().await {
                match event {
                    SynthesisEvent::Chunk(chunk) => {
                        explanation.push_str(&chunk);
                        yield QueryStreamEvent::ExplanationChunk {
                            chunk,
                            total_chars: explanation.len(),
                        };
                    }
                    SynthesisEvent::Completed => break,
                    SynthesisEvent::Failed(reason) => {
                        failure = Some(reason);
                        break;
                    }
                }
            }
            if let Some(reason) = failure {
                yield QueryStreamEvent::failure(&Error::LlmError(reason));
                return;
            }
            yield QueryStreamEvent::ExplanationComplete {
                total_length: explanation.len(),
            };

            let mut record = AnswerRecord::new(question.clone());
            record.fingerprint = fingerprint.clone();
            record.identified_concepts = concepts.clone();
            record.learning_path = bundle.path;
            record.context_snippets = bundle.context;
            record.explanation = explanation;
            record.resources = bundle.resources;
            this.persist(&record).await;
            this.spawn_growth_check(concepts, question, fingerprint.clone());

            yield QueryStreamEvent::Complete {
                fingerprint,
                source: AnswerSource::Processed,
                processing_ms: elapsed_ms(started),
            };
        })
    }

    /// Run the full pipeline for a cache miss
    async fn run_pipeline(
        &self,
        question: &str,
        fingerprint: &str,
        started: Instant,
    ) -> Result<QueryResponse> {
        let concepts = self.extractor.extract(question).await?;

        if concepts.is_empty() {
            info!(fingerprint, "No concepts identified, skipping fan-out");
            let record = self.fallback_record(question, fingerprint);
            self.persist(&record).await;
            return Ok(QueryResponse::from_record(
                record,
                AnswerSource::Processed,
                None,
                elapsed_ms(started),
                Vec::new(),
            ));
        }

        let bundle = self.coordinator.fetch(question, &concepts).await;
        let degraded: Vec<String> = bundle
            .reports
            .iter()
            .filter(|r| r.state != TaskState::Completed)
            .map(|r| r.source.to_string())
            .collect();

        let explanation = self
            .synthesizer
            .synthesize(question, &bundle.path, &bundle.context)
            .await?;

        let mut record = AnswerRecord::new(question);
        record.fingerprint = fingerprint.to_string();
        record.identified_concepts = concepts.clone();
        record.learning_path = bundle.path;
        record.context_snippets = bundle.context;
        record.explanation = explanation;
        record.resources = bundle.resources;

        self.persist(&record).await;
        self.spawn_growth_check(concepts, question.to_string(), fingerprint.to_string());

        info!(
            fingerprint,
            concepts = record.identified_concepts.len(),
            path_nodes = record.learning_path.len(),
            degraded = degraded.len(),
            elapsed_ms = elapsed_ms(started),
            "Processed query"
        );

        Ok(QueryResponse::from_record(
            record,
            AnswerSource::Processed,
            None,
            elapsed_ms(started),
            degraded,
        ))
    }

    /// Load a fresh cached record, treating stale and unavailable as a miss
    async fn fresh_record(&self, fingerprint: &str) -> Option<(AnswerRecord, i64)> {
        let record = match self.cache.get(fingerprint).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Answer cache unavailable, treating as miss");
                return None;
            }
        };

        let now = Utc::now();
        if !record.is_fresh(now, self.cache_ttl) {
            debug!(
                fingerprint,
                age_days = record.age(now).num_days(),
                "Cached answer is stale"
            );
            return None;
        }
        let age_secs = record.age(now).num_seconds();
        Some((record, age_secs))
    }

    async fn cached_answer(&self, fingerprint: &str, started: Instant) -> Option<QueryResponse> {
        let (record, age_secs) = self.fresh_record(fingerprint).await?;
        info!(fingerprint, age_secs, "Serving cached answer");
        Some(QueryResponse::from_record(
            record,
            AnswerSource::Cache,
            Some(age_secs),
            elapsed_ms(started),
            Vec::new(),
        ))
    }

    fn fallback_record(&self, question: &str, fingerprint: &str) -> AnswerRecord {
        let mut record = AnswerRecord::new(question);
        record.fingerprint = fingerprint.to_string();
        record.explanation = NO_CONCEPTS_EXPLANATION.to_string();
        record
    }

    async fn persist(&self, record: &AnswerRecord) {
        if let Err(e) = self.cache.put(record).await {
            warn!(fingerprint = %record.fingerprint, error = %e, "Failed to persist answer");
        }
    }

    /// Hand the identified concepts to the growth notifier, detached
    fn spawn_growth_check(&self, concepts: Vec<String>, question: String, fingerprint: String) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        tokio::spawn(async move {
            notifier.process(&concepts, &question, &fingerprint).await;
        });
    }

    /// Refresh the resources of a cached answer, detached and bounded
    fn spawn_resource_refresh(&self, fingerprint: String, concepts: Vec<String>) {
        let Some(discovery) = self.refresh_discovery.clone() else {
            return;
        };
        let cache = Arc::clone(&self.cache);
        let limit = self.resource_limit;
        let deadline = self.refresh_deadline;

        tokio::spawn(async move {
            let mut seen = HashSet::new();
            let targets: Vec<String> = concepts
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty() && seen.insert(c.clone()))
                .take(REFRESH_CONCEPT_CAP)
                .collect();
            if targets.is_empty() {
                return;
            }

            let found = match tokio::time::timeout(deadline, discovery.find(&targets, limit)).await
            {
                Ok(Ok(found)) => found,
                Ok(Err(e)) => {
                    warn!(error = %e, "Background resource refresh failed");
                    return;
                }
                Err(_) => {
                    warn!(
                        deadline_ms = deadline.as_millis() as u64,
                        "Background resource refresh timed out"
                    );
                    return;
                }
            };
            if found.is_empty() {
                return;
            }

            match cache.get(&fingerprint).await {
                Ok(Some(mut record)) => {
                    let count = found.len();
                    record.resources = found;
                    if let Err(e) = cache.put(&record).await {
                        warn!(error = %e, "Could not store refreshed resources");
                    } else {
                        debug!(fingerprint = %fingerprint, resources = count, "Refreshed cached resources");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Could not reload record for resource refresh"),
            }
        });
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
