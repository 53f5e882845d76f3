//! Background concept-growth notification
//!
//! After an answer goes out, the notifier examines the identified
//! concepts for names the curated graph does not know. Unknown names are
//! analyzed and staged for human review; curators are then pinged over a
//! webhook. The whole pass runs detached from the request that triggered
//! it: staging always lands independent of notification, and notification
//! failures are logged and dropped, never retried into staged state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::NotifierConfig;
use crate::domain::concept::ConceptGraphRepository;
use crate::domain::staging::{ConceptAnalysis, StagedConcept, StagedConceptRepository};
use crate::error::{Error, Result};
use crate::llm::{analysis_messages, parse_concept_analysis, LlmClient};

/// Base delay between webhook delivery attempts
const NOTIFY_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Judges whether a candidate name is a genuine, learnable concept
#[async_trait]
pub trait ConceptAnalyzer: Send + Sync {
    async fn analyze(&self, concept_name: &str, source_question: &str) -> Result<ConceptAnalysis>;
}

/// Production analyzer backed by the chat completion client.
///
/// Runs a single cold-temperature completion and parses the JSON verdict
/// out of the reply.
pub struct LlmConceptAnalyzer {
    client: Arc<LlmClient>,
    temperature: f32,
}

impl LlmConceptAnalyzer {
    pub fn new(client: Arc<LlmClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }
}

#[async_trait]
impl ConceptAnalyzer for LlmConceptAnalyzer {
    async fn analyze(&self, concept_name: &str, source_question: &str) -> Result<ConceptAnalysis> {
        let messages = analysis_messages(concept_name, source_question);
        let response = self.client.complete(messages, self.temperature).await?;
        parse_concept_analysis(&response.content)
    }
}

/// Summary of one concept-growth pass
#[derive(Debug, Clone, Default)]
pub struct StagingOutcome {
    /// Names staged for the first time by this pass
    pub newly_staged: Vec<String>,
    /// Names already staged; their occurrence counts were bumped
    pub repeat_sightings: u64,
    /// Names the curated graph already knows
    pub already_known: u64,
    /// Names the analyzer judged not to be learnable concepts
    pub not_learnable: u64,
}

impl StagingOutcome {
    /// Whether this pass staged anything new
    pub fn has_new(&self) -> bool {
        !self.newly_staged.is_empty()
    }
}

/// Webhook payload announcing newly staged concepts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingNotification {
    /// Event discriminator for webhook consumers
    pub event: String,
    /// Concept names staged by this pass
    pub concepts: Vec<String>,
    /// Fingerprint of the question that surfaced them
    pub question_fingerprint: String,
    /// When the pass finished
    pub staged_at: DateTime<Utc>,
}

impl StagingNotification {
    pub fn new(concepts: Vec<String>, question_fingerprint: impl Into<String>) -> Self {
        Self {
            event: "concepts_staged".to_string(),
            concepts,
            question_fingerprint: question_fingerprint.into(),
            staged_at: Utc::now(),
        }
    }
}

/// Detached staging of unknown concepts plus best-effort notification.
///
/// The graph is consulted first (known concepts are never staged), then
/// the staging area (repeat sightings bump occurrence counts instead of
/// duplicating), then the analyzer verdict gates what remains. Webhook
/// delivery runs under its own deadline with bounded retries; a
/// delivery failure never unwinds staged state.
pub struct ConceptGrowthNotifier {
    graph: Arc<dyn ConceptGraphRepository>,
    staging: Arc<dyn StagedConceptRepository>,
    analyzer: Option<Arc<dyn ConceptAnalyzer>>,
    config: NotifierConfig,
    http: reqwest::Client,
}

impl ConceptGrowthNotifier {
    pub fn new(
        graph: Arc<dyn ConceptGraphRepository>,
        staging: Arc<dyn StagedConceptRepository>,
        config: NotifierConfig,
    ) -> Self {
        Self {
            graph,
            staging,
            analyzer: None,
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Configure the analyzer that gates staging
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ConceptAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Configure the LLM client as the analyzer
    pub fn with_llm_client(self, client: Arc<LlmClient>, temperature: f32) -> Self {
        self.with_analyzer(Arc::new(LlmConceptAnalyzer::new(client, temperature)))
    }

    /// Run one concept-growth pass.
    ///
    /// Never fails: per-concept and delivery errors are logged and the
    /// pass continues, since nothing upstream is waiting on the result.
    pub async fn process(
        &self,
        concept_names: &[String],
        question: &str,
        fingerprint: &str,
    ) -> StagingOutcome {
        let mut outcome = StagingOutcome::default();

        let candidates = normalize_candidates(concept_names);
        if candidates.is_empty() {
            return outcome;
        }

        // One tolerant batch query decides graph membership; known
        // concepts are never staged
        let unknown = match self.graph.resolve_batch(&candidates).await {
            Ok(resolution) => {
                outcome.already_known = resolution.resolved.len() as u64;
                resolution.unmatched
            }
            Err(e) => {
                error!(error = %e, "Concept-growth pass could not query the graph");
                return outcome;
            }
        };

        for name in unknown {
            match self.stage_candidate(&name, question, fingerprint).await {
                Ok(StageAction::Staged) => outcome.newly_staged.push(name),
                Ok(StageAction::Repeat) => outcome.repeat_sightings += 1,
                Ok(StageAction::NotLearnable) => outcome.not_learnable += 1,
                Err(e) => {
                    error!(concept = %name, error = %e, "Failed to stage concept");
                }
            }
        }

        if outcome.has_new() {
            let notification =
                StagingNotification::new(outcome.newly_staged.clone(), fingerprint);
            self.notify(&notification).await;
        }

        outcome
    }

    /// Stage one unknown concept, or record the repeat sighting
    async fn stage_candidate(
        &self,
        name: &str,
        question: &str,
        fingerprint: &str,
    ) -> Result<StageAction> {
        if self.staging.increment_occurrence(name, fingerprint).await? {
            debug!(concept = %name, "Repeat sighting of staged concept");
            return Ok(StageAction::Repeat);
        }

        let mut staged = StagedConcept::new(name)
            .with_source_question(question)
            .with_fingerprint(fingerprint);

        if let Some(analyzer) = &self.analyzer {
            match analyzer.analyze(name, question).await {
                Ok(analysis) if !analysis.is_learnable => {
                    debug!(
                        concept = %name,
                        reasoning = %analysis.reasoning,
                        "Analyzer rejected candidate concept"
                    );
                    return Ok(StageAction::NotLearnable);
                }
                Ok(analysis) => {
                    staged = staged.with_analysis(&analysis);
                }
                Err(e) => {
                    // Stage without a proposal rather than lose the
                    // sighting; reviewers filter what the analyzer missed
                    warn!(concept = %name, error = %e, "Concept analysis failed, staging bare entry");
                }
            }
        }

        self.staging.save(&staged).await?;
        debug!(concept = %name, confidence = staged.confidence, "Staged concept for review");
        Ok(StageAction::Staged)
    }

    /// Deliver the webhook notification, best-effort.
    ///
    /// Bounded attempts with increasing backoff under one deadline; the
    /// final failure is logged and dropped.
    async fn notify(&self, notification: &StagingNotification) {
        let Some(url) = self.config.webhook_url.as_deref() else {
            debug!("No webhook configured, skipping staging notification");
            return;
        };

        let deadline = Instant::now() + self.config.deadline();

        for attempt in 1..=self.config.max_attempts {
            match tokio::time::timeout_at(deadline, self.post_notification(url, notification))
                .await
            {
                Ok(Ok(())) => {
                    debug!(attempt, concepts = notification.concepts.len(), "Staging notification delivered");
                    return;
                }
                Ok(Err(e)) => {
                    if attempt == self.config.max_attempts {
                        error!(error = %e, attempts = attempt, "Staging notification failed, giving up");
                        return;
                    }
                    let backoff = NOTIFY_BACKOFF_BASE * 2u32.pow(attempt - 1);
                    if Instant::now() + backoff >= deadline {
                        error!(error = %e, attempts = attempt, "Notification deadline exhausted");
                        return;
                    }
                    warn!(
                        error = %e,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Staging notification failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(_) => {
                    error!(attempts = attempt, "Staging notification abandoned at deadline");
                    return;
                }
            }
        }
    }

    async fn post_notification(&self, url: &str, notification: &StagingNotification) -> Result<()> {
        let response = self
            .http
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable {
                source: "staging_webhook",
                reason: format!("HTTP {status}"),
            });
        }
        Ok(())
    }
}

/// What happened to one candidate name
enum StageAction {
    Staged,
    Repeat,
    NotLearnable,
}

/// Trim, lowercase, and deduplicate candidate names
fn normalize_candidates(names: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}
