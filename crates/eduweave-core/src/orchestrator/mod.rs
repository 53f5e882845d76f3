//! Query pipeline
//!
//! Everything between an incoming question and its answer:
//!
//! - [`QueryOrchestrator`]: the cache-first pipeline itself
//! - concept extraction and answer synthesis over the LLM client
//! - the deadline-bounded fan-out to graph, content, and resource sources
//! - the query event stream for progressive delivery
//! - the detached concept-growth notifier feeding the staging area

mod coordinator;
mod extract;
mod notifier;
mod service;
mod sources;
mod stream;
mod synthesize;

pub use coordinator::{FetchBundle, FetchCoordinator, FetchSource, TaskReport, TaskState};
pub use extract::{ConceptExtractor, LlmConceptExtractor};
pub use notifier::{
    ConceptAnalyzer, ConceptGrowthNotifier, LlmConceptAnalyzer, StagingNotification,
    StagingOutcome,
};
pub use service::{QueryOrchestrator, QueryResponse};
pub use sources::{
    ContextRetriever, DiscoveryTrigger, GraphPathResolver, KnownResourceFinder,
    LoggingDiscoveryTrigger, PathResolver, ResourceDiscovery, SemanticContextRetriever,
};
pub use stream::{AnswerSource, QueryStreamEvent, QueryStreamEventKind};
pub use synthesize::{LlmSynthesizer, SynthesisEvent, Synthesizer};
