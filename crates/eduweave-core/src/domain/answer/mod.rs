//! Answer cache domain module
//!
//! Cached answers keyed by a fingerprint of the normalized question
//! text. A cache hit short-circuits the whole query pipeline.

mod fingerprint;
mod record;
mod repository;

pub use fingerprint::{normalize_question, question_fingerprint};
pub use record::AnswerRecord;
pub use repository::AnswerCacheRepository;
