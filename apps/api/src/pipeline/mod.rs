//! Pipeline: wires normalizer → extractor → profile builder → scoring → ranking.
//!
//! A `Pipeline` is built once at startup from `PipelineSettings` and cloned
//! into every request. Vocabulary and scoring engine sit behind `Arc`s and are
//! never mutated, so clones are cheap and runs never interfere.
//!
//! The processing date (`as_of`) is an explicit argument of every analysis:
//! one batch resolves "present" to the same day for every document.

pub mod handlers;
pub mod settings;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::{extract_text, RawDocument};
use crate::errors::PipelineError;
use crate::extraction::extractor::EntityExtractor;
use crate::extraction::normalizer::normalize;
use crate::extraction::vocabulary::Vocabulary;
use crate::models::profile::CandidateProfile;
use crate::profile::builder::ProfileBuilder;
use crate::scoring::engine::{ScoreResult, ScoringEngine};
use crate::scoring::ranker::{rank, RankedList};

pub use settings::PipelineSettings;

/// Code used for a batch document whose worker task died.
pub const INTERNAL_FAILURE_CODE: &str = "INTERNAL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub profile: CandidateProfile,
    pub score: ScoreResult,
}

/// A batch document that produced no ranked entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document_id: String,
    pub file_name: Option<String>,
    /// Zero-based position in the submitted batch.
    pub position: usize,
    pub code: String,
    pub message: String,
}

impl DocumentFailure {
    pub fn from_error(document: &RawDocument, position: usize, error: &PipelineError) -> Self {
        Self {
            document_id: document.id.clone(),
            file_name: document.file_name.clone(),
            position,
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_documents: usize,
    pub ranked: RankedList,
    pub failures: Vec<DocumentFailure>,
}

impl BatchReport {
    /// Merges documents rejected before analysis (e.g. unsupported uploads).
    ///
    /// `accepted_positions[i]` is the submission position of the i-th analyzed
    /// document; failure positions are rewritten to submission positions.
    pub fn with_rejected(mut self, accepted_positions: &[usize], rejected: Vec<DocumentFailure>) -> Self {
        for failure in &mut self.failures {
            if let Some(&position) = accepted_positions.get(failure.position) {
                failure.position = position;
            }
        }
        self.total_documents += rejected.len();
        self.failures.extend(rejected);
        self.failures.sort_by_key(|f| f.position);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub skills: usize,
    pub aliases: usize,
    pub degree_terms: usize,
    pub target_skills: usize,
}

#[derive(Clone)]
pub struct Pipeline {
    vocabulary: Arc<Vocabulary>,
    engine: Arc<ScoringEngine>,
}

impl Pipeline {
    /// Validates settings and compiles them. Any `InvalidConfiguration` here is
    /// a startup failure.
    pub fn from_settings(settings: PipelineSettings) -> Result<Self, PipelineError> {
        let vocabulary = Vocabulary::from_settings(&settings.vocabulary)?;
        let engine = ScoringEngine::new(settings.scoring.canonicalized(&vocabulary))?;

        info!(
            skills = vocabulary.skill_count(),
            aliases = vocabulary.alias_count(),
            degree_terms = vocabulary.degree_terms().len(),
            target_skills = engine.config().target_skills.len(),
            "Pipeline ready"
        );

        Ok(Self {
            vocabulary: Arc::new(vocabulary),
            engine: Arc::new(engine),
        })
    }

    /// Runs the pure pipeline over already-extracted text.
    pub fn analyze_text(
        &self,
        document_id: &str,
        text: &str,
        as_of: NaiveDate,
    ) -> Result<Analysis, PipelineError> {
        let profile = self.profile_text(document_id, text, as_of)?;
        let score = self.engine.score(&profile);
        Ok(Analysis { profile, score })
    }

    fn profile_text(
        &self,
        document_id: &str,
        text: &str,
        as_of: NaiveDate,
    ) -> Result<CandidateProfile, PipelineError> {
        let normalized = normalize(text)?;
        let entities = EntityExtractor::new(&self.vocabulary, as_of).extract(&normalized);
        debug!(
            document_id = %document_id,
            units = normalized.units().len(),
            entities = entities.len(),
            "Entities extracted"
        );

        ProfileBuilder::new(&self.vocabulary).build(&entities, document_id)
    }

    fn profile_at(&self, document: &RawDocument, as_of: NaiveDate) -> Result<CandidateProfile, PipelineError> {
        let text = extract_text(document)?;
        self.profile_text(&document.id, &text, as_of)
    }

    pub fn analyze_at(&self, document: &RawDocument, as_of: NaiveDate) -> Result<Analysis, PipelineError> {
        let text = extract_text(document)?;
        self.analyze_text(&document.id, &text, as_of)
    }

    /// Analyzes one document as of today (UTC).
    pub fn analyze(&self, document: &RawDocument) -> Result<Analysis, PipelineError> {
        self.analyze_at(document, today())
    }

    pub async fn analyze_batch(&self, documents: Vec<RawDocument>) -> BatchReport {
        self.analyze_batch_at(documents, today()).await
    }

    /// Builds every profile on the blocking pool, waits for all of them, then
    /// scores and ranks the successes. Per-document errors (and panics) become failure
    /// entries; the batch itself never fails.
    pub async fn analyze_batch_at(&self, documents: Vec<RawDocument>, as_of: NaiveDate) -> BatchReport {
        let total_documents = documents.len();

        let handles: Vec<_> = documents
            .into_iter()
            .enumerate()
            .map(|(position, document)| {
                let id = document.id.clone();
                let file_name = document.file_name.clone();
                let pipeline = self.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    let result = pipeline.profile_at(&document, as_of);
                    (document, result)
                });
                (position, id, file_name, handle)
            })
            .collect();

        let mut profiles = Vec::new();
        let mut failures = Vec::new();

        for (position, id, file_name, handle) in handles {
            match handle.await {
                Ok((_, Ok(profile))) => profiles.push(profile),
                Ok((document, Err(e))) => {
                    warn!(document_id = %document.id, code = e.code(), "Document failed: {e}");
                    failures.push(DocumentFailure::from_error(&document, position, &e));
                }
                Err(e) => {
                    warn!(document_id = %id, "Document task failed: {e}");
                    failures.push(DocumentFailure {
                        document_id: id,
                        file_name,
                        position,
                        code: INTERNAL_FAILURE_CODE.to_string(),
                        message: format!("analysis task failed: {e}"),
                    });
                }
            }
        }

        let ranked = rank(profiles, &self.engine);
        info!(
            total = total_documents,
            ranked = ranked.len(),
            failed = failures.len(),
            "Batch analyzed"
        );

        BatchReport {
            total_documents,
            ranked,
            failures,
        }
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok",
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            skills: self.vocabulary.skill_count(),
            aliases: self.vocabulary.alias_count(),
            degree_terms: self.vocabulary.degree_terms().len(),
            target_skills: self.engine.config().target_skills.len(),
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
