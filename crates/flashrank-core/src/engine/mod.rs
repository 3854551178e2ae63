#[cfg(test)]
mod tests;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{FlashrankError, Result};
use crate::metadata::ResolvedMetadata;
use crate::models::{
    AnswerOption, AnswerSource, DistractorMatch, DocumentMatch, DraftReference, FilterOptions,
    QuestionCard, QuestionFilter,
};
use crate::scoring::{
    score_distractor, score_document, shuffle_score_ties, sort_matches_by_score_desc_name_asc,
};
use crate::store::{QuestionLabels, TaxonomyStore};

/// Stateless ranking engine over a read-only taxonomy store. Every call is a
/// pure read-compute-return cycle; the engine can be shared freely across
/// concurrent request handlers.
#[derive(Debug, Clone)]
pub struct RelevanceEngine<S: TaxonomyStore> {
    store: S,
    config: EngineConfig,
}

impl<S: TaxonomyStore> RelevanceEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Standalone resolution. Unlike the ranking operations, a missing
    /// entity here is an explicit error.
    pub fn resolve_question(&self, question_id: &str) -> Result<ResolvedMetadata> {
        let labels = self
            .store
            .question_labels(question_id)?
            .ok_or_else(|| FlashrankError::NotFound(format!("question {question_id}")))?;
        Ok(resolve(&labels))
    }

    pub fn resolve_document(&self, document_id: i64) -> Result<ResolvedMetadata> {
        let doc = self
            .store
            .document_labels(document_id)?
            .ok_or_else(|| FlashrankError::NotFound(format!("document {document_id}")))?;
        Ok(ResolvedMetadata::from_parts(
            doc.module_id,
            &doc.topics,
            &doc.subtopics,
            &doc.tags,
        ))
    }

    /// Ranks active same-module documents for a stored question. An unknown
    /// question id yields an empty result, not an error; "no matches" and
    /// "unknown reference" are indistinguishable at this layer.
    pub fn rank_documents(&self, question_id: &str, max_results: usize) -> Result<Vec<DocumentMatch>> {
        let Some(labels) = self.store.question_labels(question_id)? else {
            debug!(question_id, "document ranking reference not found");
            return Ok(Vec::new());
        };
        self.rank_documents_against(&resolve(&labels), max_results)
    }

    /// Explicit-override path for a not-yet-persisted draft question.
    pub fn rank_documents_for_draft(
        &self,
        draft: &DraftReference,
        max_results: usize,
    ) -> Result<Vec<DocumentMatch>> {
        self.rank_documents_against(&ResolvedMetadata::from_draft(draft), max_results)
    }

    fn rank_documents_against(
        &self,
        reference: &ResolvedMetadata,
        max_results: usize,
    ) -> Result<Vec<DocumentMatch>> {
        let Some(module_id) = reference.module_id else {
            // A question outside any module cannot be matched against anything.
            return Ok(Vec::new());
        };
        if reference.is_unlabeled() {
            // Zero labels on every axis means zero available weight for every
            // candidate. Intentional empty result, not an error.
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for doc in self.store.active_documents_in_module(module_id)? {
            if doc.module_id != Some(module_id) {
                warn!(
                    document_id = doc.id,
                    "skipping document outside reference module"
                );
                continue;
            }
            let candidate =
                ResolvedMetadata::from_parts(doc.module_id, &doc.topics, &doc.subtopics, &doc.tags);
            let scored = score_document(reference, &candidate, &self.config.document_weights);
            if scored.score <= 0.0 {
                continue;
            }
            matches.push(DocumentMatch {
                document_id: doc.id,
                display_name: doc.display_name,
                module_name: doc.module_name.unwrap_or_default(),
                topics: candidate.topics.names().to_vec(),
                subtopics: candidate.subtopics.names().to_vec(),
                tags: candidate.tags.names().to_vec(),
                match_percent: scored.score,
                match_reasons: scored.reasons,
            });
        }

        // Truncate only after the full sort so a lower-scoring document can
        // never displace a higher scorer through alphabetical luck.
        sort_matches_by_score_desc_name_asc(&mut matches);
        matches.truncate(max_results);
        Ok(matches)
    }

    /// Ranks same-module questions as wrong-answer candidates. Equal scores
    /// are ordered by a fresh random draw per call; use the seeded variant
    /// for reproducibility.
    pub fn rank_distractors(&self, question_id: &str, limit: usize) -> Result<Vec<DistractorMatch>> {
        self.rank_distractors_with_rng(question_id, limit, &mut StdRng::from_entropy())
    }

    pub fn rank_distractors_seeded(
        &self,
        question_id: &str,
        limit: usize,
        seed: u64,
    ) -> Result<Vec<DistractorMatch>> {
        self.rank_distractors_with_rng(question_id, limit, &mut StdRng::seed_from_u64(seed))
    }

    pub fn rank_distractors_for_draft(
        &self,
        draft: &DraftReference,
        limit: usize,
    ) -> Result<Vec<DistractorMatch>> {
        self.rank_distractors_against(
            &ResolvedMetadata::from_draft(draft),
            "",
            limit,
            &mut StdRng::from_entropy(),
        )
    }

    pub fn rank_distractors_for_draft_seeded(
        &self,
        draft: &DraftReference,
        limit: usize,
        seed: u64,
    ) -> Result<Vec<DistractorMatch>> {
        self.rank_distractors_against(
            &ResolvedMetadata::from_draft(draft),
            "",
            limit,
            &mut StdRng::seed_from_u64(seed),
        )
    }

    fn rank_distractors_with_rng<R: Rng>(
        &self,
        question_id: &str,
        limit: usize,
        rng: &mut R,
    ) -> Result<Vec<DistractorMatch>> {
        let Some(labels) = self.store.question_labels(question_id)? else {
            debug!(question_id, "distractor ranking reference not found");
            return Ok(Vec::new());
        };
        self.rank_distractors_against(&resolve(&labels), question_id, limit, rng)
    }

    fn rank_distractors_against<R: Rng>(
        &self,
        reference: &ResolvedMetadata,
        exclude_question_id: &str,
        limit: usize,
        rng: &mut R,
    ) -> Result<Vec<DistractorMatch>> {
        let Some(module_id) = reference.module_id else {
            return Ok(Vec::new());
        };

        let mut scored = Vec::new();
        for candidate in self
            .store
            .distractor_candidates(module_id, exclude_question_id)?
        {
            let Some(answer_text) = candidate
                .answer_text
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
            else {
                warn!(
                    question_id = %candidate.id,
                    "skipping distractor candidate with blank answer"
                );
                continue;
            };
            let candidate_meta = resolve(&candidate);
            let score = score_distractor(reference, &candidate_meta, &self.config.distractor_weights);
            scored.push((
                score,
                DistractorMatch {
                    question_id: candidate.id.clone(),
                    answer_text: answer_text.to_string(),
                    similarity_score: score,
                },
            ));
        }

        shuffle_score_ties(&mut scored, rng);
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry)
            .collect())
    }

    /// Distinct labels in use within one module, with question counts.
    pub fn filter_options(&self, module_id: i64) -> Result<FilterOptions> {
        self.store.filter_options(module_id)
    }

    /// Uniformly random question among those matching the filter. Each
    /// supplied axis is any-of; an empty axis imposes no constraint.
    pub fn pick_question(
        &self,
        module_id: i64,
        filter: &QuestionFilter,
    ) -> Result<Option<QuestionCard>> {
        self.pick_question_with_rng(module_id, filter, &mut StdRng::from_entropy())
    }

    pub fn pick_question_seeded(
        &self,
        module_id: i64,
        filter: &QuestionFilter,
        seed: u64,
    ) -> Result<Option<QuestionCard>> {
        self.pick_question_with_rng(module_id, filter, &mut StdRng::seed_from_u64(seed))
    }

    fn pick_question_with_rng<R: Rng>(
        &self,
        module_id: i64,
        filter: &QuestionFilter,
        rng: &mut R,
    ) -> Result<Option<QuestionCard>> {
        let questions = self.store.questions_in_module(module_id)?;
        let mut eligible = Vec::new();
        for question in questions {
            let resolved = resolve(&question);
            if filter_matches(filter, &resolved) {
                eligible.push((question, resolved));
            }
        }
        let Some((question, resolved)) = eligible.choose(rng) else {
            return Ok(None);
        };
        let module_name = self.store.module_name(module_id)?.unwrap_or_default();
        Ok(Some(QuestionCard {
            question_id: question.id.clone(),
            question_text: question.question_text.clone(),
            module_name,
            topics: resolved.topics.names().to_vec(),
            subtopics: resolved.subtopics.names().to_vec(),
            tags: resolved.tags.names().to_vec(),
        }))
    }

    /// Builds the multiple-choice option set for a question: the correct
    /// answer, curated manual distractors in insertion order, then scored
    /// distractors to fill the remainder, shuffled at the end. An unknown
    /// question or one with a blank answer yields an empty set.
    pub fn assemble_answers(&self, question_id: &str) -> Result<Vec<AnswerOption>> {
        self.assemble_answers_with_rng(question_id, &mut StdRng::from_entropy())
    }

    pub fn assemble_answers_seeded(&self, question_id: &str, seed: u64) -> Result<Vec<AnswerOption>> {
        self.assemble_answers_with_rng(question_id, &mut StdRng::seed_from_u64(seed))
    }

    fn assemble_answers_with_rng<R: Rng>(
        &self,
        question_id: &str,
        rng: &mut R,
    ) -> Result<Vec<AnswerOption>> {
        let Some(labels) = self.store.question_labels(question_id)? else {
            debug!(question_id, "answer assembly reference not found");
            return Ok(Vec::new());
        };
        let Some(correct) = labels
            .answer_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        else {
            warn!(question_id, "question has no answer text; cannot assemble options");
            return Ok(Vec::new());
        };

        let option_count = self.config.answer_option_count;
        let mut options = vec![AnswerOption {
            text: correct.to_string(),
            source: AnswerSource::Correct,
            question_id: Some(labels.id.clone()),
        }];

        for text in self.store.manual_distractors(question_id)? {
            if options.len() >= option_count {
                break;
            }
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            options.push(AnswerOption {
                text: trimmed.to_string(),
                source: AnswerSource::ManualDistractor,
                question_id: None,
            });
        }

        let remaining = option_count.saturating_sub(options.len());
        if remaining > 0 {
            let scored =
                self.rank_distractors_against(&resolve(&labels), question_id, remaining, rng)?;
            for distractor in scored {
                options.push(AnswerOption {
                    text: distractor.answer_text,
                    source: AnswerSource::ScoredDistractor,
                    question_id: Some(distractor.question_id),
                });
            }
        }

        options.shuffle(rng);
        Ok(options)
    }
}

fn resolve(labels: &QuestionLabels) -> ResolvedMetadata {
    ResolvedMetadata::from_parts(
        labels.module_id,
        &labels.topics,
        &labels.subtopics,
        &labels.tags,
    )
}

fn filter_matches(filter: &QuestionFilter, resolved: &ResolvedMetadata) -> bool {
    axis_matches(&filter.topics, |label| resolved.topics.contains(label))
        && axis_matches(&filter.subtopics, |label| resolved.subtopics.contains(label))
        && axis_matches(&filter.tags, |label| resolved.tags.contains(label))
}

fn axis_matches(wanted: &[String], contains: impl Fn(&str) -> bool) -> bool {
    wanted.is_empty() || wanted.iter().any(|label| contains(label))
}
