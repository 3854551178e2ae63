use std::cmp::Ordering;

use crate::config::DocumentWeights;
use crate::metadata::{LabelSet, ResolvedMetadata};
use crate::models::DocumentMatch;

/// Normalized relevance of one candidate document against a reference
/// question. `score` is 0–100; `reasons` explain each matching axis,
/// subtopic first.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentScore {
    pub score: f64,
    pub reasons: Vec<String>,
}

struct AxisOutcome {
    available: f64,
    earned: f64,
    matched: usize,
    coverage: f64,
}

fn score_axis(reference: &LabelSet, candidate: &LabelSet, weight: f64) -> AxisOutcome {
    if reference.is_empty() {
        // No reference labels means no available weight on this axis; the
        // candidate neither gains nor loses here.
        return AxisOutcome {
            available: 0.0,
            earned: 0.0,
            matched: 0,
            coverage: 0.0,
        };
    }
    let matched = candidate.overlap_count(reference);
    let coverage = (matched_as_f64(matched) / matched_as_f64(reference.len())).min(1.0);
    AxisOutcome {
        available: weight,
        earned: weight * coverage,
        matched,
        coverage,
    }
}

fn matched_as_f64(count: usize) -> f64 {
    u32::try_from(count).map_or(f64::MAX, f64::from)
}

fn round_two_places(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn coverage_percent(coverage: f64) -> i64 {
    (coverage * 100.0).round() as i64
}

/// Proportional weighted overlap between a reference question's labels and a
/// candidate document's labels. A reference with no labels on any axis has
/// zero available weight and every candidate scores 0.
#[must_use]
pub fn score_document(
    reference: &ResolvedMetadata,
    candidate: &ResolvedMetadata,
    weights: &DocumentWeights,
) -> DocumentScore {
    let subtopic = score_axis(&reference.subtopics, &candidate.subtopics, weights.subtopic);
    let topic = score_axis(&reference.topics, &candidate.topics, weights.topic);
    let tag = score_axis(&reference.tags, &candidate.tags, weights.tag);

    let available = subtopic.available + topic.available + tag.available;
    if available <= 0.0 {
        return DocumentScore {
            score: 0.0,
            reasons: Vec::new(),
        };
    }

    let earned = subtopic.earned + topic.earned + tag.earned;
    let score = round_two_places(100.0 * earned / available);

    // Reason order reflects diagnostic strength: subtopic, then topic, then
    // tag. An axis appears only when it actually matched.
    let mut reasons = Vec::new();
    if subtopic.matched > 0 {
        reasons.push(format!(
            "subtopic coverage: {}%",
            coverage_percent(subtopic.coverage)
        ));
    }
    if topic.matched > 0 {
        reasons.push(format!(
            "topic coverage: {}%",
            coverage_percent(topic.coverage)
        ));
    }
    if tag.matched > 0 {
        reasons.push(format!(
            "tags matched: {}/{}",
            tag.matched,
            reference.tags.len()
        ));
    }

    DocumentScore { score, reasons }
}

fn compare_match_score_desc_then_name_asc(a: &DocumentMatch, b: &DocumentMatch) -> Ordering {
    b.match_percent
        .partial_cmp(&a.match_percent)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.display_name.cmp(&b.display_name))
}

/// Deterministic ranking order: score descending, display name ascending on
/// ties. Truncation to the caller's limit happens after this sort, never
/// before.
pub fn sort_matches_by_score_desc_name_asc(matches: &mut [DocumentMatch]) {
    matches.sort_by(compare_match_score_desc_then_name_asc);
}
