use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::DistractorWeights;
use crate::metadata::ResolvedMetadata;

/// Additive, unbounded similarity between two same-module questions. Points
/// accrue per overlapping label, with a flat bonus when an axis overlaps at
/// all. Only the relative ranking matters; this is not a percentage.
#[must_use]
pub fn score_distractor(
    reference: &ResolvedMetadata,
    candidate: &ResolvedMetadata,
    weights: &DistractorWeights,
) -> i64 {
    let topic_overlap = count_as_i64(candidate.topics.overlap_count(&reference.topics));
    let subtopic_overlap = count_as_i64(candidate.subtopics.overlap_count(&reference.subtopics));
    let tag_overlap = count_as_i64(candidate.tags.overlap_count(&reference.tags));

    let mut score = topic_overlap * weights.topic_points
        + subtopic_overlap * weights.subtopic_points
        + tag_overlap * weights.tag_points;
    if topic_overlap > 0 {
        score += weights.topic_bonus;
    }
    if subtopic_overlap > 0 {
        score += weights.subtopic_bonus;
    }
    score
}

fn count_as_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Orders entries by score descending, shuffling each run of equal scores.
/// The random draw among ties is deliberate: repeated quizzes should not
/// always surface the same distractors for equally-similar candidates.
pub fn shuffle_score_ties<T, R: Rng>(entries: &mut Vec<(i64, T)>, rng: &mut R) {
    entries.sort_by(|a, b| b.0.cmp(&a.0));
    let mut start = 0;
    while start < entries.len() {
        let score = entries[start].0;
        let mut end = start + 1;
        while end < entries.len() && entries[end].0 == score {
            end += 1;
        }
        entries[start..end].shuffle(rng);
        start = end;
    }
}
