use serde::{Deserialize, Serialize};

/// One ranked supplementary document for a reference question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMatch {
    pub document_id: i64,
    pub display_name: String,
    pub module_name: String,
    pub topics: Vec<String>,
    pub subtopics: Vec<String>,
    pub tags: Vec<String>,
    pub match_percent: f64,
    pub match_reasons: Vec<String>,
}

/// One ranked wrong-answer candidate drawn from another question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistractorMatch {
    pub question_id: String,
    pub answer_text: String,
    pub similarity_score: i64,
}

/// Caller-supplied labels standing in for a not-yet-persisted question.
/// Bypasses resolution from the store; normalized exactly like resolved
/// metadata, including comma-splitting of tag values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftReference {
    pub module_id: i64,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Optional any-of label filters for question selection. An empty axis
/// imposes no constraint; every non-empty axis must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionFilter {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl QuestionFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.subtopics.is_empty() && self.tags.is_empty()
    }
}

/// A label name with the number of questions carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub name: String,
    pub count: u64,
}

/// Distinct labels in use within one module, for the filter sidebar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    pub topics: Vec<LabelCount>,
    pub subtopics: Vec<LabelCount>,
    pub tags: Vec<LabelCount>,
}

/// A question selected for serving, with its display labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCard {
    pub question_id: String,
    pub question_text: String,
    pub module_name: String,
    pub topics: Vec<String>,
    pub subtopics: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Correct,
    ManualDistractor,
    ScoredDistractor,
}

/// One multiple-choice option in an assembled answer set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub source: AnswerSource,
    /// Set for the correct answer and for scored distractors; curated
    /// manual distractors do not belong to a question of their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
}
