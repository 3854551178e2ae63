mod env;

use env::{read_env_f64, read_env_i64, read_env_usize};

const ENV_DOC_WEIGHT_TOPIC: &str = "FLASHRANK_DOC_WEIGHT_TOPIC";
const ENV_DOC_WEIGHT_SUBTOPIC: &str = "FLASHRANK_DOC_WEIGHT_SUBTOPIC";
const ENV_DOC_WEIGHT_TAG: &str = "FLASHRANK_DOC_WEIGHT_TAG";
const ENV_DISTRACTOR_TOPIC_POINTS: &str = "FLASHRANK_DISTRACTOR_TOPIC_POINTS";
const ENV_DISTRACTOR_SUBTOPIC_POINTS: &str = "FLASHRANK_DISTRACTOR_SUBTOPIC_POINTS";
const ENV_DISTRACTOR_TAG_POINTS: &str = "FLASHRANK_DISTRACTOR_TAG_POINTS";
const ENV_DISTRACTOR_TOPIC_BONUS: &str = "FLASHRANK_DISTRACTOR_TOPIC_BONUS";
const ENV_DISTRACTOR_SUBTOPIC_BONUS: &str = "FLASHRANK_DISTRACTOR_SUBTOPIC_BONUS";
const ENV_ANSWER_OPTION_COUNT: &str = "FLASHRANK_ANSWER_OPTION_COUNT";

// Subtopic carries the highest weight: curators treat it as the most
// specific, most diagnostic signal.
const DEFAULT_DOC_WEIGHT_TOPIC: f64 = 30.0;
const DEFAULT_DOC_WEIGHT_SUBTOPIC: f64 = 50.0;
const DEFAULT_DOC_WEIGHT_TAG: f64 = 20.0;

const DEFAULT_DISTRACTOR_TOPIC_POINTS: i64 = 3;
const DEFAULT_DISTRACTOR_SUBTOPIC_POINTS: i64 = 2;
const DEFAULT_DISTRACTOR_TAG_POINTS: i64 = 1;
const DEFAULT_DISTRACTOR_TOPIC_BONUS: i64 = 2;
const DEFAULT_DISTRACTOR_SUBTOPIC_BONUS: i64 = 1;

// Four distractors plus the correct answer.
const DEFAULT_ANSWER_OPTION_COUNT: usize = 5;

/// Per-axis weights for the document relevance scorer. Process-wide
/// configuration, not a per-call parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentWeights {
    pub topic: f64,
    pub subtopic: f64,
    pub tag: f64,
}

impl Default for DocumentWeights {
    fn default() -> Self {
        Self {
            topic: DEFAULT_DOC_WEIGHT_TOPIC,
            subtopic: DEFAULT_DOC_WEIGHT_SUBTOPIC,
            tag: DEFAULT_DOC_WEIGHT_TAG,
        }
    }
}

impl DocumentWeights {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            topic: read_env_f64(ENV_DOC_WEIGHT_TOPIC, defaults.topic, 0.0),
            subtopic: read_env_f64(ENV_DOC_WEIGHT_SUBTOPIC, defaults.subtopic, 0.0),
            tag: read_env_f64(ENV_DOC_WEIGHT_TAG, defaults.tag, 0.0),
        }
    }
}

/// Additive point values for the distractor similarity scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistractorWeights {
    pub topic_points: i64,
    pub subtopic_points: i64,
    pub tag_points: i64,
    pub topic_bonus: i64,
    pub subtopic_bonus: i64,
}

impl Default for DistractorWeights {
    fn default() -> Self {
        Self {
            topic_points: DEFAULT_DISTRACTOR_TOPIC_POINTS,
            subtopic_points: DEFAULT_DISTRACTOR_SUBTOPIC_POINTS,
            tag_points: DEFAULT_DISTRACTOR_TAG_POINTS,
            topic_bonus: DEFAULT_DISTRACTOR_TOPIC_BONUS,
            subtopic_bonus: DEFAULT_DISTRACTOR_SUBTOPIC_BONUS,
        }
    }
}

impl DistractorWeights {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            topic_points: read_env_i64(ENV_DISTRACTOR_TOPIC_POINTS, defaults.topic_points, 0),
            subtopic_points: read_env_i64(
                ENV_DISTRACTOR_SUBTOPIC_POINTS,
                defaults.subtopic_points,
                0,
            ),
            tag_points: read_env_i64(ENV_DISTRACTOR_TAG_POINTS, defaults.tag_points, 0),
            topic_bonus: read_env_i64(ENV_DISTRACTOR_TOPIC_BONUS, defaults.topic_bonus, 0),
            subtopic_bonus: read_env_i64(
                ENV_DISTRACTOR_SUBTOPIC_BONUS,
                defaults.subtopic_bonus,
                0,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub document_weights: DocumentWeights,
    pub distractor_weights: DistractorWeights,
    /// Total options per assembled answer set, correct answer included.
    pub answer_option_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            document_weights: DocumentWeights::default(),
            distractor_weights: DistractorWeights::default(),
            answer_option_count: DEFAULT_ANSWER_OPTION_COUNT,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            document_weights: DocumentWeights::from_env(),
            distractor_weights: DistractorWeights::from_env(),
            answer_option_count: read_env_usize(
                ENV_ANSWER_OPTION_COUNT,
                defaults.answer_option_count,
                2,
            ),
        }
    }
}
