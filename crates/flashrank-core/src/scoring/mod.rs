mod distractor;
mod document;

pub use distractor::{score_distractor, shuffle_score_ties};
pub use document::{DocumentScore, score_document, sort_matches_by_score_desc_name_asc};
