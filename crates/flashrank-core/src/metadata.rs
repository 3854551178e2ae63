use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::DraftReference;

/// One axis of curator labels. Display casing is preserved in insertion
/// order; membership and overlap are case-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelSet {
    display: Vec<String>,
    lower: HashSet<String>,
}

impl LabelSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trims the raw label, drops empty values, de-duplicates by lowercase.
    pub fn insert(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        let lower = trimmed.to_lowercase();
        if self.lower.insert(lower) {
            self.display.push(trimmed.to_string());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.display.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.lower.contains(&label.trim().to_lowercase())
    }

    /// Number of labels shared with `other`, case-insensitively.
    #[must_use]
    pub fn overlap_count(&self, other: &Self) -> usize {
        if self.lower.is_empty() || other.lower.is_empty() {
            return 0;
        }
        self.lower.intersection(&other.lower).count()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.display
    }

    fn sort_for_display(&mut self) {
        self.display
            .sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    }
}

/// Splits a raw tag value into atomic tags. Historic curator input stored
/// compound values like `"ospf, bgp"` in a single row.
#[must_use]
pub fn split_tag_value(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// The normalized, de-duplicated label sets attached to a question or
/// document. This is the unit both scorers compare; it is computed fresh per
/// request and never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    pub module_id: Option<i64>,
    pub topics: LabelSet,
    pub subtopics: LabelSet,
    pub tags: LabelSet,
}

impl ResolvedMetadata {
    #[must_use]
    pub fn from_parts<S: AsRef<str>>(
        module_id: Option<i64>,
        topics: &[S],
        subtopics: &[S],
        raw_tags: &[S],
    ) -> Self {
        let mut resolved = Self {
            module_id,
            ..Self::default()
        };
        for topic in topics {
            resolved.topics.insert(topic.as_ref());
        }
        for subtopic in subtopics {
            resolved.subtopics.insert(subtopic.as_ref());
        }
        for raw in raw_tags {
            for fragment in split_tag_value(raw.as_ref()) {
                resolved.tags.insert(&fragment);
            }
        }
        resolved.topics.sort_for_display();
        resolved.subtopics.sort_for_display();
        resolved.tags.sort_for_display();
        resolved
    }

    #[must_use]
    pub fn from_draft(draft: &DraftReference) -> Self {
        Self::from_parts(
            Some(draft.module_id),
            &draft.topics,
            &draft.subtopics,
            &draft.tags,
        )
    }

    /// True when no axis carries any label. Such a reference can never
    /// produce a document match above zero.
    #[must_use]
    pub fn is_unlabeled(&self) -> bool {
        self.topics.is_empty() && self.subtopics.is_empty() && self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{LabelSet, ResolvedMetadata, split_tag_value};

    #[test]
    fn label_set_deduplicates_case_insensitively_and_keeps_first_casing() {
        let mut labels = LabelSet::new();
        labels.insert("Networking");
        labels.insert("networking");
        labels.insert("  NETWORKING ");
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.names(), ["Networking"]);
        assert!(labels.contains("networking"));
    }

    #[test]
    fn label_set_overlap_ignores_case() {
        let mut a = LabelSet::new();
        a.insert("TCP");
        a.insert("UDP");
        let mut b = LabelSet::new();
        b.insert("tcp");
        b.insert("icmp");
        assert_eq!(a.overlap_count(&b), 1);
        assert_eq!(b.overlap_count(&a), 1);
    }

    #[test]
    fn compound_tag_values_split_into_atomic_labels() {
        assert_eq!(split_tag_value("ospf, bgp"), ["ospf", "bgp"]);
        assert_eq!(split_tag_value("  exam2023 ,, , rip "), ["exam2023", "rip"]);
        assert!(split_tag_value(" , ,").is_empty());
    }

    #[test]
    fn from_parts_splits_tags_and_sorts_display_names() {
        let resolved = ResolvedMetadata::from_parts(
            Some(7),
            &["Routing", "Switching"],
            &[],
            &["ospf, bgp", "BGP", "exam2023"],
        );
        assert_eq!(resolved.module_id, Some(7));
        assert_eq!(resolved.tags.len(), 3);
        assert_eq!(resolved.tags.names(), ["bgp", "exam2023", "ospf"]);
        assert!(resolved.subtopics.is_empty());
        assert!(!resolved.is_unlabeled());
    }

    #[test]
    fn empty_parts_resolve_to_unlabeled_not_null() {
        let resolved = ResolvedMetadata::from_parts::<&str>(None, &[], &[], &[]);
        assert!(resolved.is_unlabeled());
        assert_eq!(resolved.topics.overlap_count(&resolved.tags), 0);
    }
}
