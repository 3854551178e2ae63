use super::RelevanceEngine;
use crate::config::{DocumentWeights, EngineConfig};
use crate::models::{AnswerSource, DraftReference, QuestionFilter};
use crate::store::SqliteTaxonomyStore;

struct Fixture {
    engine: RelevanceEngine<SqliteTaxonomyStore>,
    store: SqliteTaxonomyStore,
    module_id: i64,
}

fn fixture() -> Fixture {
    let store = SqliteTaxonomyStore::open_in_memory().expect("open store");
    let module_id = store.upsert_module("Computer Networks").expect("module");
    Fixture {
        engine: RelevanceEngine::new(store.clone()),
        store,
        module_id,
    }
}

fn add_question(
    fx: &Fixture,
    id: &str,
    answer: Option<&str>,
    topics: &[&str],
    subtopics: &[&str],
    tags: &[&str],
) {
    fx.store
        .insert_question(id, &format!("question {id}"), answer, Some(fx.module_id))
        .expect("question");
    for topic in topics {
        fx.store.link_question_topic(id, topic).expect("topic");
    }
    for subtopic in subtopics {
        fx.store
            .link_question_subtopic(id, subtopic)
            .expect("subtopic");
    }
    for tag in tags {
        fx.store.link_question_tag(id, tag).expect("tag");
    }
}

fn add_document(
    fx: &Fixture,
    name: &str,
    topics: &[&str],
    subtopics: &[&str],
    tags: &[&str],
) -> i64 {
    let id = fx
        .store
        .insert_document(Some(fx.module_id), &format!("pdfs/{name}"), name, true)
        .expect("document");
    for topic in topics {
        fx.store.link_document_topic(id, topic).expect("topic");
    }
    for subtopic in subtopics {
        fx.store
            .link_document_subtopic(id, subtopic)
            .expect("subtopic");
    }
    for tag in tags {
        fx.store.link_document_tag(id, tag).expect("tag");
    }
    id
}

#[test]
fn worked_example_scores_superset_at_hundred_and_excludes_disjoint() {
    let fx = fixture();
    add_question(&fx, "q1", Some("TCP"), &["TCP"], &[], &["exam2023"]);
    let doc_a = add_document(&fx, "tcp-deep-dive.pdf", &["TCP", "UDP"], &[], &["exam2023"]);
    add_document(&fx, "udp-only.pdf", &["UDP"], &[], &[]);

    let matches = fx.engine.rank_documents("q1", 10).expect("rank");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].document_id, doc_a);
    assert_eq!(matches[0].match_percent, 100.0);
    assert_eq!(matches[0].module_name, "Computer Networks");
    assert_eq!(
        matches[0].match_reasons,
        vec!["topic coverage: 100%", "tags matched: 1/1"]
    );
}

#[test]
fn unlabeled_reference_returns_no_documents_regardless_of_pool() {
    let fx = fixture();
    add_question(&fx, "q1", Some("answer"), &[], &[], &[]);
    for i in 0..5 {
        add_document(
            &fx,
            &format!("doc-{i}.pdf"),
            &["TCP"],
            &["Handshake"],
            &["exam2023"],
        );
    }
    assert!(fx.engine.rank_documents("q1", 10).expect("rank").is_empty());
}

#[test]
fn unknown_reference_is_an_empty_result_for_ranking_but_an_error_for_resolution() {
    let fx = fixture();
    assert!(fx.engine.rank_documents("ghost", 5).expect("rank").is_empty());
    assert!(
        fx.engine
            .rank_distractors_seeded("ghost", 5, 1)
            .expect("rank")
            .is_empty()
    );
    assert!(fx.engine.resolve_question("ghost").is_err());
}

#[test]
fn case_variation_in_labels_never_changes_results() {
    let fx = fixture();
    add_question(&fx, "q1", Some("answer"), &["NETWORKING"], &[], &[]);
    let doc = add_document(&fx, "networking.pdf", &["networking"], &[], &[]);

    let matches = fx.engine.rank_documents("q1", 5).expect("rank");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].document_id, doc);
    assert_eq!(matches[0].match_percent, 100.0);
}

#[test]
fn compound_tag_values_match_after_splitting() {
    let fx = fixture();
    add_question(&fx, "q1", Some("answer"), &[], &[], &["ospf, bgp"]);
    let doc = add_document(&fx, "bgp.pdf", &[], &[], &["bgp"]);

    let matches = fx.engine.rank_documents("q1", 5).expect("rank");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].document_id, doc);
    // One of the two atomic tags {ospf, bgp} is covered.
    assert_eq!(matches[0].match_percent, 50.0);
    assert_eq!(matches[0].match_reasons, vec!["tags matched: 1/2"]);
}

#[test]
fn document_order_is_deterministic_and_truncation_keeps_the_top_n() {
    let fx = fixture();
    add_question(&fx, "q1", Some("answer"), &["TCP", "UDP"], &[], &[]);
    // Two full matches tie at 100 and sort by name; the half match trails.
    add_document(&fx, "zebra.pdf", &["TCP", "UDP"], &[], &[]);
    add_document(&fx, "alpha.pdf", &["tcp", "udp"], &[], &[]);
    add_document(&fx, "partial.pdf", &["TCP"], &[], &[]);

    let full = fx.engine.rank_documents("q1", 10).expect("rank");
    let names: Vec<_> = full.iter().map(|m| m.display_name.as_str()).collect();
    assert_eq!(names, ["alpha.pdf", "zebra.pdf", "partial.pdf"]);

    let repeat = fx.engine.rank_documents("q1", 10).expect("rank");
    let repeat_names: Vec<_> = repeat.iter().map(|m| m.display_name.as_str()).collect();
    assert_eq!(names, repeat_names);

    let truncated = fx.engine.rank_documents("q1", 2).expect("rank");
    assert_eq!(truncated.len(), 2);
    for (kept, expected) in truncated.iter().zip(full.iter()) {
        assert_eq!(kept.document_id, expected.document_id);
    }
}

#[test]
fn inactive_documents_are_never_candidates() {
    let fx = fixture();
    add_question(&fx, "q1", Some("answer"), &["TCP"], &[], &[]);
    let doc = add_document(&fx, "tcp.pdf", &["TCP"], &[], &[]);
    fx.store.set_document_active(doc, false).expect("deactivate");

    assert!(fx.engine.rank_documents("q1", 5).expect("rank").is_empty());
}

#[test]
fn question_without_module_short_circuits_to_empty_rankings() {
    let fx = fixture();
    fx.store
        .insert_question("orphan", "unscoped question", Some("answer"), None)
        .expect("question");
    fx.store.link_question_topic("orphan", "TCP").expect("topic");
    add_document(&fx, "tcp.pdf", &["TCP"], &[], &[]);

    assert!(fx.engine.rank_documents("orphan", 5).expect("rank").is_empty());
    assert!(
        fx.engine
            .rank_distractors_seeded("orphan", 5, 1)
            .expect("rank")
            .is_empty()
    );
}

#[test]
fn draft_reference_ranks_without_a_persisted_question() {
    let fx = fixture();
    let doc = add_document(&fx, "routing.pdf", &["Routing"], &[], &["exam2023"]);

    let draft = DraftReference {
        module_id: fx.module_id,
        topics: vec!["routing".to_string()],
        subtopics: Vec::new(),
        tags: vec!["exam2023, lab".to_string()],
    };
    let matches = fx.engine.rank_documents_for_draft(&draft, 5).expect("rank");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].document_id, doc);
    // Topic fully covered, one of two atomic tags covered:
    // (30 + 20 * 1/2) / 50 -> 80%.
    assert_eq!(matches[0].match_percent, 80.0);
}

#[test]
fn distractors_exclude_reference_blank_answers_and_other_modules() {
    let fx = fixture();
    add_question(&fx, "q1", Some("Correct"), &["Routing"], &[], &[]);
    add_question(&fx, "q2", Some("Plausible"), &["Routing"], &[], &[]);
    add_question(&fx, "q3", Some("   "), &["Routing"], &[], &[]);
    add_question(&fx, "q4", None, &["Routing"], &[], &[]);

    let other_module = fx.store.upsert_module("Databases").expect("module");
    fx.store
        .insert_question("q5", "other module", Some("Wrong pool"), Some(other_module))
        .expect("question");

    let distractors = fx.engine.rank_distractors_seeded("q1", 10, 1).expect("rank");
    let ids: Vec<&str> = distractors.iter().map(|d| d.question_id.as_str()).collect();
    assert_eq!(ids, ["q2"]);
    assert_eq!(distractors[0].answer_text, "Plausible");
}

#[test]
fn distractor_scores_follow_the_additive_point_scheme() {
    let fx = fixture();
    add_question(&fx, "q1", Some("Correct"), &["Routing", "Switching"], &["VLAN"], &["lab"]);
    // 2 topics * 3 + bonus 2 + 1 subtopic * 2 + bonus 1 + 1 tag * 1 = 12.
    add_question(&fx, "strong", Some("A"), &["Routing", "Switching"], &["VLAN"], &["lab"]);
    // 1 topic * 3 + bonus 2 = 5.
    add_question(&fx, "weak", Some("B"), &["Routing"], &[], &[]);
    add_question(&fx, "none", Some("C"), &[], &[], &[]);

    let distractors = fx.engine.rank_distractors_seeded("q1", 10, 9).expect("rank");
    let scored: Vec<(&str, i64)> = distractors
        .iter()
        .map(|d| (d.question_id.as_str(), d.similarity_score))
        .collect();
    assert_eq!(scored, [("strong", 12), ("weak", 5), ("none", 0)]);
}

#[test]
fn seeded_distractor_ranking_is_reproducible_and_ties_only_reorder() {
    let fx = fixture();
    add_question(&fx, "q1", Some("Correct"), &["Routing"], &[], &[]);
    for i in 0..6 {
        add_question(&fx, &format!("tie-{i}"), Some("Same score"), &["Routing"], &[], &[]);
    }

    let first = fx.engine.rank_distractors_seeded("q1", 6, 42).expect("rank");
    let second = fx.engine.rank_distractors_seeded("q1", 6, 42).expect("rank");
    let ids = |rank: &[crate::models::DistractorMatch]| {
        rank.iter().map(|d| d.question_id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));

    let other_seed = fx.engine.rank_distractors_seeded("q1", 6, 43).expect("rank");
    let mut sorted_a = ids(&first);
    let mut sorted_b = ids(&other_seed);
    sorted_a.sort();
    sorted_b.sort();
    assert_eq!(sorted_a, sorted_b);
    for rank in [&first, &other_seed] {
        assert!(rank.iter().all(|d| d.similarity_score == 5));
    }
}

#[test]
fn distractor_limit_truncates_after_sorting() {
    let fx = fixture();
    add_question(&fx, "q1", Some("Correct"), &["Routing"], &[], &[]);
    add_question(&fx, "high", Some("A"), &["Routing"], &[], &[]);
    add_question(&fx, "zero-a", Some("B"), &[], &[], &[]);
    add_question(&fx, "zero-b", Some("C"), &[], &[], &[]);

    let top = fx.engine.rank_distractors_seeded("q1", 1, 3).expect("rank");
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].question_id, "high");
}

#[test]
fn identical_answer_texts_are_not_deduplicated() {
    let fx = fixture();
    add_question(&fx, "q1", Some("Correct"), &["Routing"], &[], &[]);
    add_question(&fx, "dup-a", Some("Shared answer"), &["Routing"], &[], &[]);
    add_question(&fx, "dup-b", Some("Shared answer"), &["Routing"], &[], &[]);

    let distractors = fx.engine.rank_distractors_seeded("q1", 10, 5).expect("rank");
    assert_eq!(distractors.len(), 2);
    assert!(distractors.iter().all(|d| d.answer_text == "Shared answer"));
}

#[test]
fn alternate_document_weights_change_scores_through_config_only() {
    let fx = fixture();
    add_question(&fx, "q1", Some("answer"), &["TCP"], &["Handshake"], &[]);
    add_document(&fx, "topic-only.pdf", &["TCP"], &[], &[]);

    let default_score = fx.engine.rank_documents("q1", 5).expect("rank")[0].match_percent;
    assert_eq!(default_score, 37.5); // 30 of 80 available

    let topic_heavy = RelevanceEngine::with_config(
        fx.store.clone(),
        EngineConfig {
            document_weights: DocumentWeights {
                topic: 60.0,
                subtopic: 20.0,
                tag: 20.0,
            },
            ..EngineConfig::default()
        },
    );
    let boosted = topic_heavy.rank_documents("q1", 5).expect("rank")[0].match_percent;
    assert_eq!(boosted, 75.0); // 60 of 80 available
}

#[test]
fn pick_question_honors_every_supplied_filter_axis() {
    let fx = fixture();
    add_question(&fx, "q1", Some("A"), &["Routing"], &["OSPF"], &["exam2023"]);
    add_question(&fx, "q2", Some("B"), &["Routing"], &["BGP"], &[]);
    add_question(&fx, "q3", Some("C"), &["Switching"], &[], &[]);

    let filter = QuestionFilter {
        topics: vec!["routing".to_string()],
        subtopics: vec!["OSPF".to_string()],
        tags: Vec::new(),
    };
    for seed in 0..5 {
        let card = fx
            .engine
            .pick_question_seeded(fx.module_id, &filter, seed)
            .expect("pick")
            .expect("one eligible question");
        assert_eq!(card.question_id, "q1");
        assert_eq!(card.module_name, "Computer Networks");
    }

    let impossible = QuestionFilter {
        topics: vec!["Quantum".to_string()],
        ..QuestionFilter::default()
    };
    assert!(
        fx.engine
            .pick_question_seeded(fx.module_id, &impossible, 0)
            .expect("pick")
            .is_none()
    );
}

#[test]
fn pick_question_without_filter_reaches_every_question() {
    let fx = fixture();
    add_question(&fx, "q1", Some("A"), &[], &[], &[]);
    add_question(&fx, "q2", Some("B"), &[], &[], &[]);

    let mut seen = std::collections::HashSet::new();
    for seed in 0..32 {
        let card = fx
            .engine
            .pick_question_seeded(fx.module_id, &QuestionFilter::default(), seed)
            .expect("pick")
            .expect("question");
        seen.insert(card.question_id);
    }
    assert_eq!(seen.len(), 2);
}

#[test]
fn assembled_answers_hold_the_correct_answer_exactly_once_within_the_cap() {
    let fx = fixture();
    add_question(&fx, "q1", Some("Correct"), &["Routing"], &[], &[]);
    for i in 0..8 {
        add_question(&fx, &format!("c-{i}"), Some(&format!("Wrong {i}")), &["Routing"], &[], &[]);
    }

    let options = fx.engine.assemble_answers_seeded("q1", 11).expect("assemble");
    assert_eq!(options.len(), 5);
    let correct: Vec<_> = options
        .iter()
        .filter(|o| o.source == AnswerSource::Correct)
        .collect();
    assert_eq!(correct.len(), 1);
    assert_eq!(correct[0].text, "Correct");
    assert_eq!(correct[0].question_id.as_deref(), Some("q1"));
}

#[test]
fn manual_distractors_fill_before_scored_ones() {
    let fx = fixture();
    add_question(&fx, "q1", Some("Correct"), &["Routing"], &[], &[]);
    add_question(&fx, "scored", Some("Scored wrong"), &["Routing"], &[], &[]);
    for text in ["Manual 1", "Manual 2", "Manual 3", "Manual 4"] {
        fx.store.add_manual_distractor("q1", text).expect("manual");
    }

    // Four manual distractors plus the correct answer fill the default set;
    // no scored distractor may take a slot.
    let options = fx.engine.assemble_answers_seeded("q1", 17).expect("assemble");
    assert_eq!(options.len(), 5);
    assert!(
        options
            .iter()
            .all(|o| o.source != AnswerSource::ScoredDistractor)
    );
    assert_eq!(
        options
            .iter()
            .filter(|o| o.source == AnswerSource::ManualDistractor)
            .count(),
        4
    );
}

#[test]
fn assembly_for_unknown_or_answerless_questions_is_empty() {
    let fx = fixture();
    add_question(&fx, "blank", Some("  "), &[], &[], &[]);
    assert!(fx.engine.assemble_answers_seeded("ghost", 1).expect("assemble").is_empty());
    assert!(fx.engine.assemble_answers_seeded("blank", 1).expect("assemble").is_empty());
}

#[test]
fn resolve_document_normalizes_labels_like_questions() {
    let fx = fixture();
    let doc = add_document(&fx, "routing.pdf", &["Routing"], &["OSPF"], &["ospf, bgp"]);

    let resolved = fx.engine.resolve_document(doc).expect("resolve");
    assert_eq!(resolved.module_id, Some(fx.module_id));
    assert_eq!(resolved.tags.names(), ["bgp", "ospf"]);
    assert!(fx.engine.resolve_document(9999).is_err());
}

#[test]
fn filter_options_pass_through_from_the_store() {
    let fx = fixture();
    add_question(&fx, "q1", Some("A"), &["Routing"], &[], &[]);
    add_question(&fx, "q2", Some("B"), &["Routing"], &[], &[]);

    let options = fx.engine.filter_options(fx.module_id).expect("options");
    assert_eq!(options.topics.len(), 1);
    assert_eq!(options.topics[0].count, 2);
}
