use crate::alignment::{AlignmentBridge, MilestoneBridge};
use crate::chapter::ListScope;
use crate::export::MemoryArchive;
use crate::group_collection::GroupCollection;
use crate::models::{
    AlignerWord, AlignmentEdit, ParsedBooks, ScoredVerse, TestResults, TestScore, UsfmBook, UsfmHeader,
    WordAlignment,
};
use crate::parser::{UsfmCodec, UsfmTextCodec};
use crate::selection::{ResourcePredicate, Selection, Selector};
use crate::verse::VerseState;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const GENESIS_USFM: &str = r#"\id GEN EN_ULT
\h Genesis
\toc3 gen
\mt Genesis
\c 1
\s The creation
\v 1 In the beginning
\v 2 The earth was empty
\v 3 God said
"#;

fn bridge() -> MilestoneBridge {
    MilestoneBridge::new("grc", "en").unwrap()
}

fn text_verse(text: &str) -> Value {
    json!({"verseObjects": [{"type": "text", "text": text}]})
}

fn source_word_verse(word: &str) -> Value {
    json!({"verseObjects": [{"type": "word", "tag": "w", "text": word, "occurrence": "1", "occurrences": "1"}]})
}

fn book(name: &str, toc3: &str, chapters: &[(u32, &[u32])], make: &dyn Fn(u32, u32) -> Value) -> UsfmBook {
    UsfmBook {
        headers: vec![
            UsfmHeader {
                tag: "h".to_string(),
                content: name.to_string(),
            },
            UsfmHeader {
                tag: "toc3".to_string(),
                content: toc3.to_string(),
            },
        ],
        chapters: chapters
            .iter()
            .map(|(chapter, verses)| {
                (
                    chapter.to_string(),
                    verses.iter().map(|v| (v.to_string(), make(*chapter, *v))).collect(),
                )
            })
            .collect(),
    }
}

fn parsed(filename: &str, usfm_book: UsfmBook) -> ParsedBooks {
    [(filename.to_string(), usfm_book)].into_iter().collect()
}

fn genesis_target(chapters: &[(u32, &[u32])]) -> ParsedBooks {
    parsed(
        "gen.usfm",
        book("Genesis", "gen", chapters, &|c, v| text_verse(&format!("target {}:{}", c, v))),
    )
}

fn genesis_source(chapters: &[(u32, &[u32])]) -> ParsedBooks {
    parsed(
        "gen-src.usfm",
        book("Bereshit", "gen", chapters, &|_, _| source_word_verse("λόγος")),
    )
}

fn state_of(collection: &GroupCollection, group: &str, book: &str, chapter: u32, verse: u32) -> VerseState {
    collection
        .verse(&Selector::verse(group, book, chapter, verse))
        .unwrap()
        .state()
}

fn all_target_payloads(collection: &GroupCollection) -> Vec<String> {
    let mut payloads: Vec<String> = collection
        .verses()
        .into_iter()
        .filter_map(|(_, verse)| verse.target_verse().map(Value::to_string))
        .collect();
    payloads.sort();
    payloads
}

#[test]
fn test_target_import_creates_verses_without_source() {
    let bridge = bridge();
    let collection = GroupCollection::default().add_target_usfm("Draft", &genesis_target(&[(1, &[1, 2, 3])]), &bridge);

    let chapter = collection.group("Draft").unwrap().book("Genesis").unwrap().chapter(1).unwrap();
    assert_eq!(chapter.verses().keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    for verse in 1..=3 {
        assert_eq!(state_of(&collection, "Draft", "Genesis", 1, verse), VerseState::NoSource);
    }
    assert_eq!(collection.group("Draft").unwrap().book("Genesis").unwrap().toc3_name(), "gen");
}

#[test]
fn test_source_import_limited_to_selected_verse() {
    let bridge = bridge();
    let collection = GroupCollection::default().add_target_usfm("Draft", &genesis_target(&[(1, &[1, 2, 3])]), &bridge);
    let selection = Selection::new(vec![Selector::verse("Draft", "Genesis", 1, 2)]);

    let result = collection.add_source_usfm(
        &genesis_source(&[(1, &[1, 2, 3])]),
        &|key| selection.is_fully_selected(key),
        &bridge,
    );

    assert_eq!(result.added_verse_count, 1);
    assert_eq!(result.dropped_verse_count, 2);
    let updated = result.group_collection;
    assert_eq!(state_of(&updated, "Draft", "Genesis", 1, 1), VerseState::NoSource);
    assert_eq!(state_of(&updated, "Draft", "Genesis", 1, 2), VerseState::Unaligned);
    assert_eq!(state_of(&updated, "Draft", "Genesis", 1, 3), VerseState::NoSource);
}

#[test]
fn test_source_import_matches_toc3_in_every_group() {
    let bridge = bridge();
    let collection = GroupCollection::default()
        .add_target_usfm("Draft", &genesis_target(&[(1, &[1, 2])]), &bridge)
        .add_target_usfm("Review", &genesis_target(&[(1, &[1])]), &bridge)
        .add_target_usfm(
            "Other",
            &parsed("exo.usfm", book("Exodus", "exo", &[(1, &[1])], &|_, _| text_verse("names"))),
            &bridge,
        );

    let result = collection.add_source_usfm(&genesis_source(&[(1, &[1, 2])]), &|_| true, &bridge);

    // verse 2 is missing in Review, and Other has no gen book at all
    assert_eq!(result.added_verse_count, 3);
    assert_eq!(result.dropped_verse_count, 3);
    let updated = result.group_collection;
    assert_eq!(state_of(&updated, "Review", "Genesis", 1, 1), VerseState::Unaligned);
    assert!(Arc::ptr_eq(
        updated.group("Other").unwrap().book("Exodus").unwrap(),
        collection.group("Other").unwrap().book("Exodus").unwrap()
    ));
}

#[test]
fn test_source_import_counts_each_rejecting_group() {
    let bridge = bridge();
    let collection = GroupCollection::default()
        .add_target_usfm("Draft", &genesis_target(&[(1, &[1])]), &bridge)
        .add_target_usfm("Review", &genesis_target(&[(1, &[1])]), &bridge);

    let result = collection.add_source_usfm(&genesis_source(&[(1, &[1, 4])]), &|_| true, &bridge);

    assert_eq!(result.added_verse_count, 2);
    assert_eq!(result.dropped_verse_count, 2);
}

#[test]
fn test_reimport_is_idempotent() {
    let bridge = bridge();
    let books = genesis_target(&[(1, &[1, 2]), (2, &[1])]);
    let once = GroupCollection::default().add_target_usfm("Draft", &books, &bridge);
    let twice = once.add_target_usfm("Draft", &books, &bridge);

    assert_eq!(once, twice);
    assert!(once.has_book_in_group("Draft", "gen.usfm", &books["gen.usfm"]));
    assert!(!once.has_book_in_group("Review", "gen.usfm", &books["gen.usfm"]));
}

#[test]
fn test_removing_only_chapter_prunes_upwards() {
    let bridge = bridge();
    let collection = GroupCollection::default().add_target_usfm("Draft", &genesis_target(&[(1, &[1, 2, 3])]), &bridge);

    let removed = collection.remove_selected_resources(&Selection::new(vec![Selector::chapter("Draft", "Genesis", 1)]));

    assert!(removed.is_empty());
}

#[test]
fn test_removing_one_chapter_shares_the_rest() {
    let bridge = bridge();
    let collection = GroupCollection::default()
        .add_target_usfm("Draft", &genesis_target(&[(1, &[1, 2]), (2, &[1, 2])]), &bridge)
        .add_target_usfm("Review", &genesis_target(&[(1, &[1])]), &bridge);

    let removed = collection.remove_selected_resources(&Selection::new(vec![Selector::chapter("Draft", "Genesis", 1)]));

    let genesis = removed.group("Draft").unwrap().book("Genesis").unwrap();
    assert_eq!(genesis.chapters().keys().copied().collect::<Vec<_>>(), vec![2]);
    assert!(Arc::ptr_eq(
        genesis.chapter(2).unwrap(),
        collection.group("Draft").unwrap().book("Genesis").unwrap().chapter(2).unwrap()
    ));
    assert!(Arc::ptr_eq(removed.group("Review").unwrap(), collection.group("Review").unwrap()));
}

const HEADING_CHAPTER_USFM: &str = r#"\id GEN EN_ULT
\h Genesis
\toc3 gen
\c 1
\v 1 In the beginning
\c 2
\s Heading only
"#;

#[test]
fn test_removing_chapter_without_verses() {
    let bridge = bridge();
    let codec = UsfmTextCodec::default();
    let books = parsed("01-GEN.usfm", codec.parse(HEADING_CHAPTER_USFM).unwrap());
    let collection = GroupCollection::default().add_target_usfm("Draft", &books, &bridge);
    let selection = Selection::new(vec![Selector::chapter("Draft", "Genesis", 2)]);

    let removed = collection.remove_selected_resources(&selection);
    let genesis = removed.group("Draft").unwrap().book("Genesis").unwrap();
    assert_eq!(genesis.chapters().keys().copied().collect::<Vec<_>>(), vec![1]);

    let renamed = collection.rename_selected_groups("Headings", &selection);
    let kept = renamed.group("Draft").unwrap().book("Genesis").unwrap();
    let moved = renamed.group("Headings").unwrap().book("Genesis").unwrap();
    assert_eq!(kept.chapters().keys().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(moved.chapters().keys().copied().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn test_rename_single_verse_moves_only_that_verse() {
    let bridge = bridge();
    let collection = GroupCollection::default().add_target_usfm("Draft", &genesis_target(&[(1, &[1, 2, 3])]), &bridge);

    let renamed = collection.rename_selected_groups(
        "Review",
        &Selection::new(vec![Selector::verse("Draft", "Genesis", 1, 2)]),
    );

    let kept = renamed.group("Draft").unwrap().book("Genesis").unwrap().chapter(1).unwrap();
    let moved = renamed.group("Review").unwrap().book("Genesis").unwrap().chapter(1).unwrap();
    assert_eq!(kept.verses().keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(moved.verses().keys().copied().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn test_rename_whole_group() {
    let bridge = bridge();
    let collection = GroupCollection::default()
        .add_target_usfm("Draft", &genesis_target(&[(1, &[1, 2, 3])]), &bridge)
        .add_target_usfm("Review", &genesis_target(&[(1, &[1])]), &bridge);

    let renamed = collection.rename_selected_groups("Combined", &Selection::new(vec![Selector::group("Draft")]));

    assert_eq!(
        renamed.groups().keys().cloned().collect::<Vec<_>>(),
        vec!["Combined".to_string(), "Review".to_string()]
    );
    assert_eq!(**renamed.group("Combined").unwrap(), **collection.group("Draft").unwrap());
    assert!(Arc::ptr_eq(renamed.group("Review").unwrap(), collection.group("Review").unwrap()));
}

#[test]
fn test_rename_into_existing_group_is_left_biased() {
    let bridge = bridge();
    let draft = parsed(
        "gen.usfm",
        book("Genesis", "gen", &[(1, &[1, 2])], &|c, v| text_verse(&format!("draft {}:{}", c, v))),
    );
    let collection = GroupCollection::default()
        .add_target_usfm("Draft", &draft, &bridge)
        .add_target_usfm("Review", &genesis_target(&[(1, &[1])]), &bridge);

    let renamed = collection.rename_selected_groups("Review", &Selection::new(vec![Selector::group("Draft")]));

    assert!(renamed.group("Draft").is_none());
    let verse_1 = renamed.verse(&Selector::verse("Review", "Genesis", 1, 1)).unwrap();
    let verse_2 = renamed.verse(&Selector::verse("Review", "Genesis", 1, 2)).unwrap();
    assert_eq!(verse_1.target_verse(), Some(&text_verse("target 1:1")));
    assert_eq!(verse_2.target_verse(), Some(&text_verse("draft 1:2")));
}

#[test]
fn test_export_single_verse_keeps_front_matter() {
    let bridge = bridge();
    let codec = UsfmTextCodec::default();
    let books = parsed("01-GEN.usfm", codec.parse(GENESIS_USFM).unwrap());
    let collection = GroupCollection::default().add_target_usfm("Draft: v1", &books, &bridge);
    let selection = Selection::new(vec![Selector::verse("Draft: v1", "Genesis", 1, 2)]);

    let mut archive = MemoryArchive::new();
    let summary = collection
        .save_selected_resources_to_usfm_archive(&mut archive, &|key| selection.is_partially_selected(key), &codec)
        .unwrap();

    assert_eq!(summary.books, 1);
    let exported = archive.get("Draft v1", "01-GEN.usfm").unwrap();
    assert!(exported.contains("\\h Genesis"));
    assert!(exported.contains("\\mt Genesis"));
    assert!(exported.contains("The creation"));
    assert!(exported.contains("\\v 2 The earth was empty"));
    assert!(!exported.contains("In the beginning"));
    assert!(!exported.contains("God said"));
}

#[test]
fn test_export_then_reimport_round_trip() {
    let bridge = bridge();
    let codec = UsfmTextCodec::default();
    let books = parsed("01-GEN.usfm", codec.parse(GENESIS_USFM).unwrap());
    let collection = GroupCollection::default().add_target_usfm("Draft", &books, &bridge);

    let mut archive = MemoryArchive::new();
    collection
        .save_selected_resources_to_usfm_archive(&mut archive, &|_| true, &codec)
        .unwrap();

    let exported = archive.get("Draft", "01-GEN.usfm").unwrap();
    let reimported = GroupCollection::default().add_target_usfm(
        "Draft",
        &parsed("01-GEN.usfm", codec.parse(exported).unwrap()),
        &bridge,
    );

    assert_eq!(reimported, collection);
}

#[test]
fn test_alignment_state_errors() {
    let bridge = bridge();
    let collection = GroupCollection::default().add_target_usfm("Draft", &genesis_target(&[(1, &[1])]), &bridge);

    let no_source = collection
        .verse_alignment_state(&Selector::verse("Draft", "Genesis", 1, 1), &bridge)
        .unwrap_err();
    assert_eq!(no_source.to_string(), "No source text in verse");

    let missing = collection
        .verse_alignment_state(&Selector::verse("Draft", "Genesis", 1, 9), &bridge)
        .unwrap_err();
    assert!(missing.to_string().contains('9'));
}

fn aligned_fixture(bridge: &MilestoneBridge) -> GroupCollection {
    let target = parsed(
        "gen.usfm",
        book("Genesis", "gen", &[(1, &[1, 2])], &|_, _| text_verse("word")),
    );
    GroupCollection::default()
        .add_target_usfm("Draft", &target, bridge)
        .add_source_usfm(&genesis_source(&[(1, &[1, 2])]), &|_| true, bridge)
        .group_collection
}

fn align_word_edit() -> AlignmentEdit {
    let word = AlignerWord::new("word", 1, 1);
    AlignmentEdit {
        target_words: vec![word.clone()],
        verse_alignments: vec![WordAlignment {
            top_words: vec![AlignerWord::new("λόγος", 1, 1)],
            bottom_words: vec![word],
        }],
    }
}

#[test]
fn test_alignment_state_and_update() {
    let bridge = bridge();
    let collection = aligned_fixture(&bridge);
    let selector = Selector::verse("Draft", "Genesis", 1, 1);

    let state = collection.verse_alignment_state(&selector, &bridge).unwrap();
    assert!(!state.aligned);
    assert_eq!(state.reference.verse, 1);
    assert_eq!(state.source_language, "grc");
    assert_eq!(state.aligner_data.word_bank, vec![AlignerWord::new("word", 1, 1)]);

    let updated = collection.update_alignment_state(&align_word_edit(), &selector, &bridge);

    assert_eq!(state_of(&updated, "Draft", "Genesis", 1, 1), VerseState::AlignedTrain);
    assert!(updated.verse_alignment_state(&selector, &bridge).unwrap().aligned);
    assert!(Arc::ptr_eq(
        updated.verse(&Selector::verse("Draft", "Genesis", 1, 2)).unwrap(),
        collection.verse(&Selector::verse("Draft", "Genesis", 1, 2)).unwrap()
    ));

    let raw = updated.group("Draft").unwrap().book("Genesis").unwrap().target_usfm_book();
    assert_eq!(raw.chapters["1"]["1"]["verseObjects"][0]["tag"], "zaln");
}

#[test]
fn test_update_alignment_keeps_punctuation_and_markers() {
    let bridge = bridge();
    let codec = UsfmTextCodec::default();
    let usfm = "\\id GEN\n\\h Genesis\n\\toc3 gen\n\\c 1\n\\v 1 In the beginning, \\wj God created\\wj*.\n";
    let collection = GroupCollection::default()
        .add_target_usfm("Draft", &parsed("01-GEN.usfm", codec.parse(usfm).unwrap()), &bridge)
        .add_source_usfm(&genesis_source(&[(1, &[1])]), &|_| true, &bridge)
        .group_collection;
    let selector = Selector::verse("Draft", "Genesis", 1, 1);

    let edit = AlignmentEdit {
        target_words: collection.verse_alignment_state(&selector, &bridge).unwrap().aligner_data.word_bank,
        verse_alignments: vec![WordAlignment {
            top_words: vec![AlignerWord::new("λόγος", 1, 1)],
            bottom_words: vec![AlignerWord::new("In", 1, 1)],
        }],
    };
    let updated = collection.update_alignment_state(&edit, &selector, &bridge);

    let mut archive = MemoryArchive::new();
    updated
        .save_selected_resources_to_usfm_archive(&mut archive, &|_| true, &codec)
        .unwrap();
    let exported = archive.get("Draft", "01-GEN.usfm").unwrap();

    assert!(exported.contains("x-content=\"λόγος\"\\*\\w In|x-occurrence=\"1\" x-occurrences=\"1\"\\w*\\zaln-e\\*"));
    assert!(exported.contains("\\w beginning|x-occurrence=\"1\" x-occurrences=\"1\"\\w*, \\wj "));
    assert!(exported.contains("\\w created|x-occurrence=\"1\" x-occurrences=\"1\"\\w*\\wj*."));

    let target = updated.verse(&selector).unwrap().target_verse().unwrap();
    assert_eq!(bridge.verse_text(target), "In the beginning God created");
    let data = updated.verse_alignment_state(&selector, &bridge).unwrap().aligner_data;
    assert_eq!(data.word_bank.len(), 4);
    assert_eq!(data.alignments[0].bottom_words, vec![AlignerWord::new("In", 1, 1)]);
}

#[test]
fn test_update_alignment_on_missing_verse_is_a_no_op() {
    let bridge = bridge();
    let collection = aligned_fixture(&bridge);

    let updated = collection.update_alignment_state(
        &align_word_edit(),
        &Selector::verse("Draft", "Genesis", 4, 1),
        &bridge,
    );

    assert_eq!(updated, collection);
}

#[test]
fn test_training_and_testing_partitions() {
    let bridge = bridge();
    let selector = Selector::verse("Draft", "Genesis", 1, 1);
    let collection = aligned_fixture(&bridge).update_alignment_state(&align_word_edit(), &selector, &bridge);

    let training = collection.alignment_data_for_training_or_testing(false, &bridge);
    assert_eq!(training.len(), 1);
    assert_eq!(training.samples[0].selector, selector);
    assert_eq!(training.samples[0].source_verse, "λόγος");
    assert_eq!(training.samples[0].alignments[0].target_ngram, vec!["word".to_string()]);
    assert!(collection.alignment_data_for_training_or_testing(true, &bridge).is_empty());

    let reserved = collection.set_reserved_for_testing(&Selection::new(vec![Selector::book("Draft", "Genesis")]), true, &bridge);
    assert_eq!(state_of(&reserved, "Draft", "Genesis", 1, 1), VerseState::AlignedTest);
    assert_eq!(state_of(&reserved, "Draft", "Genesis", 1, 2), VerseState::Unaligned);
    assert!(reserved.alignment_data_for_training_or_testing(false, &bridge).is_empty());
    assert_eq!(reserved.alignment_data_for_training_or_testing(true, &bridge).len(), 1);

    let released = reserved.set_reserved_for_testing(&Selection::new(vec![Selector::group("Draft")]), false, &bridge);
    assert_eq!(released, collection);
}

#[test]
fn test_test_results_are_stored() {
    let bridge = bridge();
    let collection = aligned_fixture(&bridge);
    let score = TestScore {
        num_manual_mappings: 2,
        num_suggested_mappings: 2,
        num_correct_mappings: 1,
        ratio_correct: 0.5,
    };
    let results = TestResults::from_scores(vec![
        ScoredVerse {
            selector: Selector::verse("Draft", "Genesis", 1, 2),
            score,
        },
        ScoredVerse {
            selector: Selector::verse("Gone", "Genesis", 1, 1),
            score,
        },
    ]);

    let scored = collection.add_alignment_test_results(&results);

    assert_eq!(
        scored.verse(&Selector::verse("Draft", "Genesis", 1, 2)).unwrap().test_score(),
        Some(&score)
    );
    assert!(Arc::ptr_eq(
        scored.verse(&Selector::verse("Draft", "Genesis", 1, 1)).unwrap(),
        collection.verse(&Selector::verse("Draft", "Genesis", 1, 1)).unwrap()
    ));
}

#[test]
fn test_snapshot_round_trip_recomputes_state() {
    let bridge = bridge();
    let selector = Selector::verse("Draft", "Genesis", 1, 1);
    let collection = aligned_fixture(&bridge).update_alignment_state(&align_word_edit(), &selector, &bridge);

    let snapshot = collection.to_snapshot().unwrap();
    assert!(snapshot.to_string().find("aligned-train").is_none());

    let restored = GroupCollection::from_snapshot(snapshot, &bridge).unwrap();
    assert_eq!(restored, collection);
    assert_eq!(restored.verse(&selector).unwrap().state(), VerseState::AlignedTrain);
}

#[test]
fn test_stats_and_list_rows() {
    let bridge = bridge();
    let collection = aligned_fixture(&bridge)
        .add_target_usfm("Review", &genesis_target(&[(1, &[1]), (2, &[1])]), &bridge);

    let stats = collection.stats();
    assert_eq!(stats.groups, 2);
    assert_eq!(stats.books, 2);
    assert_eq!(stats.chapters, 3);
    assert_eq!(stats.verses, 4);
    assert_eq!(stats.states["unaligned"], 2);
    assert_eq!(stats.states["no-source"], 2);

    assert_eq!(GroupCollection::list_headers(ListScope::Group), vec!["Group", "Books"]);
    let rows = collection.list_rows(ListScope::Verse);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].keys, vec!["Draft", "Genesis", "1", "1"]);
    assert_eq!(
        Selector::from_components(&rows[3].keys).unwrap(),
        Selector::verse("Review", "Genesis", 2, 1)
    );
}

const GROUPS: &[&str] = &["A", "B"];
const BOOKS: &[(&str, &str)] = &[("Genesis", "gen"), ("Exodus", "exo")];

type Coordinate = (usize, usize, u32, u32);

fn coordinates() -> impl Strategy<Value = Vec<Coordinate>> {
    prop::collection::vec((0..GROUPS.len(), 0..BOOKS.len(), 1..3u32, 1..4u32), 0..10)
}

fn build(coordinates: &[Coordinate], tag: &str, bridge: &dyn AlignmentBridge) -> GroupCollection {
    let mut by_group: BTreeMap<&str, ParsedBooks> = BTreeMap::new();
    for &(g, b, chapter, verse) in coordinates {
        let (book_name, toc3) = BOOKS[b];
        let usfm_book = by_group
            .entry(GROUPS[g])
            .or_default()
            .entry(format!("{}.usfm", toc3))
            .or_insert_with(|| book(book_name, toc3, &[], &|_, _| Value::Null));
        usfm_book.chapters.entry(chapter.to_string()).or_default().insert(
            verse.to_string(),
            text_verse(&format!("{} {} {} {}:{}", tag, GROUPS[g], book_name, chapter, verse)),
        );
    }

    by_group
        .iter()
        .fold(GroupCollection::default(), |acc, (group, books)| acc.add_target_usfm(group, books, bridge))
}

fn selector_for(depth: usize, (g, b, chapter, verse): Coordinate) -> Selector {
    let (book_name, _) = BOOKS[b];
    match depth {
        0 => Selector::All,
        1 => Selector::group(GROUPS[g]),
        2 => Selector::book(GROUPS[g], book_name),
        3 => Selector::chapter(GROUPS[g], book_name, chapter),
        _ => Selector::verse(GROUPS[g], book_name, chapter, verse),
    }
}

proptest! {
    #[test]
    fn prop_fully_selected_implies_partially_selected(
        selected in prop::collection::vec((0..5usize, (0..2usize, 0..2usize, 1..3u32, 1..4u32)), 0..5),
        key in (0..5usize, (0..2usize, 0..2usize, 1..3u32, 1..4u32)),
    ) {
        let selection = Selection::new(selected.into_iter().map(|(d, c)| selector_for(d, c)).collect());
        let key = selector_for(key.0, key.1);
        if selection.is_selected(&key) {
            prop_assert!(ResourcePredicate::is_partially_selected(&selection, &key));
        }
    }

    #[test]
    fn prop_merge_is_left_biased_union(left in coordinates(), right in coordinates()) {
        let bridge = bridge();
        let a = build(&left, "left", &bridge);
        let b = build(&right, "right", &bridge);
        let merged = a.merge_with(&b);

        for (selector, verse) in a.verses() {
            prop_assert_eq!(&**merged.verse(&selector).unwrap(), &**verse);
        }
        for (selector, verse) in b.verses() {
            if a.verse(&selector).is_err() {
                prop_assert_eq!(&**merged.verse(&selector).unwrap(), &**verse);
            }
        }
        let mut keys: Vec<Selector> = a.verses().into_iter().chain(b.verses()).map(|(s, _)| s).collect();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(merged.verses().len(), keys.len());
    }

    #[test]
    fn prop_rename_keeps_every_verse(
        existing in coordinates(),
        picks in prop::collection::vec((1..5usize, (0..2usize, 1..3u32, 1..4u32)), 0..4),
    ) {
        let bridge = bridge();
        let collection = build(&existing, "verse", &bridge);
        // selections stay inside group A so renamed verses cannot collide
        let selection = Selection::new(
            picks.into_iter().map(|(d, (b, c, v))| selector_for(d, (0, b, c, v))).collect(),
        );

        let renamed = collection.rename_selected_groups("Renamed", &selection);

        prop_assert_eq!(all_target_payloads(&renamed), all_target_payloads(&collection));
        for (selector, _) in renamed.verses() {
            if selector.group_name() == Some("Renamed") {
                let original = Selector::from_components(
                    &std::iter::once("A".to_string()).chain(selector.components().into_iter().skip(1)).collect::<Vec<_>>(),
                ).unwrap();
                prop_assert!(selection.is_fully_selected(&original));
            }
        }
    }
}
