//! Root of the corpus tree.
//!
//! Every operation takes `&self` and returns a new collection. Subtrees an
//! operation does not touch are shared with the input through `Arc`.

use crate::alignment::AlignmentBridge;
use crate::chapter::ListScope;
use crate::error::TreeError;
use crate::export::ArchiveWriter;
use crate::group::{book_key, Group};
use crate::models::{
    AlignmentBatch, AlignmentEdit, AlignmentSample, CorpusStats, ExportSummary, ListRow, ParsedBooks,
    SourceImportCounts, TestResults, UsfmBook, VerseAlignmentState, VerseReference,
};
use crate::parser::UsfmCodec;
use crate::selection::{Complement, ResourcePredicate, Selector};
use crate::usfm_shape::{parse_numeric_key, sanitize_filename};
use crate::verse::{Verse, VerseState};
use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupCollection {
    #[serde(default)]
    groups: BTreeMap<String, Arc<Group>>,
}

/// Outcome of attaching source text across all groups
#[derive(Debug, Clone)]
pub struct SourceImportResult {
    pub group_collection: GroupCollection,
    pub added_verse_count: usize,
    pub dropped_verse_count: usize,
}

impl GroupCollection {
    pub fn new(groups: BTreeMap<String, Arc<Group>>) -> Self {
        GroupCollection { groups }
    }

    pub fn groups(&self) -> &BTreeMap<String, Arc<Group>> {
        &self.groups
    }

    pub fn group(&self, group_name: &str) -> Option<&Arc<Group>> {
        self.groups.get(group_name)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Lets a caller ask for overwrite confirmation before importing
    pub fn has_book_in_group(&self, group_name: &str, filename: &str, usfm_book: &UsfmBook) -> bool {
        self.groups
            .get(group_name)
            .map(|group| group.has_book(&book_key(filename, usfm_book)))
            .unwrap_or(false)
    }

    pub fn add_target_usfm(
        &self,
        group_name: &str,
        parsed_books: &ParsedBooks,
        bridge: &dyn AlignmentBridge,
    ) -> GroupCollection {
        let existing = self.groups.get(group_name).cloned().unwrap_or_default();
        let mut groups = self.groups.clone();
        groups.insert(
            group_name.to_string(),
            Arc::new(existing.add_target_usfm(parsed_books, bridge)),
        );
        GroupCollection { groups }
    }

    /// Attaches source text to every group holding a book with the same
    /// toc3. Drop counts are summed per group, so a verse rejected by two
    /// groups counts twice even if a third group accepted it.
    pub fn add_source_usfm(
        &self,
        parsed_books: &ParsedBooks,
        is_resource_selected: &dyn Fn(&Selector) -> bool,
        bridge: &dyn AlignmentBridge,
    ) -> SourceImportResult {
        let mut counts = SourceImportCounts::default();
        let mut groups = BTreeMap::new();

        for (group_name, group) in &self.groups {
            let (modified, group_counts) =
                group.add_source_usfm(parsed_books, is_resource_selected, group_name, bridge);
            groups.insert(group_name.clone(), Arc::new(modified));
            counts += group_counts;
        }

        SourceImportResult {
            group_collection: GroupCollection { groups },
            added_verse_count: counts.added_verse_count,
            dropped_verse_count: counts.dropped_verse_count,
        }
    }

    /// Resolves a verse selector to the verse node
    pub fn verse(&self, selector: &Selector) -> Result<&Arc<Verse>, TreeError> {
        let Selector::Verse { group, book, chapter, verse } = selector else {
            return Err(TreeError::NotAVerseSelector(selector.to_string()));
        };

        self.groups
            .get(group)
            .ok_or_else(|| TreeError::GroupNotFound(group.clone()))?
            .book(book)
            .ok_or_else(|| TreeError::BookNotFound {
                group: group.clone(),
                book: book.clone(),
            })?
            .chapter(*chapter)
            .ok_or_else(|| TreeError::ChapterNotFound {
                book: book.clone(),
                chapter: *chapter,
            })?
            .verse(*verse)
            .ok_or(TreeError::VerseNotFound {
                chapter: *chapter,
                verse: *verse,
            })
    }

    pub fn verse_alignment_state(
        &self,
        selector: &Selector,
        bridge: &dyn AlignmentBridge,
    ) -> Result<VerseAlignmentState, TreeError> {
        let verse = self.verse(selector)?;
        let source = verse.source_verse().ok_or(TreeError::NoSourceText)?;
        let target = verse.target_verse().ok_or(TreeError::NoTargetText)?;

        let (chapter, verse_num) = match selector {
            Selector::Verse { chapter, verse, .. } => (*chapter, *verse),
            _ => return Err(TreeError::NotAVerseSelector(selector.to_string())),
        };

        Ok(VerseAlignmentState {
            aligned: verse.state() != VerseState::Unaligned,
            source_language: bridge.source_language().to_string(),
            target_language: bridge.target_language().to_string(),
            reference: VerseReference {
                chapter,
                verse: verse_num,
            },
            aligner_data: bridge.aligner_data(source, target),
        })
    }

    /// Writes an alignment edit into the target verse at `selector`.
    /// Returns the collection unchanged when the verse or its target text
    /// is missing.
    pub fn update_alignment_state(
        &self,
        edit: &AlignmentEdit,
        selector: &Selector,
        bridge: &dyn AlignmentBridge,
    ) -> GroupCollection {
        let Selector::Verse { group, book, chapter, verse } = selector else {
            return self.clone();
        };
        let Ok(existing) = self.verse(selector) else {
            return self.clone();
        };
        let Some(merged) = existing
            .target_verse()
            .and_then(|target| bridge.merge_alignment_edit(target, edit))
        else {
            return self.clone();
        };

        let updated_verse = existing.add_target_usfm(merged, bridge);
        self.replace_verse(group, book, *chapter, *verse, updated_verse)
            .unwrap_or_else(|| self.clone())
    }

    fn replace_verse(
        &self,
        group_name: &str,
        book_name: &str,
        chapter_num: u32,
        verse_num: u32,
        verse: Verse,
    ) -> Option<GroupCollection> {
        let group = self.groups.get(group_name)?;
        let book = group.book(book_name)?;
        let chapter = book.chapter(chapter_num)?;

        let chapter = chapter.with_verse(verse_num, verse);
        let book = book.with_chapter(chapter_num, chapter);
        let group = group.with_book(book_name, book);

        let mut groups = self.groups.clone();
        groups.insert(group_name.to_string(), Arc::new(group));
        Some(GroupCollection { groups })
    }

    /// Writes one file per partially selected book, inside one folder per
    /// group. Numeric chapters and verses outside the selection are left
    /// out; front matter is kept.
    pub fn save_selected_resources_to_usfm_archive(
        &self,
        archive: &mut dyn ArchiveWriter,
        is_resource_partially_selected: &dyn Fn(&Selector) -> bool,
        codec: &dyn UsfmCodec,
    ) -> Result<ExportSummary> {
        let mut summary = ExportSummary::default();

        for (group_name, group) in &self.groups {
            if !is_resource_partially_selected(&Selector::group(group_name)) {
                continue;
            }
            let folder = sanitize_filename(group_name);
            let mut wrote_book = false;

            for (book_name, book) in group.books() {
                if !is_resource_partially_selected(&Selector::book(group_name, book_name)) {
                    continue;
                }

                let mut usfm_book = book.target_usfm_book();
                usfm_book.chapters.retain(|chapter_key, usfm_chapter| {
                    let Some(chapter_num) = parse_numeric_key(chapter_key) else {
                        return true;
                    };
                    if !is_resource_partially_selected(&Selector::chapter(group_name, book_name, chapter_num)) {
                        return false;
                    }
                    usfm_chapter.retain(|verse_key, _| match parse_numeric_key(verse_key) {
                        Some(verse_num) => is_resource_partially_selected(&Selector::verse(
                            group_name,
                            book_name,
                            chapter_num,
                            verse_num,
                        )),
                        None => true,
                    });
                    true
                });

                let filename = export_filename(book_name, book.filename());
                let contents = codec.serialize(&usfm_book);
                archive
                    .add_file(&folder, &filename, &contents)
                    .with_context(|| format!("Failed to write {} to archive", filename))?;

                summary.files.push(format!("{}/{}", folder, filename));
                summary.books += 1;
                wrote_book = true;
            }

            if wrote_book {
                summary.groups += 1;
            }
        }

        Ok(summary)
    }

    /// Drops every fully selected verse and prunes nodes left empty
    pub fn remove_selected_resources<P: ResourcePredicate + ?Sized>(&self, predicates: &P) -> GroupCollection {
        let mut groups = BTreeMap::new();

        for (group_name, group) in &self.groups {
            if !predicates.is_partially_selected(&Selector::group(group_name)) {
                groups.insert(group_name.clone(), Arc::clone(group));
                continue;
            }

            let remaining = group.remove_selected(predicates, group_name);
            if !remaining.is_empty() {
                groups.insert(group_name.clone(), Arc::new(remaining));
            }
        }

        GroupCollection { groups }
    }

    /// Folds every group into a single group called `new_group_name`
    pub fn merge_groups_under_name(&self, new_group_name: &str) -> GroupCollection {
        let merged = self
            .groups
            .values()
            .fold(Group::default(), |acc, group| acc.merge_with(group));

        let mut groups = BTreeMap::new();
        if !merged.is_empty() {
            groups.insert(new_group_name.to_string(), Arc::new(merged));
        }
        GroupCollection { groups }
    }

    /// Left-biased union of two collections
    pub fn merge_with(&self, other: &GroupCollection) -> GroupCollection {
        let mut groups = self.groups.clone();
        for (group_name, group) in &other.groups {
            let merged = match groups.get(group_name) {
                Some(existing) => Arc::new(existing.merge_with(group)),
                None => Arc::clone(group),
            };
            groups.insert(group_name.clone(), merged);
        }
        GroupCollection { groups }
    }

    /// Moves everything the predicates select into a group named
    /// `new_group_name`, merging into that group if it already exists
    pub fn rename_selected_groups<P: ResourcePredicate>(&self, new_group_name: &str, predicates: &P) -> GroupCollection {
        let without_selected = self.remove_selected_resources(predicates);
        let with_selected = self.remove_selected_resources(&Complement(predicates));
        let renamed_selected = with_selected.merge_groups_under_name(new_group_name);
        without_selected.merge_with(&renamed_selected)
    }

    /// Every verse with its selector, in tree order
    pub fn verses(&self) -> Vec<(Selector, &Arc<Verse>)> {
        let mut verses = Vec::new();
        for (group_name, group) in &self.groups {
            for (book_name, book) in group.books() {
                for (chapter_num, chapter) in book.chapters() {
                    for (verse_num, verse) in chapter.verses() {
                        verses.push((Selector::verse(group_name, book_name, *chapter_num, *verse_num), verse));
                    }
                }
            }
        }
        verses
    }

    /// Aligned verses as training material, or the verses held out for
    /// testing when `for_testing` is set
    pub fn alignment_data_for_training_or_testing(
        &self,
        for_testing: bool,
        bridge: &dyn AlignmentBridge,
    ) -> AlignmentBatch {
        let wanted = if for_testing {
            VerseState::AlignedTest
        } else {
            VerseState::AlignedTrain
        };

        let samples = self
            .verses()
            .into_iter()
            .filter(|(_, verse)| verse.state() == wanted)
            .filter_map(|(selector, verse)| {
                let source = verse.source_verse()?;
                let target = verse.target_verse()?;
                Some(AlignmentSample {
                    selector,
                    source_verse: bridge.verse_text(source),
                    target_verse: bridge.verse_text(target),
                    alignments: bridge.manual_alignments(source, target),
                })
            })
            .collect();

        AlignmentBatch { samples }
    }

    /// Stores each verse's test score. Scores for verses no longer in the
    /// tree are ignored.
    pub fn add_alignment_test_results(&self, results: &TestResults) -> GroupCollection {
        let scores: HashMap<&Selector, _> = results
            .test_results
            .iter()
            .map(|scored| (&scored.selector, scored.score))
            .collect();
        if scores.is_empty() {
            return self.clone();
        }

        let visit = |key: &Selector| scores.keys().any(|selector| key.is_prefix_of(selector));
        self.map_verses(&visit, &mut |selector, verse| match scores.get(selector) {
            Some(score) => Arc::new(verse.with_test_score(*score)),
            None => Arc::clone(verse),
        })
    }

    /// Flags or unflags every fully selected verse as held out for testing
    pub fn set_reserved_for_testing<P: ResourcePredicate + ?Sized>(
        &self,
        predicates: &P,
        reserved: bool,
        bridge: &dyn AlignmentBridge,
    ) -> GroupCollection {
        let visit = |key: &Selector| predicates.is_partially_selected(key);
        self.map_verses(&visit, &mut |selector, verse| {
            if predicates.is_selected(selector) && verse.reserved_for_testing() != reserved {
                Arc::new(verse.set_reserved_for_testing(reserved, bridge))
            } else {
                Arc::clone(verse)
            }
        })
    }

    fn map_verses(
        &self,
        visit: &dyn Fn(&Selector) -> bool,
        f: &mut dyn FnMut(&Selector, &Arc<Verse>) -> Arc<Verse>,
    ) -> GroupCollection {
        let groups = self
            .groups
            .iter()
            .map(|(group_name, group)| {
                if visit(&Selector::group(group_name)) {
                    (group_name.clone(), Arc::new(group.map_verses(group_name, visit, f)))
                } else {
                    (group_name.clone(), Arc::clone(group))
                }
            })
            .collect();
        GroupCollection { groups }
    }

    pub fn stats(&self) -> CorpusStats {
        let mut stats = CorpusStats {
            groups: self.groups.len(),
            ..Default::default()
        };
        for group in self.groups.values() {
            stats.books += group.books().len();
            for book in group.books().values() {
                stats.chapters += book.chapters().len();
            }
        }
        for (_, verse) in self.verses() {
            stats.verses += 1;
            *stats.states.entry(verse.state().to_string()).or_insert(0) += 1;
        }
        stats
    }

    pub fn list_headers(scope: ListScope) -> Vec<String> {
        Group::list_headers(scope)
    }

    pub fn list_rows(&self, scope: ListScope) -> Vec<ListRow> {
        self.groups
            .iter()
            .flat_map(|(group_name, group)| group.list_rows(group_name, scope))
            .collect()
    }

    /// Plain nested value for storage. Verse states are not stored.
    pub fn to_snapshot(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Rebuilds a collection from a snapshot, re-deriving every verse state
    pub fn from_snapshot(snapshot: Value, bridge: &dyn AlignmentBridge) -> serde_json::Result<GroupCollection> {
        let collection: GroupCollection = serde_json::from_value(snapshot)?;
        Ok(collection.map_verses(&|_| true, &mut |_, verse| {
            Arc::new(Verse::clone(verse).recompute(bridge))
        }))
    }
}

fn export_filename(book_name: &str, filename: &str) -> String {
    let name = sanitize_filename(filename);
    if filename.is_empty() || name == "untitled" {
        format!("{}.usfm", sanitize_filename(book_name))
    } else {
        name
    }
}
