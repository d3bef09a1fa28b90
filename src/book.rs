use crate::alignment::AlignmentBridge;
use crate::chapter::{Chapter, ListScope};
use crate::models::{ListRow, SourceImportCounts, UsfmBook, UsfmChapter, UsfmHeader};
use crate::selection::{ResourcePredicate, Selector};
use crate::usfm_shape::{only_numbers, parse_numeric_key};
use crate::verse::Verse;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One book of a group. Header lines and non-numeric chapter sections are
/// kept raw so the book can be written back out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Book {
    #[serde(default)]
    chapters: BTreeMap<u32, Arc<Chapter>>,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    toc3_name: String,
    #[serde(default)]
    headers: Vec<UsfmHeader>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    front: BTreeMap<String, UsfmChapter>,
}

impl Book {
    pub fn chapters(&self) -> &BTreeMap<u32, Arc<Chapter>> {
        &self.chapters
    }

    pub fn chapter(&self, chapter_num: u32) -> Option<&Arc<Chapter>> {
        self.chapters.get(&chapter_num)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn toc3_name(&self) -> &str {
        &self.toc3_name
    }

    pub fn headers(&self) -> &[UsfmHeader] {
        &self.headers
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn with_chapter(&self, chapter_num: u32, chapter: Chapter) -> Book {
        let mut chapters = self.chapters.clone();
        chapters.insert(chapter_num, Arc::new(chapter));
        Book {
            chapters,
            ..self.clone()
        }
    }

    pub fn add_target_usfm(&self, filename: &str, usfm_book: &UsfmBook, bridge: &dyn AlignmentBridge) -> Book {
        let mut chapters = self.chapters.clone();
        let mut front = self.front.clone();

        for (chapter_key, usfm_chapter) in &usfm_book.chapters {
            match parse_numeric_key(chapter_key) {
                Some(chapter_num) => {
                    let existing = chapters.get(&chapter_num).cloned().unwrap_or_default();
                    chapters.insert(
                        chapter_num,
                        Arc::new(existing.add_target_usfm(usfm_chapter, bridge)),
                    );
                }
                None => {
                    front.insert(chapter_key.clone(), usfm_chapter.clone());
                }
            }
        }

        Book {
            chapters,
            filename: filename.to_string(),
            toc3_name: usfm_book.toc3().unwrap_or_default(),
            headers: usfm_book.headers.clone(),
            front,
        }
    }

    /// Source text for chapters this book does not have is dropped whole
    pub fn add_source_usfm(
        &self,
        usfm_book: &UsfmBook,
        is_resource_selected: &dyn Fn(&Selector) -> bool,
        group_name: &str,
        book_name: &str,
        bridge: &dyn AlignmentBridge,
    ) -> (Book, SourceImportCounts) {
        let mut counts = SourceImportCounts::default();
        let mut chapters = self.chapters.clone();

        for (chapter_key, usfm_chapter) in &usfm_book.chapters {
            let Some(chapter_num) = parse_numeric_key(chapter_key) else {
                continue;
            };

            match self.chapters.get(&chapter_num) {
                Some(existing) => {
                    let (chapter, chapter_counts) = existing.add_source_usfm(
                        usfm_chapter,
                        is_resource_selected,
                        group_name,
                        book_name,
                        chapter_num,
                        bridge,
                    );
                    chapters.insert(chapter_num, Arc::new(chapter));
                    counts += chapter_counts;
                }
                None => {
                    counts.dropped_verse_count += only_numbers(usfm_chapter.keys()).len();
                }
            }
        }

        (
            Book {
                chapters,
                ..self.clone()
            },
            counts,
        )
    }

    /// Raw target book assembled from the headers, the stored non-numeric
    /// sections and every live chapter
    pub fn target_usfm_book(&self) -> UsfmBook {
        let mut chapters = self.front.clone();
        for (chapter_num, chapter) in &self.chapters {
            chapters.insert(chapter_num.to_string(), chapter.target_usfm());
        }
        UsfmBook {
            headers: self.headers.clone(),
            chapters,
        }
    }

    pub fn remove_selected<P: ResourcePredicate + ?Sized>(
        &self,
        predicates: &P,
        group_name: &str,
        book_name: &str,
    ) -> Book {
        let mut chapters = BTreeMap::new();

        for (chapter_num, chapter) in &self.chapters {
            let selector = Selector::chapter(group_name, book_name, *chapter_num);
            if predicates.is_selected(&selector) {
                continue;
            }
            if !predicates.is_partially_selected(&selector) {
                chapters.insert(*chapter_num, Arc::clone(chapter));
                continue;
            }

            let remaining = chapter.remove_selected(predicates, group_name, book_name, *chapter_num);
            if remaining.verses().len() == chapter.verses().len() {
                chapters.insert(*chapter_num, Arc::clone(chapter));
            } else if !remaining.is_empty() {
                chapters.insert(*chapter_num, Arc::new(remaining));
            }
        }

        Book {
            chapters,
            ..self.clone()
        }
    }

    /// Left-biased union. Filename, toc3 and headers come from the right
    /// side only when this side has none.
    pub fn merge_with(&self, other: &Book) -> Book {
        let mut chapters = self.chapters.clone();
        for (chapter_num, chapter) in &other.chapters {
            let merged = match chapters.get(chapter_num) {
                Some(existing) => Arc::new(existing.merge_with(chapter)),
                None => Arc::clone(chapter),
            };
            chapters.insert(*chapter_num, merged);
        }

        let mut front = self.front.clone();
        for (key, section) in &other.front {
            front.entry(key.clone()).or_insert_with(|| section.clone());
        }

        Book {
            chapters,
            filename: first_non_empty(&self.filename, &other.filename),
            toc3_name: first_non_empty(&self.toc3_name, &other.toc3_name),
            headers: if self.headers.is_empty() {
                other.headers.clone()
            } else {
                self.headers.clone()
            },
            front,
        }
    }

    pub(crate) fn map_verses(
        &self,
        group_name: &str,
        book_name: &str,
        visit: &dyn Fn(&Selector) -> bool,
        f: &mut dyn FnMut(&Selector, &Arc<Verse>) -> Arc<Verse>,
    ) -> Book {
        let chapters = self
            .chapters
            .iter()
            .map(|(chapter_num, chapter)| {
                let selector = Selector::chapter(group_name, book_name, *chapter_num);
                if visit(&selector) {
                    let mapped = chapter.map_verses(group_name, book_name, *chapter_num, f);
                    (*chapter_num, Arc::new(mapped))
                } else {
                    (*chapter_num, Arc::clone(chapter))
                }
            })
            .collect();

        Book {
            chapters,
            ..self.clone()
        }
    }

    pub fn list_headers(scope: ListScope) -> Vec<String> {
        if scope == ListScope::Book {
            return vec!["Book".to_string(), "Chapters".to_string()];
        }
        let mut headers = vec!["Book".to_string()];
        headers.extend(Chapter::list_headers(scope));
        headers
    }

    pub fn list_rows(&self, book_name: &str, scope: ListScope) -> Vec<ListRow> {
        if scope == ListScope::Book {
            return vec![ListRow {
                data: vec![book_name.to_string(), self.chapters.len().to_string()],
                keys: vec![book_name.to_string()],
            }];
        }
        self.chapters
            .iter()
            .flat_map(|(chapter_num, chapter)| chapter.list_rows(*chapter_num, scope))
            .map(|row| ListRow {
                data: std::iter::once(book_name.to_string()).chain(row.data).collect(),
                keys: std::iter::once(book_name.to_string()).chain(row.keys).collect(),
            })
            .collect()
    }
}

fn first_non_empty(left: &str, right: &str) -> String {
    let chosen = if left.is_empty() { right } else { left };
    chosen.to_string()
}
