use crate::alignment::AlignmentBridge;
use crate::models::{ListRow, SourceImportCounts, UsfmChapter};
use crate::selection::{ResourcePredicate, Selector};
use crate::usfm_shape::parse_numeric_key;
use crate::verse::Verse;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Verses of one chapter. Raw entries whose key is not a verse number
/// (chapter front matter, verse spans) are kept alongside for export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Chapter {
    #[serde(default)]
    verses: BTreeMap<u32, Arc<Verse>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    front: UsfmChapter,
}

impl Chapter {
    pub fn new(verses: BTreeMap<u32, Arc<Verse>>) -> Self {
        Chapter {
            verses,
            front: UsfmChapter::new(),
        }
    }

    pub fn verses(&self) -> &BTreeMap<u32, Arc<Verse>> {
        &self.verses
    }

    pub fn verse(&self, verse_num: u32) -> Option<&Arc<Verse>> {
        self.verses.get(&verse_num)
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }

    /// Copy of this chapter with one verse replaced
    pub fn with_verse(&self, verse_num: u32, verse: Verse) -> Chapter {
        let mut verses = self.verses.clone();
        verses.insert(verse_num, Arc::new(verse));
        Chapter {
            verses,
            front: self.front.clone(),
        }
    }

    pub fn add_target_usfm(&self, usfm_chapter: &UsfmChapter, bridge: &dyn AlignmentBridge) -> Chapter {
        let mut verses = self.verses.clone();
        let mut front = self.front.clone();

        for (verse_key, usfm_verse) in usfm_chapter {
            match parse_numeric_key(verse_key) {
                Some(verse_num) => {
                    let existing = verses.get(&verse_num).cloned().unwrap_or_default();
                    verses.insert(
                        verse_num,
                        Arc::new(existing.add_target_usfm(usfm_verse.clone(), bridge)),
                    );
                }
                None => {
                    front.insert(verse_key.clone(), usfm_verse.clone());
                }
            }
        }

        Chapter { verses, front }
    }

    /// Attaches source verses to existing verses at selected locations.
    /// Every numeric incoming verse either counts as added or as dropped.
    pub fn add_source_usfm(
        &self,
        usfm_chapter: &UsfmChapter,
        is_resource_selected: &dyn Fn(&Selector) -> bool,
        group_name: &str,
        book_name: &str,
        chapter_num: u32,
        bridge: &dyn AlignmentBridge,
    ) -> (Chapter, SourceImportCounts) {
        let mut counts = SourceImportCounts::default();
        let mut verses = self.verses.clone();

        for (verse_key, usfm_verse) in usfm_chapter {
            let Some(verse_num) = parse_numeric_key(verse_key) else {
                continue;
            };
            let selector = Selector::verse(group_name, book_name, chapter_num, verse_num);

            match self.verses.get(&verse_num) {
                Some(existing) if is_resource_selected(&selector) => {
                    verses.insert(
                        verse_num,
                        Arc::new(existing.add_source_usfm(usfm_verse.clone(), bridge)),
                    );
                    counts.added_verse_count += 1;
                }
                _ => counts.dropped_verse_count += 1,
            }
        }

        (
            Chapter {
                verses,
                front: self.front.clone(),
            },
            counts,
        )
    }

    /// Raw target chapter: front matter plus every verse with a target payload
    pub fn target_usfm(&self) -> UsfmChapter {
        let mut raw = self.front.clone();
        for (verse_num, verse) in &self.verses {
            if let Some(target) = verse.target_verse() {
                raw.insert(verse_num.to_string(), target.clone());
            }
        }
        raw
    }

    pub fn source_usfm(&self) -> UsfmChapter {
        self.verses
            .iter()
            .filter_map(|(verse_num, verse)| {
                verse
                    .source_verse()
                    .map(|source| (verse_num.to_string(), source.clone()))
            })
            .collect()
    }

    /// Drops every fully selected verse
    pub fn remove_selected<P: ResourcePredicate + ?Sized>(
        &self,
        predicates: &P,
        group_name: &str,
        book_name: &str,
        chapter_num: u32,
    ) -> Chapter {
        let verses = self
            .verses
            .iter()
            .filter(|(verse_num, _)| {
                !predicates.is_selected(&Selector::verse(group_name, book_name, chapter_num, **verse_num))
            })
            .map(|(verse_num, verse)| (*verse_num, Arc::clone(verse)))
            .collect();

        Chapter {
            verses,
            front: self.front.clone(),
        }
    }

    /// Left-biased union: verses present on both sides keep this side's verse
    pub fn merge_with(&self, other: &Chapter) -> Chapter {
        let mut verses = self.verses.clone();
        for (verse_num, verse) in &other.verses {
            verses.entry(*verse_num).or_insert_with(|| Arc::clone(verse));
        }

        let mut front = self.front.clone();
        for (key, value) in &other.front {
            front.entry(key.clone()).or_insert_with(|| value.clone());
        }

        Chapter { verses, front }
    }

    /// Rebuilds the chapter with every verse passed through `f`
    pub(crate) fn map_verses(
        &self,
        group_name: &str,
        book_name: &str,
        chapter_num: u32,
        f: &mut dyn FnMut(&Selector, &Arc<Verse>) -> Arc<Verse>,
    ) -> Chapter {
        Chapter {
            verses: self
                .verses
                .iter()
                .map(|(verse_num, verse)| {
                    let selector = Selector::verse(group_name, book_name, chapter_num, *verse_num);
                    (*verse_num, f(&selector, verse))
                })
                .collect(),
            front: self.front.clone(),
        }
    }

    pub fn list_headers(scope: ListScope) -> Vec<String> {
        if scope == ListScope::Chapter {
            return vec!["Chapter".to_string(), "Verses".to_string()];
        }
        let mut headers = vec!["Chapter".to_string()];
        headers.extend(Verse::list_headers());
        headers
    }

    pub fn list_rows(&self, chapter_num: u32, scope: ListScope) -> Vec<ListRow> {
        if scope == ListScope::Chapter {
            return vec![ListRow {
                data: vec![chapter_num.to_string(), self.verses.len().to_string()],
                keys: vec![chapter_num.to_string()],
            }];
        }
        self.verses
            .iter()
            .map(|(verse_num, verse)| {
                let (data, keys) = verse.list_row(*verse_num);
                ListRow {
                    data: std::iter::once(chapter_num.to_string()).chain(data).collect(),
                    keys: std::iter::once(chapter_num.to_string()).chain(keys).collect(),
                }
            })
            .collect()
    }
}

/// Granularity of list view rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListScope {
    Group,
    Book,
    Chapter,
    Verse,
}

impl std::str::FromStr for ListScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "group" => Ok(ListScope::Group),
            "book" => Ok(ListScope::Book),
            "chapter" => Ok(ListScope::Chapter),
            "verse" => Ok(ListScope::Verse),
            other => Err(format!("Unknown list scope: {}", other)),
        }
    }
}
