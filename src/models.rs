use crate::selection::Selector;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw USFM structures as produced by the codec

/// One `\tag content` line from the book header section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UsfmHeader {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub content: String,
}

/// Verse payloads of one chapter keyed by the raw verse key ("1", "front", "3-4")
pub type UsfmChapter = BTreeMap<String, Value>;

/// Parsed book: header lines plus chapters keyed by the raw chapter key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UsfmBook {
    #[serde(default)]
    pub headers: Vec<UsfmHeader>,
    #[serde(default)]
    pub chapters: BTreeMap<String, UsfmChapter>,
}

/// Parsed books of one import batch keyed by source filename
pub type ParsedBooks = BTreeMap<String, UsfmBook>;

impl UsfmBook {
    /// Canonical book name (`h` header)
    pub fn book_name(&self) -> Option<String> {
        crate::usfm_shape::parse_usfm_headers(&self.headers).remove("h")
    }

    /// Cross-translation book id (`toc3` header)
    pub fn toc3(&self) -> Option<String> {
        crate::usfm_shape::parse_usfm_headers(&self.headers).remove("toc3")
    }
}

/// Alignment bridge structures

/// A word as the aligner sees it. Source words carry lexical data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AlignerWord {
    pub word: String,
    pub occurrence: u32,
    pub occurrences: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morph: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strong: Option<String>,
}

impl AlignerWord {
    pub fn new(word: &str, occurrence: u32, occurrences: u32) -> Self {
        AlignerWord {
            word: word.to_string(),
            occurrence,
            occurrences,
            ..Default::default()
        }
    }

    /// Identity of a word inside one verse
    pub fn same_token(&self, other: &AlignerWord) -> bool {
        self.word == other.word && self.occurrence == other.occurrence
    }
}

/// Source words (top) linked to target words (bottom)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WordAlignment {
    pub top_words: Vec<AlignerWord>,
    pub bottom_words: Vec<AlignerWord>,
}

/// Data handed to an aligner UI: unaligned target words and current links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlignerData {
    pub word_bank: Vec<AlignerWord>,
    pub alignments: Vec<WordAlignment>,
}

/// Result of an alignment editing session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentEdit {
    pub target_words: Vec<AlignerWord>,
    pub verse_alignments: Vec<WordAlignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VerseReference {
    pub chapter: u32,
    pub verse: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerseAlignmentState {
    pub aligned: bool,
    pub source_language: String,
    pub target_language: String,
    pub reference: VerseReference,
    pub aligner_data: AlignerData,
}

/// Training and testing exchange

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceTargetAlignment {
    pub source_ngram: Vec<String>,
    pub target_ngram: Vec<String>,
}

/// One verse worth of training or testing material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentSample {
    pub selector: Selector,
    pub source_verse: String,
    pub target_verse: String,
    pub alignments: Vec<SourceTargetAlignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentBatch {
    pub samples: Vec<AlignmentSample>,
}

impl AlignmentBatch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestScore {
    pub num_manual_mappings: usize,
    pub num_suggested_mappings: usize,
    pub num_correct_mappings: usize,
    pub ratio_correct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredVerse {
    pub selector: Selector,
    pub score: TestScore,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResults {
    pub test_results: Vec<ScoredVerse>,
    pub average_ratio_correct: f64,
}

impl TestResults {
    /// Averages `ratio_correct` over the scored verses
    pub fn from_scores(test_results: Vec<ScoredVerse>) -> Self {
        let average_ratio_correct = if test_results.is_empty() {
            0.0
        } else {
            test_results.iter().map(|s| s.score.ratio_correct).sum::<f64>()
                / test_results.len() as f64
        };
        TestResults {
            test_results,
            average_ratio_correct,
        }
    }
}

/// Corpus statistics

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CorpusStats {
    pub groups: usize,
    pub books: usize,
    pub chapters: usize,
    pub verses: usize,
    pub states: BTreeMap<String, usize>,
}

/// Counts reported by a source import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceImportCounts {
    pub added_verse_count: usize,
    pub dropped_verse_count: usize,
}

impl std::ops::AddAssign for SourceImportCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.added_verse_count += rhs.added_verse_count;
        self.dropped_verse_count += rhs.dropped_verse_count;
    }
}

/// What an export wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub groups: usize,
    pub books: usize,
    pub files: Vec<String>,
}

/// List view row: display columns plus the selector keys of the row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub data: Vec<String>,
    pub keys: Vec<String>,
}
