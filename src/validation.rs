use crate::models::{ParsedBooks, UsfmBook, UsfmChapter};
use crate::usfm_shape::{parse_numeric_key, parse_usfm_headers};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub statistics: ImportStatistics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub severity: String,
    pub message: String,
    pub context: ValidationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub message: String,
    pub context: ValidationContext,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationContext {
    pub filename: Option<String>,
    pub book: Option<String>,
    pub chapter: Option<String>,
    pub verse: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatistics {
    pub total_books: usize,
    pub total_chapters: usize,
    pub total_verses: usize,
    /// Keys such as "3-4" that name a verse range
    pub verse_spans: usize,
    /// Any other non-numeric chapter or verse key ("front")
    pub front_matter_sections: usize,
    pub missing_verses: usize,
}

/// Checks parsed books before they are imported into the tree
pub struct InputValidator {
    verse_span_pattern: Regex,
}

impl InputValidator {
    pub fn new() -> Result<Self> {
        Ok(InputValidator {
            verse_span_pattern: Regex::new(r"^\d+-\d+$").context("Failed to compile verse span pattern")?,
        })
    }

    pub fn validate_books(&self, parsed_books: &ParsedBooks) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut statistics = ImportStatistics {
            total_books: parsed_books.len(),
            ..Default::default()
        };
        let mut seen_names: HashMap<String, &str> = HashMap::new();

        for (filename, book) in parsed_books {
            let headers = parse_usfm_headers(&book.headers);
            let context = ValidationContext {
                filename: Some(filename.clone()),
                book: headers.get("h").cloned(),
                ..Default::default()
            };

            match headers.get("h") {
                None => errors.push(ValidationError {
                    severity: "error".to_string(),
                    message: format!("Book in {} has no \\h header", filename),
                    context: context.clone(),
                }),
                Some(name) => {
                    if let Some(previous) = seen_names.insert(name.clone(), filename) {
                        warnings.push(ValidationWarning {
                            message: format!(
                                "Book '{}' appears in both {} and {}; the later file wins",
                                name, previous, filename
                            ),
                            context: context.clone(),
                        });
                    }
                }
            }

            if !headers.contains_key("toc3") {
                warnings.push(ValidationWarning {
                    message: format!("Book in {} has no \\toc3 header and cannot receive source text", filename),
                    context: context.clone(),
                });
            }

            self.validate_chapters(book, &context, &mut warnings, &mut statistics);
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            statistics,
        }
    }

    fn validate_chapters(
        &self,
        book: &UsfmBook,
        context: &ValidationContext,
        warnings: &mut Vec<ValidationWarning>,
        statistics: &mut ImportStatistics,
    ) {
        for (chapter_key, chapter) in &book.chapters {
            if parse_numeric_key(chapter_key).is_none() {
                statistics.front_matter_sections += 1;
                continue;
            }
            statistics.total_chapters += 1;

            for (verse_key, verse) in chapter {
                if parse_numeric_key(verse_key).is_some() {
                    statistics.total_verses += 1;
                } else if self.verse_span_pattern.is_match(verse_key) {
                    statistics.verse_spans += 1;
                } else {
                    statistics.front_matter_sections += 1;
                }

                if !verse.get("verseObjects").map_or(false, |v| v.is_array()) {
                    warnings.push(ValidationWarning {
                        message: format!("Verse {}:{} has no verseObjects", chapter_key, verse_key),
                        context: ValidationContext {
                            chapter: Some(chapter_key.clone()),
                            verse: Some(verse_key.clone()),
                            ..context.clone()
                        },
                    });
                }
            }

            statistics.missing_verses += self.detect_missing_verses(chapter);
        }
    }

    /// Gaps in the numeric verse sequence of a chapter. Verses covered by a
    /// span key are not missing.
    pub fn detect_missing_verses(&self, chapter: &UsfmChapter) -> usize {
        let mut present = BTreeSet::new();
        for key in chapter.keys() {
            if let Some(number) = parse_numeric_key(key) {
                present.insert(number);
            } else if self.verse_span_pattern.is_match(key) {
                let bounds: Vec<u32> = key.split('-').filter_map(|n| n.parse().ok()).collect();
                if let [start, end] = bounds[..] {
                    present.extend(start..=end);
                }
            }
        }

        match present.iter().next_back() {
            Some(&last) => (1..=last).filter(|n| !present.contains(n)).count(),
            None => 0,
        }
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new().expect("Failed to create InputValidator")
    }
}
