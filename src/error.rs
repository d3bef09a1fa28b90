use thiserror::Error;

/// Errors raised when a selector is used to reach a single verse
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("selector must address a single verse, got '{0}'")]
    NotAVerseSelector(String),
    #[error("group '{0}' not found")]
    GroupNotFound(String),
    #[error("book '{book}' not found in group '{group}'")]
    BookNotFound { group: String, book: String },
    #[error("chapter {chapter} not found in book '{book}'")]
    ChapterNotFound { book: String, chapter: u32 },
    #[error("verse {verse} not found in chapter {chapter}")]
    VerseNotFound { chapter: u32, verse: u32 },
    #[error("No source text in verse")]
    NoSourceText,
    #[error("No target text in verse")]
    NoTargetText,
}
