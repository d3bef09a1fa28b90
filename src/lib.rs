pub mod alignment;
pub mod book;
pub mod chapter;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod group;
pub mod group_collection;
pub mod logger;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod schema;
#[cfg(test)]
mod security_tests;
pub mod selection;
pub mod store;
pub mod tokenizer;
#[cfg(test)]
mod tree_tests;
pub mod usfm_shape;
pub mod validation;
pub mod verse;
pub mod worker;

pub use error::TreeError;
pub use group_collection::{GroupCollection, SourceImportResult};
pub use selection::{ResourcePredicate, Selection, Selector};
pub use verse::{Verse, VerseState};
