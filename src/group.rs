use crate::alignment::AlignmentBridge;
use crate::book::Book;
use crate::chapter::ListScope;
use crate::models::{ListRow, ParsedBooks, SourceImportCounts, UsfmBook};
use crate::selection::{ResourcePredicate, Selector};
use crate::usfm_shape::count_numeric_verses;
use crate::verse::Verse;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Books of one translation keyed by their `h` header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Group {
    #[serde(default)]
    books: BTreeMap<String, Arc<Book>>,
}

impl Group {
    pub fn new(books: BTreeMap<String, Arc<Book>>) -> Self {
        Group { books }
    }

    pub fn books(&self) -> &BTreeMap<String, Arc<Book>> {
        &self.books
    }

    pub fn book(&self, book_name: &str) -> Option<&Arc<Book>> {
        self.books.get(book_name)
    }

    pub fn has_book(&self, book_name: &str) -> bool {
        self.books.contains_key(book_name)
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn with_book(&self, book_name: &str, book: Book) -> Group {
        let mut books = self.books.clone();
        books.insert(book_name.to_string(), Arc::new(book));
        Group { books }
    }

    pub fn add_target_usfm(&self, parsed_books: &ParsedBooks, bridge: &dyn AlignmentBridge) -> Group {
        let mut books = self.books.clone();

        for (filename, usfm_book) in parsed_books {
            let book_name = book_key(filename, usfm_book);
            let existing = books.get(&book_name).cloned().unwrap_or_default();
            books.insert(
                book_name,
                Arc::new(existing.add_target_usfm(filename, usfm_book, bridge)),
            );
        }

        Group { books }
    }

    /// Attaches source text to every book of this group whose toc3 matches.
    /// Incoming books with no match count all their verses as dropped.
    pub fn add_source_usfm(
        &self,
        parsed_books: &ParsedBooks,
        is_resource_selected: &dyn Fn(&Selector) -> bool,
        group_name: &str,
        bridge: &dyn AlignmentBridge,
    ) -> (Group, SourceImportCounts) {
        let mut counts = SourceImportCounts::default();
        let mut books = self.books.clone();

        let by_toc3: BTreeMap<&str, &str> = self
            .books
            .iter()
            .filter(|(_, book)| !book.toc3_name().is_empty())
            .map(|(name, book)| (book.toc3_name(), name.as_str()))
            .collect();

        for usfm_book in parsed_books.values() {
            let matched = usfm_book
                .toc3()
                .and_then(|toc3| by_toc3.get(toc3.as_str()).copied());

            match matched {
                Some(book_name) => {
                    let existing = &self.books[book_name];
                    let (book, book_counts) =
                        existing.add_source_usfm(usfm_book, is_resource_selected, group_name, book_name, bridge);
                    books.insert(book_name.to_string(), Arc::new(book));
                    counts += book_counts;
                }
                None => {
                    counts.dropped_verse_count += count_numeric_verses(usfm_book);
                }
            }
        }

        (Group { books }, counts)
    }

    pub fn remove_selected<P: ResourcePredicate + ?Sized>(&self, predicates: &P, group_name: &str) -> Group {
        let mut books = BTreeMap::new();

        for (book_name, book) in &self.books {
            if !predicates.is_partially_selected(&Selector::book(group_name, book_name)) {
                books.insert(book_name.clone(), Arc::clone(book));
                continue;
            }

            let remaining = book.remove_selected(predicates, group_name, book_name);
            if !remaining.is_empty() {
                books.insert(book_name.clone(), Arc::new(remaining));
            }
        }

        Group { books }
    }

    /// Left-biased union of books, colliding books merged recursively
    pub fn merge_with(&self, other: &Group) -> Group {
        let mut books = self.books.clone();
        for (book_name, book) in &other.books {
            let merged = match books.get(book_name) {
                Some(existing) => Arc::new(existing.merge_with(book)),
                None => Arc::clone(book),
            };
            books.insert(book_name.clone(), merged);
        }
        Group { books }
    }

    pub(crate) fn map_verses(
        &self,
        group_name: &str,
        visit: &dyn Fn(&Selector) -> bool,
        f: &mut dyn FnMut(&Selector, &Arc<Verse>) -> Arc<Verse>,
    ) -> Group {
        let books = self
            .books
            .iter()
            .map(|(book_name, book)| {
                if visit(&Selector::book(group_name, book_name)) {
                    let mapped = book.map_verses(group_name, book_name, visit, f);
                    (book_name.clone(), Arc::new(mapped))
                } else {
                    (book_name.clone(), Arc::clone(book))
                }
            })
            .collect();

        Group { books }
    }

    pub fn list_headers(scope: ListScope) -> Vec<String> {
        if scope == ListScope::Group {
            return vec!["Group".to_string(), "Books".to_string()];
        }
        let mut headers = vec!["Group".to_string()];
        headers.extend(Book::list_headers(scope));
        headers
    }

    pub fn list_rows(&self, group_name: &str, scope: ListScope) -> Vec<ListRow> {
        if scope == ListScope::Group {
            return vec![ListRow {
                data: vec![group_name.to_string(), self.books.len().to_string()],
                keys: vec![group_name.to_string()],
            }];
        }
        self.books
            .iter()
            .flat_map(|(book_name, book)| book.list_rows(book_name, scope))
            .map(|row| ListRow {
                data: std::iter::once(group_name.to_string()).chain(row.data).collect(),
                keys: std::iter::once(group_name.to_string()).chain(row.keys).collect(),
            })
            .collect()
    }
}

/// Key a parsed book is stored under: its `h` header, else the filename
pub fn book_key(filename: &str, usfm_book: &UsfmBook) -> String {
    usfm_book.book_name().unwrap_or_else(|| filename.to_string())
}
