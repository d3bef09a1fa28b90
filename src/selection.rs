//! Path selectors and the selection algebra.
//!
//! A [`Selector`] addresses a node of the corpus tree by path prefix:
//! `[group, book, chapter, verse]` with any number of trailing components
//! left off. Selecting a coarse node covers every descendant.

use crate::usfm_shape::parse_numeric_key;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Selector {
    All,
    Group {
        group: String,
    },
    Book {
        group: String,
        book: String,
    },
    Chapter {
        group: String,
        book: String,
        chapter: u32,
    },
    Verse {
        group: String,
        book: String,
        chapter: u32,
        verse: u32,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("selector has {0} components, at most 4 are allowed")]
    TooDeep(usize),
    #[error("selector component '{0}' is not a chapter or verse number")]
    NotNumeric(String),
}

impl Selector {
    pub fn group(group: &str) -> Self {
        Selector::Group {
            group: group.to_string(),
        }
    }

    pub fn book(group: &str, book: &str) -> Self {
        Selector::Book {
            group: group.to_string(),
            book: book.to_string(),
        }
    }

    pub fn chapter(group: &str, book: &str, chapter: u32) -> Self {
        Selector::Chapter {
            group: group.to_string(),
            book: book.to_string(),
            chapter,
        }
    }

    pub fn verse(group: &str, book: &str, chapter: u32, verse: u32) -> Self {
        Selector::Verse {
            group: group.to_string(),
            book: book.to_string(),
            chapter,
            verse,
        }
    }

    /// Builds a selector from the string-array contract. Chapter and verse
    /// components must be plain numbers.
    pub fn from_components<S: AsRef<str>>(components: &[S]) -> Result<Self, SelectorError> {
        let number = |s: &S| {
            parse_numeric_key(s.as_ref())
                .ok_or_else(|| SelectorError::NotNumeric(s.as_ref().to_string()))
        };
        Ok(match components {
            [] => Selector::All,
            [g] => Selector::group(g.as_ref()),
            [g, b] => Selector::book(g.as_ref(), b.as_ref()),
            [g, b, c] => Selector::chapter(g.as_ref(), b.as_ref(), number(c)?),
            [g, b, c, v] => Selector::verse(g.as_ref(), b.as_ref(), number(c)?, number(v)?),
            _ => return Err(SelectorError::TooDeep(components.len())),
        })
    }

    pub fn components(&self) -> Vec<String> {
        match self {
            Selector::All => vec![],
            Selector::Group { group } => vec![group.clone()],
            Selector::Book { group, book } => vec![group.clone(), book.clone()],
            Selector::Chapter {
                group,
                book,
                chapter,
            } => vec![group.clone(), book.clone(), chapter.to_string()],
            Selector::Verse {
                group,
                book,
                chapter,
                verse,
            } => vec![
                group.clone(),
                book.clone(),
                chapter.to_string(),
                verse.to_string(),
            ],
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Selector::All => 0,
            Selector::Group { .. } => 1,
            Selector::Book { .. } => 2,
            Selector::Chapter { .. } => 3,
            Selector::Verse { .. } => 4,
        }
    }

    /// The ancestor of this selector at `depth`, or itself when already
    /// that shallow.
    pub fn truncate(&self, depth: usize) -> Selector {
        if depth >= self.depth() {
            return self.clone();
        }
        match (self, depth) {
            (_, 0) => Selector::All,
            (
                Selector::Book { group, .. }
                | Selector::Chapter { group, .. }
                | Selector::Verse { group, .. },
                1,
            ) => Selector::group(group),
            (
                Selector::Chapter { group, book, .. } | Selector::Verse { group, book, .. },
                2,
            ) => Selector::book(group, book),
            (
                Selector::Verse {
                    group,
                    book,
                    chapter,
                    ..
                },
                _,
            ) => Selector::chapter(group, book, *chapter),
            _ => self.clone(),
        }
    }

    /// True when every component of `self` equals the matching component of
    /// `other` (equal selectors are prefixes of each other).
    pub fn is_prefix_of(&self, other: &Selector) -> bool {
        self.depth() <= other.depth() && other.truncate(self.depth()) == *self
    }

    pub fn group_name(&self) -> Option<&str> {
        match self {
            Selector::All => None,
            Selector::Group { group }
            | Selector::Book { group, .. }
            | Selector::Chapter { group, .. }
            | Selector::Verse { group, .. } => Some(group),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Selector::All = self {
            return write!(f, "*");
        }
        write!(f, "{}", self.components().join(" / "))
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.components().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let components = Vec::<String>::deserialize(deserializer)?;
        Selector::from_components(&components).map_err(serde::de::Error::custom)
    }
}

/// The two predicates every selection-filtered operation runs on
pub trait ResourcePredicate {
    /// Some selector covers `key` entirely
    fn is_selected(&self, key: &Selector) -> bool;

    /// Some selector lies on the path to, at, or below `key`
    fn is_partially_selected(&self, key: &Selector) -> bool;
}

/// The caller's current selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    selected: Vec<Selector>,
}

impl Selection {
    pub fn new(selected: Vec<Selector>) -> Self {
        Selection { selected }
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_fully_selected(&self, key: &Selector) -> bool {
        self.selected.iter().any(|s| s.is_prefix_of(key))
    }

    pub fn is_partially_selected(&self, key: &Selector) -> bool {
        self.selected
            .iter()
            .any(|s| s.is_prefix_of(key) || key.is_prefix_of(s))
    }

    /// Adds the selector, or removes it when already present
    pub fn toggle(&mut self, selector: Selector) {
        if let Some(pos) = self.selected.iter().position(|s| *s == selector) {
            self.selected.remove(pos);
        } else {
            self.selected.push(selector);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }
}

impl ResourcePredicate for Selection {
    fn is_selected(&self, key: &Selector) -> bool {
        self.is_fully_selected(key)
    }

    fn is_partially_selected(&self, key: &Selector) -> bool {
        Selection::is_partially_selected(self, key)
    }
}

impl<P: ResourcePredicate + ?Sized> ResourcePredicate for &P {
    fn is_selected(&self, key: &Selector) -> bool {
        (**self).is_selected(key)
    }

    fn is_partially_selected(&self, key: &Selector) -> bool {
        (**self).is_partially_selected(key)
    }
}

/// Inverts a predicate pair so that removal keeps exactly what the inner
/// predicates select. A subtree is walked unless it is fully selected, and a
/// node is dropped outright only when nothing in it is selected.
pub struct Complement<P>(pub P);

impl<P: ResourcePredicate> ResourcePredicate for Complement<P> {
    fn is_selected(&self, key: &Selector) -> bool {
        !self.0.is_partially_selected(key)
    }

    fn is_partially_selected(&self, key: &Selector) -> bool {
        !self.0.is_selected(key)
    }
}
