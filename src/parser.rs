use crate::models::{UsfmBook, UsfmChapter, UsfmHeader};
use crate::usfm_shape::usfm_key_order;
use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{json, Map, Value};

/// Converts between USFM text and the parsed book shape
pub trait UsfmCodec {
    fn parse(&self, text: &str) -> Result<UsfmBook>;

    fn serialize(&self, book: &UsfmBook) -> String;
}

/// Character markers written inline; every other opening marker starts a line
const INLINE_MARKERS: &[&str] = &[
    "add", "bd", "bk", "em", "f", "fk", "fq", "fqa", "fr", "ft", "fv", "it", "k", "nd", "qs", "sc",
    "tl", "wj", "x", "xo", "xt",
];

const WORD_ATTRIBUTES: &[(&str, &str)] = &[
    ("lemma", "lemma"),
    ("strong", "strong"),
    ("morph", "x-morph"),
    ("occurrence", "x-occurrence"),
    ("occurrences", "x-occurrences"),
];

const ALIGNMENT_ATTRIBUTES: &[(&str, &str)] = &[
    ("strong", "x-strong"),
    ("lemma", "x-lemma"),
    ("morph", "x-morph"),
    ("occurrence", "x-occurrence"),
    ("occurrences", "x-occurrences"),
    ("content", "x-content"),
];

/// Object keys that are structure rather than attributes
const STRUCTURAL_KEYS: &[&str] = &["type", "tag", "text", "children", "endTag"];

const ALIGNMENT_END_TAG: &str = "zaln-e\\*";

pub struct UsfmTextCodec {
    token_pattern: Regex,
    attribute_pattern: Regex,
}

impl UsfmTextCodec {
    pub fn new() -> Result<Self> {
        Ok(UsfmTextCodec {
            token_pattern: Regex::new(
                r"(?x)
                  \\c\s+(?P<chapter>\S+)\s*
                | \\v\s+(?P<verse>\S+)[\ ]?
                | \\w\s+(?P<word>[^|\\]*)(?:\|(?P<word_attrs>[^\\]*))?\\w\*
                | \\(?P<milestone>[A-Za-z][A-Za-z0-9-]*)\s*(?:\|(?P<milestone_attrs>[^\\]*))?\\\*
                | \\(?P<marker>\+?[A-Za-z][A-Za-z0-9-]*)(?P<closing>\*)?[\ ]?
                ",
            )
            .context("Failed to compile USFM token pattern")?,
            attribute_pattern: Regex::new(r#"([A-Za-z0-9-]+)\s*=\s*"([^"]*)""#)
                .context("Failed to compile USFM attribute pattern")?,
        })
    }

    /// `x-occurrence="1" lemma="λόγος"` -> {"occurrence": "1", "lemma": "λόγος"}
    fn parse_attributes(&self, raw: &str, into: &mut Map<String, Value>) {
        for caps in self.attribute_pattern.captures_iter(raw) {
            let name = caps[1].trim_start_matches("x-").to_string();
            into.insert(name, json!(caps[2].to_string()));
        }
    }
}

impl Default for UsfmTextCodec {
    fn default() -> Self {
        Self::new().expect("Failed to create default UsfmTextCodec")
    }
}

impl UsfmCodec for UsfmTextCodec {
    fn parse(&self, text: &str) -> Result<UsfmBook> {
        let mut builder = BookBuilder::default();
        let mut position = 0;

        for caps in self.token_pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            builder.text(&text[position..whole.start()]);
            position = whole.end();

            if let Some(chapter) = caps.name("chapter") {
                builder.start_chapter(chapter.as_str());
            } else if let Some(verse) = caps.name("verse") {
                builder.start_verse(verse.as_str());
            } else if let Some(word) = caps.name("word") {
                let mut object = Map::new();
                object.insert("type".to_string(), json!("word"));
                object.insert("tag".to_string(), json!("w"));
                object.insert("text".to_string(), json!(word.as_str().trim()));
                if let Some(attrs) = caps.name("word_attrs") {
                    self.parse_attributes(attrs.as_str(), &mut object);
                }
                builder.push(Value::Object(object));
            } else if let Some(milestone) = caps.name("milestone") {
                let mut attributes = Map::new();
                if let Some(attrs) = caps.name("milestone_attrs") {
                    self.parse_attributes(attrs.as_str(), &mut attributes);
                }
                match milestone.as_str() {
                    "zaln-s" => builder.open_alignment(attributes),
                    "zaln-e" => builder.close_alignment(),
                    tag => {
                        let mut object = attributes;
                        object.insert("type".to_string(), json!("milestone"));
                        object.insert("tag".to_string(), json!(tag));
                        builder.push(Value::Object(object));
                    }
                }
            } else if let Some(marker) = caps.name("marker") {
                builder.marker(marker.as_str(), caps.name("closing").is_some());
            }
        }
        builder.text(&text[position..]);

        let book = builder.finish();
        if book.headers.is_empty() && book.chapters.is_empty() {
            anyhow::bail!("No USFM markers found");
        }
        Ok(book)
    }

    fn serialize(&self, book: &UsfmBook) -> String {
        let mut out = String::new();

        for header in &book.headers {
            out.push('\\');
            out.push_str(&header.tag);
            if !header.content.is_empty() {
                out.push(' ');
                out.push_str(&header.content);
            }
            out.push('\n');
        }

        let mut chapter_keys: Vec<&String> = book.chapters.keys().collect();
        chapter_keys.sort_by(|a, b| usfm_key_order(a, b));

        for chapter_key in chapter_keys {
            let chapter = &book.chapters[chapter_key.as_str()];
            // content before the first \c has no chapter line of its own
            if chapter_key.as_str() != "front" {
                out.push_str(&format!("\\c {}\n", chapter_key));
            }
            write_chapter(&mut out, chapter);
        }

        out
    }
}

fn write_chapter(out: &mut String, chapter: &UsfmChapter) {
    let mut verse_keys: Vec<&String> = chapter.keys().collect();
    verse_keys.sort_by(|a, b| usfm_key_order(a, b));

    for verse_key in verse_keys {
        let verse = &chapter[verse_key.as_str()];
        if verse_key != "front" {
            out.push_str(&format!("\\v {} ", verse_key));
        }
        write_objects(out, crate::alignment::verse_objects(verse));
        out.push('\n');
    }
}

fn write_objects(out: &mut String, objects: &[Value]) {
    for object in objects {
        let Some(map) = object.as_object() else {
            continue;
        };
        let tag = map.get("tag").and_then(Value::as_str).unwrap_or("");

        match map.get("type").and_then(Value::as_str).unwrap_or("") {
            "text" => {
                if let Some(text) = map.get("text").and_then(Value::as_str) {
                    out.push_str(text);
                }
            }
            "word" => {
                let text = map.get("text").and_then(Value::as_str).unwrap_or("");
                out.push_str(&format!("\\w {}", text));
                let attrs = attribute_string(map, WORD_ATTRIBUTES);
                if !attrs.is_empty() {
                    out.push('|');
                    out.push_str(&attrs);
                }
                out.push_str("\\w*");
            }
            "milestone" if tag == "zaln" => {
                out.push_str(&format!("\\zaln-s |{}\\*", attribute_string(map, ALIGNMENT_ATTRIBUTES)));
                if let Some(children) = map.get("children").and_then(Value::as_array) {
                    write_objects(out, children);
                }
                out.push_str("\\zaln-e\\*");
            }
            "milestone" => {
                out.push_str(&format!("\\{}", tag));
                let attrs = attribute_string(map, &[]);
                if !attrs.is_empty() {
                    out.push_str(" |");
                    out.push_str(&attrs);
                }
                out.push_str("\\*");
            }
            "end-marker" => out.push_str(&format!("\\{}*", tag)),
            _ if !tag.is_empty() => {
                if !is_inline(tag) {
                    out.push('\n');
                }
                out.push_str(&format!("\\{} ", tag));
            }
            _ => {}
        }
    }
}

/// Known attributes in their usual order, then any others as `x-` attributes
fn attribute_string(map: &Map<String, Value>, known: &[(&str, &str)]) -> String {
    let mut parts = Vec::new();
    for (key, name) in known {
        if let Some(value) = map.get(*key).and_then(Value::as_str) {
            parts.push(format!("{}=\"{}\"", name, value));
        }
    }
    for (key, value) in map {
        if STRUCTURAL_KEYS.contains(&key.as_str()) || known.iter().any(|(k, _)| k == key) {
            continue;
        }
        if let Some(value) = value.as_str() {
            parts.push(format!("x-{}=\"{}\"", key, value));
        }
    }
    parts.join(" ")
}

fn is_inline(tag: &str) -> bool {
    tag.starts_with('+') || INLINE_MARKERS.contains(&tag)
}

/// Accumulates headers, chapters and verse objects while tokens stream in
#[derive(Default)]
struct BookBuilder {
    book: UsfmBook,
    chapter: Option<(String, UsfmChapter)>,
    verse_key: String,
    objects: Vec<Value>,
    open_alignments: Vec<(Map<String, Value>, Vec<Value>)>,
}

impl BookBuilder {
    fn in_body(&self) -> bool {
        self.chapter.is_some()
    }

    fn text(&mut self, raw: &str) {
        if !self.in_body() {
            let content = raw.trim();
            if let Some(last) = self.book.headers.last_mut() {
                if last.content.is_empty() && !content.is_empty() {
                    last.content = content.to_string();
                }
            }
            return;
        }

        let text = raw.trim_end_matches(['\r', '\n']);
        if text.is_empty() || (text.trim().is_empty() && raw.contains('\n')) {
            return;
        }
        self.push(json!({"type": "text", "text": text}));
    }

    fn marker(&mut self, tag: &str, closing: bool) {
        if !self.in_body() && !closing {
            self.book.headers.push(UsfmHeader {
                tag: tag.to_string(),
                content: String::new(),
            });
            return;
        }
        let kind = if closing { "end-marker" } else { "marker" };
        self.push(json!({"type": kind, "tag": tag}));
    }

    fn push(&mut self, object: Value) {
        if !self.in_body() {
            self.start_chapter("front");
        }
        match self.open_alignments.last_mut() {
            Some((_, children)) => children.push(object),
            None => self.objects.push(object),
        }
    }

    fn open_alignment(&mut self, mut attributes: Map<String, Value>) {
        attributes.insert("type".to_string(), json!("milestone"));
        attributes.insert("tag".to_string(), json!("zaln"));
        self.open_alignments.push((attributes, Vec::new()));
    }

    fn close_alignment(&mut self) {
        let Some((mut milestone, children)) = self.open_alignments.pop() else {
            return;
        };
        milestone.insert("children".to_string(), Value::Array(children));
        milestone.insert("endTag".to_string(), json!(ALIGNMENT_END_TAG));
        self.push(Value::Object(milestone));
    }

    fn finish_verse(&mut self) {
        while !self.open_alignments.is_empty() {
            self.close_alignment();
        }
        let objects = std::mem::take(&mut self.objects);
        let key = std::mem::replace(&mut self.verse_key, "front".to_string());
        if let Some((_, chapter)) = self.chapter.as_mut() {
            if key != "front" || !objects.is_empty() {
                chapter.insert(key, json!({ "verseObjects": objects }));
            }
        }
    }

    fn start_chapter(&mut self, key: &str) {
        self.finish_verse();
        if let Some((chapter_key, chapter)) = self.chapter.take() {
            self.book.chapters.entry(chapter_key).or_default().extend(chapter);
        }
        let existing = self.book.chapters.remove(key).unwrap_or_default();
        self.chapter = Some((key.to_string(), existing));
        self.verse_key = "front".to_string();
    }

    fn start_verse(&mut self, key: &str) {
        if !self.in_body() {
            self.start_chapter("front");
        }
        self.finish_verse();
        self.verse_key = key.to_string();
    }

    fn finish(mut self) -> UsfmBook {
        self.finish_verse();
        if let Some((chapter_key, chapter)) = self.chapter.take() {
            self.book.chapters.entry(chapter_key).or_default().extend(chapter);
        }
        self.book
    }
}
