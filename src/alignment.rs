//! Bridge between raw verse payloads and word alignment data.
//!
//! Verse payloads are `{"verseObjects": [...]}` values as produced by the
//! USFM codec. Target verses carry their alignment inline: `zaln` milestones
//! name the source word(s) and wrap the target words aligned to them.

use crate::models::{AlignerData, AlignerWord, AlignmentEdit, SourceTargetAlignment, WordAlignment};
use crate::tokenizer::{number_occurrences, Segment, Token, WordTokenizer};
use serde_json::{json, Map, Value};

/// What the corpus tree needs from the tokenizer and alignment tooling
pub trait AlignmentBridge {
    /// Every source word is linked to at least one target word and no
    /// target word is left in the word bank
    fn is_alignment_complete(&self, source_verse: &Value, target_verse: &Value) -> bool;

    fn aligner_data(&self, source_verse: &Value, target_verse: &Value) -> AlignerData;

    /// Rewrites `target_verse` so that it carries the edited alignment.
    /// Returns `None` when the payload is not a verse object.
    fn merge_alignment_edit(&self, target_verse: &Value, edit: &AlignmentEdit) -> Option<Value>;

    /// Source/target ngram pairs already present in the target verse
    fn manual_alignments(&self, source_verse: &Value, target_verse: &Value)
        -> Vec<SourceTargetAlignment>;

    /// Plain text of a verse payload, words separated by single spaces
    fn verse_text(&self, verse: &Value) -> String;

    fn source_language(&self) -> &str;

    fn target_language(&self) -> &str;
}

pub struct MilestoneBridge {
    tokenizer: WordTokenizer,
    source_language: String,
    target_language: String,
}

/// Target words in verse order, each tagged with the alignment that owns it
struct TargetWalk {
    words: Vec<String>,
    owners: Vec<Option<usize>>,
    top_words: Vec<Vec<AlignerWord>>,
}

impl MilestoneBridge {
    pub fn new(source_language: &str, target_language: &str) -> Result<Self, regex::Error> {
        Ok(MilestoneBridge {
            tokenizer: WordTokenizer::new()?,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        })
    }

    fn source_words(&self, source_verse: &Value) -> Vec<AlignerWord> {
        let mut found: Vec<(String, Option<&Map<String, Value>>)> = Vec::new();
        self.collect_source(verse_objects(source_verse), &mut found);

        let tokens = number_occurrences(found.iter().map(|(w, _)| w.as_str()));
        tokens
            .into_iter()
            .zip(found.iter())
            .map(|(token, (_, attributes))| AlignerWord {
                word: token.text,
                occurrence: token.occurrence,
                occurrences: token.occurrences,
                lemma: attributes.and_then(|a| string_field(a, "lemma")),
                morph: attributes.and_then(|a| string_field(a, "morph")),
                strong: attributes
                    .and_then(|a| string_field(a, "strong").or_else(|| string_field(a, "strongs"))),
            })
            .collect()
    }

    fn collect_source<'a>(
        &self,
        objects: &'a [Value],
        found: &mut Vec<(String, Option<&'a Map<String, Value>>)>,
    ) {
        for object in objects {
            let Some(map) = object.as_object() else {
                continue;
            };
            match object_type(map) {
                "word" => {
                    if let Some(text) = string_field(map, "text") {
                        found.push((text, Some(map)));
                    }
                }
                "text" => {
                    if let Some(text) = map.get("text").and_then(Value::as_str) {
                        for word in self.tokenizer.words(text) {
                            found.push((word.to_string(), None));
                        }
                    }
                }
                _ => self.collect_source(children(map), found),
            }
        }
    }

    fn walk_target(&self, objects: &[Value], owner: Option<usize>, walk: &mut TargetWalk) {
        for object in objects {
            let Some(map) = object.as_object() else {
                continue;
            };
            match object_type(map) {
                "milestone" if is_alignment_milestone(map) => {
                    let index = match owner {
                        Some(index) => index,
                        None => {
                            walk.top_words.push(Vec::new());
                            walk.top_words.len() - 1
                        }
                    };
                    walk.top_words[index].push(milestone_top_word(map));
                    self.walk_target(children(map), Some(index), walk);
                }
                "word" => {
                    if let Some(text) = string_field(map, "text") {
                        walk.words.push(text);
                        walk.owners.push(owner);
                    }
                }
                "text" => {
                    if let Some(text) = map.get("text").and_then(Value::as_str) {
                        for word in self.tokenizer.words(text) {
                            walk.words.push(word.to_string());
                            walk.owners.push(owner);
                        }
                    }
                }
                _ => self.walk_target(children(map), owner, walk),
            }
        }
    }

    /// Rebuilds one level of verse objects with the edited alignment. Old
    /// `zaln` milestones are unwrapped, words in running text are split out
    /// and every aligned word is wrapped again. Punctuation, markers and
    /// other spans stay where they were.
    fn rewrap_objects(&self, objects: &[Value], edit: &AlignmentEdit, rewrap: &mut Rewrap) -> Vec<Value> {
        let mut pieces = Vec::new();
        self.collect_pieces(objects, edit, rewrap, &mut pieces);
        group_pieces(pieces, &edit.verse_alignments)
    }

    /// Visits objects in the same order as `walk_target` so word positions line up
    fn collect_pieces(&self, objects: &[Value], edit: &AlignmentEdit, rewrap: &mut Rewrap, pieces: &mut Vec<Piece>) {
        for object in objects {
            let Some(map) = object.as_object() else {
                pieces.push(Piece::Other(object.clone()));
                continue;
            };
            match object_type(map) {
                "milestone" if is_alignment_milestone(map) => {
                    self.collect_pieces(children(map), edit, rewrap, pieces);
                }
                "word" if string_field(map, "text").is_some() => {
                    let (token, owner) = rewrap.take();
                    let mut word = map.clone();
                    if let Some(token) = token {
                        word.insert("occurrence".to_string(), json!(token.occurrence.to_string()));
                        word.insert("occurrences".to_string(), json!(token.occurrences.to_string()));
                    }
                    pieces.push(Piece::Word {
                        owner,
                        object: Value::Object(word),
                    });
                }
                "word" => pieces.push(Piece::Other(object.clone())),
                "text" => {
                    let text = map.get("text").and_then(Value::as_str).unwrap_or("");
                    let segments = self.tokenizer.segments(text);
                    if !segments.iter().any(|s| matches!(s, Segment::Word(_))) {
                        pieces.push(Piece::Other(object.clone()));
                        continue;
                    }
                    for segment in segments {
                        match segment {
                            Segment::Word(word) => {
                                let (token, owner) = rewrap.take();
                                let (occurrence, occurrences) =
                                    token.map_or((1, 1), |t| (t.occurrence, t.occurrences));
                                pieces.push(Piece::Word {
                                    owner,
                                    object: word_object(&AlignerWord::new(word, occurrence, occurrences)),
                                });
                            }
                            Segment::Gap(gap) => pieces.push(Piece::Other(json!({"type": "text", "text": gap}))),
                        }
                    }
                }
                _ => {
                    let mut container = map.clone();
                    if map.contains_key("children") {
                        let rebuilt = self.rewrap_objects(children(map), edit, rewrap);
                        container.insert("children".to_string(), Value::Array(rebuilt));
                    }
                    pieces.push(Piece::Other(Value::Object(container)));
                }
            }
        }
    }
}

/// Target tokens in verse order with the edited alignment owning each one
struct Rewrap {
    tokens: Vec<Token>,
    owners: Vec<Option<usize>>,
    next: usize,
}

impl Rewrap {
    fn take(&mut self) -> (Option<Token>, Option<usize>) {
        let index = self.next;
        self.next += 1;
        (
            self.tokens.get(index).cloned(),
            self.owners.get(index).copied().flatten(),
        )
    }
}

enum Piece {
    Word { owner: Option<usize>, object: Value },
    Other(Value),
}

/// Wraps each run of words owned by one alignment in its milestones.
/// Whitespace between words of a run stays inside the run.
fn group_pieces(pieces: Vec<Piece>, alignments: &[WordAlignment]) -> Vec<Value> {
    let mut objects = Vec::new();
    let mut run: Option<(usize, Vec<Value>)> = None;
    let mut pending_blanks: Vec<Value> = Vec::new();

    for piece in pieces {
        match piece {
            Piece::Word {
                owner: Some(owner),
                object,
            } => match run.as_mut() {
                Some((current, words)) if *current == owner => {
                    words.append(&mut pending_blanks);
                    words.push(object);
                }
                _ => {
                    flush_run(&mut objects, run.take(), alignments);
                    objects.append(&mut pending_blanks);
                    run = Some((owner, vec![object]));
                }
            },
            Piece::Other(object) if run.is_some() && is_blank_text(&object) => {
                pending_blanks.push(object);
            }
            Piece::Word { owner: None, object } | Piece::Other(object) => {
                flush_run(&mut objects, run.take(), alignments);
                objects.append(&mut pending_blanks);
                objects.push(object);
            }
        }
    }

    flush_run(&mut objects, run, alignments);
    objects.append(&mut pending_blanks);
    objects
}

fn flush_run(objects: &mut Vec<Value>, run: Option<(usize, Vec<Value>)>, alignments: &[WordAlignment]) {
    if let Some((owner, words)) = run {
        objects.push(milestone_chain(&alignments[owner].top_words, words));
    }
}

fn is_blank_text(object: &Value) -> bool {
    object.get("type").and_then(Value::as_str) == Some("text")
        && object
            .get("text")
            .and_then(Value::as_str)
            .map_or(false, |text| text.trim().is_empty())
}

impl AlignmentBridge for MilestoneBridge {
    fn is_alignment_complete(&self, source_verse: &Value, target_verse: &Value) -> bool {
        let data = self.aligner_data(source_verse, target_verse);
        data.word_bank.is_empty()
            && !data.alignments.is_empty()
            && data.alignments.iter().all(|a| !a.bottom_words.is_empty())
    }

    fn aligner_data(&self, source_verse: &Value, target_verse: &Value) -> AlignerData {
        let mut walk = TargetWalk {
            words: Vec::new(),
            owners: Vec::new(),
            top_words: Vec::new(),
        };
        self.walk_target(verse_objects(target_verse), None, &mut walk);

        let tokens = number_occurrences(walk.words.iter().map(String::as_str));
        let mut alignments: Vec<WordAlignment> = walk
            .top_words
            .into_iter()
            .map(|top_words| WordAlignment {
                top_words,
                bottom_words: Vec::new(),
            })
            .collect();
        let mut word_bank = Vec::new();

        for (token, owner) in tokens.into_iter().zip(walk.owners) {
            let word = AlignerWord::new(&token.text, token.occurrence, token.occurrences);
            match owner {
                Some(index) => alignments[index].bottom_words.push(word),
                None => word_bank.push(word),
            }
        }

        for source_word in self.source_words(source_verse) {
            let covered = alignments
                .iter()
                .any(|a| a.top_words.iter().any(|w| w.same_token(&source_word)));
            if !covered {
                alignments.push(WordAlignment {
                    top_words: vec![source_word],
                    bottom_words: Vec::new(),
                });
            }
        }

        AlignerData {
            word_bank,
            alignments,
        }
    }

    fn merge_alignment_edit(&self, target_verse: &Value, edit: &AlignmentEdit) -> Option<Value> {
        let mut merged = target_verse.as_object()?.clone();

        let mut walk = TargetWalk {
            words: Vec::new(),
            owners: Vec::new(),
            top_words: Vec::new(),
        };
        self.walk_target(verse_objects(target_verse), None, &mut walk);

        let tokens = number_occurrences(walk.words.iter().map(String::as_str));
        let owners = tokens
            .iter()
            .map(|token| {
                let word = AlignerWord::new(&token.text, token.occurrence, token.occurrences);
                edit.verse_alignments.iter().position(|a| {
                    !a.top_words.is_empty() && a.bottom_words.iter().any(|b| b.same_token(&word))
                })
            })
            .collect();

        let mut rewrap = Rewrap {
            tokens,
            owners,
            next: 0,
        };
        let objects = self.rewrap_objects(verse_objects(target_verse), edit, &mut rewrap);

        merged.insert("verseObjects".to_string(), Value::Array(objects));
        Some(Value::Object(merged))
    }

    fn manual_alignments(
        &self,
        source_verse: &Value,
        target_verse: &Value,
    ) -> Vec<SourceTargetAlignment> {
        self.aligner_data(source_verse, target_verse)
            .alignments
            .into_iter()
            .filter(|a| !a.top_words.is_empty() && !a.bottom_words.is_empty())
            .map(|a| SourceTargetAlignment {
                source_ngram: a.top_words.into_iter().map(|w| w.word).collect(),
                target_ngram: a.bottom_words.into_iter().map(|w| w.word).collect(),
            })
            .collect()
    }

    fn verse_text(&self, verse: &Value) -> String {
        let mut walk = TargetWalk {
            words: Vec::new(),
            owners: Vec::new(),
            top_words: Vec::new(),
        };
        self.walk_target(verse_objects(verse), None, &mut walk);
        walk.words.join(" ")
    }

    fn source_language(&self) -> &str {
        &self.source_language
    }

    fn target_language(&self) -> &str {
        &self.target_language
    }
}

pub fn verse_objects(verse: &Value) -> &[Value] {
    verse
        .get("verseObjects")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn children(map: &Map<String, Value>) -> &[Value] {
    map.get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn object_type(map: &Map<String, Value>) -> &str {
    map.get("type").and_then(Value::as_str).unwrap_or("")
}

fn is_alignment_milestone(map: &Map<String, Value>) -> bool {
    map.get("tag")
        .and_then(Value::as_str)
        .map_or(false, |tag| tag.starts_with("zaln"))
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(map: &Map<String, Value>, key: &str) -> u32 {
    string_field(map, key)
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
}

fn milestone_top_word(map: &Map<String, Value>) -> AlignerWord {
    AlignerWord {
        word: string_field(map, "content").unwrap_or_default(),
        occurrence: number_field(map, "occurrence"),
        occurrences: number_field(map, "occurrences"),
        lemma: string_field(map, "lemma"),
        morph: string_field(map, "morph"),
        strong: string_field(map, "strong"),
    }
}

fn word_object(word: &AlignerWord) -> Value {
    json!({
        "type": "word",
        "tag": "w",
        "text": word.word,
        "occurrence": word.occurrence.to_string(),
        "occurrences": word.occurrences.to_string(),
    })
}

/// Nests one `zaln` milestone per source word around the target words
fn milestone_chain(top_words: &[AlignerWord], children: Vec<Value>) -> Value {
    let mut inner = children;

    for top in top_words.iter().rev() {
        let mut milestone = Map::new();
        milestone.insert("type".to_string(), json!("milestone"));
        milestone.insert("tag".to_string(), json!("zaln"));
        if let Some(strong) = &top.strong {
            milestone.insert("strong".to_string(), json!(strong));
        }
        if let Some(lemma) = &top.lemma {
            milestone.insert("lemma".to_string(), json!(lemma));
        }
        if let Some(morph) = &top.morph {
            milestone.insert("morph".to_string(), json!(morph));
        }
        milestone.insert("occurrence".to_string(), json!(top.occurrence.to_string()));
        milestone.insert("occurrences".to_string(), json!(top.occurrences.to_string()));
        milestone.insert("content".to_string(), json!(top.word));
        milestone.insert("children".to_string(), Value::Array(inner));
        milestone.insert("endTag".to_string(), json!("zaln-e\\*"));
        inner = vec![Value::Object(milestone)];
    }

    inner.pop().unwrap_or(Value::Null)
}
