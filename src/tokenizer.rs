use regex::Regex;
use std::collections::HashMap;

/// A word token with its occurrence index among identical words of the
/// same verse (1-based) and the total count of that word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub occurrence: u32,
    pub occurrences: u32,
}

/// A slice of running text: a word, or the punctuation and spacing between words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Word(&'a str),
    Gap(&'a str),
}

pub struct WordTokenizer {
    word_pattern: Regex,
}

impl WordTokenizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(WordTokenizer {
            word_pattern: Regex::new(r"[\p{L}\p{M}\p{N}]+(?:['’][\p{L}\p{M}]+)*")?,
        })
    }

    /// Splits text into words, dropping punctuation
    pub fn words<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.word_pattern.find_iter(text).map(|m| m.as_str()).collect()
    }

    /// Splits text into words and the gaps between them. Concatenating the
    /// segments gives back `text`.
    pub fn segments<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        let mut segments = Vec::new();
        let mut last = 0;
        for m in self.word_pattern.find_iter(text) {
            if m.start() > last {
                segments.push(Segment::Gap(&text[last..m.start()]));
            }
            segments.push(Segment::Word(m.as_str()));
            last = m.end();
        }
        if last < text.len() {
            segments.push(Segment::Gap(&text[last..]));
        }
        segments
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new().expect("Failed to compile tokenizer patterns")
    }
}

/// Assigns occurrence/occurrences to an ordered word list
pub fn number_occurrences<'a, I>(words: I) -> Vec<Token>
where
    I: IntoIterator<Item = &'a str>,
{
    let words: Vec<&str> = words.into_iter().collect();
    let mut totals: HashMap<&str, u32> = HashMap::new();
    for word in &words {
        *totals.entry(*word).or_insert(0) += 1;
    }

    let mut seen: HashMap<&str, u32> = HashMap::new();
    words
        .iter()
        .map(|word| {
            let occurrence = seen.entry(*word).or_insert(0);
            *occurrence += 1;
            Token {
                text: word.to_string(),
                occurrence: *occurrence,
                occurrences: totals[word],
            }
        })
        .collect()
}
