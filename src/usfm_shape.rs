use crate::models::{UsfmBook, UsfmHeader};
use std::collections::HashMap;

/// Characters that cannot appear in a file or folder name on common filesystems
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Collapses header lines into a tag -> content map. Entries with an empty
/// tag or content are ignored and later entries win.
pub fn parse_usfm_headers(headers: &[UsfmHeader]) -> HashMap<String, String> {
    headers
        .iter()
        .filter(|h| !h.tag.is_empty() && !h.content.is_empty())
        .map(|h| (h.tag.clone(), h.content.clone()))
        .collect()
}

/// Parses a raw chapter or verse key. Only plain non-negative integers in
/// canonical form address tree nodes; anything else, zero-padded keys
/// included, is front matter and keeps its raw spelling.
pub fn parse_numeric_key(key: &str) -> Option<u32> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse::<u32>().ok()
}

pub fn only_numbers<'a, I>(keys: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    keys.into_iter()
        .map(String::as_str)
        .filter(|k| parse_numeric_key(k).is_some())
        .collect()
}

/// Number of numeric verses under numeric chapters
pub fn count_numeric_verses(book: &UsfmBook) -> usize {
    book.chapters
        .iter()
        .filter(|(key, _)| parse_numeric_key(key).is_some())
        .map(|(_, chapter)| only_numbers(chapter.keys()).len())
        .sum()
}

/// Orders raw keys the way they appear in a USFM file: non-numeric keys
/// without a leading number first ("front"), then by leading number.
pub fn usfm_key_order(a: &str, b: &str) -> std::cmp::Ordering {
    fn leading_number(key: &str) -> Option<u32> {
        let digits: String = key.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
    leading_number(a)
        .cmp(&leading_number(b))
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.cmp(b))
}

/// Removes characters that are invalid in file names, along with control
/// characters and leading dots, so a group or book name cannot escape the
/// export folder.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();

    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}
