//! String similarity for organization names.
//!
//! `ratio` follows the Ratcliff/Obershelp matching-blocks measure on chars,
//! `token_set_ratio` compares the sorted token sets of two strings so word
//! order and extra words weigh less than shared words.

use std::collections::BTreeSet;

const FOLDS: &[(char, &str)] = &[
    ('ä', "ae"),
    ('ö', "oe"),
    ('ü', "ue"),
    ('Ä', "Ae"),
    ('Ö', "Oe"),
    ('Ü', "Ue"),
    ('ß', "ss"),
    ('á', "a"),
    ('à', "a"),
    ('â', "a"),
    ('å', "a"),
    ('é', "e"),
    ('è', "e"),
    ('ê', "e"),
    ('ë', "e"),
    ('í', "i"),
    ('ì', "i"),
    ('î', "i"),
    ('ï', "i"),
    ('ó', "o"),
    ('ò', "o"),
    ('ô', "o"),
    ('ú', "u"),
    ('ù', "u"),
    ('û', "u"),
    ('ç', "c"),
    ('ñ', "n"),
    ('š', "s"),
    ('č', "c"),
    ('ž', "z"),
    ('Á', "A"),
    ('À', "A"),
    ('É', "E"),
    ('È', "E"),
    ('Í', "I"),
    ('Ó', "O"),
    ('Ú', "U"),
    ('Ç', "C"),
    ('Ñ', "N"),
    ('Š', "S"),
    ('Č', "C"),
    ('Ž', "Z"),
];

/// Umlauts to ASCII digraphs, other diacritics to their base letter
pub fn fold_diacritics(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars() {
        match FOLDS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => folded.push_str(to),
            None => folded.push(c),
        }
    }
    folded
}

/// Reverses [`fold_diacritics`] for the words it changed in `sources`.
///
/// Only words whose folded form was seen in a source are restored, so a
/// plain `ue` or `ae` that never was an umlaut stays as written.
pub fn unfold_words(text: &str, sources: &[&str]) -> String {
    let mut unfolded: Vec<(String, &str)> = Vec::new();
    for source in sources {
        for word in source.split(|c: char| !c.is_alphabetic()) {
            let folded = fold_diacritics(word);
            if folded != word && !unfolded.iter().any(|(known, _)| *known == folded) {
                unfolded.push((folded, word));
            }
        }
    }

    let mut restored = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(char::is_alphabetic) {
        restored.push_str(&rest[..start]);
        let len = rest[start..]
            .find(|c: char| !c.is_alphabetic())
            .unwrap_or(rest.len() - start);
        let word = &rest[start..start + len];
        match unfolded.iter().find(|(folded, _)| folded.as_str() == word) {
            Some((_, original)) => restored.push_str(original),
            None => restored.push_str(word),
        }
        rest = &rest[start + len..];
    }
    restored.push_str(rest);
    restored
}

/// Lowercase alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Longest common block `(start_a, start_b, len)`, earliest in `a` then `b`
fn longest_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        for j in 0..b.len() {
            current[j + 1] = if a[i] == b[j] { previous[j] + 1 } else { 0 };
            let len = current[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }
    best
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Similarity of two strings in 0..=100. Empty input scores 0.
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let matches = matching_chars(&a, &b) as f64;
    (200.0 * matches / (a.len() + b.len()) as f64).round() as u8
}

/// Token-set similarity in 0..=100.
///
/// Both strings are tokenized; the shared tokens are compared against each
/// side's shared-plus-remaining tokens and the best of those ratios wins.
/// A string whose tokens are a subset of the other's scores 100.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let tokens_a: BTreeSet<String> = tokenize(a).into_iter().collect();
    let tokens_b: BTreeSet<String> = tokenize(b).into_iter().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let join = |tokens: Vec<&String>| {
        tokens
            .into_iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let shared = join(tokens_a.intersection(&tokens_b).collect());
    let only_a = join(tokens_a.difference(&tokens_b).collect());
    let only_b = join(tokens_b.difference(&tokens_a).collect());

    let combined_a = format!("{shared} {only_a}").trim().to_string();
    let combined_b = format!("{shared} {only_b}").trim().to_string();

    ratio(&shared, &combined_a)
        .max(ratio(&shared, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

/// Longest common substring of two strings, taken from `a`
pub fn longest_common_substring(a: &str, b: &str) -> String {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (start, _, len) = longest_block(&a, &b);
    a[start..start + len].iter().collect()
}

/// Organization name without legal-form tokens.
///
/// Tokens are compared lowercase with punctuation removed, so "GmbH," and
/// "e.U." are recognized. Falls back to the trimmed name when nothing else
/// is left.
pub fn basename(name: &str, legal_forms: &[String]) -> String {
    let kept: Vec<&str> = name
        .split_whitespace()
        .filter(|token| {
            let normalized: String = token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            !normalized.is_empty() && !legal_forms.iter().any(|form| *form == normalized)
        })
        .collect();

    if kept.is_empty() {
        name.trim().to_string()
    } else {
        kept.join(" ")
    }
}
