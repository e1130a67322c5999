//! Text heuristics behind the title and abstract indicators.

use std::sync::LazyLock;

use regex::Regex;

/// A GTS abbreviated heading such as `SMCA01 KWBC`.
static BULLETIN_HEADER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[A-Z]{4}\d{2}[\s_]*[A-Z]{4}").ok());

/// Two or more capitals, optionally dotted, optionally pluralised.
static ACRONYM: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"([A-Z]\.*){2,}s?").ok());

/// An opening, closing or self-closing HTML/XML tag, or a character entity.
static MARKUP: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"</?[A-Za-z][A-Za-z0-9:-]*(\s+[^<>]*)?/?>|&(#[0-9]+|#x[0-9A-Fa-f]+|[a-z]+);"#).ok()
});

/// Whether `text` embeds a GTS bulletin header.
#[must_use]
pub fn has_bulletin_header(text: &str) -> bool {
    BULLETIN_HEADER
        .as_ref()
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Number of acronyms in `text`.
#[must_use]
pub fn acronym_count(text: &str) -> usize {
    ACRONYM
        .as_ref()
        .map(|re| re.find_iter(text).count())
        .unwrap_or(0)
}

/// Whether `text` contains markup.
#[must_use]
pub fn contains_markup(text: &str) -> bool {
    MARKUP.as_ref().map(|re| re.is_match(text)).unwrap_or(false)
}

/// Title case: every cased run starts with one upper-case character
/// followed only by lower-case ones, and there is at least one cased
/// character.
#[must_use]
pub fn is_title_case(text: &str) -> bool {
    let mut cased = false;
    let mut previous_cased = false;
    for c in text.chars() {
        if c.is_uppercase() {
            if previous_cased {
                return false;
            }
            previous_cased = true;
            cased = true;
        } else if c.is_lowercase() {
            if !previous_cased {
                return false;
            }
            previous_cased = true;
            cased = true;
        } else {
            previous_cased = false;
        }
    }
    cased
}

/// Whether every whitespace-separated word is purely alphanumeric.
#[must_use]
pub fn words_are_alphanumeric(text: &str) -> bool {
    text.split_whitespace()
        .all(|word| word.chars().all(char::is_alphanumeric))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bulletin_headers() {
        assert!(has_bulletin_header("SMCA01 KWBC synoptic reports"));
        assert!(has_bulletin_header("ISMD01_EGRR"));
        assert!(!has_bulletin_header("Synoptic Reports From Canada"));
    }

    #[test]
    fn counts_acronyms() {
        assert_eq!(acronym_count("WMO GTS SYNOP U.S. reports"), 4);
        assert_eq!(acronym_count("Hourly Reports"), 0);
    }

    #[test]
    fn detects_markup() {
        assert!(contains_markup("Data <b>now</b> available"));
        assert!(contains_markup("Line<br/>break"));
        assert!(contains_markup("Rock &amp; roll"));
        assert!(!contains_markup("Temperature < 5 and > 2"));
    }

    #[test]
    fn title_case_matches_word_capitalisation() {
        assert!(is_title_case("Hourly Synoptic Observations"));
        assert!(is_title_case("Level 2 Radar"));
        assert!(!is_title_case("Hourly synoptic observations"));
        assert!(!is_title_case("SYNOP Observations"));
        assert!(!is_title_case("1234"));
    }

    #[test]
    fn alphanumeric_words() {
        assert!(words_are_alphanumeric("Surface Observations 2023"));
        assert!(!words_are_alphanumeric("Surface Observations: 2023"));
    }
}
