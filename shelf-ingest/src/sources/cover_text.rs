// Cover Text Heuristics
//
// Structured fields from unstructured cover text (OCR output, model prose).
// Heuristic by nature; kept behind the candidate contract so a better
// extractor can replace it without touching fusion.

use once_cell::sync::Lazy;
use regex::Regex;

static AUTHOR_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:written\s+by|author\s*:|by)\s+(.+)$").unwrap());

static ISBN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bISBN(?:-1[03])?[\s:\-]*([0-9][0-9\s\-]{8,16}[0-9Xx])").unwrap());

static PUBLISHED_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)published\s+by\s+([^,.;]+)").unwrap());

static PUBLISHER_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][\w&']*(?: +[A-Z][\w&']*)* +(?:Press|Books|Publishing|Publishers|Classics))\b")
        .unwrap()
});

/// Capitalised two-to-four word line with no digits, e.g. "Jane Austen"
static NAME_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Z][a-zA-Z'\-]*\.?)(?:\s+[A-Z][a-zA-Z'\-]*\.?){1,3}$").unwrap()
});

/// Fields recovered from cover text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverText {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publisher: String,
}

/// Parse raw cover text
pub fn parse_cover_text(text: &str) -> CoverText {
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| l.chars().count() > 2)
        .map(clean_ocr_artifacts)
        .collect();

    let isbn = find_isbn(text);
    let publisher = find_publisher(text);

    // Lines that carry an ISBN or publisher are never title or author
    let content: Vec<&String> = lines
        .iter()
        .filter(|l| !ISBN.is_match(l))
        .filter(|l| publisher.is_empty() || !l.contains(publisher.as_str()))
        .collect();

    let Some(first) = content.first() else {
        return CoverText {
            isbn,
            publisher,
            ..Default::default()
        };
    };

    let mut author = String::new();
    let mut author_line = None;
    for (i, line) in content.iter().enumerate().skip(1).take(4) {
        if let Some(caps) = AUTHOR_PREFIX.captures(line) {
            author = caps[1].trim().to_string();
            author_line = Some(i);
            break;
        }
    }

    // Fall back to a name-shaped line
    if author.is_empty() {
        if let Some((i, line)) = content
            .iter()
            .enumerate()
            .skip(1)
            .take(4)
            .find(|(_, l)| looks_like_name(l))
        {
            author = line.to_string();
            author_line = Some(i);
        }
    }

    // A second line that is neither the author nor edition noise continues the title
    let mut title = first.to_string();
    if let Some(second) = content.get(1) {
        if author_line != Some(1) && !is_edition_noise(second) && author_line.is_some() {
            title = format!("{} {}", title, second);
        }
    }

    CoverText {
        title,
        author,
        isbn,
        publisher,
    }
}

fn looks_like_name(line: &str) -> bool {
    line.len() < 50 && !is_edition_noise(line) && NAME_LINE.is_match(line)
}

fn is_edition_noise(line: &str) -> bool {
    let lower = line.to_lowercase();
    ["edition", "volume", "part ", "novel", "classics", "isbn"]
        .iter()
        .any(|w| lower.contains(w))
}

/// ISBN digits, normalized to a 10 or 13 character string
pub fn find_isbn(text: &str) -> String {
    ISBN.captures_iter(text)
        .filter_map(|caps| {
            let digits: String = caps[1]
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
                .map(|c| c.to_ascii_uppercase())
                .collect();
            matches!(digits.len(), 10 | 13).then_some(digits)
        })
        .next()
        .unwrap_or_default()
}

fn find_publisher(text: &str) -> String {
    if let Some(caps) = PUBLISHED_BY.captures(text) {
        return caps[1].trim().to_string();
    }
    PUBLISHER_SUFFIX
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}

/// Fix common OCR misreads without touching real numbers
///
/// `|` between or next to letters becomes `I`; a `0` leading a word, or
/// between two letters, becomes `O` when the word has other letters.
pub fn clean_ocr_artifacts(line: &str) -> String {
    line.split_whitespace()
        .map(clean_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_word(word: &str) -> String {
    if word == "|" {
        return "I".to_string();
    }

    let mut chars: Vec<char> = word.chars().collect();
    let has_letters = chars.iter().any(|c| c.is_ascii_alphabetic());

    for i in 0..chars.len() {
        let prev_alpha = i > 0 && chars[i - 1].is_ascii_alphabetic();
        let next_alpha = chars.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic());

        match chars[i] {
            '|' if prev_alpha || next_alpha => chars[i] = 'I',
            '0' if has_letters && chars.len() > 1 && (i == 0 || (prev_alpha && next_alpha)) => {
                chars[i] = 'O'
            }
            _ => {}
        }
    }

    chars.into_iter().collect()
}
