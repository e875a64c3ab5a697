//! Person name capitalization
//!
//! CRM contacts created from checkout forms arrive in whatever case the
//! customer typed. Names are normalized per segment, where segments are
//! delimited by whitespace, hyphens and apostrophes:
//!
//! - `o'connor` becomes `O'Connor`
//! - `mary-jane` becomes `Mary-Jane`
//! - `mcdonald` becomes `McDonald`, `macdonald` becomes `MacDonald`
//! - `van der berg` becomes `Van der Berg`

/// Connecting words kept lowercase when they are not the first word
const LOWERCASE_PARTICLES: &[&str] = &["da", "de", "del", "der", "di", "du", "la", "le", "van", "von"];

/// Surnames starting with "mac" that are not Gaelic patronymics
const MAC_EXCEPTIONS: &[&str] = &[
    "machado",
    "machiavelli",
    "macedo",
    "mackey",
    "macklin",
    "macomber",
];

/// Minimum letters after "mac" before it is treated as a patronymic prefix
const MAC_MIN_REST: usize = 5;

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '\'' | '\u{2019}')
}

/// Capitalize a first or last name. Empty input yields empty output.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut segment = String::new();
    let mut first_word = true;
    let mut after_whitespace = false;

    for c in raw.chars() {
        if is_delimiter(c) {
            if !segment.is_empty() {
                push_segment(&mut out, &segment, first_word, after_whitespace);
                first_word = false;
                segment.clear();
            }
            after_whitespace = c.is_whitespace();
            out.push(c);
        } else {
            segment.push(c);
        }
    }
    if !segment.is_empty() {
        push_segment(&mut out, &segment, first_word, after_whitespace);
    }

    out
}

fn push_segment(out: &mut String, segment: &str, first_word: bool, after_whitespace: bool) {
    let lower = segment.to_lowercase();

    if !first_word && after_whitespace && LOWERCASE_PARTICLES.contains(&lower.as_str()) {
        out.push_str(&lower);
        return;
    }

    match split_patronymic(&lower) {
        Some((prefix, rest)) => {
            out.push_str(prefix);
            out.push_str(&capitalize(rest));
        }
        None => out.push_str(&capitalize(&lower)),
    }
}

fn split_patronymic(lower: &str) -> Option<(&'static str, &str)> {
    if let Some(rest) = lower.strip_prefix("mac") {
        if rest.chars().count() >= MAC_MIN_REST
            && rest.chars().all(char::is_alphabetic)
            && !MAC_EXCEPTIONS.contains(&lower)
        {
            return Some(("Mac", rest));
        }
        return None;
    }

    let rest = lower.strip_prefix("mc")?;
    rest.chars()
        .next()
        .filter(|c| c.is_alphabetic())
        .map(|_| ("Mc", rest))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split a single "full name" field into (first, last) on the first whitespace run
pub fn split_full_name(full: &str) -> (String, String) {
    let trimmed = full.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}
