//! Phone number comparison

fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Two numbers are the same when their digit sequences match, whatever the formatting
pub fn same_phone(stored: &str, incoming: &str) -> bool {
    let (a, b) = (digits(stored), digits(incoming));
    if a.is_empty() || b.is_empty() {
        return stored.trim() == incoming.trim();
    }
    a == b
}
