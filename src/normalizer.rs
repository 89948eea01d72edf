use regex::Regex;

/// Canonicalize a raw merchant description into the stable key used by the
/// classification memory. Deterministic and idempotent: feeding the output
/// back in returns it unchanged.
pub fn normalize(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();

    s = strip_reference_suffix(&s);

    // Trailing two-letter location code ("... WA")
    let loc = Regex::new(r"\s+[a-z]{2}$").unwrap();
    s = loc.replace(&s, "").to_string();

    // Keep only lowercase alphanumerics, spaces and hyphens
    let charset = Regex::new(r"[^a-z0-9\s\-]").unwrap();
    s = charset.replace_all(&s, "").to_string();

    let ws = Regex::new(r"\s+").unwrap();
    s = ws.replace_all(&s, " ").trim().to_string();

    // First segment is presumed to be the merchant name
    let sep = Regex::new(r"\s{2,}|\s+-\s+").unwrap();
    if let Some(first) = sep.split(&s).next() {
        s = first.to_string();
    }

    // Only ASCII remains after the charset filter, so byte truncation is
    // safe on char boundaries.
    s.truncate(100);
    s
}

/// Drop a trailing statement reference code and everything after it. A
/// reference code is a whitespace-preceded run of at least eight
/// alphanumerics containing at least one digit; plain words are never
/// stripped, however long.
fn strip_reference_suffix(s: &str) -> String {
    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].1.is_whitespace() {
            i += 1;
            continue;
        }
        let ws_start = chars[i].0;
        while i < chars.len() && chars[i].1.is_whitespace() {
            i += 1;
        }
        let mut token = String::new();
        let mut j = i;
        while j < chars.len() && !chars[j].1.is_whitespace() {
            token.push(chars[j].1);
            j += 1;
        }
        if token.chars().count() >= 8
            && token.chars().all(|c| c.is_ascii_alphanumeric())
            && token.chars().any(|c| c.is_ascii_digit())
        {
            return s[..ws_start].trim_end().to_string();
        }
        i = j;
    }
    s.to_string()
}
