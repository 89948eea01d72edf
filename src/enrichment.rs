use std::time::Duration;

use regex::Regex;

use crate::settings::Settings;

/// A human-review hint about a merchant, assembled from a web search.
/// Never authoritative: nothing here feeds a state transition.
#[derive(Debug, Clone)]
pub struct VendorHint {
    pub suggested_name: String,
    pub website: String,
    pub snippet: String,
    pub confidence: f64,
    pub category_guess: Option<String>,
}

// (keyword in snippet, expense account guess)
const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("restaurant", "Meals"),
    ("coffee", "Meals"),
    ("software", "Software & Subscriptions"),
    ("saas", "Software & Subscriptions"),
    ("cloud", "Hosting & Infrastructure"),
    ("hosting", "Hosting & Infrastructure"),
    ("airline", "Travel"),
    ("hotel", "Travel"),
    ("advertising", "Advertising & Marketing"),
    ("consulting", "Professional Services"),
];

/// Look up a merchant description against the configured search endpoint.
/// Any failure (disabled, no endpoint, transport, malformed body) yields
/// None; enrichment is best-effort only.
pub fn search_vendor(settings: &Settings, description: &str) -> Option<VendorHint> {
    if !settings.enable_vendor_enrichment || settings.enrichment_endpoint.is_empty() {
        return None;
    }
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(settings.ml_timeout_secs))
        .build()
        .ok()?;
    let response = client
        .get(&settings.enrichment_endpoint)
        .query(&[("q", search_query(description))])
        .send()
        .ok()?
        .error_for_status()
        .ok()?;
    let results: serde_json::Value = response.json().ok()?;
    parse_search_results(&results)
}

/// Reduce a raw statement description to a short search query: drop
/// reference codes and trailing location codes, keep the first three
/// words.
pub fn search_query(description: &str) -> String {
    let mut s = description.to_string();
    s = Regex::new(r"[A-Z0-9]{8,}").unwrap().replace_all(&s, "").to_string();
    s = Regex::new(r"\s+[A-Z]{2}$").unwrap().replace(&s, "").to_string();
    s = Regex::new(r"[^a-zA-Z0-9\s]").unwrap().replace_all(&s, " ").to_string();
    s = Regex::new(r"\s+").unwrap().replace_all(&s, " ").trim().to_string();
    s.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
}

/// Map the top search result to a hint. Base confidence 0.7; category is
/// guessed from snippet keywords when one matches.
pub fn parse_search_results(results: &serde_json::Value) -> Option<VendorHint> {
    let first = results.get("items")?.as_array()?.first()?;
    let snippet = first.get("snippet").and_then(|v| v.as_str()).unwrap_or("").to_string();
    Some(VendorHint {
        suggested_name: first.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        website: first.get("link").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        confidence: 0.7,
        category_guess: guess_category(&snippet),
        snippet,
    })
}

fn guess_category(snippet: &str) -> Option<String> {
    let lower = snippet.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, account)| account.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_query_strips_codes() {
        assert_eq!(
            search_query("AMAZON WEB SERVICES 123XYZ98765 WA"),
            "AMAZON WEB"
        );
        assert_eq!(search_query("UBER *TRIP HELP"), "UBER TRIP HELP");
    }

    #[test]
    fn test_search_query_keeps_three_words() {
        assert_eq!(search_query("one two three four five"), "one two three");
    }

    #[test]
    fn test_parse_results_top_item() {
        let hint = parse_search_results(&json!({
            "items": [
                {"title": "Blue Bottle Coffee", "link": "https://bluebottlecoffee.com",
                 "snippet": "Specialty coffee roaster and cafe."},
                {"title": "Other", "link": "https://other.example", "snippet": ""}
            ]
        }))
        .unwrap();
        assert_eq!(hint.suggested_name, "Blue Bottle Coffee");
        assert_eq!(hint.website, "https://bluebottlecoffee.com");
        assert_eq!(hint.confidence, 0.7);
        assert_eq!(hint.category_guess.as_deref(), Some("Meals"));
    }

    #[test]
    fn test_parse_results_no_items() {
        assert!(parse_search_results(&json!({"items": []})).is_none());
        assert!(parse_search_results(&json!({})).is_none());
    }

    #[test]
    fn test_category_guess_unknown_snippet() {
        let hint = parse_search_results(&json!({
            "items": [{"title": "X", "link": "", "snippet": "mystery business"}]
        }))
        .unwrap();
        assert!(hint.category_guess.is_none());
    }

    #[test]
    fn test_disabled_returns_none() {
        let settings = Settings {
            enable_vendor_enrichment: false,
            ..Settings::default()
        };
        assert!(search_vendor(&settings, "STARBUCKS").is_none());
    }
}
