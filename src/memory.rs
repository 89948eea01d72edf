use chrono::Local;
use rusqlite::Connection;

use crate::error::Result;
use crate::models::Rule;
use crate::normalizer::normalize;

fn now_str() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn rule_from_row(row: &rusqlite::Row) -> rusqlite::Result<Rule> {
    Ok(Rule {
        pattern: row.get(0)?,
        vendor: row.get(1)?,
        expense_account: row.get(2)?,
        cost_center: row.get(3)?,
        confidence: row.get(4)?,
        use_count: row.get(5)?,
        enabled: row.get::<_, i64>(6)? != 0,
    })
}

const RULE_COLUMNS: &str =
    "vendor_pattern, matched_vendor, expense_account, cost_center, confidence, use_count, enabled";

/// Look up a suggestion for a raw description. Exact match on the
/// normalized key wins; otherwise the first enabled rule, in creation
/// order, whose pattern is a substring of the normalized description.
/// There is deliberately no specificity ranking: first match wins, which
/// keeps suggestions stable across runs even when patterns overlap.
pub fn suggest(conn: &Connection, description: &str) -> Result<Option<Rule>> {
    let normalized = normalize(description);
    if normalized.is_empty() {
        return Ok(None);
    }

    let exact = conn
        .query_row(
            &format!("SELECT {RULE_COLUMNS} FROM rules WHERE vendor_pattern = ?1 AND enabled = 1"),
            [&normalized],
            rule_from_row,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    if exact.is_some() {
        return Ok(exact);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM rules WHERE enabled = 1 ORDER BY id"
    ))?;
    let rules: Vec<Rule> = stmt
        .query_map([], rule_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rules
        .into_iter()
        .find(|rule| !rule.pattern.is_empty() && normalized.contains(&rule.pattern)))
}

/// Record an accepted classification for a description. Creates the rule
/// at confidence 0.7 on first sight; afterwards merges the provided
/// fields, bumps use_count and nudges confidence up by 0.1 (capped at
/// 1.0). The single-statement upsert keeps concurrent same-key updates
/// from losing writes.
pub fn learn(
    conn: &Connection,
    description: &str,
    vendor: Option<&str>,
    expense_account: Option<&str>,
    cost_center: Option<&str>,
) -> Result<Option<Rule>> {
    let normalized = normalize(description);
    if normalized.is_empty() {
        return Ok(None);
    }

    conn.execute(
        "INSERT INTO rules (vendor_pattern, matched_vendor, expense_account, cost_center, \
                            confidence, use_count, last_used, enabled) \
         VALUES (?1, ?2, ?3, ?4, 0.7, 1, ?5, 1) \
         ON CONFLICT(vendor_pattern) DO UPDATE SET \
             matched_vendor = COALESCE(excluded.matched_vendor, matched_vendor), \
             expense_account = COALESCE(excluded.expense_account, expense_account), \
             cost_center = COALESCE(excluded.cost_center, cost_center), \
             use_count = use_count + 1, \
             confidence = MIN(1.0, confidence + 0.1), \
             last_used = excluded.last_used",
        rusqlite::params![normalized, vendor, expense_account, cost_center, now_str()],
    )?;

    let rule = conn.query_row(
        &format!("SELECT {RULE_COLUMNS} FROM rules WHERE vendor_pattern = ?1"),
        [&normalized],
        rule_from_row,
    )?;
    Ok(Some(rule))
}

/// Smaller-step confidence channel for when a suggestion is confirmed or
/// declined without a full reclassification.
pub fn record_feedback(conn: &Connection, rule_key: &str, accepted: bool) -> Result<()> {
    if accepted {
        conn.execute(
            "UPDATE rules SET confidence = MIN(1.0, confidence + 0.05), \
                              use_count = use_count + 1, last_used = ?2 \
             WHERE vendor_pattern = ?1",
            rusqlite::params![rule_key, now_str()],
        )?;
    } else {
        conn.execute(
            "UPDATE rules SET confidence = MAX(0.0, confidence - 0.1), last_used = ?2 \
             WHERE vendor_pattern = ?1",
            rusqlite::params![rule_key, now_str()],
        )?;
    }
    Ok(())
}

/// Most frequently used rules, for the CLI listing.
pub fn top_vendors(conn: &Connection, limit: i64) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM rules WHERE enabled = 1 \
         ORDER BY use_count DESC, vendor_pattern LIMIT ?1"
    ))?;
    let rules = stmt
        .query_map([limit], rule_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_learn_creates_rule_at_default_confidence() {
        let (_dir, conn) = test_db();
        let rule = learn(
            &conn,
            "AMAZON WEB SERVICES 123XYZ98765 WA",
            Some("Amazon"),
            Some("Hosting & Infrastructure"),
            Some("General"),
        )
        .unwrap()
        .unwrap();
        assert_eq!(rule.pattern, "amazon web services");
        assert_eq!(rule.confidence, 0.7);
        assert_eq!(rule.use_count, 1);
        assert!(rule.enabled);
    }

    #[test]
    fn test_learn_confidence_grows_monotonically_to_ceiling() {
        let (_dir, conn) = test_db();
        let mut last = 0.0;
        for _ in 0..6 {
            let rule = learn(&conn, "ADOBE CREATIVE CLOUD", None, Some("Software & Subscriptions"), None)
                .unwrap()
                .unwrap();
            assert!(rule.confidence >= last, "confidence decreased");
            assert!(rule.confidence <= 1.0);
            last = rule.confidence;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_learn_merges_only_provided_fields() {
        let (_dir, conn) = test_db();
        learn(&conn, "UBER TRIP", Some("Uber"), Some("Travel"), Some("Operations")).unwrap();
        let rule = learn(&conn, "UBER TRIP", None, Some("Meals"), None).unwrap().unwrap();
        assert_eq!(rule.vendor.as_deref(), Some("Uber"));
        assert_eq!(rule.expense_account.as_deref(), Some("Meals"));
        assert_eq!(rule.cost_center.as_deref(), Some("Operations"));
        assert_eq!(rule.use_count, 2);
    }

    #[test]
    fn test_suggest_exact_match_wins() {
        let (_dir, conn) = test_db();
        learn(&conn, "STARBUCKS", Some("Starbucks"), Some("Meals"), None).unwrap();
        learn(&conn, "STAR", Some("Wrong"), Some("Travel"), None).unwrap();
        let rule = suggest(&conn, "STARBUCKS").unwrap().unwrap();
        assert_eq!(rule.vendor.as_deref(), Some("Starbucks"));
    }

    #[test]
    fn test_suggest_partial_match_first_created_wins() {
        let (_dir, conn) = test_db();
        learn(&conn, "amazon", Some("Amazon"), Some("Office Expense"), None).unwrap();
        learn(&conn, "amazon web", Some("AWS"), Some("Hosting & Infrastructure"), None).unwrap();
        // "amazon" was created first and matches as a substring, so it wins
        // even though "amazon web" is more specific.
        let rule = suggest(&conn, "AMAZON WEB SERVICES 123XYZ98765 WA").unwrap().unwrap();
        assert_eq!(rule.vendor.as_deref(), Some("Amazon"));
    }

    #[test]
    fn test_suggest_ignores_disabled_rules() {
        let (_dir, conn) = test_db();
        learn(&conn, "NETFLIX", Some("Netflix"), Some("Software & Subscriptions"), None).unwrap();
        conn.execute("UPDATE rules SET enabled = 0 WHERE vendor_pattern = 'netflix'", [])
            .unwrap();
        assert!(suggest(&conn, "NETFLIX").unwrap().is_none());
    }

    #[test]
    fn test_suggest_none_for_unknown() {
        let (_dir, conn) = test_db();
        assert!(suggest(&conn, "NEVER SEEN BEFORE").unwrap().is_none());
        assert!(suggest(&conn, "").unwrap().is_none());
    }

    #[test]
    fn test_feedback_accepted_small_step() {
        let (_dir, conn) = test_db();
        learn(&conn, "GITHUB", None, Some("Software & Subscriptions"), None).unwrap();
        record_feedback(&conn, "github", true).unwrap();
        let rule = suggest(&conn, "GITHUB").unwrap().unwrap();
        assert!((rule.confidence - 0.75).abs() < 1e-9);
        assert_eq!(rule.use_count, 2);
    }

    #[test]
    fn test_feedback_rejected_larger_step_floored_at_zero() {
        let (_dir, conn) = test_db();
        learn(&conn, "GITHUB", None, Some("Software & Subscriptions"), None).unwrap();
        for _ in 0..10 {
            record_feedback(&conn, "github", false).unwrap();
        }
        let rule = suggest(&conn, "GITHUB").unwrap().unwrap();
        assert_eq!(rule.confidence, 0.0);
        assert_eq!(rule.use_count, 1);
    }

    #[test]
    fn test_top_vendors_ordered_by_use() {
        let (_dir, conn) = test_db();
        learn(&conn, "ONCE", None, Some("Meals"), None).unwrap();
        for _ in 0..3 {
            learn(&conn, "OFTEN", None, Some("Travel"), None).unwrap();
        }
        let top = top_vendors(&conn, 10).unwrap();
        assert_eq!(top[0].pattern, "often");
        assert_eq!(top[0].use_count, 3);
    }
}
