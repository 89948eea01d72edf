use std::time::Duration;

use chrono::Local;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fmt;
use crate::models::{Status, Transaction};
use crate::settings::Settings;

/// Request body sent to the external classifier endpoint.
#[derive(Debug, Serialize)]
pub struct PredictionRequest {
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub date: String,
    pub card_member: String,
}

impl PredictionRequest {
    pub fn from_transaction(txn: &Transaction) -> Self {
        Self {
            description: txn.description.clone(),
            amount: txn.amount,
            category: txn.category.clone().unwrap_or_default(),
            date: txn.date.clone(),
            card_member: txn.card_member.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub vendor: Option<String>,
    pub expense_account: Option<String>,
    pub cost_center: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub split_recommended: bool,
}

/// Advisory wrapper around the external classifier. Every failure mode
/// (disabled, timeout, transport error, malformed body) surfaces as "no
/// prediction" and never as an error.
pub struct MlClassifier {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl MlClassifier {
    /// None when ML classification is disabled or no endpoint is set.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        if !settings.enable_ml_classification || settings.ml_endpoint.is_empty() {
            return None;
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.ml_timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            endpoint: settings.ml_endpoint.clone(),
            client,
        })
    }

    pub fn predict(&self, request: &PredictionRequest) -> Option<Prediction> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .ok()?
            .error_for_status()
            .ok()?;
        let value: serde_json::Value = response.json().ok()?;
        parse_prediction(value)
    }

    /// Order-preserving batch variant; an empty vec on any failure.
    pub fn predict_batch(&self, requests: &[PredictionRequest]) -> Vec<Prediction> {
        let Some(response) = self
            .client
            .post(&self.endpoint)
            .json(&requests)
            .send()
            .ok()
            .and_then(|r| r.error_for_status().ok())
        else {
            return Vec::new();
        };
        let Ok(serde_json::Value::Array(items)) = response.json::<serde_json::Value>() else {
            return Vec::new();
        };
        let parsed: Option<Vec<Prediction>> =
            items.into_iter().map(parse_prediction).collect();
        parsed.unwrap_or_default()
    }
}

/// The endpoint answers with either a prediction object or a one-element
/// list wrapping it. Confidence is clamped into [0, 1].
pub fn parse_prediction(value: serde_json::Value) -> Option<Prediction> {
    let value = match value {
        serde_json::Value::Array(mut items) => {
            if items.is_empty() {
                return None;
            }
            items.remove(0)
        }
        other => other,
    };
    let mut prediction: Prediction = serde_json::from_value(value).ok()?;
    prediction.confidence = prediction.confidence.clamp(0.0, 1.0);
    Some(prediction)
}

/// Store the prediction as advisory metadata; when confidence clears the
/// threshold, resolve the named entities and move the transaction to
/// Classified with an auto-generated note. Returns whether the
/// classification was applied.
pub fn apply_if_confident(
    conn: &Connection,
    txn_id: i64,
    prediction: &Prediction,
    threshold: f64,
) -> Result<bool> {
    conn.execute(
        "UPDATE transactions SET ml_vendor = ?1, ml_account = ?2, ml_cost_center = ?3, \
                                 ml_confidence = ?4, ml_split_recommended = ?5 \
         WHERE id = ?6",
        rusqlite::params![
            prediction.vendor,
            prediction.expense_account,
            prediction.cost_center,
            prediction.confidence,
            prediction.split_recommended as i64,
            txn_id,
        ],
    )?;

    if prediction.confidence < threshold {
        return Ok(false);
    }

    // The expense account must resolve to a real account; the vendor and
    // cost center fall back to unset when nothing matches.
    let account = resolve(conn, "accounts", prediction.expense_account.as_deref())?;
    let Some(account) = account else {
        return Ok(false);
    };
    let vendor = resolve(conn, "vendors", prediction.vendor.as_deref())?;
    let cost_center = resolve(conn, "cost_centers", prediction.cost_center.as_deref())?;

    let note = format!(
        "Auto-classified by ML (confidence: {})",
        fmt::percent(prediction.confidence)
    );
    conn.execute(
        "UPDATE transactions SET vendor = ?1, expense_account = ?2, cost_center = ?3, \
                                 classification_notes = ?4, classified_by = 'ml', \
                                 classification_date = ?5, status = ?6 \
         WHERE id = ?7",
        rusqlite::params![
            vendor,
            account,
            cost_center,
            note,
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            Status::Classified.as_str(),
            txn_id,
        ],
    )?;
    Ok(true)
}

fn resolve(conn: &Connection, table: &str, name: Option<&str>) -> Result<Option<String>> {
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    let found = conn
        .query_row(
            &format!("SELECT name FROM {table} WHERE name = ?1"),
            [name],
            |row| row.get::<_, String>(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use serde_json::json;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn insert_pending(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO transactions (date, description, card_member, amount, reference) \
             VALUES ('2025-06-01', 'AMAZON WEB SERVICES', 'Jane Doe', 42.50, 'R1')",
            [],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_parse_prediction_object() {
        let p = parse_prediction(json!({
            "vendor": "Amazon",
            "expense_account": "Hosting & Infrastructure",
            "cost_center": "General",
            "confidence": 0.92,
            "split_recommended": false
        }))
        .unwrap();
        assert_eq!(p.vendor.as_deref(), Some("Amazon"));
        assert_eq!(p.confidence, 0.92);
    }

    #[test]
    fn test_parse_prediction_unwraps_single_element_list() {
        let p = parse_prediction(json!([{ "vendor": "Uber", "confidence": 0.4 }])).unwrap();
        assert_eq!(p.vendor.as_deref(), Some("Uber"));
        assert!(!p.split_recommended);
    }

    #[test]
    fn test_parse_prediction_clamps_confidence() {
        let p = parse_prediction(json!({ "confidence": 1.7 })).unwrap();
        assert_eq!(p.confidence, 1.0);
        let p = parse_prediction(json!({ "confidence": -0.2 })).unwrap();
        assert_eq!(p.confidence, 0.0);
    }

    #[test]
    fn test_parse_prediction_rejects_garbage() {
        assert!(parse_prediction(json!("not an object")).is_none());
        assert!(parse_prediction(json!([])).is_none());
    }

    #[test]
    fn test_classifier_disabled_in_settings() {
        let settings = Settings {
            enable_ml_classification: false,
            ml_endpoint: "http://localhost:9".to_string(),
            ..Settings::default()
        };
        assert!(MlClassifier::from_settings(&settings).is_none());
    }

    #[test]
    fn test_low_confidence_stores_metadata_only() {
        let (_dir, conn) = test_db();
        let id = insert_pending(&conn);
        let prediction = Prediction {
            vendor: Some("Amazon".to_string()),
            expense_account: Some("Hosting & Infrastructure".to_string()),
            cost_center: Some("General".to_string()),
            confidence: 0.5,
            split_recommended: false,
        };
        let applied = apply_if_confident(&conn, id, &prediction, 0.85).unwrap();
        assert!(!applied);
        let (status, ml_conf): (String, f64) = conn
            .query_row(
                "SELECT status, ml_confidence FROM transactions WHERE id = ?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "Pending");
        assert_eq!(ml_conf, 0.5);
    }

    #[test]
    fn test_high_confidence_classifies_with_note() {
        let (_dir, conn) = test_db();
        let id = insert_pending(&conn);
        let prediction = Prediction {
            vendor: Some("Amazon".to_string()), // not in vendors table
            expense_account: Some("Hosting & Infrastructure".to_string()),
            cost_center: Some("General".to_string()),
            confidence: 0.92,
            split_recommended: false,
        };
        let applied = apply_if_confident(&conn, id, &prediction, 0.85).unwrap();
        assert!(applied);
        let (status, vendor, account, notes): (String, Option<String>, Option<String>, String) =
            conn.query_row(
                "SELECT status, vendor, expense_account, classification_notes \
                 FROM transactions WHERE id = ?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(status, "Classified");
        // Vendor falls back to unset when no matching entity exists.
        assert_eq!(vendor, None);
        assert_eq!(account.as_deref(), Some("Hosting & Infrastructure"));
        assert!(notes.contains("92%"), "note was {notes:?}");
    }

    #[test]
    fn test_unresolvable_account_stays_metadata_only() {
        let (_dir, conn) = test_db();
        let id = insert_pending(&conn);
        let prediction = Prediction {
            vendor: None,
            expense_account: Some("No Such Account".to_string()),
            cost_center: None,
            confidence: 0.99,
            split_recommended: true,
        };
        let applied = apply_if_confident(&conn, id, &prediction, 0.85).unwrap();
        assert!(!applied);
        let (status, split_rec): (String, i64) = conn
            .query_row(
                "SELECT status, ml_split_recommended FROM transactions WHERE id = ?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "Pending");
        assert_eq!(split_rec, 1);
    }
}
