use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::detector;
use crate::error::Result;
use crate::models::{ParsedRow, Status};

/// Outcome of one statement file import.
#[derive(Debug, Default)]
pub struct ImportResult {
    pub batch_id: i64,
    pub total: i64,
    pub pending: i64,
    pub duplicates: i64,
    pub excluded: i64,
    pub skipped: i64,
    /// Set when the identical file (by checksum) was imported before; no
    /// rows are written in that case.
    pub duplicate_file: bool,
}

/// Parse a statement amount cell: strips quotes, currency symbol and
/// thousands separators; a parenthesized value is negative. None when the
/// cell is empty or not numeric.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut s = raw.trim().replace(['"', '\'', '$', ','], "");
    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }
    let value: f64 = s.trim().parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Statement dates arrive as MM/DD/YYYY; ISO dates pass through. None for
/// anything else.
pub fn parse_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    None
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

/// Parse the statement CSV into rows. Columns are located by header name,
/// so extra columns and reordering are tolerated. Rows with an empty date
/// or an unparsable amount are skipped; a present-but-garbled date falls
/// back to today.
pub fn parse_csv(contents: &str) -> Result<(Vec<ParsedRow>, i64)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(contents.as_bytes());
    let headers = reader.headers()?.clone();

    let col_date = column_index(&headers, "Date");
    let col_description = column_index(&headers, "Description");
    let col_member = column_index(&headers, "Card Member");
    let col_account = column_index(&headers, "Account #");
    let col_amount = column_index(&headers, "Amount");
    let col_reference = column_index(&headers, "Reference");
    let col_category = column_index(&headers, "Category");

    let cell = |record: &csv::StringRecord, idx: Option<usize>| -> String {
        idx.and_then(|i| record.get(i))
            .unwrap_or("")
            .trim()
            .to_string()
    };

    let mut rows = Vec::new();
    let mut skipped = 0;
    for record in reader.records() {
        let record = record?;
        let raw_date = cell(&record, col_date);
        let raw_amount = cell(&record, col_amount);
        if raw_date.is_empty() || raw_amount.is_empty() {
            skipped += 1;
            continue;
        }
        let Some(amount) = parse_amount(&raw_amount) else {
            skipped += 1;
            continue;
        };
        let date = parse_date(&raw_date)
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string());

        rows.push(ParsedRow {
            date,
            description: cell(&record, col_description),
            card_member: cell(&record, col_member),
            account_number: cell(&record, col_account),
            amount,
            reference: cell(&record, col_reference).replace(['"', '\''], ""),
            category: cell(&record, col_category),
        });
    }
    Ok((rows, skipped))
}

/// Import a statement file: one batch row plus one transaction per usable
/// CSV row. Each row is screened on insert, so a reference repeated within
/// the same file is caught as a duplicate too. Re-importing a byte-identical
/// file is a no-op flagged on the result.
pub fn import_file(
    conn: &Connection,
    path: &Path,
    card_account: Option<&str>,
) -> Result<ImportResult> {
    let contents = fs::read_to_string(path)?;
    let checksum = hex::encode(Sha256::digest(contents.as_bytes()));

    if let Some(existing) = batch_by_checksum(conn, &checksum)? {
        return Ok(ImportResult {
            batch_id: existing,
            duplicate_file: true,
            ..ImportResult::default()
        });
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    conn.execute(
        "INSERT INTO batches (filename, checksum, card_account, status) \
         VALUES (?1, ?2, ?3, 'Draft')",
        rusqlite::params![filename, checksum, card_account],
    )?;
    let batch_id = conn.last_insert_rowid();

    let outcome = ingest(conn, batch_id, card_account, &contents);
    match outcome {
        Ok(result) => {
            conn.execute(
                "UPDATE batches SET total_count = ?1, pending_count = ?2, \
                     duplicate_count = ?3, excluded_count = ?4, status = 'In Review' \
                 WHERE id = ?5",
                rusqlite::params![
                    result.total,
                    result.pending,
                    result.duplicates,
                    result.excluded,
                    batch_id
                ],
            )?;
            Ok(result)
        }
        Err(e) => {
            conn.execute("UPDATE batches SET status = 'Error' WHERE id = ?1", [batch_id])?;
            Err(e)
        }
    }
}

fn ingest(
    conn: &Connection,
    batch_id: i64,
    card_account: Option<&str>,
    contents: &str,
) -> Result<ImportResult> {
    let (rows, skipped) = parse_csv(contents)?;

    let mut result = ImportResult {
        batch_id,
        skipped,
        ..ImportResult::default()
    };
    for row in rows {
        let is_duplicate = detector::is_duplicate_reference(conn, &row.reference)?;
        let is_excluded = !is_duplicate && detector::is_excluded(&row.description, row.amount);
        let status = if is_duplicate {
            result.duplicates += 1;
            Status::Duplicate
        } else if is_excluded {
            result.excluded += 1;
            Status::Excluded
        } else {
            result.pending += 1;
            Status::Pending
        };
        result.total += 1;

        conn.execute(
            "INSERT INTO transactions (batch_id, card_account, date, description, card_member, \
                 account_number, amount, reference, category, is_duplicate, is_excluded, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                batch_id,
                card_account,
                row.date,
                row.description,
                row.card_member,
                row.account_number,
                row.amount,
                row.reference,
                row.category,
                is_duplicate as i64,
                is_excluded as i64,
                status.as_str(),
            ],
        )?;
    }
    Ok(result)
}

fn batch_by_checksum(conn: &Connection, checksum: &str) -> Result<Option<i64>> {
    let found = conn
        .query_row(
            "SELECT id FROM batches WHERE checksum = ?1",
            [checksum],
            |row| row.get(0),
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
    use std::io::Write;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn write_csv(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    const HEADER: &str = "Date,Description,Card Member,Account #,Amount,Reference,Category\n";

    #[test]
    fn test_parse_amount_variants() {
        assert_eq!(parse_amount("42.50"), Some(42.5));
        assert_eq!(parse_amount("$1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("\"$99.00\""), Some(99.0));
        assert_eq!(parse_amount("(50.00)"), Some(-50.0));
        assert_eq!(parse_amount("-12.34"), Some(-12.34));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("06/01/2025").as_deref(), Some("2025-06-01"));
        assert_eq!(parse_date("2025-06-01").as_deref(), Some("2025-06-01"));
        assert_eq!(parse_date("June 1"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_import_basic_batch() {
        let (dir, conn) = test_db();
        let path = write_csv(
            &dir,
            "statement.csv",
            &format!(
                "{HEADER}\
                 06/01/2025,AMAZON WEB SERVICES,Jane Doe,-11007,42.50,REF001,Computer Supplies\n\
                 06/02/2025,UBER TRIP,Jane Doe,-11007,18.00,REF002,Transportation\n"
            ),
        );
        let result = import_file(&conn, &path, Some("Amex 1007")).unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.pending, 2);
        assert_eq!(result.duplicates, 0);
        assert!(!result.duplicate_file);

        let (status, pending): (String, i64) = conn
            .query_row(
                "SELECT status, pending_count FROM batches WHERE id = ?1",
                [result.batch_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "In Review");
        assert_eq!(pending, 2);

        let card: String = conn
            .query_row(
                "SELECT card_account FROM transactions WHERE reference = 'REF001'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(card, "Amex 1007");
    }

    #[test]
    fn test_import_flags_payments_and_credits() {
        let (dir, conn) = test_db();
        let path = write_csv(
            &dir,
            "statement.csv",
            &format!(
                "{HEADER}\
                 06/01/2025,ONLINE PAYMENT - THANK YOU,Jane Doe,,-250.00,REF010,\n\
                 06/02/2025,AMAZON REFUND,Jane Doe,,(12.00),REF011,\n\
                 06/03/2025,STARBUCKS,Jane Doe,,5.75,REF012,Dining\n"
            ),
        );
        let result = import_file(&conn, &path, None).unwrap();
        assert_eq!(result.excluded, 2);
        assert_eq!(result.pending, 1);
        let status: String = conn
            .query_row(
                "SELECT status FROM transactions WHERE reference = 'REF011'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(status, "Excluded");
    }

    #[test]
    fn test_repeated_reference_in_same_file_is_duplicate() {
        let (dir, conn) = test_db();
        let path = write_csv(
            &dir,
            "statement.csv",
            &format!(
                "{HEADER}\
                 06/01/2025,AMAZON,Jane Doe,,42.50,ABC123,\n\
                 06/01/2025,AMAZON,Jane Doe,,42.50,ABC123,\n"
            ),
        );
        let result = import_file(&conn, &path, None).unwrap();
        assert_eq!(result.pending, 1);
        assert_eq!(result.duplicates, 1);
        let dup_status: String = conn
            .query_row(
                "SELECT status FROM transactions WHERE is_duplicate = 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(dup_status, "Duplicate");
    }

    #[test]
    fn test_reference_seen_in_earlier_batch_is_duplicate() {
        let (dir, conn) = test_db();
        let first = write_csv(
            &dir,
            "june.csv",
            &format!("{HEADER}06/01/2025,AMAZON,Jane Doe,,42.50,ABC123,\n"),
        );
        import_file(&conn, &first, None).unwrap();
        let second = write_csv(
            &dir,
            "july.csv",
            &format!("{HEADER}07/01/2025,AMAZON,Jane Doe,,42.50,ABC123,\n"),
        );
        let result = import_file(&conn, &second, None).unwrap();
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.pending, 0);
    }

    #[test]
    fn test_identical_file_reimport_is_noop() {
        let (dir, conn) = test_db();
        let path = write_csv(
            &dir,
            "statement.csv",
            &format!("{HEADER}06/01/2025,AMAZON,Jane Doe,,42.50,REF001,\n"),
        );
        let first = import_file(&conn, &path, None).unwrap();
        let second = import_file(&conn, &path, None).unwrap();
        assert!(second.duplicate_file);
        assert_eq!(second.batch_id, first.batch_id);
        assert_eq!(second.total, 0);
        let rows: i64 = conn
            .query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_rows_missing_date_or_amount_are_skipped() {
        let (dir, conn) = test_db();
        let path = write_csv(
            &dir,
            "statement.csv",
            &format!(
                "{HEADER}\
                 ,AMAZON,Jane Doe,,42.50,REF001,\n\
                 06/02/2025,UBER,Jane Doe,,,REF002,\n\
                 06/03/2025,STARBUCKS,Jane Doe,,not-a-number,REF003,\n\
                 06/04/2025,GITHUB,Jane Doe,,4.00,REF004,\n"
            ),
        );
        let result = import_file(&conn, &path, None).unwrap();
        assert_eq!(result.skipped, 3);
        assert_eq!(result.total, 1);
    }

    #[test]
    fn test_extra_and_reordered_columns_tolerated() {
        let (dir, conn) = test_db();
        let path = write_csv(
            &dir,
            "statement.csv",
            "Reference,Amount,Extra,Date,Description,Card Member\n\
             REF001,42.50,whatever,06/01/2025,AMAZON,Jane Doe\n",
        );
        let result = import_file(&conn, &path, None).unwrap();
        assert_eq!(result.pending, 1);
        let (desc, amount): (String, f64) = conn
            .query_row(
                "SELECT description, amount FROM transactions WHERE reference = 'REF001'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(desc, "AMAZON");
        assert_eq!(amount, 42.5);
    }

    #[test]
    fn test_reference_quotes_stripped() {
        let (dir, conn) = test_db();
        let path = write_csv(
            &dir,
            "statement.csv",
            &format!("{HEADER}06/01/2025,AMAZON,Jane Doe,,42.50,\"'REF001'\",\n"),
        );
        import_file(&conn, &path, None).unwrap();
        let reference: String = conn
            .query_row("SELECT reference FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(reference, "REF001");
    }

    #[test]
    fn test_unparsable_date_falls_back_to_today() {
        let (dir, conn) = test_db();
        let path = write_csv(
            &dir,
            "statement.csv",
            &format!("{HEADER}garbled,AMAZON,Jane Doe,,42.50,REF001,\n"),
        );
        let result = import_file(&conn, &path, None).unwrap();
        assert_eq!(result.total, 1);
        let date: String = conn
            .query_row("SELECT date FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(date, Local::now().format("%Y-%m-%d").to_string());
    }
}
