use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    checksum TEXT,
    card_account TEXT,
    import_date TEXT DEFAULT (datetime('now')),
    total_count INTEGER DEFAULT 0,
    pending_count INTEGER DEFAULT 0,
    duplicate_count INTEGER DEFAULT 0,
    excluded_count INTEGER DEFAULT 0,
    processed_count INTEGER DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'Draft'
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    batch_id INTEGER,
    card_account TEXT,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    card_member TEXT NOT NULL DEFAULT '',
    account_number TEXT,
    amount REAL NOT NULL,
    reference TEXT NOT NULL DEFAULT '',
    category TEXT,
    vendor TEXT,
    expense_account TEXT,
    cost_center TEXT,
    classification_notes TEXT,
    classified_by TEXT,
    classification_date TEXT,
    is_duplicate INTEGER NOT NULL DEFAULT 0,
    is_excluded INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'Pending',
    journal_entry_id INTEGER,
    posted_date TEXT,
    ml_vendor TEXT,
    ml_account TEXT,
    ml_cost_center TEXT,
    ml_confidence REAL,
    ml_split_recommended INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (batch_id) REFERENCES batches(id),
    FOREIGN KEY (journal_entry_id) REFERENCES journal_entries(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_reference ON transactions(reference);
CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status);

CREATE TABLE IF NOT EXISTS splits (
    id INTEGER PRIMARY KEY,
    transaction_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    cost_center TEXT NOT NULL,
    amount REAL,
    percentage REAL,
    tag TEXT,
    notes TEXT,
    FOREIGN KEY (transaction_id) REFERENCES transactions(id)
);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    vendor_pattern TEXT NOT NULL UNIQUE,
    matched_vendor TEXT,
    expense_account TEXT,
    cost_center TEXT,
    confidence REAL NOT NULL DEFAULT 0.7,
    use_count INTEGER NOT NULL DEFAULT 0,
    last_used TEXT,
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    account_type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cost_centers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS vendors (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS journal_entries (
    id INTEGER PRIMARY KEY,
    posting_date TEXT NOT NULL,
    remark TEXT,
    status TEXT NOT NULL DEFAULT 'Submitted',
    created_at TEXT DEFAULT (datetime('now')),
    cancelled_at TEXT
);

CREATE TABLE IF NOT EXISTS journal_lines (
    id INTEGER PRIMARY KEY,
    entry_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    account TEXT NOT NULL,
    cost_center TEXT,
    debit REAL NOT NULL DEFAULT 0,
    credit REAL NOT NULL DEFAULT 0,
    party TEXT,
    tag TEXT,
    FOREIGN KEY (entry_id) REFERENCES journal_entries(id)
);
";

// (name, account_type)
const DEFAULT_ACCOUNTS: &[(&str, &str)] = &[
    ("Card Payable", "payable"),
    ("Software & Subscriptions", "expense"),
    ("Hosting & Infrastructure", "expense"),
    ("Advertising & Marketing", "expense"),
    ("Office Expense", "expense"),
    ("Professional Services", "expense"),
    ("Travel", "expense"),
    ("Meals", "expense"),
    ("Equipment", "expense"),
    ("Uncategorized", "expense"),
];

const DEFAULT_COST_CENTERS: &[&str] = &["General", "Operations"];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM accounts", [], |row| row.get(0))?;
    if count == 0 {
        for (name, account_type) in DEFAULT_ACCOUNTS {
            conn.execute(
                "INSERT INTO accounts (name, account_type) VALUES (?1, ?2)",
                rusqlite::params![name, account_type],
            )?;
        }
        for name in DEFAULT_COST_CENTERS {
            conn.execute("INSERT INTO cost_centers (name) VALUES (?1)", [name])?;
        }
    }
    Ok(())
}
