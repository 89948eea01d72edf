use crate::error::{CardpostError, Result};

/// Lifecycle states for an imported statement row. `Duplicate` and
/// `Excluded` are terminal pre-review states; `Posted` can only be left
/// through an explicit reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Classified,
    Approved,
    Posted,
    Duplicate,
    Excluded,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Classified => "Classified",
            Self::Approved => "Approved",
            Self::Posted => "Posted",
            Self::Duplicate => "Duplicate",
            Self::Excluded => "Excluded",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Classified" => Ok(Self::Classified),
            "Approved" => Ok(Self::Approved),
            "Posted" => Ok(Self::Posted),
            "Duplicate" => Ok(Self::Duplicate),
            "Excluded" => Ok(Self::Excluded),
            other => Err(CardpostError::Other(format!("Unknown status: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: i64,
    pub batch_id: Option<i64>,
    pub card_account: Option<String>,
    pub date: String,
    pub description: String,
    pub card_member: String,
    pub account_number: Option<String>,
    /// Signed statement amount. Negative means a credit or payment; the
    /// sign is fixed at import and never changes.
    pub amount: f64,
    pub reference: String,
    pub category: Option<String>,
    pub vendor: Option<String>,
    pub expense_account: Option<String>,
    pub cost_center: Option<String>,
    pub classification_notes: Option<String>,
    pub classified_by: Option<String>,
    pub is_duplicate: bool,
    pub is_excluded: bool,
    pub status: Status,
    pub journal_entry_id: Option<i64>,
}

/// One allocation of a transaction across cost centers. Either `amount`
/// or `percentage` is set; the entry builder turns percentages into
/// amounts exactly once at posting time.
#[derive(Debug, Clone)]
pub struct Split {
    pub cost_center: String,
    pub amount: Option<f64>,
    pub percentage: Option<f64>,
    pub tag: Option<String>,
    pub notes: Option<String>,
}

/// A learned vendor classification, keyed by normalized vendor pattern.
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: String,
    pub vendor: Option<String>,
    pub expense_account: Option<String>,
    pub cost_center: Option<String>,
    pub confidence: f64,
    pub use_count: i64,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub id: i64,
    pub filename: String,
    pub card_account: Option<String>,
    pub total_count: i64,
    pub pending_count: i64,
    pub duplicate_count: i64,
    pub excluded_count: i64,
    pub processed_count: i64,
    pub status: String,
}

/// One debit-or-credit line of a journal entry. The counterparty, when
/// required by the liability account's type, rides on the credit line.
#[derive(Debug, Clone)]
pub struct JournalLine {
    pub account: String,
    pub cost_center: Option<String>,
    pub debit: f64,
    pub credit: f64,
    pub party: Option<String>,
    pub tag: Option<String>,
}

/// A balanced entry ready for submission to the ledger. Never mutated
/// after submission; reversal cancels the whole entry.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub posting_date: String,
    pub remark: String,
    pub lines: Vec<JournalLine>,
}

/// Intermediate representation of one statement CSV row before DB insert.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub date: String,
    pub description: String,
    pub card_member: String,
    pub account_number: String,
    pub amount: f64,
    pub reference: String,
    pub category: String,
}
