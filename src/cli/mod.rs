pub mod batches;
pub mod classify;
pub mod import;
pub mod init;
pub mod post;
pub mod review;
pub mod rules;
pub mod status;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{CardpostError, Result};
use crate::models::Split;
use crate::settings::get_data_dir;

pub(crate) fn open() -> Result<Connection> {
    get_connection(&get_data_dir().join("cardpost.db"))
}

/// Parse a `--split` argument: `CostCenter:40%`, `CostCenter:25.00`, with
/// an optional trailing `:tag`.
pub(crate) fn parse_split(raw: &str) -> Result<Split> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(CardpostError::Validation(format!(
            "Invalid split '{raw}': expected CostCenter:AMOUNT or CostCenter:PCT%[:tag]"
        )));
    }
    let cost_center = parts[0].trim();
    if cost_center.is_empty() {
        return Err(CardpostError::Validation(format!(
            "Invalid split '{raw}': missing cost center"
        )));
    }
    let value = parts[1].trim();
    let tag = parts.get(2).map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

    let (amount, percentage) = if let Some(pct) = value.strip_suffix('%') {
        let pct: f64 = pct.trim().parse().map_err(|_| {
            CardpostError::Validation(format!("Invalid split percentage '{value}'"))
        })?;
        (None, Some(pct))
    } else {
        let amt: f64 = value.parse().map_err(|_| {
            CardpostError::Validation(format!("Invalid split amount '{value}'"))
        })?;
        (Some(amt), None)
    };

    Ok(Split {
        cost_center: cost_center.to_string(),
        amount,
        percentage,
        tag,
        notes: None,
    })
}

#[derive(Parser)]
#[command(name = "cardpost", about = "Classify credit-card statements and post balanced journal entries.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up cardpost: choose a data directory and initialize the database.
    Init {
        /// Path for cardpost data (default: ~/Documents/cardpost)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Import a statement CSV into a new batch.
    Import {
        /// Path to the statement CSV
        file: String,
        /// Liability account for this card (default: settings)
        #[arg(long)]
        account: Option<String>,
    },
    /// List transactions awaiting classification or approval.
    Review,
    /// Show classification suggestions for one transaction.
    Suggest {
        /// Transaction ID (shown in `cardpost review`)
        id: i64,
    },
    /// Classify a transaction.
    Classify {
        /// Transaction ID
        id: i64,
        /// Normalized vendor name
        #[arg(long)]
        vendor: Option<String>,
        /// Expense account to debit
        #[arg(long)]
        account: Option<String>,
        /// Cost center for the whole amount
        #[arg(long = "cost-center")]
        cost_center: Option<String>,
        /// Free-form classification notes
        #[arg(long)]
        notes: Option<String>,
        /// Cost center split: CostCenter:40% or CostCenter:25.00[:tag]; repeatable
        #[arg(long)]
        split: Vec<String>,
        /// Reviewer name recorded on the transaction
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Approve a classified transaction for posting.
    Approve {
        /// Transaction ID
        id: i64,
    },
    /// Post approved transactions to the ledger.
    Post {
        /// Transaction ID (omit with --all)
        id: Option<i64>,
        /// Post every approved transaction
        #[arg(long)]
        all: bool,
    },
    /// Reverse a posted transaction (cancels its journal entry).
    Reverse {
        /// Transaction ID
        id: i64,
    },
    /// Inspect and tune learned classification rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// List import batches.
    Batches,
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List learned rules by usage.
    List {
        /// Maximum rows to show
        #[arg(long, default_value = "25")]
        limit: i64,
    },
    /// Record whether a suggested rule was right.
    Feedback {
        /// Rule pattern (shown in `cardpost rules list`)
        pattern: String,
        /// Mark the suggestion as wrong instead of right
        #[arg(long)]
        reject: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_split_percentage() {
        let split = parse_split("Operations:40%").unwrap();
        assert_eq!(split.cost_center, "Operations");
        assert_eq!(split.percentage, Some(40.0));
        assert_eq!(split.amount, None);
        assert_eq!(split.tag, None);
    }

    #[test]
    fn test_parse_split_amount_with_tag() {
        let split = parse_split("General:25.00:client-a").unwrap();
        assert_eq!(split.cost_center, "General");
        assert_eq!(split.amount, Some(25.0));
        assert_eq!(split.tag.as_deref(), Some("client-a"));
    }

    #[test]
    fn test_parse_split_rejects_garbage() {
        assert!(parse_split("no-value").is_err());
        assert!(parse_split(":40%").is_err());
        assert!(parse_split("A:forty").is_err());
        assert!(parse_split("A:1:2:3").is_err());
    }
}
