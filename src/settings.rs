use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CardpostError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Default liability account credited on each expense when the batch
    /// does not carry a card account of its own.
    #[serde(default = "default_liability_account")]
    pub liability_account: String,
    /// Party attached to the credit line when the liability account needs
    /// a counterparty and the transaction has no vendor.
    #[serde(default = "default_card_issuer_party")]
    pub card_issuer_party: String,
    #[serde(default)]
    pub require_vendor_for_posting: bool,
    #[serde(default)]
    pub enable_ml_classification: bool,
    #[serde(default)]
    pub ml_endpoint: String,
    #[serde(default = "default_ml_threshold")]
    pub ml_auto_accept_threshold: f64,
    #[serde(default = "default_ml_timeout_secs")]
    pub ml_timeout_secs: u64,
    #[serde(default)]
    pub enable_vendor_enrichment: bool,
    #[serde(default)]
    pub enrichment_endpoint: String,
}

fn default_liability_account() -> String {
    "Card Payable".to_string()
}

fn default_card_issuer_party() -> String {
    "Card Issuer".to_string()
}

fn default_ml_threshold() -> f64 {
    0.85
}

fn default_ml_timeout_secs() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            liability_account: default_liability_account(),
            card_issuer_party: default_card_issuer_party(),
            require_vendor_for_posting: false,
            enable_ml_classification: false,
            ml_endpoint: String::new(),
            ml_auto_accept_threshold: default_ml_threshold(),
            ml_timeout_secs: default_ml_timeout_secs(),
            enable_vendor_enrichment: false,
            enrichment_endpoint: String::new(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("cardpost")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("cardpost")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CardpostError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}
