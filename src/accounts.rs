//! Account list and per-account data files
//!
//! The integration writes one JSON file per EVN customer id into its data
//! directory. This module reads those files; fetching from EVN itself is the
//! integration's job.

use crate::error::{EvnError, Result};
use crate::logging::{LogContext, get_logger_with_context};
use crate::readings::AccountData;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Parse the configured accounts list
///
/// Accepts `[{"userevn": "PE..."}]` as stored by the integration options, or
/// a plain array of ids. Anything else is a configuration error.
pub fn parse_accounts(accounts_json: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(accounts_json)
        .map_err(|e| EvnError::config(format!("Accounts data is not valid JSON: {}", e)))?;
    let items = value
        .as_array()
        .ok_or_else(|| EvnError::config("Accounts data must be a JSON array"))?;

    items
        .iter()
        .map(|item| {
            let id = match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map.get("userevn").and_then(Value::as_str),
                _ => None,
            };
            id.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| EvnError::config(format!("Invalid account entry: {}", item)))
        })
        .collect()
}

/// Reject ids that could escape the data directory
pub fn validate_account_id(account: &str) -> Result<()> {
    let ok = !account.is_empty()
        && account
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(EvnError::validation(
            "account",
            format!("Invalid account id '{}'", account),
        ))
    }
}

/// Reads account data files from a directory
#[derive(Debug, Clone)]
pub struct AccountRepository {
    data_dir: PathBuf,
}

impl AccountRepository {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the data file for `account`
    pub fn path_for(&self, account: &str) -> Result<PathBuf> {
        validate_account_id(account)?;
        Ok(self.data_dir.join(format!("{}.json", account)))
    }

    /// Load and normalize the data of `account`; a missing file is empty data
    pub fn load(&self, account: &str) -> Result<AccountData> {
        let path = self.path_for(account)?;
        let logger = get_logger_with_context(
            LogContext::new("accounts").with_account(account.to_string()),
        );

        if !path.exists() {
            logger.debug(&format!("No data file at {}", path.display()));
            return Ok(AccountData::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let data = AccountData::from_storage_json(&contents)?;
        logger.debug(&format!(
            "Loaded {} daily reading(s) and {} invoice(s)",
            data.daily.len(),
            data.monthly.len()
        ));
        Ok(data)
    }

    /// Accounts that have a data file, sorted
    pub fn discover(&self) -> Result<Vec<String>> {
        if !self.data_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut accounts: Vec<String> = std::fs::read_dir(&self.data_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .filter(|id| validate_account_id(id).is_ok())
            .collect();
        accounts.sort();
        Ok(accounts)
    }
}
