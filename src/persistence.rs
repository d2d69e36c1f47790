//! Persistence of per-account billing cycle settings
//!
//! Billing cycles are stored as one JSON object keyed by account id, in the
//! same shape the dashboard keeps in its saved settings:
//! `{"PE0500123456": {"startDay": 15, "type": "cycle"}}`.

use crate::billing::{BillingCycleConfig, CycleKind};
use crate::error::Result;
use crate::logging::get_logger;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Account → billing cycle map, optionally backed by a JSON file
pub struct BillingCycleStore {
    file_path: Option<PathBuf>,
    cycles: BTreeMap<String, BillingCycleConfig>,
    logger: crate::logging::StructuredLogger,
}

impl BillingCycleStore {
    /// Create a store persisted at `file_path`
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: Some(file_path.as_ref().to_path_buf()),
            cycles: BTreeMap::new(),
            logger: get_logger("persistence"),
        }
    }

    /// Create a store that lives only in memory
    pub fn in_memory() -> Self {
        Self {
            file_path: None,
            cycles: BTreeMap::new(),
            logger: get_logger("persistence"),
        }
    }

    /// Load cycles from disk, keeping in-memory entries the file does not override
    pub fn load(&mut self) -> Result<()> {
        let Some(path) = self.file_path.as_deref() else {
            return Ok(());
        };

        if !path.exists() {
            self.logger
                .info("No billing cycle file found, using calendar defaults");
            return Ok(());
        }

        let contents = std::fs::read_to_string(path)?;
        let saved: BTreeMap<String, BillingCycleConfig> = serde_json::from_str(&contents)?;
        let mut loaded = 0;
        for (account, cycle) in saved {
            if cycle.validate().is_err() {
                self.logger.warn(&format!(
                    "Ignoring stored billing cycle for {} with start day {}",
                    account, cycle.start_day
                ));
                continue;
            }
            self.cycles.insert(account, cycle);
            loaded += 1;
        }
        self.logger
            .info(&format!("Loaded {} billing cycle(s) from disk", loaded));

        Ok(())
    }

    /// Save cycles to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.file_path.as_deref() else {
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(&self.cycles)?;
        std::fs::write(path, contents)?;
        self.logger.debug("Saved billing cycles to disk");

        Ok(())
    }

    /// Cycle for `account`; calendar month when none was configured
    pub fn get(&self, account: &str) -> BillingCycleConfig {
        self.cycles.get(account).copied().unwrap_or_default()
    }

    /// Whether `account` has an explicit configuration
    pub fn contains(&self, account: &str) -> bool {
        self.cycles.contains_key(account)
    }

    /// Configure the billing cycle of `account`
    ///
    /// Rejects start days outside 1..=28 without touching the store. The
    /// latest call wins. If writing to disk fails the previous entry is
    /// restored and the error returned.
    pub fn set_billing_cycle(
        &mut self,
        account: &str,
        start_day: u32,
        kind: CycleKind,
    ) -> Result<BillingCycleConfig> {
        let cycle = BillingCycleConfig::new(start_day, kind)?;
        let previous = self.cycles.insert(account.to_string(), cycle);

        if let Err(e) = self.save() {
            match previous {
                Some(old) => self.cycles.insert(account.to_string(), old),
                None => self.cycles.remove(account),
            };
            self.logger.error(&format!(
                "Failed to persist billing cycle for {}: {}",
                account, e
            ));
            return Err(e);
        }

        self.logger.info(&format!(
            "Billing cycle for {} set to {:?} from day {}",
            account, cycle.kind, cycle.start_day
        ));
        Ok(cycle)
    }

    /// All explicitly configured accounts
    pub fn entries(&self) -> impl Iterator<Item = (&str, &BillingCycleConfig)> {
        self.cycles.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Default for BillingCycleStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
