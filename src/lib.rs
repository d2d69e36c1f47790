//! # EVN Monitor - Electricity dashboard core for EVN customers
//!
//! Billing period resolution, residential tariff computation and
//! consumption aggregation for Vietnamese electricity (EVN) accounts, served
//! to a dashboard over a small HTTP API.
//!
//! ## Features
//!
//! - **Billing Cycles**: Calendar months or cycles starting on any day 1..=28
//! - **Tariff Engine**: Six-tier residential pricing with 8% VAT
//! - **Cumulative Attribution**: Daily costs that sum to the period total
//! - **Web Interface**: REST API for the dashboard cards
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `readings`: Daily readings, invoices and their normalization
//! - `billing`: Billing period resolver and period labels
//! - `tariff`: Tiered cost computation
//! - `summary`: Summary, trend and detail aggregates
//! - `persistence`: Per-account billing cycle store
//! - `accounts`: Account list and data files
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `web`: HTTP server and REST API

pub mod accounts;
pub mod billing;
pub mod config;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod readings;
pub mod summary;
pub mod tariff;
pub mod web;


// Re-export commonly used types
pub use billing::{BillingCycleConfig, BillingPeriod, CycleKind, CycleMode};
pub use config::Config;
pub use error::{EvnError, Result};
pub use persistence::BillingCycleStore;
pub use readings::{AccountData, DailyReading, MonthLabel, MonthlyBilledRecord};
pub use tariff::{CostBreakdown, compute_cost};
