//! # Sales Compensation Engine
//!
//! A library for turning a CRM deal export and an AE roster into per-deal commissions,
//! quota-attainment accelerator bonuses and period summaries.
//!
//! ## Core Concepts
//!
//! - **Deal ledger**: One row per closed opportunity, owned by an account executive (AE)
//! - **Exceptions**: Ordered, declarative adjustments (split a shared deal, scale ACV,
//!   pay on close date) folded over the ledger before anything is calculated
//! - **Per-deal comp**: Upsell and new-logo comp on ACV, services comp on services revenue
//! - **Accelerators**: A month-by-month walk over cumulative attainment and new logos;
//!   every month a tier holds, that month's new-logo comp earns the tier multiplier as a
//!   bonus, paid the month after
//! - **Snapshots**: Every successful pass publishes an immutable snapshot that summaries
//!   are read from
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_comp_engine::*;
//! use chrono::NaiveDate;
//!
//! let deals = vec![Deal::new(
//!     "006A",
//!     "A",
//!     DealType::New,
//!     NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
//!     10_000.0,
//!     0.0,
//! )];
//! let roster = vec![AccountExecutive::new("A", 60_000.0, 100_000.0)];
//! let config = CompensationConfig::new(2024)
//!     .with_exceptions(vec![DealException::adjust_acv("006A", 0.5)]);
//!
//! let snapshot = process_compensation(&deals, &roster, &config).unwrap();
//! let (global, per_ae) = snapshot.summarize(2024, Some(2)).unwrap();
//! ```

pub mod accelerator;
pub mod calculator;
pub mod engine;
pub mod error;
pub mod exceptions;
pub mod export;
pub mod ingestion;
pub mod overview;
pub mod schema;
pub mod summary;
pub mod utils;

pub use accelerator::{
    compute_accelerators, multiplier_for, tier_for, AcceleratorRecord, AcceleratorState,
    AcceleratorTier, ACCELERATOR_TIERS,
};
pub use calculator::{calculate_deal_compensation, derive_fields, CompensatedDeal, DerivedFields};
pub use engine::{calculate_compensation, CompensationEngine, CompensationSnapshot};
pub use error::{CompensationError, Result};
pub use exceptions::{apply_exceptions, DealException};
pub use export::{write_ae_summary_csv, write_deals_csv, write_roster_csv};
pub use ingestion::{load, load_deals, load_roster, DataQualityReport, LoadedData, RawTable};
pub use overview::{monthly_trends, LedgerOverview, MonthlyTrend};
pub use schema::*;
pub use summary::{enrich_roster, summarize, AeCompensation, AeSummary, GlobalSummary};
pub use utils::*;

use log::{debug, info};
use std::collections::BTreeSet;

pub struct CompensationProcessor;

impl CompensationProcessor {
    pub fn process(
        deals: &[Deal],
        roster: &[AccountExecutive],
        config: &CompensationConfig,
    ) -> Result<CompensationSnapshot> {
        validate_config(config)?;

        info!(
            "Processing compensation for evaluation year {}",
            config.evaluation_year
        );
        debug!(
            "Configuration contains {} exception(s), missing-deal policy {:?}",
            config.exceptions.len(),
            config.missing_deal_policy
        );

        calculate_compensation(deals, roster, config)
    }

    /// Loads both raw tables, then processes them. The quality report is kept on the snapshot.
    pub fn process_raw(
        raw_deals: &RawTable,
        raw_roster: &RawTable,
        config: &CompensationConfig,
    ) -> Result<CompensationSnapshot> {
        let loaded = load(raw_deals, raw_roster)?;
        let mut snapshot = Self::process(&loaded.deals, &loaded.roster, config)?;
        snapshot.quality = loaded.quality;
        Ok(snapshot)
    }
}

pub fn process_compensation(
    deals: &[Deal],
    roster: &[AccountExecutive],
    config: &CompensationConfig,
) -> Result<CompensationSnapshot> {
    CompensationProcessor::process(deals, roster, config)
}

pub fn process_raw_tables(
    raw_deals: &RawTable,
    raw_roster: &RawTable,
    config: &CompensationConfig,
) -> Result<CompensationSnapshot> {
    CompensationProcessor::process_raw(raw_deals, raw_roster, config)
}

/// Checks every exception's parameters up front, so a bad entry late in the list
/// fails before any deal is touched.
pub fn validate_config(config: &CompensationConfig) -> Result<()> {
    for (idx, exception) in config.exceptions.iter().enumerate() {
        exception.validate(idx)?;
    }

    let mut adjusted = BTreeSet::new();
    for exception in &config.exceptions {
        if let DealException::AdjustAcv { deal_id, .. } = exception {
            if !adjusted.insert(deal_id.as_str()) {
                debug!("Deal {} has more than one ACV adjustment; factors compound", deal_id);
            }
        }
    }

    Ok(())
}
