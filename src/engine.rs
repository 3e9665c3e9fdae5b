use crate::accelerator::{compute_accelerators, AcceleratorRecord, LAST_PAYMENT_MONTH};
use crate::calculator::{calculate_deal_compensation, CompensatedDeal};
use crate::error::{CompensationError, Result};
use crate::exceptions::apply_exceptions;
use crate::ingestion::{load, DataQualityReport, RawTable};
use crate::overview::{monthly_trends, LedgerOverview, MonthlyTrend};
use crate::schema::{AccountExecutive, CompensationConfig, Deal};
use crate::summary::{enrich_roster, summarize, AeCompensation, AeSummary, GlobalSummary};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// The immutable result of one full calculation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationSnapshot {
    pub evaluation_year: i32,
    pub deals: Vec<CompensatedDeal>,
    pub roster: Vec<AeCompensation>,
    pub accelerators: Vec<AcceleratorRecord>,
    pub quality: DataQualityReport,
}

impl CompensationSnapshot {
    pub fn summarize(
        &self,
        year: i32,
        month: Option<u32>,
    ) -> Result<(GlobalSummary, Vec<AeSummary>)> {
        summarize(&self.deals, &self.roster, &self.accelerators, year, month)
    }

    pub fn overview(&self) -> LedgerOverview {
        LedgerOverview::from_deals(&self.deals)
    }

    pub fn monthly_trends(&self) -> Vec<MonthlyTrend> {
        monthly_trends(&self.deals)
    }
}

/// Exceptions → per-deal comp → accelerators → enriched roster.
pub fn calculate_compensation(
    deals: &[Deal],
    roster: &[AccountExecutive],
    config: &CompensationConfig,
) -> Result<CompensationSnapshot> {
    let year = config.evaluation_year;
    info!(
        "Calculating compensation for {} deal rows and {} AEs (evaluation year {})",
        deals.len(),
        roster.len(),
        year
    );

    let ledger = apply_exceptions(deals, &config.exceptions, config.missing_deal_policy)?;
    let compensated = calculate_deal_compensation(&ledger, roster)?;
    let accelerators = compute_accelerators(&compensated, roster, year, LAST_PAYMENT_MONTH)?;
    let enriched = enrich_roster(&compensated, roster, &accelerators, year)?;

    debug!(
        "Pass complete: {} deal rows, {} accelerator record(s)",
        compensated.len(),
        accelerators.len()
    );

    Ok(CompensationSnapshot {
        evaluation_year: year,
        deals: compensated,
        roster: enriched,
        accelerators,
        quality: DataQualityReport::default(),
    })
}

/// Holds the currently published snapshot. Readers get an `Arc` to an immutable
/// snapshot; a recompute only replaces it once the whole pass has succeeded.
pub struct CompensationEngine {
    config: CompensationConfig,
    current: RwLock<Option<Arc<CompensationSnapshot>>>,
}

impl CompensationEngine {
    pub fn new(config: CompensationConfig) -> Self {
        Self {
            config,
            current: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &CompensationConfig {
        &self.config
    }

    pub fn recompute(
        &self,
        deals: &[Deal],
        roster: &[AccountExecutive],
    ) -> Result<Arc<CompensationSnapshot>> {
        let snapshot = calculate_compensation(deals, roster, &self.config)
            .inspect_err(|e| warn!("Recompute failed, keeping previous snapshot: {}", e))?;
        Ok(self.publish(snapshot))
    }

    /// Loads raw tables and recomputes. Data-quality findings travel with the snapshot.
    pub fn load_and_recompute(
        &self,
        raw_deals: &RawTable,
        raw_roster: &RawTable,
    ) -> Result<Arc<CompensationSnapshot>> {
        let loaded = load(raw_deals, raw_roster)
            .inspect_err(|e| warn!("Load failed, keeping previous snapshot: {}", e))?;
        let mut snapshot = calculate_compensation(&loaded.deals, &loaded.roster, &self.config)
            .inspect_err(|e| warn!("Recompute failed, keeping previous snapshot: {}", e))?;
        snapshot.quality = loaded.quality;
        Ok(self.publish(snapshot))
    }

    fn publish(&self, snapshot: CompensationSnapshot) -> Arc<CompensationSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(Arc::clone(&snapshot));
        info!(
            "Published compensation snapshot: {} deal rows, {} AEs",
            snapshot.deals.len(),
            snapshot.roster.len()
        );
        snapshot
    }

    pub fn snapshot(&self) -> Result<Arc<CompensationSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CompensationError::NoSnapshot)
    }

    pub fn summarize(
        &self,
        year: i32,
        month: Option<u32>,
    ) -> Result<(GlobalSummary, Vec<AeSummary>)> {
        self.snapshot()?.summarize(year, month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exceptions::DealException;
    use crate::schema::DealType;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn deals() -> Vec<Deal> {
        vec![
            Deal::new("X", "A", DealType::New, date(2024, 1, 10), 10_000.0, 0.0),
            Deal::new("Y", "B", DealType::Upsell, date(2024, 2, 10), 20_000.0, 1_000.0),
        ]
    }

    fn roster() -> Vec<AccountExecutive> {
        vec![
            AccountExecutive::new("A", 60_000.0, 100_000.0),
            AccountExecutive::new("B", 50_000.0, 100_000.0),
        ]
    }

    #[test]
    fn test_summarize_before_first_recompute() {
        let engine = CompensationEngine::new(CompensationConfig::new(2024));
        assert!(matches!(
            engine.summarize(2024, None),
            Err(CompensationError::NoSnapshot)
        ));
    }

    #[test]
    fn test_failed_recompute_keeps_previous_snapshot() {
        let engine = CompensationEngine::new(CompensationConfig::new(2024));
        let first = engine.recompute(&deals(), &roster()).unwrap();

        let mut broken = deals();
        broken[0].ae = Some("GHOST".to_string());
        assert!(engine.recompute(&broken, &roster()).is_err());

        let current = engine.snapshot().unwrap();
        assert!(Arc::ptr_eq(&first, &current));
    }

    #[test]
    fn test_recompute_replaces_snapshot_without_touching_readers() {
        let engine = CompensationEngine::new(
            CompensationConfig::new(2024).with_exceptions(vec![DealException::adjust_acv("X", 0.5)]),
        );
        let before = engine.recompute(&deals(), &roster()).unwrap();

        let mut more = deals();
        more.push(Deal::new("Z", "A", DealType::New, date(2024, 3, 1), 1_000.0, 0.0));
        let after = engine.recompute(&more, &roster()).unwrap();

        assert_eq!(before.deals.len(), 2);
        assert_eq!(after.deals.len(), 3);
        assert_eq!(before.deals[0].deal.acv, Some(5_000.0));
        assert!(Arc::ptr_eq(&after, &engine.snapshot().unwrap()));
    }

    #[test]
    fn test_load_and_recompute_carries_quality_report() {
        let raw_deals = RawTable::new(
            ["Opportunity ID", "Opportunity Owner", "Type", "Close Date", "ACV", "Services"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vec![["006A", "A", "New", "2024-01-10", "10000", "oops"]
                .iter()
                .map(|s| s.to_string())
                .collect()],
        );
        let raw_roster = RawTable::new(
            ["AE", "Base Salary (Annual)", "Quota"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vec![["A", "60000", "100000"].iter().map(|s| s.to_string()).collect()],
        );

        let engine = CompensationEngine::new(CompensationConfig::new(2024));
        let snapshot = engine.load_and_recompute(&raw_deals, &raw_roster).unwrap();
        assert_eq!(snapshot.quality.total_null_cells(), 1);
        assert_eq!(snapshot.deals[0].deal.services, None);
        assert_eq!(snapshot.deals[0].comp.services_comp, 0.0);
    }
}
