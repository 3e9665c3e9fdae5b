use crate::calculator::CompensatedDeal;
use crate::schema::DealType;
use crate::utils::first_day_of_month;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Headline figures over the whole enriched ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerOverview {
    pub total_acv: f64,
    pub total_services: f64,
    pub new_logos_count: usize,
    pub upsells_count: usize,
    /// AE with the highest total per-deal compensation.
    pub top_ae: Option<String>,
    /// Market with the highest total ACV.
    pub top_market: Option<String>,
    pub most_common_lead_source: Option<String>,
}

/// Key with the largest value; ties go to the smallest key.
fn arg_max<V: PartialOrd + Copy>(values: &BTreeMap<String, V>) -> Option<String> {
    let mut best: Option<(&String, V)> = None;
    for (key, value) in values {
        if best.map_or(true, |(_, top)| *value > top) {
            best = Some((key, *value));
        }
    }
    best.map(|(key, _)| key.clone())
}

impl LedgerOverview {
    pub fn from_deals(deals: &[CompensatedDeal]) -> Self {
        let mut comp_by_ae: BTreeMap<String, f64> = BTreeMap::new();
        let mut acv_by_market: BTreeMap<String, f64> = BTreeMap::new();
        let mut lead_sources: BTreeMap<String, usize> = BTreeMap::new();

        for d in deals {
            if let Some(ae) = &d.deal.ae {
                *comp_by_ae.entry(ae.clone()).or_default() += d.comp.total_comp;
            }
            if let Some(market) = &d.deal.market {
                *acv_by_market.entry(market.clone()).or_default() += d.deal.acv_or_zero();
            }
            if let Some(source) = &d.deal.lead_source {
                *lead_sources.entry(source.clone()).or_default() += 1;
            }
        }

        Self {
            total_acv: deals.iter().map(|d| d.deal.acv_or_zero()).sum(),
            total_services: deals.iter().map(|d| d.deal.services_or_zero()).sum(),
            new_logos_count: deals.iter().filter(|d| d.deal.is_new_logo()).count(),
            upsells_count: deals
                .iter()
                .filter(|d| d.deal.deal_type == DealType::Upsell)
                .count(),
            top_ae: arg_max(&comp_by_ae),
            top_market: arg_max(&acv_by_market),
            most_common_lead_source: arg_max(&lead_sources),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// First day of the close month.
    pub month: NaiveDate,
    pub acv: f64,
    pub services: f64,
}

/// ACV and services summed by close month. Deals without a close date are skipped.
pub fn monthly_trends(deals: &[CompensatedDeal]) -> Vec<MonthlyTrend> {
    let mut buckets: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for d in deals {
        if let Some(close) = d.deal.close_date {
            let bucket = buckets.entry(first_day_of_month(close)).or_default();
            bucket.0 += d.deal.acv_or_zero();
            bucket.1 += d.deal.services_or_zero();
        }
    }

    buckets
        .into_iter()
        .map(|(month, (acv, services))| MonthlyTrend {
            month,
            acv,
            services,
        })
        .collect()
}
