//! Monthly accelerator bonuses.
//!
//! Each AE is walked independently through the months of a calendar year. The walk
//! carries `(cumulative ACV, cumulative new-logo count)`; after every month the state
//! is checked against [`ACCELERATOR_TIERS`] and the winning multiplier is applied to the
//! new-logo comp of the deals closed in that month only. The bonus earned in month `M`
//! is paid in month `M + 1` and is dropped when that would fall past December.

use crate::calculator::CompensatedDeal;
use crate::error::Result;
use crate::schema::AccountExecutive;
use crate::utils::validate_month;
use chrono::Datelike;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LAST_PAYMENT_MONTH: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceleratorTier {
    /// Attainment must be strictly greater than this.
    pub min_attainment: f64,
    pub min_new_logos: u32,
    pub multiplier: f64,
}

/// Ordered from the highest tier down; the first match wins.
pub const ACCELERATOR_TIERS: [AcceleratorTier; 4] = [
    AcceleratorTier {
        min_attainment: 2.0,
        min_new_logos: 5,
        multiplier: 2.0,
    },
    AcceleratorTier {
        min_attainment: 1.5,
        min_new_logos: 4,
        multiplier: 1.0,
    },
    AcceleratorTier {
        min_attainment: 1.25,
        min_new_logos: 4,
        multiplier: 0.5,
    },
    AcceleratorTier {
        min_attainment: 1.0,
        min_new_logos: 3,
        multiplier: 0.3,
    },
];

pub fn tier_for(attainment: f64, new_logos: u32) -> Option<&'static AcceleratorTier> {
    ACCELERATOR_TIERS
        .iter()
        .find(|tier| attainment > tier.min_attainment && new_logos >= tier.min_new_logos)
}

pub fn multiplier_for(attainment: f64, new_logos: u32) -> f64 {
    tier_for(attainment, new_logos).map_or(0.0, |tier| tier.multiplier)
}

/// Running totals for one AE, as of the end of `month`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcceleratorState {
    pub month: u32,
    pub cumulative_acv: f64,
    pub cumulative_new_logos: u32,
}

impl AcceleratorState {
    /// Moves to the next month, folding in the deals closed during it.
    pub fn advance(&self, month_deals: &[&CompensatedDeal]) -> Self {
        let acv: f64 = month_deals.iter().map(|d| d.deal.acv_or_zero()).sum();
        let new_logos = month_deals.iter().filter(|d| d.deal.is_new_logo()).count() as u32;

        Self {
            month: self.month + 1,
            cumulative_acv: self.cumulative_acv + acv,
            cumulative_new_logos: self.cumulative_new_logos + new_logos,
        }
    }

    pub fn attainment(&self, quota: f64) -> f64 {
        self.cumulative_acv / quota
    }
}

/// A bonus earned by performance through `earned_month`, paid in `payment_month`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceleratorRecord {
    pub ae: String,
    pub year: i32,
    pub payment_month: u32,
    pub earned_month: u32,
    /// Cumulative attainment at the end of `earned_month`.
    pub attainment: f64,
    pub cumulative_new_logos: u32,
    pub multiplier: f64,
    pub bonus: f64,
}

/// Walks one AE through months `1..=through_month`. Deals are pre-bucketed by close month.
pub fn walk_accelerator(
    ae: &str,
    quota: f64,
    year: i32,
    through_month: u32,
    deals_by_month: &BTreeMap<u32, Vec<&CompensatedDeal>>,
) -> Vec<AcceleratorRecord> {
    let mut state = AcceleratorState::default();
    let mut records = Vec::new();

    while state.month < through_month {
        let month_deals = deals_by_month
            .get(&(state.month + 1))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        state = state.advance(month_deals);

        let attainment = state.attainment(quota);
        let multiplier = multiplier_for(attainment, state.cumulative_new_logos);
        let month_new_logo_comp: f64 = month_deals.iter().map(|d| d.comp.new_logo_comp).sum();
        let bonus = month_new_logo_comp * multiplier;

        if bonus <= 0.0 {
            continue;
        }

        let payment_month = state.month + 1;
        if payment_month > LAST_PAYMENT_MONTH {
            debug!(
                "Dropping {:.2} accelerator earned by {} in {}-{:02}: payment would fall past December",
                bonus, ae, year, state.month
            );
            continue;
        }

        records.push(AcceleratorRecord {
            ae: ae.to_string(),
            year,
            payment_month,
            earned_month: state.month,
            attainment,
            cumulative_new_logos: state.cumulative_new_logos,
            multiplier,
            bonus,
        });
    }

    records
}

/// Accelerator records for every AE in the roster, in roster order then payment month.
pub fn compute_accelerators(
    deals: &[CompensatedDeal],
    roster: &[AccountExecutive],
    year: i32,
    through_month: u32,
) -> Result<Vec<AcceleratorRecord>> {
    validate_month(through_month)?;

    let mut buckets: BTreeMap<&str, BTreeMap<u32, Vec<&CompensatedDeal>>> = BTreeMap::new();
    for deal in deals {
        let (Some(ae), Some(close_date)) = (deal.deal.ae.as_deref(), deal.deal.close_date) else {
            continue;
        };
        if close_date.year() != year {
            continue;
        }
        buckets
            .entry(ae)
            .or_default()
            .entry(close_date.month())
            .or_default()
            .push(deal);
    }

    let empty = BTreeMap::new();
    let mut records = Vec::new();
    for ae in roster {
        let quota = ae.checked_quota()?;
        let deals_by_month = buckets.get(ae.ae_id.as_str()).unwrap_or(&empty);
        records.extend(walk_accelerator(
            &ae.ae_id,
            quota,
            year,
            through_month,
            deals_by_month,
        ));
    }

    debug!(
        "Computed {} accelerator record(s) for {} through month {}",
        records.len(),
        year,
        through_month
    );
    Ok(records)
}
