use crate::accelerator::AcceleratorRecord;
use crate::calculator::CompensatedDeal;
use crate::error::Result;
use crate::schema::AccountExecutive;
use crate::utils::{falls_in_period, validate_optional_month};
use chrono::Datelike;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An AE roster row enriched with the results of a calculation pass for `evaluation_year`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AeCompensation {
    pub ae_id: String,
    pub base_salary_annual: f64,
    pub quota: f64,
    pub acv_rate: f64,
    pub evaluation_year: i32,
    pub new_count: u32,
    pub new_acv: f64,
    pub total_acv: f64,
    /// `new_acv / quota`.
    pub attainment: f64,
    pub upsell_comp: f64,
    pub new_logo_comp: f64,
    pub services_comp: f64,
    /// Sum of the accelerator records paid in `evaluation_year`.
    pub accelerator_bonus: f64,
    /// Variable comp plus accelerator; base salary is not included.
    pub total_comp: f64,
    pub ote: f64,
}

/// Attaches per-AE totals for deals closed in `year` and the accelerator bonus paid in it.
pub fn enrich_roster(
    deals: &[CompensatedDeal],
    roster: &[AccountExecutive],
    accelerators: &[AcceleratorRecord],
    year: i32,
) -> Result<Vec<AeCompensation>> {
    roster
        .iter()
        .map(|ae| -> Result<AeCompensation> {
            let quota = ae.checked_quota()?;
            let base_salary_annual = ae.base_salary()?;

            let own_deals: Vec<&CompensatedDeal> = deals
                .iter()
                .filter(|d| d.deal.ae.as_deref() == Some(ae.ae_id.as_str()))
                .filter(|d| d.deal.close_date.map_or(false, |c| c.year() == year))
                .collect();

            let new_deals = || own_deals.iter().filter(|d| d.deal.is_new_logo());
            let new_count = new_deals().count() as u32;
            let new_acv: f64 = new_deals().map(|d| d.deal.acv_or_zero()).sum();

            let upsell_comp: f64 = own_deals.iter().map(|d| d.comp.upsell_comp).sum();
            let new_logo_comp: f64 = own_deals.iter().map(|d| d.comp.new_logo_comp).sum();
            let services_comp: f64 = own_deals.iter().map(|d| d.comp.services_comp).sum();
            let accelerator_bonus: f64 = accelerators
                .iter()
                .filter(|r| r.ae == ae.ae_id && r.year == year)
                .map(|r| r.bonus)
                .sum();

            Ok(AeCompensation {
                ae_id: ae.ae_id.clone(),
                base_salary_annual,
                quota,
                acv_rate: base_salary_annual / quota,
                evaluation_year: year,
                new_count,
                new_acv,
                total_acv: own_deals.iter().map(|d| d.deal.acv_or_zero()).sum(),
                attainment: new_acv / quota,
                upsell_comp,
                new_logo_comp,
                services_comp,
                accelerator_bonus,
                total_comp: upsell_comp + new_logo_comp + services_comp + accelerator_bonus,
                ote: base_salary_annual * 2.0,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub year: i32,
    pub month: Option<u32>,
    pub total_upsell_comp: f64,
    pub total_new_logo_comp: f64,
    pub total_services_comp: f64,
    pub total_accelerator_bonus: f64,
    pub total_acv: f64,
    pub total_base_salary: f64,
    pub total_compensation: f64,
}

impl GlobalSummary {
    /// Named totals, as consumed by dashboard cards.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("total_upsell_comp".to_string(), self.total_upsell_comp),
            ("total_new_logo_comp".to_string(), self.total_new_logo_comp),
            ("total_services_comp".to_string(), self.total_services_comp),
            (
                "total_accelerator_bonus".to_string(),
                self.total_accelerator_bonus,
            ),
            ("total_acv".to_string(), self.total_acv),
            ("total_base_salary".to_string(), self.total_base_salary),
            ("total_compensation".to_string(), self.total_compensation),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AeSummary {
    pub ae: String,
    pub total_upsell_comp: f64,
    pub total_new_logo_comp: f64,
    pub total_services_comp: f64,
    pub total_acv: f64,
    pub accelerator_bonus: f64,
    /// Annual base, or one twelfth of it when a single month is summarized.
    pub base_salary: f64,
    pub total_compensation: f64,
}

#[derive(Default)]
struct Totals {
    upsell: f64,
    new_logo: f64,
    services: f64,
    acv: f64,
}

/// Accelerator bonus for one AE in the requested window. The annual view of the
/// evaluation year reads the roster's attached column; any other window selects the
/// records by payment month. Bonuses are never prorated.
fn accelerator_for(
    ae: &AeCompensation,
    accelerators: &[AcceleratorRecord],
    year: i32,
    month: Option<u32>,
) -> f64 {
    if month.is_none() && ae.evaluation_year == year {
        return ae.accelerator_bonus;
    }
    accelerators
        .iter()
        .filter(|r| r.ae == ae.ae_id && r.year == year)
        .filter(|r| month.map_or(true, |m| r.payment_month == m))
        .map(|r| r.bonus)
        .sum()
}

/// Builds the global and per-AE compensation summary for `year` (and `month`).
///
/// Upsell and new-logo comp are bucketed by `payment_date`, services comp by
/// `payment_date_service`. AEs without deals in the window appear with zeros.
pub fn summarize(
    deals: &[CompensatedDeal],
    roster: &[AeCompensation],
    accelerators: &[AcceleratorRecord],
    year: i32,
    month: Option<u32>,
) -> Result<(GlobalSummary, Vec<AeSummary>)> {
    validate_optional_month(month)?;

    let mut totals: BTreeMap<&str, Totals> = BTreeMap::new();
    for deal in deals {
        let Some(ae) = deal.deal.ae.as_deref() else {
            continue;
        };
        let entry = totals.entry(ae).or_default();

        if deal
            .comp
            .payment_date
            .map_or(false, |d| falls_in_period(d, year, month))
        {
            entry.upsell += deal.comp.upsell_comp;
            entry.new_logo += deal.comp.new_logo_comp;
            entry.acv += deal.deal.acv_or_zero();
        }
        if deal
            .comp
            .payment_date_service
            .map_or(false, |d| falls_in_period(d, year, month))
        {
            entry.services += deal.comp.services_comp;
        }
    }

    let proration = if month.is_some() { 1.0 / 12.0 } else { 1.0 };
    let empty = Totals::default();

    let per_ae: Vec<AeSummary> = roster
        .iter()
        .map(|ae| {
            let t = totals.get(ae.ae_id.as_str()).unwrap_or(&empty);
            let accelerator_bonus = accelerator_for(ae, accelerators, year, month);
            let base_salary = ae.base_salary_annual * proration;

            AeSummary {
                ae: ae.ae_id.clone(),
                total_upsell_comp: t.upsell,
                total_new_logo_comp: t.new_logo,
                total_services_comp: t.services,
                total_acv: t.acv,
                accelerator_bonus,
                base_salary,
                total_compensation: t.upsell
                    + t.new_logo
                    + t.services
                    + accelerator_bonus
                    + base_salary,
            }
        })
        .collect();

    let global = GlobalSummary {
        year,
        month,
        total_upsell_comp: per_ae.iter().map(|s| s.total_upsell_comp).sum(),
        total_new_logo_comp: per_ae.iter().map(|s| s.total_new_logo_comp).sum(),
        total_services_comp: per_ae.iter().map(|s| s.total_services_comp).sum(),
        total_accelerator_bonus: per_ae.iter().map(|s| s.accelerator_bonus).sum(),
        total_acv: per_ae.iter().map(|s| s.total_acv).sum(),
        total_base_salary: per_ae.iter().map(|s| s.base_salary).sum(),
        total_compensation: per_ae.iter().map(|s| s.total_compensation).sum(),
    };

    debug!(
        "Summarized {} AE(s) for {}{}: total compensation {:.2}",
        per_ae.len(),
        year,
        month.map(|m| format!("-{:02}", m)).unwrap_or_default(),
        global.total_compensation
    );

    Ok((global, per_ae))
}
