use crate::error::{CompensationError, Result};
use crate::schema::{AccountExecutive, Deal, DealType, NEW_LOGO_PREMIUM, SERVICES_RATE};
use crate::utils::add_one_month;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compensation fields derived from a single deal row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub upsell_comp: f64,
    pub new_logo_comp: f64,
    pub services_comp: f64,
    pub total_comp: f64,
    /// When upsell and new-logo comp is paid. `None` if the close date is unknown.
    pub payment_date: Option<NaiveDate>,
    /// When services comp is paid: always one month after close, ignoring overrides.
    pub payment_date_service: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensatedDeal {
    #[serde(flatten)]
    pub deal: Deal,
    #[serde(flatten)]
    pub comp: DerivedFields,
}

/// Commission rates keyed by AE id, validated once per calculation pass.
#[derive(Debug, Clone)]
pub struct RateTable {
    rates: BTreeMap<String, f64>,
}

impl RateTable {
    pub fn from_roster(roster: &[AccountExecutive]) -> Result<Self> {
        let mut rates = BTreeMap::new();
        for ae in roster {
            let rate = ae.acv_rate()?;
            if rates.insert(ae.ae_id.clone(), rate).is_some() {
                return Err(CompensationError::DuplicateAe(ae.ae_id.clone()));
            }
        }
        Ok(Self { rates })
    }

    pub fn rate_for(&self, deal: &Deal) -> Result<f64> {
        deal.ae
            .as_ref()
            .and_then(|ae| self.rates.get(ae))
            .copied()
            .ok_or_else(|| CompensationError::UnknownAe {
                opportunity_id: deal.opportunity_id.clone(),
                ae: deal.ae.clone().unwrap_or_else(|| "<none>".to_string()),
            })
    }
}

/// Per-row compensation. Depends only on the deal and its owner's ACV rate.
pub fn derive_fields(deal: &Deal, acv_rate: f64) -> DerivedFields {
    let acv = deal.acv_or_zero();
    let services = deal.services_or_zero();

    let (upsell_comp, new_logo_comp) = match deal.deal_type {
        DealType::Upsell => (acv * acv_rate, 0.0),
        DealType::New => (0.0, acv * acv_rate * NEW_LOGO_PREMIUM),
        DealType::Other(_) => (0.0, 0.0),
    };
    let services_comp = services * SERVICES_RATE;

    let payment_date_service = deal.close_date.and_then(add_one_month);
    let payment_date = deal.payment_date_override.or(payment_date_service);

    DerivedFields {
        upsell_comp,
        new_logo_comp,
        services_comp,
        total_comp: upsell_comp + new_logo_comp + services_comp,
        payment_date,
        payment_date_service,
    }
}

/// Computes the derived fields for every row of the (post-exception) ledger.
pub fn calculate_deal_compensation(
    deals: &[Deal],
    roster: &[AccountExecutive],
) -> Result<Vec<CompensatedDeal>> {
    let rates = RateTable::from_roster(roster)?;

    let compensated = deals
        .iter()
        .map(|deal| -> Result<CompensatedDeal> {
            let rate = rates.rate_for(deal)?;
            Ok(CompensatedDeal {
                deal: deal.clone(),
                comp: derive_fields(deal, rate),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Calculated compensation for {} deal rows", compensated.len());
    Ok(compensated)
}
