use crate::error::{CompensationError, Result};
use crate::schema::{Deal, DealType, MissingDealPolicy};
use crate::utils::add_one_month;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Regions whose unbilled upsells are paid from the close date.
pub const CLOSE_DATE_PAYMENT_REGIONS: [&str; 2] = ["NOLA", "SOLA"];

/// A manual correction applied to the deal ledger before any compensation math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DealException {
    /// Split one opportunity across several AEs.
    /// The current owner's row keeps its own share; every other AE in `shares` gets a
    /// copy of the row scaled by their share. Shares are not required to sum to 1.0;
    /// when they don't, the total recognized ACV and services change accordingly.
    /// A share map without the current owner is rejected with `InvalidException`; it never
    /// reassigns the deal, so a reassignment such as `{B: 1.0}` must list the owner as `0.0`.
    SharedOpportunity {
        #[schemars(description = "Opportunity ID of the deal to split.")]
        deal_id: String,
        #[schemars(
            description = "AE ID to fraction of the deal. Must include the current owner."
        )]
        shares: BTreeMap<String, f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[schemars(description = "Overrides the global missing-deal policy for this exception.")]
        on_missing: Option<MissingDealPolicy>,
    },

    /// Multiply the ACV of every row of a deal by `factor`.
    AdjustAcv {
        #[schemars(description = "Opportunity ID of the deal to adjust.")]
        deal_id: String,
        #[serde(alias = "adjustment_factor")]
        #[schemars(description = "Non-negative multiplier applied to ACV (0.5 halves it).")]
        factor: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[schemars(description = "Overrides the global missing-deal policy for this exception.")]
        on_missing: Option<MissingDealPolicy>,
    },

    /// Pay unbilled NOLA/SOLA upsells one month after their close date.
    CloseDatePayment,
}

impl DealException {
    pub fn kind(&self) -> &'static str {
        match self {
            DealException::SharedOpportunity { .. } => "shared_opportunity",
            DealException::AdjustAcv { .. } => "adjust_acv",
            DealException::CloseDatePayment => "close_date_payment",
        }
    }

    pub fn shared_opportunity<I, S>(deal_id: impl Into<String>, shares: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        DealException::SharedOpportunity {
            deal_id: deal_id.into(),
            shares: shares.into_iter().map(|(ae, s)| (ae.into(), s)).collect(),
            on_missing: None,
        }
    }

    pub fn adjust_acv(deal_id: impl Into<String>, factor: f64) -> Self {
        DealException::AdjustAcv {
            deal_id: deal_id.into(),
            factor,
            on_missing: None,
        }
    }

    /// Checks the parameters without looking at any ledger.
    pub fn validate(&self, index: usize) -> Result<()> {
        match self {
            DealException::SharedOpportunity {
                deal_id, shares, ..
            } => {
                validate_deal_id(index, deal_id)?;
                if shares.is_empty() {
                    return Err(CompensationError::InvalidException {
                        index,
                        details: format!("shares for deal '{}' are empty", deal_id),
                    });
                }
                for (ae, share) in shares {
                    validate_factor(index, &format!("share for '{}'", ae), *share)?;
                }
                Ok(())
            }
            DealException::AdjustAcv {
                deal_id, factor, ..
            } => {
                validate_deal_id(index, deal_id)?;
                validate_factor(index, "factor", *factor)
            }
            DealException::CloseDatePayment => Ok(()),
        }
    }

    /// Marks this exception as tolerant of (or strict about) a missing deal,
    /// regardless of the global policy. No effect on global rules.
    pub fn on_missing(mut self, policy: MissingDealPolicy) -> Self {
        match &mut self {
            DealException::SharedOpportunity { on_missing, .. }
            | DealException::AdjustAcv { on_missing, .. } => *on_missing = Some(policy),
            DealException::CloseDatePayment => {}
        }
        self
    }
}

/// Folds the exceptions over the ledger in order and returns the corrected ledger.
/// `deals` itself is never modified.
pub fn apply_exceptions(
    deals: &[Deal],
    exceptions: &[DealException],
    default_policy: MissingDealPolicy,
) -> Result<Vec<Deal>> {
    let ledger = exceptions.iter().enumerate().try_fold(
        deals.to_vec(),
        |ledger, (index, exception)| apply_single_exception(ledger, index, exception, default_policy),
    )?;

    debug!(
        "Applied {} exception(s): {} -> {} deal rows",
        exceptions.len(),
        deals.len(),
        ledger.len()
    );
    Ok(ledger)
}

pub fn apply_single_exception(
    ledger: Vec<Deal>,
    index: usize,
    exception: &DealException,
    default_policy: MissingDealPolicy,
) -> Result<Vec<Deal>> {
    exception.validate(index)?;

    match exception {
        DealException::SharedOpportunity {
            deal_id,
            shares,
            on_missing,
        } => {
            if !ledger.iter().any(|d| &d.opportunity_id == deal_id) {
                return handle_missing_deal(
                    ledger,
                    index,
                    exception,
                    deal_id,
                    on_missing.unwrap_or(default_policy),
                );
            }
            split_opportunity(ledger, index, deal_id, shares)
        }

        DealException::AdjustAcv {
            deal_id,
            factor,
            on_missing,
        } => {
            if !ledger.iter().any(|d| &d.opportunity_id == deal_id) {
                return handle_missing_deal(
                    ledger,
                    index,
                    exception,
                    deal_id,
                    on_missing.unwrap_or(default_policy),
                );
            }

            Ok(ledger
                .into_iter()
                .map(|mut deal| {
                    if &deal.opportunity_id == deal_id {
                        deal.acv = deal.acv.map(|v| v * factor);
                    }
                    deal
                })
                .collect())
        }

        DealException::CloseDatePayment => {
            let mut updated = 0usize;
            let ledger: Vec<Deal> = ledger
                .into_iter()
                .map(|mut deal| {
                    if qualifies_for_close_date_payment(&deal) {
                        deal.payment_date_override = deal.close_date.and_then(add_one_month);
                        updated += 1;
                    }
                    deal
                })
                .collect();
            debug!("close_date_payment set payment dates on {} deal rows", updated);
            Ok(ledger)
        }
    }
}

fn qualifies_for_close_date_payment(deal: &Deal) -> bool {
    deal.deal_type == DealType::Upsell
        && deal.invoice_date.is_none()
        && deal
            .region_or_market()
            .map_or(false, |r| CLOSE_DATE_PAYMENT_REGIONS.contains(&r))
}

fn split_opportunity(
    mut ledger: Vec<Deal>,
    index: usize,
    deal_id: &str,
    shares: &BTreeMap<String, f64>,
) -> Result<Vec<Deal>> {
    // Copies are taken from the row as it was before this exception scaled it.
    let template = ledger
        .iter()
        .find(|d| d.opportunity_id == deal_id)
        .cloned()
        .ok_or_else(|| CompensationError::InvalidException {
            index,
            details: format!("deal '{}' vanished during split", deal_id),
        })?;

    let mut owners = Vec::new();
    for deal in ledger.iter_mut().filter(|d| d.opportunity_id == deal_id) {
        let owner = deal.ae.clone().ok_or_else(|| CompensationError::InvalidException {
            index,
            details: format!("deal '{}' has no owner to split from", deal_id),
        })?;
        let share = shares
            .get(&owner)
            .ok_or_else(|| CompensationError::InvalidException {
                index,
                details: format!(
                    "shares for deal '{}' do not include its current owner '{}'",
                    deal_id, owner
                ),
            })?;
        scale_amounts(deal, *share);
        owners.push(owner);
    }

    for (ae, share) in shares {
        if owners.contains(ae) {
            continue;
        }
        let mut row = template.clone();
        row.ae = Some(ae.clone());
        scale_amounts(&mut row, *share);
        ledger.push(row);
    }

    let total: f64 = shares.values().sum();
    if (total - 1.0).abs() > 1e-9 {
        warn!(
            "Shares for deal '{}' sum to {:.4}; recognized ACV and services change by that factor",
            deal_id, total
        );
    }

    Ok(ledger)
}

fn scale_amounts(deal: &mut Deal, factor: f64) {
    deal.acv = deal.acv.map(|v| v * factor);
    deal.services = deal.services.map(|v| v * factor);
}

fn validate_deal_id(index: usize, deal_id: &str) -> Result<()> {
    if deal_id.trim().is_empty() {
        return Err(CompensationError::InvalidException {
            index,
            details: "deal_id is empty".to_string(),
        });
    }
    Ok(())
}

fn validate_factor(index: usize, what: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CompensationError::InvalidException {
            index,
            details: format!("{} must be a finite non-negative number, got {}", what, value),
        });
    }
    Ok(())
}

fn handle_missing_deal(
    ledger: Vec<Deal>,
    index: usize,
    exception: &DealException,
    deal_id: &str,
    policy: MissingDealPolicy,
) -> Result<Vec<Deal>> {
    match policy {
        MissingDealPolicy::Strict => Err(CompensationError::DealNotFound {
            index,
            kind: exception.kind().to_string(),
            deal_id: deal_id.to_string(),
        }),
        MissingDealPolicy::Tolerant => {
            warn!(
                "Exception #{} ({}) skipped: deal '{}' is not in the ledger",
                index,
                exception.kind(),
                deal_id
            );
            Ok(ledger)
        }
    }
}
