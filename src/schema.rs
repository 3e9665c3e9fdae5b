use crate::error::{CompensationError, Result};
use crate::exceptions::DealException;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Commission premium applied on top of the AE's ACV rate for new-logo deals.
pub const NEW_LOGO_PREMIUM: f64 = 1.1;

/// Flat commission rate on services revenue.
pub const SERVICES_RATE: f64 = 0.015;

/// A money amount as it may enter any calculation: finite and non-negative, else 0.
pub fn usable_amount(amount: Option<f64>) -> f64 {
    match amount {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DealType {
    New,
    Upsell,
    /// Any other opportunity type (renewals, services-only, ...). Earns services comp only.
    Other(String),
}

impl DealType {
    pub fn as_str(&self) -> &str {
        match self {
            DealType::New => "New",
            DealType::Upsell => "Upsell",
            DealType::Other(label) => label,
        }
    }
}

impl From<String> for DealType {
    fn from(value: String) -> Self {
        match value.trim() {
            "New" => DealType::New,
            "Upsell" => DealType::Upsell,
            other => DealType::Other(other.to_string()),
        }
    }
}

impl From<&str> for DealType {
    fn from(value: &str) -> Self {
        DealType::from(value.to_string())
    }
}

impl From<DealType> for String {
    fn from(value: DealType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the deal ledger in canonical form.
///
/// `opportunity_id` is only unique until a shared-opportunity exception splits the deal
/// across several AEs. Amounts and dates are `None` when the raw value could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub opportunity_id: String,
    pub ae: Option<String>,
    pub deal_type: DealType,
    pub close_date: Option<NaiveDate>,
    pub invoice_date: Option<NaiveDate>,
    pub acv: Option<f64>,
    pub services: Option<f64>,
    pub region: Option<String>,
    pub market: Option<String>,
    pub lead_source: Option<String>,
    /// Payment date forced by the close-date payment exception.
    #[serde(default)]
    pub payment_date_override: Option<NaiveDate>,
}

impl Deal {
    pub fn new(
        opportunity_id: impl Into<String>,
        ae: impl Into<String>,
        deal_type: DealType,
        close_date: NaiveDate,
        acv: f64,
        services: f64,
    ) -> Self {
        Self {
            opportunity_id: opportunity_id.into(),
            ae: Some(ae.into()),
            deal_type,
            close_date: Some(close_date),
            invoice_date: None,
            acv: Some(acv),
            services: Some(services),
            region: None,
            market: None,
            lead_source: None,
            payment_date_override: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    pub fn with_lead_source(mut self, lead_source: impl Into<String>) -> Self {
        self.lead_source = Some(lead_source.into());
        self
    }

    pub fn with_invoice_date(mut self, invoice_date: NaiveDate) -> Self {
        self.invoice_date = Some(invoice_date);
        self
    }

    /// ACV for commission and aggregation; unknown, negative or non-finite amounts count as 0.
    pub fn acv_or_zero(&self) -> f64 {
        usable_amount(self.acv)
    }

    pub fn services_or_zero(&self) -> f64 {
        usable_amount(self.services)
    }

    pub fn is_new_logo(&self) -> bool {
        self.deal_type == DealType::New
    }

    /// Region used by region-scoped rules, falling back to the market label.
    pub fn region_or_market(&self) -> Option<&str> {
        self.region.as_deref().or(self.market.as_deref())
    }
}

/// One row of the AE roster in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountExecutive {
    pub ae_id: String,
    pub base_salary_annual: Option<f64>,
    pub quota: Option<f64>,
}

impl AccountExecutive {
    pub fn new(ae_id: impl Into<String>, base_salary_annual: f64, quota: f64) -> Self {
        Self {
            ae_id: ae_id.into(),
            base_salary_annual: Some(base_salary_annual),
            quota: Some(quota),
        }
    }

    pub fn base_salary(&self) -> Result<f64> {
        match self.base_salary_annual {
            Some(base) if base.is_finite() && base >= 0.0 => Ok(base),
            _ => Err(CompensationError::IncompleteRoster {
                ae: self.ae_id.clone(),
                field: "base_salary_annual".to_string(),
            }),
        }
    }

    /// Quota as a usable divisor. Zero is a hard error, never infinity.
    pub fn checked_quota(&self) -> Result<f64> {
        let quota = self.quota.ok_or_else(|| CompensationError::IncompleteRoster {
            ae: self.ae_id.clone(),
            field: "quota".to_string(),
        })?;

        if quota == 0.0 {
            return Err(CompensationError::DivisionByZero {
                ae: self.ae_id.clone(),
            });
        }
        if !quota.is_finite() || quota < 0.0 {
            return Err(CompensationError::IncompleteRoster {
                ae: self.ae_id.clone(),
                field: "positive quota".to_string(),
            });
        }

        Ok(quota)
    }

    /// Per-dollar commission multiplier: `base_salary_annual / quota`.
    pub fn acv_rate(&self) -> Result<f64> {
        let base = self.base_salary()?;
        let quota = self.checked_quota()?;
        Ok(base / quota)
    }

    pub fn ote(&self) -> Result<f64> {
        Ok(self.base_salary()? * 2.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MissingDealPolicy {
    #[schemars(
        description = "An exception whose deal_id matches no ledger row aborts the whole calculation."
    )]
    Strict,

    #[schemars(
        description = "An exception whose deal_id matches no ledger row is skipped with a warning."
    )]
    Tolerant,
}

impl Default for MissingDealPolicy {
    fn default() -> Self {
        Self::Strict
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompensationConfig {
    #[schemars(
        description = "Calendar year whose accelerators are evaluated and attached to the AE roster."
    )]
    pub evaluation_year: i32,

    #[serde(default)]
    #[schemars(
        description = "Default handling of exceptions that reference a deal not present in the ledger. Defaults to strict."
    )]
    pub missing_deal_policy: MissingDealPolicy,

    #[serde(default)]
    #[schemars(
        description = "Ordered list of manual exceptions. Each one sees the ledger as left by the previous one."
    )]
    pub exceptions: Vec<DealException>,
}

impl CompensationConfig {
    pub fn new(evaluation_year: i32) -> Self {
        Self {
            evaluation_year,
            missing_deal_policy: MissingDealPolicy::default(),
            exceptions: Vec::new(),
        }
    }

    pub fn with_exceptions(mut self, exceptions: Vec<DealException>) -> Self {
        self.exceptions = exceptions;
        self
    }

    pub fn with_missing_deal_policy(mut self, policy: MissingDealPolicy) -> Self {
        self.missing_deal_policy = policy;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CompensationConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = CompensationConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("evaluation_year"));
        assert!(schema_json.contains("missing_deal_policy"));
        assert!(schema_json.contains("exceptions"));
        assert!(schema_json.contains("shared_opportunity"));
    }

    #[test]
    fn test_unusable_amounts_count_as_zero() {
        assert_eq!(usable_amount(Some(1_250.5)), 1_250.5);
        assert_eq!(usable_amount(None), 0.0);
        assert_eq!(usable_amount(Some(-100.0)), 0.0);
        assert_eq!(usable_amount(Some(f64::NAN)), 0.0);
        assert_eq!(usable_amount(Some(f64::INFINITY)), 0.0);

        let mut deal = Deal::new(
            "X",
            "A",
            DealType::New,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            -5.0,
            f64::NAN,
        );
        assert_eq!(deal.acv_or_zero(), 0.0);
        assert_eq!(deal.services_or_zero(), 0.0);
        deal.acv = Some(10.0);
        assert_eq!(deal.acv_or_zero(), 10.0);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "evaluation_year": 2024,
            "exceptions": [
                {"type": "shared_opportunity", "deal_id": "006A", "shares": {"NOLA-3": 0.3, "NOLA-2": 0.7}},
                {"type": "adjust_acv", "deal_id": "006B", "adjustment_factor": 0.5},
                {"type": "close_date_payment"}
            ]
        }"#;

        let config = CompensationConfig::from_json_str(json).unwrap();
        assert_eq!(config.evaluation_year, 2024);
        assert_eq!(config.missing_deal_policy, MissingDealPolicy::Strict);
        assert_eq!(config.exceptions.len(), 3);
        assert!(matches!(
            config.exceptions[1],
            DealException::AdjustAcv { factor, .. } if (factor - 0.5).abs() < 1e-12
        ));
    }

    #[test]
    fn test_deal_type_round_trip_labels() {
        assert_eq!(DealType::from("New"), DealType::New);
        assert_eq!(DealType::from(" Upsell "), DealType::Upsell);
        assert_eq!(
            DealType::from("Renewal"),
            DealType::Other("Renewal".to_string())
        );
        assert_eq!(String::from(DealType::Upsell), "Upsell");
    }

    #[test]
    fn test_acv_rate_and_zero_quota() {
        let ae = AccountExecutive::new("A", 60_000.0, 100_000.0);
        assert!((ae.acv_rate().unwrap() - 0.6).abs() < 1e-12);
        assert!((ae.ote().unwrap() - 120_000.0).abs() < 1e-9);

        let broken = AccountExecutive::new("Z", 60_000.0, 0.0);
        assert!(matches!(
            broken.acv_rate(),
            Err(CompensationError::DivisionByZero { ref ae }) if ae == "Z"
        ));

        let missing = AccountExecutive {
            ae_id: "M".to_string(),
            base_salary_annual: Some(50_000.0),
            quota: None,
        };
        assert!(matches!(
            missing.acv_rate(),
            Err(CompensationError::IncompleteRoster { .. })
        ));
    }
}
