use crate::error::{CompensationError, Result};
use crate::schema::{AccountExecutive, Deal, DealType};
use crate::utils::{parse_amount, parse_date};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

pub const DEAL_TABLE: &str = "deal";
pub const ROSTER_TABLE: &str = "AE roster";

const REQUIRED_DEAL_COLUMNS: [&str; 6] = [
    "opportunity_id",
    "ae",
    "deal_type",
    "close_date",
    "acv",
    "services",
];
const REQUIRED_ROSTER_COLUMNS: [&str; 3] = ["ae", "base_salary_annual", "quota"];

/// Rows as they arrive from a spreadsheet export, before any typing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }
}

/// Non-fatal problems found while typing the raw tables. Each entry counts the cells
/// of a column that ended up null because they were blank or could not be parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub rows_loaded: usize,
    pub null_cells: BTreeMap<String, usize>,
}

impl DataQualityReport {
    fn record_null(&mut self, table: &str, column: &str) {
        *self
            .null_cells
            .entry(format!("{}.{}", table, column))
            .or_default() += 1;
    }

    pub fn total_null_cells(&self) -> usize {
        self.null_cells.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.null_cells.is_empty()
    }

    pub fn merge(&mut self, other: DataQualityReport) {
        self.rows_loaded += other.rows_loaded;
        for (column, count) in other.null_cells {
            *self.null_cells.entry(column).or_default() += count;
        }
    }

    fn log_summary(&self) {
        for (column, count) in &self.null_cells {
            warn!("{} value(s) in '{}' are missing or unparseable and were nulled", count, column);
        }
    }
}

/// Canonical column key: trimmed, inner whitespace collapsed to `_`, lowercased,
/// then mapped through the alias table.
pub fn normalize_column_name(name: &str) -> String {
    let key = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();

    match key.as_str() {
        "opportunity_owner" | "ae_id" => "ae".to_string(),
        "base_salary_(annual)" => "base_salary_annual".to_string(),
        "type" => "deal_type".to_string(),
        "opp_global_region" => "region".to_string(),
        _ => key,
    }
}

struct ColumnIndex {
    table: &'static str,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(table: &'static str, headers: &[String], required: &[&str]) -> Result<Self> {
        let mut positions = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            // First occurrence wins when two raw headers normalize to the same key.
            positions.entry(normalize_column_name(header)).or_insert(i);
        }

        for column in required {
            if !positions.contains_key(*column) {
                return Err(CompensationError::Schema {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }

        Ok(Self { table, positions })
    }

    fn cell<'r>(&self, row: &'r [String], column: &str) -> Option<&'r str> {
        let idx = *self.positions.get(column)?;
        row.get(idx)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn text(&self, row: &[String], column: &str) -> Option<String> {
        self.cell(row, column).map(|s| s.to_string())
    }

    fn amount(&self, row: &[String], column: &str, report: &mut DataQualityReport) -> Option<f64> {
        let value = self.cell(row, column).and_then(parse_amount);
        if value.is_none() {
            report.record_null(self.table, column);
        }
        value
    }

    fn date(
        &self,
        row: &[String],
        column: &str,
        nullable: bool,
        report: &mut DataQualityReport,
    ) -> Option<chrono::NaiveDate> {
        let raw = self.cell(row, column);
        let value = raw.and_then(parse_date);
        // A blank optional date is expected, not a data-quality issue.
        if value.is_none() && (raw.is_some() || !nullable) {
            report.record_null(self.table, column);
        }
        value
    }
}

pub fn load_deals(table: &RawTable) -> Result<(Vec<Deal>, DataQualityReport)> {
    let columns = ColumnIndex::new(DEAL_TABLE, &table.headers, &REQUIRED_DEAL_COLUMNS)?;
    let mut report = DataQualityReport::default();
    let mut deals = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let deal_type = columns
            .cell(row, "deal_type")
            .map(DealType::from)
            .unwrap_or_else(|| DealType::Other(String::new()));

        deals.push(Deal {
            opportunity_id: columns.text(row, "opportunity_id").unwrap_or_default(),
            ae: columns.text(row, "ae"),
            deal_type,
            close_date: columns.date(row, "close_date", false, &mut report),
            invoice_date: columns.date(row, "invoice_date", true, &mut report),
            acv: columns.amount(row, "acv", &mut report),
            services: columns.amount(row, "services", &mut report),
            region: columns.text(row, "region"),
            market: columns.text(row, "market"),
            lead_source: columns.text(row, "lead_source"),
            payment_date_override: None,
        });
    }

    report.rows_loaded = deals.len();
    debug!("Loaded {} deal rows", deals.len());
    Ok((deals, report))
}

pub fn load_roster(table: &RawTable) -> Result<(Vec<AccountExecutive>, DataQualityReport)> {
    let columns = ColumnIndex::new(ROSTER_TABLE, &table.headers, &REQUIRED_ROSTER_COLUMNS)?;
    let mut report = DataQualityReport::default();
    let mut roster = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let Some(ae_id) = columns.text(row, "ae") else {
            report.record_null(ROSTER_TABLE, "ae");
            continue;
        };

        roster.push(AccountExecutive {
            ae_id,
            base_salary_annual: columns.amount(row, "base_salary_annual", &mut report),
            quota: columns.amount(row, "quota", &mut report),
        });
    }

    report.rows_loaded = roster.len();
    debug!("Loaded {} AE roster rows", roster.len());
    Ok((roster, report))
}

/// Output of the loading phase: canonical tables plus the combined quality report.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub deals: Vec<Deal>,
    pub roster: Vec<AccountExecutive>,
    pub quality: DataQualityReport,
}

pub fn load(raw_deals: &RawTable, raw_roster: &RawTable) -> Result<LoadedData> {
    let (deals, mut quality) = load_deals(raw_deals)?;
    let (roster, roster_quality) = load_roster(raw_roster)?;
    quality.merge(roster_quality);
    quality.log_summary();

    Ok(LoadedData {
        deals,
        roster,
        quality,
    })
}
