use crate::calculator::CompensatedDeal;
use crate::error::Result;
use crate::summary::{AeCompensation, AeSummary};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

/// Flat CSV row for the enriched ledger. Unknown amounts and dates become empty cells.
#[derive(Debug, Serialize)]
struct DealExportRow<'a> {
    opportunity_id: &'a str,
    ae: Option<&'a str>,
    deal_type: &'a str,
    close_date: Option<NaiveDate>,
    invoice_date: Option<NaiveDate>,
    region: Option<&'a str>,
    market: Option<&'a str>,
    lead_source: Option<&'a str>,
    acv: Option<f64>,
    services: Option<f64>,
    upsell_comp: f64,
    new_logo_comp: f64,
    services_comp: f64,
    total_comp: f64,
    payment_date: Option<NaiveDate>,
    payment_date_service: Option<NaiveDate>,
}

impl<'a> From<&'a CompensatedDeal> for DealExportRow<'a> {
    fn from(d: &'a CompensatedDeal) -> Self {
        Self {
            opportunity_id: &d.deal.opportunity_id,
            ae: d.deal.ae.as_deref(),
            deal_type: d.deal.deal_type.as_str(),
            close_date: d.deal.close_date,
            invoice_date: d.deal.invoice_date,
            region: d.deal.region.as_deref(),
            market: d.deal.market.as_deref(),
            lead_source: d.deal.lead_source.as_deref(),
            acv: d.deal.acv,
            services: d.deal.services,
            upsell_comp: d.comp.upsell_comp,
            new_logo_comp: d.comp.new_logo_comp,
            services_comp: d.comp.services_comp,
            total_comp: d.comp.total_comp,
            payment_date: d.comp.payment_date,
            payment_date_service: d.comp.payment_date_service,
        }
    }
}

fn write_rows<W: Write, T: Serialize>(writer: W, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_deals_csv<W: Write>(deals: &[CompensatedDeal], writer: W) -> Result<()> {
    write_rows(writer, deals.iter().map(DealExportRow::from))
}

pub fn write_roster_csv<W: Write>(roster: &[AeCompensation], writer: W) -> Result<()> {
    write_rows(writer, roster)
}

pub fn write_ae_summary_csv<W: Write>(summary: &[AeSummary], writer: W) -> Result<()> {
    write_rows(writer, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::calculate_deal_compensation;
    use crate::schema::{AccountExecutive, Deal, DealType};

    #[test]
    fn test_deal_export_marks_nulls_as_empty() {
        let roster = vec![AccountExecutive::new("A", 60_000.0, 100_000.0)];
        let mut deal = Deal::new(
            "006A",
            "A",
            DealType::New,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            10_000.0,
            0.0,
        );
        deal.services = None;
        let deals = calculate_deal_compensation(&[deal], &roster).unwrap();

        let mut buffer = Vec::new();
        write_deals_csv(&deals, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("opportunity_id,ae,deal_type,close_date"));
        assert!(header.ends_with("payment_date,payment_date_service"));

        let row = lines.next().unwrap();
        assert!(row.starts_with("006A,A,New,2024-01-10,,"));
        assert!(row.contains(",10000.0,,"));
        assert!(row.ends_with("2024-02-10,2024-02-10"));
    }

    #[test]
    fn test_summary_export() {
        let summary = vec![AeSummary {
            ae: "A".to_string(),
            total_upsell_comp: 0.0,
            total_new_logo_comp: 6_600.0,
            total_services_comp: 0.0,
            total_acv: 10_000.0,
            accelerator_bonus: 0.0,
            base_salary: 5_000.0,
            total_compensation: 11_600.0,
        }];

        let mut buffer = Vec::new();
        write_ae_summary_csv(&summary, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("ae,total_upsell_comp"));
        assert!(text.contains("A,0.0,6600.0"));
    }
}
