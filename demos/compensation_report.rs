use sales_comp_engine::{
    write_ae_summary_csv, CompensationConfig, CompensationEngine, DealException, RawTable,
};
use std::error::Error;
use std::io;

const DEALS_CSV: &str = "\
Opportunity ID,Opportunity Owner,Type,Close Date,Invoice Date,ACV,Services,Opp Global Region,Market,Lead Source
006A01,Avery,New,2024-01-12,,\"$40,000\",5000,NOLA,,Referral
006A02,Avery,New,2024-02-20,,30000,0,,NOLA,Outbound
006A03,Avery,Upsell,2024-03-05,,25000,1200,SOLA,,Referral
006A04,Avery,New,2024-04-18,2024-05-02,35000,0,,EMEA,Inbound
006A05,Avery,New,2024-05-29,,60000,8000,,EMEA,Outbound
006A06,Avery,New,2024-06-10,,50000,0,,NOLA,Referral
006B01,Blake,Upsell,2024-02-14,,80000,3000,,APAC,Inbound
006B02,Blake,New,2024-07-01,,120000,0,,APAC,Outbound
006B03,Blake,Renewal,2024-09-30,,45000,2500,,APAC,Inbound
";

const ROSTER_CSV: &str = "\
AE,Base Salary (Annual),Quota
Avery,72000,120000
Blake,90000,300000
";

fn main() -> Result<(), Box<dyn Error>> {
    let raw_deals = RawTable::from_csv_reader(DEALS_CSV.as_bytes())?;
    let raw_roster = RawTable::from_csv_reader(ROSTER_CSV.as_bytes())?;

    let config = CompensationConfig::new(2024).with_exceptions(vec![
        DealException::shared_opportunity("006B02", [("Blake", 0.6), ("Avery", 0.4)]),
        DealException::adjust_acv("006A03", 0.8),
        DealException::CloseDatePayment,
    ]);

    let engine = CompensationEngine::new(config);
    let snapshot = engine.load_and_recompute(&raw_deals, &raw_roster)?;

    println!("📊 Compensation report for {}", snapshot.evaluation_year);
    println!("------------------------------------------------------------------");

    if !snapshot.quality.is_clean() {
        println!("⚠️  {} null cell(s) after loading:", snapshot.quality.total_null_cells());
        for (column, count) in &snapshot.quality.null_cells {
            println!("   - {}: {}", column, count);
        }
    }

    for ae in &snapshot.roster {
        println!(
            "{:<8} attainment {:>6.1}%  new logos {:>2}  variable {:>12.2}  accelerator {:>12.2}",
            ae.ae_id,
            ae.attainment * 100.0,
            ae.new_count,
            ae.total_comp,
            ae.accelerator_bonus
        );
    }

    println!("\nAccelerator payouts:");
    for record in &snapshot.accelerators {
        println!(
            " - {} earned in month {} at {:.2}x, paid in month {}: {:.2}",
            record.ae, record.earned_month, record.multiplier, record.payment_month, record.bonus
        );
    }

    println!("\nMonth-by-month totals:");
    for month in 1..=12 {
        let (global, _) = engine.summarize(snapshot.evaluation_year, Some(month))?;
        println!("   {:>2}: {:>12.2}", month, global.total_compensation);
    }

    let overview = snapshot.overview();
    println!(
        "\nTop AE: {:?}, top market: {:?}, most common lead source: {:?}",
        overview.top_ae, overview.top_market, overview.most_common_lead_source
    );

    let (annual, per_ae) = engine.summarize(snapshot.evaluation_year, None)?;
    println!("\nAnnual totals:");
    for (name, value) in annual.to_map() {
        println!("   {:<24} {:>12.2}", name, value);
    }

    println!("\nPer-AE summary (CSV):");
    write_ae_summary_csv(&per_ae, io::stdout())?;

    Ok(())
}
