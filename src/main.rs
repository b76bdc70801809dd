// CLI - one subcommand per pipeline stage
// Usage: dhs-budget-etl <command> [config.toml]

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::process;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use dhs_budget_etl::{
    aggregate, components, ingest, join, object_class, output, report, AccountKey,
    ApportionmentAggregate, FundTypeTable, PipelineConfig, RunTally, SpendingSnapshot,
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("");
    let config = PipelineConfig::load(args.get(2).map(String::as_str))?;

    match command {
        "aggregate" => {
            run_aggregate(&config)?;
        }
        "fund-types" => {
            run_fund_types(&config)?;
        }
        "lifecycle" => {
            run_lifecycle(&config)?;
        }
        "by-year" => {
            run_by_year(&config)?;
        }
        "object-class" => {
            run_object_class(&config)?;
        }
        "validate" => {
            run_validate(&config)?;
        }
        "all" => {
            run_aggregate(&config)?;
            run_fund_types(&config)?;
            run_lifecycle(&config)?;
            run_by_year(&config)?;
            run_object_class(&config)?;
            run_validate(&config)?;
        }
        _ => {
            print_usage();
            process::exit(1);
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("Usage: dhs-budget-etl <command> [config.toml]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  aggregate     Aggregate OpenOMB schedule lines by TAS and period");
    eprintln!("  fund-types    Merge FAST Book fund types into the aggregated table");
    eprintln!("  lifecycle     Join apportionment against USAspending lifecycle totals");
    eprintln!("  by-year       Aggregate spending by appropriation fiscal year");
    eprintln!("  object-class  Summarize PA-OC breakdowns into spending categories");
    eprintln!("  validate      Compare TAS coverage between the two datasets");
    eprintln!("  all           Run every stage in order");
}

// ============================================================================
// STAGES
// ============================================================================

/// Shared first step: load schedule lines and collapse revisions.
fn load_aggregated_apportionment(
    config: &PipelineConfig,
    tally: &mut RunTally,
) -> Result<Vec<ApportionmentAggregate>> {
    println!("Loading apportionment data...");
    let lines = ingest::load_apportionment(config, tally)?;
    println!("✓ Loaded {} schedule lines", lines.len());

    let rows = aggregate::aggregate_apportionment(&lines);
    println!("✓ Aggregated to {} TAS/period rows", rows.len());
    Ok(rows)
}

fn run_aggregate(config: &PipelineConfig) -> Result<()> {
    println!("=== Aggregate: apportionment by TAS and availability period ===");
    let mut tally = RunTally::default();
    let rows = load_aggregated_apportionment(config, &mut tally)?;

    let csv_path = config.output_path("appropriations/dhs_tas_aggregated.csv");
    output::write_csv(&csv_path, &output::apportionment_csv_rows(&rows))?;

    let total_amount: f64 = rows.iter().map(|r| r.amount).sum();
    let unique_tas: BTreeSet<&AccountKey> = rows.iter().map(|r| r.key.coarse()).collect();
    let unique_tas_period: BTreeSet<String> = rows.iter().map(|r| r.tas_full()).collect();

    let metadata = output::RunMetadata::new(
        "aggregate",
        json!({
            "total_rows": rows.len(),
            "total_amount": total_amount,
            "unique_tas": unique_tas.len(),
            "unique_tas_period": unique_tas_period.len(),
        }),
    );
    output::save_json(
        &config.output_path("appropriations/dhs_tas_aggregated_metadata.json"),
        &metadata,
    )?;

    println!("\n=== Summary ===");
    println!("Total rows: {}", rows.len());
    println!("Total amount: ${:.0}", total_amount);
    println!("Unique TAS codes: {}", unique_tas.len());
    println!("Unique TAS-Period combinations: {}", unique_tas_period.len());
    println!("{}", tally.summary());
    println!("\nSaved to {:?}", csv_path);
    Ok(())
}

fn run_fund_types(config: &PipelineConfig) -> Result<()> {
    println!("\n=== Fund types: FAST Book merge ===");
    let mut tally = RunTally::default();
    let rows = load_aggregated_apportionment(config, &mut tally)?;

    println!("Loading FAST Book data...");
    let entries = ingest::load_fund_type_entries(config, &mut tally)?;
    let table = FundTypeTable::from_entries(&entries);
    println!("✓ Created mapping for {} account codes", table.len());

    let merged = join::merge_fund_types(&rows, &table);
    let csv_path = config.output_path("appropriations/dhs_tas_aggregated_with_fund_types.csv");
    output::write_csv(&csv_path, &merged)?;
    println!("Saved enhanced data to {:?}", csv_path);

    let flat = output::build_flat_budget(&merged);
    let flat_path = config.output_path("appropriations/dhs_budget_flat.json");
    output::save_json(&flat_path, &flat)?;
    println!("Updated flat data file {:?}", flat_path);

    print_amount_summary("Fund Type Summary", merged.iter().map(|r| (r.fund_type.clone(), r.amount)));
    print_amount_summary(
        "Budget Category Summary",
        merged.iter().map(|r| (r.budget_category.clone(), r.amount)),
    );
    println!("\n{}", tally.summary());
    Ok(())
}

fn run_lifecycle(config: &PipelineConfig) -> Result<()> {
    println!("\n=== Lifecycle: apportionment vs. USAspending ===");
    let mut tally = RunTally::default();
    let rows = load_aggregated_apportionment(config, &mut tally)?;

    println!("Loading FAST Book data...");
    let entries = ingest::load_fund_type_entries(config, &mut tally)?;
    let table = FundTypeTable::from_entries(&entries);

    let snapshots = load_snapshots(config, &mut tally)?;
    let lifecycle = aggregate::aggregate_spending_lifecycle(&snapshots);
    println!(
        "✓ {} TAS/period combinations with spending data",
        lifecycle.len()
    );

    let joined = join::join_lifecycle(&rows, &lifecycle, &table);
    let recon = report::ReconciliationReport::build(&joined, tally);

    output::save_json(
        &config.output_path("spending_lifecycle/spending_lifecycle_data.json"),
        &output::build_lifecycle_file(&joined),
    )?;
    output::write_csv(
        &config.output_path("spending_lifecycle/spending_lifecycle_data.csv"),
        &output::lifecycle_csv_rows(&joined),
    )?;
    output::save_json(
        &config.output_path("spending_lifecycle/reconciliation_report.json"),
        &recon,
    )?;

    recon.print_summary();
    Ok(())
}

#[derive(Debug, Serialize)]
struct AppropriationYearRow {
    fiscal_year: u16,
    tas: String,
    component: String,
    availability_type: String,
    budget_authority: f64,
    obligations: f64,
    outlays: f64,
}

fn run_by_year(config: &PipelineConfig) -> Result<()> {
    println!("\n=== By-year: spending by appropriation fiscal year ===");
    let mut tally = RunTally::default();
    let rows = load_aggregated_apportionment(config, &mut tally)?;
    let availability = join::availability_lookup(&rows);

    let snapshots = load_snapshots(config, &mut tally)?;
    let by_year = aggregate::aggregate_by_appropriation_year(&snapshots);

    let records: Vec<AppropriationYearRow> = by_year
        .iter()
        .map(|((year, account), totals)| AppropriationYearRow {
            fiscal_year: *year,
            tas: account.to_string(),
            component: components::component_from_names(
                totals.treasury_account_names.iter().map(String::as_str),
            ),
            availability_type: availability
                .get(account)
                .copied()
                .unwrap_or("unknown")
                .to_string(),
            budget_authority: totals.budget_authority,
            obligations: totals.obligations,
            outlays: totals.outlays,
        })
        .collect();

    output::write_csv(
        &config.output_path("usaspending/usaspending_aggregated_by_appropriation_year.csv"),
        &records,
    )?;
    output::save_json(
        &config.output_path("usaspending/usaspending_aggregated_by_appropriation_year.json"),
        &records,
    )?;

    let years: BTreeSet<u16> = records.iter().map(|r| r.fiscal_year).collect();
    for year in years {
        let subset: Vec<&AppropriationYearRow> =
            records.iter().filter(|r| r.fiscal_year == year).collect();
        let obligations: f64 = subset.iter().map(|r| r.obligations).sum();
        let outlays: f64 = subset.iter().map(|r| r.outlays).sum();
        println!("\nFY{}:", year);
        println!("  Records: {}", subset.len());
        println!("  Total obligations: ${:.0}", obligations);
        println!("  Total outlays: ${:.0}", outlays);
    }
    println!("\n{}", tally.summary());
    Ok(())
}

fn run_object_class(config: &PipelineConfig) -> Result<()> {
    println!("\n=== Object class: spending category breakdowns ===");
    let mut tally = RunTally::default();

    println!("Loading PA-OC breakdown files...");
    let lines = ingest::load_object_class_lines(config, &mut tally)?;
    println!("✓ Loaded {} breakdown rows", lines.len());

    let breakdowns = object_class::aggregate_object_classes(&lines);
    println!("✓ Processed {} account/year breakdowns", breakdowns.len());

    output::write_csv(
        &config.output_path("usaspending/object_class_summary.csv"),
        &output::object_class_csv_rows(&breakdowns),
    )?;

    // the largest account's profile, as a sanity check on the categorization
    if let Some(sample) = breakdowns
        .iter()
        .max_by(|a, b| a.total_obligations.total_cmp(&b.total_obligations))
    {
        println!(
            "\nSample breakdown for {} ({}):",
            sample.account, sample.component
        );
        println!("  Total obligations: ${:.0}", sample.total_obligations);
        println!("  Personnel: {:.1}%", sample.personnel_percentage());
        let mut shares: Vec<_> = sample.category_percentages().into_iter().collect();
        shares.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (category, pct) in shares.into_iter().take(5) {
            println!("  - {}: {:.1}%", category.name(), pct);
        }
    }
    println!("\n{}", tally.summary());
    Ok(())
}

fn run_validate(config: &PipelineConfig) -> Result<()> {
    println!("\n=== Validate: TAS coverage across datasets ===");
    let mut tally = RunTally::default();
    let rows = load_aggregated_apportionment(config, &mut tally)?;
    let snapshots = load_snapshots(config, &mut tally)?;

    let app_keys: BTreeSet<AccountKey> = rows.iter().map(|r| r.key.coarse().clone()).collect();

    let mut spend_keys: BTreeSet<AccountKey> = BTreeSet::new();
    let mut account_names: BTreeMap<AccountKey, String> = BTreeMap::new();
    for snapshot in &snapshots {
        for record in &snapshot.records {
            let key = record.tas.account.clone();
            if !record.treasury_account_name.is_empty() {
                account_names
                    .entry(key.clone())
                    .or_insert_with(|| record.treasury_account_name.clone());
            }
            spend_keys.insert(key);
        }
    }

    let classification = join::KeyClassification::classify(&app_keys, &spend_keys);

    let bureaus: Vec<String> = rows
        .iter()
        .map(|r| r.bureau.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let coverage = report::ComponentCoverage::build(
        snapshots
            .iter()
            .flat_map(|s| s.records.iter())
            .map(|r| r.treasury_account_name.as_str())
            .filter(|name| !name.is_empty()),
        &bureaus,
    );

    let validation = report::TasValidationReport::build(&classification, &account_names, coverage);

    output::save_json(
        &config.output_path("validation/usaspending_validation_report.json"),
        &validation,
    )?;

    validation.print_summary();
    println!("\n{}", tally.summary());
    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

fn load_snapshots(config: &PipelineConfig, tally: &mut RunTally) -> Result<Vec<SpendingSnapshot>> {
    println!("Finding USAspending files...");
    let snapshots = ingest::load_spending_snapshots(config, tally)?;
    let record_count: usize = snapshots.iter().map(|s| s.records.len()).sum();
    println!(
        "✓ Loaded {} snapshots ({} records)",
        snapshots.len(),
        record_count
    );
    Ok(snapshots)
}

fn print_amount_summary<I>(title: &str, pairs: I)
where
    I: Iterator<Item = (String, f64)>,
{
    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for (label, amount) in pairs {
        let entry = totals.entry(label).or_insert((0.0, 0));
        entry.0 += amount;
        entry.1 += 1;
    }
    let grand_total: f64 = totals.values().map(|(sum, _)| sum).sum();

    println!("\n=== {} ===", title);
    let mut rows: Vec<_> = totals.into_iter().collect();
    rows.sort_by(|a, b| b.1 .0.total_cmp(&a.1 .0));
    for (label, (sum, count)) in rows {
        let percent = if grand_total != 0.0 {
            sum / grand_total * 100.0
        } else {
            0.0
        };
        println!("  {}: ${:.0} ({} rows, {:.1}%)", label, sum, count, percent);
    }
}
