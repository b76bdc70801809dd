// Output artifacts - flat files for the treemap frontend
// CSV tables for inspection, JSON flat files for the visualization, plus a
// run-metadata sidecar per artifact so every output is traceable to a run.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::aggregate::ApportionmentAggregate;
use crate::components;
use crate::join::{LifecycleJoin, MergedApportionmentRow};
use crate::object_class::{ObjectClassBreakdown, SpendingCategory};

// ============================================================================
// GENERIC WRITERS
// ============================================================================

/// Serialize to pretty JSON, creating parent directories as needed.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Write serializable rows as CSV with headers.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }
    Ok(())
}

// ============================================================================
// RUN METADATA
// ============================================================================

/// Sidecar written next to each artifact: when the run happened and the
/// headline numbers it produced.
#[derive(Debug, Serialize)]
pub struct RunMetadata {
    pub run_date: String,
    pub command: String,
    pub results: serde_json::Value,
}

impl RunMetadata {
    pub fn new(command: &str, results: serde_json::Value) -> RunMetadata {
        RunMetadata {
            run_date: chrono::Utc::now().to_rfc3339(),
            command: command.to_string(),
            results,
        }
    }
}

// ============================================================================
// AGGREGATED APPORTIONMENT CSV
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApportionmentCsvRow {
    pub tas: String,
    pub availability_period: String,
    pub availability_type: String,
    pub bureau: String,
    pub account: String,
    pub fiscal_year: u16,
    pub amount: f64,
    pub approval_date: Option<String>,
    pub iteration: i64,
    pub tas_full: String,
    pub amount_millions: f64,
}

pub fn apportionment_csv_rows(rows: &[ApportionmentAggregate]) -> Vec<ApportionmentCsvRow> {
    rows.iter()
        .map(|row| ApportionmentCsvRow {
            tas: row.key.coarse().to_string(),
            availability_period: row.key.availability.period_label(),
            availability_type: row.key.availability.type_label().to_string(),
            bureau: row.bureau.clone(),
            account: row.account.clone(),
            fiscal_year: row.fiscal_year,
            amount: row.amount,
            approval_date: row.approval_date.map(|d| d.format("%Y-%m-%d").to_string()),
            iteration: row.iteration,
            tas_full: row.tas_full(),
            amount_millions: row.amount_millions(),
        })
        .collect()
}

// ============================================================================
// FLAT BUDGET JSON
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FlatBudgetRecord {
    pub tas: String,
    pub tas_full: String,
    pub fiscal_year: u16,
    pub availability_type: String,
    pub availability_period: String,
    pub bureau: String,
    pub abbreviation: String,
    pub account: String,
    pub amount: f64,
    pub fund_type: String,
    pub budget_category: String,
}

/// The treemap's input: every record plus the dimension vocabularies the
/// frontend builds its filters from.
#[derive(Debug, Serialize)]
pub struct FlatBudgetFile {
    pub name: String,
    pub total_amount: f64,
    pub fiscal_years: Vec<u16>,
    pub availability_types: Vec<String>,
    pub fund_types: Vec<String>,
    pub budget_categories: Vec<String>,
    pub bureaus: Vec<String>,
    pub bureau_abbreviations: BTreeMap<String, String>,
    pub record_count: usize,
    pub data: Vec<FlatBudgetRecord>,
}

pub fn build_flat_budget(merged: &[MergedApportionmentRow]) -> FlatBudgetFile {
    let mut records: Vec<FlatBudgetRecord> = merged
        .iter()
        .map(|row| FlatBudgetRecord {
            tas: row.tas.clone(),
            tas_full: row.tas_full.clone(),
            fiscal_year: row.fiscal_year,
            availability_type: row.availability_type.clone(),
            availability_period: row.availability_period.clone(),
            bureau: row.bureau.clone(),
            abbreviation: components::abbreviation_for(&row.bureau).to_string(),
            account: row.account.clone(),
            amount: row.amount,
            fund_type: row.fund_type.clone(),
            budget_category: row.budget_category.clone(),
        })
        .collect();

    // largest slices first, the order the treemap lays them out
    records.sort_by(|a, b| b.amount.total_cmp(&a.amount));

    let collect_sorted = |values: BTreeSet<String>| values.into_iter().collect::<Vec<_>>();
    let fiscal_years: BTreeSet<u16> = merged.iter().map(|r| r.fiscal_year).collect();
    let availability_types: BTreeSet<String> =
        merged.iter().map(|r| r.availability_type.clone()).collect();
    let fund_types: BTreeSet<String> = merged.iter().map(|r| r.fund_type.clone()).collect();
    let budget_categories: BTreeSet<String> =
        merged.iter().map(|r| r.budget_category.clone()).collect();
    let bureaus: BTreeSet<String> = merged.iter().map(|r| r.bureau.clone()).collect();

    let bureau_abbreviations: BTreeMap<String, String> = bureaus
        .iter()
        .map(|b| (b.clone(), components::abbreviation_for(b).to_string()))
        .collect();

    FlatBudgetFile {
        name: "DHS Budget Data".to_string(),
        total_amount: merged.iter().map(|r| r.amount).sum(),
        fiscal_years: fiscal_years.into_iter().collect(),
        availability_types: collect_sorted(availability_types),
        fund_types: collect_sorted(fund_types),
        budget_categories: collect_sorted(budget_categories),
        bureaus: collect_sorted(bureaus),
        bureau_abbreviations,
        record_count: records.len(),
        data: records,
    }
}

// ============================================================================
// SPENDING LIFECYCLE JSON
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LifecycleMetadata {
    pub created: String,
    pub total_records: usize,
    pub matched_combinations: usize,
    pub unmatched_combinations: usize,
}

#[derive(Debug, Serialize)]
pub struct LifecycleFile<'a> {
    pub metadata: LifecycleMetadata,
    pub records: &'a [crate::join::LifecycleRecord],
}

pub fn build_lifecycle_file(join: &LifecycleJoin) -> LifecycleFile<'_> {
    LifecycleFile {
        metadata: LifecycleMetadata {
            created: chrono::Utc::now().to_rfc3339(),
            total_records: join.records.len(),
            matched_combinations: join.classification.matched.len(),
            unmatched_combinations: join.classification.spending_only.len(),
        },
        records: &join.records,
    }
}

/// CSV flattening of a lifecycle record: the list-valued fields become
/// delimited strings (CSV cells cannot nest).
#[derive(Debug, Serialize)]
pub struct LifecycleCsvRow {
    pub tas: String,
    pub tas_full: String,
    pub availability_period: String,
    pub availability_type: String,
    pub bureau: String,
    pub account_name: String,
    pub fund_type: String,
    pub budget_category: String,
    pub apportionment_fy: u16,
    pub apportionment_amount: f64,
    pub treasury_account_names: String,
    pub reporting_years: String,
    pub budget_authority: f64,
    pub obligations: f64,
    pub outlays: f64,
    pub unobligated_balance: f64,
    pub obligation_rate: f64,
    pub zero_denominator: bool,
}

pub fn lifecycle_csv_rows(join: &LifecycleJoin) -> Vec<LifecycleCsvRow> {
    join.records
        .iter()
        .map(|rec| LifecycleCsvRow {
            tas: rec.tas.clone(),
            tas_full: rec.tas_full.clone(),
            availability_period: rec.availability_period.clone(),
            availability_type: rec.availability_type.clone(),
            bureau: rec.bureau.clone(),
            account_name: rec.account_name.clone(),
            fund_type: rec.fund_type.clone(),
            budget_category: rec.budget_category.clone(),
            apportionment_fy: rec.apportionment_fy,
            apportionment_amount: rec.apportionment_amount,
            treasury_account_names: rec.treasury_account_names.join("; "),
            reporting_years: rec
                .reporting_years
                .iter()
                .map(|y| y.to_string())
                .collect::<Vec<_>>()
                .join(","),
            budget_authority: rec.budget_authority,
            obligations: rec.obligations,
            outlays: rec.outlays,
            unobligated_balance: rec.unobligated_balance,
            obligation_rate: rec.obligation_rate,
            zero_denominator: rec.zero_denominator,
        })
        .collect()
}

// ============================================================================
// OBJECT CLASS SUMMARY CSV
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ObjectClassSummaryRow {
    pub fiscal_year: Option<u16>,
    pub tas: String,
    pub component: String,
    pub total_obligations: f64,
    pub personnel_compensation: f64,
    pub personnel_benefits: f64,
    pub travel_transportation: f64,
    pub rent_utilities: f64,
    pub other_services: f64,
    pub supplies_equipment: f64,
    pub grants_fixed_charges: f64,
    pub other: f64,
    pub personnel_percentage: f64,
}

pub fn object_class_csv_rows(breakdowns: &[ObjectClassBreakdown]) -> Vec<ObjectClassSummaryRow> {
    breakdowns
        .iter()
        .map(|b| ObjectClassSummaryRow {
            fiscal_year: b.fiscal_year,
            tas: b.account.to_string(),
            component: b.component.clone(),
            total_obligations: b.total_obligations,
            personnel_compensation: b.category_amount(SpendingCategory::PersonnelCompensation),
            personnel_benefits: b.category_amount(SpendingCategory::PersonnelBenefits),
            travel_transportation: b.category_amount(SpendingCategory::TravelTransportation),
            rent_utilities: b.category_amount(SpendingCategory::RentUtilities),
            other_services: b.category_amount(SpendingCategory::OtherServices),
            supplies_equipment: b.category_amount(SpendingCategory::SuppliesEquipment),
            grants_fixed_charges: b.category_amount(SpendingCategory::GrantsFixedCharges),
            other: b.category_amount(SpendingCategory::Other),
            personnel_percentage: b.personnel_percentage(),
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tas::TasKey;

    fn merged_row(tas_full: &str, bureau: &str, amount: f64, fy: u16) -> MergedApportionmentRow {
        let key = TasKey::parse(tas_full).unwrap();
        MergedApportionmentRow {
            tas: key.coarse().to_string(),
            tas_full: key.to_string(),
            availability_period: key.availability.period_label(),
            availability_type: key.availability.type_label().to_string(),
            bureau: bureau.to_string(),
            account: "Operations and Support".to_string(),
            fiscal_year: fy,
            amount,
            amount_millions: amount / 1_000_000.0,
            iteration: 1,
            approval_date: None,
            fund_type: "General Fund".to_string(),
            budget_category: "Discretionary".to_string(),
        }
    }

    #[test]
    fn test_flat_budget_sorted_and_totaled() {
        let merged = vec![
            merged_row("070-0530-2023/2023", "U.S. Customs and Border Protection", 100.0, 2023),
            merged_row("070-0702-2023/2023", "Transportation Security Administration", 900.0, 2023),
            merged_row("070-0544-X", "United States Coast Guard", 500.0, 2024),
        ];
        let flat = build_flat_budget(&merged);

        assert_eq!(flat.total_amount, 1500.0);
        assert_eq!(flat.record_count, 3);
        // descending by amount
        assert_eq!(flat.data[0].amount, 900.0);
        assert_eq!(flat.data[2].amount, 100.0);
        assert_eq!(flat.fiscal_years, vec![2023, 2024]);
        assert_eq!(
            flat.availability_types,
            vec!["annual".to_string(), "no-year".to_string()]
        );
        assert_eq!(flat.data[0].abbreviation, "TSA");
        assert_eq!(
            flat.bureau_abbreviations["United States Coast Guard"],
            "USCG"
        );
    }

    #[test]
    fn test_flat_budget_empty() {
        let flat = build_flat_budget(&[]);
        assert_eq!(flat.total_amount, 0.0);
        assert_eq!(flat.record_count, 0);
        assert!(flat.fiscal_years.is_empty());
    }
}
