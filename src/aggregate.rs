// Aggregation policies
// Collapses duplicate and overlapping records into one row per entity:
// apportionment revisions resolve by max amount, spending flows sum across
// snapshots, and point-in-time balances take the latest snapshot's value.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::records::{ApportionmentLine, SpendingSnapshot};
use crate::tas::{AccountKey, TasKey};

/// "Total budgetary resources available" - the main total line per TAS/period.
pub const TOTAL_LINE: &str = "1920";
/// Alternate total line, used only when a dataset has no 1920 lines at all.
pub const FALLBACK_TOTAL_LINE: &str = "6190";

// ============================================================================
// APPORTIONMENT
// ============================================================================

/// One aggregated apportionment row: the surviving budget-resource total for
/// a (TAS, period, bureau, account, fiscal year) group.
#[derive(Debug, Clone, PartialEq)]
pub struct ApportionmentAggregate {
    pub key: TasKey,
    pub bureau: String,
    pub account: String,
    pub fiscal_year: u16,
    pub amount: f64,
    pub approval_date: Option<NaiveDate>,
    pub iteration: i64,
}

impl ApportionmentAggregate {
    /// `AAA-MMMM-period` identifier used in output tables.
    pub fn tas_full(&self) -> String {
        self.key.to_string()
    }

    pub fn amount_millions(&self) -> f64 {
        self.amount / 1_000_000.0
    }
}

/// Aggregate schedule lines into one row per (TAS, period, bureau, account,
/// fiscal year).
///
/// Only budget-resource-total lines participate: line 1920, or 6190 when the
/// dataset carries no 1920 lines at all. Within a group the maximum amount
/// wins - "latest approved revision" in practice, though revisions are not
/// guaranteed monotonic, so this is max-amount, not max-iteration. The
/// latest approval date and highest iteration ride along as provenance.
pub fn aggregate_apportionment(lines: &[ApportionmentLine]) -> Vec<ApportionmentAggregate> {
    let has_total_lines = lines.iter().any(|l| l.line_number == TOTAL_LINE);
    let wanted = if has_total_lines { TOTAL_LINE } else { FALLBACK_TOTAL_LINE };

    type GroupKey = (TasKey, String, String, u16);
    let mut groups: BTreeMap<GroupKey, ApportionmentAggregate> = BTreeMap::new();

    for line in lines.iter().filter(|l| l.line_number == wanted) {
        let group_key = (
            line.key.clone(),
            line.bureau.clone(),
            line.account.clone(),
            line.fiscal_year,
        );

        match groups.entry(group_key) {
            Entry::Vacant(slot) => {
                slot.insert(ApportionmentAggregate {
                    key: line.key.clone(),
                    bureau: line.bureau.clone(),
                    account: line.account.clone(),
                    fiscal_year: line.fiscal_year,
                    amount: line.amount,
                    approval_date: line.approval_date,
                    iteration: line.iteration,
                });
            }
            Entry::Occupied(mut slot) => {
                // each field keeps its own maximum - amount drives totals,
                // date and iteration are provenance only
                let agg = slot.get_mut();
                agg.amount = agg.amount.max(line.amount);
                agg.approval_date = agg.approval_date.max(line.approval_date);
                agg.iteration = agg.iteration.max(line.iteration);
            }
        }
    }

    let mut rows: Vec<ApportionmentAggregate> = groups.into_values().collect();
    rows.sort_by(|a, b| {
        (&a.bureau, &a.account, &a.key)
            .cmp(&(&b.bureau, &b.account, &b.key))
    });
    rows
}

// ============================================================================
// SPENDING LIFECYCLE
// ============================================================================

/// Lifecycle totals for one fine key across every reporting snapshot.
#[derive(Debug, Clone, Default)]
pub struct SpendingLifecycle {
    pub budget_authority: f64,
    pub obligations: f64,
    pub outlays: f64,
    /// Point-in-time balance from the most recently dated snapshot
    pub unobligated_balance: f64,
    pub treasury_account_names: BTreeSet<String>,
    pub reporting_years: BTreeSet<u16>,
}

/// Sum flow fields across snapshots per fine key; resolve the unobligated
/// balance last-value-wins by snapshot date.
///
/// Each snapshot is a distinct cumulative reporting period, so flows add
/// without double counting. Balances are point-in-time: summing them across
/// snapshots would inflate totals meaninglessly, so only the latest
/// snapshot's balance (summed over that snapshot's sub-account rows)
/// survives.
pub fn aggregate_spending_lifecycle(
    snapshots: &[SpendingSnapshot],
) -> BTreeMap<TasKey, SpendingLifecycle> {
    let mut ordered: Vec<&SpendingSnapshot> = snapshots.iter().collect();
    ordered.sort_by_key(|s| s.order_key());

    let mut lifecycle: BTreeMap<TasKey, SpendingLifecycle> = BTreeMap::new();

    for snapshot in ordered {
        let mut snapshot_balances: BTreeMap<TasKey, f64> = BTreeMap::new();

        for record in &snapshot.records {
            let key = record.fine_key();
            let entry = lifecycle.entry(key.clone()).or_default();

            entry.budget_authority += record.budget_authority;
            entry.obligations += record.obligations;
            entry.outlays += record.outlays;
            if !record.treasury_account_name.trim().is_empty() {
                entry
                    .treasury_account_names
                    .insert(record.treasury_account_name.clone());
            }
            if let Some(year) = snapshot.reporting_year {
                entry.reporting_years.insert(year);
            }

            *snapshot_balances.entry(key).or_insert(0.0) += record.unobligated_balance;
        }

        // later snapshots overwrite earlier balances for the keys they carry
        for (key, balance) in snapshot_balances {
            if let Some(entry) = lifecycle.get_mut(&key) {
                entry.unobligated_balance = balance;
            }
        }
    }

    lifecycle
}

// ============================================================================
// APPROPRIATION-YEAR VIEW
// ============================================================================

/// Flow totals per coarse account per appropriation year (the year funds
/// became available), regardless of which reporting year the activity
/// happened in.
#[derive(Debug, Clone, Default)]
pub struct AppropriationYearTotals {
    pub budget_authority: f64,
    pub obligations: f64,
    pub outlays: f64,
    pub treasury_account_names: BTreeSet<String>,
}

/// Group spending by (appropriation year, coarse key). Records with no
/// year-limited availability carry no appropriation year and are skipped -
/// ingestion already tallied any unparseable rows.
pub fn aggregate_by_appropriation_year(
    snapshots: &[SpendingSnapshot],
) -> BTreeMap<(u16, AccountKey), AppropriationYearTotals> {
    let mut groups: BTreeMap<(u16, AccountKey), AppropriationYearTotals> = BTreeMap::new();

    for snapshot in snapshots {
        for record in &snapshot.records {
            let Some(year) = record.tas.availability.begin_year() else {
                continue;
            };
            let entry = groups
                .entry((year, record.tas.account.clone()))
                .or_default();
            entry.budget_authority += record.budget_authority;
            entry.obligations += record.obligations;
            entry.outlays += record.outlays;
            if !record.treasury_account_name.trim().is_empty() {
                entry
                    .treasury_account_names
                    .insert(record.treasury_account_name.clone());
            }
        }
    }

    groups
}

// ============================================================================
// TESTS
// ============================================================================
