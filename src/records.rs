// Typed records - one explicit shape per input kind
// Every source row is normalized into one of these before any join or
// aggregation touches it. Optional source fields stay Option here; monetary
// fields default to zero when the source is blank or non-numeric.

use chrono::NaiveDate;

use crate::tas::{Availability, ParsedTas, TasKey};

// ============================================================================
// APPORTIONMENT (OpenOMB schedule data)
// ============================================================================

/// One approved budget-authority row for a TAS + availability period in a
/// fiscal year. Superseded by later iterations of the same file; only the
/// max-amount record per group survives aggregation.
#[derive(Debug, Clone)]
pub struct ApportionmentLine {
    pub key: TasKey,
    pub bureau: String,
    pub account: String,
    /// Budget line code: "1920" is the budgetary-resource total, "6190" the
    /// fallback total when a dataset carries no 1920 lines
    pub line_number: String,
    pub line_description: Option<String>,
    pub amount: f64,
    /// Monotonic revision counter within one account's filings
    pub iteration: i64,
    pub fiscal_year: u16,
    pub approval_date: Option<NaiveDate>,
    pub file_id: Option<String>,
}

impl ApportionmentLine {
    pub fn availability(&self) -> Availability {
        self.key.availability
    }
}

// ============================================================================
// SPENDING (USAspending account balances)
// ============================================================================

/// One row of a USAspending AccountBalances snapshot. Flow fields (budget
/// authority, obligations, outlays) sum across snapshots; the unobligated
/// balance is a point-in-time value and must not be summed.
#[derive(Debug, Clone)]
pub struct SpendingRecord {
    pub tas: ParsedTas,
    pub treasury_account_name: String,
    pub budget_authority: f64,
    pub obligations: f64,
    pub outlays: f64,
    pub unobligated_balance: f64,
}

impl SpendingRecord {
    pub fn fine_key(&self) -> TasKey {
        self.tas.fine_key()
    }
}

/// One reporting-period snapshot file. `reporting_year` and `as_of` order
/// snapshots for last-value-wins balance resolution.
#[derive(Debug, Clone)]
pub struct SpendingSnapshot {
    pub source_file: String,
    pub reporting_year: Option<u16>,
    pub as_of: Option<NaiveDate>,
    pub records: Vec<SpendingRecord>,
}

impl SpendingSnapshot {
    /// Sort key: reporting year first, then the export date inside the year.
    pub fn order_key(&self) -> (u16, NaiveDate) {
        (
            self.reporting_year.unwrap_or(0),
            self.as_of.unwrap_or(NaiveDate::MIN),
        )
    }
}

// ============================================================================
// OBJECT CLASS (USAspending PA-OC breakdown)
// ============================================================================

/// One program-activity / object-class breakdown row.
#[derive(Debug, Clone)]
pub struct ObjectClassLine {
    pub key: TasKey,
    pub treasury_account_name: String,
    pub program_activity: String,
    pub object_class_code: Option<String>,
    pub object_class_name: String,
    pub obligations: f64,
    pub outlays: f64,
    pub fiscal_year: Option<u16>,
}

// ============================================================================
// FUND TYPE REFERENCE (Treasury FAST Book)
// ============================================================================

/// One FAST Book reference row, keyed by coarse account key.
#[derive(Debug, Clone)]
pub struct FundTypeEntry {
    pub account: crate::tas::AccountKey,
    pub raw_tas: String,
    pub fund_type: crate::fund_types::FundType,
}
