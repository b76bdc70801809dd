// Ingestion - CSV sources to typed records
// One raw row shape and one normalization function per input format. Raw
// rows keep every field optional; normalization produces typed records or
// counts the row as unparseable. Missing files are fatal, malformed rows
// never are.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use log::warn;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::fund_types::FundType;
use crate::records::{
    ApportionmentLine, FundTypeEntry, ObjectClassLine, SpendingRecord, SpendingSnapshot,
};
use crate::report::RunTally;
use crate::tas::{self, ParsedTas};

/// Filename markers for the two USAspending export kinds.
const ACCOUNT_BALANCES_MARKER: &str = "AccountBalances";
const PA_OC_MARKER: &str = "AccountBreakdownByPA-OC";

// ============================================================================
// RAW ROW SHAPES
// ============================================================================

/// Flattened OpenOMB schedule line, as exported by the fetch layer.
#[derive(Debug, Deserialize)]
struct RawScheduleRow {
    #[serde(rename = "file_id")]
    file_id: Option<String>,
    #[serde(rename = "fiscal_year")]
    fiscal_year: Option<String>,
    #[serde(rename = "approval_date")]
    approval_date: Option<String>,
    #[serde(rename = "BudgetBureauTitle")]
    bureau: Option<String>,
    #[serde(rename = "AccountTitle")]
    account: Option<String>,
    #[serde(rename = "CgacAgency")]
    cgac_agency: Option<String>,
    #[serde(rename = "CgacAcct")]
    cgac_acct: Option<String>,
    #[serde(rename = "AvailabilityTypeCode")]
    availability_type_code: Option<String>,
    #[serde(rename = "BeginPoa")]
    begin_poa: Option<String>,
    #[serde(rename = "EndPoa")]
    end_poa: Option<String>,
    #[serde(rename = "LineNumber")]
    line_number: Option<String>,
    #[serde(rename = "LineDescription")]
    line_description: Option<String>,
    #[serde(rename = "ApprovedAmount")]
    approved_amount: Option<String>,
    #[serde(rename = "Iteration")]
    iteration: Option<String>,
}

/// USAspending AccountBalances row.
#[derive(Debug, Deserialize)]
struct RawBalanceRow {
    treasury_account_symbol: Option<String>,
    treasury_account_name: Option<String>,
    agency_identifier_code: Option<String>,
    main_account_code: Option<String>,
    sub_account_code: Option<String>,
    beginning_period_of_availability: Option<String>,
    ending_period_of_availability: Option<String>,
    budget_authority_appropriated_amount: Option<String>,
    obligations_incurred: Option<String>,
    gross_outlay_amount: Option<String>,
    unobligated_balance: Option<String>,
}

/// USAspending program-activity / object-class breakdown row.
#[derive(Debug, Deserialize)]
struct RawPaOcRow {
    treasury_account_symbol: Option<String>,
    treasury_account_name: Option<String>,
    program_activity_name: Option<String>,
    object_class_code: Option<String>,
    object_class_name: Option<String>,
    obligations_incurred: Option<String>,
    #[serde(rename = "gross_outlay_amount_FYB_to_period_end")]
    gross_outlay_amount: Option<String>,
}

/// FAST Book reference row.
#[derive(Debug, Deserialize)]
struct RawFastBookRow {
    #[serde(rename = "TAS")]
    tas: Option<String>,
    #[serde(rename = "Fund Type")]
    fund_type: Option<String>,
}

// ============================================================================
// APPORTIONMENT
// ============================================================================

pub fn load_apportionment(
    config: &PipelineConfig,
    tally: &mut RunTally,
) -> Result<Vec<ApportionmentLine>> {
    let path = &config.inputs.apportionment_csv;
    let reader = open_csv(path)?;
    read_apportionment(reader, config, tally)
        .with_context(|| format!("Failed to read apportionment data from {:?}", path))
}

fn read_apportionment<R: Read>(
    mut reader: csv::Reader<R>,
    config: &PipelineConfig,
    tally: &mut RunTally,
) -> Result<Vec<ApportionmentLine>> {
    let mut lines = Vec::new();

    for row in reader.deserialize() {
        tally.processed += 1;
        let row: RawScheduleRow = match row {
            Ok(row) => row,
            Err(err) => {
                warn!("skipping malformed schedule row: {}", err);
                tally.unparseable_tas += 1;
                continue;
            }
        };

        let fiscal_year = row.fiscal_year.as_deref().and_then(parse_u16);
        let key = tas::parse_openomb(
            row.cgac_agency.as_deref().unwrap_or(""),
            row.cgac_acct.as_deref().unwrap_or(""),
            row.availability_type_code.as_deref(),
            row.begin_poa.as_deref().and_then(parse_u16),
            row.end_poa.as_deref().and_then(parse_u16),
            fiscal_year,
        );

        let (Some(key), Some(fiscal_year)) = (key, fiscal_year) else {
            tally.unparseable_tas += 1;
            continue;
        };
        if key.coarse().agency != config.agency_code {
            continue;
        }

        lines.push(ApportionmentLine {
            key,
            bureau: row.bureau.unwrap_or_default(),
            account: row.account.unwrap_or_default(),
            line_number: row.line_number.unwrap_or_default(),
            line_description: row.line_description,
            amount: parse_money(row.approved_amount.as_deref(), tally),
            iteration: row
                .iteration
                .as_deref()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .unwrap_or(0),
            fiscal_year,
            approval_date: row.approval_date.as_deref().and_then(parse_date),
            file_id: row.file_id,
        });
    }

    Ok(lines)
}

// ============================================================================
// SPENDING SNAPSHOTS
// ============================================================================

pub fn load_spending_snapshots(
    config: &PipelineConfig,
    tally: &mut RunTally,
) -> Result<Vec<SpendingSnapshot>> {
    let files = find_export_files(&config.inputs.usaspending_dir, ACCOUNT_BALANCES_MARKER)?;
    if files.is_empty() {
        bail!(
            "missing required input: no {} files under {:?}",
            ACCOUNT_BALANCES_MARKER,
            config.inputs.usaspending_dir
        );
    }

    let mut snapshots = Vec::new();
    for path in files {
        let reader = open_csv(&path)?;
        let records = read_balance_rows(reader, config, tally)
            .with_context(|| format!("Failed to read spending snapshot {:?}", path))?;
        let name = file_name(&path);
        snapshots.push(SpendingSnapshot {
            reporting_year: reporting_year_from_filename(&name),
            as_of: date_from_filename(&name),
            source_file: name,
            records,
        });
    }
    Ok(snapshots)
}

fn read_balance_rows<R: Read>(
    mut reader: csv::Reader<R>,
    config: &PipelineConfig,
    tally: &mut RunTally,
) -> Result<Vec<SpendingRecord>> {
    let mut records = Vec::new();

    for row in reader.deserialize() {
        tally.processed += 1;
        let row: RawBalanceRow = match row {
            Ok(row) => row,
            Err(err) => {
                warn!("skipping malformed balance row: {}", err);
                tally.unparseable_tas += 1;
                continue;
            }
        };

        let Some(parsed) = parse_balance_tas(&row) else {
            tally.unparseable_tas += 1;
            continue;
        };
        if parsed.account.agency != config.agency_code {
            continue;
        }

        records.push(SpendingRecord {
            tas: parsed,
            treasury_account_name: row.treasury_account_name.unwrap_or_default(),
            budget_authority: parse_money(row.budget_authority_appropriated_amount.as_deref(), tally),
            obligations: parse_money(row.obligations_incurred.as_deref(), tally),
            outlays: parse_money(row.gross_outlay_amount.as_deref(), tally),
            unobligated_balance: parse_money(row.unobligated_balance.as_deref(), tally),
        });
    }

    Ok(records)
}

/// Prefer the full TAS string; fall back to reassembling it from the
/// component columns (some exports leave the symbol blank but carry the
/// pieces).
fn parse_balance_tas(row: &RawBalanceRow) -> Option<ParsedTas> {
    if let Some(symbol) = row.treasury_account_symbol.as_deref() {
        if let Some(parsed) = tas::parse_usaspending(symbol) {
            return Some(parsed);
        }
    }

    let key = tas::from_usaspending_columns(
        row.agency_identifier_code.as_deref().unwrap_or(""),
        row.beginning_period_of_availability
            .as_deref()
            .and_then(parse_u16),
        row.ending_period_of_availability
            .as_deref()
            .and_then(parse_u16),
        row.main_account_code.as_deref().unwrap_or(""),
    )?;

    let sub_account = row
        .sub_account_code
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{:0>3}", s))
        .unwrap_or_else(|| "000".to_string());
    let raw = row
        .treasury_account_symbol
        .clone()
        .unwrap_or_else(|| key.to_string());

    Some(ParsedTas {
        account: key.account.clone(),
        sub_account,
        availability: key.availability,
        raw,
    })
}

// ============================================================================
// OBJECT CLASS BREAKDOWNS
// ============================================================================

pub fn load_object_class_lines(
    config: &PipelineConfig,
    tally: &mut RunTally,
) -> Result<Vec<ObjectClassLine>> {
    let files = find_export_files(&config.inputs.usaspending_dir, PA_OC_MARKER)?;
    if files.is_empty() {
        bail!(
            "missing required input: no {} files under {:?}",
            PA_OC_MARKER,
            config.inputs.usaspending_dir
        );
    }

    let mut lines = Vec::new();
    for path in files {
        let name = file_name(&path);
        let fiscal_year = reporting_year_from_filename(&name);
        let reader = open_csv(&path)?;
        read_pa_oc_rows(reader, config, fiscal_year, tally, &mut lines)
            .with_context(|| format!("Failed to read PA-OC breakdown {:?}", path))?;
    }
    Ok(lines)
}

fn read_pa_oc_rows<R: Read>(
    mut reader: csv::Reader<R>,
    config: &PipelineConfig,
    fiscal_year: Option<u16>,
    tally: &mut RunTally,
    lines: &mut Vec<ObjectClassLine>,
) -> Result<()> {
    for row in reader.deserialize() {
        tally.processed += 1;
        let row: RawPaOcRow = match row {
            Ok(row) => row,
            Err(err) => {
                warn!("skipping malformed PA-OC row: {}", err);
                tally.unparseable_tas += 1;
                continue;
            }
        };

        let parsed = row
            .treasury_account_symbol
            .as_deref()
            .and_then(tas::parse_usaspending);
        let Some(parsed) = parsed else {
            tally.unparseable_tas += 1;
            continue;
        };
        if parsed.account.agency != config.agency_code {
            continue;
        }

        lines.push(ObjectClassLine {
            key: parsed.fine_key(),
            treasury_account_name: row.treasury_account_name.unwrap_or_default(),
            program_activity: row
                .program_activity_name
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            object_class_code: row.object_class_code.filter(|s| !s.trim().is_empty()),
            object_class_name: row
                .object_class_name
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            obligations: parse_money(row.obligations_incurred.as_deref(), tally),
            outlays: parse_money(row.gross_outlay_amount.as_deref(), tally),
            fiscal_year,
        });
    }
    Ok(())
}

// ============================================================================
// FAST BOOK REFERENCE
// ============================================================================

pub fn load_fund_type_entries(
    config: &PipelineConfig,
    tally: &mut RunTally,
) -> Result<Vec<FundTypeEntry>> {
    let path = &config.inputs.fastbook_csv;
    let reader = open_csv(path)?;
    read_fund_type_rows(reader, config, tally)
        .with_context(|| format!("Failed to read FAST Book reference from {:?}", path))
}

fn read_fund_type_rows<R: Read>(
    mut reader: csv::Reader<R>,
    config: &PipelineConfig,
    tally: &mut RunTally,
) -> Result<Vec<FundTypeEntry>> {
    let mut entries = Vec::new();

    for row in reader.deserialize() {
        tally.processed += 1;
        let row: RawFastBookRow = match row {
            Ok(row) => row,
            Err(err) => {
                warn!("skipping malformed FAST Book row: {}", err);
                tally.unparseable_tas += 1;
                continue;
            }
        };

        let raw_tas = row.tas.unwrap_or_default();
        let Some(account) = tas::parse_fastbook(&raw_tas, &config.agency_code) else {
            tally.unparseable_tas += 1;
            continue;
        };

        entries.push(FundTypeEntry {
            account,
            raw_tas,
            fund_type: FundType::from_label(row.fund_type.as_deref().unwrap_or("")),
        });
    }

    Ok(entries)
}

// ============================================================================
// FILE DISCOVERY & FIELD PARSING
// ============================================================================

fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("missing required input: {:?}", path))
}

/// Find export CSVs under a directory whose filename carries `marker`,
/// sorted by path so snapshot order is stable across runs.
fn find_export_files(dir: &Path, marker: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        bail!("missing required input: directory {:?} does not exist", dir);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let name = file_name(path);
            name.contains(marker) && name.to_lowercase().ends_with(".csv")
        })
        .collect();
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `FY2023_All_TAS_AccountBalances_...` or `FY2025P01-P09_...` - the four
/// digits after "FY" are the reporting fiscal year.
fn reporting_year_from_filename(name: &str) -> Option<u16> {
    let rest = name.strip_prefix("FY")?;
    if rest.len() < 4 {
        return None;
    }
    rest[..4].parse().ok()
}

/// Export filenames embed the pull date as a `YYYY-MM-DD` segment.
fn date_from_filename(name: &str) -> Option<NaiveDate> {
    name.split(['_', '.'])
        .find_map(|segment| NaiveDate::parse_from_str(segment, "%Y-%m-%d").ok())
}

fn parse_u16(s: &str) -> Option<u16> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    // exports sometimes write years as floats ("2023.0")
    if let Ok(year) = s.parse::<u16>() {
        return Some(year);
    }
    s.parse::<f64>().ok().map(|f| f as u16)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() >= 10 {
        NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d").ok()
    } else {
        None
    }
}

/// Parse a monetary field. Absent or blank is silently zero; present but
/// non-numeric is zero plus an invalid-amount tally.
fn parse_money(value: Option<&str>, tally: &mut RunTally) -> f64 {
    let Some(value) = value else { return 0.0 };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | ','))
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            tally.invalid_amounts += 1;
            0.0
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
