// Run reports - validation, reconciliation, and loss accounting
// Every run ends in a report that states how many records were processed vs.
// excluded, so silent data loss is impossible: any exclusion shows up in a
// count.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::components;
use crate::join::{obligation_rate, ClassifiedKey, KeyClassification, LifecycleJoin};
use crate::tas::{AccountKey, TasKey};

/// How many left-only / right-only keys are echoed to the console. The JSON
/// report always carries the full lists.
const SAMPLE_LIMIT: usize = 10;

// ============================================================================
// RUN TALLY
// ============================================================================

/// Running counts of records seen and records excluded. Owned by the single
/// aggregation pass; merged across input files.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunTally {
    /// Rows read from source files
    pub processed: usize,
    /// Rows excluded because their TAS did not parse
    pub unparseable_tas: usize,
    /// Monetary fields that were present but non-numeric (coerced to zero)
    pub invalid_amounts: usize,
}

impl RunTally {
    pub fn merge(&mut self, other: RunTally) {
        self.processed += other.processed;
        self.unparseable_tas += other.unparseable_tas;
        self.invalid_amounts += other.invalid_amounts;
    }

    pub fn included(&self) -> usize {
        self.processed.saturating_sub(self.unparseable_tas)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows processed, {} included, {} excluded (unparseable TAS), {} invalid amounts coerced to zero",
            self.processed,
            self.included(),
            self.unparseable_tas,
            self.invalid_amounts
        )
    }
}

// ============================================================================
// TAS VALIDATION REPORT (coarse keys)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MatchedTas {
    pub tas: String,
    pub treasury_account_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpendingOnlyTas {
    pub tas: String,
    pub treasury_account_name: String,
}

/// Coarse-key comparison of the spending data against the apportionment
/// data, in the shape the downstream review tooling expects.
#[derive(Debug, Clone, Serialize)]
pub struct TasValidationReport {
    pub generated_at: String,
    pub total_apportionment_tas: usize,
    pub total_spending_tas: usize,
    pub matched: usize,
    pub apportionment_only: usize,
    pub spending_only: usize,
    /// Percent of apportionment accounts found in spending data
    pub apportionment_match_rate: f64,
    /// Percent of spending accounts found in apportionment data
    pub spending_match_rate: f64,
    pub matches: Vec<MatchedTas>,
    pub apportionment_only_tas: Vec<String>,
    pub spending_only_tas: Vec<SpendingOnlyTas>,
    pub component_coverage: ComponentCoverage,
}

impl TasValidationReport {
    pub fn build(
        classification: &KeyClassification<AccountKey>,
        account_names: &BTreeMap<AccountKey, String>,
        component_coverage: ComponentCoverage,
    ) -> TasValidationReport {
        let name_of = |key: &AccountKey| {
            account_names
                .get(key)
                .cloned()
                .unwrap_or_default()
        };

        let app_total = classification.matched.len() + classification.apportionment_only.len();
        let spend_total = classification.matched.len() + classification.spending_only.len();

        TasValidationReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            total_apportionment_tas: app_total,
            total_spending_tas: spend_total,
            matched: classification.matched.len(),
            apportionment_only: classification.apportionment_only.len(),
            spending_only: classification.spending_only.len(),
            apportionment_match_rate: percentage(classification.matched.len(), app_total),
            spending_match_rate: percentage(classification.matched.len(), spend_total),
            matches: classification
                .matched
                .iter()
                .map(|k| MatchedTas {
                    tas: k.to_string(),
                    treasury_account_name: name_of(k),
                })
                .collect(),
            apportionment_only_tas: classification
                .apportionment_only
                .iter()
                .map(|k| k.to_string())
                .collect(),
            spending_only_tas: classification
                .spending_only
                .iter()
                .map(|k| SpendingOnlyTas {
                    tas: k.to_string(),
                    treasury_account_name: name_of(k),
                })
                .collect(),
            component_coverage,
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== TAS VALIDATION REPORT ===");
        println!("\nDataset sizes:");
        println!("  Apportionment TAS codes: {}", self.total_apportionment_tas);
        println!("  Spending TAS codes: {}", self.total_spending_tas);
        println!("\nMatches: {}", self.matched);
        println!("\nMatch rates:");
        println!(
            "  % of apportionment TAS found in spending data: {:.1}%",
            self.apportionment_match_rate
        );
        println!(
            "  % of spending TAS found in apportionment data: {:.1}%",
            self.spending_match_rate
        );

        if !self.spending_only_tas.is_empty() {
            println!(
                "\nTAS in spending data but NOT in apportionment ({} total):",
                self.spending_only_tas.len()
            );
            for (i, tas) in self.spending_only_tas.iter().take(SAMPLE_LIMIT).enumerate() {
                println!("  {}. {}: {}", i + 1, tas.tas, tas.treasury_account_name);
            }
        }

        if !self.apportionment_only_tas.is_empty() {
            println!(
                "\nTAS in apportionment but NOT in spending data ({} total):",
                self.apportionment_only_tas.len()
            );
            for (i, tas) in self.apportionment_only_tas.iter().take(SAMPLE_LIMIT).enumerate() {
                println!("  {}. {}", i + 1, tas);
            }
        }

        println!("\nComponent coverage:");
        println!(
            "  Matched components: {}   Unknown: {}",
            self.component_coverage.matched_components,
            self.component_coverage.unknown_components
        );
        for component in &self.component_coverage.components_not_in_apportionment {
            println!("  Not in apportionment: {}", component);
        }
    }
}

// ============================================================================
// COMPONENT COVERAGE
// ============================================================================

/// How well spending-side component extraction lines up with the bureaus the
/// apportionment data knows. Uses the fuzzy bidirectional bureau match, so
/// "U.S. Customs and Border Protection" and "Customs and Border Protection"
/// count as the same component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentCoverage {
    pub matched_components: usize,
    pub unknown_components: usize,
    /// Components extracted from spending data that no apportionment bureau
    /// matches - a data-quality signal
    pub components_not_in_apportionment: Vec<String>,
}

impl ComponentCoverage {
    pub fn build<'a, I>(treasury_account_names: I, bureaus: &[String]) -> ComponentCoverage
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut matched = 0usize;
        let mut unknown = 0usize;
        let mut missing: Vec<String> = Vec::new();

        for name in treasury_account_names {
            let component = components::component_name(name);
            if component == components::UNKNOWN_COMPONENT {
                unknown += 1;
                continue;
            }
            matched += 1;

            let in_apportionment = bureaus
                .iter()
                .any(|bureau| components::bureaus_match(&component, bureau));
            if !in_apportionment && !missing.contains(&component) {
                missing.push(component);
            }
        }

        ComponentCoverage {
            matched_components: matched,
            unknown_components: unknown,
            components_not_in_apportionment: missing,
        }
    }
}

// ============================================================================
// RECONCILIATION REPORT (fine keys + subtotals)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FiscalYearSubtotal {
    pub fiscal_year: u16,
    pub availability_type: String,
    pub record_count: usize,
    pub apportionment_amount: f64,
    pub obligations: f64,
    pub outlays: f64,
    pub obligation_rate: f64,
    pub zero_denominator: bool,
}

/// The structured end-of-run record for a lifecycle reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub generated_at: String,
    pub apportionment_keys: usize,
    pub spending_keys: usize,
    pub matched: usize,
    pub apportionment_only: usize,
    pub spending_only: usize,
    pub apportionment_match_rate: f64,
    pub spending_match_rate: f64,
    pub apportionment_only_keys: Vec<String>,
    pub spending_only_keys: Vec<String>,
    pub classifications: Vec<ClassifiedKey>,
    pub fiscal_year_subtotals: Vec<FiscalYearSubtotal>,
    pub tally: RunTally,
}

impl ReconciliationReport {
    pub fn build(join: &LifecycleJoin, tally: RunTally) -> ReconciliationReport {
        let c = &join.classification;
        let app_total = c.matched.len() + c.apportionment_only.len();
        let spend_total = c.matched.len() + c.spending_only.len();

        ReconciliationReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            apportionment_keys: app_total,
            spending_keys: spend_total,
            matched: c.matched.len(),
            apportionment_only: c.apportionment_only.len(),
            spending_only: c.spending_only.len(),
            apportionment_match_rate: percentage(c.matched.len(), app_total),
            spending_match_rate: percentage(c.matched.len(), spend_total),
            apportionment_only_keys: keys_to_strings(&c.apportionment_only),
            spending_only_keys: keys_to_strings(&c.spending_only),
            classifications: join.classified_keys.clone(),
            fiscal_year_subtotals: fiscal_year_subtotals(join),
            tally,
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== RECONCILIATION SUMMARY ===");
        println!(
            "Matched: {} of {} apportionment keys ({:.1}%), {} spending keys ({:.1}%)",
            self.matched,
            self.apportionment_keys,
            self.apportionment_match_rate,
            self.spending_keys,
            self.spending_match_rate
        );
        println!(
            "Apportionment-only: {}   Spending-only: {}",
            self.apportionment_only, self.spending_only
        );

        if !self.spending_only_keys.is_empty() {
            println!("\nSample spending-only keys (data-quality signal):");
            for key in self.spending_only_keys.iter().take(SAMPLE_LIMIT) {
                println!("  {}", key);
            }
        }

        println!("\n=== Summary by Fiscal Year and Availability Type ===");
        let mut last_fy = None;
        for sub in &self.fiscal_year_subtotals {
            if last_fy != Some(sub.fiscal_year) {
                println!("\nFY{}:", sub.fiscal_year);
                last_fy = Some(sub.fiscal_year);
            }
            println!(
                "  {}: {} records",
                sub.availability_type.to_uppercase(),
                sub.record_count
            );
            println!(
                "    Apportionment: ${:.2}B",
                sub.apportionment_amount / 1e9
            );
            if sub.zero_denominator {
                println!(
                    "    Obligations: ${:.2}B (no apportioned amount)",
                    sub.obligations / 1e9
                );
            } else {
                println!(
                    "    Obligations: ${:.2}B ({:.1}%)",
                    sub.obligations / 1e9,
                    sub.obligation_rate
                );
            }
            println!("    Outlays: ${:.2}B", sub.outlays / 1e9);
        }

        println!("\n{}", self.tally.summary());
    }
}

fn fiscal_year_subtotals(join: &LifecycleJoin) -> Vec<FiscalYearSubtotal> {
    #[derive(Default)]
    struct Acc {
        count: usize,
        apportionment: f64,
        obligations: f64,
        outlays: f64,
    }

    let mut groups: BTreeMap<(u16, String), Acc> = BTreeMap::new();
    for rec in &join.records {
        let acc = groups
            .entry((rec.apportionment_fy, rec.availability_type.clone()))
            .or_default();
        acc.count += 1;
        acc.apportionment += rec.apportionment_amount;
        acc.obligations += rec.obligations;
        acc.outlays += rec.outlays;
    }

    groups
        .into_iter()
        .map(|((fy, availability_type), acc)| {
            let rate = obligation_rate(acc.obligations, acc.apportionment);
            FiscalYearSubtotal {
                fiscal_year: fy,
                availability_type,
                record_count: acc.count,
                apportionment_amount: acc.apportionment,
                obligations: acc.obligations,
                outlays: acc.outlays,
                obligation_rate: rate.rate,
                zero_denominator: rate.zero_denominator,
            }
        })
        .collect()
}

fn keys_to_strings(keys: &std::collections::BTreeSet<TasKey>) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ApportionmentAggregate;
    use crate::fund_types::FundTypeTable;
    use crate::join::join_lifecycle;
    use crate::aggregate::SpendingLifecycle;
    use std::collections::BTreeSet;

    fn empty_coverage() -> ComponentCoverage {
        ComponentCoverage::build(std::iter::empty(), &[])
    }

    fn classification(
        matched: &[&str],
        app_only: &[&str],
        spend_only: &[&str],
    ) -> KeyClassification<AccountKey> {
        let to_set = |keys: &[&str]| -> BTreeSet<AccountKey> {
            keys.iter().map(|k| AccountKey::parse(k).unwrap()).collect()
        };
        KeyClassification {
            matched: to_set(matched),
            apportionment_only: to_set(app_only),
            spending_only: to_set(spend_only),
        }
    }

    #[test]
    fn test_tally_accounting() {
        let mut tally = RunTally::default();
        tally.processed = 100;
        tally.unparseable_tas = 7;
        tally.invalid_amounts = 2;

        let mut other = RunTally::default();
        other.processed = 50;
        other.unparseable_tas = 3;
        tally.merge(other);

        assert_eq!(tally.processed, 150);
        assert_eq!(tally.unparseable_tas, 10);
        assert_eq!(tally.included(), 140);
        assert!(tally.summary().contains("150 rows processed"));
        assert!(tally.summary().contains("10 excluded"));
    }

    #[test]
    fn test_validation_report_rates() {
        let c = classification(
            &["070-0530", "070-0112"],
            &["070-0115"],
            &["070-0544", "070-0565"],
        );
        let mut names = BTreeMap::new();
        names.insert(
            AccountKey::parse("070-0544").unwrap(),
            "Some Fund, FEMA".to_string(),
        );

        let report = TasValidationReport::build(&c, &names, empty_coverage());
        assert_eq!(report.total_apportionment_tas, 3);
        assert_eq!(report.total_spending_tas, 4);
        assert!((report.apportionment_match_rate - 2.0 / 3.0 * 100.0).abs() < 1e-9);
        assert!((report.spending_match_rate - 50.0).abs() < 1e-9);
        assert_eq!(report.spending_only_tas.len(), 2);
        assert_eq!(
            report.spending_only_tas[0].treasury_account_name,
            "Some Fund, FEMA"
        );
    }

    #[test]
    fn test_validation_report_empty_sides() {
        let c = classification(&[], &[], &[]);
        let report = TasValidationReport::build(&c, &BTreeMap::new(), empty_coverage());
        assert_eq!(report.apportionment_match_rate, 0.0);
        assert_eq!(report.spending_match_rate, 0.0);
    }

    #[test]
    fn test_component_coverage_fuzzy_bureau_match() {
        let bureaus = vec![
            "U.S. Customs and Border Protection".to_string(),
            "Transportation Security Administration".to_string(),
        ];
        let names = [
            // extracts to "Customs and Border Protection", fuzzy-matches the
            // "U.S. "-prefixed bureau
            "Operations and Support, U.S. Customs and Border Protection",
            // extracts to "Secret Service", no bureau carries it
            "United States Secret Service, Operations and Support",
            // no keyword at all
            "Department of Nowhere",
        ];

        let coverage = ComponentCoverage::build(names, &bureaus);
        assert_eq!(coverage.matched_components, 2);
        assert_eq!(coverage.unknown_components, 1);
        assert_eq!(
            coverage.components_not_in_apportionment,
            vec!["Secret Service".to_string()]
        );
    }

    #[test]
    fn test_reconciliation_report_subtotals() {
        let apportionment = vec![
            ApportionmentAggregate {
                key: TasKey::parse("070-0530-2023/2023").unwrap(),
                bureau: "CBP".to_string(),
                account: "O&S".to_string(),
                fiscal_year: 2023,
                amount: 4_000.0,
                approval_date: None,
                iteration: 1,
            },
            ApportionmentAggregate {
                key: TasKey::parse("070-0702-2023/2023").unwrap(),
                bureau: "TSA".to_string(),
                account: "O&S".to_string(),
                fiscal_year: 2023,
                amount: 6_000.0,
                approval_date: None,
                iteration: 1,
            },
        ];
        let mut spending = BTreeMap::new();
        for (key, obligations) in [("070-0530-2023/2023", 1_000.0), ("070-0702-2023/2023", 4_000.0)]
        {
            spending.insert(
                TasKey::parse(key).unwrap(),
                SpendingLifecycle {
                    obligations,
                    ..Default::default()
                },
            );
        }

        let join = join_lifecycle(&apportionment, &spending, &FundTypeTable::default());
        let report = ReconciliationReport::build(&join, RunTally::default());

        assert_eq!(report.matched, 2);
        assert_eq!(report.fiscal_year_subtotals.len(), 1);
        let sub = &report.fiscal_year_subtotals[0];
        assert_eq!(sub.fiscal_year, 2023);
        assert_eq!(sub.availability_type, "annual");
        assert_eq!(sub.record_count, 2);
        assert_eq!(sub.apportionment_amount, 10_000.0);
        // 5,000 / 10,000 = 50%
        assert!((sub.obligation_rate - 50.0).abs() < 1e-9);
    }
}
