// Cross-source joiner
// Builds lookup tables keyed by normalized TAS, classifies every key present
// on either side of a comparison, and joins matched apportionment and
// spending data for rate computation.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::aggregate::{ApportionmentAggregate, SpendingLifecycle};
use crate::fund_types::{FundType, FundTypeTable};
use crate::tas::{AccountKey, TasKey};

// ============================================================================
// SET CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchClass {
    /// Key present in both datasets
    Matched,
    /// Apportioned but no recorded spending activity - expected for newly
    /// enacted accounts
    ApportionmentOnly,
    /// Spending against an account the apportionment data does not know -
    /// always a data-quality signal, never dropped
    SpendingOnly,
}

/// Partition of the key union into matched / left-only / right-only.
///
/// Invariant: the three sets are pairwise disjoint and their union equals
/// the union of both inputs, for all inputs including empty sets.
#[derive(Debug, Clone)]
pub struct KeyClassification<K: Ord> {
    pub matched: BTreeSet<K>,
    pub apportionment_only: BTreeSet<K>,
    pub spending_only: BTreeSet<K>,
}

impl<K: Ord + Clone> KeyClassification<K> {
    pub fn classify(apportionment: &BTreeSet<K>, spending: &BTreeSet<K>) -> KeyClassification<K> {
        KeyClassification {
            matched: apportionment.intersection(spending).cloned().collect(),
            apportionment_only: apportionment.difference(spending).cloned().collect(),
            spending_only: spending.difference(apportionment).cloned().collect(),
        }
    }

    pub fn total(&self) -> usize {
        self.matched.len() + self.apportionment_only.len() + self.spending_only.len()
    }

    pub fn class_of(&self, key: &K) -> Option<MatchClass> {
        if self.matched.contains(key) {
            Some(MatchClass::Matched)
        } else if self.apportionment_only.contains(key) {
            Some(MatchClass::ApportionmentOnly)
        } else if self.spending_only.contains(key) {
            Some(MatchClass::SpendingOnly)
        } else {
            None
        }
    }
}

// ============================================================================
// RATES
// ============================================================================

/// Obligations as a percentage of apportioned authority. A zero denominator
/// is reported as rate 0 with an explicit flag instead of a division error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObligationRate {
    pub rate: f64,
    pub zero_denominator: bool,
}

pub fn obligation_rate(obligations: f64, apportioned: f64) -> ObligationRate {
    if apportioned == 0.0 {
        ObligationRate {
            rate: 0.0,
            zero_denominator: true,
        }
    } else {
        ObligationRate {
            rate: obligations / apportioned * 100.0,
            zero_denominator: false,
        }
    }
}

// ============================================================================
// LOOKUPS
// ============================================================================

/// Coarse key to bureau, first-seen row wins (a coarse account always belongs
/// to one component, so later periods just repeat the same bureau).
pub fn component_lookup(rows: &[ApportionmentAggregate]) -> BTreeMap<AccountKey, String> {
    let mut map = BTreeMap::new();
    for row in rows {
        map.entry(row.key.coarse().clone())
            .or_insert_with(|| row.bureau.clone());
    }
    map
}

/// Coarse key to availability-type label, first-seen row wins.
pub fn availability_lookup(rows: &[ApportionmentAggregate]) -> BTreeMap<AccountKey, &'static str> {
    let mut map = BTreeMap::new();
    for row in rows {
        map.entry(row.key.coarse().clone())
            .or_insert(row.key.availability.type_label());
    }
    map
}

/// Fine key to apportionment rows. One fine key can carry several rows when
/// a multi-year account was re-filed across fiscal years.
pub fn apportionment_lookup(
    rows: &[ApportionmentAggregate],
) -> BTreeMap<TasKey, Vec<&ApportionmentAggregate>> {
    let mut map: BTreeMap<TasKey, Vec<&ApportionmentAggregate>> = BTreeMap::new();
    for row in rows {
        map.entry(row.key.clone()).or_default().push(row);
    }
    map
}

// ============================================================================
// LIFECYCLE JOIN
// ============================================================================

/// One joined row: an apportionment record with the lifetime spending
/// recorded against its fine key.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleRecord {
    pub tas: String,
    pub tas_full: String,
    pub agency: String,
    pub main_account: String,
    pub availability_period: String,
    pub availability_type: String,
    pub bureau: String,
    pub account_name: String,
    pub fund_type: String,
    pub budget_category: String,
    pub apportionment_fy: u16,
    pub apportionment_amount: f64,
    pub treasury_account_names: Vec<String>,
    pub reporting_years: Vec<u16>,
    pub budget_authority: f64,
    pub obligations: f64,
    pub outlays: f64,
    pub unobligated_balance: f64,
    pub obligation_rate: f64,
    pub zero_denominator: bool,
}

/// One classification record per fine key in the union: the tag, plus both
/// sides' values when matched so rates can be recomputed downstream.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedKey {
    pub key: String,
    pub class: MatchClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apportionment_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obligations: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlays: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obligation_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zero_denominator: Option<bool>,
}

/// Join output plus the classification of every fine key seen on either side.
#[derive(Debug)]
pub struct LifecycleJoin {
    pub records: Vec<LifecycleRecord>,
    pub classification: KeyClassification<TasKey>,
    pub classified_keys: Vec<ClassifiedKey>,
}

/// Two-pass join: lookups are fully built before any matching starts.
/// Matched keys produce one record per apportionment row; unmatched keys on
/// either side are preserved in the classification for reporting.
pub fn join_lifecycle(
    apportionment: &[ApportionmentAggregate],
    spending: &BTreeMap<TasKey, SpendingLifecycle>,
    fund_types: &FundTypeTable,
) -> LifecycleJoin {
    let app_lookup = apportionment_lookup(apportionment);

    let app_keys: BTreeSet<TasKey> = app_lookup.keys().cloned().collect();
    let spend_keys: BTreeSet<TasKey> = spending.keys().cloned().collect();
    let classification = KeyClassification::classify(&app_keys, &spend_keys);

    let mut records = Vec::new();

    for key in &classification.matched {
        let totals = &spending[key];
        for row in &app_lookup[key] {
            let fund_type = fund_types.lookup(key.coarse());
            let rate = obligation_rate(totals.obligations, row.amount);

            records.push(LifecycleRecord {
                tas: key.coarse().to_string(),
                tas_full: key.to_string(),
                agency: key.coarse().agency.clone(),
                main_account: key.coarse().main_account.clone(),
                availability_period: key.availability.period_label(),
                availability_type: key.availability.type_label().to_string(),
                bureau: row.bureau.clone(),
                account_name: row.account.clone(),
                fund_type: fund_type.name().to_string(),
                budget_category: fund_type.budget_category().name().to_string(),
                apportionment_fy: row.fiscal_year,
                apportionment_amount: row.amount,
                treasury_account_names: totals.treasury_account_names.iter().cloned().collect(),
                reporting_years: totals.reporting_years.iter().copied().collect(),
                budget_authority: totals.budget_authority,
                obligations: totals.obligations,
                outlays: totals.outlays,
                unobligated_balance: totals.unobligated_balance,
                obligation_rate: rate.rate,
                zero_denominator: rate.zero_denominator,
            });
        }
    }

    let mut classified_keys = Vec::with_capacity(classification.total());
    for key in app_keys.union(&spend_keys) {
        let class = classification.class_of(key).unwrap_or(MatchClass::Matched);
        let apportioned: Option<f64> = app_lookup
            .get(key)
            .map(|rows| rows.iter().map(|r| r.amount).sum());
        let totals = spending.get(key);

        let rate = match (class, apportioned, totals) {
            (MatchClass::Matched, Some(amount), Some(totals)) => {
                Some(obligation_rate(totals.obligations, amount))
            }
            _ => None,
        };

        classified_keys.push(ClassifiedKey {
            key: key.to_string(),
            class,
            apportionment_amount: apportioned,
            obligations: totals.map(|t| t.obligations),
            outlays: totals.map(|t| t.outlays),
            obligation_rate: rate.map(|r| r.rate),
            zero_denominator: rate.map(|r| r.zero_denominator),
        });
    }

    LifecycleJoin {
        records,
        classification,
        classified_keys,
    }
}

// ============================================================================
// FUND TYPE MERGE
// ============================================================================

/// Apportionment row enriched with FAST Book fund-type columns. Accounts the
/// reference table does not know get `Unknown` / `Other`, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct MergedApportionmentRow {
    pub tas: String,
    pub tas_full: String,
    pub availability_period: String,
    pub availability_type: String,
    pub bureau: String,
    pub account: String,
    pub fiscal_year: u16,
    pub amount: f64,
    pub amount_millions: f64,
    pub iteration: i64,
    pub approval_date: Option<String>,
    pub fund_type: String,
    pub budget_category: String,
}

pub fn merge_fund_types(
    rows: &[ApportionmentAggregate],
    fund_types: &FundTypeTable,
) -> Vec<MergedApportionmentRow> {
    rows.iter()
        .map(|row| {
            let fund_type = fund_types.lookup(row.key.coarse());
            merged_row(row, fund_type)
        })
        .collect()
}

fn merged_row(row: &ApportionmentAggregate, fund_type: FundType) -> MergedApportionmentRow {
    MergedApportionmentRow {
        tas: row.key.coarse().to_string(),
        tas_full: row.tas_full(),
        availability_period: row.key.availability.period_label(),
        availability_type: row.key.availability.type_label().to_string(),
        bureau: row.bureau.clone(),
        account: row.account.clone(),
        fiscal_year: row.fiscal_year,
        amount: row.amount,
        amount_millions: row.amount_millions(),
        iteration: row.iteration,
        approval_date: row.approval_date.map(|d| d.format("%Y-%m-%d").to_string()),
        fund_type: fund_type.name().to_string(),
        budget_category: fund_type.budget_category().name().to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fund_types::FundType;
    use crate::records::FundTypeEntry;

    fn key(s: &str) -> TasKey {
        TasKey::parse(s).unwrap()
    }

    fn key_set(keys: &[&str]) -> BTreeSet<TasKey> {
        keys.iter().map(|k| key(k)).collect()
    }

    fn app_row(fine_key: &str, amount: f64, fy: u16) -> ApportionmentAggregate {
        ApportionmentAggregate {
            key: key(fine_key),
            bureau: "U.S. Customs and Border Protection".to_string(),
            account: "Operations and Support".to_string(),
            fiscal_year: fy,
            amount,
            approval_date: None,
            iteration: 1,
        }
    }

    fn lifecycle(obligations: f64, outlays: f64) -> SpendingLifecycle {
        SpendingLifecycle {
            budget_authority: 0.0,
            obligations,
            outlays,
            unobligated_balance: 0.0,
            treasury_account_names: BTreeSet::new(),
            reporting_years: BTreeSet::new(),
        }
    }

    #[test]
    fn test_classification_complete_and_disjoint() {
        let left = key_set(&["070-0530-2023/2023", "070-0112-2024/2024"]);
        let right = key_set(&["070-0530-2023/2023", "070-0544-X"]);

        let c = KeyClassification::classify(&left, &right);

        assert_eq!(c.matched, key_set(&["070-0530-2023/2023"]));
        assert_eq!(c.apportionment_only, key_set(&["070-0112-2024/2024"]));
        assert_eq!(c.spending_only, key_set(&["070-0544-X"]));

        // completeness: union of buckets == union of inputs
        let mut buckets: BTreeSet<TasKey> = BTreeSet::new();
        buckets.extend(c.matched.iter().cloned());
        buckets.extend(c.apportionment_only.iter().cloned());
        buckets.extend(c.spending_only.iter().cloned());
        let union: BTreeSet<TasKey> = left.union(&right).cloned().collect();
        assert_eq!(buckets, union);

        // disjointness
        assert!(c.matched.is_disjoint(&c.apportionment_only));
        assert!(c.matched.is_disjoint(&c.spending_only));
        assert!(c.apportionment_only.is_disjoint(&c.spending_only));
        assert_eq!(c.total(), union.len());
    }

    #[test]
    fn test_classification_empty_sets() {
        let empty: BTreeSet<TasKey> = BTreeSet::new();
        let c = KeyClassification::classify(&empty, &empty);
        assert_eq!(c.total(), 0);

        let left = key_set(&["070-0530-2023/2023"]);
        let c = KeyClassification::classify(&left, &empty);
        assert_eq!(c.apportionment_only.len(), 1);
        assert_eq!(c.matched.len(), 0);
        assert_eq!(c.spending_only.len(), 0);
    }

    #[test]
    fn test_obligation_rate_zero_denominator() {
        let rate = obligation_rate(1000.0, 0.0);
        assert_eq!(rate.rate, 0.0);
        assert!(rate.zero_denominator);

        let rate = obligation_rate(500.0, 2000.0);
        assert_eq!(rate.rate, 25.0);
        assert!(!rate.zero_denominator);
    }

    #[test]
    fn test_lifecycle_join_scenario() {
        // apportionment 070-0530 2023/2023 at $5,000,000; spending shows
        // $3,200,000 obligated, $2,800,000 outlaid against the same fine key
        let apportionment = vec![app_row("070-0530-2023/2023", 5_000_000.0, 2023)];
        let mut spending = BTreeMap::new();
        spending.insert(
            key("070-0530-2023/2023"),
            lifecycle(3_200_000.0, 2_800_000.0),
        );
        let fund_types = FundTypeTable::from_entries(&[FundTypeEntry {
            account: AccountKey::parse("070-0530").unwrap(),
            raw_tas: "070X0530".to_string(),
            fund_type: FundType::GeneralFund,
        }]);

        let join = join_lifecycle(&apportionment, &spending, &fund_types);

        assert_eq!(join.classification.matched.len(), 1);
        assert_eq!(join.records.len(), 1);
        let rec = &join.records[0];
        assert_eq!(rec.tas_full, "070-0530-2023/2023");
        assert!((rec.obligation_rate - 64.0).abs() < 1e-9);
        assert!(!rec.zero_denominator);
        assert_eq!(rec.fund_type, "General Fund");
        assert_eq!(rec.budget_category, "Discretionary");

        // the union classification carries both sides' values
        assert_eq!(join.classified_keys.len(), 1);
        let ck = &join.classified_keys[0];
        assert_eq!(ck.class, MatchClass::Matched);
        assert_eq!(ck.apportionment_amount, Some(5_000_000.0));
        assert_eq!(ck.obligations, Some(3_200_000.0));
        assert!((ck.obligation_rate.unwrap() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_lifecycle_join_keeps_unmatched_sides() {
        let apportionment = vec![app_row("070-0112-2024/2024", 1_000.0, 2024)];
        let mut spending = BTreeMap::new();
        spending.insert(key("070-0544-X"), lifecycle(10.0, 5.0));

        let join = join_lifecycle(&apportionment, &spending, &FundTypeTable::default());

        assert!(join.records.is_empty());
        assert_eq!(join.classification.apportionment_only.len(), 1);
        // spending-only is the data-quality signal and must survive
        assert_eq!(
            join.classification.spending_only,
            key_set(&["070-0544-X"])
        );

        // one classification record per key in the union, rates only on match
        assert_eq!(join.classified_keys.len(), 2);
        for ck in &join.classified_keys {
            assert_ne!(ck.class, MatchClass::Matched);
            assert_eq!(ck.obligation_rate, None);
        }
        let spend_only = join
            .classified_keys
            .iter()
            .find(|ck| ck.class == MatchClass::SpendingOnly)
            .unwrap();
        assert_eq!(spend_only.key, "070-0544-X");
        assert_eq!(spend_only.obligations, Some(10.0));
        assert_eq!(spend_only.apportionment_amount, None);
    }

    #[test]
    fn test_one_record_per_apportionment_row() {
        // the same multi-year key filed in two fiscal years joins twice
        let apportionment = vec![
            app_row("070-0530-2023/2025", 2_000.0, 2023),
            app_row("070-0530-2023/2025", 3_000.0, 2024),
        ];
        let mut spending = BTreeMap::new();
        spending.insert(key("070-0530-2023/2025"), lifecycle(1_200.0, 0.0));

        let join = join_lifecycle(&apportionment, &spending, &FundTypeTable::default());
        assert_eq!(join.records.len(), 2);
        assert!((join.records[0].obligation_rate - 60.0).abs() < 1e-9);
        assert!((join.records[1].obligation_rate - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_fund_types_unknown_account() {
        let rows = vec![app_row("070-9999-2023/2023", 10.0, 2023)];
        let merged = merge_fund_types(&rows, &FundTypeTable::default());
        assert_eq!(merged[0].fund_type, "Unknown");
        assert_eq!(merged[0].budget_category, "Other");
    }

    #[test]
    fn test_component_lookup_first_seen_wins() {
        let mut rows = vec![
            app_row("070-0530-2023/2023", 1.0, 2023),
            app_row("070-0530-2024/2024", 2.0, 2024),
        ];
        rows[1].bureau = "Renamed Bureau".to_string();

        let lookup = component_lookup(&rows);
        assert_eq!(
            lookup[&AccountKey::parse("070-0530").unwrap()],
            "U.S. Customs and Border Protection"
        );
    }
}
