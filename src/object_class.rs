// Object class categories - where the money goes
// Maps OMB object-class codes to eight fixed spending categories and rolls
// PA-OC breakdown rows up into per-account spending profiles.

use std::collections::{BTreeMap, BTreeSet};

use crate::components;
use crate::records::ObjectClassLine;
use crate::tas::AccountKey;

// ============================================================================
// CATEGORIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpendingCategory {
    PersonnelCompensation,
    PersonnelBenefits,
    TravelTransportation,
    RentUtilities,
    OtherServices,
    SuppliesEquipment,
    GrantsFixedCharges,
    Other,
    /// Row carried no object-class code at all
    Unknown,
}

impl SpendingCategory {
    pub fn name(&self) -> &'static str {
        match self {
            SpendingCategory::PersonnelCompensation => "Personnel Compensation",
            SpendingCategory::PersonnelBenefits => "Personnel Benefits",
            SpendingCategory::TravelTransportation => "Travel & Transportation",
            SpendingCategory::RentUtilities => "Rent & Utilities",
            SpendingCategory::OtherServices => "Other Services",
            SpendingCategory::SuppliesEquipment => "Supplies & Equipment",
            SpendingCategory::GrantsFixedCharges => "Grants & Fixed Charges",
            SpendingCategory::Other => "Other",
            SpendingCategory::Unknown => "Unknown",
        }
    }

    /// Snake-case column name in the object-class summary CSV.
    pub fn column(&self) -> &'static str {
        match self {
            SpendingCategory::PersonnelCompensation => "personnel_compensation",
            SpendingCategory::PersonnelBenefits => "personnel_benefits",
            SpendingCategory::TravelTransportation => "travel_transportation",
            SpendingCategory::RentUtilities => "rent_utilities",
            SpendingCategory::OtherServices => "other_services",
            SpendingCategory::SuppliesEquipment => "supplies_equipment",
            SpendingCategory::GrantsFixedCharges => "grants_fixed_charges",
            SpendingCategory::Other => "other",
            SpendingCategory::Unknown => "unknown",
        }
    }
}

/// Exact-code table. Codes not listed fall through to the numeric-prefix
/// rules below, then to `Other`.
const EXACT_CODES: &[(&str, SpendingCategory)] = &[
    ("11.1", SpendingCategory::PersonnelCompensation),
    ("11.3", SpendingCategory::PersonnelCompensation),
    ("11.5", SpendingCategory::PersonnelCompensation),
    ("11.7", SpendingCategory::PersonnelCompensation),
    ("11.8", SpendingCategory::PersonnelCompensation),
    ("11.9", SpendingCategory::PersonnelCompensation),
    ("12.1", SpendingCategory::PersonnelBenefits),
    ("12.2", SpendingCategory::PersonnelBenefits),
    ("13.0", SpendingCategory::PersonnelBenefits),
    ("21.0", SpendingCategory::TravelTransportation),
    ("22.0", SpendingCategory::TravelTransportation),
    ("23.1", SpendingCategory::RentUtilities),
    ("23.2", SpendingCategory::RentUtilities),
    ("23.3", SpendingCategory::RentUtilities),
    ("24.0", SpendingCategory::OtherServices),
    ("25.1", SpendingCategory::OtherServices),
    ("25.2", SpendingCategory::OtherServices),
    ("25.3", SpendingCategory::OtherServices),
    ("25.4", SpendingCategory::OtherServices),
    ("25.5", SpendingCategory::OtherServices),
    ("25.6", SpendingCategory::OtherServices),
    ("25.7", SpendingCategory::OtherServices),
    ("25.8", SpendingCategory::OtherServices),
    ("26.0", SpendingCategory::SuppliesEquipment),
    ("31.0", SpendingCategory::SuppliesEquipment),
    ("41.0", SpendingCategory::GrantsFixedCharges),
    ("42.0", SpendingCategory::GrantsFixedCharges),
    ("43.0", SpendingCategory::GrantsFixedCharges),
    ("44.0", SpendingCategory::GrantsFixedCharges),
    ("32.0", SpendingCategory::Other),
    ("33.0", SpendingCategory::Other),
    ("91.0", SpendingCategory::Other),
    ("92.0", SpendingCategory::Other),
    ("93.0", SpendingCategory::Other),
    ("94.0", SpendingCategory::Other),
];

/// Prefix fallback for codes the exact table misses (e.g. a new "25.9").
const PREFIX_RULES: &[(&str, SpendingCategory)] = &[
    ("11.", SpendingCategory::PersonnelCompensation),
    ("12.", SpendingCategory::PersonnelBenefits),
    ("13.", SpendingCategory::PersonnelBenefits),
    ("21.", SpendingCategory::TravelTransportation),
    ("22.", SpendingCategory::TravelTransportation),
    ("23.", SpendingCategory::RentUtilities),
    ("25.", SpendingCategory::OtherServices),
    ("26.", SpendingCategory::SuppliesEquipment),
    ("31.", SpendingCategory::SuppliesEquipment),
    ("41.", SpendingCategory::GrantsFixedCharges),
    ("42.", SpendingCategory::GrantsFixedCharges),
    ("43.", SpendingCategory::GrantsFixedCharges),
    ("44.", SpendingCategory::GrantsFixedCharges),
];

/// Categorize an object-class code. Missing codes are `Unknown`; codes the
/// tables do not know are `Other`. Never fails.
pub fn categorize(code: Option<&str>) -> SpendingCategory {
    let code = match code {
        Some(c) if !c.trim().is_empty() => c.trim(),
        _ => return SpendingCategory::Unknown,
    };

    if let Some((_, cat)) = EXACT_CODES.iter().find(|(c, _)| *c == code) {
        return *cat;
    }
    if let Some((_, cat)) = PREFIX_RULES.iter().find(|(p, _)| code.starts_with(p)) {
        return *cat;
    }
    SpendingCategory::Other
}

// ============================================================================
// BREAKDOWN AGGREGATION
// ============================================================================

/// Spending profile of one account in one fiscal year: obligations per
/// category, per detailed code, and per program activity.
#[derive(Debug, Clone)]
pub struct ObjectClassBreakdown {
    pub account: AccountKey,
    pub fiscal_year: Option<u16>,
    pub component: String,
    pub category_obligations: BTreeMap<SpendingCategory, f64>,
    pub detail_obligations: BTreeMap<String, f64>,
    pub program_activity_obligations: BTreeMap<String, f64>,
    pub total_obligations: f64,
    pub total_outlays: f64,
}

impl ObjectClassBreakdown {
    pub fn category_amount(&self, category: SpendingCategory) -> f64 {
        self.category_obligations.get(&category).copied().unwrap_or(0.0)
    }

    /// Category shares of total obligations, in percent. Empty when the
    /// account has no obligations (avoids zero-denominator rates).
    pub fn category_percentages(&self) -> BTreeMap<SpendingCategory, f64> {
        if self.total_obligations <= 0.0 {
            return BTreeMap::new();
        }
        self.category_obligations
            .iter()
            .map(|(cat, amount)| (*cat, amount / self.total_obligations * 100.0))
            .collect()
    }

    /// Share of obligations going to salaries and benefits, in percent.
    pub fn personnel_percentage(&self) -> f64 {
        if self.total_obligations <= 0.0 {
            return 0.0;
        }
        let personnel = self.category_amount(SpendingCategory::PersonnelCompensation)
            + self.category_amount(SpendingCategory::PersonnelBenefits);
        personnel / self.total_obligations * 100.0
    }
}

/// Roll PA-OC rows up by (account, fiscal year). The component label comes
/// from keyword-matching the treasury account names seen in the group.
pub fn aggregate_object_classes(lines: &[ObjectClassLine]) -> Vec<ObjectClassBreakdown> {
    struct Group {
        names: BTreeSet<String>,
        categories: BTreeMap<SpendingCategory, f64>,
        details: BTreeMap<String, f64>,
        program_activities: BTreeMap<String, f64>,
        obligations: f64,
        outlays: f64,
    }

    let mut groups: BTreeMap<(AccountKey, Option<u16>), Group> = BTreeMap::new();

    for line in lines {
        let group_key = (line.key.coarse().clone(), line.fiscal_year);
        let group = groups.entry(group_key).or_insert_with(|| Group {
            names: BTreeSet::new(),
            categories: BTreeMap::new(),
            details: BTreeMap::new(),
            program_activities: BTreeMap::new(),
            obligations: 0.0,
            outlays: 0.0,
        });

        let category = categorize(line.object_class_code.as_deref());
        *group.categories.entry(category).or_insert(0.0) += line.obligations;

        let detail = format!(
            "{} - {}",
            line.object_class_code.as_deref().unwrap_or("?"),
            line.object_class_name
        );
        *group.details.entry(detail).or_insert(0.0) += line.obligations;
        *group
            .program_activities
            .entry(line.program_activity.clone())
            .or_insert(0.0) += line.obligations;

        group.obligations += line.obligations;
        group.outlays += line.outlays;
        if !line.treasury_account_name.trim().is_empty() {
            group.names.insert(line.treasury_account_name.clone());
        }
    }

    groups
        .into_iter()
        .map(|((account, fiscal_year), group)| ObjectClassBreakdown {
            account,
            fiscal_year,
            component: components::component_from_names(
                group.names.iter().map(String::as_str),
            ),
            category_obligations: group.categories,
            detail_obligations: group.details,
            program_activity_obligations: group.program_activities,
            total_obligations: group.obligations,
            total_outlays: group.outlays,
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

    fn line(code: Option<&str>, obligations: f64) -> ObjectClassLine {
        ObjectClassLine {
            key: TasKey::parse("070-0530-2023/2023").unwrap(),
            treasury_account_name: "Operations and Support, U.S. Customs and Border Protection"
                .to_string(),
            program_activity: "Border Security Operations".to_string(),
            object_class_code: code.map(String::from),
            object_class_name: "test".to_string(),
            obligations,
            outlays: 0.0,
            fiscal_year: Some(2023),
        }
    }

    #[test]
    fn test_exact_code_lookup() {
        assert_eq!(categorize(Some("11.1")), SpendingCategory::PersonnelCompensation);
        assert_eq!(categorize(Some("12.1")), SpendingCategory::PersonnelBenefits);
        assert_eq!(categorize(Some("23.2")), SpendingCategory::RentUtilities);
        assert_eq!(categorize(Some("41.0")), SpendingCategory::GrantsFixedCharges);
        assert_eq!(categorize(Some("91.0")), SpendingCategory::Other);
    }

    #[test]
    fn test_prefix_fallback() {
        // not in the exact table, caught by the "25." prefix rule
        assert_eq!(categorize(Some("25.9")), SpendingCategory::OtherServices);
        assert_eq!(categorize(Some("11.2")), SpendingCategory::PersonnelCompensation);
        // no exact entry, no prefix rule
        assert_eq!(categorize(Some("99.0")), SpendingCategory::Other);
    }

    #[test]
    fn test_missing_code_is_unknown() {
        assert_eq!(categorize(None), SpendingCategory::Unknown);
        assert_eq!(categorize(Some("")), SpendingCategory::Unknown);
        assert_eq!(categorize(Some("  ")), SpendingCategory::Unknown);
    }

    #[test]
    fn test_breakdown_aggregation() {
        let lines = vec![
            line(Some("11.1"), 600.0),
            line(Some("12.1"), 200.0),
            line(Some("25.2"), 200.0),
        ];
        let breakdowns = aggregate_object_classes(&lines);
        assert_eq!(breakdowns.len(), 1);

        let b = &breakdowns[0];
        assert_eq!(b.account.to_string(), "070-0530");
        assert_eq!(b.component, "Customs and Border Protection");
        assert_eq!(b.total_obligations, 1000.0);
        assert_eq!(b.category_amount(SpendingCategory::PersonnelCompensation), 600.0);
        assert_eq!(b.category_amount(SpendingCategory::OtherServices), 200.0);
        assert!((b.personnel_percentage() - 80.0).abs() < 1e-9);

        let pct = b.category_percentages();
        assert!((pct[&SpendingCategory::OtherServices] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_zero_obligations() {
        let breakdowns = aggregate_object_classes(&[line(Some("11.1"), 0.0)]);
        let b = &breakdowns[0];
        assert_eq!(b.personnel_percentage(), 0.0);
        assert!(b.category_percentages().is_empty());
    }
}
