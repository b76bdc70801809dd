// Fund types - Treasury FAST Book reference data
// Maps coarse account keys to fund types and derives the budget enforcement
// category from a fixed policy table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::records::FundTypeEntry;
use crate::tas::AccountKey;

// ============================================================================
// FUND TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundType {
    GeneralFund,
    TrustFund,
    SpecialFund,
    RevolvingFund,
    DepositFund,
    Unknown,
}

impl FundType {
    /// Parse the FAST Book's free-text fund-type column. The source data is
    /// messy: stray tabs, singular/plural variation, trailing whitespace.
    pub fn from_label(label: &str) -> FundType {
        let cleaned = label.trim().to_lowercase();
        if cleaned.starts_with("general fund") {
            FundType::GeneralFund
        } else if cleaned.starts_with("trust fund") {
            FundType::TrustFund
        } else if cleaned.starts_with("special fund") {
            FundType::SpecialFund
        } else if cleaned.starts_with("revolving fund") {
            FundType::RevolvingFund
        } else if cleaned.starts_with("deposit fund") {
            FundType::DepositFund
        } else {
            FundType::Unknown
        }
    }

    /// Display name used in output tables.
    pub fn name(&self) -> &'static str {
        match self {
            FundType::GeneralFund => "General Fund",
            FundType::TrustFund => "Trust Fund",
            FundType::SpecialFund => "Special Fund",
            FundType::RevolvingFund => "Revolving Fund",
            FundType::DepositFund => "Deposit Fund",
            FundType::Unknown => "Unknown",
        }
    }

    /// Budget enforcement category policy:
    /// general funds are discretionary; trust, special, and revolving funds
    /// are mandatory; everything else (deposit, unknown) is "Other".
    pub fn budget_category(&self) -> BudgetCategory {
        match self {
            FundType::GeneralFund => BudgetCategory::Discretionary,
            FundType::TrustFund | FundType::SpecialFund | FundType::RevolvingFund => {
                BudgetCategory::Mandatory
            }
            FundType::DepositFund | FundType::Unknown => BudgetCategory::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BudgetCategory {
    Discretionary,
    Mandatory,
    Other,
}

impl BudgetCategory {
    pub fn name(&self) -> &'static str {
        match self {
            BudgetCategory::Discretionary => "Discretionary",
            BudgetCategory::Mandatory => "Mandatory",
            BudgetCategory::Other => "Other",
        }
    }
}

// ============================================================================
// FUND TYPE TABLE
// ============================================================================

/// Lookup from coarse account key to fund type. Lookups never fail: an
/// account the FAST Book does not know is simply `Unknown`.
#[derive(Debug, Default)]
pub struct FundTypeTable {
    map: HashMap<AccountKey, FundType>,
}

impl FundTypeTable {
    pub fn from_entries(entries: &[FundTypeEntry]) -> FundTypeTable {
        let mut map = HashMap::new();
        for entry in entries {
            // later FAST Book rows override earlier ones for the same account
            map.insert(entry.account.clone(), entry.fund_type);
        }
        FundTypeTable { map }
    }

    pub fn lookup(&self, account: &AccountKey) -> FundType {
        self.map.get(account).copied().unwrap_or(FundType::Unknown)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn account(s: &str) -> AccountKey {
        AccountKey::parse(s).unwrap()
    }

    #[test]
    fn test_from_label_handles_messy_source_text() {
        assert_eq!(FundType::from_label("General Fund"), FundType::GeneralFund);
        assert_eq!(FundType::from_label("General Funds"), FundType::GeneralFund);
        assert_eq!(FundType::from_label("\tGeneral Fund"), FundType::GeneralFund);
        assert_eq!(FundType::from_label("Trust Funds "), FundType::TrustFund);
        assert_eq!(FundType::from_label("Revolving Fund"), FundType::RevolvingFund);
        assert_eq!(FundType::from_label("Deposit Funds"), FundType::DepositFund);
        assert_eq!(FundType::from_label("Clearing Account"), FundType::Unknown);
        assert_eq!(FundType::from_label(""), FundType::Unknown);
    }

    #[test]
    fn test_budget_category_policy() {
        assert_eq!(
            FundType::GeneralFund.budget_category(),
            BudgetCategory::Discretionary
        );
        assert_eq!(FundType::TrustFund.budget_category(), BudgetCategory::Mandatory);
        assert_eq!(FundType::SpecialFund.budget_category(), BudgetCategory::Mandatory);
        assert_eq!(
            FundType::RevolvingFund.budget_category(),
            BudgetCategory::Mandatory
        );
        assert_eq!(FundType::DepositFund.budget_category(), BudgetCategory::Other);
        assert_eq!(FundType::Unknown.budget_category(), BudgetCategory::Other);
    }

    #[test]
    fn test_table_lookup_never_fails() {
        let entries = vec![
            FundTypeEntry {
                account: account("070-0530"),
                raw_tas: "070X0530".to_string(),
                fund_type: FundType::GeneralFund,
            },
            FundTypeEntry {
                account: account("070-8244"),
                raw_tas: "070X8244".to_string(),
                fund_type: FundType::TrustFund,
            },
        ];
        let table = FundTypeTable::from_entries(&entries);

        assert_eq!(table.len(), 2);
        // present key: never Unknown
        assert_eq!(table.lookup(&account("070-0530")), FundType::GeneralFund);
        // absent key: exactly Unknown, category Other, no error
        let missing = table.lookup(&account("070-9999"));
        assert_eq!(missing, FundType::Unknown);
        assert_eq!(missing.budget_category(), BudgetCategory::Other);
    }
}
