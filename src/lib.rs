// DHS Budget Reconciliation Pipeline - Core Library
// Exposes all pipeline stages for use in the CLI and tests

pub mod aggregate;
pub mod components;
pub mod config;
pub mod fund_types;
pub mod ingest;
pub mod join;
pub mod object_class;
pub mod output;
pub mod records;
pub mod report;
pub mod tas;

// Re-export commonly used types
pub use aggregate::{
    aggregate_apportionment, aggregate_by_appropriation_year, aggregate_spending_lifecycle,
    ApportionmentAggregate, AppropriationYearTotals, SpendingLifecycle,
};
pub use components::{
    abbreviation_for, bureaus_match, classify_component, component_from_names, component_name,
    ComponentDef, COMPONENTS, UNKNOWN_COMPONENT,
};
pub use config::PipelineConfig;
pub use fund_types::{BudgetCategory, FundType, FundTypeTable};
pub use join::{
    join_lifecycle, merge_fund_types, obligation_rate, ClassifiedKey, KeyClassification,
    LifecycleJoin, LifecycleRecord, MatchClass, MergedApportionmentRow, ObligationRate,
};
pub use object_class::{
    aggregate_object_classes, categorize, ObjectClassBreakdown, SpendingCategory,
};
pub use records::{
    ApportionmentLine, FundTypeEntry, ObjectClassLine, SpendingRecord, SpendingSnapshot,
};
pub use report::{ComponentCoverage, ReconciliationReport, RunTally, TasValidationReport};
pub use tas::{AccountKey, Availability, ParsedTas, TasKey};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
