// Component classification - Aliases as data
// Maps messy source strings (treasury account names, OpenOMB bureau titles)
// to canonical DHS component names via a single static keyword table.

/// Canonical label for anything the table cannot place.
pub const UNKNOWN_COMPONENT: &str = "Unknown";

/// One DHS component with its treemap abbreviation and match keywords.
///
/// `name_keywords` match as case-insensitive substrings; `code_keywords`
/// (abbreviations) match only as standalone uppercase tokens, so "ICE" hits
/// "Salaries and Expenses, ICE" but not the "ice" inside "Service".
#[derive(Debug, Clone, Copy)]
pub struct ComponentDef {
    pub canonical: &'static str,
    pub abbreviation: &'static str,
    pub name_keywords: &'static [&'static str],
    pub code_keywords: &'static [&'static str],
}

/// The single source of truth for component matching. Table order is the
/// match priority: the first entry whose keywords hit wins, deterministically.
pub const COMPONENTS: &[ComponentDef] = &[
    ComponentDef {
        canonical: "Customs and Border Protection",
        abbreviation: "CBP",
        name_keywords: &["customs and border protection"],
        code_keywords: &["CBP"],
    },
    ComponentDef {
        canonical: "Immigration and Customs Enforcement",
        abbreviation: "ICE",
        name_keywords: &["immigration and customs enforcement"],
        code_keywords: &["ICE"],
    },
    ComponentDef {
        canonical: "Transportation Security Administration",
        abbreviation: "TSA",
        name_keywords: &["transportation security administration"],
        code_keywords: &["TSA"],
    },
    ComponentDef {
        canonical: "Coast Guard",
        abbreviation: "USCG",
        name_keywords: &["coast guard"],
        code_keywords: &["USCG"],
    },
    ComponentDef {
        canonical: "Federal Emergency Management Agency",
        abbreviation: "FEMA",
        name_keywords: &["federal emergency management agency"],
        code_keywords: &["FEMA"],
    },
    ComponentDef {
        canonical: "Cybersecurity and Infrastructure Security Agency",
        abbreviation: "CISA",
        name_keywords: &["cybersecurity"],
        code_keywords: &["CISA"],
    },
    ComponentDef {
        canonical: "Secret Service",
        abbreviation: "USSS",
        name_keywords: &["secret service"],
        code_keywords: &["USSS"],
    },
    ComponentDef {
        canonical: "Citizenship and Immigration Services",
        abbreviation: "USCIS",
        name_keywords: &["citizenship and immigration"],
        code_keywords: &["USCIS"],
    },
    ComponentDef {
        canonical: "Science and Technology",
        abbreviation: "S&T",
        name_keywords: &["science and technology"],
        code_keywords: &["S&T"],
    },
    ComponentDef {
        canonical: "Analysis and Operations",
        abbreviation: "A&O",
        name_keywords: &["analysis and operations", "operations coordination"],
        code_keywords: &["I&A", "A&O"],
    },
    ComponentDef {
        canonical: "Federal Law Enforcement Training Centers",
        abbreviation: "FLETC",
        name_keywords: &["federal law enforcement training"],
        code_keywords: &["FLETC"],
    },
    ComponentDef {
        canonical: "Countering Weapons of Mass Destruction",
        abbreviation: "CWMD",
        name_keywords: &["countering weapons of mass destruction"],
        code_keywords: &["CWMD"],
    },
    ComponentDef {
        canonical: "Management Directorate",
        abbreviation: "MGMT",
        name_keywords: &["management directorate"],
        code_keywords: &[],
    },
    ComponentDef {
        canonical: "Office of Inspector General",
        abbreviation: "OIG",
        name_keywords: &["inspector general"],
        code_keywords: &["OIG"],
    },
    ComponentDef {
        canonical: "Office of the Secretary and Executive Management",
        abbreviation: "OSEM",
        name_keywords: &["office of the secretary"],
        code_keywords: &["OSEM"],
    },
];

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Classify a free-text source string into a component, or None.
pub fn classify_component(text: &str) -> Option<&'static ComponentDef> {
    if text.trim().is_empty() {
        return None;
    }
    let lower = text.to_lowercase();

    COMPONENTS.iter().find(|def| {
        def.name_keywords.iter().any(|kw| lower.contains(kw))
            || def.code_keywords.iter().any(|code| has_token(text, code))
    })
}

/// Canonical component name for a text, `"Unknown"` when nothing matches.
pub fn component_name(text: &str) -> String {
    classify_component(text)
        .map(|def| def.canonical.to_string())
        .unwrap_or_else(|| UNKNOWN_COMPONENT.to_string())
}

/// Classify from a set of treasury account names. Keyword matches are tried
/// across every name first; failing that, the comma-separated account-name
/// convention ("Operations and Support, Coast Guard, Homeland Security")
/// yields its second-to-last segment as a best-effort component label.
pub fn component_from_names<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    for name in names.clone() {
        if let Some(def) = classify_component(name) {
            return def.canonical.to_string();
        }
    }

    for name in names {
        let parts: Vec<&str> = name.split(',').collect();
        if parts.len() > 1 {
            let segment = parts[parts.len() - 2].trim();
            if !segment.is_empty() {
                return segment.to_string();
            }
        }
    }

    UNKNOWN_COMPONENT.to_string()
}

/// Treemap abbreviation for a bureau/component label, empty when unknown.
pub fn abbreviation_for(bureau: &str) -> &'static str {
    classify_component(bureau)
        .map(|def| def.abbreviation)
        .unwrap_or("")
}

/// Fuzzy bidirectional bureau-name match used when comparing per-component
/// totals across sources: strip the "U.S. " prefix from both sides, lowercase,
/// and accept if either normalized name contains the other. Deliberately
/// permissive - abbreviated and full forms of the same bureau should agree.
pub fn bureaus_match(a: &str, b: &str) -> bool {
    let a = normalize_bureau(a);
    let b = normalize_bureau(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

fn normalize_bureau(name: &str) -> String {
    name.trim().trim_start_matches("U.S. ").to_lowercase()
}

/// Token-wise search for an abbreviation code. Tokens keep '&' so "S&T"
/// survives splitting.
fn has_token(text: &str, code: &str) -> bool {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '&'))
        .any(|token| token == code)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_keywords() {
        assert_eq!(
            component_name("U.S. Customs and Border Protection, Operations and Support"),
            "Customs and Border Protection"
        );
        assert_eq!(
            component_name("Federal Emergency Management Agency, Disaster Relief Fund"),
            "Federal Emergency Management Agency"
        );
    }

    #[test]
    fn test_abbreviation_matches_as_token_only() {
        assert_eq!(
            component_name("Salaries and Expenses, ICE, Homeland Security"),
            "Immigration and Customs Enforcement"
        );
        // "Service" contains the letters i-c-e but is not the ICE token
        assert_eq!(component_name("Selective Service System"), UNKNOWN_COMPONENT);
        assert_eq!(
            component_name("United States Secret Service, Operations and Support"),
            "Secret Service"
        );
    }

    #[test]
    fn test_priority_is_table_order() {
        // Both the CBP name and the ICE code appear; CBP sits first in the
        // table so it wins every run.
        let text = "Customs and Border Protection support to ICE";
        assert_eq!(component_name(text), "Customs and Border Protection");
    }

    #[test]
    fn test_unknown_and_empty() {
        assert_eq!(component_name("Department of Agriculture"), UNKNOWN_COMPONENT);
        assert_eq!(component_name(""), UNKNOWN_COMPONENT);
        assert_eq!(abbreviation_for("Department of Agriculture"), "");
    }

    #[test]
    fn test_component_from_names_comma_fallback() {
        let names = ["Operations and Support, Federal Protective Service, Homeland Security"];
        assert_eq!(component_from_names(names), "Federal Protective Service");

        let names = ["No separators here"];
        assert_eq!(component_from_names(names), UNKNOWN_COMPONENT);

        // keyword match beats the comma fallback even when it appears later
        let names = [
            "Procurement, Construction, and Improvements",
            "United States Coast Guard, Operating Expenses",
        ];
        assert_eq!(component_from_names(names), "Coast Guard");
    }

    #[test]
    fn test_bureaus_match_bidirectional() {
        assert!(bureaus_match(
            "U.S. Customs and Border Protection",
            "Customs and Border Protection"
        ));
        assert!(bureaus_match(
            "Coast Guard",
            "United States Coast Guard"
        ));
        assert!(!bureaus_match(
            "Transportation Security Administration",
            "Secret Service"
        ));
        assert!(!bureaus_match("", "Coast Guard"));
    }

    #[test]
    fn test_abbreviations() {
        assert_eq!(abbreviation_for("U.S. Customs and Border Protection"), "CBP");
        assert_eq!(abbreviation_for("United States Coast Guard"), "USCG");
        assert_eq!(
            abbreviation_for("Cybersecurity and Infrastructure Security Agency"),
            "CISA"
        );
        assert_eq!(abbreviation_for("Science and Technology"), "S&T");
    }
}
