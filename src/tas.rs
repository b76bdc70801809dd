// TAS Normalizer - Treasury Account Symbol parsing
// Converts the three source-specific TAS encodings (OpenOMB schedule fields,
// USAspending account-balance strings, FAST Book reference strings) into one
// canonical key model.
//
// Contract: normalization never fails loudly. Malformed input produces None
// and the caller counts it in the run tally.

use std::fmt;

// ============================================================================
// AVAILABILITY PERIOD
// ============================================================================

/// The fiscal-year span during which appropriated funds may be obligated.
///
/// Invariant: `MultiYear(begin, end)` always has `begin < end`. The degenerate
/// `begin == end` case is represented as `Annual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Availability {
    /// Single fiscal year appropriation
    Annual(u16),
    /// Funds available across a range of fiscal years
    MultiYear(u16, u16),
    /// No-year money, coded "X" - available until expended
    NoYear,
}

impl Availability {
    /// Build from optional begin/end period-of-availability years.
    ///
    /// `begin == end` collapses to `Annual`; a missing end year is treated as
    /// annual availability of the begin year. Returns None when no begin year
    /// exists (caller decides whether a filing-year fallback applies).
    pub fn from_years(begin: Option<u16>, end: Option<u16>) -> Option<Availability> {
        let begin = begin?;
        match end {
            Some(end) if end > begin => Some(Availability::MultiYear(begin, end)),
            Some(end) if end < begin => None, // inverted range - unparseable
            _ => Some(Availability::Annual(begin)),
        }
    }

    /// The `annual` / `multi-year` / `no-year` label used in output tables.
    pub fn type_label(&self) -> &'static str {
        match self {
            Availability::Annual(_) => "annual",
            Availability::MultiYear(_, _) => "multi-year",
            Availability::NoYear => "no-year",
        }
    }

    /// Canonical period string: `2023/2023`, `2023/2025`, or `X`.
    pub fn period_label(&self) -> String {
        match self {
            Availability::Annual(y) => format!("{}/{}", y, y),
            Availability::MultiYear(b, e) => format!("{}/{}", b, e),
            Availability::NoYear => "X".to_string(),
        }
    }

    /// First year funds become available, if year-limited.
    pub fn begin_year(&self) -> Option<u16> {
        match self {
            Availability::Annual(y) => Some(*y),
            Availability::MultiYear(b, _) => Some(*b),
            Availability::NoYear => None,
        }
    }

    /// Parse a canonical period string back into an availability.
    ///
    /// Accepts `X`, `begin/end`, and a bare year (legacy annual rows).
    pub fn parse(s: &str) -> Option<Availability> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("x") {
            return Some(Availability::NoYear);
        }
        if let Some((begin, end)) = s.split_once('/') {
            return Availability::from_years(parse_year(begin), parse_year(end));
        }
        parse_year(s).map(Availability::Annual)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.period_label())
    }
}

// ============================================================================
// ACCOUNT KEYS
// ============================================================================

/// Coarse account key: agency + main account, ignoring availability and
/// sub-account. Two TAS values with the same coarse key are "the same
/// account" for fund-type and component mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountKey {
    pub agency: String,       // 3-digit, e.g. "070"
    pub main_account: String, // 4-digit, e.g. "0530"
}

impl AccountKey {
    pub fn new(agency: &str, main_account: &str) -> Option<AccountKey> {
        Some(AccountKey {
            agency: pad_numeric(agency, 3)?,
            main_account: pad_numeric(main_account, 4)?,
        })
    }

    /// Parse the canonical `AAA-MMMM` form.
    pub fn parse(s: &str) -> Option<AccountKey> {
        let (agency, main) = s.trim().split_once('-')?;
        AccountKey::new(agency, main)
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.agency, self.main_account)
    }
}

/// Fine key: coarse key plus availability period. Used to match specific
/// appropriation-year records across apportionment and spending sources.
/// Serialized as `AAA-MMMM-begin/end` or `AAA-MMMM-X`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TasKey {
    pub account: AccountKey,
    pub availability: Availability,
}

impl TasKey {
    pub fn new(account: AccountKey, availability: Availability) -> TasKey {
        TasKey { account, availability }
    }

    pub fn coarse(&self) -> &AccountKey {
        &self.account
    }

    /// Parse the canonical fine-key form back into a key.
    ///
    /// Idempotence: `TasKey::parse(&key.to_string()) == Some(key)` for every
    /// key this module produces.
    pub fn parse(s: &str) -> Option<TasKey> {
        let s = s.trim();
        let mut parts = s.splitn(3, '-');
        let agency = parts.next()?;
        let main = parts.next()?;
        let period = parts.next()?;
        let account = AccountKey::new(agency, main)?;
        let availability = Availability::parse(period)?;
        Some(TasKey::new(account, availability))
    }
}

impl fmt::Display for TasKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.account, self.availability.period_label())
    }
}

/// Fully parsed USAspending TAS, including the sub-account the fine key
/// ignores. Kept for provenance in validation reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTas {
    pub account: AccountKey,
    pub sub_account: String, // 3-digit, "000" default
    pub availability: Availability,
    pub raw: String,
}

impl ParsedTas {
    pub fn fine_key(&self) -> TasKey {
        TasKey::new(self.account.clone(), self.availability)
    }
}

// ============================================================================
// FORMAT A: OpenOMB schedule fields
// ============================================================================

/// Normalize the OpenOMB representation: a `CgacAgency`/`CgacAcct` pair with
/// availability spread across `AvailabilityTypeCode` ("X" means no-year) and
/// `BeginPoa`/`EndPoa`. When neither is present the filing fiscal year stands
/// in as an annual appropriation.
pub fn parse_openomb(
    cgac_agency: &str,
    cgac_acct: &str,
    availability_type_code: Option<&str>,
    begin_poa: Option<u16>,
    end_poa: Option<u16>,
    filing_fiscal_year: Option<u16>,
) -> Option<TasKey> {
    let account = AccountKey::new(cgac_agency, cgac_acct)?;

    let availability = if availability_type_code.map(str::trim) == Some("X") {
        Availability::NoYear
    } else if begin_poa.is_some() && end_poa.is_some() {
        // inverted ranges fall through as unparseable
        Availability::from_years(begin_poa, end_poa)?
    } else {
        Availability::Annual(filing_fiscal_year?)
    };

    Some(TasKey::new(account, availability))
}

// ============================================================================
// FORMAT B: USAspending account-balance export
// ============================================================================

/// Parse the USAspending string form `070-2024/2024-0112-000`: exactly five
/// dash-or-slash-delimited segments (agency, begin year, end year, main
/// account, sub-account). Anything else, including the no-year `070-X-...`
/// shape, is rejected.
pub fn parse_usaspending(tas: &str) -> Option<ParsedTas> {
    let raw = tas.trim();
    let mut parts = raw.split('-');
    let agency = parts.next()?;
    let years = parts.next()?;
    let main = parts.next()?;
    let sub = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (begin, end) = years.split_once('/')?;
    if agency.len() != 3 || begin.len() != 4 || end.len() != 4 || main.len() != 4 || sub.len() != 3
    {
        return None;
    }

    let account = AccountKey::new(agency, main)?;
    let availability = Availability::from_years(parse_year(begin), parse_year(end))?;
    let sub_account = pad_numeric(sub, 3)?;

    Some(ParsedTas {
        account,
        sub_account,
        availability,
        raw: raw.to_string(),
    })
}

/// Build a fine key from the separate USAspending columns
/// (`agency_identifier_code`, `beginning/ending_period_of_availability`,
/// `main_account_code`). A record with no begin year cannot be placed in an
/// appropriation-year bucket and is unparseable for lifecycle purposes.
pub fn from_usaspending_columns(
    agency: &str,
    begin_year: Option<u16>,
    end_year: Option<u16>,
    main_account: &str,
) -> Option<TasKey> {
    let account = AccountKey::new(agency, main_account)?;
    let availability = Availability::from_years(begin_year, end_year)?;
    Some(TasKey::new(account, availability))
}

// ============================================================================
// FORMAT C: FAST Book reference
// ============================================================================

/// Normalize a FAST Book TAS string to its coarse key. The reference table
/// writes either `070 0530` (space-separated) or `070X0530.001` (X-separated
/// with an optional dotted sub-account). Strategy: strip the 4-character
/// agency prefix, truncate at the first `.`.
pub fn parse_fastbook(tas: &str, agency: &str) -> Option<AccountKey> {
    let tas = tas.trim();
    let x_prefix = format!("{}X", agency);
    let space_prefix = format!("{} ", agency);

    let rest = if let Some(rest) = tas.strip_prefix(&x_prefix) {
        rest
    } else if let Some(rest) = tas.strip_prefix(&space_prefix) {
        rest
    } else {
        // Already a bare account code, or a shape we do not know
        tas
    };

    let main = rest.split('.').next().unwrap_or("").trim();
    AccountKey::new(agency, main)
}

// ============================================================================
// HELPERS
// ============================================================================

/// Left-pad a numeric code to a fixed width (USAspending exports drop leading
/// zeros, e.g. agency `70` for `070`). Non-numeric or over-long input is
/// unparseable.
fn pad_numeric(s: &str, width: usize) -> Option<String> {
    let s = s.trim();
    if s.is_empty() || s.len() > width || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>width$}", s, width = width))
}

fn parse_year(s: &str) -> Option<u16> {
    let y: u16 = s.trim().parse().ok()?;
    // Fiscal years outside this window are data errors, not real accounts
    if (1900..=2100).contains(&y) {
        Some(y)
    } else {
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openomb_multi_year() {
        let key = parse_openomb("070", "0530", None, Some(2023), Some(2025), Some(2023)).unwrap();
        assert_eq!(key.to_string(), "070-0530-2023/2025");
        assert_eq!(key.coarse().to_string(), "070-0530");
        assert_eq!(key.availability, Availability::MultiYear(2023, 2025));
    }

    #[test]
    fn test_openomb_degenerate_range_is_annual() {
        let key = parse_openomb("070", "0530", None, Some(2023), Some(2023), None).unwrap();
        assert_eq!(key.availability, Availability::Annual(2023));
        assert_eq!(key.availability.type_label(), "annual");
        assert_eq!(key.to_string(), "070-0530-2023/2023");
    }

    #[test]
    fn test_openomb_no_year_code_wins() {
        // "X" overrides whatever POA columns carry
        let key = parse_openomb("070", "0544", Some("X"), Some(2023), Some(2025), None).unwrap();
        assert_eq!(key.availability, Availability::NoYear);
        assert_eq!(key.to_string(), "070-0544-X");
    }

    #[test]
    fn test_openomb_filing_year_fallback() {
        let key = parse_openomb("070", "0112", None, None, None, Some(2024)).unwrap();
        assert_eq!(key.availability, Availability::Annual(2024));
    }

    #[test]
    fn test_openomb_unparseable() {
        assert_eq!(parse_openomb("", "0530", None, None, None, Some(2024)), None);
        assert_eq!(parse_openomb("070", "53AB", None, None, None, Some(2024)), None);
        // no availability information at all
        assert_eq!(parse_openomb("070", "0530", None, None, None, None), None);
        // inverted range
        assert_eq!(
            parse_openomb("070", "0530", None, Some(2025), Some(2023), None),
            None
        );
    }

    #[test]
    fn test_usaspending_full_string() {
        let parsed = parse_usaspending("070-2023/2025-0530-000").unwrap();
        assert_eq!(parsed.fine_key().to_string(), "070-0530-2023/2025");
        assert_eq!(parsed.sub_account, "000");
        assert_eq!(parsed.raw, "070-2023/2025-0530-000");
    }

    #[test]
    fn test_usaspending_rejects_wrong_shapes() {
        assert_eq!(parse_usaspending(""), None);
        assert_eq!(parse_usaspending("070-0530"), None);
        // no-year string form is out of pattern, by policy
        assert_eq!(parse_usaspending("070-X-0544-000"), None);
        assert_eq!(parse_usaspending("070-2023/2025-0530"), None);
        assert_eq!(parse_usaspending("070-2023/2025-0530-000-9"), None);
        assert_eq!(parse_usaspending("70-2023/2025-0530-000"), None);
    }

    #[test]
    fn test_usaspending_columns() {
        // trailing-zero loss in exports: agency "70", account "530"
        let key = from_usaspending_columns("70", Some(2023), Some(2023), "530").unwrap();
        assert_eq!(key.to_string(), "070-0530-2023/2023");

        // missing end year collapses to annual
        let key = from_usaspending_columns("070", Some(2024), None, "0112").unwrap();
        assert_eq!(key.availability, Availability::Annual(2024));

        // missing begin year is unparseable for lifecycle bucketing
        assert_eq!(from_usaspending_columns("070", None, Some(2024), "0112"), None);
    }

    #[test]
    fn test_fastbook_formats() {
        assert_eq!(
            parse_fastbook("070X0530.001", "070").unwrap().to_string(),
            "070-0530"
        );
        assert_eq!(
            parse_fastbook("070X0530", "070").unwrap().to_string(),
            "070-0530"
        );
        assert_eq!(
            parse_fastbook("070 0530", "070").unwrap().to_string(),
            "070-0530"
        );
        assert_eq!(parse_fastbook("garbage", "070"), None);
        assert_eq!(parse_fastbook("", "070"), None);
    }

    #[test]
    fn test_coarse_key_stable_across_formats() {
        // The same account seen through all three sources lands on one key
        let a = parse_openomb("070", "0530", None, Some(2023), Some(2025), None).unwrap();
        let b = parse_usaspending("070-2023/2025-0530-000").unwrap();
        let c = parse_fastbook("070X0530.001", "070").unwrap();

        assert_eq!(a.coarse(), &c);
        assert_eq!(b.fine_key(), a);
        assert_eq!(b.fine_key().coarse(), &c);
    }

    #[test]
    fn test_fine_key_parse_idempotent() {
        let keys = [
            parse_openomb("070", "0530", None, Some(2023), Some(2025), None).unwrap(),
            parse_openomb("070", "0530", None, Some(2023), Some(2023), None).unwrap(),
            parse_openomb("070", "0544", Some("X"), None, None, None).unwrap(),
        ];
        for key in keys {
            let reparsed = TasKey::parse(&key.to_string()).unwrap();
            assert_eq!(reparsed, key);
            // and once more - already-canonical input comes back unchanged
            assert_eq!(TasKey::parse(&reparsed.to_string()).unwrap(), reparsed);
        }
    }

    #[test]
    fn test_fine_key_parse_legacy_bare_year() {
        // Older aggregated CSVs wrote annual periods as a bare year
        let key = TasKey::parse("070-0112-2024").unwrap();
        assert_eq!(key.availability, Availability::Annual(2024));
        assert_eq!(key.to_string(), "070-0112-2024/2024");
    }

    #[test]
    fn test_availability_ordering() {
        // NoYear sorts after year-limited periods; used by sorted outputs
        let mut periods = vec![
            Availability::NoYear,
            Availability::MultiYear(2023, 2025),
            Availability::Annual(2022),
        ];
        periods.sort();
        assert_eq!(periods[0], Availability::Annual(2022));
        assert_eq!(periods[2], Availability::NoYear);
    }
}
