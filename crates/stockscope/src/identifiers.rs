//! Instrument identifiers and the identifier list source
//!
//! An identifier is whatever the user put in the list: an ISIN
//! (`US0378331005`), a German WKN (`865985`) or an exchange ticker (`AAPL`,
//! `BRK.B`, `SAP.DE`). Classification only decides how the provider has to
//! resolve it; the original string is kept for reporting.

use crate::error::{Result, ScopeError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// Default identifier list consumed by the CLI
pub const DEFAULT_IDENTIFIER_FILE: &str = "isin_wkn_list.txt";

static ISIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{2}[A-Z0-9]{9}[0-9]$").expect("ISIN pattern is valid")
});
static WKN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{6}$").expect("WKN pattern is valid"));
static TICKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9^][A-Z0-9.=\-]{0,19}$").expect("ticker pattern is valid")
});

/// How an identifier has to be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    /// International Securities Identification Number
    Isin,
    /// Wertpapierkennnummer
    Wkn,
    /// Exchange ticker symbol
    Ticker,
}

/// A validated instrument identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Parse and normalise a raw identifier
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(ScopeError::MalformedIdentifier(raw.to_string()));
        }

        if ISIN_RE.is_match(&normalized) {
            if !isin_check_digit_valid(&normalized) {
                return Err(ScopeError::MalformedIdentifier(raw.to_string()));
            }
            return Ok(Self(normalized));
        }

        if TICKER_RE.is_match(&normalized) {
            return Ok(Self(normalized));
        }

        Err(ScopeError::MalformedIdentifier(raw.to_string()))
    }

    /// Classify the identifier
    pub fn kind(&self) -> IdentifierKind {
        if ISIN_RE.is_match(&self.0) {
            IdentifierKind::Isin
        } else if WKN_RE.is_match(&self.0) && self.0.chars().any(|c| c.is_ascii_digit()) {
            IdentifierKind::Wkn
        } else {
            IdentifierKind::Ticker
        }
    }

    /// Whether the provider can use the identifier as a listing symbol directly
    pub fn is_symbol(&self) -> bool {
        self.kind() == IdentifierKind::Ticker
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = ScopeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl std::str::FromStr for Identifier {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// ISIN check digit (ISO 6166): letters expand to two digits (A=10 .. Z=35),
/// then the Luhn rule runs over the expanded string.
fn isin_check_digit_valid(isin: &str) -> bool {
    let (body, check) = isin.split_at(11);
    let Some(check) = check.chars().next().and_then(|c| c.to_digit(10)) else {
        return false;
    };

    let mut digits = Vec::with_capacity(22);
    for c in body.chars() {
        match c.to_digit(36) {
            Some(v) if v >= 10 => {
                digits.push(v / 10);
                digits.push(v % 10);
            }
            Some(v) => digits.push(v),
            None => return false,
        }
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    (10 - sum % 10) % 10 == check
}

/// Split newline-delimited list contents into raw identifiers
///
/// Lines are trimmed; blank lines and `#` comments are skipped. Entries are
/// not validated here so a malformed line becomes a per-instrument failure
/// instead of failing the whole list.
pub fn parse_identifier_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}

/// Read the identifier list from a text file
pub fn read_identifier_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ScopeError::ResourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ScopeError::Io(e)
        }
    })?;

    let identifiers = parse_identifier_list(&contents);
    tracing::debug!(
        "Read {} identifiers from {}",
        identifiers.len(),
        path.display()
    );
    Ok(identifiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_isin() {
        let id = Identifier::parse("US0378331005").unwrap();
        assert_eq!(id.kind(), IdentifierKind::Isin);
        assert!(!id.is_symbol());

        let id = Identifier::parse(" de0007164600 ").unwrap();
        assert_eq!(id.as_str(), "DE0007164600");
        assert_eq!(id.kind(), IdentifierKind::Isin);
    }

    #[test]
    fn test_isin_bad_check_digit() {
        let err = Identifier::parse("US0378331006").unwrap_err();
        assert!(matches!(err, ScopeError::MalformedIdentifier(_)));
    }

    #[test]
    fn test_parse_wkn() {
        let id = Identifier::parse("865985").unwrap();
        assert_eq!(id.kind(), IdentifierKind::Wkn);

        let id = Identifier::parse("A1EWWW").unwrap();
        assert_eq!(id.kind(), IdentifierKind::Wkn);
    }

    #[test]
    fn test_parse_ticker() {
        for raw in ["AAPL", "brk.b", "SAP.DE", "^GSPC", "EURUSD=X", "GOOGLE"] {
            let id = Identifier::parse(raw).unwrap();
            assert_eq!(id.kind(), IdentifierKind::Ticker, "{raw}");
            assert!(id.is_symbol());
        }
    }

    #[test]
    fn test_parse_malformed() {
        for raw in ["", "   ", "AA PL", "$$$", "THIS-TICKER-IS-FAR-TOO-LONG"] {
            assert!(
                matches!(Identifier::parse(raw), Err(ScopeError::MalformedIdentifier(_))),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_identifier_serde() {
        let id = Identifier::parse("AAPL").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"AAPL\"");

        let back: Identifier = serde_json::from_str("\"msft\"").unwrap();
        assert_eq!(back.as_str(), "MSFT");
        assert!(serde_json::from_str::<Identifier>("\"a b\"").is_err());
    }

    #[test]
    fn test_parse_identifier_list_skips_blank_lines() {
        let list = parse_identifier_list("US0378331005\n\n  865985  \n# comment\nAAPL\n\n");
        assert_eq!(list, vec!["US0378331005", "865985", "AAPL"]);
    }

    #[test]
    fn test_parse_identifier_list_keeps_duplicates() {
        let list = parse_identifier_list("AAPL\nAAPL\n");
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_read_identifier_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "AAPL\n\nMSFT").unwrap();

        let list = read_identifier_list(file.path()).unwrap();
        assert_eq!(list, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_read_identifier_list_missing_file() {
        let err = read_identifier_list("/definitely/not/here/isin_wkn_list.txt").unwrap_err();
        assert!(matches!(err, ScopeError::ResourceNotFound { .. }));
    }
}
