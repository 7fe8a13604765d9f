//! Word valence lexicon backing the sentiment classifier
//!
//! Uses the VADER file layout: one `token<TAB>mean_valence[<TAB>...]` entry per
//! line. Only the first two columns are read, so a stock `vader_lexicon.txt`
//! (which also carries standard deviation and raw ratings) loads unchanged.

use crate::error::{Result, ScopeError};
use std::collections::HashMap;
use std::path::Path;

const BUILTIN_LEXICON: &str = include_str!("default_lexicon.tsv");

/// Immutable token → valence table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lexicon {
    entries: HashMap<String, f64>,
}

impl Lexicon {
    /// The lexicon shipped with the crate
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_LEXICON).expect("built-in lexicon is well formed")
    }

    /// Parse lexicon text; later duplicates override earlier ones
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = HashMap::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let mut columns = line.split('\t');
            let token = columns.next().unwrap_or_default().trim();
            let valence = columns.next().map(str::trim).ok_or_else(|| ScopeError::LexiconError {
                line: index + 1,
                reason: format!("missing valence for {token:?}"),
            })?;

            if token.is_empty() {
                return Err(ScopeError::LexiconError {
                    line: index + 1,
                    reason: "empty token".to_string(),
                });
            }

            let valence: f64 = valence.parse().map_err(|_| ScopeError::LexiconError {
                line: index + 1,
                reason: format!("invalid valence {valence:?}"),
            })?;
            if !valence.is_finite() {
                return Err(ScopeError::LexiconError {
                    line: index + 1,
                    reason: format!("non-finite valence for {token:?}"),
                });
            }

            entries.insert(token.to_lowercase(), valence);
        }

        Ok(Self { entries })
    }

    /// Load a lexicon file from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScopeError::ResourceNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ScopeError::Io(e)
            }
        })?;

        let lexicon = Self::parse(&text)?;
        tracing::info!("Loaded {} lexicon entries from {}", lexicon.len(), path.display());
        Ok(lexicon)
    }

    /// Valence of a lowercase token
    pub fn valence(&self, token: &str) -> Option<f64> {
        self.entries.get(token).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_lexicon() {
        let lexicon = Lexicon::builtin();
        assert!(lexicon.len() > 200);
        assert!(lexicon.valence("good").unwrap() > 0.0);
        assert!(lexicon.valence("bad").unwrap() < 0.0);
        assert_eq!(lexicon.valence("the"), None);
    }

    #[test]
    fn test_parse_vader_layout() {
        let text = concat!(
            "# comment\n\n",
            "$:\t-1.5\t0.80623\t[-1, -1, -1, -1, -3, -1, -3, -1, -2, -1]\n",
            "Good\t1.9\t0.9\n",
        );
        let lexicon = Lexicon::parse(text).unwrap();
        assert_eq!(lexicon.len(), 2);
        assert_eq!(lexicon.valence("$:"), Some(-1.5));
        assert_eq!(lexicon.valence("good"), Some(1.9));
    }

    #[test]
    fn test_parse_rejects_bad_valence() {
        let err = Lexicon::parse("good\t1.9\nbad\tvery\n").unwrap_err();
        match err {
            ScopeError::LexiconError { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        assert!(Lexicon::parse("lonely-token\n").is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "upbeat\t1.7\ngrim\t-1.9").unwrap();

        let lexicon = Lexicon::from_path(file.path()).unwrap();
        assert_eq!(lexicon.len(), 2);

        let err = Lexicon::from_path("/no/such/lexicon.tsv").unwrap_err();
        assert!(matches!(err, ScopeError::ResourceNotFound { .. }));
    }
}
