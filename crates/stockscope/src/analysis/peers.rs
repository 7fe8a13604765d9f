//! Sector peer matching
//!
//! Peers are candidates whose sector string equals the target's sector,
//! compared exactly and case-sensitively. The target itself is kept when it is
//! part of the candidate list. Unknown sectors are represented by
//! [`UNKNOWN_SECTOR`] and therefore only match other unknowns.
//!
//! This is a weak heuristic: it knows nothing about size, business model or
//! fundamentals.

use crate::identifiers::Identifier;
use crate::models::UNKNOWN_SECTOR;
use std::collections::HashSet;

/// Candidates sharing `sector`, in candidate order without duplicates
pub fn find_peers<F>(
    target: &Identifier,
    sector: &str,
    candidates: &[Identifier],
    sector_lookup: F,
) -> Vec<Identifier>
where
    F: Fn(&Identifier) -> Option<String>,
{
    let mut seen = HashSet::new();
    let peers: Vec<Identifier> = candidates
        .iter()
        .filter(|candidate| seen.insert((*candidate).clone()))
        .filter(|candidate| {
            let candidate_sector = sector_lookup(*candidate);
            candidate_sector.as_deref().unwrap_or(UNKNOWN_SECTOR) == sector
        })
        .cloned()
        .collect();

    tracing::debug!(
        "{} of {} candidates share sector {:?} with {}",
        peers.len(),
        candidates.len(),
        sector,
        target
    );
    peers
}

/// Candidate universe for `target`: the configured list, or just the target
pub fn candidate_universe(target: &Identifier, configured: &[Identifier]) -> Vec<Identifier> {
    if configured.is_empty() {
        vec![target.clone()]
    } else {
        configured.to_vec()
    }
}
