pub mod index;

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use serde::Deserialize;

use crate::models::{Candidate, PollingCenter};

/// region name -> district name -> constituency name -> polling centers
pub type RegionMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<PollingCenter>>>>;

#[derive(Debug, Deserialize)]
struct ElectoralData {
    regions: RegionMap,
    voter_counts: BTreeMap<String, u64>,
}

lazy_static! {
    static ref ELECTORAL: ElectoralData =
        serde_json::from_str(include_str!("electoral_data.json"))
            .expect("embedded electoral data is well-formed");

    static ref CANDIDATES: Vec<Candidate> = vec![
        candidate("Grace Chilima", "United Progressive Front", "UPF", "#2563eb"),
        candidate("Daniel Phiri", "National Democratic Alliance", "NDA", "#dc2626"),
        candidate("Esther Banda", "People's Renewal Movement", "PRM", "#16a34a"),
        candidate("Samuel Mwale", "Congress for Unity", "CFU", "#f59e0b"),
        candidate("Linda Kachale", "Independent", "IND", "#7c3aed"),
    ];
}

fn candidate(name: &str, party: &str, abbreviation: &str, color: &str) -> Candidate {
    Candidate {
        name: name.to_string(),
        party: party.to_string(),
        abbreviation: abbreviation.to_string(),
        color: color.to_string(),
    }
}

/// The fixed national candidate list, in ballot order.
pub fn candidates() -> &'static [Candidate] {
    &CANDIDATES
}

/// The full region -> district -> constituency -> polling-center hierarchy.
pub fn regions() -> &'static RegionMap {
    &ELECTORAL.regions
}

/// Registered voters for one polling center; zero for unknown codes.
pub fn voter_count(code: &str) -> u64 {
    ELECTORAL.voter_counts.get(code).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_polling_center_has_a_voter_count() {
        for districts in regions().values() {
            for constituencies in districts.values() {
                for centers in constituencies.values() {
                    for center in centers {
                        assert!(
                            voter_count(&center.code) > 0,
                            "missing voter count for {}",
                            center.code
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn polling_center_codes_are_globally_unique() {
        let mut seen = std::collections::HashSet::new();
        for districts in regions().values() {
            for constituencies in districts.values() {
                for centers in constituencies.values() {
                    for center in centers {
                        assert!(seen.insert(center.code.clone()), "duplicate {}", center.code);
                    }
                }
            }
        }
    }

    #[test]
    fn candidate_abbreviations_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for c in candidates() {
            assert!(seen.insert(c.abbreviation.clone()));
        }
    }
}
