pub mod aggregate;
pub mod reconcile;

use crate::data::index::LocationId;
use crate::models::VoteTally;

/// The set of locations an aggregated view is computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    National,
    District { region: String, district: String },
    Constituency { id: LocationId },
}

/// Derived, read-only snapshot of the results in one scope. Recomputed from
/// the full reconciled result set whenever an input changes; never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedView {
    pub registered_voters: u64,
    pub total_constituencies: usize,
    pub constituencies_reporting: usize,
    pub tally: VoteTally,
    pub null_and_void: u64,
    pub total_votes_cast: u64,
    /// Percentage of registered voters who cast a ballot; 0 when the scope
    /// has no registered voters.
    pub turnout: f64,
    /// Set when votes cast exceed the scope's registered voters.
    pub validation_error: bool,
}

impl AggregatedView {
    pub(crate) fn finish(
        registered_voters: u64,
        total_constituencies: usize,
        constituencies_reporting: usize,
        tally: VoteTally,
        null_and_void: u64,
    ) -> Self {
        let total_votes_cast = tally.candidate_total() + null_and_void;
        let turnout = if registered_voters > 0 {
            (total_votes_cast as f64 / registered_voters as f64) * 100.0
        } else {
            0.0
        };
        Self {
            registered_voters,
            total_constituencies,
            constituencies_reporting,
            tally,
            null_and_void,
            total_votes_cast,
            turnout,
            validation_error: registered_voters > 0 && total_votes_cast > registered_voters,
        }
    }
}
