use std::collections::HashMap;

use crate::data::index::{ElectoralIndex, LocationId};
use crate::models::{ResultDocument, VoteTally};

use super::{AggregatedView, Scope};

/// Computes the aggregated view for one scope from the full reconciled
/// result map. Totals are rebuilt from scratch on every call; snapshots for
/// different documents arrive in arbitrary order, so there is deliberately
/// no incremental per-location delta path here.
///
/// Registered voters come from the reference index alone, so turnout keeps
/// the true denominator while locations are still outstanding. A location
/// counts as reporting whenever reconciled data exists for it, even if all
/// of its counts are zero.
pub fn aggregate(
    scope: &Scope,
    index: &ElectoralIndex,
    results: &HashMap<LocationId, ResultDocument>,
) -> AggregatedView {
    match scope {
        Scope::National => {
            let mut tally = VoteTally::zeroed();
            let mut null_and_void = 0;
            for doc in results.values() {
                tally.add(&doc.tally);
                null_and_void += doc.null_and_void;
            }
            AggregatedView::finish(
                index.registered_voters_national(),
                index.constituencies().len(),
                results.len(),
                tally,
                null_and_void,
            )
        }
        Scope::District { region, district } => {
            let mut tally = VoteTally::zeroed();
            let mut null_and_void = 0;
            let mut reporting = 0;
            let mut total = 0;
            for entry in index
                .constituencies()
                .iter()
                .filter(|e| &e.region == region && &e.district == district)
            {
                total += 1;
                if let Some(doc) = results.get(&entry.id) {
                    reporting += 1;
                    tally.add(&doc.tally);
                    null_and_void += doc.null_and_void;
                }
            }
            AggregatedView::finish(
                index.registered_voters_in_district(region, district),
                total,
                reporting,
                tally,
                null_and_void,
            )
        }
        Scope::Constituency { id } => {
            let mut tally = VoteTally::zeroed();
            let mut null_and_void = 0;
            let mut reporting = 0;
            if let Some(doc) = results.get(id) {
                reporting = 1;
                tally.add(&doc.tally);
                null_and_void = doc.null_and_void;
            }
            AggregatedView::finish(
                index.registered_voters_for(id),
                1,
                reporting,
                tally,
                null_and_void,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::index::INDEX;
    use crate::models::LocalDraft;
    use crate::tally::reconcile::reconcile;

    fn doc(upf: u64, nda: u64, null_and_void: u64) -> ResultDocument {
        let mut d = ResultDocument::default();
        d.tally.set("UPF", upf);
        d.tally.set("NDA", nda);
        d.null_and_void = null_and_void;
        d
    }

    fn rumphi_west() -> LocationId {
        LocationId::derive("Northern", "Rumphi", "Rumphi West")
    }

    fn rumphi_east() -> LocationId {
        LocationId::derive("Northern", "Rumphi", "Rumphi East")
    }

    #[test]
    fn single_constituency_statistics() {
        // Rumphi West has 500 registered voters (RU-201).
        let mut results = HashMap::new();
        results.insert(rumphi_west(), doc(200, 150, 10));

        let view = aggregate(
            &Scope::Constituency { id: rumphi_west() },
            &INDEX,
            &results,
        );
        assert_eq!(view.registered_voters, 500);
        assert_eq!(view.constituencies_reporting, 1);
        assert_eq!(view.total_votes_cast, 360);
        assert!((view.turnout - 72.0).abs() < 1e-9);
        assert!(!view.validation_error);
    }

    #[test]
    fn district_rollup_includes_a_live_draft() {
        // Both Rumphi constituencies hold 500 registered voters. One has a
        // submitted result, the other only an unsaved draft.
        let mut stored = HashMap::new();
        stored.insert(rumphi_west(), doc(200, 150, 10));

        let mut drafts = HashMap::new();
        let mut tally = VoteTally::zeroed();
        tally.set("UPF", 100);
        tally.set("NDA", 90);
        drafts.insert(
            rumphi_east(),
            LocalDraft {
                tally,
                null_and_void: 5,
            },
        );

        let combined = reconcile(&stored, &drafts);
        let view = aggregate(
            &Scope::District {
                region: "Northern".to_string(),
                district: "Rumphi".to_string(),
            },
            &INDEX,
            &combined,
        );

        assert_eq!(view.registered_voters, 1000);
        assert_eq!(view.total_constituencies, 2);
        assert_eq!(view.constituencies_reporting, 2);
        assert_eq!(view.tally.get("UPF"), 300);
        assert_eq!(view.tally.get("NDA"), 240);
        assert_eq!(view.null_and_void, 15);
        assert_eq!(view.total_votes_cast, 555);
        assert!((view.turnout - 55.5).abs() < 1e-9);
        assert!(!view.validation_error);
    }

    #[test]
    fn turnout_is_zero_when_no_voters_are_registered() {
        let ghost = LocationId::from_raw("not-a-real-place");
        let mut results = HashMap::new();
        results.insert(ghost.clone(), doc(40, 0, 0));

        let view = aggregate(&Scope::Constituency { id: ghost }, &INDEX, &results);
        assert_eq!(view.registered_voters, 0);
        assert_eq!(view.total_votes_cast, 40);
        assert_eq!(view.turnout, 0.0);
        assert!(!view.validation_error);
    }

    #[test]
    fn over_capacity_sets_the_validation_flag() {
        // Likoma Island registers exactly 100 voters (LK-101).
        let likoma = LocationId::derive("Northern", "Likoma", "Likoma Island");
        let mut results = HashMap::new();
        results.insert(likoma.clone(), doc(101, 0, 0));

        let view = aggregate(&Scope::Constituency { id: likoma }, &INDEX, &results);
        assert_eq!(view.registered_voters, 100);
        assert!(view.validation_error);
    }

    #[test]
    fn zero_valued_results_still_count_as_reporting() {
        let mut results = HashMap::new();
        results.insert(rumphi_east(), doc(0, 0, 0));

        let view = aggregate(
            &Scope::District {
                region: "Northern".to_string(),
                district: "Rumphi".to_string(),
            },
            &INDEX,
            &results,
        );
        assert_eq!(view.constituencies_reporting, 1);
        assert_eq!(view.total_votes_cast, 0);
    }

    #[test]
    fn national_view_spans_every_district() {
        let mut results = HashMap::new();
        results.insert(rumphi_west(), doc(10, 0, 0));
        results.insert(
            LocationId::derive("Southern", "Zomba", "Zomba Central"),
            doc(20, 5, 1),
        );

        let view = aggregate(&Scope::National, &INDEX, &results);
        assert_eq!(view.registered_voters, INDEX.registered_voters_national());
        assert_eq!(view.total_constituencies, INDEX.constituencies().len());
        assert_eq!(view.constituencies_reporting, 2);
        assert_eq!(view.tally.get("UPF"), 30);
        assert_eq!(view.total_votes_cast, 36);
    }

    #[test]
    fn aggregation_is_idempotent_over_an_unchanged_map() {
        let mut results = HashMap::new();
        results.insert(rumphi_west(), doc(200, 150, 10));

        let scope = Scope::National;
        let first = aggregate(&scope, &INDEX, &results);
        let second = aggregate(&scope, &INDEX, &results);
        assert_eq!(first, second);
    }
}
