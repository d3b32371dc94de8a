use std::collections::HashMap;

use crate::data::index::LocationId;
use crate::models::{LocalDraft, ResultDocument};

/// Merges the authoritative store snapshot with locally cached drafts.
///
/// A draft's counts override the stored counts for its location so rollups
/// reflect unsaved edits immediately; stored metadata (timestamp, submitter,
/// location names) is kept for display. Locations without a draft pass
/// through untouched. Pure: same inputs, same output.
pub fn reconcile(
    authoritative: &HashMap<LocationId, ResultDocument>,
    drafts: &HashMap<LocationId, LocalDraft>,
) -> HashMap<LocationId, ResultDocument> {
    let mut combined = authoritative.clone();
    for (id, draft) in drafts {
        let entry = combined.entry(id.clone()).or_insert_with(ResultDocument::default);
        entry.tally = draft.tally.clone();
        entry.null_and_void = draft.null_and_void;
    }
    combined
}
