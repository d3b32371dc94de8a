use crate::data::index::{ElectoralIndex, FlatPollingCenter};

const MIN_QUERY_LEN: usize = 3;
const MAX_RESULTS: usize = 10;

/// Finds polling centers whose name or code contains the query,
/// case-insensitively. Queries shorter than three characters return nothing
/// and results are capped at ten.
pub fn polling_centers<'a>(
    index: &'a ElectoralIndex,
    query: &str,
) -> Vec<&'a FlatPollingCenter> {
    let needle = query.trim().to_lowercase();
    if needle.len() < MIN_QUERY_LEN {
        return Vec::new();
    }
    index
        .polling_centers()
        .iter()
        .filter(|pc| {
            pc.name.to_lowercase().contains(&needle) || pc.code.to_lowercase().contains(&needle)
        })
        .take(MAX_RESULTS)
        .collect()
}
