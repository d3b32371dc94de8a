use crate::data;
use crate::data::index::INDEX;
use crate::models::ViewMode;
use crate::search;
use crate::session::{Session, SessionError};
use crate::tally::AggregatedView;

const BAR_WIDTH: usize = 32;

/// The statistics panel plus bar-chart breakdown for the current view.
pub fn stats_report(session: &Session) -> Result<String, SessionError> {
    let scope = session.current_scope()?;
    let view = session.aggregated(&scope);

    let mut out = String::new();
    match session.view_mode() {
        ViewMode::Constituency => {
            out.push_str(&format!(
                "Constituency Statistics: {}\n",
                session.constituency().unwrap_or("?")
            ));
        }
        ViewMode::District => {
            out.push_str(&format!(
                "District Statistics: {}\n",
                session.district().unwrap_or("?")
            ));
        }
        ViewMode::National => out.push_str("National Statistics\n"),
    }
    if session.is_loading() {
        out.push_str("(connecting to live results...)\n");
    }
    if let Some(notice) = session.listener_notice() {
        out.push_str(notice);
        out.push('\n');
    }

    if session.view_mode() != ViewMode::Constituency {
        out.push_str(&format!(
            "Reporting:         {} / {}\n",
            view.constituencies_reporting, view.total_constituencies
        ));
    }
    out.push_str(&format!(
        "Registered Voters: {}\n",
        group_thousands(view.registered_voters)
    ));
    out.push_str(&format!(
        "Total Votes Cast:  {}\n",
        group_thousands(view.total_votes_cast)
    ));
    out.push_str(&format!("Voter Turnout:     {:.2}%\n", view.turnout));

    if session.view_mode() == ViewMode::Constituency {
        if let Some(id) = session.selected_id() {
            match session.stored_result(&id) {
                Some(stored) => {
                    let when = stored
                        .timestamp
                        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                        .unwrap_or_else(|| "unknown time".to_string());
                    let who = stored.last_updated_by.as_deref().unwrap_or("unknown");
                    out.push_str(&format!("Status:            Submitted {} by {}\n", when, who));
                }
                None => out.push_str("Status:            Not yet submitted\n"),
            }
        }
        if session.is_submitting() {
            out.push_str("(submission in progress...)\n");
        }
    }

    if view.validation_error {
        out.push_str(
            "Warning: total votes cast exceed the number of registered voters.\n",
        );
    }

    out.push('\n');
    out.push_str(&bar_chart(&view));
    Ok(out)
}

/// Per-candidate bars scaled against total votes cast (clamped to at least
/// one so an empty scope still renders).
pub fn bar_chart(view: &AggregatedView) -> String {
    let denom = view.total_votes_cast.max(1);
    let mut out = String::new();
    for candidate in data::candidates() {
        let value = view.tally.get(&candidate.abbreviation);
        let percent = value as f64 * 100.0 / denom as f64;
        let width = (value as usize * BAR_WIDTH) / denom as usize;
        out.push_str(&format!(
            "{:<4} {:>9}  {:5.1}%  {:<width$}  {} ({})\n",
            candidate.abbreviation,
            group_thousands(value),
            percent,
            "#".repeat(width),
            candidate.name,
            candidate.party,
            width = BAR_WIDTH,
        ));
    }
    out.push_str(&format!(
        "Null & Void: {}\n",
        group_thousands(view.null_and_void)
    ));
    out
}

/// The names selectable at the operator's current depth.
pub fn list_options(session: &Session) -> String {
    match (session.region(), session.district()) {
        (None, _) => format!("Regions: {}", INDEX.region_names().join(", ")),
        (Some(region), None) => format!(
            "Districts in {}: {}",
            region,
            INDEX.district_names(region).join(", ")
        ),
        (Some(region), Some(district)) => format!(
            "Constituencies in {}: {}",
            district,
            INDEX.constituency_names(region, district).join(", ")
        ),
    }
}

pub fn search_results(query: &str) -> String {
    if query.trim().len() < 3 {
        return "Enter at least three characters to search.".to_string();
    }
    let hits = search::polling_centers(&INDEX, query);
    if hits.is_empty() {
        return format!("No polling centers matched '{}'.", query.trim());
    }
    let mut out = String::new();
    for pc in hits {
        out.push_str(&format!(
            "{}  {}  [{} > {} > {}]  {} voters\n",
            pc.code,
            pc.name,
            pc.region,
            pc.district,
            pc.constituency,
            group_thousands(data::voter_count(&pc.code))
        ));
    }
    out
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
