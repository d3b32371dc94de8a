use log::warn;

use crate::commands::{self, Command};
use crate::render;
use crate::session::{Session, SessionError, SessionEvent};

/// Whether the console loop should keep running after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parses one operator input line and routes it. Parse problems are shown
/// to the operator and never abort the loop.
pub async fn handle_line(
    session: &mut Session,
    line: &str,
) -> Result<Flow, Box<dyn std::error::Error + Send + Sync>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Flow::Continue);
    }
    match commands::parse(trimmed) {
        Ok(command) => handle_command(session, command).await,
        Err(message) => {
            println!("{}", message);
            Ok(Flow::Continue)
        }
    }
}

pub async fn handle_command(
    session: &mut Session,
    command: Command,
) -> Result<Flow, Box<dyn std::error::Error + Send + Sync>> {
    match command {
        Command::Mode(mode) => report(session.set_view_mode(mode)),
        Command::SelectRegion(name) => report(session.select_region(&name)),
        Command::SelectDistrict(name) => report(session.select_district(&name)),
        Command::SelectConstituency(name) => report(session.select_constituency(&name)),
        Command::List => println!("{}", render::list_options(session)),
        Command::Enter {
            abbreviation,
            count,
        } => report(session.enter_votes(&abbreviation, count)),
        Command::Void { count } => report(session.enter_null_and_void(count)),
        Command::Submit => report(session.submit()),
        Command::Stats => match render::stats_report(session) {
            Ok(text) => println!("{}", text),
            Err(err) => print_error(&err),
        },
        Command::Search(query) => println!("{}", render::search_results(&query)),
        Command::Reset => println!("{}", session.arm_reset()),
        Command::Confirm => report(session.confirm_reset().await),
        Command::Cancel => report(session.cancel_reset()),
        Command::Dismiss => println!("{}", session.dismiss_notice()),
        Command::Help => println!("{}", commands::help_text()),
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// Prints a notice for store events that warrant one (first snapshot,
/// listener trouble, submission completions).
pub fn handle_event(session: &mut Session, event: SessionEvent) {
    if let Some(notice) = session.apply_event(event) {
        println!("{}", notice);
    }
}

fn report(result: Result<String, SessionError>) {
    match result {
        Ok(message) => println!("{}", message),
        Err(err) => print_error(&err),
    }
}

fn print_error(err: &SessionError) {
    match err {
        SessionError::Store(store_err) => {
            warn!("store operation failed: {}", store_err);
            println!("{}", store_err.user_message());
        }
        SessionError::QuotaExceeded { .. } => {
            println!(
                "Validation error: {}. Correct the values before submitting.",
                err
            );
        }
        other => println!("{}", other),
    }
}
