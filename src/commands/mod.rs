use crate::models::ViewMode;

/// One parsed operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Mode(ViewMode),
    SelectRegion(String),
    SelectDistrict(String),
    SelectConstituency(String),
    List,
    Enter { abbreviation: String, count: u64 },
    Void { count: u64 },
    Submit,
    Stats,
    Search(String),
    Reset,
    Confirm,
    Cancel,
    Dismiss,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, String> {
    let mut tokens = line.trim().splitn(2, char::is_whitespace);
    let keyword = tokens.next().unwrap_or("").to_ascii_lowercase();
    let rest = tokens.next().map(str::trim).unwrap_or("");

    match keyword.as_str() {
        "mode" => match ViewMode::parse(rest) {
            Some(mode) => Ok(Command::Mode(mode)),
            None => Err("usage: mode <constituency|district|national>".to_string()),
        },
        "region" => non_empty(rest, "usage: region <name>").map(Command::SelectRegion),
        "district" => non_empty(rest, "usage: district <name>").map(Command::SelectDistrict),
        "constituency" => {
            non_empty(rest, "usage: constituency <name>").map(Command::SelectConstituency)
        }
        "list" => Ok(Command::List),
        "enter" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let abbreviation = parts.next().unwrap_or("").to_ascii_uppercase();
            let raw_count = parts.next().map(str::trim);
            match raw_count {
                Some(raw) if !abbreviation.is_empty() => Ok(Command::Enter {
                    abbreviation,
                    count: parse_count(raw),
                }),
                _ => Err("usage: enter <CODE> <count>".to_string()),
            }
        }
        "void" => non_empty(rest, "usage: void <count>").map(|raw| Command::Void {
            count: parse_count(&raw),
        }),
        "submit" => Ok(Command::Submit),
        "stats" => Ok(Command::Stats),
        "search" => non_empty(rest, "usage: search <name or code>").map(Command::Search),
        "reset" => Ok(Command::Reset),
        "confirm" => Ok(Command::Confirm),
        "cancel" => Ok(Command::Cancel),
        "dismiss" => Ok(Command::Dismiss),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{}' (try 'help')", other)),
    }
}

/// Malformed or negative numbers clamp to zero, matching the behavior of
/// the entry form this console replaces.
fn parse_count(raw: &str) -> u64 {
    raw.parse::<i64>().map(|n| n.max(0) as u64).unwrap_or(0)
}

fn non_empty(rest: &str, usage: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(usage.to_string())
    } else {
        Ok(rest.to_string())
    }
}

pub fn help_text() -> &'static str {
    "Commands:\n\
     \x20 mode <constituency|district|national>   switch the view\n\
     \x20 region <name>                           select a region\n\
     \x20 district <name>                         select a district\n\
     \x20 constituency <name>                     select a constituency\n\
     \x20 list                                    show selectable names\n\
     \x20 enter <CODE> <count>                    set a candidate's votes\n\
     \x20 void <count>                            set null & void ballots\n\
     \x20 submit                                  submit the current entry\n\
     \x20 stats                                   show statistics and chart\n\
     \x20 search <name or code>                   find a polling center\n\
     \x20 reset                                   arm deletion of ALL results\n\
     \x20 confirm / cancel                        resolve a pending reset\n\
     \x20 dismiss                                 clear a listener warning\n\
     \x20 help                                    this text\n\
     \x20 quit                                    leave the console"
}
