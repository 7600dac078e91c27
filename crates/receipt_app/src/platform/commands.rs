use std::path::PathBuf;

pub const HELP: &str = "\
Commands:
  add <files...>   upload files as a new batch (replaces the current one)
  remove <n>       remove file n from the batch and cancel its job
  save             save every completed receipt
  list             show saved receipts grouped by month
  status           show the current batch
  help             show this help
  quit             leave; an unsaved batch is kept for next time";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Add(Vec<PathBuf>),
    /// Zero-based position in the batch.
    Remove(usize),
    Save,
    List,
    Status,
    Help,
    Quit,
    Empty,
}

/// Parses one input line. Positions are typed 1-based.
pub fn parse_command(line: &str) -> Result<SessionCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(SessionCommand::Empty);
    };
    let args: Vec<&str> = words.collect();

    match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("add", []) => Err("add needs at least one file".to_string()),
        ("add", files) => Ok(SessionCommand::Add(
            files.iter().map(PathBuf::from).collect(),
        )),
        ("remove" | "rm", [position]) => match position.parse::<usize>() {
            Ok(position) if position > 0 => Ok(SessionCommand::Remove(position - 1)),
            _ => Err(format!("`{position}` is not a file number")),
        },
        ("remove" | "rm", _) => Err("usage: remove <n>".to_string()),
        ("save", []) => Ok(SessionCommand::Save),
        ("list", []) => Ok(SessionCommand::List),
        ("status", []) => Ok(SessionCommand::Status),
        ("help" | "?", _) => Ok(SessionCommand::Help),
        ("quit" | "exit", []) => Ok(SessionCommand::Quit),
        (other, _) => Err(format!("unknown command `{other}`, try `help`")),
    }
}
