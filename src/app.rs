use crate::errors::SessionError;
use chrono::NaiveDate;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Toggle,
    Lap,
    Reset,
    DeleteLap(i64),
    ClearLaps,
    Status,
    Laps,
    Stats(Option<(NaiveDate, NaiveDate)>),
    Tasks,
    AddTask(String),
    ToggleTask(u64),
    DeleteTask(u64),
    Export(PathBuf),
    Import(PathBuf),
    StorageError,
    ResetStorage,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, SessionError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "stop" | "pause" => Command::Stop,
            "toggle" => Command::Toggle,
            "lap" => Command::Lap,
            "reset" => Command::Reset,
            "delete-lap" => Command::DeleteLap(parse_number(rest, "lap index")?),
            "clear-laps" => Command::ClearLaps,
            "status" => Command::Status,
            "laps" => Command::Laps,
            "stats" => Command::Stats(parse_range(rest)?),
            "tasks" => Command::Tasks,
            "add-task" => {
                if rest.is_empty() {
                    return Err(SessionError::bad_request("add-task needs text"));
                }
                Command::AddTask(rest.to_string())
            }
            "toggle-task" => Command::ToggleTask(parse_number(rest, "task id")?),
            "delete-task" => Command::DeleteTask(parse_number(rest, "task id")?),
            "export" => Command::Export(parse_path(rest)?),
            "import" => Command::Import(parse_path(rest)?),
            "storage-error" => Command::StorageError,
            "reset-storage" => Command::ResetStorage,
            "quit" | "exit" => Command::Quit,
            other => return Err(SessionError::bad_request(format!("unknown command '{other}'"))),
        };
        Ok(Some(command))
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, SessionError> {
    raw.parse::<T>()
        .map_err(|_| SessionError::bad_request(format!("invalid {what} '{raw}'")))
}

fn parse_path(raw: &str) -> Result<PathBuf, SessionError> {
    if raw.is_empty() {
        return Err(SessionError::bad_request("missing file path"));
    }
    Ok(PathBuf::from(raw))
}

fn parse_range(raw: &str) -> Result<Option<(NaiveDate, NaiveDate)>, SessionError> {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    match parts.as_slice() {
        [] => Ok(None),
        [start, end] => Ok(Some((parse_date(start)?, parse_date(end)?))),
        _ => Err(SessionError::bad_request("stats takes no dates or START END")),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, SessionError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| SessionError::bad_request(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn parses_stopwatch_commands() {
        assert_eq!(parse("start"), Command::Start);
        assert_eq!(parse("  PAUSE "), Command::Stop);
        assert_eq!(parse("delete-lap 2"), Command::DeleteLap(2));
        assert_eq!(parse("delete-lap -1"), Command::DeleteLap(-1));
        assert_eq!(parse("clear-laps"), Command::ClearLaps);
        assert!(Command::parse("   ").unwrap().is_none());
    }

    #[test]
    fn parses_stats_ranges() {
        assert_eq!(parse("stats"), Command::Stats(None));
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 11).unwrap();
        assert_eq!(parse("stats 2026-01-05 2026-01-11"), Command::Stats(Some((start, end))));
        assert!(Command::parse("stats 2026-01-05").is_err());
        assert!(Command::parse("stats 2026-13-01 2026-01-11").is_err());
    }

    #[test]
    fn parses_task_and_bundle_commands() {
        assert_eq!(parse("add-task buy milk  "), Command::AddTask("buy milk".into()));
        assert_eq!(parse("toggle-task 17"), Command::ToggleTask(17));
        assert_eq!(parse("export /tmp/out.json"), Command::Export(PathBuf::from("/tmp/out.json")));
        assert!(Command::parse("add-task").is_err());
        assert!(Command::parse("delete-task abc").is_err());
        assert!(Command::parse("import").is_err());
        assert_eq!(parse("storage-error"), Command::StorageError);
        assert_eq!(parse("Reset-Storage"), Command::ResetStorage);
    }

    #[test]
    fn rejects_unknown_commands() {
        let err = Command::parse("fly away").unwrap_err();
        assert_eq!(err.to_string(), "unknown command 'fly'");
    }
}
