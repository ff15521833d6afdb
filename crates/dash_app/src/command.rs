use std::str::FromStr;

pub const HELP: &str = "commands: <enter>|n next page, f <key> <value> set filter (value 'all' clears), c clear filters, r refresh, q quit";

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NextPage,
    Filter { key: String, value: String },
    ClearFilters,
    Refresh,
    Quit,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("usage: f <key> <value>")]
    MissingFilterKey,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        match word {
            "" | "n" => Ok(Command::NextPage),
            "f" => {
                let (key, value) = match rest.split_once(char::is_whitespace) {
                    Some((key, value)) => (key, value.trim()),
                    None => (rest, ""),
                };
                if key.is_empty() {
                    return Err(CommandError::MissingFilterKey);
                }
                Ok(Command::Filter {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
            "c" => Ok(Command::ClearFilters),
            "r" => Ok(Command::Refresh),
            "q" => Ok(Command::Quit),
            "h" | "?" => Ok(Command::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_advances_a_page() {
        assert_eq!("".parse(), Ok(Command::NextPage));
        assert_eq!("  n ".parse(), Ok(Command::NextPage));
    }

    #[test]
    fn filter_value_keeps_inner_spaces() {
        assert_eq!(
            "f domain  my host ".parse(),
            Ok(Command::Filter {
                key: "domain".to_string(),
                value: "my host".to_string(),
            })
        );
        assert_eq!(
            "f status".parse(),
            Ok(Command::Filter {
                key: "status".to_string(),
                value: String::new(),
            })
        );
    }

    #[test]
    fn filter_needs_a_key() {
        assert_eq!("f".parse::<Command>(), Err(CommandError::MissingFilterKey));
    }

    #[test]
    fn unknown_words_are_rejected() {
        assert_eq!(
            "zap".parse::<Command>(),
            Err(CommandError::Unknown("zap".to_string()))
        );
    }
}
