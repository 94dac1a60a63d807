//! Text command parsing

use regex::Regex;
use std::sync::OnceLock;

/// Commands the bot understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/add <name>`; `None` when the name is missing. Length is checked by the flow.
    Add(Option<String>),
    ShowAll,
    Search,
    Remove,
    Edit,
}

fn argument(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

fn command_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)^/(add|showall|search|remove|edit)(?:@\S+)?(?:\s+(.*))?$").ok())
        .as_ref()
}

impl Command {
    /// Parse a message body. Unknown commands and plain text give `None`.
    pub fn parse(text: &str) -> Option<Command> {
        let captures = command_pattern()?.captures(text.trim())?;
        let raw = captures.get(2).map_or("", |m| m.as_str());

        let command = match &captures[1] {
            "add" => Command::Add(argument(raw)),
            "showall" => Command::ShowAll,
            "search" => Command::Search,
            "remove" => Command::Remove,
            "edit" => Command::Edit,
            _ => return None,
        };
        Some(command)
    }

    /// Build from a slash command name and its optional `name` argument
    pub fn from_slash(command: &str, name: Option<&str>) -> Option<Command> {
        match command {
            "add" => Some(Command::Add(name.and_then(argument))),
            "showall" => Some(Command::ShowAll),
            "search" => Some(Command::Search),
            "remove" => Some(Command::Remove),
            "edit" => Some(Command::Edit),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Add(_) => "add",
            Command::ShowAll => "showall",
            Command::Search => "search",
            Command::Remove => "remove",
            Command::Edit => "edit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_with_name() {
        assert_eq!(
            Command::parse("/add  Anna Maria "),
            Some(Command::Add(Some("Anna Maria".to_string())))
        );
    }

    #[test]
    fn test_parse_add_without_name() {
        assert_eq!(Command::parse("/add"), Some(Command::Add(None)));
        assert_eq!(Command::parse("/add    "), Some(Command::Add(None)));
    }

    #[test]
    fn test_parse_add_keeps_overlong_name() {
        let name = "x".repeat(crate::features::birthdays::model::MAX_NAME_LEN + 1);
        assert_eq!(
            Command::parse(&format!("/add {name}")),
            Some(Command::Add(Some(name)))
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("/showall"), Some(Command::ShowAll));
        assert_eq!(Command::parse("/search"), Some(Command::Search));
        assert_eq!(Command::parse(" /remove "), Some(Command::Remove));
        assert_eq!(Command::parse("/edit"), Some(Command::Edit));
        assert_eq!(Command::parse("/search@birthday_bot"), Some(Command::Search));
    }

    #[test]
    fn test_parse_rejects_unknown_and_plain_text() {
        assert_eq!(Command::parse("/start"), None);
        assert_eq!(Command::parse("/additional"), None);
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_from_slash() {
        assert_eq!(
            Command::from_slash("add", Some("Bob")),
            Some(Command::Add(Some("Bob".to_string())))
        );
        assert_eq!(Command::from_slash("add", None), Some(Command::Add(None)));
        assert_eq!(Command::from_slash("ping", None), None);
        assert_eq!(Command::ShowAll.name(), "showall");
    }
}
