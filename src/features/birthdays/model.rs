//! Birthday records and search descriptors

use std::fmt;
use std::str::FromStr;

use chrono::Month;

use crate::core::FlowError;

/// Chat scope a record or dialog belongs to (the Discord channel id)
pub type ConversationId = i64;

/// Longest name accepted by `/add` and renames; keeps picker payloads within Discord's 100 char limit
pub const MAX_NAME_LEN: usize = 60;

/// A named day of the year, unique by (conversation, name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Birthday {
    pub conversation_id: ConversationId,
    pub name: String,
    pub day: u32,
    pub month: u32,
}

impl Birthday {
    pub fn new(conversation_id: ConversationId, name: impl Into<String>, day: u32, month: u32) -> Self {
        Self {
            conversation_id,
            name: name.into(),
            day,
            month,
        }
    }

    /// `<Month DD>`, e.g. "June 05"
    pub fn date_label(&self) -> String {
        date_label(self.day, self.month)
    }
}

impl fmt::Display for Birthday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.date_label())
    }
}

/// English month name for 1-12
pub fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown")
}

pub fn date_label(day: u32, month: u32) -> String {
    format!("{} {:02}", month_name(month), day)
}

/// Days a month can have in any year. February allows the 29th.
pub fn days_in_month(month: u32) -> u32 {
    match month {
        2 => 29,
        4 | 6 | 9 | 11 => 30,
        1..=12 => 31,
        _ => 0,
    }
}

pub fn is_valid_date(day: u32, month: u32) -> bool {
    day >= 1 && day <= days_in_month(month)
}

/// Normalize a user supplied name; `None` when it is blank or too long
pub fn clean_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        None
    } else {
        Some(name.to_string())
    }
}

/// Search discriminator selecting which stored fields constrain a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    All,
    Name,
    Day,
    Month,
    Date,
}

impl SearchMode {
    pub const ALL: [SearchMode; 5] = [
        SearchMode::All,
        SearchMode::Name,
        SearchMode::Day,
        SearchMode::Month,
        SearchMode::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::All => "all",
            SearchMode::Name => "name",
            SearchMode::Day => "day",
            SearchMode::Month => "month",
            SearchMode::Date => "date",
        }
    }
}

impl FromStr for SearchMode {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| FlowError::InvalidMode(s.to_string()))
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient search request; only the fields relevant to `mode` are read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub conversation_id: ConversationId,
    pub mode: SearchMode,
    pub name: Option<String>,
    pub day: Option<u32>,
    pub month: Option<u32>,
}

impl SearchQuery {
    fn empty(conversation_id: ConversationId, mode: SearchMode) -> Self {
        Self {
            conversation_id,
            mode,
            name: None,
            day: None,
            month: None,
        }
    }

    pub fn all(conversation_id: ConversationId) -> Self {
        Self::empty(conversation_id, SearchMode::All)
    }

    pub fn by_name(conversation_id: ConversationId, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::empty(conversation_id, SearchMode::Name)
        }
    }

    pub fn by_day(conversation_id: ConversationId, day: u32) -> Self {
        Self {
            day: Some(day),
            ..Self::empty(conversation_id, SearchMode::Day)
        }
    }

    pub fn by_month(conversation_id: ConversationId, month: u32) -> Self {
        Self {
            month: Some(month),
            ..Self::empty(conversation_id, SearchMode::Month)
        }
    }

    pub fn by_date(conversation_id: ConversationId, day: u32, month: u32) -> Self {
        Self {
            day: Some(day),
            month: Some(month),
            ..Self::empty(conversation_id, SearchMode::Date)
        }
    }
}
