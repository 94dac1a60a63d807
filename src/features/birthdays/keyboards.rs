//! Picker keyboards for the dialog flows
//!
//! Values are what callbacks echo back. Numbers are plain decimal strings,
//! birthday entries carry their name behind [`NAME_PREFIX`] so that a person
//! called "cancel" can still be picked.

use super::dialog::FlowToken;
use super::model::{days_in_month, Birthday};
use super::transport::{Choice, Keyboard};

/// Placeholder cell value; selecting it is a no-op
pub const BLANK: &str = " ";
pub const CANCEL: &str = "cancel";
pub const NAME_PREFIX: char = '=';

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// What a picker callback asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T> {
    Blank,
    Cancel,
    Value(T),
}

impl<T> Selection<T> {
    /// Decode a callback value; `None` when it is neither a sentinel nor a valid `T`
    pub fn parse(raw: &str, value: impl FnOnce(&str) -> Option<T>) -> Option<Self> {
        match raw {
            BLANK => Some(Selection::Blank),
            CANCEL => Some(Selection::Cancel),
            other => value(other).map(Selection::Value),
        }
    }
}

pub fn parse_number(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

pub fn parse_name(raw: &str) -> Option<String> {
    raw.strip_prefix(NAME_PREFIX)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn cancel_row() -> Vec<Choice> {
    vec![Choice::new("Cancel", CANCEL)]
}

/// all / name / day / month / date / cancel
pub fn mode_picker(token: FlowToken) -> Keyboard {
    Keyboard {
        token,
        rows: vec![
            vec![Choice::new("All", "all"), Choice::new("Name", "name")],
            vec![
                Choice::new("Day", "day"),
                Choice::new("Month", "month"),
                Choice::new("Date", "date"),
            ],
            cancel_row(),
        ],
    }
}

/// Twelve months, three per row
pub fn month_picker(token: FlowToken) -> Keyboard {
    let mut rows: Vec<Vec<Choice>> = MONTH_ABBREVIATIONS
        .chunks(3)
        .enumerate()
        .map(|(row, names)| {
            names
                .iter()
                .enumerate()
                .map(|(col, name)| Choice::new(*name, (row * 3 + col + 1).to_string()))
                .collect()
        })
        .collect();
    rows.push(cancel_row());
    Keyboard { token, rows }
}

/// Days 1..=`days` laid out as a seven-column grid padded with blanks
pub fn day_picker(token: FlowToken, days: u32) -> Keyboard {
    let cells: Vec<Choice> = (1..=days)
        .map(|day| Choice::new(day.to_string(), day.to_string()))
        .collect();

    let mut rows: Vec<Vec<Choice>> = cells.chunks(7).map(|row| row.to_vec()).collect();
    if let Some(last) = rows.last_mut() {
        last.resize_with(7, Choice::blank);
    }
    rows.push(cancel_row());
    Keyboard { token, rows }
}

/// Day picker sized for a month; February offers the 29th
pub fn day_picker_for_month(token: FlowToken, month: u32) -> Keyboard {
    day_picker(token, days_in_month(month))
}

/// One entry per birthday, then cancel
pub fn birthday_picker(token: FlowToken, birthdays: &[Birthday]) -> Keyboard {
    let mut rows: Vec<Vec<Choice>> = birthdays
        .iter()
        .map(|b| vec![Choice::new(b.to_string(), format!("{NAME_PREFIX}{}", b.name))])
        .collect();
    rows.push(cancel_row());
    Keyboard { token, rows }
}

/// name / date / cancel
pub fn edit_field_picker(token: FlowToken) -> Keyboard {
    Keyboard {
        token,
        rows: vec![
            vec![Choice::new("Name", "name"), Choice::new("Date", "date")],
            cancel_row(),
        ],
    }
}
