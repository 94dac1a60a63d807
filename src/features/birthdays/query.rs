//! Query routing: search descriptors to store predicates
//!
//! Pure mapping with no side effects. Every filter is executed with the same
//! calendar ordering so listings read January to December.

use crate::core::FlowError;

use super::model::{is_valid_date, SearchMode, SearchQuery};

/// Calendar ordering applied to every conversation search
pub const ORDER_BY: &str = " ORDER BY month, day";

/// Store predicate selected for a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    All,
    /// Case-folded LIKE pattern, already wrapped in wildcards
    NameContains(String),
    Day(u32),
    Month(u32),
    Date { day: u32, month: u32 },
}

impl Filter {
    /// SQL predicate appended after the conversation scope (`chat_id = ?`).
    /// Parameters continue from `?2`.
    pub fn predicate(&self) -> &'static str {
        match self {
            Filter::All => "",
            Filter::NameContains(_) => " AND LOWER(name) LIKE ?2 ESCAPE '\\'",
            Filter::Day(_) => " AND day = ?2",
            Filter::Month(_) => " AND month = ?2",
            Filter::Date { .. } => " AND day = ?2 AND month = ?3",
        }
    }
}

/// Pick the store predicate for a query
///
/// Fails with `InvalidInput` when the field the mode depends on is missing or
/// out of range.
pub fn route(query: &SearchQuery) -> Result<Filter, FlowError> {
    match query.mode {
        SearchMode::All => Ok(Filter::All),
        SearchMode::Name => {
            let name = query
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| FlowError::InvalidInput("name search without a name".to_string()))?;
            Ok(Filter::NameContains(contains_pattern(name)))
        }
        SearchMode::Day => match query.day {
            Some(day) if (1..=31).contains(&day) => Ok(Filter::Day(day)),
            other => Err(FlowError::InvalidInput(format!("day {other:?}"))),
        },
        SearchMode::Month => match query.month {
            Some(month) if (1..=12).contains(&month) => Ok(Filter::Month(month)),
            other => Err(FlowError::InvalidInput(format!("month {other:?}"))),
        },
        SearchMode::Date => match (query.day, query.month) {
            (Some(day), Some(month)) if is_valid_date(day, month) => Ok(Filter::Date { day, month }),
            other => Err(FlowError::InvalidInput(format!("date {other:?}"))),
        },
    }
}

/// `%name%`, lower-cased, with LIKE metacharacters escaped
pub fn contains_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len() + 2);
    pattern.push('%');
    for ch in name.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_has_no_predicate() {
        assert_eq!(route(&SearchQuery::all(1)).unwrap(), Filter::All);
        assert_eq!(Filter::All.predicate(), "");
    }

    #[test]
    fn test_name_pattern_is_case_folded_contains() {
        let filter = route(&SearchQuery::by_name(1, "AN")).unwrap();
        assert_eq!(filter, Filter::NameContains("%an%".to_string()));
    }

    #[test]
    fn test_name_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("C:\\x"), "%c:\\\\x%");
    }

    #[test]
    fn test_blank_name_is_invalid_input() {
        let err = route(&SearchQuery::by_name(1, "  ")).unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput(_)));
    }

    #[test]
    fn test_numeric_modes() {
        assert_eq!(route(&SearchQuery::by_day(1, 31)).unwrap(), Filter::Day(31));
        assert_eq!(route(&SearchQuery::by_month(1, 12)).unwrap(), Filter::Month(12));
        assert_eq!(
            route(&SearchQuery::by_date(1, 29, 2)).unwrap(),
            Filter::Date { day: 29, month: 2 }
        );

        assert!(route(&SearchQuery::by_day(1, 0)).is_err());
        assert!(route(&SearchQuery::by_month(1, 13)).is_err());
        assert!(route(&SearchQuery::by_date(1, 31, 4)).is_err());
    }

    #[test]
    fn test_missing_field_for_mode() {
        let mut query = SearchQuery::all(1);
        query.mode = SearchMode::Month;
        assert!(matches!(route(&query), Err(FlowError::InvalidInput(_))));
    }

    #[test]
    fn test_date_predicate_binds_day_then_month() {
        assert_eq!(
            Filter::Date { day: 1, month: 2 }.predicate(),
            " AND day = ?2 AND month = ?3"
        );
    }
}
