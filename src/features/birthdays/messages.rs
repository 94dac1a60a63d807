//! User-facing text
//!
//! Markdown is rendered by the chat client, so bold and italics use `**`/`*`.

use super::model::{date_label, Birthday, MAX_NAME_LEN};

pub const HELP: &str = "Hi, I am a birthday reminder bot. I can help you remember birthdays of your friends and family.

You can use the following commands to interact with me:
  • /add <name> - Add a new birthday
  • /showall - Show all birthdays
  • /search - Search for birthdays
  • /remove - Remove a birthday
  • /edit - Change the name or date of a birthday";

pub const NO_RESULTS: &str = "***No Birthdays found***";
pub const ADD_USAGE: &str = "Please provide a name: /add <name>";
pub const SELECT_SEARCH_TYPE: &str = "Select the search type";
pub const SELECT_DAY: &str = "Select the day";
pub const SELECT_MONTH: &str = "Select the month";
pub const SELECT_DATE: &str = "Select the date";

pub fn retry(command: &str) -> String {
    format!("Something went wrong. Please try /{command} again.")
}

pub fn name_too_long() -> String {
    format!("That name is too long. Names can have at most {MAX_NAME_LEN} characters.")
}

pub fn select_birthday_of(name: &str) -> String {
    format!("Select the Birthday of '{name}'")
}

pub fn enter_name(command: &str) -> String {
    format!("Enter the name of the person to /{command}")
}

pub fn select_birthday_to(command: &str) -> String {
    format!("Select the birthday to /{command}")
}

pub fn added(birthday: &Birthday) -> String {
    format!("**Added Birthday** for {}", birthday)
}

pub fn already_exists(name: &str) -> String {
    format!("Name '{name}' already exists.\nDo you want to /remove it?")
}

pub fn removed(name: &str) -> String {
    format!("**Removed Birthday** of {name}")
}

pub fn search_results(birthdays: &[Birthday]) -> String {
    if birthdays.is_empty() {
        return NO_RESULTS.to_string();
    }
    let mut text = String::from("**Search Results:**\n");
    for birthday in birthdays {
        text.push_str(&format!("• {}\n", birthday));
    }
    text.truncate(text.trim_end().len());
    text
}

pub fn edit_what(name: &str) -> String {
    format!("What do you want to change for '{name}'?")
}

pub fn enter_new_name(name: &str) -> String {
    format!("Enter the new name for '{name}'")
}

pub fn renamed(old_name: &str, new_name: &str) -> String {
    format!("**Renamed** {old_name} to {new_name}")
}

pub fn rescheduled(name: &str, day: u32, month: u32) -> String {
    format!("**Updated Birthday** of {name} ({})", date_label(day, month))
}

/// Reminder text for a birthday `offset` days away (negative means it has passed)
pub fn notification(birthday: &Birthday, offset: i64) -> String {
    let when = match offset {
        -1 => {
            return format!(
                "Did you wish {} a happy birthday?\nIf not wish now itself.",
                birthday.name
            )
        }
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        n if n < 0 => format!("{} days ago", -n),
        n => format!("{n} days from now"),
    };
    format!(
        "{when} is {}'s birthday 🎂 ({})",
        birthday.name,
        birthday.date_label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anna() -> Birthday {
        Birthday::new(1, "Anna", 15, 6)
    }

    #[test]
    fn test_search_results_layout() {
        let text = search_results(&[anna(), Birthday::new(1, "Bob", 30, 12)]);
        assert_eq!(text, "**Search Results:**\n• Anna (June 15)\n• Bob (December 30)");
        assert_eq!(search_results(&[]), NO_RESULTS);
    }

    #[test]
    fn test_notification_templates() {
        assert_eq!(notification(&anna(), 0), "Today is Anna's birthday 🎂 (June 15)");
        assert_eq!(notification(&anna(), 1), "Tomorrow is Anna's birthday 🎂 (June 15)");
        assert_eq!(
            notification(&anna(), 7),
            "7 days from now is Anna's birthday 🎂 (June 15)"
        );
        assert_eq!(
            notification(&anna(), -1),
            "Did you wish Anna a happy birthday?\nIf not wish now itself."
        );
    }

    #[test]
    fn test_flow_templates() {
        assert_eq!(added(&anna()), "**Added Birthday** for Anna (June 15)");
        assert_eq!(retry("add"), "Something went wrong. Please try /add again.");
        assert_eq!(removed("Anna"), "**Removed Birthday** of Anna");
        assert_eq!(rescheduled("Anna", 5, 1), "**Updated Birthday** of Anna (January 05)");
        assert!(HELP.lines().count() == 8);
    }
}
