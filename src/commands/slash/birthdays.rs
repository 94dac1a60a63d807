//! # Birthday Commands
//!
//! `/add`, `/showall`, `/search`, `/remove` and `/edit`.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Added /edit
//! - 1.0.0: Initial implementation

use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;

use crate::features::birthdays::model::MAX_NAME_LEN;

pub fn create_commands() -> Vec<CreateApplicationCommand> {
    vec![
        create_add_command(),
        simple_command("showall", "Show all birthdays"),
        simple_command("search", "Search for birthdays"),
        simple_command("remove", "Remove a birthday"),
        simple_command("edit", "Change the name or date of a birthday"),
    ]
}

fn create_add_command() -> CreateApplicationCommand {
    let mut command = CreateApplicationCommand::default();
    command
        .name("add")
        .description("Add a new birthday")
        .create_option(|option| {
            option
                .name("name")
                .description("Whose birthday it is")
                .kind(CommandOptionType::String)
                .required(true)
                .min_length(1)
                .max_length(MAX_NAME_LEN as u16)
        });
    command
}

fn simple_command(name: &str, description: &str) -> CreateApplicationCommand {
    let mut command = CreateApplicationCommand::default();
    command.name(name).description(description);
    command
}
