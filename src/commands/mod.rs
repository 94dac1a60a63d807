//! # Command System
//!
//! Text and slash (/) command handling for Discord.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod slash;

pub use crate::command_handler::CommandHandler;

pub use slash::{
    create_slash_commands, get_string_option, register_global_commands, register_guild_commands,
};
