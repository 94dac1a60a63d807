//! # Feature: Birthdays
//!
//! Per-conversation birthday records with interactive add, search, remove
//! and edit dialogs.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod command;
pub mod dialog;
pub mod flow;
pub mod keyboards;
pub mod messages;
pub mod model;
pub mod query;
pub mod store;
pub mod transport;

pub use command::Command;
pub use dialog::{Action, DateStep, DialogState, FlowToken, Stage};
pub use flow::{BirthdayFlows, Inbound};
pub use model::{Birthday, ConversationId, SearchMode, SearchQuery};
pub use query::Filter;
pub use store::BirthdayStore;
pub use transport::{Choice, Delivery, Keyboard, MessageId, Outbound, Transport};
