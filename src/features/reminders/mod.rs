//! # Feature: Birthday Reminders
//!
//! Daily scheduled reminders for upcoming and passed birthdays.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod scheduler;

pub use scheduler::{BirthdayNotifier, NotifyJob, DEFAULT_JOBS};
