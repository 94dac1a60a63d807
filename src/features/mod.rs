//! # Features
//!
//! - **birthdays**: records, dialog flows and the transport seam
//! - **reminders**: scheduled birthday notifications
//! - **rate_limiting**: per-user event limits

pub mod birthdays;
pub mod rate_limiting;
pub mod reminders;

pub use birthdays::{Birthday, BirthdayFlows, BirthdayStore, Inbound, Outbound, Transport};
pub use rate_limiting::RateLimiter;
pub use reminders::BirthdayNotifier;
