// Core layer - shared types and configuration
pub mod core;

// Features layer - all feature modules
pub mod features;

// Discord components and the Discord transport
pub mod message_components;

// Infrastructure
pub mod database;

// Application layer
pub mod command_handler;
pub mod commands;

pub use core::Config;

pub use features::{
    Birthday, BirthdayFlows, BirthdayNotifier, BirthdayStore, Inbound, Outbound, RateLimiter,
    Transport,
};
