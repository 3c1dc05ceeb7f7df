//! Listing Wizard — guided vendor registration for the directory bot.

pub mod channels;
pub mod config;
pub mod error;
pub mod wizard;
