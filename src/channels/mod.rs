//! Chat transports that drive the wizard.

pub mod channel;
pub mod cli;
pub mod input;

pub use channel::*;
pub use cli::CliChannel;
pub use input::parse_input;
