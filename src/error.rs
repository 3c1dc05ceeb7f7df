//! Error types for the listing wizard.

use crate::wizard::{SessionId, StepId};

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Step catalog misconfiguration. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog has no steps")]
    EmptyCatalog,

    #[error("Step {step} appears more than once in the catalog order")]
    DuplicateStep { step: StepId },

    #[error("Grouped step {step} is not part of the catalog order")]
    UnknownGroupedStep { step: StepId },

    #[error("Optional step {step} is not part of the catalog order")]
    UnknownOptionalStep { step: StepId },

    #[error("Branch rule references step {step} which is not part of the catalog order")]
    UnknownGatedStep { step: StepId },

    #[error("Failed to load catalog definition: {0}")]
    Load(String),
}

/// Errors raised while driving a wizard session.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Unknown step: {step}")]
    UnknownStep { step: StepId },

    #[error("Step {step} is not active for the current answers")]
    InactiveStep { step: StepId },

    #[error("Step {step} is required and cannot be skipped")]
    NotSkippable { step: StepId },

    #[error("Invalid answer for step {step}: {reason}")]
    InvalidAnswer { step: StepId, reason: String },

    #[error("Session {session} has already finished")]
    SessionFinished { session: SessionId },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl WizardError {
    /// Whether the error indicates a catalog/ledger misconfiguration.
    ///
    /// Fatal errors abort the session; everything else re-prompts the user.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownStep { .. } | Self::Catalog(_))
    }
}

/// Chat transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
