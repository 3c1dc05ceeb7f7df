//! Vendor registration wizard — step sequencing and dynamic numbering.
//!
//! A fixed [`StepCatalog`] lists every logical step. The [`BranchPlanner`]
//! decides which of them apply to a session from the answers collected so
//! far, the [`SessionStepLedger`] remembers which steps were passed or
//! skipped, and the [`StepNumberResolver`] turns that history into the
//! gap-free "Step 5b" numbering the vendor sees. [`WizardController`] ties
//! them together; [`WizardService`] is the async face handed to transports.

pub mod catalog;
pub mod controller;
pub mod ledger;
pub mod planner;
pub mod resolver;
pub mod service;
pub mod templates;

pub use catalog::{CatalogDefinition, StepCatalog, StepId};
pub use controller::{WizardController, WizardState};
pub use ledger::{RecordOutcome, SessionId, SessionStepLedger, StepVisit};
pub use planner::{Activation, Answer, Answers, BranchDecision, BranchPlanner, FulfillmentService};
pub use resolver::{DisplayNumber, StepNumberResolver};
pub use service::{spawn_expiry_task, InboundEvent, UserInput, WizardReply, WizardService};
pub use templates::{LabelTemplates, TemplateSet};
