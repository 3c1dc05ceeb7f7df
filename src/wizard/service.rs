//! Wizard service — async, transport-facing entry point.
//!
//! The chat transport hands every inbound event to [`WizardService::handle`]
//! and renders the returned [`WizardReply`]. Events for one session are
//! processed to completion before the next; the controller sits behind a
//! single mutex and no work here blocks or awaits I/O while holding it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use super::catalog::{StepCatalog, StepId};
use super::controller::{log_rejection, WizardController, WizardState};
use super::ledger::SessionId;
use super::planner::{Answer, Answers, BranchPlanner};
use super::templates::LabelTemplates;
use crate::config::WizardConfig;
use crate::error::{CatalogError, WizardError};

/// Shown to the vendor when a configuration error aborts the session.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please send /start to begin again.";

const CANCELLED: &str = "Registration cancelled. Send /start whenever you want to try again.";

const FINISHED: &str = "This registration has already finished. Send /start to begin a new one.";

/// What the vendor did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Start,
    Answer(Answer),
    Skip { reason: String },
    Back,
    Cancel,
}

/// One inbound event from the chat transport.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub session: SessionId,
    pub input: UserInput,
    /// Preferred prompt language, if the transport knows it.
    pub language: Option<String>,
}

impl InboundEvent {
    pub fn new(session: SessionId, input: UserInput) -> Self {
        Self {
            session,
            input,
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// What the transport should render next.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardReply {
    Prompt {
        step: StepId,
        label: String,
        /// Why the previous input was not accepted, if it wasn't.
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
    },
    Completed {
        answers: Answers,
    },
    Aborted {
        message: String,
    },
    /// The session already finished; nothing changed.
    Finished {
        message: String,
    },
}

#[derive(Debug)]
struct SessionMeta {
    last_seen: DateTime<Utc>,
    language: String,
}

struct Inner {
    controller: WizardController,
    meta: HashMap<SessionId, SessionMeta>,
}

/// Shared wizard service for all chat sessions.
pub struct WizardService {
    inner: Mutex<Inner>,
    templates: Arc<dyn LabelTemplates>,
    config: WizardConfig,
}

impl WizardService {
    pub fn new(
        catalog: Arc<StepCatalog>,
        planner: Arc<BranchPlanner>,
        templates: Arc<dyn LabelTemplates>,
        config: WizardConfig,
    ) -> Result<Arc<Self>, CatalogError> {
        let controller = WizardController::new(catalog, planner)?;
        Ok(Arc::new(Self {
            inner: Mutex::new(Inner {
                controller,
                meta: HashMap::new(),
            }),
            templates,
            config,
        }))
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    /// Current state of a session, if it has one.
    pub async fn current(&self, session: &SessionId) -> Option<WizardState> {
        self.inner.lock().await.controller.current(session).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.lock().await.controller.session_count()
    }

    /// Process one inbound event to completion.
    pub async fn handle(&self, event: InboundEvent) -> WizardReply {
        let InboundEvent {
            session,
            input,
            language,
        } = event;

        let mut inner = self.inner.lock().await;
        let meta = inner
            .meta
            .entry(session.clone())
            .or_insert_with(|| SessionMeta {
                last_seen: Utc::now(),
                language: self.config.default_language.clone(),
            });
        meta.last_seen = Utc::now();
        if let Some(language) = language {
            meta.language = language;
        }

        let controller = &mut inner.controller;
        let result = match input {
            UserInput::Start => Ok(controller.start(&session)),
            UserInput::Answer(answer) => controller.advance(&session, answer),
            UserInput::Skip { reason } => controller.skip(&session, &reason),
            UserInput::Back => controller.back(&session),
            UserInput::Cancel => Ok(controller.abort(&session)),
        };

        match result {
            Ok(state) => self.reply_for(&mut inner, &session, state, None),
            Err(WizardError::SessionFinished { .. }) => WizardReply::Finished {
                message: FINISHED.to_string(),
            },
            Err(err) if err.is_fatal() => Self::fail(&mut inner, &session, &err),
            Err(err) => {
                log_rejection(&session, &err);
                let notice = notice_for(&err);
                let current = inner.controller.current(&session).cloned();
                match current {
                    Some(state) => self.reply_for(&mut inner, &session, state, Some(notice)),
                    None => Self::fail(&mut inner, &session, &err),
                }
            }
        }
    }

    /// Clear every session idle for longer than the configured timeout.
    /// Returns how many sessions were cleared.
    pub async fn expire_idle(&self) -> usize {
        self.expire_idle_at(Utc::now()).await
    }

    pub async fn expire_idle_at(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock().await;
        let timeout = self.config.idle_timeout;

        let expired: Vec<SessionId> = inner
            .meta
            .iter()
            .filter(|(_, meta)| {
                (now - meta.last_seen)
                    .to_std()
                    .is_ok_and(|idle| idle > timeout)
            })
            .map(|(session, _)| session.clone())
            .collect();

        for session in &expired {
            inner.meta.remove(session);
            inner.controller.remove(session);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired idle wizard sessions");
        }
        expired.len()
    }

    fn reply_for(
        &self,
        inner: &mut Inner,
        session: &SessionId,
        state: WizardState,
        notice: Option<String>,
    ) -> WizardReply {
        match state {
            WizardState::Step(step) => {
                let language = inner
                    .meta
                    .get(session)
                    .map(|m| m.language.as_str())
                    .unwrap_or(self.config.default_language.as_str());
                match inner
                    .controller
                    .label(session, &step, self.templates.as_ref(), language)
                {
                    Ok(label) => WizardReply::Prompt {
                        step,
                        label,
                        notice,
                    },
                    Err(err @ WizardError::InactiveStep { .. }) => {
                        log_rejection(session, &err);
                        let next = inner.controller.resume(session);
                        if next.step() == Some(&step) {
                            return Self::fail(inner, session, &err);
                        }
                        self.reply_for(inner, session, next, notice)
                    }
                    Err(err) => Self::fail(inner, session, &err),
                }
            }
            WizardState::Completed => WizardReply::Completed {
                answers: inner.controller.answers(session).cloned().unwrap_or_default(),
            },
            WizardState::Aborted => WizardReply::Aborted {
                message: CANCELLED.to_string(),
            },
        }
    }

    /// Abort after an error the vendor cannot fix.
    fn fail(inner: &mut Inner, session: &SessionId, err: &WizardError) -> WizardReply {
        error!(session = %session, error = %err, fatal = err.is_fatal(), "Aborting wizard session");
        inner.controller.abort(session);
        WizardReply::Aborted {
            message: GENERIC_FAILURE.to_string(),
        }
    }
}

/// Vendor-facing explanation for a recoverable rejection.
fn notice_for(err: &WizardError) -> String {
    match err {
        WizardError::NotSkippable { .. } => "This step is required and can't be skipped.".to_string(),
        WizardError::InvalidAnswer { reason, .. } => format!("That answer wasn't accepted: {reason}."),
        _ => "Let's continue from here.".to_string(),
    }
}

/// Run [`WizardService::expire_idle`] every `sweep_interval`.
pub fn spawn_expiry_task(service: Arc<WizardService>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(service.config.sweep_interval);
        loop {
            interval.tick().await;
            service.expire_idle().await;
        }
    })
}
