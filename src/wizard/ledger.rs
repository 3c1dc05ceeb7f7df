//! Session step ledger — which steps each conversation has passed and
//! whether they were skipped.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::StepId;

/// Opaque conversation identity (chat id, user id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One recorded step visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepVisit {
    pub step: StepId,
    pub skipped: bool,
    pub visited_at: DateTime<Utc>,
}

/// Outcome of [`SessionStepLedger::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// A record for this step already existed; the ledger is unchanged.
    DuplicateIgnored,
}

/// Per-session visit records. First write wins.
#[derive(Debug, Default)]
pub struct SessionStepLedger {
    sessions: HashMap<SessionId, Vec<StepVisit>>,
}

impl SessionStepLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a visit for `step` unless one already exists for this session.
    ///
    /// A later re-entry (the user went back) never overwrites the original
    /// skip status, so displayed numbering stays stable.
    pub fn record(&mut self, session: &SessionId, step: &StepId, skipped: bool) -> RecordOutcome {
        let visits = self.sessions.entry(session.clone()).or_default();
        if visits.iter().any(|v| &v.step == step) {
            debug!(session = %session, step = %step, skipped, "Duplicate step record ignored");
            return RecordOutcome::DuplicateIgnored;
        }

        debug!(session = %session, step = %step, skipped, "Step recorded");
        visits.push(StepVisit {
            step: step.clone(),
            skipped,
            visited_at: Utc::now(),
        });
        RecordOutcome::Recorded
    }

    /// Visit records for a session, in recording order.
    pub fn visits_for(&self, session: &SessionId) -> &[StepVisit] {
        self.sessions
            .get(session)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn visit(&self, session: &SessionId, step: &StepId) -> Option<&StepVisit> {
        self.visits_for(session).iter().find(|v| &v.step == step)
    }

    /// Release every record for a session.
    pub fn clear(&mut self, session: &SessionId) {
        if let Some(visits) = self.sessions.remove(session) {
            debug!(session = %session, records = visits.len(), "Ledger cleared");
        }
    }

    /// Number of sessions with at least one record.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
