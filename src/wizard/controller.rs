//! Wizard controller — drives each session through the catalog, keeping
//! the ledger, branch plan and displayed numbering consistent.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::{StepCatalog, StepId};
use super::ledger::{SessionId, SessionStepLedger, StepVisit};
use super::planner::{Answer, Answers, BranchDecision, BranchPlanner};
use super::resolver::{DisplayNumber, StepNumberResolver};
use super::templates::{render, LabelTemplates};
use crate::error::{CatalogError, WizardError};

/// Where a session currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum WizardState {
    Step(StepId),
    Completed,
    Aborted,
}

impl WizardState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    pub fn step(&self) -> Option<&StepId> {
        match self {
            Self::Step(step) => Some(step),
            _ => None,
        }
    }
}

impl std::fmt::Display for WizardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(step) => write!(f, "{step}"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Per-session conversation state. The ledger lives alongside, keyed by
/// the same session id.
#[derive(Debug, Default)]
struct SessionState {
    state: Option<WizardState>,
    answers: Answers,
    /// Steps the vendor answered or declined, in resolution order.
    resolved: Vec<StepId>,
}

/// Orchestrates planner, ledger and resolver for every active session.
pub struct WizardController {
    catalog: Arc<StepCatalog>,
    planner: Arc<BranchPlanner>,
    ledger: SessionStepLedger,
    sessions: HashMap<SessionId, SessionState>,
}

impl WizardController {
    pub fn new(catalog: Arc<StepCatalog>, planner: Arc<BranchPlanner>) -> Result<Self, CatalogError> {
        planner.check(&catalog)?;
        Ok(Self {
            catalog,
            planner,
            ledger: SessionStepLedger::new(),
            sessions: HashMap::new(),
        })
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &SessionStepLedger {
        &self.ledger
    }

    /// Begin (or resume) a session. A session that already finished is
    /// started over.
    pub fn start(&mut self, session: &SessionId) -> WizardState {
        if let Some(state) = self.current(session) {
            if !state.is_terminal() {
                return state.clone();
            }
        }

        self.ledger.clear(session);
        self.sessions.insert(session.clone(), SessionState::default());
        let state = self.move_next(session);
        info!(session = %session, state = %state, "Wizard session started");
        state
    }

    pub fn current(&self, session: &SessionId) -> Option<&WizardState> {
        self.sessions.get(session).and_then(|s| s.state.as_ref())
    }

    pub fn answers(&self, session: &SessionId) -> Option<&Answers> {
        self.sessions.get(session).map(|s| &s.answers)
    }

    /// Steps on the session's effective path for its current answers.
    pub fn active_steps(&self, session: &SessionId) -> BranchDecision {
        let empty = Answers::new();
        let answers = self.answers(session).unwrap_or(&empty);
        self.planner.active_steps(&self.catalog, answers)
    }

    /// Answer the current step and move to the next applicable one.
    pub fn advance(&mut self, session: &SessionId, answer: Answer) -> Result<WizardState, WizardError> {
        let step = self.current_step(session)?;
        self.planner.validate(&step, &answer)?;

        let entry = self.sessions.entry(session.clone()).or_default();
        entry.answers.insert(step.clone(), answer);
        if !entry.resolved.contains(&step) {
            entry.resolved.push(step.clone());
        }
        self.ledger.record(session, &step, false);

        Ok(self.move_next(session))
    }

    /// Decline an optional step.
    pub fn skip(&mut self, session: &SessionId, reason: &str) -> Result<WizardState, WizardError> {
        let step = self.current_step(session)?;
        if !self.catalog.is_optional(&step) {
            return Err(WizardError::NotSkippable { step });
        }

        debug!(session = %session, step = %step, reason, "Step skipped");
        let entry = self.sessions.entry(session.clone()).or_default();
        if !entry.resolved.contains(&step) {
            entry.resolved.push(step.clone());
        }
        self.ledger.record(session, &step, true);

        Ok(self.move_next(session))
    }

    /// Return to the most recently resolved step that is still active.
    ///
    /// The ledger is left untouched so numbering stays stable.
    pub fn back(&mut self, session: &SessionId) -> Result<WizardState, WizardError> {
        let current = self.current_step(session)?;
        let Some(entry) = self.sessions.get_mut(session) else {
            return Ok(WizardState::Step(current));
        };

        let previous = entry
            .resolved
            .iter()
            .rposition(|s| s != &current && self.planner.is_active(s, &entry.answers));
        let Some(idx) = previous else {
            return Ok(WizardState::Step(current));
        };

        let step = entry.resolved.remove(idx);
        debug!(session = %session, from = %current, to = %step, "Wizard went back");
        let state = WizardState::Step(step);
        entry.state = Some(state.clone());
        Ok(state)
    }

    /// Abort the session and release its ledger.
    pub fn abort(&mut self, session: &SessionId) -> WizardState {
        let entry = self.sessions.entry(session.clone()).or_default();
        entry.state = Some(WizardState::Aborted);
        self.ledger.clear(session);
        info!(session = %session, "Wizard session aborted");
        WizardState::Aborted
    }

    /// Forget a session entirely (idle expiry, after a finished listing was
    /// handed off).
    pub fn remove(&mut self, session: &SessionId) -> Option<Answers> {
        self.ledger.clear(session);
        self.sessions.remove(session).map(|s| s.answers)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Displayed number of `step` for this session.
    pub fn display_number(&self, session: &SessionId, step: &StepId) -> Result<DisplayNumber, WizardError> {
        StepNumberResolver::new(&self.catalog).display_number(step, &self.projected_visits(session))
    }

    /// Displayed number of the final active step.
    pub fn total(&self, session: &SessionId) -> Result<u32, WizardError> {
        let active = self.active_steps(session);
        let Some(last) = self.catalog.order().iter().rev().find(|s| active.contains(*s)) else {
            return Ok(0);
        };
        let resolver = StepNumberResolver::new(&self.catalog);
        Ok(resolver.display_number(last, &self.projected_visits(session))?.number)
    }

    /// Re-plan the session from its current answers, moving off a step the
    /// branch plan no longer includes.
    pub fn resume(&mut self, session: &SessionId) -> WizardState {
        self.move_next(session)
    }

    /// Human-readable prompt for `step` in `language`.
    pub fn label(
        &self,
        session: &SessionId,
        step: &StepId,
        templates: &dyn LabelTemplates,
        language: &str,
    ) -> Result<String, WizardError> {
        self.catalog.position_of(step)?;
        let empty = Answers::new();
        let answers = self.answers(session).unwrap_or(&empty);
        if !self.planner.is_active(step, answers) {
            return Err(WizardError::InactiveStep { step: step.clone() });
        }

        let number = self.display_number(session, step)?;
        let total = self.total(session)?;
        Ok(render(templates.resolve(language, step), number, total))
    }

    /// The session's ledger as the resolver should see it: every step the
    /// current answers exclude counts as skipped, whatever was recorded for
    /// it earlier. Branch decisions are derived here and never written to
    /// the ledger.
    fn projected_visits(&self, session: &SessionId) -> Vec<StepVisit> {
        let active = self.active_steps(session);
        let visits = self.ledger.visits_for(session);

        let mut projected: Vec<StepVisit> = visits
            .iter()
            .map(|visit| StepVisit {
                skipped: visit.skipped || !active.contains(&visit.step),
                ..visit.clone()
            })
            .collect();
        let now = Utc::now();
        for step in self.catalog.order() {
            if !active.contains(step) && self.ledger.visit(session, step).is_none() {
                projected.push(StepVisit {
                    step: step.clone(),
                    skipped: true,
                    visited_at: now,
                });
            }
        }
        projected
    }

    /// Current step of a session, starting it if this is the first event.
    fn current_step(&mut self, session: &SessionId) -> Result<StepId, WizardError> {
        let state = match self.current(session).cloned() {
            Some(state) => state,
            None => self.start(session),
        };
        match state {
            WizardState::Step(step) => Ok(step),
            WizardState::Completed | WizardState::Aborted => Err(WizardError::SessionFinished {
                session: session.clone(),
            }),
        }
    }

    /// Move to the first active step the vendor has not resolved.
    fn move_next(&mut self, session: &SessionId) -> WizardState {
        let entry = self.sessions.entry(session.clone()).or_default();
        let active = self.planner.active_steps(&self.catalog, &entry.answers);
        let order = self.catalog.order();

        let next = order
            .iter()
            .position(|s| active.contains(s) && !entry.resolved.contains(s));

        let state = match next {
            Some(idx) => WizardState::Step(order[idx].clone()),
            None => {
                self.ledger.clear(session);
                info!(session = %session, answers = entry.answers.len(), "Wizard session completed");
                WizardState::Completed
            }
        };
        entry.state = Some(state.clone());
        state
    }
}

impl std::fmt::Debug for WizardController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardController")
            .field("steps", &self.catalog.order().len())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

/// Log a rejected event at the level its severity warrants.
pub(crate) fn log_rejection(session: &SessionId, err: &WizardError) {
    if err.is_fatal() {
        tracing::error!(session = %session, error = %err, "Wizard configuration error");
    } else {
        warn!(session = %session, error = %err, "Wizard event rejected");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::wizard::catalog::steps;
    use crate::wizard::catalog::tests::scenario_catalog;
    use crate::wizard::planner::{Activation, FulfillmentService};
    use crate::wizard::templates::TemplateSet;

    fn scenario_controller() -> WizardController {
        let planner = BranchPlanner::new()
            .with_rule(
                "departments_delivery",
                Activation::ServiceEnabled(FulfillmentService::Delivery),
            )
            .with_rule(
                "countries_delivery",
                Activation::ServiceByCountry {
                    service: FulfillmentService::Delivery,
                    decided_at: "departments_delivery".into(),
                },
            );
        WizardController::new(Arc::new(scenario_catalog()), Arc::new(planner)).unwrap()
    }

    fn services(list: &[FulfillmentService]) -> Answer {
        Answer::Services(list.iter().copied().collect::<BTreeSet<_>>())
    }

    fn text(s: &str) -> Answer {
        Answer::Text(s.to_string())
    }

    /// Drive a session to the end, returning `(step, label number)` pairs.
    fn run(controller: &mut WizardController, session: &SessionId, delivery: bool) -> Vec<(String, String)> {
        let mut seen = Vec::new();
        let mut state = controller.start(session);
        while let WizardState::Step(step) = state.clone() {
            let number = controller.display_number(session, &step).unwrap();
            seen.push((step.to_string(), number.to_string()));
            let answer = match step.as_str() {
                "service_selection" if delivery => services(&[FulfillmentService::Delivery]),
                "service_selection" => services(&[FulfillmentService::Meetup]),
                "departments_delivery" => Answer::ByCountry,
                "countries_delivery" => Answer::Countries(vec!["CO".into()]),
                "confirmation" => Answer::Confirmed,
                _ => text("x"),
            };
            state = controller.advance(session, answer).unwrap();
        }
        assert_eq!(state, WizardState::Completed);
        seen
    }

    #[test]
    fn delivery_session_sees_grouped_numbering() {
        let mut controller = scenario_controller();
        let session = SessionId::from("vendor-1");
        let seen = run(&mut controller, &session, true);

        let expected = [
            ("name", "1"),
            ("telegram", "2"),
            ("telegram_channel", "2b"),
            ("photo", "3"),
            ("service_selection", "4"),
            ("departments_delivery", "5"),
            ("countries_delivery", "5b"),
            ("confirmation", "6"),
        ];
        let expected: Vec<_> = expected
            .iter()
            .map(|(s, n)| (s.to_string(), n.to_string()))
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn session_without_delivery_never_sees_delivery_steps() {
        let mut controller = scenario_controller();
        let session = SessionId::from("vendor-2");
        let seen = run(&mut controller, &session, false);

        let steps: Vec<_> = seen.iter().map(|(s, _)| s.as_str()).collect();
        assert!(!steps.contains(&"departments_delivery"));
        assert!(!steps.contains(&"countries_delivery"));

        let numbers: Vec<_> = seen.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(numbers, ["1", "2", "2b", "3", "4", "5"]);
    }

    #[test]
    fn initial_state_is_first_active_step() {
        let mut controller = scenario_controller();
        let session = SessionId::from("s");
        assert_eq!(controller.start(&session), WizardState::Step("name".into()));
        // Starting again resumes rather than resetting
        controller.advance(&session, text("Tienda")).unwrap();
        assert_eq!(controller.start(&session), WizardState::Step("telegram".into()));
    }

    #[test]
    fn advance_lazily_starts_session() {
        let mut controller = scenario_controller();
        let session = SessionId::from("lazy");
        let state = controller.advance(&session, text("Tienda")).unwrap();
        assert_eq!(state, WizardState::Step("telegram".into()));
        assert_eq!(controller.answers(&session).unwrap().len(), 1);
    }

    #[test]
    fn skip_optional_step_consumes_no_numeral() {
        let mut controller = scenario_controller();
        let session = SessionId::from("s");
        controller.start(&session);
        controller.advance(&session, text("Tienda")).unwrap();
        controller.advance(&session, text("@tienda")).unwrap();
        controller.skip(&session, "no channel").unwrap();

        // photo is also optional
        let state = controller.skip(&session, "no logo").unwrap();
        assert_eq!(state, WizardState::Step("service_selection".into()));

        // telegram group still live through `telegram`; photo consumed nothing
        let number = controller.display_number(&session, &"service_selection".into()).unwrap();
        assert_eq!(number, DisplayNumber::new(3));
        assert!(controller.ledger().visit(&session, &"photo".into()).unwrap().skipped);
    }

    #[test]
    fn required_step_cannot_be_skipped() {
        let mut controller = scenario_controller();
        let session = SessionId::from("s");
        controller.start(&session);
        let err = controller.skip(&session, "lazy").unwrap_err();
        assert!(matches!(err, WizardError::NotSkippable { ref step } if step == "name"));
        assert!(!err.is_fatal());
        assert_eq!(controller.current(&session), Some(&WizardState::Step("name".into())));
    }

    #[test]
    fn back_keeps_ledger_and_resumes_where_left() {
        let mut controller = scenario_controller();
        let session = SessionId::from("s");
        controller.start(&session);
        controller.advance(&session, text("Tienda")).unwrap();
        controller.advance(&session, text("@tienda")).unwrap();
        let visits_before = controller.ledger().visits_for(&session).to_vec();

        let state = controller.back(&session).unwrap();
        assert_eq!(state, WizardState::Step("telegram".into()));
        assert_eq!(controller.ledger().visits_for(&session), visits_before.as_slice());

        let state = controller.advance(&session, text("@tienda_co")).unwrap();
        assert_eq!(state, WizardState::Step("telegram_channel".into()));
        let answers = controller.answers(&session).unwrap();
        assert_eq!(answers.get(&"telegram".into()), Some(&text("@tienda_co")));
    }

    #[test]
    fn back_at_first_step_stays_put() {
        let mut controller = scenario_controller();
        let session = SessionId::from("s");
        controller.start(&session);
        assert_eq!(controller.back(&session).unwrap(), WizardState::Step("name".into()));
    }

    #[test]
    fn abort_clears_ledger_and_rejects_further_events() {
        let mut controller = scenario_controller();
        let session = SessionId::from("s");
        controller.start(&session);
        controller.advance(&session, text("Tienda")).unwrap();

        assert_eq!(controller.abort(&session), WizardState::Aborted);
        assert!(controller.ledger().visits_for(&session).is_empty());

        let err = controller.advance(&session, text("again")).unwrap_err();
        assert!(matches!(err, WizardError::SessionFinished { .. }));

        // An explicit start begins a fresh run
        assert_eq!(controller.start(&session), WizardState::Step("name".into()));
        assert!(controller.answers(&session).unwrap().is_empty());
    }

    #[test]
    fn completion_clears_ledger_but_keeps_answers() {
        let mut controller = scenario_controller();
        let session = SessionId::from("s");
        run(&mut controller, &session, true);
        assert!(controller.ledger().visits_for(&session).is_empty());
        assert_eq!(controller.current(&session), Some(&WizardState::Completed));

        let answers = controller.remove(&session).unwrap();
        assert!(answers.contains(&"confirmation".into()));
        assert_eq!(controller.session_count(), 0);
    }

    #[test]
    fn conflicting_services_are_rejected_and_reprompted() {
        let catalog = Arc::new(StepCatalog::listing().unwrap());
        let mut controller = WizardController::new(catalog, Arc::new(BranchPlanner::listing())).unwrap();
        let session = SessionId::from("s");
        controller.start(&session);
        for answer in ["Tienda", "@tienda"] {
            controller.advance(&session, text(answer)).unwrap();
        }
        for _ in 0..4 {
            controller.skip(&session, "none").unwrap();
        }
        let state = controller
            .advance(&session, Answer::Countries(vec!["CO".into()]))
            .unwrap();
        assert_eq!(state, WizardState::Step(steps::SERVICE_SELECTION.into()));

        let err = controller
            .advance(
                &session,
                services(&[FulfillmentService::Postal, FulfillmentService::Delivery]),
            )
            .unwrap_err();
        assert!(matches!(err, WizardError::InvalidAnswer { .. }));
        assert_eq!(
            controller.current(&session),
            Some(&WizardState::Step(steps::SERVICE_SELECTION.into()))
        );

        let state = controller
            .advance(&session, services(&[FulfillmentService::Postal]))
            .unwrap();
        assert_eq!(state, WizardState::Step(steps::POSTAL_SHIPPING.into()));
        // name 1, telegram 2, skipped channel/instagram/website/photo, countries 3,
        // services 4, delivery and meetup groups skipped
        let number = controller
            .display_number(&session, &steps::POSTAL_SHIPPING.into())
            .unwrap();
        assert_eq!(number, DisplayNumber::new(5));
        let number = controller
            .display_number(&session, &steps::POSTAL_COUNTRIES.into())
            .unwrap();
        assert_eq!(number, DisplayNumber::with_suffix(5, 'b'));
        assert_eq!(controller.total(&session).unwrap(), 6);
    }

    #[test]
    fn changing_services_after_back_renumbers_without_gaps() {
        let catalog = Arc::new(StepCatalog::listing().unwrap());
        let mut controller = WizardController::new(catalog, Arc::new(BranchPlanner::listing())).unwrap();
        let templates = TemplateSet::builtin();
        let session = SessionId::from("s");
        let label = |controller: &WizardController, step: &str| {
            controller
                .label(&session, &step.into(), &templates, "en")
                .unwrap()
        };

        controller.start(&session);
        for answer in ["Tienda", "@tienda"] {
            controller.advance(&session, text(answer)).unwrap();
        }
        for _ in 0..4 {
            controller.skip(&session, "none").unwrap();
        }
        controller
            .advance(&session, Answer::Countries(vec!["CO".into()]))
            .unwrap();
        controller
            .advance(&session, services(&[FulfillmentService::Delivery]))
            .unwrap();
        let state = controller
            .advance(&session, Answer::Departments(vec!["Antioquia".into()]))
            .unwrap();
        assert_eq!(state, WizardState::Step(steps::CONFIRMATION.into()));
        assert!(label(&controller, steps::CONFIRMATION).starts_with("Step 6 of 6:"));

        // Branch decisions never reach the ledger
        assert!(controller.ledger().visit(&session, &steps::DEPARTMENTS_MEETUP.into()).is_none());

        controller.back(&session).unwrap();
        let state = controller.back(&session).unwrap();
        assert_eq!(state, WizardState::Step(steps::SERVICE_SELECTION.into()));

        let state = controller
            .advance(&session, services(&[FulfillmentService::Meetup]))
            .unwrap();
        assert_eq!(state, WizardState::Step(steps::DEPARTMENTS_MEETUP.into()));
        let meetup = label(&controller, steps::DEPARTMENTS_MEETUP);
        assert!(meetup.starts_with("Step 5 of 6:"), "{meetup}");

        let state = controller
            .advance(&session, Answer::Departments(vec!["Antioquia".into()]))
            .unwrap();
        assert_eq!(state, WizardState::Step(steps::CONFIRMATION.into()));
        let confirmation = label(&controller, steps::CONFIRMATION);
        assert!(confirmation.starts_with("Step 6 of 6:"), "{confirmation}");
    }

    #[test]
    fn label_renders_number_and_total() {
        let mut controller = scenario_controller();
        let templates = TemplateSet::builtin();
        let session = SessionId::from("s");
        controller.start(&session);
        controller.advance(&session, text("Tienda")).unwrap();

        let label = controller
            .label(&session, &"telegram".into(), &templates, "en")
            .unwrap();
        // No services chosen yet: delivery steps projected as skipped
        assert!(label.starts_with("Step 2 of 5:"), "{label}");

        let label = controller
            .label(&session, &"telegram".into(), &templates, "es")
            .unwrap();
        assert!(label.starts_with("Paso 2 de 5:"), "{label}");
    }

    #[test]
    fn label_for_inactive_or_unknown_step() {
        let mut controller = scenario_controller();
        let templates = TemplateSet::builtin();
        let session = SessionId::from("s");
        controller.start(&session);

        let err = controller
            .label(&session, &"countries_delivery".into(), &templates, "en")
            .unwrap_err();
        assert!(matches!(err, WizardError::InactiveStep { .. }));
        assert!(!err.is_fatal());

        let err = controller
            .label(&session, &"nonexistent".into(), &templates, "en")
            .unwrap_err();
        assert!(matches!(err, WizardError::UnknownStep { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn controller_rejects_planner_for_other_catalog() {
        let planner = BranchPlanner::listing();
        let err = WizardController::new(Arc::new(scenario_catalog()), Arc::new(planner)).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownGatedStep { .. }));
    }
}
