//! Branch planner — decides which steps exist for a session given the
//! answers collected so far.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::catalog::{steps, StepCatalog, StepId};
use crate::error::{CatalogError, WizardError};

/// How a listing reaches its customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentService {
    Delivery,
    Meetup,
    Postal,
}

impl std::fmt::Display for FulfillmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivery => write!(f, "delivery"),
            Self::Meetup => write!(f, "meetup"),
            Self::Postal => write!(f, "postal"),
        }
    }
}

impl std::str::FromStr for FulfillmentService {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "delivery" => Ok(Self::Delivery),
            "meetup" => Ok(Self::Meetup),
            "postal" | "post" | "shipping" => Ok(Self::Postal),
            other => Err(format!("unknown service '{other}'")),
        }
    }
}

/// A vendor's answer to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Text(String),
    Photo(String),
    Countries(Vec<String>),
    Services(BTreeSet<FulfillmentService>),
    Departments(Vec<String>),
    /// Serve whole countries instead of picking departments.
    ByCountry,
    Confirmed,
}

/// Answers collected so far, keyed by the step that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers(BTreeMap<StepId, Answer>);

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, step: StepId, answer: Answer) {
        self.0.insert(step, answer);
    }

    pub fn get(&self, step: &StepId) -> Option<&Answer> {
        self.0.get(step)
    }

    pub fn contains(&self, step: &StepId) -> bool {
        self.0.contains_key(step)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StepId, &Answer)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fulfillment services enabled by any service selection answer.
    pub fn services(&self) -> BTreeSet<FulfillmentService> {
        self.0
            .values()
            .filter_map(|a| match a {
                Answer::Services(s) => Some(s.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn has_service(&self, service: FulfillmentService) -> bool {
        self.services().contains(&service)
    }
}

/// When an optional step is part of a session's path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Always,
    ServiceEnabled(FulfillmentService),
    /// The service is enabled and the answer at `decided_at` chose to
    /// serve by country.
    ServiceByCountry {
        service: FulfillmentService,
        decided_at: StepId,
    },
}

impl Activation {
    fn holds(&self, answers: &Answers) -> bool {
        match self {
            Self::Always => true,
            Self::ServiceEnabled(service) => answers.has_service(*service),
            Self::ServiceByCountry {
                service,
                decided_at,
            } => {
                answers.has_service(*service)
                    && matches!(answers.get(decided_at), Some(Answer::ByCountry))
            }
        }
    }
}

/// Set of steps active for a session. Derived on demand, never stored.
pub type BranchDecision = BTreeSet<StepId>;

/// Predicate table for every conditional step. Steps without a rule are
/// core steps and always active.
#[derive(Debug, Clone, Default)]
pub struct BranchPlanner {
    rules: BTreeMap<StepId, Activation>,
    exclusive: Vec<(FulfillmentService, FulfillmentService)>,
}

impl BranchPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, step: impl Into<StepId>, activation: Activation) -> Self {
        self.rules.insert(step.into(), activation);
        self
    }

    /// Forbid enabling `a` and `b` in the same service selection.
    pub fn with_exclusive(mut self, a: FulfillmentService, b: FulfillmentService) -> Self {
        self.exclusive.push((a, b));
        self
    }

    /// Rules for the built-in listing catalog.
    pub fn listing() -> Self {
        use FulfillmentService::*;

        Self::new()
            .with_rule(steps::DEPARTMENTS_DELIVERY, Activation::ServiceEnabled(Delivery))
            .with_rule(
                steps::COUNTRIES_DELIVERY,
                Activation::ServiceByCountry {
                    service: Delivery,
                    decided_at: steps::DEPARTMENTS_DELIVERY.into(),
                },
            )
            .with_rule(steps::DEPARTMENTS_MEETUP, Activation::ServiceEnabled(Meetup))
            .with_rule(
                steps::COUNTRIES_MEETUP,
                Activation::ServiceByCountry {
                    service: Meetup,
                    decided_at: steps::DEPARTMENTS_MEETUP.into(),
                },
            )
            .with_rule(steps::POSTAL_SHIPPING, Activation::ServiceEnabled(Postal))
            .with_rule(steps::POSTAL_COUNTRIES, Activation::ServiceEnabled(Postal))
            .with_exclusive(Postal, Delivery)
            .with_exclusive(Postal, Meetup)
    }

    /// Ensure every gated step exists in `catalog`.
    pub fn check(&self, catalog: &StepCatalog) -> Result<(), CatalogError> {
        for (step, activation) in &self.rules {
            if !catalog.contains(step) {
                return Err(CatalogError::UnknownGatedStep { step: step.clone() });
            }
            if let Activation::ServiceByCountry { decided_at, .. } = activation {
                if !catalog.contains(decided_at) {
                    return Err(CatalogError::UnknownGatedStep {
                        step: decided_at.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn is_active(&self, step: &StepId, answers: &Answers) -> bool {
        self.rules
            .get(step)
            .map_or(true, |activation| activation.holds(answers))
    }

    /// Catalog steps on this session's effective path.
    pub fn active_steps(&self, catalog: &StepCatalog, answers: &Answers) -> BranchDecision {
        catalog
            .order()
            .iter()
            .filter(|s| self.is_active(s, answers))
            .cloned()
            .collect()
    }

    /// Reject answers that would put the session on an impossible path.
    pub fn validate(&self, step: &StepId, answer: &Answer) -> Result<(), WizardError> {
        let Answer::Services(services) = answer else {
            return Ok(());
        };

        if services.is_empty() {
            return Err(WizardError::InvalidAnswer {
                step: step.clone(),
                reason: "select at least one service".to_string(),
            });
        }

        if let Some((a, b)) = self
            .exclusive
            .iter()
            .find(|(a, b)| services.contains(a) && services.contains(b))
        {
            return Err(WizardError::InvalidAnswer {
                step: step.clone(),
                reason: format!("{a} and {b} cannot be offered together"),
            });
        }

        Ok(())
    }
}
