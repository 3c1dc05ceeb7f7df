//! Step catalog — the fixed logical order of wizard steps and the grouping
//! table that decides which steps share a displayed numeral.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, WizardError};

/// Identifier of one logical wizard step, e.g. `"telegram_channel"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl PartialEq<str> for StepId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Step identifiers of the built-in vendor listing catalog.
pub mod steps {
    pub const NAME: &str = "name";
    pub const TELEGRAM: &str = "telegram";
    pub const TELEGRAM_CHANNEL: &str = "telegram_channel";
    pub const INSTAGRAM: &str = "instagram";
    pub const WEBSITE: &str = "website";
    pub const PHOTO: &str = "photo";
    pub const WORKING_COUNTRIES: &str = "working_countries";
    pub const SERVICE_SELECTION: &str = "service_selection";
    pub const DEPARTMENTS_DELIVERY: &str = "departments_delivery";
    pub const COUNTRIES_DELIVERY: &str = "countries_delivery";
    pub const DEPARTMENTS_MEETUP: &str = "departments_meetup";
    pub const COUNTRIES_MEETUP: &str = "countries_meetup";
    pub const POSTAL_SHIPPING: &str = "postal_shipping";
    pub const POSTAL_COUNTRIES: &str = "postal_countries";
    pub const CONFIRMATION: &str = "confirmation";
}

/// Serialisable catalog definition, e.g. loaded from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDefinition {
    pub order: Vec<StepId>,
    #[serde(default)]
    pub groups: BTreeMap<StepId, u32>,
    #[serde(default)]
    pub optional: BTreeSet<StepId>,
}

/// Immutable, process-wide step catalog.
///
/// Shared by every session behind an `Arc`; there are no mutation
/// operations after construction.
#[derive(Debug, Clone)]
pub struct StepCatalog {
    order: Vec<StepId>,
    positions: HashMap<StepId, usize>,
    groups: BTreeMap<StepId, u32>,
    optional: BTreeSet<StepId>,
}

impl StepCatalog {
    /// Build a catalog, validating that every grouped or optional step is
    /// part of `order` and that `order` has no duplicates.
    pub fn new(
        order: Vec<StepId>,
        groups: BTreeMap<StepId, u32>,
        optional: BTreeSet<StepId>,
    ) -> Result<Self, CatalogError> {
        if order.is_empty() {
            return Err(CatalogError::EmptyCatalog);
        }

        let mut positions = HashMap::with_capacity(order.len());
        for (idx, step) in order.iter().enumerate() {
            if positions.insert(step.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateStep { step: step.clone() });
            }
        }

        if let Some(step) = groups.keys().find(|s| !positions.contains_key(*s)) {
            return Err(CatalogError::UnknownGroupedStep { step: step.clone() });
        }
        if let Some(step) = optional.iter().find(|s| !positions.contains_key(*s)) {
            return Err(CatalogError::UnknownOptionalStep { step: step.clone() });
        }

        Ok(Self {
            order,
            positions,
            groups,
            optional,
        })
    }

    pub fn from_definition(def: CatalogDefinition) -> Result<Self, CatalogError> {
        Self::new(def.order, def.groups, def.optional)
    }

    /// Load a JSON catalog definition from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Load(format!("{}: {e}", path.display())))?;
        let def: CatalogDefinition = serde_json::from_str(&raw)
            .map_err(|e| CatalogError::Load(format!("{}: {e}", path.display())))?;
        Self::from_definition(def)
    }

    /// The vendor listing catalog used by the directory bot.
    pub fn listing() -> Result<Self, CatalogError> {
        use steps::*;

        let order = [
            NAME,
            TELEGRAM,
            TELEGRAM_CHANNEL,
            INSTAGRAM,
            WEBSITE,
            PHOTO,
            WORKING_COUNTRIES,
            SERVICE_SELECTION,
            DEPARTMENTS_DELIVERY,
            COUNTRIES_DELIVERY,
            DEPARTMENTS_MEETUP,
            COUNTRIES_MEETUP,
            POSTAL_SHIPPING,
            POSTAL_COUNTRIES,
            CONFIRMATION,
        ];
        let groups = [
            (TELEGRAM, 2),
            (TELEGRAM_CHANNEL, 2),
            (DEPARTMENTS_DELIVERY, 14),
            (COUNTRIES_DELIVERY, 14),
            (DEPARTMENTS_MEETUP, 15),
            (COUNTRIES_MEETUP, 15),
            (POSTAL_SHIPPING, 16),
            (POSTAL_COUNTRIES, 16),
        ];
        let optional = [TELEGRAM_CHANNEL, INSTAGRAM, WEBSITE, PHOTO];

        let def = CatalogDefinition {
            order: order.into_iter().map(StepId::from).collect(),
            groups: groups
                .into_iter()
                .map(|(s, g)| (StepId::from(s), g))
                .collect(),
            optional: optional.into_iter().map(StepId::from).collect(),
        };
        Self::from_definition(def)
    }

    /// Steps in logical order.
    pub fn order(&self) -> &[StepId] {
        &self.order
    }

    pub fn groups(&self) -> &BTreeMap<StepId, u32> {
        &self.groups
    }

    pub fn contains(&self, step: &StepId) -> bool {
        self.positions.contains_key(step)
    }

    /// Group number of `step`, or `None` for a singleton step.
    pub fn is_grouped(&self, step: &StepId) -> Option<u32> {
        self.groups.get(step).copied()
    }

    pub fn is_optional(&self, step: &StepId) -> bool {
        self.optional.contains(step)
    }

    /// Index of `step` in the logical order.
    pub fn position_of(&self, step: &StepId) -> Result<usize, WizardError> {
        self.positions
            .get(step)
            .copied()
            .ok_or_else(|| WizardError::UnknownStep { step: step.clone() })
    }

    /// Members of `group` in catalog order.
    pub fn group_members(&self, group: u32) -> impl Iterator<Item = &StepId> {
        self.order
            .iter()
            .filter(move |s| self.groups.get(*s) == Some(&group))
    }

    /// Position of `step` within its group (0 for the first member), or
    /// `None` for a singleton step.
    pub fn member_index(&self, step: &StepId) -> Option<usize> {
        let group = self.is_grouped(step)?;
        self.group_members(group).position(|s| s == step)
    }
}
