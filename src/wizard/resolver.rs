//! Step number resolver — turns a logical step plus a session's ledger
//! into the numeral shown to the vendor ("Step 5", "Step 2b").

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::catalog::{StepCatalog, StepId};
use super::ledger::StepVisit;
use crate::error::WizardError;

/// Displayed step number with an optional sub-letter for later members of
/// a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayNumber {
    pub number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<char>,
}

impl DisplayNumber {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            suffix: None,
        }
    }

    pub fn with_suffix(number: u32, suffix: char) -> Self {
        Self {
            number,
            suffix: Some(suffix),
        }
    }
}

impl std::fmt::Display for DisplayNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.suffix {
            Some(suffix) => write!(f, "{}{}", self.number, suffix),
            None => write!(f, "{}", self.number),
        }
    }
}

/// Pure numbering over a shared catalog.
#[derive(Debug, Clone, Copy)]
pub struct StepNumberResolver<'a> {
    catalog: &'a StepCatalog,
}

impl<'a> StepNumberResolver<'a> {
    pub fn new(catalog: &'a StepCatalog) -> Self {
        Self { catalog }
    }

    /// Displayed number of `step` given a session's visits.
    ///
    /// Walking the catalog in order, a singleton step consumes a numeral
    /// unless it was recorded as skipped; a group consumes one numeral for
    /// all of its members as long as at least one member is not recorded
    /// as skipped. A step with no record counts as not skipped.
    pub fn display_number(
        &self,
        step: &StepId,
        visits: &[StepVisit],
    ) -> Result<DisplayNumber, WizardError> {
        self.catalog.position_of(step)?;

        let mut skipped: HashMap<&StepId, bool> = HashMap::with_capacity(visits.len());
        for visit in visits {
            if !self.catalog.contains(&visit.step) {
                return Err(WizardError::UnknownStep {
                    step: visit.step.clone(),
                });
            }
            skipped.entry(&visit.step).or_insert(visit.skipped);
        }
        let is_skipped = |s: &StepId| skipped.get(s).copied().unwrap_or(false);

        let mut counter: u32 = 0;
        let mut counted_groups: BTreeSet<u32> = BTreeSet::new();

        for current in self.catalog.order() {
            if current == step {
                break;
            }
            match self.catalog.is_grouped(current) {
                Some(group) => {
                    if counted_groups.contains(&group) {
                        continue;
                    }
                    let live = self
                        .catalog
                        .group_members(group)
                        .any(|member| !is_skipped(member));
                    if live {
                        counted_groups.insert(group);
                        counter += 1;
                    }
                }
                None => {
                    if !is_skipped(current) {
                        counter += 1;
                    }
                }
            }
        }

        let group = self.catalog.is_grouped(step);
        let already_counted = group.is_some_and(|g| counted_groups.contains(&g));
        let number = if already_counted { counter } else { counter + 1 };

        let suffix = self
            .catalog
            .member_index(step)
            .filter(|idx| *idx > 0)
            .and_then(|idx| u8::try_from(idx).ok())
            .and_then(|idx| b'a'.checked_add(idx))
            .map(char::from);

        Ok(DisplayNumber { number, suffix })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::wizard::catalog::tests::scenario_catalog;

    fn visit(step: &str, skipped: bool) -> StepVisit {
        StepVisit {
            step: step.into(),
            skipped,
            visited_at: Utc::now(),
        }
    }

    fn label(catalog: &StepCatalog, step: &str, visits: &[StepVisit]) -> String {
        StepNumberResolver::new(catalog)
            .display_number(&step.into(), visits)
            .unwrap()
            .to_string()
    }

    #[test]
    fn delivery_session_numbering() {
        let catalog = scenario_catalog();
        let visits: Vec<_> = catalog.order().iter().map(|s| visit(s.as_str(), false)).collect();

        let labels: Vec<_> = catalog
            .order()
            .iter()
            .map(|s| label(&catalog, s.as_str(), &visits))
            .collect();
        assert_eq!(labels, ["1", "2", "2b", "3", "4", "5", "5b", "6"]);
    }

    #[test]
    fn inactive_delivery_group_consumes_no_numeral() {
        let catalog = scenario_catalog();
        let visits = vec![
            visit("name", false),
            visit("telegram", false),
            visit("telegram_channel", false),
            visit("photo", false),
            visit("service_selection", false),
            visit("departments_delivery", true),
            visit("countries_delivery", true),
        ];

        let shown: Vec<_> = [
            "name",
            "telegram",
            "telegram_channel",
            "photo",
            "service_selection",
            "confirmation",
        ]
        .into_iter()
        .map(|s| label(&catalog, s, &visits))
        .collect();
        assert_eq!(shown, ["1", "2", "2b", "3", "4", "5"]);
    }

    #[test]
    fn group_live_while_one_member_unskipped() {
        let catalog = scenario_catalog();
        // Department step skipped, country sub-step answered
        let visits = vec![
            visit("departments_delivery", true),
            visit("countries_delivery", false),
        ];
        assert_eq!(label(&catalog, "confirmation", &visits), "6");
    }

    #[test]
    fn group_without_records_is_counted() {
        let catalog = scenario_catalog();
        assert_eq!(label(&catalog, "confirmation", &[]), "6");
        assert_eq!(label(&catalog, "countries_delivery", &[]), "5b");
    }

    #[test]
    fn skipped_singleton_consumes_no_numeral() {
        let catalog = scenario_catalog();
        let visits = vec![visit("name", false), visit("photo", true)];
        assert_eq!(label(&catalog, "service_selection", &visits), "3");
    }

    #[test]
    fn first_record_wins_inside_resolver() {
        let catalog = scenario_catalog();
        let visits = vec![visit("photo", true), visit("photo", false)];
        assert_eq!(label(&catalog, "service_selection", &visits), "3");
    }

    #[test]
    fn unknown_step_is_an_error() {
        let catalog = scenario_catalog();
        let err = StepNumberResolver::new(&catalog)
            .display_number(&"nonexistent".into(), &[])
            .unwrap_err();
        assert!(matches!(err, WizardError::UnknownStep { ref step } if step == "nonexistent"));
        assert!(err.is_fatal());
    }

    #[test]
    fn ledger_with_unknown_step_is_an_error() {
        let catalog = scenario_catalog();
        let err = StepNumberResolver::new(&catalog)
            .display_number(&"photo".into(), &[visit("ghost", false)])
            .unwrap_err();
        assert!(matches!(err, WizardError::UnknownStep { ref step } if step == "ghost"));
    }

    #[test]
    fn no_skips_increase_by_one() {
        let catalog = StepCatalog::listing().unwrap();
        let resolver = StepNumberResolver::new(&catalog);

        let mut previous: Option<DisplayNumber> = None;
        for step in catalog.order() {
            let current = resolver.display_number(step, &[]).unwrap();
            if let Some(prev) = previous {
                if current.suffix.is_some() {
                    assert_eq!(current.number, prev.number, "{step} shares its group numeral");
                } else {
                    assert_eq!(current.number, prev.number + 1, "{step} should follow {prev}");
                }
            } else {
                assert_eq!(current, DisplayNumber::new(1));
            }
            previous = Some(current);
        }
    }

    #[test]
    fn display_number_serializes_compactly() {
        let json = serde_json::to_value(DisplayNumber::with_suffix(14, 'b')).unwrap();
        assert_eq!(json["number"], 14);
        assert_eq!(json["suffix"], "b");

        let json = serde_json::to_value(DisplayNumber::new(3)).unwrap();
        assert!(json.get("suffix").is_none());
    }
}
