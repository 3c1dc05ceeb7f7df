//! Turns free text from a chat into wizard input for the step being asked.

use std::collections::BTreeSet;

use tracing::debug;

use crate::wizard::catalog::steps;
use crate::wizard::{Answer, FulfillmentService, UserInput, WizardState};

/// Interpret `text` as a command or as the answer to the session's current
/// step. Free text with no session yet starts one. Free text after the
/// session finished is passed through so the service can say so.
pub fn parse_input(state: Option<&WizardState>, text: &str) -> UserInput {
    let text = text.trim();

    if let Some(command) = text.strip_prefix('/') {
        let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
        match name.to_lowercase().as_str() {
            "start" => return UserInput::Start,
            "back" => return UserInput::Back,
            "cancel" => return UserInput::Cancel,
            "skip" => {
                let reason = if rest.trim().is_empty() {
                    "declined".to_string()
                } else {
                    rest.trim().to_string()
                };
                return UserInput::Skip { reason };
            }
            _ => {}
        }
    }

    let step = match state {
        None => return UserInput::Start,
        Some(WizardState::Step(step)) => step,
        Some(WizardState::Completed | WizardState::Aborted) => {
            return UserInput::Answer(Answer::Text(text.to_string()));
        }
    };

    let answer = match step.as_str() {
        steps::SERVICE_SELECTION => Answer::Services(parse_services(text)),
        steps::WORKING_COUNTRIES
        | steps::COUNTRIES_DELIVERY
        | steps::COUNTRIES_MEETUP
        | steps::POSTAL_COUNTRIES => Answer::Countries(split_list(text, true)),
        steps::DEPARTMENTS_DELIVERY | steps::DEPARTMENTS_MEETUP => {
            if is_by_country(text) {
                Answer::ByCountry
            } else {
                Answer::Departments(split_list(text, false))
            }
        }
        steps::PHOTO => Answer::Photo(text.to_string()),
        steps::CONFIRMATION => match text.to_lowercase().as_str() {
            "no" | "back" => return UserInput::Back,
            _ => Answer::Confirmed,
        },
        _ => Answer::Text(text.to_string()),
    };
    UserInput::Answer(answer)
}

fn split_list(text: &str, uppercase: bool) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| if uppercase { s.to_uppercase() } else { s.to_string() })
        .collect()
}

fn parse_services(text: &str) -> BTreeSet<FulfillmentService> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(service) => Some(service),
            Err(e) => {
                debug!(input = s, error = %e, "Ignoring unrecognised service");
                None
            }
        })
        .collect()
}

fn is_by_country(text: &str) -> bool {
    matches!(
        text.to_lowercase().as_str(),
        "country" | "countries" | "by country" | "whole country" | "whole countries"
    )
}
