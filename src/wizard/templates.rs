//! Per-language prompt templates for step labels.
//!
//! Templates may reference `{number}` (e.g. "5b") and `{total}`.

use std::collections::HashMap;

use super::catalog::{steps, StepId};
use super::resolver::DisplayNumber;

/// Source of label templates, keyed by language and step.
pub trait LabelTemplates: Send + Sync {
    fn template(&self, language: &str, step: &StepId) -> Option<&str>;

    /// Language tried when `language` has no string for a step.
    fn fallback_language(&self) -> &str;

    /// Template for `step`, falling back to the default language and then
    /// to a generic "Step N of M".
    fn resolve(&self, language: &str, step: &StepId) -> &str {
        self.template(language, step)
            .or_else(|| self.template(self.fallback_language(), step))
            .unwrap_or(GENERIC_TEMPLATE)
    }
}

/// Template used when no language has a string for the step.
const GENERIC_TEMPLATE: &str = "Step {number} of {total}";

/// Fill a template's placeholders.
pub fn render(template: &str, number: DisplayNumber, total: u32) -> String {
    template
        .replace("{number}", &number.to_string())
        .replace("{total}", &total.to_string())
}

/// In-memory template table with a fallback language.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    fallback_language: String,
    strings: HashMap<String, HashMap<StepId, String>>,
}

impl TemplateSet {
    pub fn new(fallback_language: impl Into<String>) -> Self {
        Self {
            fallback_language: fallback_language.into(),
            strings: HashMap::new(),
        }
    }

    pub fn insert(&mut self, language: &str, step: impl Into<StepId>, template: &str) {
        self.strings
            .entry(language.to_string())
            .or_default()
            .insert(step.into(), template.to_string());
    }

    /// English and Spanish prompts for the listing catalog.
    pub fn builtin() -> Self {
        let mut set = Self::new("en");

        let en = [
            (steps::NAME, "Step {number} of {total}: What is the name of your shop?"),
            (steps::TELEGRAM, "Step {number} of {total}: Send your Telegram contact (@username)."),
            (steps::TELEGRAM_CHANNEL, "Step {number} of {total}: Do you have a Telegram channel? Send its link or skip."),
            (steps::INSTAGRAM, "Step {number} of {total}: Send your Instagram handle or skip."),
            (steps::WEBSITE, "Step {number} of {total}: Send your website or skip."),
            (steps::PHOTO, "Step {number} of {total}: Upload your logo or skip."),
            (steps::WORKING_COUNTRIES, "Step {number} of {total}: Which countries do you work in?"),
            (steps::SERVICE_SELECTION, "Step {number} of {total}: How do you serve customers? (delivery, meetup, postal)"),
            (steps::DEPARTMENTS_DELIVERY, "Step {number} of {total}: Which departments do you deliver to? Or choose whole countries."),
            (steps::COUNTRIES_DELIVERY, "Step {number} of {total}: Which countries do you deliver to?"),
            (steps::DEPARTMENTS_MEETUP, "Step {number} of {total}: In which departments can customers meet you? Or choose whole countries."),
            (steps::COUNTRIES_MEETUP, "Step {number} of {total}: In which countries do you offer meetups?"),
            (steps::POSTAL_SHIPPING, "Step {number} of {total}: Which postal carriers do you ship with?"),
            (steps::POSTAL_COUNTRIES, "Step {number} of {total}: Which countries do you ship to?"),
            (steps::CONFIRMATION, "Step {number} of {total}: Review your listing and confirm."),
        ];
        let es = [
            (steps::NAME, "Paso {number} de {total}: ¿Cuál es el nombre de tu tienda?"),
            (steps::TELEGRAM, "Paso {number} de {total}: Envía tu contacto de Telegram (@usuario)."),
            (steps::TELEGRAM_CHANNEL, "Paso {number} de {total}: ¿Tienes un canal de Telegram? Envía el enlace u omite."),
            (steps::INSTAGRAM, "Paso {number} de {total}: Envía tu usuario de Instagram u omite."),
            (steps::WEBSITE, "Paso {number} de {total}: Envía tu sitio web u omite."),
            (steps::PHOTO, "Paso {number} de {total}: Sube tu logo u omite."),
            (steps::WORKING_COUNTRIES, "Paso {number} de {total}: ¿En qué países trabajas?"),
            (steps::SERVICE_SELECTION, "Paso {number} de {total}: ¿Cómo atiendes a tus clientes? (domicilio, encuentro, envío)"),
            (steps::DEPARTMENTS_DELIVERY, "Paso {number} de {total}: ¿A qué departamentos haces domicilios? O elige países completos."),
            (steps::COUNTRIES_DELIVERY, "Paso {number} de {total}: ¿A qué países haces domicilios?"),
            (steps::DEPARTMENTS_MEETUP, "Paso {number} de {total}: ¿En qué departamentos puedes encontrarte con clientes? O elige países completos."),
            (steps::COUNTRIES_MEETUP, "Paso {number} de {total}: ¿En qué países ofreces encuentros?"),
            (steps::POSTAL_SHIPPING, "Paso {number} de {total}: ¿Con qué transportadoras envías?"),
            (steps::POSTAL_COUNTRIES, "Paso {number} de {total}: ¿A qué países envías?"),
            (steps::CONFIRMATION, "Paso {number} de {total}: Revisa tu anuncio y confirma."),
        ];

        for (step, template) in en {
            set.insert("en", step, template);
        }
        for (step, template) in es {
            set.insert("es", step, template);
        }
        set
    }
}

impl LabelTemplates for TemplateSet {
    fn template(&self, language: &str, step: &StepId) -> Option<&str> {
        self.strings
            .get(language)
            .and_then(|table| table.get(step))
            .map(String::as_str)
    }

    fn fallback_language(&self) -> &str {
        &self.fallback_language
    }
}
