//! Ticket classification: category enum, label mapping, and the LLM-backed
//! classifier that produces category, short summary, and cleaned request text.
//!
//! Classification is total: an unrecognized or missing label (including a
//! failed generation) resolves to [`TicketCategory::Other`], never an error.

use serde::{Deserialize, Serialize};

use crate::llm::{parse_json_fragment, Generator};
use crate::pipeline::TicketContext;

/// Closed set of ticket categories. The string labels are the canonical
/// (German) forms the classifier prompt asks for and the dispatch payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketCategory {
    AiHistory,
    O365,
    Hardware,
    Login,
    Other,
}

impl TicketCategory {
    /// All members, for totality checks.
    pub const ALL: [TicketCategory; 5] = [
        TicketCategory::AiHistory,
        TicketCategory::O365,
        TicketCategory::Hardware,
        TicketCategory::Login,
        TicketCategory::Other,
    ];

    /// Canonical label as used in prompts and outbound payloads.
    pub fn label(self) -> &'static str {
        match self {
            TicketCategory::AiHistory => "Frage zur Historie von AI",
            TicketCategory::O365 => "O365 Frage",
            TicketCategory::Hardware => "Bestellung von Hardware",
            TicketCategory::Login => "Probleme bei der Anmeldung",
            TicketCategory::Other => "Sonstiges",
        }
    }

    /// Map a free-text label to a category. Case-insensitive exact match
    /// against the canonical labels; anything else is Other.
    pub fn from_label(raw: &str) -> TicketCategory {
        let raw = raw.trim();
        for category in TicketCategory::ALL {
            if category.label().eq_ignore_ascii_case(raw) {
                return category;
            }
        }
        TicketCategory::Other
    }

    /// Categories that produce an outbound ticket payload.
    pub fn is_dispatchable(self) -> bool {
        !matches!(self, TicketCategory::Other)
    }
}

const CLASSIFICATION_PROMPT: &str = "\
Du bist ein Service-Dispatcher. Analysiere die folgende Anfrage und ordne sie exakt einer der Kategorien zu:
- Frage zur Historie von AI
- O365 Frage
- Bestellung von Hardware
- Probleme bei der Anmeldung
- Sonstiges

Erstelle zusätzlich eine sehr kurze Zusammenfassung (weniger als 10 Wörter) sowie eine bereinigte Version der Anfrage ohne unnötige Grüße.

Gib deine Antwort ausschließlich als JSON mit folgendem Schema:
{
  \"category\": \"<Kategorie exakt wie oben>\",
  \"summary\": \"<max 9 Wörter>\",
  \"cleaned_request\": \"<bereinigter Klartext>\"
}";

/// Classifier output as produced (leniently) from the generator response.
/// Absent fields stay `None`; defaults are applied by [`classify`].
#[derive(Debug, Default, Deserialize)]
struct ParsedClassification {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    cleaned_request: Option<String>,
}

/// Cap a summary at nine whitespace-separated tokens.
pub fn enforce_summary_limit(summary: &str) -> String {
    let words: Vec<&str> = summary.split_whitespace().collect();
    if words.len() <= 9 {
        return summary.trim().to_string();
    }
    words[..9].join(" ")
}

/// Classify the request in `context`, filling category, summary, and cleaned
/// request text. Generation or parse failures degrade to category Other with
/// default texts; this function never fails.
pub async fn classify(generator: &dyn Generator, context: &mut TicketContext) {
    let payload = format!(
        "Name: {}\nVorname: {}\nE-Mail: {}\nAnfrage:\n{}",
        context.name.as_deref().unwrap_or(""),
        context.vorname.as_deref().unwrap_or(""),
        context.email.as_deref().unwrap_or(""),
        context.original_message
    );

    let parsed = match generator.generate(CLASSIFICATION_PROMPT, &payload).await {
        Ok(text) => parse_json_fragment::<ParsedClassification>(&text).unwrap_or_default(),
        Err(e) => {
            log::warn!("classify: generation failed: {}", e);
            ParsedClassification::default()
        }
    };

    let summary = parsed
        .summary
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Ticket".to_string());
    context.summary = Some(enforce_summary_limit(&summary));
    context.cleaned_request = Some(
        parsed
            .cleaned_request
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| context.original_message.clone()),
    );
    context.category = Some(
        parsed
            .category
            .map(|raw| TicketCategory::from_label(&raw))
            .unwrap_or(TicketCategory::Other),
    );
    log::debug!(
        "classify: category={:?} summary={:?}",
        context.category,
        context.summary
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_labels_map_to_themselves() {
        for category in TicketCategory::ALL {
            assert_eq!(TicketCategory::from_label(category.label()), category);
        }
    }

    #[test]
    fn label_match_is_case_insensitive() {
        assert_eq!(TicketCategory::from_label("o365 frage"), TicketCategory::O365);
        assert_eq!(
            TicketCategory::from_label("PROBLEME BEI DER ANMELDUNG"),
            TicketCategory::Login
        );
    }

    #[test]
    fn unknown_labels_resolve_to_other() {
        assert_eq!(TicketCategory::from_label(""), TicketCategory::Other);
        assert_eq!(TicketCategory::from_label("Netzwerk"), TicketCategory::Other);
        assert_eq!(
            TicketCategory::from_label("O365 Frage!"),
            TicketCategory::Other
        );
    }

    #[test]
    fn summary_is_capped_at_nine_tokens() {
        let long = "eins zwei drei vier fünf sechs sieben acht neun zehn elf";
        assert_eq!(
            enforce_summary_limit(long),
            "eins zwei drei vier fünf sechs sieben acht neun"
        );
        assert_eq!(enforce_summary_limit("  kurz  "), "kurz");
        let exactly_nine = "a b c d e f g h i";
        assert_eq!(enforce_summary_limit(exactly_nine), exactly_nine);
    }

    #[test]
    fn only_other_is_not_dispatchable() {
        for category in TicketCategory::ALL {
            assert_eq!(
                category.is_dispatchable(),
                category != TicketCategory::Other
            );
        }
    }
}
