//! Identity field extraction: pulls name / vorname / email out of free text.
//!
//! Layered, first hit per field wins:
//! 1. strict three-segment form ("Name, Vorname, E-Mail" with exactly one
//!    email-shaped segment),
//! 2. German label and phrase templates,
//! 3. delegated extraction via the text-generation collaborator.
//!
//! Extraction never fails; a field that cannot be derived stays `None`.
//! Email values are validated against the email shape after every layer and
//! discarded when invalid.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::llm::{parse_json_fragment, Generator};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("email pattern")
});

static EMAIL_EXACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").expect("email pattern")
});

static NAME_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:name|nachname|familienname)\s*[:\-]\s*([^\s,;][^,\n]*)")
        .expect("name label pattern")
});

static VORNAME_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bvorname\s*[:\-]\s*([^\s,;][^,\n]*)").expect("vorname label pattern")
});

static EMAIL_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:e-?mail)(?:-adresse)?\s*[:\-]\s*([^\s,;]+)").expect("email label pattern")
});

/// "mein Name ist Hans Müller", "ich heiße Hans Müller" — given name first.
static NAME_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:mein name ist|ich heiße|ich heisse)\s+([\p{L}'-]+)\s+([\p{L}'-]+)")
        .expect("name phrase pattern")
});

static EMAIL_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bmeine e-?mail(?:-adresse)?\s+(?:ist|lautet)\s+(\S+)")
        .expect("email phrase pattern")
});

const IDENTITY_PROMPT: &str = "\
Du bist ein Assistent, der Kontaktdaten aus Text extrahiert.

Extrahiere Name (Nachname), Vorname und E-Mail-Adresse aus dem gegebenen Text.

Gib ein JSON mit genau diesen Feldern zurück:
{
  \"name\": \"<Nachname>\",
  \"vorname\": \"<Vorname>\",
  \"email\": \"<E-Mail-Adresse>\"
}

Regeln:
- Wenn ein Feld nicht eindeutig identifiziert werden kann, lasse es leer (null oder leerer String)
- Verwende keine Erklärungen, nur das JSON
- Bei komma-getrennten Formaten: \"Name, Vorname, E-Mail\" → name=Name, vorname=Vorname, email=E-Mail
- Bei natürlicher Sprache: Extrahiere die Informationen so gut wie möglich";

/// Candidate identity values. `None` means not (yet) derived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFields {
    pub name: Option<String>,
    pub vorname: Option<String>,
    pub email: Option<String>,
}

impl IdentityFields {
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.vorname.is_some() && self.email.is_some()
    }

    /// Build from caller-supplied values. Blank or whitespace-only values
    /// count as absent, and the email passes the same shape validation as
    /// extracted ones.
    pub fn from_supplied(
        name: Option<String>,
        vorname: Option<String>,
        email: Option<String>,
    ) -> Self {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        Self {
            name: clean(name),
            vorname: clean(vorname),
            email: email.as_deref().and_then(validate_email),
        }
    }
}

/// Collaborator output for delegated extraction; explicit present/absent per field.
#[derive(Debug, Default, Deserialize)]
struct ParsedIdentity {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    vorname: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// First email-shaped substring in `text`, lowercased.
pub fn find_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|m| m.as_str().to_lowercase())
}

/// Validate a candidate email value; returns the embedded email lowercased,
/// or `None` when the value contains nothing email-shaped.
fn validate_email(value: &str) -> Option<String> {
    find_email(value)
}

/// Parse the strict three-segment form: exactly three comma-separated,
/// non-empty segments with exactly one email-shaped segment.
///
/// When the email is the third segment the first is the surname and the second
/// the given name. Otherwise the two non-email segments are assigned
/// surname-then-given-name in their original order, which can swap the names
/// for inputs like "hans@example.com, Müller, Hans". Known ambiguity, kept as
/// the source behavior.
pub fn parse_strict_form(text: &str) -> Option<IdentityFields> {
    let segments: Vec<&str> = text.split(',').map(str::trim).collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    let email_positions: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| EMAIL_EXACT.is_match(s))
        .map(|(i, _)| i)
        .collect();
    if email_positions.len() != 1 {
        return None;
    }
    let email_idx = email_positions[0];
    let names: Vec<&str> = segments
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != email_idx)
        .map(|(_, s)| *s)
        .collect();
    Some(IdentityFields {
        name: Some(names[0].to_string()),
        vorname: Some(names[1].to_string()),
        email: Some(segments[email_idx].to_lowercase()),
    })
}

fn captured(re: &Regex, text: &str, group: usize) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(group))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Template layer: German labels first, then phrases, then a bare email scan.
fn apply_templates(text: &str, fields: &mut IdentityFields) {
    if fields.name.is_none() {
        fields.name = captured(&NAME_LABEL, text, 1).or_else(|| captured(&NAME_PHRASE, text, 2));
    }
    if fields.vorname.is_none() {
        fields.vorname =
            captured(&VORNAME_LABEL, text, 1).or_else(|| captured(&NAME_PHRASE, text, 1));
    }
    if fields.email.is_none() {
        fields.email = captured(&EMAIL_LABEL, text, 1)
            .or_else(|| captured(&EMAIL_PHRASE, text, 1))
            .or_else(|| Some(text.to_string()))
            .and_then(|candidate| validate_email(&candidate));
    }
}

/// Best-effort extraction of the missing fields from `text`. Already-known
/// values are kept; layers only fill gaps. Never fails — a collaborator error
/// is logged and the fields collected so far are returned.
pub async fn extract_identity(
    generator: &dyn Generator,
    text: &str,
    mut fields: IdentityFields,
) -> IdentityFields {
    let text = text.trim();
    if fields.is_complete() {
        return fields;
    }

    if let Some(strict) = parse_strict_form(text) {
        fields.name = fields.name.or(strict.name);
        fields.vorname = fields.vorname.or(strict.vorname);
        fields.email = fields.email.or(strict.email);
        if fields.is_complete() {
            return fields;
        }
    }

    apply_templates(text, &mut fields);
    if fields.is_complete() {
        return fields;
    }

    let payload = format!(
        "Extrahiere Name, Vorname und E-Mail aus folgendem Text:\n\n{}",
        text
    );
    let parsed = match generator.generate(IDENTITY_PROMPT, &payload).await {
        Ok(response) => parse_json_fragment::<ParsedIdentity>(&response).unwrap_or_default(),
        Err(e) => {
            log::warn!("extract: delegated extraction failed: {}", e);
            ParsedIdentity::default()
        }
    };
    if fields.name.is_none() {
        fields.name = parsed
            .name
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    if fields.vorname.is_none() {
        fields.vorname = parsed
            .vorname
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    if fields.email.is_none() {
        fields.email = parsed.email.as_deref().and_then(validate_email);
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_form_with_email_third() {
        let fields = parse_strict_form("Müller, Hans, hans@example.com").unwrap();
        assert_eq!(fields.name.as_deref(), Some("Müller"));
        assert_eq!(fields.vorname.as_deref(), Some("Hans"));
        assert_eq!(fields.email.as_deref(), Some("hans@example.com"));
    }

    #[test]
    fn strict_form_lowercases_email() {
        let fields = parse_strict_form("Müller, Hans, Hans@Example.COM").unwrap();
        assert_eq!(fields.email.as_deref(), Some("hans@example.com"));
    }

    // Known ambiguity: with the email outside the third slot the remaining
    // segments are still taken surname-first, which swaps the names here.
    #[test]
    fn strict_form_email_first_keeps_segment_order() {
        let fields = parse_strict_form("hans@example.com, Müller, Hans").unwrap();
        assert_eq!(fields.name.as_deref(), Some("Müller"));
        assert_eq!(fields.vorname.as_deref(), Some("Hans"));
        assert_eq!(fields.email.as_deref(), Some("hans@example.com"));
    }

    #[test]
    fn strict_form_rejects_wrong_shapes() {
        assert!(parse_strict_form("Müller, Hans").is_none());
        assert!(parse_strict_form("Müller, , hans@example.com").is_none());
        assert!(parse_strict_form("a@x.de, b@y.de, Hans").is_none());
        assert!(parse_strict_form("Müller, Hans, keineemail").is_none());
        assert!(parse_strict_form("Ich brauche einen neuen Laptop").is_none());
    }

    #[test]
    fn labels_fill_fields() {
        let mut fields = IdentityFields::default();
        apply_templates(
            "Name: Schmidt\nVorname: Anna\nE-Mail: anna@x.com",
            &mut fields,
        );
        assert_eq!(fields.name.as_deref(), Some("Schmidt"));
        assert_eq!(fields.vorname.as_deref(), Some("Anna"));
        assert_eq!(fields.email.as_deref(), Some("anna@x.com"));
    }

    #[test]
    fn name_phrase_assigns_given_name_first() {
        let mut fields = IdentityFields::default();
        apply_templates("Hallo, mein Name ist Hans Müller.", &mut fields);
        assert_eq!(fields.vorname.as_deref(), Some("Hans"));
        assert_eq!(fields.name.as_deref(), Some("Müller"));
    }

    #[test]
    fn bare_email_is_picked_up_and_lowercased() {
        let mut fields = IdentityFields::default();
        apply_templates("Erreichbar unter Hans.Mueller@Firma.DE, danke", &mut fields);
        assert_eq!(fields.email.as_deref(), Some("hans.mueller@firma.de"));
        assert!(fields.name.is_none());
    }

    #[test]
    fn invalid_email_is_discarded() {
        assert_eq!(validate_email("nicht-zustellbar"), None);
        assert_eq!(validate_email("hans@"), None);
        assert_eq!(
            validate_email("  Hans@Example.com  ").as_deref(),
            Some("hans@example.com")
        );
    }

    #[test]
    fn supplied_blank_fields_count_as_absent() {
        let fields = IdentityFields::from_supplied(
            Some("".to_string()),
            Some("   ".to_string()),
            Some("".to_string()),
        );
        assert_eq!(fields, IdentityFields::default());

        let fields = IdentityFields::from_supplied(
            Some("  Müller  ".to_string()),
            Some("Hans".to_string()),
            Some("keine-mail".to_string()),
        );
        assert_eq!(fields.name.as_deref(), Some("Müller"));
        assert_eq!(fields.vorname.as_deref(), Some("Hans"));
        assert!(fields.email.is_none());

        let fields = IdentityFields::from_supplied(
            Some("Müller".to_string()),
            Some("Hans".to_string()),
            Some("Hans@Example.COM".to_string()),
        );
        assert_eq!(fields.email.as_deref(), Some("hans@example.com"));
    }

    #[test]
    fn known_fields_are_never_overwritten() {
        let mut fields = IdentityFields {
            name: Some("Bestand".to_string()),
            ..Default::default()
        };
        apply_templates("Name: Neu", &mut fields);
        assert_eq!(fields.name.as_deref(), Some("Bestand"));
    }
}
