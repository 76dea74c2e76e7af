//! Terminal response types and the formatter that maps a finished pipeline
//! context onto them. The formatter has no failure mode: any context it
//! receives produces a response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::TicketCategory;
use crate::dispatch::DispatchPayload;
use crate::pipeline::TicketContext;

/// Fixed apology for unsupported (category "Sonstiges") requests.
pub const UNSUPPORTED_MESSAGE: &str =
    "Leider kann dieses System bei dieser Anfrage nicht helfen.";

/// Generic acknowledgment when no answer text was produced upstream.
pub const ACK_MESSAGE: &str =
    "Deine Anfrage wurde aufgenommen. Wir melden uns so schnell wie möglich.";

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Completed,
    MissingIdentity,
    WaitingForIdentity,
    Unsupported,
    Error,
    DispatchError,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Completed => "completed",
            TicketStatus::MissingIdentity => "missing_identity",
            TicketStatus::WaitingForIdentity => "waiting_for_identity",
            TicketStatus::Unsupported => "unsupported",
            TicketStatus::Error => "error",
            TicketStatus::DispatchError => "dispatch_error",
        }
    }
}

/// The single terminal response of a run. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketResponse {
    pub status: TicketStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<DispatchPayload>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl TicketResponse {
    pub fn new(status: TicketStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: None,
            metadata: Map::new(),
        }
    }

    pub fn with_payload(mut self, payload: Option<DispatchPayload>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// Map a finished context onto the terminal response: category "Sonstiges"
/// becomes `unsupported` with the fixed apology, everything else `completed`
/// (with a generic acknowledgment when no answer text was produced).
/// Category, summary, and dispatch payload always land in the metadata.
pub fn format_response(context: &TicketContext) -> TicketResponse {
    let mut metadata = Map::new();
    metadata.insert(
        "category".to_string(),
        context
            .category
            .map(|c| Value::String(c.label().to_string()))
            .unwrap_or(Value::Null),
    );
    metadata.insert(
        "summary".to_string(),
        context
            .summary
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    metadata.insert(
        "dispatch_payload".to_string(),
        context
            .dispatch_payload
            .as_ref()
            .and_then(|p| serde_json::to_value(p).ok())
            .unwrap_or(Value::Null),
    );

    if context.category == Some(TicketCategory::Other) {
        return TicketResponse {
            status: TicketStatus::Unsupported,
            message: UNSUPPORTED_MESSAGE.to_string(),
            payload: None,
            metadata,
        };
    }

    let message = context
        .response
        .clone()
        .unwrap_or_else(|| ACK_MESSAGE.to_string());

    TicketResponse {
        status: TicketStatus::Completed,
        message,
        payload: context.dispatch_payload.clone(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_category_is_unsupported_with_fixed_message() {
        let context = TicketContext {
            original_message: "Wie wird das Wetter?".to_string(),
            category: Some(TicketCategory::Other),
            summary: Some("Wetterfrage".to_string()),
            ..Default::default()
        };
        let response = format_response(&context);
        assert_eq!(response.status, TicketStatus::Unsupported);
        assert_eq!(response.message, UNSUPPORTED_MESSAGE);
        assert!(response.payload.is_none());
        assert_eq!(
            response.metadata.get("category").and_then(|v| v.as_str()),
            Some("Sonstiges")
        );
    }

    #[test]
    fn missing_answer_text_falls_back_to_acknowledgment() {
        let context = TicketContext {
            original_message: "Mein Laptop ist kaputt".to_string(),
            category: Some(TicketCategory::Hardware),
            ..Default::default()
        };
        let response = format_response(&context);
        assert_eq!(response.status, TicketStatus::Completed);
        assert_eq!(response.message, ACK_MESSAGE);
    }

    #[test]
    fn answer_text_and_payload_are_carried_through() {
        let payload = DispatchPayload {
            name: Some("Müller".to_string()),
            vorname: Some("Hans".to_string()),
            email: Some("hans@example.com".to_string()),
            kategorie: Some("O365 Frage".to_string()),
            zusammenfassung: Some("Outlook startet nicht".to_string()),
            anfrage: "Outlook startet nicht mehr".to_string(),
        };
        let context = TicketContext {
            original_message: "Outlook startet nicht mehr".to_string(),
            category: Some(TicketCategory::O365),
            response: Some("Erledigt.".to_string()),
            dispatch_payload: Some(payload.clone()),
            ..Default::default()
        };
        let response = format_response(&context);
        assert_eq!(response.status, TicketStatus::Completed);
        assert_eq!(response.message, "Erledigt.");
        assert_eq!(response.payload, Some(payload));
        assert!(response.metadata.get("dispatch_payload").unwrap().is_object());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&TicketStatus::WaitingForIdentity).unwrap();
        assert_eq!(json, "\"waiting_for_identity\"");
        let json = serde_json::to_string(&TicketStatus::DispatchError).unwrap();
        assert_eq!(json, "\"dispatch_error\"");
    }
}
