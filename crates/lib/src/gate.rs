//! Identity gate: decides whether a run carries enough identity to proceed,
//! and whether an inbound message unparks a waiting session.
//!
//! Resumption is deliberately strict: while a session waits for identity,
//! only a message matching the exact "Name, Vorname, E-Mail-Adresse" format
//! is accepted. Everything else — including a well-formed new request — is
//! rejected with a repeated prompt so an unrelated message is never merged
//! into the pending conversation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::IdentityFields;

/// Anchored resumption format: two free segments, then one email-shaped segment.
static IDENTITY_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[^,]+,\s*[^,]+,\s*[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$")
        .expect("identity format pattern")
});

/// Required identity fields with their user-facing labels.
pub const REQUIRED_FIELDS: [(&str, &str); 3] = [
    ("name", "Name"),
    ("vorname", "Vorname"),
    ("email", "E-Mail-Adresse"),
];

/// Prompt sent when identity fields are missing (fresh park).
pub const MISSING_IDENTITY_PROMPT: &str = "Bitte geben Sie Ihre Angaben im Format Name, Vorname, \
E-Mail-Adresse an. Beispiel: Müller, Hans, hans@example.com";

/// Prompt repeated while a parked session receives anything but the strict format.
pub const WAITING_PROMPT: &str = "Bitte geben Sie Ihre Angaben im Format Name, Vorname, \
E-Mail-Adresse an. Beispiel: Müller, Hans, hans@example.com\n\nIch kann Ihre Anfrage erst \
bearbeiten, nachdem Sie Ihre Identitätsinformationen im korrekten Format bereitgestellt haben.";

/// True when the trimmed message matches the strict resumption format.
pub fn is_identity_reply(message: &str) -> bool {
    IDENTITY_FORMAT.is_match(message.trim())
}

/// Field keys still absent from `fields`, in declaration order.
pub fn missing_fields(fields: &IdentityFields) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if fields.name.is_none() {
        missing.push("name");
    }
    if fields.vorname.is_none() {
        missing.push("vorname");
    }
    if fields.email.is_none() {
        missing.push("email");
    }
    missing
}

/// Session-side gate state, as read from the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingIdentity,
}

/// What the inbound message is, relative to the gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    /// Any message while no identity is pending.
    NewRequest,
    /// Message received while awaiting identity; `valid` is the strict-format check.
    IdentityReply { valid: bool },
}

/// Orchestrator instruction produced by the transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Run the pipeline on the inbound message as-is.
    Process,
    /// Restore the parked original message and run the pipeline on it,
    /// consuming the inbound identity line for extraction only.
    Resume,
    /// Do not enter the pipeline; repeat the waiting prompt.
    Reject,
}

/// Pure transition table for the identity-completion state machine. The next
/// persisted state is committed by the orchestrator from the terminal status
/// (missing identity parks, completion clears), so only the decision is
/// produced here.
pub fn transition(state: GateState, event: GateEvent) -> GateDecision {
    match (state, event) {
        (GateState::Idle, _) => GateDecision::Process,
        (GateState::AwaitingIdentity, GateEvent::IdentityReply { valid: true }) => {
            GateDecision::Resume
        }
        (GateState::AwaitingIdentity, _) => GateDecision::Reject,
    }
}

/// Classify an inbound message into a gate event.
pub fn event_for(state: GateState, message: &str) -> GateEvent {
    match state {
        GateState::Idle => GateEvent::NewRequest,
        GateState::AwaitingIdentity => GateEvent::IdentityReply {
            valid: is_identity_reply(message),
        },
    }
}
