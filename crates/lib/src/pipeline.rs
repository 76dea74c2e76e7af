//! Pipeline orchestrator: one inbound ticket in, one terminal response out.
//!
//! Sequence: session lookup → identity gate → field extraction → validation →
//! classification → category branch (answer / dispatch / early exit) →
//! response formatting. A run that lacks identity parks its session and stops;
//! a later run holding the strict identity reply resumes it against the
//! preserved original message.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::classify::{self, TicketCategory};
use crate::config::{self, Config};
use crate::dispatch::{
    DispatchError, DispatchMode, DispatchPayload, Dispatcher, DISPATCH_FAILED_MESSAGE,
};
use crate::extract::{self, IdentityFields};
use crate::gate::{self, GateDecision, GateState, MISSING_IDENTITY_PROMPT, WAITING_PROMPT};
use crate::llm::{Generator, LlmError};
use crate::respond::{self, TicketResponse, TicketStatus};
use crate::route::{self, Branch};
use crate::session::SessionStore;

const HISTORIAN_PROMPT: &str = "Du bist ein freundlicher Support-Agent. Beantworte Fragen zur \
Geschichte der KI in einfacher, leicht verständlicher Sprache auf Deutsch. Verwende höchstens \
zwei kurze Absätze.";

/// One inbound request, as received from a front end. Immutable per run.
#[derive(Debug, Clone, Default)]
pub struct TicketInput {
    pub message: String,
    pub name: Option<String>,
    pub vorname: Option<String>,
    pub email: Option<String>,
    /// Conversation token from the front end; keys the session state.
    pub session_token: Option<String>,
    /// Back-reference to the parked original message, for front ends without
    /// session tracking (keys the fingerprint fallback).
    pub original_message: Option<String>,
}

impl TicketInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Mutable working record threaded through the stages of one run.
/// Owned exclusively by that run.
#[derive(Debug, Clone, Default)]
pub struct TicketContext {
    pub original_message: String,
    pub name: Option<String>,
    pub vorname: Option<String>,
    pub email: Option<String>,
    pub category: Option<TicketCategory>,
    pub summary: Option<String>,
    pub cleaned_request: Option<String>,
    pub response: Option<String>,
    pub dispatch_payload: Option<DispatchPayload>,
}

/// Errors rejected at the pipeline boundary, before any stage runs.
/// Everything that happens inside a run maps to a terminal response instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A bare identity-shaped message arrived without any session reference;
    /// there is no key under which a parked conversation could be found.
    #[error(
        "identity replies require the session token returned with the missing_identity response"
    )]
    IdentityReplyWithoutSession,
}

/// The pipeline: owns the collaborators and the session store, processes one
/// ticket per `run` call. Runs may execute concurrently; the store serializes
/// state access per key.
pub struct Pipeline {
    generator: Arc<dyn Generator>,
    dispatcher: Dispatcher,
    store: Arc<SessionStore>,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        dispatcher: Dispatcher,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            generator,
            dispatcher,
            store,
        }
    }

    /// Assemble a pipeline from configuration: Ollama backend, dispatcher,
    /// and a fresh session store. `force_simulate` pins dispatch to simulation
    /// regardless of configuration (the gateway always runs that way).
    pub fn from_config(config: &Config, force_simulate: bool) -> Self {
        let generator = Arc::new(crate::llm::OllamaClient::new(
            config.llm.base_url.clone(),
            config.llm.model.clone(),
        ));
        let url = config::resolve_dispatch_url(config);
        let mode = if force_simulate || config.dispatch.simulate {
            DispatchMode::Simulate
        } else if url.is_none() {
            log::warn!("live dispatch requested but no endpoint configured; simulating");
            DispatchMode::Simulate
        } else {
            DispatchMode::Live
        };
        let dispatcher = Dispatcher::new(
            url,
            mode,
            Some(std::time::Duration::from_secs(config.dispatch.timeout_secs)),
        );
        Self::new(generator, dispatcher, Arc::new(SessionStore::new()))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Session key for this input: explicit token first, otherwise a content
    /// fingerprint of the back-referenced original (or the message itself).
    fn session_key(input: &TicketInput) -> String {
        if let Some(token) = input.session_token.as_deref() {
            let token = token.trim();
            if !token.is_empty() {
                return token.to_string();
            }
        }
        let basis = input
            .original_message
            .as_deref()
            .unwrap_or(input.message.as_str());
        SessionStore::fingerprint(basis)
    }

    /// Process one ticket end to end. Returns `Err` only for boundary
    /// rejections; every in-run failure is mapped to a terminal response.
    pub async fn run(&self, input: TicketInput) -> Result<TicketResponse, PipelineError> {
        let message = input.message.trim().to_string();
        let is_reply = gate::is_identity_reply(&message);

        if is_reply && input.session_token.is_none() && input.original_message.is_none() {
            log::warn!("pipeline: identity reply without session reference rejected at boundary");
            return Err(PipelineError::IdentityReplyWithoutSession);
        }

        let key = Self::session_key(&input);
        let state = self.store.get(&key).await;
        let gate_state = if state.waiting_for_identity {
            GateState::AwaitingIdentity
        } else {
            GateState::Idle
        };
        let decision = gate::transition(gate_state, gate::event_for(gate_state, &message));

        if decision == GateDecision::Reject {
            log::warn!(
                "pipeline: rejecting non-identity message while parked (key {})",
                key
            );
            let response = TicketResponse::new(TicketStatus::WaitingForIdentity, WAITING_PROMPT)
                .with_meta("waiting_for_identity", Value::Bool(true))
                .with_meta(
                    "original_message",
                    state
                        .original_message
                        .clone()
                        .map(Value::String)
                        .unwrap_or(Value::Null),
                );
            // Session state stays untouched; the park must survive the reject.
            return Ok(Self::echo_token(response, &input));
        }

        // Effective request body for everything downstream of extraction.
        let original = match decision {
            GateDecision::Resume => input
                .original_message
                .clone()
                .or_else(|| state.original_message.clone())
                .unwrap_or_else(|| message.clone()),
            _ => input
                .original_message
                .clone()
                .unwrap_or_else(|| message.clone()),
        };

        let response = match self.run_stages(&input, &message, original.clone()).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("pipeline: run failed: {}", e);
                TicketResponse::new(
                    TicketStatus::Error,
                    format!("Fehler bei der Verarbeitung: {}", e),
                )
                .with_meta("error", Value::String(e.to_string()))
            }
        };

        match response.status {
            TicketStatus::MissingIdentity => self.store.park(&key, &original).await,
            TicketStatus::WaitingForIdentity => {}
            _ => self.store.clear(&key).await,
        }

        Ok(Self::echo_token(response, &input))
    }

    /// Extraction through formatting. The only error that can escape is a
    /// failed answer generation; extraction and classification degrade
    /// internally and dispatch failures become their own terminal status.
    async fn run_stages(
        &self,
        input: &TicketInput,
        message: &str,
        original: String,
    ) -> Result<TicketResponse, LlmError> {
        let known = IdentityFields::from_supplied(
            input.name.clone(),
            input.vorname.clone(),
            input.email.clone(),
        );
        let fields = extract::extract_identity(self.generator.as_ref(), message, known).await;

        let missing = gate::missing_fields(&fields);
        if !missing.is_empty() {
            let labels: Vec<&str> = gate::REQUIRED_FIELDS
                .iter()
                .filter(|(key, _)| missing.contains(key))
                .map(|(_, label)| *label)
                .collect();
            log::info!("pipeline: missing identity fields {:?}", missing);
            return Ok(
                TicketResponse::new(TicketStatus::MissingIdentity, MISSING_IDENTITY_PROMPT)
                    .with_meta("missing_fields", json!(missing))
                    .with_meta("missing_labels", json!(labels)),
            );
        }

        let mut context = TicketContext {
            original_message: original,
            name: fields.name,
            vorname: fields.vorname,
            email: fields.email,
            ..Default::default()
        };

        classify::classify(self.generator.as_ref(), &mut context).await;
        let category = context.category.unwrap_or(TicketCategory::Other);

        match route::branch_for(category) {
            Branch::Answer => {
                self.answer(&mut context).await?;
                // Answered history questions still go out as tickets.
                if let Err((err, payload)) = self.dispatcher.dispatch(&mut context).await {
                    return Ok(dispatch_error_response(err, payload));
                }
            }
            Branch::Dispatch => {
                if let Err((err, payload)) = self.dispatcher.dispatch(&mut context).await {
                    return Ok(dispatch_error_response(err, payload));
                }
            }
            Branch::Exit => {}
        }

        Ok(respond::format_response(&context))
    }

    /// Answer branch: generate a direct reply to the request text.
    async fn answer(&self, context: &mut TicketContext) -> Result<(), LlmError> {
        let request = context
            .cleaned_request
            .as_deref()
            .unwrap_or(context.original_message.as_str());
        let text = self.generator.generate(HISTORIAN_PROMPT, request).await?;
        context.response = Some(text.trim().to_string());
        Ok(())
    }

    fn echo_token(response: TicketResponse, input: &TicketInput) -> TicketResponse {
        match input.session_token.as_deref() {
            Some(token) if !token.trim().is_empty() => {
                response.with_meta("session_token", Value::String(token.to_string()))
            }
            _ => response,
        }
    }
}

fn dispatch_error_response(err: DispatchError, payload: DispatchPayload) -> TicketResponse {
    TicketResponse::new(TicketStatus::DispatchError, DISPATCH_FAILED_MESSAGE)
        .with_meta("error", Value::String(err.to_string()))
        .with_meta(
            "payload",
            serde_json::to_value(&payload).unwrap_or(Value::Null),
        )
}
