//! Outbound ticket dispatch: builds the structured payload and either posts
//! it to the configured endpoint or simulates the transport.
//!
//! Dispatch is the one stage allowed to abort a run outright: a transport
//! failure in live mode surfaces as a terminal dispatch error carrying the
//! payload that failed to send.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pipeline::TicketContext;

/// Success message recorded when a ticket was handed over (or simulated).
pub const DISPATCH_SUCCESS_MESSAGE: &str = "Das Ticket wurde erfolgreich an das IT-Team \
übergeben. Du erhältst eine Rückmeldung per E-Mail.";

/// User-facing message for a failed handover.
pub const DISPATCH_FAILED_MESSAGE: &str = "Die Weiterleitung an das IT-Team ist fehlgeschlagen.";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Wire payload for the outbound ticket POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub name: Option<String>,
    pub vorname: Option<String>,
    pub email: Option<String>,
    pub kategorie: Option<String>,
    pub zusammenfassung: Option<String>,
    pub anfrage: String,
}

impl DispatchPayload {
    /// Snapshot the context into the outbound payload.
    pub fn from_context(context: &TicketContext) -> Self {
        Self {
            name: context.name.clone(),
            vorname: context.vorname.clone(),
            email: context.email.clone(),
            kategorie: context.category.map(|c| c.label().to_string()),
            zusammenfassung: context.summary.clone(),
            anfrage: context.original_message.clone(),
        }
    }
}

/// Operating mode, fixed at pipeline construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Record the payload on the context, no transport call.
    Simulate,
    /// POST the payload with a bounded timeout.
    Live,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("dispatch endpoint returned {status}: {body}")]
    Endpoint {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("no dispatch endpoint configured")]
    NoEndpoint,
}

/// Posts structured tickets to the dispatch endpoint, or simulates doing so.
pub struct Dispatcher {
    url: Option<String>,
    mode: DispatchMode,
    timeout: Duration,
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(url: Option<String>, mode: DispatchMode, timeout: Option<Duration>) -> Self {
        Self {
            url,
            mode,
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
            client: reqwest::Client::new(),
        }
    }

    /// Convenience constructor for a simulating dispatcher (tests, demo builds).
    pub fn simulated() -> Self {
        Self::new(None, DispatchMode::Simulate, None)
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Dispatch the ticket in `context`. Non-dispatchable categories are a
    /// no-op pass-through (the router should not send them here). On success
    /// the payload is recorded on the context and a success message set when
    /// none exists; on transport failure the error and the payload that
    /// failed to send are returned.
    pub async fn dispatch(
        &self,
        context: &mut TicketContext,
    ) -> Result<(), (DispatchError, DispatchPayload)> {
        let dispatchable = context.category.map(|c| c.is_dispatchable()).unwrap_or(false);
        if !dispatchable {
            return Ok(());
        }

        let payload = DispatchPayload::from_context(context);

        if self.mode == DispatchMode::Live {
            if let Err(e) = self.post(&payload).await {
                log::warn!("dispatch: transport failed: {}", e);
                return Err((e, payload));
            }
            log::info!(
                "dispatch: ticket sent (kategorie={})",
                payload.kategorie.as_deref().unwrap_or("-")
            );
        } else {
            log::info!(
                "dispatch: simulated (kategorie={})",
                payload.kategorie.as_deref().unwrap_or("-")
            );
        }

        context.dispatch_payload = Some(payload);
        if context.response.is_none() {
            context.response = Some(DISPATCH_SUCCESS_MESSAGE.to_string());
        }
        Ok(())
    }

    async fn post(&self, payload: &DispatchPayload) -> Result<(), DispatchError> {
        let url = self.url.as_deref().ok_or(DispatchError::NoEndpoint)?;
        let res = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(DispatchError::Endpoint { status, body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::TicketCategory;

    fn login_context() -> TicketContext {
        TicketContext {
            original_message: "Ich kann mich nicht anmelden".to_string(),
            name: Some("Müller".to_string()),
            vorname: Some("Hans".to_string()),
            email: Some("hans@example.com".to_string()),
            category: Some(TicketCategory::Login),
            summary: Some("Login klemmt".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn simulate_records_payload_and_success_message() {
        let dispatcher = Dispatcher::simulated();
        let mut context = login_context();
        dispatcher.dispatch(&mut context).await.unwrap();

        let payload = context.dispatch_payload.expect("payload recorded");
        assert_eq!(payload.kategorie.as_deref(), Some("Probleme bei der Anmeldung"));
        assert_eq!(payload.anfrage, "Ich kann mich nicht anmelden");
        assert_eq!(context.response.as_deref(), Some(DISPATCH_SUCCESS_MESSAGE));
    }

    #[tokio::test]
    async fn simulate_keeps_existing_response_text() {
        let dispatcher = Dispatcher::simulated();
        let mut context = login_context();
        context.response = Some("Antwort aus der Generierung".to_string());
        dispatcher.dispatch(&mut context).await.unwrap();
        assert_eq!(
            context.response.as_deref(),
            Some("Antwort aus der Generierung")
        );
    }

    #[tokio::test]
    async fn non_dispatchable_context_is_a_no_op() {
        let dispatcher = Dispatcher::simulated();
        let mut context = login_context();
        context.category = Some(TicketCategory::Other);
        dispatcher.dispatch(&mut context).await.unwrap();
        assert!(context.dispatch_payload.is_none());
        assert!(context.response.is_none());
    }

    #[tokio::test]
    async fn live_mode_without_endpoint_fails_with_payload() {
        let dispatcher = Dispatcher::new(None, DispatchMode::Live, None);
        let mut context = login_context();
        let (err, payload) = dispatcher.dispatch(&mut context).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoEndpoint));
        assert_eq!(payload.name.as_deref(), Some("Müller"));
        assert!(context.dispatch_payload.is_none());
    }
}
