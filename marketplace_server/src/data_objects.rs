use serde::{Deserialize, Serialize};

/// The body returned for every authentic processor webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub event_id: String,
    /// False when the event was acknowledged but needed no action
    pub handled: bool,
    pub message: String,
}

impl WebhookAck {
    pub fn handled<S: Into<String>>(event_id: &str, message: S) -> Self {
        Self { event_id: event_id.to_string(), handled: true, message: message.into() }
    }

    pub fn ignored<S: Into<String>>(event_id: &str, message: S) -> Self {
        Self { event_id: event_id.to_string(), handled: false, message: message.into() }
    }
}
