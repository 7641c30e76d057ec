use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    Processed,
    Ignored,
}

/// The body of every webhook acknowledgement. Providers retry anything that is not a 2xx, so webhooks are always
/// acknowledged, and the outcome is reported here instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: WebhookOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WebhookAck {
    pub fn processed<S: Into<String>>(transaction_id: S) -> Self {
        Self { status: WebhookOutcome::Processed, transaction_id: Some(transaction_id.into()), reason: None }
    }

    pub fn ignored<S: Display>(reason: S) -> Self {
        Self { status: WebhookOutcome::Ignored, transaction_id: None, reason: Some(reason.to_string()) }
    }
}
