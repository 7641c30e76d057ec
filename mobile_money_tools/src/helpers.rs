use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::sync::RwLock;

/// Tokens are refreshed this long before the provider says they expire, so that a request never goes out with a token
/// that dies in flight.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::seconds(30);

/// A fresh UUID v4, as required by MTN for `X-Reference-Id` and used as the Airtel transaction id.
pub fn new_reference_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Airtel expects the subscriber MSISDN without the country prefix. Strips a leading `+`, the international dial
/// code and the trunk `0` if present.
pub fn local_msisdn(phone: &str, dial_code: &str) -> String {
    let digits = phone.trim().trim_start_matches('+');
    let local = digits.strip_prefix(dial_code).unwrap_or(digits);
    local.trim_start_matches('0').to_string()
}

/// Providers are inconsistent about whether numbers (amounts, expiry times) are JSON strings or JSON numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where D: Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// A shared, async-safe cache for a single OAuth bearer token.
#[derive(Debug, Clone, Default)]
pub(crate) struct TokenCache {
    inner: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenCache {
    pub async fn get(&self) -> Option<String> {
        let guard = self.inner.read().await;
        guard.as_ref().filter(|t| t.expires_at - TOKEN_EXPIRY_MARGIN > Utc::now()).map(|t| t.token.clone())
    }

    pub async fn set(&self, token: String, expires_in_secs: i64) {
        let expires_at = Utc::now() + Duration::seconds(expires_in_secs);
        let mut guard = self.inner.write().await;
        *guard = Some(CachedToken { token, expires_at });
    }
}
