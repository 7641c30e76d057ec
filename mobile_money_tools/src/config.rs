use std::{env, time::Duration};

use log::*;
use mpg_common::{Secret, DEFAULT_CURRENCY};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MTN_BASE_URL: &str = "https://sandbox.momodeveloper.mtn.com";
const DEFAULT_AIRTEL_BASE_URL: &str = "https://openapiuat.airtel.africa";

#[derive(Debug, Clone)]
pub struct MtnMomoConfig {
    /// e.g. "https://sandbox.momodeveloper.mtn.com" or "https://proxy.momoapi.mtn.com"
    pub base_url: String,
    /// Value of the `X-Target-Environment` header. "sandbox" or the market code, e.g. "mtnzambia"
    pub target_environment: String,
    pub api_user: String,
    pub api_key: Secret<String>,
    pub collection_subscription_key: Secret<String>,
    /// Refunds go through the disbursement product, which has its own subscription key.
    pub disbursement_subscription_key: Secret<String>,
    pub currency: String,
    /// If set, sent as `X-Callback-Url` so that MTN pushes the final status to our webhook.
    pub callback_url: Option<String>,
    pub timeout: Duration,
}

impl Default for MtnMomoConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MTN_BASE_URL.to_string(),
            target_environment: "sandbox".to_string(),
            api_user: String::default(),
            api_key: Secret::default(),
            collection_subscription_key: Secret::default(),
            disbursement_subscription_key: Secret::default(),
            currency: DEFAULT_CURRENCY.to_string(),
            callback_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl MtnMomoConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let base_url = env::var("MPG_MTN_MOMO_BASE_URL").unwrap_or_else(|_| {
            warn!("MPG_MTN_MOMO_BASE_URL not set, using the sandbox at {}", defaults.base_url);
            defaults.base_url.clone()
        });
        let target_environment = env::var("MPG_MTN_MOMO_ENV").unwrap_or_else(|_| {
            warn!("MPG_MTN_MOMO_ENV not set, using 'sandbox'");
            defaults.target_environment.clone()
        });
        let api_user = env::var("MPG_MTN_MOMO_API_USER").unwrap_or_else(|_| {
            warn!("MPG_MTN_MOMO_API_USER not set. MTN MoMo calls will fail authentication.");
            String::default()
        });
        let api_key = Secret::new(env::var("MPG_MTN_MOMO_API_KEY").unwrap_or_default());
        let collection_subscription_key =
            Secret::new(env::var("MPG_MTN_MOMO_COLLECTION_SUBSCRIPTION_KEY").unwrap_or_default());
        let disbursement_subscription_key = env::var("MPG_MTN_MOMO_DISBURSEMENT_SUBSCRIPTION_KEY")
            .map(Secret::new)
            .unwrap_or_else(|_| {
                info!("MPG_MTN_MOMO_DISBURSEMENT_SUBSCRIPTION_KEY not set, using the collection key for refunds");
                collection_subscription_key.clone()
            });
        let currency = env::var("MPG_MTN_MOMO_CURRENCY").unwrap_or(defaults.currency);
        let callback_url = env::var("MPG_MTN_MOMO_CALLBACK_URL").ok();
        let timeout = timeout_from_env("MPG_MTN_MOMO_TIMEOUT_SECS");
        Self {
            base_url,
            target_environment,
            api_user,
            api_key,
            collection_subscription_key,
            disbursement_subscription_key,
            currency,
            callback_url,
            timeout,
        }
    }

    /// True if enough credentials are present to attempt an API call.
    pub fn has_credentials(&self) -> bool {
        !self.api_user.is_empty() && self.api_key.is_set() && self.collection_subscription_key.is_set()
    }
}

#[derive(Debug, Clone)]
pub struct AirtelMoneyConfig {
    /// e.g. "https://openapiuat.airtel.africa" or "https://openapi.airtel.africa"
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// ISO 3166 country code sent as `X-Country`
    pub country: String,
    pub currency: String,
    /// International dialling code, stripped from phone numbers since Airtel expects local MSISDNs
    pub dial_code: String,
    pub timeout: Duration,
}

impl Default for AirtelMoneyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AIRTEL_BASE_URL.to_string(),
            client_id: String::default(),
            client_secret: Secret::default(),
            country: "ZM".to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            dial_code: "260".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl AirtelMoneyConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let base_url = env::var("MPG_AIRTEL_BASE_URL").unwrap_or_else(|_| {
            warn!("MPG_AIRTEL_BASE_URL not set, using the UAT environment at {}", defaults.base_url);
            defaults.base_url.clone()
        });
        let client_id = env::var("MPG_AIRTEL_CLIENT_ID").unwrap_or_else(|_| {
            warn!("MPG_AIRTEL_CLIENT_ID not set. Airtel Money calls will fail authentication.");
            String::default()
        });
        let client_secret = Secret::new(env::var("MPG_AIRTEL_CLIENT_SECRET").unwrap_or_default());
        let country = env::var("MPG_AIRTEL_COUNTRY").unwrap_or(defaults.country);
        let currency = env::var("MPG_AIRTEL_CURRENCY").unwrap_or(defaults.currency);
        let dial_code = env::var("MPG_AIRTEL_DIAL_CODE").unwrap_or(defaults.dial_code);
        let timeout = timeout_from_env("MPG_AIRTEL_TIMEOUT_SECS");
        Self { base_url, client_id, client_secret, country, currency, dial_code, timeout }
    }

    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && self.client_secret.is_set()
    }
}

fn timeout_from_env(var: &str) -> Duration {
    env::var(var)
        .ok()
        .and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| warn!("{var} is not a valid number of seconds ({s}). {e}. Using the default."))
                .ok()
        })
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT)
}
