use std::{env, time::Duration};

use log::*;
use mobile_money_tools::{AirtelMoneyConfig, MtnMomoConfig};
use mpg_common::{helpers::parse_boolean_flag, Secret};

const DEFAULT_MPG_HOST: &str = "127.0.0.1";
const DEFAULT_MPG_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/payments.db";
const DEFAULT_RECONCILIATION_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_RECONCILIATION_AGE: Duration = Duration::from_secs(120);
const DEFAULT_RECONCILIATION_BATCH_SIZE: i64 = 50;
const DEFAULT_RECONCILIATION_MAX_RETRIES: i64 = 10;
const DEFAULT_MTN_HMAC_HEADER: &str = "X-Callback-Signature";
const DEFAULT_AIRTEL_HMAC_HEADER: &str = "X-Signature";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Stale PENDING/PROCESSING transactions are polled against their provider on this schedule.
    pub reconciliation: ReconciliationConfig,
    pub mtn_momo: MtnMomoConfig,
    pub airtel_money: AirtelMoneyConfig,
    pub mtn_webhook_hmac: WebhookHmacConfig,
    pub airtel_webhook_hmac: WebhookHmacConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPG_HOST.to_string(),
            port: DEFAULT_MPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            reconciliation: ReconciliationConfig::default(),
            mtn_momo: MtnMomoConfig::default(),
            airtel_money: AirtelMoneyConfig::default(),
            mtn_webhook_hmac: WebhookHmacConfig::disabled(DEFAULT_MTN_HMAC_HEADER),
            airtel_webhook_hmac: WebhookHmacConfig::disabled(DEFAULT_AIRTEL_HMAC_HEADER),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPG_HOST").ok().unwrap_or_else(|| DEFAULT_MPG_HOST.into());
        let port = env::var("MPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPG_PORT. {e} Using the default, {DEFAULT_MPG_PORT}, instead."
                    );
                    DEFAULT_MPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MPG_PORT);
        let database_url = env::var("MPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let reconciliation = ReconciliationConfig::from_env_or_default();
        let mtn_momo = MtnMomoConfig::new_from_env_or_default();
        let airtel_money = AirtelMoneyConfig::new_from_env_or_default();
        let mtn_webhook_hmac = WebhookHmacConfig::from_env("MPG_MTN_MOMO", DEFAULT_MTN_HMAC_HEADER);
        let airtel_webhook_hmac = WebhookHmacConfig::from_env("MPG_AIRTEL", DEFAULT_AIRTEL_HMAC_HEADER);
        Self { host, port, database_url, reconciliation, mtn_momo, airtel_money, mtn_webhook_hmac, airtel_webhook_hmac }
    }
}

//--------------------------------------------  ReconciliationConfig  ------------------------------------------------
#[derive(Clone, Debug)]
pub struct ReconciliationConfig {
    pub enabled: bool,
    /// Time between sweeps
    pub interval: Duration,
    /// A transaction must have been quiet for at least this long before it is polled
    pub min_age: Duration,
    pub batch_size: i64,
    /// Transactions whose polls have failed this many times are no longer swept. Their status is left as it is.
    pub max_retries: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_RECONCILIATION_INTERVAL,
            min_age: DEFAULT_RECONCILIATION_AGE,
            batch_size: DEFAULT_RECONCILIATION_BATCH_SIZE,
            max_retries: DEFAULT_RECONCILIATION_MAX_RETRIES,
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env_or_default() -> Self {
        let enabled = parse_boolean_flag(env::var("MPG_RECONCILIATION_ENABLED").ok(), true);
        if !enabled {
            info!("🪛️ The reconciliation worker is disabled. Transactions will only settle through webhooks.");
        }
        let interval = seconds_from_env("MPG_RECONCILIATION_INTERVAL_SECS", DEFAULT_RECONCILIATION_INTERVAL);
        let min_age = seconds_from_env("MPG_RECONCILIATION_MIN_AGE_SECS", DEFAULT_RECONCILIATION_AGE);
        let batch_size = positive_int_from_env("MPG_RECONCILIATION_BATCH_SIZE", DEFAULT_RECONCILIATION_BATCH_SIZE);
        let max_retries = positive_int_from_env("MPG_RECONCILIATION_MAX_RETRIES", DEFAULT_RECONCILIATION_MAX_RETRIES);
        Self { enabled, interval, min_age, batch_size, max_retries }
    }
}

fn positive_int_from_env(var: &str, default: i64) -> i64 {
    env::var(var)
        .ok()
        .and_then(|s| s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}")).ok())
        .filter(|n| {
            if *n <= 0 {
                warn!("🪛️ {var} must be greater than zero. Using the default value of {default}.");
            }
            *n > 0
        })
        .unwrap_or(default)
}

fn seconds_from_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} is not set. Using the default value of {}s.", default.as_secs()))
        .and_then(|s| {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}"))
        })
        .ok()
        .unwrap_or(default)
}

//-------------------------------------------  WebhookHmacConfig  ----------------------------------------------------
/// Signature checking for a provider's webhook. The signature is the base64-encoded HMAC-SHA256 of the raw request
/// body, keyed with `secret`, and sent in the `header` header.
#[derive(Clone, Debug)]
pub struct WebhookHmacConfig {
    pub header: String,
    pub secret: Secret<String>,
    pub enabled: bool,
}

impl WebhookHmacConfig {
    pub fn disabled(header: &str) -> Self {
        Self { header: header.to_string(), secret: Secret::default(), enabled: false }
    }

    /// Reads `{prefix}_HMAC_CHECKS`, `{prefix}_HMAC_SECRET` and `{prefix}_HMAC_HEADER`.
    pub fn from_env(prefix: &str, default_header: &str) -> Self {
        let enabled = parse_boolean_flag(env::var(format!("{prefix}_HMAC_CHECKS")).ok(), false);
        let header = env::var(format!("{prefix}_HMAC_HEADER")).unwrap_or_else(|_| default_header.to_string());
        let secret = Secret::new(env::var(format!("{prefix}_HMAC_SECRET")).unwrap_or_default());
        match (enabled, secret.is_set()) {
            (true, false) => warn!(
                "🚨️ {prefix}_HMAC_CHECKS is on, but {prefix}_HMAC_SECRET is not set. Every webhook call will be \
                 rejected."
            ),
            (false, _) => info!("🪛️ Webhook signature checks for {prefix} are disabled."),
            (true, true) => info!("🪛️ Webhook signatures for {prefix} are checked using the {header} header."),
        }
        Self { header, secret, enabled }
    }
}
