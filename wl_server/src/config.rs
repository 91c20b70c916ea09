use std::{env, io::Write, time::Duration as StdDuration};

use chrono::Duration;
use gateway_tools::{PaypalConfig, StripeConfig};
use log::*;
use rand::{thread_rng, RngCore};
use tempfile::NamedTempFile;
use wl_common::Secret;

use crate::errors::ServerError;

const DEFAULT_WL_HOST: &str = "127.0.0.1";
const DEFAULT_WL_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/wick_lather.db";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
const DEFAULT_UNPAID_ORDER_TIMEOUT: Duration = Duration::hours(48);
const DEFAULT_EXPIRY_CHECK_INTERVAL: StdDuration = StdDuration::from_secs(15 * 60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// The storefront's base URL. The hosted payment page sends buyers back here.
    pub public_url: String,
    /// The time before an unpaid order is considered abandoned and cancelled.
    pub unpaid_order_timeout: Duration,
    /// How often the expiry worker looks for abandoned orders.
    pub expiry_check_interval: StdDuration,
    pub stripe: StripeConfig,
    pub paypal: PaypalConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WL_HOST.to_string(),
            port: DEFAULT_WL_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            unpaid_order_timeout: DEFAULT_UNPAID_ORDER_TIMEOUT,
            expiry_check_interval: DEFAULT_EXPIRY_CHECK_INTERVAL,
            stripe: StripeConfig::default(),
            paypal: PaypalConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("WL_HOST").ok().unwrap_or_else(|| DEFAULT_WL_HOST.into());
        let port = env::var("WL_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for WL_PORT. {e} Using the default, {DEFAULT_WL_PORT}, instead.");
                    DEFAULT_WL_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_WL_PORT);
        let database_url = env::var("WL_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ WL_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let public_url = env::var("WL_PUBLIC_URL").ok().unwrap_or_else(|| {
            info!("🪛️ WL_PUBLIC_URL is not set. Checkout redirects will go to {DEFAULT_PUBLIC_URL}.");
            DEFAULT_PUBLIC_URL.to_string()
        });
        let (unpaid_order_timeout, expiry_check_interval) = configure_expiry();
        Self {
            host,
            port,
            database_url,
            auth,
            public_url,
            unpaid_order_timeout,
            expiry_check_interval,
            stripe: StripeConfig::new_from_env_or_default(),
            paypal: PaypalConfig::new_from_env_or_default(),
        }
    }
}

fn configure_expiry() -> (Duration, StdDuration) {
    let unpaid_order_timeout = env::var("WL_UNPAID_ORDER_TIMEOUT")
        .map_err(|_| {
            info!(
                "🪛️ WL_UNPAID_ORDER_TIMEOUT is not set. Using the default value of {} hrs.",
                DEFAULT_UNPAID_ORDER_TIMEOUT.num_hours()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::hours)
                .map_err(|e| warn!("🪛️ Invalid configuration value for WL_UNPAID_ORDER_TIMEOUT. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_UNPAID_ORDER_TIMEOUT);
    let expiry_check_interval = env::var("WL_EXPIRY_CHECK_INTERVAL")
        .map_err(|_| {
            info!(
                "🪛️ WL_EXPIRY_CHECK_INTERVAL is not set. Using the default value of {} mins.",
                DEFAULT_EXPIRY_CHECK_INTERVAL.as_secs() / 60
            )
        })
        .and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for WL_EXPIRY_CHECK_INTERVAL. {e}"))
                .and_then(|mins| match mins {
                    0 => Err(warn!("🪛️ WL_EXPIRY_CHECK_INTERVAL must be at least one minute.")),
                    m => Ok(StdDuration::from_secs(m * 60)),
                })
        })
        .ok()
        .unwrap_or(DEFAULT_EXPIRY_CHECK_INTERVAL);
    (unpaid_order_timeout, expiry_check_interval)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret shared with the identity provider that issues access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. No token issued \
             elsewhere will be accepted. DO NOT operate on production like this. 🚨️🚨️🚨️"
        );
        let mut bytes = [0u8; 32];
        thread_rng().fill_bytes(&mut bytes);
        let secret = hex::encode(bytes);
        match &mut tmpfile {
            Some((f, p)) => match writeln!(f, "{secret}") {
                Ok(()) => warn!(
                    "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, you \
                     are doing it wrong! Set the WL_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                    p.to_str().unwrap_or("???")
                ),
                Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret. ");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Secret::new(secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("WL_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [WL_JWT_SECRET]")))?;
        if secret.trim().len() < 32 {
            return Err(ServerError::ConfigurationError(
                "WL_JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }
        Ok(Self::new(secret))
    }
}
