use std::env;
use std::net::IpAddr;

use ::config::{Config as RawConfig, ConfigError, Environment, File};

use crate::http::client::Config as HttpClientConfig;

enum Env {
    Development,
    Test,
    Production,
}

impl Env {
    fn new() -> Self {
        match env::var("RUN_MODE") {
            Ok(ref s) if s == "test" => Env::Test,
            Ok(ref s) if s == "production" => Env::Production,
            _ => Env::Development,
        }
    }

    fn to_string(&self) -> &'static str {
        match self {
            Env::Development => "development",
            Env::Production => "production",
            Env::Test => "test",
        }
    }
}

/// Service configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Listen {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Database {
    pub dsn: String,
}

/// Payment provider credentials. The whole section is optional: without it
/// the checkout, confirmation and webhook endpoints answer 503.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailProvider {
    pub url: String,
    pub api_key: String,
}

/// Transactional mail settings. Providers are tried in order until one
/// accepts the message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mail {
    pub from: String,
    pub providers: Vec<MailProvider>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sentry {
    pub dsn: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Server listen address
    pub listen: Listen,
    /// Database settings
    pub db: Database,
    /// Public base URL of the storefront, used for checkout redirects
    pub site_url: String,
    /// Outbound HTTP client settings
    pub client: HttpClientConfig,
    pub payment: Option<Payment>,
    pub mail: Option<Mail>,
    pub sentry: Option<Sentry>,
}

impl Config {
    /// Creates config from config/base.toml, which is overwritten by
    /// config/<env>.toml, where env is one of development, test, production.
    /// After that it can be overwritten by env variables like FLOCON_LISTEN.
    pub fn new() -> Result<Self, ConfigError> {
        let env = Env::new();
        let mut s = RawConfig::new();

        s.merge(File::with_name("config/base"))?;
        // Optional file specific for environment
        s.merge(File::with_name(&format!("config/{}", env.to_string())).required(false))?;

        s.merge(Environment::with_prefix("FLOCON"))?;

        s.try_into()
    }
}
