use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Environment prefix for every configuration key, e.g. `WATCHDESK_DATABASE_URL`.
pub const ENV_PREFIX: &str = "WATCHDESK_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
    pub body_limit_bytes: usize,
    /// Public URL of the web app, used to build links in outgoing mail.
    pub app_url: Url,
    /// Receives promo signup notifications when set.
    pub admin_email: Option<String>,
    pub login_attempts_per_minute: u32,
    pub email: EmailConfig,
    pub stripe: StripeConfig,
    pub square: SquareConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmailMode {
    Smtp,
    Memory,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub mode: EmailMode,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    pub api_base: Url,
    /// Platform account key, used to look up subscriptions whose webhook events name no plan.
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    /// Accepted clock skew for `Stripe-Signature` timestamps, in seconds.
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SquareConfig {
    pub api_base: Url,
    pub api_version: String,
    pub webhook_signature_key: Option<String>,
    /// The notification URL registered with Square; part of the signed payload.
    pub webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:watchdesk.db".to_string(),
            loglevel: "info".to_string(),
            jwt_secret: String::new(),
            jwt_ttl_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cors_origins: Vec::new(),
            body_limit_bytes: 10 * 1024 * 1024,
            app_url: Url::parse("http://localhost:3000").expect("static url"),
            admin_email: None,
            login_attempts_per_minute: 10,
            email: EmailConfig::default(),
            stripe: StripeConfig::default(),
            square: SquareConfig::default(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            mode: EmailMode::Log,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from: "Watchdesk <no-reply@watchdesk.local>".to_string(),
        }
    }
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse("https://api.stripe.com/v1/").expect("static url"),
            secret_key: None,
            webhook_secret: None,
            webhook_tolerance_secs: 300,
        }
    }
}

impl Default for SquareConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse("https://connect.squareup.com/v2/").expect("static url"),
            api_version: "2024-10-17".to_string(),
            webhook_signature_key: None,
            webhook_url: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Config {
    /// Defaults overlaid with `WATCHDESK_*` environment variables.
    /// Nested keys use a double underscore: `WATCHDESK_EMAIL__MODE=smtp`.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        let cfg: Config = Self::figment().extract().map_err(Box::new)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Missing("WATCHDESK_JWT_SECRET"));
        }
        if self.jwt_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "jwt_ttl_hours",
                reason: "must be positive".to_string(),
            });
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "bcrypt_cost",
                reason: "must be between 4 and 31".to_string(),
            });
        }
        if self.email.mode == EmailMode::Smtp && self.email.smtp_host.trim().is_empty() {
            return Err(ConfigError::Missing("WATCHDESK_EMAIL__SMTP_HOST"));
        }
        Ok(())
    }

    /// Absolute link into the web app, e.g. `link("/verify", token)`.
    pub fn app_link(&self, path: &str, token: &str) -> String {
        let mut url = self.app_url.clone();
        url.set_path(path);
        url.query_pairs_mut().append_pair("token", token);
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_is_rejected() {
        let cfg = Config::default();
        assert!(matches!(cfg.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn app_link_encodes_token() {
        let cfg = Config {
            jwt_secret: "s".into(),
            ..Config::default()
        };
        assert_eq!(
            cfg.app_link("/reset-password", "a b"),
            "http://localhost:3000/reset-password?token=a+b"
        );
    }
}
