//! Outbound HTTP clients for the payment providers.

pub mod square;
pub mod stripe;

use crate::config::Config;
use crate::error::AppError;
use backon::ExponentialBuilder;
use std::time::Duration;

pub use square::{SquareApi, SquareLine};
pub use stripe::{StripeApi, StripeLine};

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(3)
        .with_jitter()
}

/// Both provider clients, sharing one connection pool.
#[derive(Clone)]
pub struct Payments {
    pub stripe: StripeApi,
    pub square: SquareApi,
}

impl Payments {
    pub fn from_config(cfg: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("watchdesk/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()?;
        let retry = default_retry_policy();
        Ok(Self {
            stripe: StripeApi::new(http.clone(), cfg.stripe.api_base.clone(), retry),
            square: SquareApi::new(
                http,
                cfg.square.api_base.clone(),
                cfg.square.api_version.clone(),
                retry,
            ),
        })
    }
}
