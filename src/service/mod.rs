pub mod auth;
pub mod billing;
pub mod email;
pub mod import;
pub mod profit;
pub mod throttle;
pub mod tiers;
pub mod validation;
pub mod webhooks;
