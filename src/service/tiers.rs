use crate::db::Storage;
use crate::db::models::User;
use crate::error::AppError;
use crate::types::{SubscriptionStatus, Tier};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionSummary {
    pub tier: Tier,
    pub effective_tier: Tier,
    pub status: SubscriptionStatus,
    pub price: f64,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// `None` when unlimited.
    pub watch_limit: Option<i64>,
    pub active_watches: i64,
}

pub fn summarize(user: &User, active_watches: i64) -> SubscriptionSummary {
    let effective = user.effective_tier();
    SubscriptionSummary {
        tier: user.subscription_tier,
        effective_tier: effective,
        status: user.subscription_status,
        price: user
            .subscription_price
            .unwrap_or_else(|| user.subscription_tier.default_monthly_price()),
        start: user.subscription_start,
        end: user.subscription_end,
        watch_limit: effective.max_active_watches(),
        active_watches,
    }
}

/// Refuse to add `adding` unsold watches beyond the effective tier's limit.
pub fn check_capacity(tier: Tier, active: i64, adding: i64) -> Result<(), AppError> {
    match tier.max_active_watches() {
        Some(limit) if active + adding > limit => Err(AppError::Forbidden(format!(
            "The {} plan allows {limit} unsold watches; upgrade to add more",
            tier_label(tier)
        ))),
        _ => Ok(()),
    }
}

pub async fn ensure_capacity(storage: &Storage, user: &User, adding: i64) -> Result<(), AppError> {
    if adding <= 0 {
        return Ok(());
    }
    let active = storage.count_unsold_watches(user.id).await?;
    check_capacity(user.effective_tier(), active, adding)
}

fn tier_label(tier: Tier) -> &'static str {
    match tier {
        Tier::Free => "Free",
        Tier::Operandi => "Operandi",
        Tier::Platinum => "Platinum",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_stops_at_limit() {
        assert!(check_capacity(Tier::Free, 24, 1).is_ok());
        let err = check_capacity(Tier::Free, 25, 1).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(check_capacity(Tier::Operandi, 25, 400).is_ok());
        assert!(check_capacity(Tier::Platinum, 1_000_000, 1).is_ok());
    }
}
