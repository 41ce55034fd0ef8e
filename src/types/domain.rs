use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Suspended,
    Invited,
}

/// Subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Operandi,
    Platinum,
}

impl Tier {
    /// Maximum number of unsold watches; `None` is unlimited.
    pub fn max_active_watches(self) -> Option<i64> {
        match self {
            Tier::Free => Some(25),
            Tier::Operandi => Some(500),
            Tier::Platinum => None,
        }
    }

    pub fn default_monthly_price(self) -> f64 {
        match self {
            Tier::Free => 0.0,
            Tier::Operandi => 29.0,
            Tier::Platinum => 99.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[serde(rename = "none")]
    #[sqlx(rename = "none")]
    Inactive,
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn grants_tier(self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ContactType {
    Lead,
    Customer,
    WatchTrader,
    Jeweler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Negotiating,
    Won,
    Lost,
}

impl LeadStatus {
    pub fn is_open(self) -> bool {
        matches!(
            self,
            LeadStatus::New | LeadStatus::Contacted | LeadStatus::Negotiating
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Open,
    Paid,
    Void,
    Uncollectible,
    PaymentFailed,
}

impl InvoiceStatus {
    /// Paid and void are terminal; webhook replays never move an invoice out of them.
    pub fn can_become(self, next: InvoiceStatus) -> bool {
        match self {
            InvoiceStatus::Paid | InvoiceStatus::Void => self == next,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentProvider {
    #[default]
    Stripe,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PromoStatus {
    Pending,
    Approved,
    Rejected,
}

/// One-time tokens mailed to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TokenKind {
    Verify,
    Reset,
    Invite,
}

impl TokenKind {
    pub fn ttl(self) -> Duration {
        match self {
            TokenKind::Verify => Duration::hours(48),
            TokenKind::Reset => Duration::hours(1),
            TokenKind::Invite => Duration::days(7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

macro_rules! lenient_from_str {
    ($ty:ty, $kind:literal, { $($name:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let key: String = s
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_lowercase();
                match key.as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(ParseEnumError { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

lenient_from_str!(UserStatus, "user status", {
    "pending" => UserStatus::Pending,
    "active" => UserStatus::Active,
    "suspended" => UserStatus::Suspended,
    "invited" => UserStatus::Invited,
});

lenient_from_str!(Tier, "tier", {
    "free" => Tier::Free,
    "operandi" => Tier::Operandi,
    "platinum" => Tier::Platinum,
});

lenient_from_str!(SubscriptionStatus, "subscription status", {
    "none" => SubscriptionStatus::Inactive,
    "incomplete" => SubscriptionStatus::Inactive,
    "incompleteexpired" => SubscriptionStatus::Canceled,
    "trialing" => SubscriptionStatus::Trialing,
    "active" => SubscriptionStatus::Active,
    "pastdue" => SubscriptionStatus::PastDue,
    "unpaid" => SubscriptionStatus::PastDue,
    "paused" => SubscriptionStatus::PastDue,
    "canceled" => SubscriptionStatus::Canceled,
});

lenient_from_str!(ContactType, "contact type", {
    "lead" => ContactType::Lead,
    "customer" => ContactType::Customer,
    "buyer" => ContactType::Customer,
    "watchtrader" => ContactType::WatchTrader,
    "trader" => ContactType::WatchTrader,
    "dealer" => ContactType::WatchTrader,
    "jeweler" => ContactType::Jeweler,
    "jeweller" => ContactType::Jeweler,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_type_parsing_is_lenient() {
        assert_eq!("Watch Trader".parse(), Ok(ContactType::WatchTrader));
        assert_eq!("JEWELLER".parse(), Ok(ContactType::Jeweler));
        assert!("plumber".parse::<ContactType>().is_err());
    }

    #[test]
    fn stripe_statuses_map_onto_local_ones() {
        assert_eq!("past_due".parse(), Ok(SubscriptionStatus::PastDue));
        assert_eq!("unpaid".parse(), Ok(SubscriptionStatus::PastDue));
        assert_eq!("trialing".parse(), Ok(SubscriptionStatus::Trialing));
    }

    #[test]
    fn paid_invoices_are_terminal() {
        assert!(!InvoiceStatus::Paid.can_become(InvoiceStatus::Open));
        assert!(InvoiceStatus::Paid.can_become(InvoiceStatus::Paid));
        assert!(InvoiceStatus::Open.can_become(InvoiceStatus::Paid));
        assert!(InvoiceStatus::PaymentFailed.can_become(InvoiceStatus::Paid));
    }

    #[test]
    fn platinum_has_no_limit() {
        assert_eq!(Tier::Platinum.max_active_watches(), None);
        assert_eq!(Tier::Free.max_active_watches(), Some(25));
    }
}
