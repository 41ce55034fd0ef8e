pub mod domain;
pub mod square;
pub mod stripe;

pub use domain::{
    ContactType, InvoiceStatus, LeadStatus, ParseEnumError, PaymentProvider, PromoStatus,
    SubscriptionStatus, Tier, TokenKind, UserStatus,
};
