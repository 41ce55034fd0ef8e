//! Operator commands against the watchdesk database.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use watchdesk::AppError;
use watchdesk::config::Config;
use watchdesk::db::users::SubscriptionUpdate;
use watchdesk::db::{Storage, User};
use watchdesk::service::auth::{JwtKeys, hash_password};
use watchdesk::service::validation::check_password;
use watchdesk::types::{SubscriptionStatus, Tier, UserStatus};

#[derive(Debug, Parser)]
#[command(name = "watchdesk-admin", version, about = "Maintenance commands for a watchdesk database")]
struct Cli {
    /// Overrides `WATCHDESK_DATABASE_URL`.
    #[arg(long, value_name = "url")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create missing tables and columns.
    Migrate,
    /// Print every account.
    ListUsers,
    /// Set an account's status (pending, active, suspended, invited).
    SetStatus { email: String, status: String },
    /// Replace an account's password.
    ResetPassword { email: String, password: String },
    /// Grant admin rights.
    Promote { email: String },
    /// Put an account on a plan with an active subscription.
    SetTier { email: String, tier: String },
    /// Decode a JWT and report whose it is and whether it is still valid.
    AuditToken { token: String },
}

async fn user_by_email(storage: &Storage, email: &str) -> Result<User, AppError> {
    storage
        .find_user_by_email(email.trim())
        .await?
        .ok_or(AppError::NotFound("User"))
}

fn print_user(u: &User) {
    println!(
        "{:>5}  {:<24} {:<32} {:<9} {:<8} {:<9} admin={}",
        u.id,
        u.username,
        u.email,
        format!("{:?}", u.status).to_lowercase(),
        format!("{:?}", u.subscription_tier).to_lowercase(),
        format!("{:?}", u.effective_tier()).to_lowercase(),
        u.is_admin
    );
}

fn audit_token(cfg: &Config, token: &str) -> Result<(), AppError> {
    let keys = JwtKeys::new(&cfg.jwt_secret, cfg.jwt_ttl_hours);
    let claims = keys.inspect(token)?;
    let expires = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_default();
    let state = if expires > Utc::now() { "valid" } else { "expired" };
    println!(
        "user_id={} username={} admin={} expires={} ({state})",
        claims.sub,
        claims.username,
        claims.admin,
        expires.to_rfc3339()
    );
    Ok(())
}

async fn run(cli: Cli, cfg: Config) -> Result<(), AppError> {
    let database_url = cli.database_url.unwrap_or_else(|| cfg.database_url.clone());
    let open = || watchdesk::db::connect(&database_url);

    match cli.command {
        Command::AuditToken { token } => audit_token(&cfg, &token)?,
        Command::Migrate => {
            // Connecting creates missing tables and columns.
            open().await?;
            println!("schema up to date");
        }
        Command::ListUsers => {
            let storage = open().await?;
            for u in storage.list_users().await? {
                print_user(&u);
            }
        }
        Command::SetStatus { email, status } => {
            let storage = open().await?;
            let status: UserStatus = status
                .parse()
                .map_err(|e| AppError::validation(format!("{e}")))?;
            let user = user_by_email(&storage, &email).await?;
            storage.set_user_status(user.id, status).await?;
            println!("{} is now {:?}", user.email, status);
        }
        Command::ResetPassword { email, password } => {
            let storage = open().await?;
            check_password(&password)?;
            let user = user_by_email(&storage, &email).await?;
            let hash = hash_password(&password, cfg.bcrypt_cost).await?;
            storage.set_password_hash(user.id, &hash).await?;
            println!("password updated for {}", user.email);
        }
        Command::Promote { email } => {
            let storage = open().await?;
            let user = user_by_email(&storage, &email).await?;
            storage.set_user_admin(user.id, true).await?;
            println!("{} is now an admin", user.email);
        }
        Command::SetTier { email, tier } => {
            let storage = open().await?;
            let tier: Tier = tier
                .parse()
                .map_err(|e| AppError::validation(format!("{e}")))?;
            let user = user_by_email(&storage, &email).await?;
            let update = SubscriptionUpdate {
                tier,
                status: match tier {
                    Tier::Free => SubscriptionStatus::Inactive,
                    _ => SubscriptionStatus::Active,
                },
                price: Some(tier.default_monthly_price()),
                start: Some(Utc::now().date_naive()),
                end: None,
                stripe_customer_id: None,
                stripe_subscription_id: None,
            };
            storage.update_subscription(user.id, &update).await?;
            println!("{} is now on {:?}", user.email, tier);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    // Only the keys a command needs have to be present.
    let cfg: Config = Config::figment().extract()?;
    run(cli, cfg).await?;
    Ok(())
}
