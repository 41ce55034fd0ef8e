//! SQL DDL for initializing the watchdesk database.
//! SQLite-first design; every owned table cascades from `users`.

/// Base schema. Statements are separated by `;` and executed one at a time.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,
    first_name TEXT NULL,
    last_name TEXT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    is_admin INTEGER NOT NULL DEFAULT 0,
    subscription_tier TEXT NOT NULL DEFAULT 'free',
    subscription_status TEXT NOT NULL DEFAULT 'none',
    subscription_price REAL NULL,
    subscription_start TEXT NULL, -- YYYY-MM-DD
    subscription_end TEXT NULL,
    stripe_customer_id TEXT NULL,
    stripe_subscription_id TEXT NULL,
    stripe_publishable_key TEXT NULL,
    stripe_secret_key TEXT NULL,
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    token_hash TEXT NOT NULL UNIQUE, -- sha256 hex, the raw token is only mailed
    expires_at TEXT NOT NULL,
    used_at TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    first_name TEXT NULL,
    last_name TEXT NULL,
    company TEXT NULL,
    email TEXT NULL,
    phone TEXT NULL,
    contact_type TEXT NOT NULL DEFAULT 'Customer',
    address_line1 TEXT NULL,
    address_line2 TEXT NULL,
    city TEXT NULL,
    state TEXT NULL,
    postal_code TEXT NULL,
    country TEXT NULL,
    notes TEXT NULL,
    stripe_customer_id TEXT NULL,
    square_customer_id TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_contacts_user ON contacts(user_id);

CREATE TABLE IF NOT EXISTS watches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    brand TEXT NOT NULL,
    model TEXT NOT NULL,
    reference_number TEXT NULL,
    serial_number TEXT NULL,
    year INTEGER NULL,
    condition TEXT NULL,
    accessories TEXT NULL,
    date_purchased TEXT NULL,
    purchased_from TEXT NULL,
    purchase_price REAL NULL,
    seller_contact_id INTEGER NULL REFERENCES contacts(id) ON DELETE SET NULL,
    date_sold TEXT NULL,
    sold_platform TEXT NULL,
    price_sold REAL NULL,
    buyer_contact_id INTEGER NULL REFERENCES contacts(id) ON DELETE SET NULL,
    platform_fees REAL NULL,
    shipping_cost REAL NULL,
    taxes REAL NULL,
    accessories_cost REAL NULL,
    notes TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_watches_user ON watches(user_id);

CREATE TABLE IF NOT EXISTS leads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'new',
    contact_id INTEGER NULL REFERENCES contacts(id) ON DELETE SET NULL,
    watch_id INTEGER NULL REFERENCES watches(id) ON DELETE SET NULL,
    reminder_date TEXT NULL,
    notes TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_leads_user ON leads(user_id);

CREATE TABLE IF NOT EXISTS cards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    contact_id INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
    brand TEXT NULL,
    last4 TEXT NOT NULL,
    exp_month INTEGER NOT NULL,
    exp_year INTEGER NOT NULL,
    cardholder_name TEXT NULL,
    provider_token TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invoices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    contact_id INTEGER NULL REFERENCES contacts(id) ON DELETE SET NULL,
    watch_id INTEGER NULL REFERENCES watches(id) ON DELETE SET NULL,
    provider TEXT NOT NULL DEFAULT 'stripe',
    provider_invoice_id TEXT NULL UNIQUE,
    number TEXT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    currency TEXT NOT NULL DEFAULT 'usd',
    total REAL NOT NULL DEFAULT 0,
    due_date TEXT NULL,
    hosted_url TEXT NULL,
    memo TEXT NULL,
    paid_at TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invoice_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    invoice_id INTEGER NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
    description TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 1,
    unit_price REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS promo_signups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL COLLATE NOCASE,
    phone TEXT NULL,
    message TEXT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    user_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    reviewed_at TEXT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(campaign, email)
)
"#;

/// Columns added after the first release. Each is applied only when
/// `PRAGMA table_info` shows it missing, so the list is safe to rerun.
pub const SQLITE_COLUMN_MIGRATIONS: &[(&str, &str, &str)] = &[
    ("users", "square_access_token", "TEXT NULL"),
    ("users", "square_location_id", "TEXT NULL"),
    ("contacts", "square_customer_id", "TEXT NULL"),
    ("invoices", "memo", "TEXT NULL"),
];
