//! Database module: models, schema and per-table queries.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and API inputs
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the `Storage` handle, connection and migrations
//! - one module per table group, each adding methods to `Storage`

pub mod cards;
pub mod contacts;
pub mod invoices;
pub mod leads;
pub mod models;
pub mod promo;
pub mod schema;
pub mod sqlite;
pub mod tokens;
pub mod users;
pub mod watches;

pub use models::*;
pub use schema::SQLITE_INIT;
pub use sqlite::{SqlitePool, Storage, connect};
