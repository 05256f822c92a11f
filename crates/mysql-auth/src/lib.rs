//! aegis-mysql-auth
//!
//! `sqlx`-backed implementations of the account and realm-registry store
//! traits from `aegis-game`.

#![deny(missing_debug_implementations, unsafe_code)]

pub mod accounts;
pub mod realms;

pub use accounts::MySQLAccountService;
pub use realms::MySQLRealmList;
