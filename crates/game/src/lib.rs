//! aegis-game
//!
//! Domain types and store-trait contracts shared by the login and realm
//! services: accounts, realms, characters, groups and social lists.

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications,
    clippy::useless_conversion,
    clippy::unwrap_used,
    clippy::todo,
    clippy::unimplemented
)]

pub mod accounts;
pub mod characters;
pub mod groups;
pub mod guid;
pub mod memory;
pub mod realms;
pub mod social;
pub mod types;
