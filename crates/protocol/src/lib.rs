//! aegis-protocol
//!
//! Wire opcodes and packet bodies for the login protocol, the realm
//! protocol, and the two internal uplinks (login↔realm, realm↔world).

#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications
)]

pub mod login;
pub mod opcodes;
pub mod realm;
pub mod uplink;
pub mod world;
mod wow_bincode;

pub use wow_bincode::wow_bincode;
