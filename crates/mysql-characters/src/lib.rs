//! aegis-mysql-characters
//!
//! `sqlx`-backed implementations of the character, social-list and group
//! store traits from `aegis-game`.

#![deny(missing_debug_implementations, unsafe_code)]

pub mod characters;
pub mod groups;
pub mod social;

pub use characters::MySQLCharacterService;
pub use groups::MySQLGroupService;
pub use social::MySQLSocialService;
