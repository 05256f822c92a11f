//! wow_bincode
//!
//! The legacy client expects fixed-width integers and null-terminated
//! strings rather than bincode's varint-length-prefixed defaults, so every
//! wire struct in this crate is encoded through this options builder
//! instead of the top-level `bincode::serialize`.

use bincode::Options;

/// Returns the bincode configuration every wire type in this crate is
/// encoded/decoded with: fixed-width integers, little-endian byte order.
pub fn wow_bincode() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_null_terminated_str_encoding()
        .allow_trailing_bytes()
}
