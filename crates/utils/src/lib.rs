//! aegis-utils
//!
//! Shared reactor-adjacent utilities used by both services: the outcome
//! type connection handlers return, and a sliding-window rate limiter.

#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications
)]

pub mod parse_result;
pub mod rate_limit;

pub use parse_result::PacketParseResult;
pub use rate_limit::RateWindow;
