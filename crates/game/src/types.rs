//! types
//!
//! This module contains types that don't really fit elsewhere.

use num_enum::IntoPrimitive;
use strum_macros::EnumString;

#[allow(non_camel_case_types)]
#[repr(u8)]
#[derive(EnumString, IntoPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Locale {
    enUS = 0,
    koKR,
    frFR,
    deDE,
    zhCN,
    esES,
    esMX,
    ruRU,
}

impl Locale {
    /// Parses the reversed four-byte magic the client puts on the wire
    /// (`"SUne"` for `enUS`).
    pub fn from_magic(magic: [u8; 4]) -> Option<Self> {
        let reversed: Vec<u8> = magic.iter().rev().copied().collect();
        std::str::from_utf8(&reversed).ok()?.parse().ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn locale_magic_is_reversed_ascii() {
        assert_eq!(Locale::from_magic(*b"SUne"), Some(Locale::enUS));
        assert_eq!(Locale::from_magic(*b"RFrf"), Some(Locale::frFR));
        assert_eq!(Locale::from_magic(*b"\0\0\0\0"), None);
    }
}
