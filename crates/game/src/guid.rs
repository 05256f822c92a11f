//! guid
//!
//! Cluster-wide object identifiers. A character's database id is only
//! unique within one realm's character store, so every id shown to a
//! client is widened to 64 bits with the realm id and the object kind
//! packed into the high bits. Extracting the low 32 bits always yields
//! the database id back, unchanged.

use crate::{characters::CharacterId, realms::RealmId};

/// What kind of object a [`Guid`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GuidKind {
    Player = 0x0,
    Item = 0x1,
    GameObject = 0x2,
    Unit = 0x3,
    Pet = 0x4,
}

/// A packed 64-bit cluster-wide identifier:
///
/// ```text
/// | 63 .. 56 | 55 .. 52 | 51 .. 32 | 31 .. 0      |
/// | reserved | kind     | realm id | database id  |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Guid(pub u64);

const REALM_BITS: u64 = 20;
const REALM_MASK: u64 = (1 << REALM_BITS) - 1;

impl Guid {
    /// Packs a database id, the owning realm and the object kind.
    pub fn new(database_id: u32, realm: RealmId, kind: GuidKind) -> Self {
        Self(
            u64::from(database_id)
                | (u64::from(realm.0) & REALM_MASK) << 32
                | (kind as u64) << (32 + REALM_BITS),
        )
    }

    /// A player guid for a character row on the given realm.
    pub fn player(character: CharacterId, realm: RealmId) -> Self {
        Self::new(character.0, realm, GuidKind::Player)
    }

    /// The database id this guid was packed from.
    pub fn database_id(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// The realm the object lives on.
    pub fn realm(self) -> RealmId {
        RealmId(((self.0 >> 32) & REALM_MASK) as u32)
    }

    /// The character id, when this guid refers to a player.
    pub fn character(self) -> Option<CharacterId> {
        match self.kind() {
            Some(GuidKind::Player) => Some(CharacterId(self.database_id())),
            _ => None,
        }
    }

    fn kind(self) -> Option<GuidKind> {
        match (self.0 >> (32 + REALM_BITS)) & 0xF {
            0x0 => Some(GuidKind::Player),
            0x1 => Some(GuidKind::Item),
            0x2 => Some(GuidKind::GameObject),
            0x3 => Some(GuidKind::Unit),
            0x4 => Some(GuidKind::Pet),
            _ => None,
        }
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn low_bits_round_trip_the_database_id() {
        for id in [0u32, 1, 0xFFFF_FFFF, 0x8000_0001] {
            for realm in [RealmId(0), RealmId(1), RealmId(0xF_FFFF)] {
                let guid = Guid::new(id, realm, GuidKind::Player);
                assert_eq!(guid.database_id(), id);
                assert_eq!(guid.realm(), realm);
            }
        }
    }

    #[test]
    fn character_extraction_requires_a_player_guid() {
        let character = CharacterId(77);
        let guid = Guid::player(character, RealmId(3));
        assert_eq!(guid.character(), Some(character));

        let item = Guid::new(77, RealmId(3), GuidKind::Item);
        assert_eq!(item.character(), None);
    }

    #[test]
    fn same_database_id_on_different_realms_packs_differently() {
        let a = Guid::player(CharacterId(9), RealmId(1));
        let b = Guid::player(CharacterId(9), RealmId(2));
        assert_ne!(a, b);
        assert_eq!(a.database_id(), b.database_id());
    }
}
