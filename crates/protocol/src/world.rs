//! world
//!
//! The realm↔world uplink: world nodes dial the realm on startup,
//! declare which maps they can host, and from then on exchange
//! character placements, opaque proxied client frames and state syncs.
//! Framed like the login uplink: `u32` length prefix + `wow_bincode`
//! body.

use aegis_game::characters::{CharacterId, CharacterSnapshot};
use serde::{Deserialize, Serialize};

/// Carried in [`WorldToRealm::Login`]; a mismatch refuses the node.
pub const WORLD_PROTOCOL_VERSION: u32 = 0x0004;

/// Why a character is no longer on a world node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldLeftReason {
    /// Clean logout; the session returns to the character screen.
    Logout,
    /// Mid-transfer to another map; the session stays alive and waits
    /// for the new placement.
    Teleport,
    /// The client vanished or the node is shutting the character down.
    Disconnect,
}

/// A world node's explanation for a failed placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldInstanceError {
    UnsupportedMap,
    TooManyInstances,
    InternalError,
}

/// The realm's verdict on a world node's [`WorldToRealm::Login`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeLoginResult {
    Success,
    /// Every map the node offered is already hosted elsewhere.
    MapsAlreadyInUse,
    UnsupportedVersion,
}

/// A client frame relayed between the realm and a world node. The realm
/// never interprets the body, only the routing header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProxyPacket {
    pub character: CharacterId,
    pub opcode: u16,
    pub body: Vec<u8>,
}

/// Everything a world node can send to the realm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorldToRealm {
    /// First frame after connect: which maps this node can simulate and
    /// which instances it already runs (after a node restart mid-realm).
    Login {
        protocol_version: u32,
        maps: Vec<u32>,
        instances: Vec<u32>,
    },
    KeepAlive,

    /// A `CharacterLogIn` succeeded; the character is standing in the
    /// world at the given spot.
    InstanceEntered {
        character: CharacterId,
        instance: u32,
        world_object: u64,
        map: u32,
        zone: u32,
        position: (f32, f32, f32),
        orientation: f32,
    },
    InstanceLeft {
        character: CharacterId,
        reason: WorldLeftReason,
    },
    InstanceError {
        character: CharacterId,
        error: WorldInstanceError,
    },

    Proxy(ClientProxyPacket),

    /// Authoritative state sync; the realm refreshes its shadow and
    /// persists.
    CharacterData(CharacterSnapshot),

    /// The simulation wants this character on another map (portal,
    /// hearthstone, dungeon entrance).
    TeleportRequest {
        character: CharacterId,
        map: u32,
        position: (f32, f32, f32),
        orientation: f32,
    },

    /// Periodic vitals for group-member frames; `nearby` members already
    /// saw the change in-world and are skipped.
    GroupUpdate {
        character: CharacterId,
        nearby: Vec<CharacterId>,
        level: u8,
        health: u32,
        max_health: u32,
        power_type: u8,
        power: u32,
        max_power: u32,
        map: u32,
        zone: u32,
        position: (f32, f32, f32),
    },
    QuestUpdate {
        character: CharacterId,
        quest: u32,
        status: u8,
        counters: [u16; 4],
    },
    CharacterSpawned {
        character: CharacterId,
    },

    MailDraft {
        sender: CharacterId,
        receiver_name: String,
        subject: String,
        body: String,
        money: u32,
        cost: u32,
    },
    MailGetList {
        character: CharacterId,
    },
    MailMarkAsRead {
        character: CharacterId,
        mail_id: u32,
    },
}

/// Everything the realm can send to a world node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RealmToWorld {
    LoginAnswer {
        result: NodeLoginResult,
        realm_name: String,
    },

    /// Place a character. `instance` pins a specific live copy (group
    /// binding); `None` lets the node pick or create one.
    CharacterLogIn {
        character: u64,
        instance: Option<u32>,
        snapshot: CharacterSnapshot,
    },
    LeaveInstance {
        character: CharacterId,
        reason: WorldLeftReason,
    },

    Proxy(ClientProxyPacket),

    /// Chat the realm couldn't resolve locally: say/yell ranges, and
    /// whispers addressed to another realm of the cluster.
    ChatMessage {
        character: u64,
        chat_type: u8,
        language: u32,
        receiver: String,
        channel: String,
        message: String,
    },
    IgnoreList {
        character: CharacterId,
        ignored: Vec<u64>,
    },
    ItemData {
        character: CharacterId,
        items: Vec<ItemStack>,
    },
    SpellLearned {
        character: CharacterId,
        spell: u32,
    },
    MoneyChange {
        character: CharacterId,
        amount: u32,
        remove: bool,
    },
    GroupChanged {
        character: CharacterId,
        group: u64,
    },
}

/// One inventory stack handed to a world node on placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: u32,
    pub count: u8,
    pub slot: u8,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wow_bincode;
    use aegis_game::characters::CharacterSnapshot;
    use bincode::Options;

    #[test]
    fn proxy_packet_round_trips() {
        let packet = ClientProxyPacket {
            character: CharacterId(7),
            opcode: 0x1FE,
            body: vec![1, 2, 3, 4],
        };

        let encoded = wow_bincode().serialize(&packet).unwrap();
        let decoded: ClientProxyPacket = wow_bincode().deserialize(&encoded).unwrap();

        assert_eq!(decoded.character, packet.character);
        assert_eq!(decoded.opcode, packet.opcode);
        assert_eq!(decoded.body, packet.body);
    }

    #[test]
    fn character_login_round_trips_with_and_without_a_binding() {
        let snapshot = CharacterSnapshot {
            id: CharacterId(12),
            name: "THRALL".into(),
            race: 2,
            class: 7,
            gender: 0,
            level: 60,
            map: 1,
            zone: 14,
            position_x: 100.0,
            position_y: -20.5,
            position_z: 33.0,
            orientation: 1.5,
            home_map: 1,
            home_zone: 14,
            home_position: (100.0, -20.5, 33.0),
            money: 12345,
            spells: vec![331, 403],
        };

        for instance in [None, Some(7u32)] {
            let message = RealmToWorld::CharacterLogIn {
                character: 0xDEAD_BEEF,
                instance,
                snapshot: snapshot.clone(),
            };
            let bytes = wow_bincode().serialize(&message).unwrap();
            match wow_bincode().deserialize(&bytes).unwrap() {
                RealmToWorld::CharacterLogIn {
                    character,
                    instance: decoded_instance,
                    snapshot: decoded,
                } => {
                    assert_eq!(character, 0xDEAD_BEEF);
                    assert_eq!(decoded_instance, instance);
                    assert_eq!(decoded, snapshot);
                }
                other => panic!("decoded to the wrong variant: {other:?}"),
            }
        }
    }

    #[test]
    fn instance_left_reasons_are_distinct_on_the_wire() {
        let mut encodings = Vec::new();
        for reason in [
            WorldLeftReason::Logout,
            WorldLeftReason::Teleport,
            WorldLeftReason::Disconnect,
        ] {
            let message = WorldToRealm::InstanceLeft {
                character: CharacterId(1),
                reason,
            };
            encodings.push(wow_bincode().serialize(&message).unwrap());
        }
        assert_ne!(encodings[0], encodings[1]);
        assert_ne!(encodings[1], encodings[2]);
    }
}
