//! realm
//!
//! Wire bodies for the realm protocol: the post-login handshake
//! (`AuthSession`/`AuthResponse`), char-select, the in-world opening
//! sequence, chat/who/social/group traffic the realm answers itself, and
//! the transfer opcodes used to hand a session off between world nodes.

use aegis_game::{
    characters::{ActionButton, Character, CharacterId, NewCharacter},
    guid::Guid,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::opcodes::{Expansion, ResponseCode};

/// An addon entry reported by the client in `AuthSession`.
#[derive(Debug, Clone, PartialEq)]
pub struct Addon {
    pub name: String,
    pub uses_public_key: bool,
    pub crc: u32,
    pub version: u32,
}

/// `CMSG_AUTH_SESSION`: the realm-side half of the handshake, carrying the
/// session key proof and the addon manifest (sent zlib-compressed on the
/// wire; decompression happens before this type is built).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub build: u32,
    pub username: String,
    pub local_challenge: [u8; 4],
    pub client_proof: [u8; 20],
    pub addons: Vec<Addon>,
}

/// A single known-quantity item slot shown on the char-select screen.
#[derive(Debug, Serialize, Clone, Copy, Default)]
pub struct EquipSlot {
    pub display_id: u32,
    pub inventory_type: u8,
    pub enchant_aura_id: u32,
}

/// The number of equipment slots a char-enum row reports, bags included.
pub const CHAR_ENUM_EQUIPMENT_SLOTS: usize = 20;

/// One row of the char-select screen. The `guid` is the cluster-wide
/// packed id, never the bare database id.
#[derive(Debug, Clone)]
pub struct CharEnumEntry {
    pub guid: Guid,
    pub character: Character,
    pub guild: u32,
    pub first_login: bool,
    pub equipment: [EquipSlot; CHAR_ENUM_EQUIPMENT_SLOTS],
}

/// Chat message categories, as tagged by the client.
#[repr(u8)]
#[derive(
    TryFromPrimitive, IntoPrimitive, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum ChatType {
    System = 0x00,
    Say = 0x01,
    Party = 0x02,
    Raid = 0x03,
    Guild = 0x04,
    Officer = 0x05,
    Yell = 0x06,
    Whisper = 0x07,
    WhisperInform = 0x08,
    Emote = 0x0A,
    TextEmote = 0x0B,
    Channel = 0x11,
    RaidWarning = 0x14,
}

/// `CMSG_MESSAGECHAT`, after the type-specific leading fields have been
/// folded into `recipient`/`channel`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessageRequest {
    pub chat_type: ChatType,
    pub language: u32,
    pub recipient: Option<String>,
    pub channel: Option<String>,
    pub message: String,
}

/// The most zones a `Who` filter may carry; larger requests are refused.
pub const MAX_WHO_ZONES: usize = 10;
/// The most search strings a `Who` filter may carry.
pub const MAX_WHO_STRINGS: usize = 4;

/// `CMSG_WHO`'s filter set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhoRequest {
    pub min_level: u32,
    pub max_level: u32,
    pub player_name: String,
    pub guild_name: String,
    pub race_mask: u32,
    pub class_mask: u32,
    pub zones: Vec<u32>,
    pub strings: Vec<String>,
}

impl WhoRequest {
    /// Whether the filter fits the protocol's hard caps. Oversized
    /// filters are dropped without a response.
    pub fn within_limits(&self) -> bool {
        self.zones.len() <= MAX_WHO_ZONES && self.strings.len() <= MAX_WHO_STRINGS
    }
}

/// One row of a `Who` response.
#[derive(Debug, Clone, Serialize)]
pub struct WhoEntry {
    pub name: String,
    pub guild: String,
    pub level: u32,
    pub class: u32,
    pub race: u32,
    pub zone: u32,
}

/// A social-list row as serialized to the client.
#[derive(Debug, Clone, Serialize)]
pub struct SocialListEntry {
    pub guid: u64,
    pub flags: u8,
    pub note: String,
    /// 1 when the contact is currently online on this realm.
    pub status: u8,
}

/// One mailbox row as serialized to the client.
#[derive(Debug, Clone, Serialize)]
pub struct MailListEntry {
    pub id: u32,
    pub sender: u64,
    pub subject: String,
    pub money: u32,
    pub read: bool,
}

/// The party operation a [`ServerPacket::PartyCommandResult`] refers to.
#[repr(u8)]
#[derive(Serialize, IntoPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(into = "u8")]
pub enum PartyOperation {
    Invite = 0,
    Leave = 2,
    Swap = 4,
}

/// Why a party operation was refused (or that it wasn't).
#[repr(u8)]
#[derive(Serialize, IntoPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(into = "u8")]
pub enum PartyResult {
    Ok = 0,
    BadPlayerName = 1,
    TargetNotInGroup = 2,
    GroupFull = 3,
    AlreadyInGroup = 4,
    NotInGroup = 5,
    NotLeader = 6,
    WrongFaction = 7,
    Ignored = 8,
}

/// The requests a realm-authenticated client can send that the realm
/// handles itself. Anything else a logged-in client sends is proxied.
#[derive(Debug, Clone)]
pub enum ClientPacket {
    AuthSession(AuthSession),
    KeepAlive,
    Ping { seq: u32, latency: u32 },
    ReadyForAccountDataTimes,

    CharEnum,
    CharCreate(NewCharacter),
    CharDelete(CharacterId),
    CharRename { character: CharacterId, name: String },
    RealmSplit { realm: u32 },
    PlayerLogin(CharacterId),

    LogoutRequest,
    MoveWorldPortAck,
    TimeSyncResponse { counter: u32, ticks: u32 },

    NameQuery(Guid),
    Who(WhoRequest),
    MessageChat(ChatMessageRequest),

    TutorialFlag(u32),
    TutorialClear,
    TutorialReset,
    SetActionButton { button: u8, action: u32, kind: u8 },

    FriendList,
    AddFriend { name: String, note: String },
    DelFriend(Guid),
    AddIgnore { name: String },
    DelIgnore(Guid),

    GroupInvite { name: String },
    GroupAccept,
    GroupDecline,
    GroupUninvite { name: String },
    GroupSetLeader(Guid),
    GroupAssistant { target: Guid, assistant: bool },
    LootMethod { method: u8, master: Guid, threshold: u32 },
    GroupDisband,
}

/// The realm's responses to a [`ClientPacket`], plus the server-initiated
/// packets of the in-world opening sequence.
#[derive(Debug, Clone)]
pub enum ServerPacket {
    AuthResponse { code: ResponseCode, expansion: Expansion },
    AddonInfo(Vec<Addon>),
    ClientCacheVersion(u32),
    TutorialData([u32; 8]),
    Pong(u32),

    CharEnum(Vec<CharEnumEntry>),
    RealmSplit { realm: u32 },
    CharCreate(ResponseCode),
    CharDelete(ResponseCode),
    CharRename { character: CharacterId, name: String, result: ResponseCode },
    CharLoginFailed(ResponseCode),

    // in-world opening sequence, in send order
    SetDungeonDifficulty(u32),
    LoginVerifyWorld { map: u32, x: f32, y: f32, z: f32, orientation: f32 },
    AccountDataTimes([u32; 32]),
    FeatureSystemStatus,
    Motd(Vec<String>),
    SetRestStart(u32),
    BindPointUpdate { position: (f32, f32, f32), map: u32, zone: u32 },
    InitialSpells(Vec<u32>),
    ActionButtons(Vec<ActionButton>),
    InitializeFactions,
    InitWorldStates { map: u32, zone: u32 },
    LoginSetTimeSpeed { game_time: u32, speed: f32 },
    TriggerCinematic(u32),
    CompressedSelfUpdate(Vec<u8>),
    TimeSyncRequest(u32),

    SocialList(Vec<SocialListEntry>),
    FriendStatus { guid: u64, online: bool },
    NameQueryResponse { guid: u64, name: String, realm: String, race: u32, gender: u32, class: u32 },
    WhoResponse(Vec<WhoEntry>),
    ChatDelivered { chat_type: ChatType, language: u32, sender: u64, message: String },
    ChatPlayerNotFound(String),
    ChatWrongFaction,

    GroupInviteReceived { from: String },
    GroupDeclineInform(String),
    GroupSetLeaderInform(String),
    GroupDestroyed,
    GroupList { is_raid: bool, leader: u64, members: Vec<(String, u64, u8)> },
    PartyCommandResult { operation: PartyOperation, member: String, result: PartyResult },

    MailListResult(Vec<MailListEntry>),

    LogoutResponse { allowed: bool },
    LogoutComplete,

    TransferPending { map: u32 },
    NewWorld { map: u32, x: f32, y: f32, z: f32, orientation: f32 },
    TransferAborted,

    /// A frame produced by a world node; the realm re-frames the header
    /// and never looks at the body.
    Proxy { opcode: u16, body: Vec<u8> },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn who_request_limits_match_the_protocol_caps() {
        let mut request = WhoRequest {
            zones: vec![0; MAX_WHO_ZONES],
            strings: vec![String::new(); MAX_WHO_STRINGS],
            ..WhoRequest::default()
        };
        assert!(request.within_limits());

        request.zones.push(0);
        assert!(!request.within_limits());

        request.zones.pop();
        request.strings.push(String::new());
        assert!(!request.within_limits());
    }

    #[test]
    fn chat_type_round_trips_through_its_wire_byte() {
        for chat_type in [ChatType::Say, ChatType::Whisper, ChatType::RaidWarning] {
            let byte = u8::from(chat_type);
            assert_eq!(ChatType::try_from(byte).unwrap(), chat_type);
        }
        assert!(ChatType::try_from(0xEEu8).is_err());
    }
}
